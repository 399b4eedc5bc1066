#![forbid(unsafe_code)]

//! End-to-end navigation scenarios against [`LayoutRuntime`].
//!
//! Covers:
//! (1) back/forward symmetry of committed layouts
//! (2) presentation rules of self-navigations
//! (3) closing views by qualifier, wildcards included
//! (4) param validation and error atomicity
//! (5) deferred route matching during registry startup
//! (6) unregistered capabilities, reload and perspectives
//! (7) persistence through a file-backed store
//!
//! Run:
//!   cargo test -p wb-runtime --test navigation_scenarios

use std::cell::Cell;
use std::rc::Rc;

use serde_json::json;
use wb_core::{
    ErrorKind, NavigableId, NavigationState, ParamMap, PartId, Qualifier, ViewId, WorkbenchError,
    WorkbenchResult,
};
use wb_layout::{
    Align, NavigateOptions, NavigationStatus, PartLocation, PartMetadata, RelativePosition,
    UrlTree, ViewOptions, WorkbenchLayout,
};
use wb_runtime::{
    Capability, CapabilityProperties, CapabilityRegistration, CapabilityRegistry, CapabilityType,
    DialogOptions, FileStorage, GuardVerdict, Intention, LAYOUT_KEY, LayoutRuntime, MemoryStorage,
    PERSPECTIVE_KEY, PerspectiveDefinition, StorageBackend, ViewNavigationOptions, ViewTarget,
    WorkbenchConfig,
};

// ============================================================================
// Fixtures
// ============================================================================

const APP: &str = "host-app";

fn qualifier(component: &str) -> Qualifier {
    Qualifier::new().with("component", component)
}

fn params(pairs: &[(&str, &str)]) -> ParamMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn vid(raw: &str) -> ViewId {
    ViewId::parse(raw).unwrap()
}

fn main_area_layout() -> WorkbenchLayout {
    WorkbenchLayout::new()
        .add_part(PartId::main_area(), PartLocation::Root, PartMetadata::default())
        .unwrap()
}

fn view_capability(id: &str, component: &str, title: &str) -> Capability {
    Capability::new(id, CapabilityType::View, qualifier(component), APP)
        .with_param("id", true)
        .with_param("mode", false)
        .with_properties(CapabilityProperties {
            title: Some(title.into()),
            ..CapabilityProperties::default()
        })
}

fn registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry
        .register(view_capability("cap-person", "person", "Person"))
        .unwrap();
    registry
        .register(view_capability("cap-order", "order", "Order"))
        .unwrap();
    registry
}

fn runtime() -> LayoutRuntime {
    LayoutRuntime::new(
        main_area_layout(),
        registry(),
        Box::new(MemoryStorage::new()),
        WorkbenchConfig::default(),
    )
    .unwrap()
}

fn open(runtime: &mut LayoutRuntime, component: &str, id: &str) -> Vec<ViewId> {
    runtime
        .navigate_to_capability(
            &qualifier(component),
            &params(&[("id", id)]),
            ViewNavigationOptions::new(APP),
        )
        .unwrap()
        .views
}

// ============================================================================
// History
// ============================================================================

#[test]
fn back_and_forward_restore_committed_layouts() {
    let mut runtime = runtime();
    let _ = open(&mut runtime, "person", "a");
    let (url_a, layout_a) = (runtime.url().to_string(), runtime.layout());
    let _ = open(&mut runtime, "person", "b");
    let (url_b, layout_b) = (runtime.url().to_string(), runtime.layout());
    let _ = open(&mut runtime, "person", "c");
    let url_c = runtime.url().to_string();

    assert!(runtime.navigate_back().unwrap().is_some());
    assert_eq!(runtime.url(), url_b);
    assert!(runtime.navigate_back().unwrap().is_some());
    assert_eq!(runtime.url(), url_a);
    assert_eq!(runtime.layout(), layout_a);

    assert!(runtime.navigate_forward().unwrap().is_some());
    assert_eq!(runtime.url(), url_b);
    assert_eq!(runtime.layout(), layout_b);
    assert!(runtime.navigate_forward().unwrap().is_some());
    assert_eq!(runtime.url(), url_c);
    assert!(runtime.navigate_forward().unwrap().is_none());
}

#[test]
fn new_navigation_after_back_drops_forward_entries() {
    let mut runtime = runtime();
    let _ = open(&mut runtime, "person", "a");
    let _ = open(&mut runtime, "person", "b");
    let _ = runtime.navigate_back().unwrap();
    assert!(runtime.history().can_go_forward());

    let _ = open(&mut runtime, "order", "x");
    assert!(!runtime.history().can_go_forward());
    assert!(runtime.navigate_forward().unwrap().is_none());
}

#[test]
fn part_states_replay_symmetrically() {
    let layout = main_area_layout()
        .add_part(
            PartId::parse("part.nav").unwrap(),
            PartLocation::Relative(RelativePosition::new(Align::Left)),
            PartMetadata::default(),
        )
        .unwrap();
    let mut runtime = LayoutRuntime::in_memory(layout).unwrap();
    let part = PartId::parse("part.nav").unwrap();
    let navigable = NavigableId::from(part.clone());
    let state_of = |runtime: &LayoutRuntime| {
        runtime.with_layout(|layout| {
            layout
                .navigation(&navigable)
                .and_then(|navigation| navigation.state.get("step").cloned())
        })
    };

    for step in ["a", "b", "c"] {
        let mut state = NavigationState::new();
        let _ = state.insert("step".into(), json!(step));
        let _ = runtime
            .navigate(|layout| {
                layout.navigate_part(
                    &part,
                    vec!["list".into()],
                    NavigateOptions::default().with_state(state),
                )
            })
            .unwrap();
    }

    let _ = runtime.navigate_back().unwrap();
    assert_eq!(state_of(&runtime), Some(json!("b")));
    let _ = runtime.navigate_back().unwrap();
    assert_eq!(state_of(&runtime), Some(json!("a")));
    let _ = runtime.navigate_forward().unwrap();
    assert_eq!(state_of(&runtime), Some(json!("b")));
    let _ = runtime.navigate_forward().unwrap();
    assert_eq!(state_of(&runtime), Some(json!("c")));
}

#[test]
fn history_restores_navigation_state() {
    let mut runtime = runtime();
    let mut state = NavigationState::new();
    let _ = state.insert("scroll".into(), json!(42));
    let _ = runtime
        .navigate_to_capability(
            &qualifier("person"),
            &params(&[("id", "a")]),
            ViewNavigationOptions::new(APP).with_state(state.clone()),
        )
        .unwrap();
    let _ = open(&mut runtime, "order", "x");
    let _ = runtime.navigate_back().unwrap();

    let layout = runtime.layout();
    let navigation = layout.navigation(&NavigableId::from(vid("view.1"))).unwrap();
    assert_eq!(navigation.state, state);
}

// ============================================================================
// Presentation
// ============================================================================

#[test]
fn self_navigation_keeps_title_and_dirty_flag() {
    let mut runtime = runtime();
    let views = open(&mut runtime, "person", "a");
    assert_eq!(views, vec![vid("view.1")]);
    assert_eq!(runtime.layout().view(&vid("view.1")).unwrap().title.as_deref(), Some("Person"));

    let _ = runtime
        .navigate(|layout| {
            layout
                .set_view_title(&vid("view.1"), Some("Edited".into()))?
                .set_view_dirty(&vid("view.1"), true)
        })
        .unwrap();

    // Same qualifier and required params; only an optional param differs.
    let again = runtime
        .navigate_to_capability(
            &qualifier("person"),
            &params(&[("id", "a"), ("mode", "edit")]),
            ViewNavigationOptions::new(APP),
        )
        .unwrap();
    assert_eq!(again.views, vec![vid("view.1")]);
    let layout = runtime.layout();
    let view = layout.view(&vid("view.1")).unwrap();
    assert_eq!(view.title.as_deref(), Some("Edited"));
    assert!(view.dirty);
}

#[test]
fn different_capability_resets_dirty_and_applies_title() {
    let mut runtime = runtime();
    let _ = open(&mut runtime, "person", "a");
    let _ = runtime
        .navigate(|layout| layout.set_view_dirty(&vid("view.1"), true))
        .unwrap();

    let _ = runtime
        .navigate_to_capability(
            &qualifier("order"),
            &params(&[("id", "a")]),
            ViewNavigationOptions::new(APP).target(ViewTarget::View(vid("view.1"))),
        )
        .unwrap();
    let layout = runtime.layout();
    let view = layout.view(&vid("view.1")).unwrap();
    assert!(!view.dirty);
    assert_eq!(view.title.as_deref(), Some("Order"));
}

#[test]
fn blank_target_always_opens_a_new_view() {
    let mut runtime = runtime();
    let _ = open(&mut runtime, "person", "a");
    let opened = runtime
        .navigate_to_capability(
            &qualifier("person"),
            &params(&[("id", "a")]),
            ViewNavigationOptions::new(APP).target(ViewTarget::Blank),
        )
        .unwrap();
    assert_eq!(opened.views, vec![vid("view.2")]);
    assert_eq!(runtime.layout().views().count(), 2);
}

// ============================================================================
// Closing
// ============================================================================

#[test]
fn closing_by_required_param_value() {
    let mut runtime = runtime();
    let _ = open(&mut runtime, "person", "1");
    let _ = open(&mut runtime, "person", "2");

    let closed = runtime
        .navigate_to_capability(
            &qualifier("person"),
            &params(&[("id", "1")]),
            ViewNavigationOptions::new(APP).closing(),
        )
        .unwrap();
    assert_eq!(closed.views, vec![vid("view.1")]);
    let layout = runtime.layout();
    assert!(!layout.has_view(&vid("view.1")));
    assert!(layout.has_view(&vid("view.2")));
}

#[test]
fn closing_with_wildcard_param_closes_every_match() {
    let mut runtime = runtime();
    let _ = open(&mut runtime, "person", "1");
    let _ = open(&mut runtime, "person", "2");
    let _ = open(&mut runtime, "order", "1");

    let closed = runtime
        .navigate_to_capability(
            &qualifier("person"),
            &params(&[("id", "*")]),
            ViewNavigationOptions::new(APP).closing(),
        )
        .unwrap();
    assert_eq!(closed.views.len(), 2);
    let remaining: Vec<ViewId> = runtime.layout().views().map(|view| view.id.clone()).collect();
    assert_eq!(remaining, vec![vid("view.3")]);
}

#[test]
fn closing_nothing_does_not_commit() {
    let mut runtime = runtime();
    let _ = open(&mut runtime, "person", "1");
    let depth = runtime.history().back_depth();
    let closed = runtime
        .close_views(&qualifier("person"), &params(&[("id", "9")]), APP)
        .unwrap();
    assert!(closed.views.is_empty());
    assert!(closed.receipt.is_none());
    assert_eq!(runtime.history().back_depth(), depth);
}

#[test]
fn foreign_application_cannot_close_private_views() {
    let mut runtime = runtime();
    runtime
        .register_capability(Capability::new(
            "cap-contact",
            CapabilityType::View,
            qualifier("contact"),
            "crm",
        ))
        .unwrap();
    runtime.resolver_mut().register_intention(Intention::new(
        CapabilityType::View,
        qualifier("contact"),
        "mail",
    ));
    let opened = runtime
        .navigate_to_capability(
            &qualifier("contact"),
            &ParamMap::new(),
            ViewNavigationOptions::new("crm"),
        )
        .unwrap()
        .views;

    let err = runtime
        .close_views(&qualifier("contact"), &ParamMap::new(), "mail")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NullProvider);
    assert!(runtime.layout().has_view(&opened[0]));

    let closed = runtime
        .close_views(&qualifier("contact"), &ParamMap::new(), "crm")
        .unwrap();
    assert_eq!(closed.views, opened);
}

#[test]
fn closing_with_explicit_target_is_an_illegal_argument() {
    let mut runtime = runtime();
    let _ = open(&mut runtime, "person", "1");
    let err = runtime
        .navigate_to_capability(
            &qualifier("person"),
            &params(&[("id", "1")]),
            ViewNavigationOptions::new(APP)
                .target(ViewTarget::View(vid("view.1")))
                .closing(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    assert!(runtime.layout().has_view(&vid("view.1")));
}

// ============================================================================
// Validation and atomicity
// ============================================================================

#[test]
fn missing_or_undeclared_params_are_rejected() {
    let mut runtime = runtime();
    let missing = runtime
        .navigate_to_capability(&qualifier("person"), &ParamMap::new(), ViewNavigationOptions::new(APP))
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::IntentParamValidation);

    let undeclared = runtime
        .navigate_to_capability(
            &qualifier("person"),
            &params(&[("id", "1"), ("xyz", "1")]),
            ViewNavigationOptions::new(APP),
        )
        .unwrap_err();
    assert_eq!(undeclared.kind(), ErrorKind::IntentParamValidation);
}

#[test]
fn failed_navigation_leaves_layout_url_and_history_unchanged() {
    let mut runtime = runtime();
    let _ = open(&mut runtime, "person", "1");
    let layout = runtime.layout();
    let url = runtime.url().to_string();
    let depth = runtime.history().back_depth();
    let stored = runtime.storage().read(LAYOUT_KEY).unwrap();

    let err = runtime
        .navigate(|layout| {
            layout
                .add_view(vid("view.5"), ViewOptions::in_part(PartId::main_area()))?
                .remove_view(&vid("view.99"))
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NullView);
    assert_eq!(runtime.layout(), layout);
    assert_eq!(runtime.url(), url);
    assert_eq!(runtime.history().back_depth(), depth);
    assert_eq!(runtime.storage().read(LAYOUT_KEY).unwrap(), stored);
}

#[test]
fn caller_without_intention_is_not_qualified() {
    let mut runtime = runtime();
    let err = runtime
        .navigate_to_capability(
            &qualifier("person"),
            &params(&[("id", "1")]),
            ViewNavigationOptions::new("stranger"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotQualified);
}

// ============================================================================
// Route guard
// ============================================================================

#[test]
fn route_match_is_retried_after_startup() {
    let mut registry = CapabilityRegistry::starting();
    registry
        .register(view_capability("cap-person", "person", "Person"))
        .unwrap();
    let mut runtime = LayoutRuntime::new(
        main_area_layout(),
        registry,
        Box::new(MemoryStorage::new()),
        WorkbenchConfig::default(),
    )
    .unwrap();
    let _ = open(&mut runtime, "person", "1");

    let outlet = "workbench.microfrontend.host.cap-person.view.view.1";
    assert_eq!(runtime.can_match(outlet), GuardVerdict::NotReady);

    runtime.resolver_mut().set_ready(true);
    let retried = runtime.signal_startup_complete();
    assert_eq!(retried, vec![(outlet.to_string(), GuardVerdict::Match)]);
    assert!(runtime.signal_startup_complete().is_empty());
}

#[test]
fn unregistered_capability_keeps_view_with_not_found_content() {
    let mut runtime = runtime();
    let _ = open(&mut runtime, "person", "1");
    let outlet = "workbench.microfrontend.host.cap-person.view.view.1";
    assert_eq!(runtime.can_match(outlet), GuardVerdict::Match);
    let depth = runtime.history().back_depth();

    let removed = runtime.unregister_capability("cap-person").unwrap();
    assert_eq!(removed.map(|capability| capability.id().to_string()).as_deref(), Some("cap-person"));

    let layout = runtime.layout();
    assert_eq!(
        layout.navigation_status(&NavigableId::from(vid("view.1"))),
        NavigationStatus::Navigated
    );
    assert!(layout.view(&vid("view.1")).unwrap().navigation.as_ref().unwrap().is_not_found());
    assert_eq!(runtime.history().back_depth(), depth);
    assert_eq!(runtime.can_match(outlet), GuardVerdict::NoMatch);
}

#[test]
fn capability_ids_must_fit_into_host_outlet_names() {
    let mut runtime = runtime();
    let err = runtime
        .register_capability(view_capability("cap.v1", "dotted", "Dotted"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    assert_eq!(
        runtime
            .navigate_to_capability(
                &qualifier("dotted"),
                &params(&[("id", "1")]),
                ViewNavigationOptions::new(APP),
            )
            .unwrap_err()
            .kind(),
        ErrorKind::NullCapability
    );

    let _ = open(&mut runtime, "person", "1");
    let hosts: Vec<_> = UrlTree::parse(runtime.url())
        .unwrap()
        .microfrontend_hosts()
        .collect();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].capability_id, "cap-person");
    assert_eq!(hosts[0].element_id, "view.1");
}

// ============================================================================
// Reload
// ============================================================================

#[test]
fn reload_discards_navigation_state_and_overlays() {
    let mut runtime = runtime();
    let mut state = NavigationState::new();
    let _ = state.insert("draft".into(), json!("unsaved"));
    let _ = runtime
        .navigate_to_capability(
            &qualifier("person"),
            &params(&[("id", "1")]),
            ViewNavigationOptions::new(APP).with_state(state),
        )
        .unwrap();
    let _ = open(&mut runtime, "order", "2");
    runtime
        .register_capability(Capability::new(
            "cap-confirm",
            CapabilityType::Dialog,
            qualifier("confirm"),
            APP,
        ))
        .unwrap();
    let _ = runtime
        .open_dialog(&qualifier("confirm"), &ParamMap::new(), DialogOptions::application(APP))
        .unwrap();

    let hash = runtime.layout().state_hash();
    let _ = runtime.reload().unwrap();
    assert_eq!(runtime.layout().state_hash(), hash);
    assert_eq!(runtime.dialogs().dialogs().count(), 0);

    let _ = runtime.navigate_back().unwrap();
    let layout = runtime.layout();
    let navigation = layout.navigation(&NavigableId::from(vid("view.1"))).unwrap();
    assert!(navigation.state.is_empty());
}

// ============================================================================
// Perspectives
// ============================================================================

fn perspective_layout(extra: &str) -> WorkbenchLayout {
    main_area_layout()
        .add_part(
            PartId::parse(extra).unwrap(),
            PartLocation::Relative(RelativePosition::new(Align::Left)),
            PartMetadata::default(),
        )
        .unwrap()
}

#[test]
fn initial_perspective_leaves_selection_key_unset() {
    let mut runtime = runtime();
    runtime
        .register_perspective(PerspectiveDefinition::new("dev", perspective_layout("part.explorer")))
        .unwrap();
    runtime
        .register_perspective(PerspectiveDefinition::new("ops", perspective_layout("part.monitor")))
        .unwrap();

    assert_eq!(runtime.start().unwrap().as_deref(), Some("dev"));
    assert!(runtime.layout().has_part(&PartId::parse("part.explorer").unwrap()));
    assert_eq!(runtime.storage().read(PERSPECTIVE_KEY).unwrap(), None);
    assert_eq!(runtime.history().back_depth(), 1);

    let _ = runtime.switch_perspective("ops").unwrap();
    assert_eq!(runtime.storage().read(PERSPECTIVE_KEY).unwrap().as_deref(), Some("ops"));
    assert!(runtime.layout().has_part(&PartId::parse("part.monitor").unwrap()));
}

#[test]
fn switching_back_restores_the_modified_perspective() {
    let mut runtime = runtime();
    runtime
        .register_perspective(PerspectiveDefinition::new("dev", perspective_layout("part.explorer")))
        .unwrap();
    runtime
        .register_perspective(PerspectiveDefinition::new("ops", perspective_layout("part.monitor")))
        .unwrap();
    let _ = runtime.start().unwrap();
    let _ = open(&mut runtime, "person", "1");
    let modified = runtime.layout().state_hash();

    let _ = runtime.switch_perspective("ops").unwrap();
    let _ = runtime.switch_perspective("dev").unwrap();
    assert_eq!(runtime.layout().state_hash(), modified);

    let _ = runtime.reset_perspective().unwrap();
    assert!(!runtime.layout().has_view(&vid("view.1")));
}

/// Memory store whose layout writes fail while `failing` is set.
struct FlakyStorage {
    inner: MemoryStorage,
    failing: Rc<Cell<bool>>,
}

impl StorageBackend for FlakyStorage {
    fn read(&self, key: &str) -> WorkbenchResult<Option<String>> {
        self.inner.read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> WorkbenchResult<()> {
        if self.failing.get() && key == LAYOUT_KEY {
            return Err(WorkbenchError::persistence("disk full"));
        }
        self.inner.write(key, value)
    }

    fn remove(&mut self, key: &str) -> WorkbenchResult<()> {
        self.inner.remove(key)
    }
}

#[test]
fn failed_perspective_switch_keeps_the_active_perspective() {
    let failing = Rc::new(Cell::new(false));
    let mut runtime = LayoutRuntime::new(
        main_area_layout(),
        registry(),
        Box::new(FlakyStorage {
            inner: MemoryStorage::new(),
            failing: Rc::clone(&failing),
        }),
        WorkbenchConfig::default(),
    )
    .unwrap();
    runtime
        .register_perspective(PerspectiveDefinition::new("dev", perspective_layout("part.explorer")))
        .unwrap();
    runtime
        .register_perspective(PerspectiveDefinition::new("ops", perspective_layout("part.monitor")))
        .unwrap();
    let _ = runtime.start().unwrap();
    let depth = runtime.history().back_depth();

    failing.set(true);
    assert!(runtime.switch_perspective("ops").is_err());
    assert_eq!(runtime.perspectives().active(), Some("dev"));
    assert_eq!(runtime.storage().read(PERSPECTIVE_KEY).unwrap(), None);
    assert!(runtime.layout().has_part(&PartId::parse("part.explorer").unwrap()));
    assert_eq!(runtime.history().back_depth(), depth);

    failing.set(false);
    let _ = runtime.switch_perspective("ops").unwrap();
    let _ = runtime.switch_perspective("dev").unwrap();
    assert!(runtime.layout().has_part(&PartId::parse("part.explorer").unwrap()));
    assert!(!runtime.layout().has_part(&PartId::parse("part.monitor").unwrap()));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn file_storage_keeps_the_committed_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workbench.json");
    let mut runtime = LayoutRuntime::new(
        main_area_layout(),
        registry(),
        Box::new(FileStorage::open(&path).unwrap()),
        WorkbenchConfig::default(),
    )
    .unwrap();
    let _ = open(&mut runtime, "person", "1");

    let reopened = FileStorage::open(&path).unwrap();
    let json = reopened.read(LAYOUT_KEY).unwrap().unwrap();
    let restored = WorkbenchLayout::from_json(&json).unwrap();
    assert_eq!(restored, runtime.layout().without_states());
}
