//! Reconciliation engine.
//!
//! [`LayoutRuntime`] is the explicit context object every layout operation
//! runs through. It owns the committed layout, browser history, capability
//! resolver, storage, perspectives and the dialog and notification
//! registries.
//!
//! # Commit pipeline
//!
//! ```text
//! builder calls ──► candidate layout ──► presentation reconcile ──► URL tree
//!        │                                                            │
//!        └── any error: nothing below runs ◄──────────────────────────┤
//!                                                                     ▼
//!                            storage write ──► history entry ──► observers
//! ```
//!
//! A transition is atomic: the candidate is built on a copy, and layout,
//! URL, history and storage change together or not at all.
//!
//! # Presentation
//!
//! Capability-sourced title, heading and closable flag apply on a fresh
//! navigation only. A self-navigation (same target and capability
//! qualifier) keeps whatever the element's handle set since.

use std::sync::Arc;

use tracing::{debug, info_span, warn};
use wb_core::{
    DialogId, ErrorKind, NavigableId, NavigationData, NavigationState, NotificationId, ParamMap,
    PartId, PopupId, Qualifier, ViewId, WorkbenchError, WorkbenchResult, matches_required,
};
use wb_layout::{
    CapabilityRef, GridName, LayoutOperation, LayoutTransaction, NavigateOptions,
    NavigationDescriptor, NavigationStatus, TransactionOutcome, UrlTree, ViewOptions,
    ViewPosition, WorkbenchLayout, is_self_navigation,
};
use web_time::Instant;

use crate::capability::{
    Capability, CapabilityRegistration, CapabilityRegistry, CapabilityResolver, CapabilityType,
    validate_params,
};
use crate::config::WorkbenchConfig;
use crate::dialog::{DialogClosed, DialogHandle, DialogKind, DialogRegistry, Modality, PopupHandle};
use crate::guard::{GuardVerdict, RouteGuard};
use crate::history::{BrowserHistory, HistoryEntry};
use crate::notification::{NotificationConfig, NotificationRegistry};
use crate::observable::{Derived, Observable, Subscription};
use crate::perspective::{PerspectiveDefinition, PerspectiveRegistry};
use crate::sequencer::{NavigationSequencer, NavigationTicket};
use crate::storage::{MemoryStorage, StorageBackend};

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

/// Which view a capability navigation targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewTarget {
    /// Reuse every view showing the capability with matching required
    /// params; open a new view if there is none.
    #[default]
    Auto,
    /// Always open a new view.
    Blank,
    /// Navigate this view, creating it if needed.
    View(ViewId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewNavigationOptions {
    pub target: ViewTarget,
    /// Part new views open in; the main area by default.
    pub part_id: Option<PartId>,
    pub position: ViewPosition,
    pub activate: bool,
    /// Close matching views instead of navigating.
    pub close: bool,
    pub data: NavigationData,
    /// Replaces the previous state; `None` clears it.
    pub state: Option<NavigationState>,
    pub css_classes: Vec<String>,
    pub caller_app: String,
}

impl ViewNavigationOptions {
    #[must_use]
    pub fn new(caller_app: impl Into<String>) -> Self {
        Self {
            target: ViewTarget::Auto,
            part_id: None,
            position: ViewPosition::End,
            activate: true,
            close: false,
            data: NavigationData::new(),
            state: None,
            css_classes: Vec::new(),
            caller_app: caller_app.into(),
        }
    }

    #[must_use]
    pub fn target(mut self, target: ViewTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn in_part(mut self, part: PartId) -> Self {
        self.part_id = Some(part);
        self
    }

    #[must_use]
    pub fn at(mut self, position: ViewPosition) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn activate(mut self, activate: bool) -> Self {
        self.activate = activate;
        self
    }

    #[must_use]
    pub fn closing(mut self) -> Self {
        self.close = true;
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: NavigationState) -> Self {
        self.state = Some(state);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartNavigationOptions {
    pub data: NavigationData,
    pub state: Option<NavigationState>,
    pub activate: bool,
    pub caller_app: String,
}

impl PartNavigationOptions {
    #[must_use]
    pub fn new(caller_app: impl Into<String>) -> Self {
        Self {
            data: NavigationData::new(),
            state: None,
            activate: false,
            caller_app: caller_app.into(),
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: NavigationState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn activate(mut self) -> Self {
        self.activate = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogOptions {
    pub modality: Modality,
    pub caller_app: String,
}

impl DialogOptions {
    #[must_use]
    pub fn application(caller_app: impl Into<String>) -> Self {
        Self {
            modality: Modality::Application,
            caller_app: caller_app.into(),
        }
    }

    #[must_use]
    pub fn view_modal(view: ViewId, caller_app: impl Into<String>) -> Self {
        Self {
            modality: Modality::View { id: view },
            caller_app: caller_app.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupOptions {
    pub anchor: Option<NavigableId>,
    pub context: Option<ViewId>,
    pub close_on_focus_lost: bool,
    pub caller_app: String,
}

impl PopupOptions {
    #[must_use]
    pub fn new(caller_app: impl Into<String>) -> Self {
        Self {
            anchor: None,
            context: None,
            close_on_focus_lost: true,
            caller_app: caller_app.into(),
        }
    }
}

/// What a committed transition produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Number of the transition; `0` for the initial layout.
    pub transition: u64,
    pub url: String,
    pub state_hash: u64,
}

/// Views a capability navigation touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewNavigation {
    /// Navigated or, when closing, closed views.
    pub views: Vec<ViewId>,
    /// `None` when nothing changed.
    pub receipt: Option<CommitReceipt>,
}

/// Request completed by [`LayoutRuntime::complete_resolution`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityRequest {
    pub qualifier: Qualifier,
    pub params: ParamMap,
    pub data: NavigationData,
    pub state: Option<NavigationState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Applied(CommitReceipt),
    /// The element shows "not found" content.
    NotFound,
    /// A newer navigation of the element started meanwhile.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitMode {
    Push,
    Replace,
    Restore,
}

impl CommitMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Replace => "replace",
            Self::Restore => "restore",
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

pub struct LayoutRuntime<R: CapabilityResolver = CapabilityRegistry> {
    layout: Observable<WorkbenchLayout>,
    url: String,
    transitions: u64,
    history: BrowserHistory,
    resolver: R,
    storage: Box<dyn StorageBackend>,
    perspectives: PerspectiveRegistry,
    sequencer: NavigationSequencer,
    guard: RouteGuard,
    dialogs: DialogRegistry,
    notifications: NotificationRegistry,
    config: WorkbenchConfig,
}

impl<R: CapabilityResolver> std::fmt::Debug for LayoutRuntime<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutRuntime")
            .field("url", &self.url)
            .field("transitions", &self.transitions)
            .field("history", &self.history)
            .field("active_perspective", &self.perspectives.active())
            .field("pending_guards", &self.guard.pending().len())
            .finish_non_exhaustive()
    }
}

impl LayoutRuntime<CapabilityRegistry> {
    /// Runtime over an empty registry, memory storage and default config.
    pub fn in_memory(initial: WorkbenchLayout) -> WorkbenchResult<Self> {
        Self::new(
            initial,
            CapabilityRegistry::new(),
            Box::new(MemoryStorage::new()),
            WorkbenchConfig::default(),
        )
    }
}

impl<R: CapabilityResolver> LayoutRuntime<R> {
    pub fn new(
        initial: WorkbenchLayout,
        resolver: R,
        storage: Box<dyn StorageBackend>,
        config: WorkbenchConfig,
    ) -> WorkbenchResult<Self> {
        let config = config.validated()?;
        initial.validate()?;
        let url = UrlTree::from_layout(&initial)?.to_url();
        let mut history = BrowserHistory::new(config.history.max_depth);
        history.push(HistoryEntry::new(url.clone(), initial.clone()));
        Ok(Self {
            layout: Observable::new(initial),
            url,
            transitions: 0,
            history,
            resolver,
            storage,
            perspectives: PerspectiveRegistry::new(config.storage.clone()),
            sequencer: NavigationSequencer::new(),
            guard: RouteGuard::new(),
            dialogs: DialogRegistry::new(),
            notifications: NotificationRegistry::new(),
            config,
        })
    }

    // ====================================================================
    // Accessors
    // ====================================================================

    /// The committed layout.
    #[must_use]
    pub fn layout(&self) -> WorkbenchLayout {
        self.layout.get()
    }

    pub fn with_layout<T>(&self, f: impl FnOnce(&WorkbenchLayout) -> T) -> T {
        self.layout.with(f)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn history(&self) -> &BrowserHistory {
        &self.history
    }

    #[must_use]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    #[must_use]
    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    #[must_use]
    pub fn dialogs(&self) -> &DialogRegistry {
        &self.dialogs
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationRegistry {
        &self.notifications
    }

    #[must_use]
    pub fn perspectives(&self) -> &PerspectiveRegistry {
        &self.perspectives
    }

    #[must_use]
    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    /// Observe committed layouts.
    pub fn subscribe(&self, callback: impl Fn(&WorkbenchLayout) + 'static) -> Subscription {
        self.layout.subscribe(callback)
    }

    /// Memoized value computed from the committed layout.
    pub fn derive<U: Clone>(
        &self,
        compute: impl Fn(&WorkbenchLayout) -> U + 'static,
    ) -> Derived<WorkbenchLayout, U> {
        self.layout.derive(compute)
    }

    fn receipt(&self) -> CommitReceipt {
        CommitReceipt {
            transition: self.transitions,
            url: self.url.clone(),
            state_hash: self.layout.with(WorkbenchLayout::state_hash),
        }
    }

    // ====================================================================
    // Commit pipeline
    // ====================================================================

    /// Apply builder calls to the committed layout as one transition.
    pub fn navigate(
        &mut self,
        build: impl FnOnce(&WorkbenchLayout) -> WorkbenchResult<WorkbenchLayout>,
    ) -> WorkbenchResult<CommitReceipt> {
        self.navigate_with(CommitMode::Push, build)
    }

    fn navigate_with(
        &mut self,
        mode: CommitMode,
        build: impl FnOnce(&WorkbenchLayout) -> WorkbenchResult<WorkbenchLayout>,
    ) -> WorkbenchResult<CommitReceipt> {
        let current = self.layout.get();
        let next = build(&current).inspect_err(|err| {
            debug!(error = %err, "navigation rejected; layout unchanged");
        })?;
        if next == current {
            return Ok(self.receipt());
        }
        let next = self.reconcile_presentation(&current, next)?;
        self.commit(next, mode)
    }

    /// Stage layout operations in one transaction and commit them together.
    pub fn apply_operations(
        &mut self,
        operations: impl IntoIterator<Item = LayoutOperation>,
    ) -> WorkbenchResult<TransactionOutcome> {
        let base = self.layout.get();
        let mut transaction = LayoutTransaction::begin(self.transitions + 1, base.clone());
        for operation in operations {
            if let Err(err) = transaction.apply(operation) {
                let outcome = transaction.rollback();
                debug!(
                    transaction = outcome.transaction_id,
                    attempted = outcome.journal.len(),
                    "transaction rolled back"
                );
                return Err(err);
            }
        }
        let outcome = transaction.commit();
        if outcome.layout != base {
            let next = self.reconcile_presentation(&base, outcome.layout.clone())?;
            let _ = self.commit(next, CommitMode::Push)?;
        }
        Ok(outcome)
    }

    fn commit(&mut self, next: WorkbenchLayout, mode: CommitMode) -> WorkbenchResult<CommitReceipt> {
        let started = Instant::now();
        let url = UrlTree::from_layout(&next)?.to_url();
        self.storage
            .write(&self.config.storage.layout_key, &next.to_json()?)?;

        self.transitions += 1;
        let _span = info_span!(
            "workbench.commit",
            transition = self.transitions,
            mode = mode.as_str()
        )
        .entered();

        let previous = self.layout.get();
        for element in changed_navigations(&previous, &next) {
            self.sequencer.supersede(&element);
        }
        match mode {
            CommitMode::Push => self.history.push(HistoryEntry::new(url.clone(), next.clone())),
            CommitMode::Replace => {
                self.history
                    .replace_current(HistoryEntry::new(url.clone(), next.clone()));
            }
            CommitMode::Restore => {}
        }
        let closed = self.dialogs.close_orphaned(&next);
        self.url = url;
        self.layout.set(next);

        debug!(
            url = %self.url,
            closed_dialogs = closed.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "layout committed"
        );
        Ok(self.receipt())
    }

    /// Apply capability presentation to every element freshly navigated
    /// from `previous` to `next`.
    fn reconcile_presentation(
        &self,
        previous: &WorkbenchLayout,
        next: WorkbenchLayout,
    ) -> WorkbenchResult<WorkbenchLayout> {
        let fresh: Vec<(NavigableId, String)> = next
            .navigated_elements()
            .filter_map(|(id, navigation)| {
                let capability = navigation.capability.as_ref()?;
                let fresh = capability.resolved
                    && !is_self_navigation(previous.navigation(&id), navigation);
                fresh.then(|| (id, capability.capability_id.clone()))
            })
            .collect();

        let mut layout = next;
        for (id, capability_id) in fresh {
            let Some(capability) = self.resolver.lookup(&capability_id) else {
                if self.config.microfrontend.warn_on_missing_capability {
                    warn!(element = %id, capability = %capability_id, "capability not found");
                }
                continue;
            };
            let properties = &capability.properties;
            layout = match &id {
                NavigableId::View(view) => {
                    let mut layout = layout
                        .set_view_title(view, properties.title.clone())?
                        .set_view_heading(view, properties.heading.clone())?;
                    if let Some(closable) = properties.closable {
                        layout = layout.set_view_closable(view, closable)?;
                    }
                    layout
                }
                NavigableId::Part(part) => layout.set_part_title(part, properties.title.clone())?,
            };
        }
        Ok(layout)
    }

    // ====================================================================
    // Capability navigation
    // ====================================================================

    fn resolve_one(
        &self,
        caller_app: &str,
        capability_type: CapabilityType,
        qualifier: &Qualifier,
    ) -> WorkbenchResult<Capability> {
        let mut found = self.resolver.resolve(caller_app, capability_type, qualifier)?;
        if found.len() > 1 {
            debug!(
                %qualifier,
                candidates = found.len(),
                "several capabilities match; using the first"
            );
        }
        if found.is_empty() {
            return Err(WorkbenchError::null_capability(format!(
                "no {capability_type} capability matches {qualifier}"
            )));
        }
        Ok(found.swap_remove(0))
    }

    /// Navigate views to the view capability addressed by `qualifier`.
    pub fn navigate_to_capability(
        &mut self,
        qualifier: &Qualifier,
        params: &ParamMap,
        options: ViewNavigationOptions,
    ) -> WorkbenchResult<ViewNavigation> {
        if options.close {
            if matches!(options.target, ViewTarget::View(_)) {
                return Err(WorkbenchError::illegal_argument(
                    "closing views by qualifier cannot be combined with an explicit target",
                ));
            }
            return self.close_views(qualifier, params, &options.caller_app);
        }

        let capability = self.resolve_one(&options.caller_app, CapabilityType::View, qualifier)?;
        validate_params(&capability, params)?;

        let mut css_classes = capability.properties.css_class.clone();
        css_classes.extend(options.css_classes.iter().cloned());
        let navigate_options = NavigateOptions {
            hint: Some(self.config.microfrontend.view_hint.clone()),
            data: options.data.clone(),
            state: options.state.clone(),
            capability: Some(CapabilityRef::new(
                capability.id(),
                qualifier.clone(),
                params.clone(),
            )),
            css_classes,
        };

        let current = self.layout.get();
        let targets = match &options.target {
            ViewTarget::View(id) => vec![id.clone()],
            ViewTarget::Auto => {
                let required: Vec<&str> = capability.required_params().collect();
                let reusable = views_showing(&current, qualifier, params, &required);
                if reusable.is_empty() {
                    vec![ViewId::next_available(current.views().map(|view| &view.id))]
                } else {
                    reusable
                }
            }
            ViewTarget::Blank => vec![ViewId::next_available(current.views().map(|view| &view.id))],
        };
        let host = match &options.part_id {
            Some(part) => part.clone(),
            None => default_view_host(&current)?,
        };

        let receipt = self.navigate(|layout| {
            let mut layout = layout.clone();
            for id in &targets {
                if !layout.has_view(id) {
                    layout = layout.add_view(
                        id.clone(),
                        ViewOptions {
                            part_id: host.clone(),
                            position: options.position,
                            activate_view: options.activate,
                            activate_part: options.activate,
                            css_classes: Vec::new(),
                        },
                    )?;
                }
                layout = layout.navigate_view(id, Vec::new(), navigate_options.clone())?;
                if options.activate {
                    layout = layout.activate_view(id)?;
                }
            }
            Ok(layout)
        })?;

        Ok(ViewNavigation {
            views: targets,
            receipt: Some(receipt),
        })
    }

    /// Close every view showing `qualifier` whose required params match
    /// `params`; `*` matches any value.
    pub fn close_views(
        &mut self,
        qualifier: &Qualifier,
        params: &ParamMap,
        caller_app: &str,
    ) -> WorkbenchResult<ViewNavigation> {
        match self.resolver.resolve(caller_app, CapabilityType::View, qualifier) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NullCapability => {
                debug!(error = %err, "closing views of an unregistered capability");
            }
            Err(err) => return Err(err),
        }

        let current = self.layout.get();
        let closing: Vec<ViewId> = current
            .views()
            .filter(|view| {
                let Some(capability) = view
                    .navigation
                    .as_ref()
                    .and_then(|navigation| navigation.capability.as_ref())
                else {
                    return false;
                };
                if !capability.qualifier.matches(qualifier) {
                    return false;
                }
                let required: Vec<String> = match self.resolver.lookup(&capability.capability_id) {
                    Some(declared) if !declared.is_visible_to(caller_app) => return false,
                    Some(declared) => declared.required_params().map(str::to_owned).collect(),
                    None => params.keys().cloned().collect(),
                };
                matches_required(
                    &capability.params,
                    params,
                    required.iter().map(String::as_str),
                )
            })
            .map(|view| view.id.clone())
            .collect();

        if closing.is_empty() {
            return Ok(ViewNavigation {
                views: closing,
                receipt: None,
            });
        }
        let receipt = self.navigate(|layout| {
            closing
                .iter()
                .try_fold(layout.clone(), |layout, id| layout.remove_view(id))
        })?;
        Ok(ViewNavigation {
            views: closing,
            receipt: Some(receipt),
        })
    }

    /// Close one view by id.
    pub fn close_view(&mut self, id: &ViewId) -> WorkbenchResult<CommitReceipt> {
        self.navigate(|layout| layout.remove_view(id))
    }

    /// Navigate a part to the part capability addressed by `qualifier`.
    pub fn navigate_part_to_capability(
        &mut self,
        part: &PartId,
        qualifier: &Qualifier,
        params: &ParamMap,
        options: PartNavigationOptions,
    ) -> WorkbenchResult<CommitReceipt> {
        let capability = self.resolve_one(&options.caller_app, CapabilityType::Part, qualifier)?;
        validate_params(&capability, params)?;
        let navigate_options = NavigateOptions {
            hint: Some(self.config.microfrontend.part_hint.clone()),
            data: options.data,
            state: options.state,
            capability: Some(CapabilityRef::new(
                capability.id(),
                qualifier.clone(),
                params.clone(),
            )),
            css_classes: capability.properties.css_class.clone(),
        };
        let activate = options.activate;
        self.navigate(|layout| {
            let layout = layout.navigate_part(part, Vec::new(), navigate_options)?;
            if activate {
                layout.activate_part(part)
            } else {
                Ok(layout)
            }
        })
    }

    // ====================================================================
    // Dialogs, popups, notifications
    // ====================================================================

    pub fn open_dialog(
        &mut self,
        qualifier: &Qualifier,
        params: &ParamMap,
        options: DialogOptions,
    ) -> WorkbenchResult<DialogId> {
        self.open_modal(CapabilityType::Dialog, DialogKind::Dialog, qualifier, params, options)
    }

    pub fn open_messagebox(
        &mut self,
        qualifier: &Qualifier,
        params: &ParamMap,
        options: DialogOptions,
    ) -> WorkbenchResult<DialogId> {
        self.open_modal(
            CapabilityType::Messagebox,
            DialogKind::Messagebox,
            qualifier,
            params,
            options,
        )
    }

    fn open_modal(
        &mut self,
        capability_type: CapabilityType,
        kind: DialogKind,
        qualifier: &Qualifier,
        params: &ParamMap,
        options: DialogOptions,
    ) -> WorkbenchResult<DialogId> {
        let capability = self.resolve_one(&options.caller_app, capability_type, qualifier)?;
        validate_params(&capability, params)?;
        if let Modality::View { id } = &options.modality
            && !self.layout.with(|layout| layout.has_view(id))
        {
            return Err(WorkbenchError::null_view(id.as_str()));
        }
        let properties = &capability.properties;
        let mut handle = DialogHandle::new(kind, options.modality);
        handle.capability = Some(CapabilityRef::new(
            capability.id(),
            qualifier.clone(),
            params.clone(),
        ));
        handle.title = properties.title.clone();
        handle.size = properties.size.clone();
        handle.closable = properties.closable.unwrap_or(true);
        handle.css_classes = properties.css_class.clone();
        self.dialogs.open(handle)
    }

    pub fn close_dialog(
        &mut self,
        id: &DialogId,
        result: Option<serde_json::Value>,
    ) -> WorkbenchResult<DialogClosed> {
        self.dialogs.close(id, result)
    }

    pub fn open_popup(
        &mut self,
        qualifier: &Qualifier,
        params: &ParamMap,
        options: PopupOptions,
    ) -> WorkbenchResult<PopupId> {
        let capability = self.resolve_one(&options.caller_app, CapabilityType::Popup, qualifier)?;
        validate_params(&capability, params)?;
        let layout = self.layout.get();
        if let Some(anchor) = &options.anchor
            && layout.navigation_status(anchor) == NavigationStatus::Removed
        {
            return Err(WorkbenchError::null_view(anchor.as_str()));
        }
        if let Some(context) = &options.context
            && !layout.has_view(context)
        {
            return Err(WorkbenchError::null_view(context.as_str()));
        }
        self.dialogs.open_popup(PopupHandle {
            id: wb_core::compute_popup_id(),
            capability: CapabilityRef::new(capability.id(), qualifier.clone(), params.clone()),
            anchor: options.anchor,
            context: options.context,
            size: capability.properties.size.clone(),
            close_on_focus_lost: options.close_on_focus_lost,
        })
    }

    pub fn close_popup(&mut self, id: &PopupId) -> WorkbenchResult<PopupHandle> {
        self.dialogs.close_popup(id)
    }

    pub fn show_notification(&self, config: NotificationConfig) -> NotificationId {
        self.notifications.show(config)
    }

    /// Show a notification backed by a notification capability.
    pub fn notify(
        &self,
        qualifier: &Qualifier,
        params: &ParamMap,
        caller_app: &str,
        mut config: NotificationConfig,
    ) -> WorkbenchResult<NotificationId> {
        let capability = self.resolve_one(caller_app, CapabilityType::Notification, qualifier)?;
        validate_params(&capability, params)?;
        if config.title.is_none() {
            config.title = capability.properties.title.clone();
        }
        config.css_classes.extend(capability.properties.css_class.iter().cloned());
        config.capability = Some(CapabilityRef::new(
            capability.id(),
            qualifier.clone(),
            params.clone(),
        ));
        Ok(self.notifications.show(config))
    }

    // ====================================================================
    // History and reload
    // ====================================================================

    /// Restore the previous history entry, states included.
    pub fn navigate_back(&mut self) -> WorkbenchResult<Option<CommitReceipt>> {
        let Some(entry) = self.history.back() else {
            return Ok(None);
        };
        self.restore(&entry).map(Some).inspect_err(|_| {
            let _ = self.history.forward();
        })
    }

    /// Restore the next history entry, states included.
    pub fn navigate_forward(&mut self) -> WorkbenchResult<Option<CommitReceipt>> {
        let Some(entry) = self.history.forward() else {
            return Ok(None);
        };
        self.restore(&entry).map(Some).inspect_err(|_| {
            let _ = self.history.back();
        })
    }

    fn restore(&mut self, entry: &Arc<HistoryEntry>) -> WorkbenchResult<CommitReceipt> {
        let layout = self.without_missing_capabilities(entry.layout.clone())?;
        self.commit(layout, CommitMode::Restore)
    }

    /// Rebuild from the persisted layout, as after a page reload.
    ///
    /// Navigation states, dialogs, popups and notifications do not survive.
    pub fn reload(&mut self) -> WorkbenchResult<CommitReceipt> {
        let restored = match self.storage.read(&self.config.storage.layout_key)? {
            Some(json) => WorkbenchLayout::from_json(&json)?,
            None => self.layout.with(WorkbenchLayout::without_states),
        };
        let restored = self.without_missing_capabilities(restored)?;
        self.history.discard_states();
        self.sequencer.reset();
        self.guard = RouteGuard::new();
        self.dialogs.clear();
        self.notifications.close_all();
        self.commit(restored, CommitMode::Replace)
    }

    /// Mark references to capabilities the resolver no longer knows.
    fn without_missing_capabilities(
        &self,
        layout: WorkbenchLayout,
    ) -> WorkbenchResult<WorkbenchLayout> {
        if !self.resolver.is_ready() {
            return Ok(layout);
        }
        let mut missing: Vec<String> = layout
            .navigated_elements()
            .filter_map(|(_, navigation)| navigation.capability.as_ref())
            .filter(|capability| {
                capability.resolved && self.resolver.lookup(&capability.capability_id).is_none()
            })
            .map(|capability| capability.capability_id.clone())
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing.iter().try_fold(layout, |layout, capability_id| {
            if self.config.microfrontend.warn_on_missing_capability {
                warn!(capability = %capability_id, "capability not found");
            }
            layout.invalidate_capability(capability_id)
        })
    }

    /// React to a capability that vanished: its elements stay in the layout
    /// and show "not found" content. Replaces the current history entry.
    pub fn invalidate_capability(
        &mut self,
        capability_id: &str,
    ) -> WorkbenchResult<Option<CommitReceipt>> {
        self.dialogs.invalidate_capability(capability_id);
        let current = self.layout.get();
        let next = current.invalidate_capability(capability_id)?;
        if next == current {
            return Ok(None);
        }
        if self.config.microfrontend.warn_on_missing_capability {
            warn!(capability = capability_id, "capability unregistered; showing not-found content");
        }
        self.commit(next, CommitMode::Replace).map(Some)
    }

    // ====================================================================
    // Asynchronous resolution
    // ====================================================================

    /// Start a navigation of `element` whose capability resolves later.
    pub fn begin_navigation(&mut self, element: NavigableId) -> NavigationTicket {
        self.sequencer.begin(element)
    }

    /// Complete a navigation started with [`begin_navigation`](Self::begin_navigation).
    ///
    /// Results of superseded tickets are discarded. A failed resolution does
    /// not error: the element shows "not found" content.
    pub fn complete_resolution(
        &mut self,
        ticket: &NavigationTicket,
        request: CapabilityRequest,
        result: WorkbenchResult<Capability>,
    ) -> WorkbenchResult<ResolutionOutcome> {
        if !self.sequencer.complete(ticket) {
            return Ok(ResolutionOutcome::Discarded);
        }
        let element = ticket.element().clone();
        if self.layout.with(|layout| layout.navigation_status(&element)) == NavigationStatus::Removed {
            debug!(element = %element, "element removed before its capability resolved");
            return Ok(ResolutionOutcome::Discarded);
        }

        let resolved = result.and_then(|capability| {
            validate_params(&capability, &request.params)?;
            Ok(capability)
        });
        let capability = match resolved {
            Ok(capability) => capability,
            Err(err) => {
                if self.config.microfrontend.warn_on_missing_capability {
                    warn!(element = %element, error = %err, "capability resolution failed");
                }
                self.mark_not_found(&element)?;
                return Ok(ResolutionOutcome::NotFound);
            }
        };

        let hint = match &element {
            NavigableId::Part(_) => self.config.microfrontend.part_hint.clone(),
            NavigableId::View(_) => self.config.microfrontend.view_hint.clone(),
        };
        let options = NavigateOptions {
            hint: Some(hint),
            data: request.data,
            state: request.state,
            capability: Some(CapabilityRef::new(
                capability.id(),
                request.qualifier,
                request.params,
            )),
            css_classes: capability.properties.css_class.clone(),
        };
        let receipt = self.navigate(|layout| match &element {
            NavigableId::Part(id) => layout.navigate_part(id, Vec::new(), options),
            NavigableId::View(id) => layout.navigate_view(id, Vec::new(), options),
        })?;
        Ok(ResolutionOutcome::Applied(receipt))
    }

    fn mark_not_found(&mut self, element: &NavigableId) -> WorkbenchResult<()> {
        let Some(mut descriptor) = self
            .layout
            .with(|layout| layout.navigation(element).cloned())
        else {
            return Ok(());
        };
        let Some(capability) = descriptor.capability.as_mut() else {
            return Ok(());
        };
        capability.resolved = false;
        let (segments, options) = renavigation(descriptor);
        let _ = self.navigate_with(CommitMode::Replace, |layout| match element {
            NavigableId::Part(id) => layout.navigate_part(id, segments, options),
            NavigableId::View(id) => layout.navigate_view(id, segments, options),
        })?;
        Ok(())
    }

    // ====================================================================
    // Route guard
    // ====================================================================

    /// Whether the host route in `outlet` may match.
    pub fn can_match(&mut self, outlet: &str) -> GuardVerdict {
        let layout = self.layout.get();
        let dialogs = &self.dialogs;
        self.guard.evaluate(outlet, &self.resolver, |host| {
            let element = NavigableId::parse(&host.element_id).ok();
            let in_layout = element.as_ref().is_some_and(|element| {
                layout
                    .navigation(element)
                    .and_then(|navigation| navigation.capability.as_ref())
                    .is_some_and(|capability| {
                        capability.resolved && capability.capability_id == host.capability_id
                    })
            });
            in_layout || dialogs.references(&host.element_id, &host.capability_id)
        })
    }

    /// Re-evaluate outlets deferred while the registry was starting up.
    pub fn signal_startup_complete(&mut self) -> Vec<(String, GuardVerdict)> {
        let pending = self.guard.take_pending();
        debug!(deferred = pending.len(), "re-evaluating deferred route matches");
        pending
            .into_iter()
            .map(|outlet| {
                let verdict = self.can_match(&outlet);
                (outlet, verdict)
            })
            .collect()
    }

    // ====================================================================
    // Perspectives
    // ====================================================================

    pub fn register_perspective(&mut self, definition: PerspectiveDefinition) -> WorkbenchResult<()> {
        self.perspectives.register(definition)
    }

    /// Select the startup perspective without touching the stored selection.
    pub fn start(&mut self) -> WorkbenchResult<Option<String>> {
        let Some(id) = self.perspectives.initial_selection(self.storage.as_ref())? else {
            return Ok(None);
        };
        let _ = self.switch_with(&id, CommitMode::Replace)?;
        Ok(Some(id))
    }

    pub fn switch_perspective(&mut self, id: &str) -> WorkbenchResult<CommitReceipt> {
        self.switch_with(id, CommitMode::Push)
    }

    /// The registry moves to `id` only after the layout is committed.
    fn switch_with(&mut self, id: &str, mode: CommitMode) -> WorkbenchResult<CommitReceipt> {
        let current = self.layout.get();
        let staged = self
            .perspectives
            .stage(id, &current, self.storage.as_ref())?;
        if self.perspectives.active() == Some(id) {
            return Ok(self.receipt());
        }
        self.perspectives.stash(&current, self.storage.as_mut())?;
        let receipt = if staged.layout == current {
            self.receipt()
        } else {
            let next = self.without_missing_capabilities(staged.layout)?;
            let next = self.reconcile_presentation(&current, next)?;
            self.commit(next, mode)?
        };
        self.perspectives.activate(id, self.storage.as_mut())?;
        Ok(receipt)
    }

    /// Discard the user's changes to the active perspective.
    pub fn reset_perspective(&mut self) -> WorkbenchResult<Option<CommitReceipt>> {
        let Some(id) = self.perspectives.active().map(str::to_string) else {
            return Ok(None);
        };
        let initial = self.perspectives.reset(&id, self.storage.as_mut())?;
        self.navigate(|_| Ok(initial)).map(Some)
    }
}

impl<R: CapabilityResolver + CapabilityRegistration> LayoutRuntime<R> {
    pub fn register_capability(&mut self, capability: Capability) -> WorkbenchResult<String> {
        self.resolver.register(capability)
    }

    /// Unregister a capability and invalidate every reference to it.
    pub fn unregister_capability(
        &mut self,
        capability_id: &str,
    ) -> WorkbenchResult<Option<Capability>> {
        let removed = self.resolver.unregister(capability_id);
        let _ = self.invalidate_capability(capability_id)?;
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Elements whose navigation differs between two layouts, removed ones included.
fn changed_navigations(previous: &WorkbenchLayout, next: &WorkbenchLayout) -> Vec<NavigableId> {
    let mut changed: Vec<NavigableId> = next
        .navigated_elements()
        .filter(|(id, navigation)| previous.navigation(id) != Some(*navigation))
        .map(|(id, _)| id)
        .collect();
    changed.extend(
        previous
            .navigated_elements()
            .filter(|(id, _)| next.navigation(id).is_none())
            .map(|(id, _)| id),
    );
    changed
}

/// Views showing `qualifier` whose required params match `params`.
fn views_showing(
    layout: &WorkbenchLayout,
    qualifier: &Qualifier,
    params: &ParamMap,
    required: &[&str],
) -> Vec<ViewId> {
    layout
        .views()
        .filter(|view| {
            view.navigation
                .as_ref()
                .and_then(|navigation| navigation.capability.as_ref())
                .is_some_and(|capability| {
                    capability.qualifier.matches(qualifier)
                        && matches_required(&capability.params, params, required.iter().copied())
                })
        })
        .map(|view| view.id.clone())
        .collect()
}

/// Main area if present, else the active part of the main grid.
fn default_view_host(layout: &WorkbenchLayout) -> WorkbenchResult<PartId> {
    let main_area = PartId::main_area();
    if layout.has_part(&main_area) {
        return Ok(main_area);
    }
    layout
        .active_part(Some(&GridName::Main))
        .map(|part| part.id.clone())
        .ok_or_else(|| WorkbenchError::illegal_state("no part to open the view in"))
}

/// Arguments reproducing `descriptor` through `navigate_part`/`navigate_view`.
fn renavigation(descriptor: NavigationDescriptor) -> (Vec<String>, NavigateOptions) {
    let segments = descriptor.target.segments().to_vec();
    let options = NavigateOptions {
        hint: descriptor.target.hint().map(str::to_string),
        data: descriptor.data,
        state: Some(descriptor.state),
        capability: descriptor.capability,
        css_classes: descriptor.css_classes,
    };
    (segments, options)
}
