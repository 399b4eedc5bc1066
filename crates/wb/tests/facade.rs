#![forbid(unsafe_code)]

//! The prelude is enough to drive a workbench end to end.

use wb::prelude::*;
use wb::{MemoryStorage, UrlTree};

fn workbench() -> LayoutRuntime {
    let config = WorkbenchConfig::from_json_str(
        &serde_json::json!({ "history": { "max_depth": 8 } }).to_string(),
    )
    .unwrap();
    let layout = WorkbenchLayout::new()
        .add_part(PartId::main_area(), PartLocation::Root, PartMetadata::default())
        .unwrap();
    let mut runtime = LayoutRuntime::new(
        layout,
        wb::CapabilityRegistry::new(),
        Box::new(MemoryStorage::new()),
        config,
    )
    .unwrap();
    runtime
        .register_capability(
            Capability::new(
                "cap-inbox",
                CapabilityType::View,
                Qualifier::new().with("component", "inbox"),
                "mail",
            )
            .public(),
        )
        .unwrap();
    runtime
}

#[test]
fn capability_navigation_through_the_prelude() {
    let mut runtime = workbench();
    assert_eq!(runtime.history().max_depth(), 8);

    let opened = runtime
        .navigate_to_capability(
            &Qualifier::new().with("component", "inbox"),
            &ParamMap::new(),
            ViewNavigationOptions::new("mail"),
        )
        .unwrap();
    let view = opened.views[0].clone();
    assert_eq!(view.as_str(), "view.1");

    let url = UrlTree::from_layout(&runtime.layout()).unwrap().to_url();
    assert_eq!(runtime.url(), url);
    assert!(url.contains("view.1"));
}

#[test]
fn errors_carry_their_kind() {
    let mut runtime = workbench();
    let err = runtime
        .navigate(|layout| layout.remove_view(&ViewId::parse("view.404")?))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NullView);
    assert!(err.to_string().contains("view.404"));
}
