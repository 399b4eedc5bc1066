#![forbid(unsafe_code)]

//! Property tests for browser history replay.
//!
//! Random streams of opening, closing and back/forward steps run against a
//! runtime. Walking back over every entry and forward again must reproduce
//! the recorded URLs and layouts, and the committed layout must validate
//! after every step.

use proptest::prelude::*;
use wb_core::{ParamMap, PartId, Qualifier};
use wb_layout::{PartLocation, PartMetadata, WorkbenchLayout};
use wb_runtime::{Capability, CapabilityType, LayoutRuntime, ViewNavigationOptions, ViewTarget};

#[derive(Debug, Clone)]
enum Step {
    Open(u8),
    OpenBlank(u8),
    Close(u8),
    Back,
    Forward,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0u8..4).prop_map(Step::Open),
        1 => (0u8..4).prop_map(Step::OpenBlank),
        2 => (0u8..4).prop_map(Step::Close),
        1 => Just(Step::Back),
        1 => Just(Step::Forward),
    ]
}

fn runtime(max_depth: usize) -> LayoutRuntime {
    let layout = WorkbenchLayout::new()
        .add_part(PartId::main_area(), PartLocation::Root, PartMetadata::default())
        .unwrap();
    let mut config = wb_runtime::WorkbenchConfig::default();
    config.history.max_depth = max_depth;
    let mut runtime = LayoutRuntime::new(
        layout,
        wb_runtime::CapabilityRegistry::new(),
        Box::new(wb_runtime::MemoryStorage::new()),
        config,
    )
    .unwrap();
    runtime
        .register_capability(
            Capability::new(
                "cap-doc",
                CapabilityType::View,
                Qualifier::new().with("component", "doc"),
                "app",
            )
            .with_param("id", true),
        )
        .unwrap();
    runtime
}

fn doc(id: u8) -> ParamMap {
    [("id".to_string(), id.to_string())].into_iter().collect()
}

fn apply(runtime: &mut LayoutRuntime, step: &Step) {
    let qualifier = Qualifier::new().with("component", "doc");
    match step {
        Step::Open(id) => {
            let _ = runtime
                .navigate_to_capability(&qualifier, &doc(*id), ViewNavigationOptions::new("app"))
                .unwrap();
        }
        Step::OpenBlank(id) => {
            let _ = runtime
                .navigate_to_capability(
                    &qualifier,
                    &doc(*id),
                    ViewNavigationOptions::new("app").target(ViewTarget::Blank),
                )
                .unwrap();
        }
        Step::Close(id) => {
            let _ = runtime.close_views(&qualifier, &doc(*id), "app").unwrap();
        }
        Step::Back => {
            let _ = runtime.navigate_back().unwrap();
        }
        Step::Forward => {
            let _ = runtime.navigate_forward().unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn back_then_forward_replays_every_entry(steps in prop::collection::vec(step(), 1..24)) {
        let mut runtime = runtime(100);
        for step in &steps {
            apply(&mut runtime, step);
            prop_assert!(runtime.layout().validate().is_ok());
        }

        // Drop forward entries so the walk starts at the newest one.
        while runtime.history().can_go_forward() {
            let _ = runtime.navigate_forward().unwrap();
        }
        let mut recorded = vec![(runtime.url().to_string(), runtime.layout())];
        while runtime.navigate_back().unwrap().is_some() {
            recorded.push((runtime.url().to_string(), runtime.layout()));
        }
        prop_assert_eq!(recorded.len(), runtime.history().back_depth() + runtime.history().forward_depth());

        for (url, layout) in recorded.iter().rev().skip(1) {
            prop_assert!(runtime.navigate_forward().unwrap().is_some());
            prop_assert_eq!(runtime.url(), url.as_str());
            prop_assert_eq!(&runtime.layout(), layout);
        }
        prop_assert!(runtime.navigate_forward().unwrap().is_none());
    }

    #[test]
    fn history_never_exceeds_max_depth(
        steps in prop::collection::vec(step(), 1..32),
        max_depth in 1usize..6,
    ) {
        let mut runtime = runtime(max_depth);
        for step in &steps {
            apply(&mut runtime, step);
            prop_assert!(runtime.history().back_depth() <= max_depth);
        }
    }

    #[test]
    fn closing_every_id_empties_the_main_area(steps in prop::collection::vec(step(), 1..24)) {
        let mut runtime = runtime(100);
        for step in &steps {
            apply(&mut runtime, step);
        }
        for id in 0u8..4 {
            apply(&mut runtime, &Step::Close(id));
        }
        prop_assert_eq!(runtime.layout().views().count(), 0);
        prop_assert!(runtime.layout().has_part(&PartId::main_area()));
    }
}
