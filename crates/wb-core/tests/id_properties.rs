//! Property checks for identifier classification and qualifier matching.

use proptest::prelude::*;
use wb_core::{ElementKind, Qualifier, classify, is_part_id, is_view_id};

fn any_kind() -> impl Strategy<Value = ElementKind> {
    prop::sample::select(ElementKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn classify_is_total_and_exclusive(kind in any_kind(), suffix in "[a-z0-9-]{1,12}") {
        let raw = format!("{}{}", kind.prefix(), suffix);
        prop_assert_eq!(classify(Some(&raw)), Some(kind));
        let matching = ElementKind::ALL
            .iter()
            .filter(|candidate| raw.starts_with(candidate.prefix()))
            .count();
        prop_assert_eq!(matching, 1);
    }

    #[test]
    fn classify_never_panics(raw in ".{0,24}") {
        let _ = classify(Some(&raw));
        let _ = is_part_id(Some(&raw));
        let _ = is_view_id(Some(&raw));
    }

    #[test]
    fn qualifier_matches_itself(pairs in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{1,6}", 0..5)) {
        let qualifier: Qualifier = pairs.into_iter().collect();
        prop_assert!(qualifier.matches(&qualifier));
    }

    #[test]
    fn any_wildcard_matches_every_present_value(value in "[a-z0-9]{1,8}") {
        let concrete = Qualifier::new().with("component", "view").with("entity", value);
        let pattern = Qualifier::new().with("component", "view").with("entity", "*");
        prop_assert!(concrete.matches(&pattern));
    }
}
