//! Property tests for folder-name escaping and document file names

use proptest::prelude::*;
use stardb_rs::core::validation::{document_file_name, escape_segment, unescape_segment};
use stardb_rs::StoreError;

proptest! {
    #[test]
    fn prop_escape_round_trips(segment in "\\PC{1,40}") {
        let escaped = escape_segment(&segment).unwrap();
        prop_assert_eq!(unescape_segment(&escaped).unwrap(), segment);
    }

    #[test]
    fn prop_escaped_is_single_safe_component(segment in "[ ./\\\\:*?\"<>|%a-zA-Z0-9]{1,30}") {
        let escaped = escape_segment(&segment).unwrap();
        prop_assert!(!escaped.contains('/'));
        prop_assert!(!escaped.contains('\\'));
        prop_assert!(!escaped.starts_with('.'));
        prop_assert!(!escaped.ends_with('.'));
        prop_assert!(!escaped.ends_with(' '));
        prop_assert!(escaped != "." && escaped != "..");
    }

    #[test]
    fn prop_file_name_within_limit(key in "\\PC{1,300}", max_len in 48usize..200) {
        let name = document_file_name(&key, "json", max_len).unwrap();
        prop_assert!(name.len() <= max_len, "{} is {} bytes", name, name.len());
        prop_assert!(name.ends_with(".json"));
        prop_assert!(!name.contains('/'));
    }

    #[test]
    fn prop_distinct_keys_distinct_names(
        stem in "[a-z/]{150,200}",
        a in "[0-9]{1,6}",
        b in "[0-9]{1,6}",
    ) {
        prop_assume!(a != b);
        let first = document_file_name(&format!("{}{}", stem, a), "json", 120).unwrap();
        let second = document_file_name(&format!("{}{}", stem, b), "json", 120).unwrap();
        prop_assert_ne!(first, second);
    }
}

#[test]
fn test_empty_segment_rejected() {
    assert!(matches!(escape_segment(""), Err(StoreError::InvalidSegment(_))));
    assert!(matches!(unescape_segment(""), Err(StoreError::InvalidSegment(_))));
}

#[test]
fn test_malformed_escapes_rejected() {
    for bad in ["%", "%4", "%ZZ", "abc%", "%FF%FE"] {
        assert!(
            matches!(unescape_segment(bad), Err(StoreError::InvalidSegment(_))),
            "{} should not unescape",
            bad
        );
    }
}

#[test]
fn test_dot_names_escaped() {
    assert_eq!(escape_segment(".").unwrap(), "%2E");
    assert_eq!(escape_segment("..").unwrap(), "%2E%2E");
    assert_eq!(escape_segment(".hidden").unwrap(), "%2Ehidden");
    assert_eq!(escape_segment("USNO-A2.0").unwrap(), "USNO-A2.0");
}
