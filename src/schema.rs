//! Field-name resolution across bridge inventory dataset vintages.
//!
//! The feature service has renamed columns between releases, so each
//! canonical attribute carries an ordered list of candidate source keys.
//! Resolution takes the first key that is present and non-empty.

use serde_json::{Map, Value};

/// Candidate source keys for `structure_id`, highest priority first.
pub static STRUCTURE_ID_KEYS: &[&str] = &[
    "STRUCTURE_NUMBER_008",
    "STRUCTURENUMBER",
    "structure_id",
    "bridge_id",
];

pub static STATE_CODE_KEYS: &[&str] = &["STATE_CODE_001", "state", "STATE"];

pub static COUNTY_CODE_KEYS: &[&str] = &["COUNTY_CODE_003", "county", "COUNTY"];

pub static ELEMENT_CODE_KEYS: &[&str] = &["ELEMENT_NUMBER", "ELEMENT", "ELEMENT_NO", "element"];

pub static CONDITION_RATING_KEYS: &[&str] = &[
    "CONDITION_RATING",
    "condition_rating",
    "Deck_Condition_Rating",
    "DECK_COND_058",
];

pub static INSPECTION_DATE_KEYS: &[&str] = &[
    "DATE_OF_INSPECT",
    "inspection_date",
    "INSP_DATE",
    "inspection",
];

/// Returns the first value among `keys` that is present in `attributes` and
/// is neither JSON null nor an empty string. Absence is a normal outcome.
pub fn resolve_first<'a>(attributes: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    for key in keys {
        if let Some(value) = attributes.get(*key) {
            match value {
                Value::Null => continue,
                Value::String(s) if s.is_empty() => continue,
                _ => return Some(value),
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_resolve_first_honors_priority_order() {
        let attributes = attrs(json!({
            "bridge_id": "generic",
            "STRUCTURE_NUMBER_008": "B-0451",
        }));
        let resolved = resolve_first(&attributes, STRUCTURE_ID_KEYS);
        assert_eq!(resolved, Some(&json!("B-0451")));
    }

    #[test]
    fn test_resolve_first_skips_null_and_empty() {
        let attributes = attrs(json!({
            "STRUCTURE_NUMBER_008": null,
            "STRUCTURENUMBER": "",
            "structure_id": "17-0002",
        }));
        let resolved = resolve_first(&attributes, STRUCTURE_ID_KEYS);
        assert_eq!(resolved, Some(&json!("17-0002")));
    }

    #[test]
    fn test_resolve_first_keeps_zero() {
        // 0 is a legitimate code, not an absent value
        let attributes = attrs(json!({ "COUNTY_CODE_003": 0 }));
        assert_eq!(resolve_first(&attributes, COUNTY_CODE_KEYS), Some(&json!(0)));
    }

    #[test]
    fn test_resolve_first_absent() {
        let attributes = attrs(json!({ "unrelated": 1 }));
        assert_eq!(resolve_first(&attributes, CONDITION_RATING_KEYS), None);
    }
}
