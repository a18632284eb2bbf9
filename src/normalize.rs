//! Converts raw service features into canonical tabular rows.
//!
//! Normalization never fails: any value the coercers cannot make sense of
//! becomes `None` and the row is still emitted. A partially-known record is
//! more useful downstream than a dropped one.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fetch::RawFeature;
use crate::schema;

/// Canonical bridge record. Field declaration order doubles as the CSV
/// column order of the processed artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBridgeRow {
    pub structure_id: Option<String>,
    pub state_code: Option<String>,
    pub county_code: Option<String>,
    pub element_code: Option<String>,
    pub condition_rating: Option<f64>,
    /// ISO date string (`YYYY-MM-DD`).
    pub inspection_date: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NormalizedBridgeRow {
    /// Column names in artifact order.
    pub const COLUMNS: &'static [&'static str] = &[
        "structure_id",
        "state_code",
        "county_code",
        "element_code",
        "condition_rating",
        "inspection_date",
        "latitude",
        "longitude",
    ];
}

/// Date formats seen across inventory vintages, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

/// Coerces a raw value into an ISO date string.
///
/// Numbers are epoch milliseconds (the feature service convention); strings
/// are tried against each known format. Anything else is `None`.
pub fn coerce_date(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            let millis = n.as_f64()?;
            if !millis.is_finite() {
                return None;
            }
            DateTime::from_timestamp_millis(millis as i64)
                .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
        }
        Value::String(s) => {
            let text = s.trim();
            if text.is_empty() {
                return None;
            }
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(|d| d.format("%Y-%m-%d").to_string())
        }
        _ => None,
    }
}

/// Coerces a numeric or numeric-string value to `f64`, rejecting NaN.
pub fn coerce_float(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.is_nan() { None } else { Some(number) }
}

/// Renders a scalar code value (string or number) as a string.
fn coerce_code(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coord(geometry: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    schema::resolve_first(geometry, keys).and_then(coerce_float)
}

/// Flattens one raw feature into a [`NormalizedBridgeRow`].
pub fn normalize(feature: &RawFeature) -> NormalizedBridgeRow {
    let attrs = &feature.attributes;
    let empty = Map::new();
    let geometry = feature.geometry.as_ref().unwrap_or(&empty);

    NormalizedBridgeRow {
        structure_id: schema::resolve_first(attrs, schema::STRUCTURE_ID_KEYS)
            .and_then(coerce_code),
        state_code: schema::resolve_first(attrs, schema::STATE_CODE_KEYS).and_then(coerce_code),
        county_code: schema::resolve_first(attrs, schema::COUNTY_CODE_KEYS).and_then(coerce_code),
        element_code: schema::resolve_first(attrs, schema::ELEMENT_CODE_KEYS).and_then(coerce_code),
        condition_rating: schema::resolve_first(attrs, schema::CONDITION_RATING_KEYS)
            .and_then(coerce_float),
        inspection_date: schema::resolve_first(attrs, schema::INSPECTION_DATE_KEYS)
            .and_then(coerce_date),
        latitude: coord(geometry, &["y", "lat"]),
        longitude: coord(geometry, &["x", "lon"]),
    }
}

/// Normalizes a whole fetched batch, emitting one row per feature.
pub fn normalize_all(features: &[RawFeature]) -> Vec<NormalizedBridgeRow> {
    features.iter().map(normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(attributes: Value, geometry: Value) -> RawFeature {
        serde_json::from_value(json!({ "attributes": attributes, "geometry": geometry })).unwrap()
    }

    #[test]
    fn test_epoch_millis_and_iso_string_agree() {
        // 2021-06-01T00:00:00Z in epoch milliseconds
        let from_millis = coerce_date(&json!(1622505600000i64));
        let from_string = coerce_date(&json!("2021-06-01"));
        assert_eq!(from_millis, Some("2021-06-01".to_string()));
        assert_eq!(from_millis, from_string);
    }

    #[test]
    fn test_all_date_formats_accepted() {
        for text in ["2023-04-09", "2023/04/09", "04/09/2023", "20230409"] {
            assert_eq!(coerce_date(&json!(text)), Some("2023-04-09".to_string()), "{text}");
        }
    }

    #[test]
    fn test_garbage_date_is_none() {
        assert_eq!(coerce_date(&json!("not a date")), None);
        assert_eq!(coerce_date(&json!(true)), None);
    }

    #[test]
    fn test_coerce_float_accepts_numeric_strings_rejects_nan() {
        assert_eq!(coerce_float(&json!("4.5")), Some(4.5));
        assert_eq!(coerce_float(&json!(7)), Some(7.0));
        assert_eq!(coerce_float(&json!("NaN")), None);
        assert_eq!(coerce_float(&json!("six")), None);
    }

    #[test]
    fn test_normalize_full_feature() {
        let feature = raw(
            json!({
                "STRUCTURE_NUMBER_008": "B-12",
                "STATE_CODE_001": 17,
                "CONDITION_RATING": "4",
                "DATE_OF_INSPECT": 1622505600000i64,
            }),
            json!({ "x": -87.6, "y": 41.8 }),
        );

        let row = normalize(&feature);
        assert_eq!(row.structure_id.as_deref(), Some("B-12"));
        assert_eq!(row.state_code.as_deref(), Some("17"));
        assert_eq!(row.condition_rating, Some(4.0));
        assert_eq!(row.inspection_date.as_deref(), Some("2021-06-01"));
        assert_eq!(row.latitude, Some(41.8));
        assert_eq!(row.longitude, Some(-87.6));
    }

    #[test]
    fn test_normalize_emits_row_for_unparseable_input() {
        let feature = raw(
            json!({ "CONDITION_RATING": "poor", "DATE_OF_INSPECT": "sometime" }),
            Value::Null,
        );

        let row = normalize(&feature);
        assert_eq!(row.condition_rating, None);
        assert_eq!(row.inspection_date, None);
        assert_eq!(row.latitude, None);
        // the row itself still exists with whatever could be salvaged
        assert_eq!(row, NormalizedBridgeRow::default());
    }

    #[test]
    fn test_normalize_geometry_aliases() {
        let feature = raw(json!({}), json!({ "lon": -90.2, "lat": 38.6 }));
        let row = normalize(&feature);
        assert_eq!(row.longitude, Some(-90.2));
        assert_eq!(row.latitude, Some(38.6));
    }
}
