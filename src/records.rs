//! The working-set record passed through the triage pipeline.
//!
//! [`BridgeRecord`] keeps the fields the pipeline actually reads as typed
//! optionals and shunts everything else into an extra-attributes map, so
//! unknown source columns survive a round trip without costing type safety.
//! Alias resolution (e.g. `condition_rating` before `condition`) lives in
//! the accessors; each priority list exists in exactly one place.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::normalize::coerce_float;

/// Accepts numbers, numeric strings, or null; parse failures become `None`
/// rather than a deserialization error (CSV sources carry only strings).
fn de_lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_float))
}

/// Accepts strings or scalar numbers, rendering numbers as strings.
fn de_lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeRecord {
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub structure_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub condition_rating: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub next_inspection_due: Option<String>,
    #[serde(default)]
    pub last_inspection_date: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub longitude: Option<f64>,
    /// Source columns the pipeline does not model, kept for forward
    /// compatibility and alias lookups.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl BridgeRecord {
    /// The identifier the lifecycle aggregator keys on. Falls back through
    /// the known id aliases and lands on `"unknown"` when none is present.
    pub fn bridge_id(&self) -> String {
        if let Some(id) = self.extra.get("bridge_id").and_then(scalar_string) {
            return id;
        }
        if let Some(id) = non_empty(&self.structure_id) {
            return id.to_string();
        }
        for key in ["id", "structure_number", "structure_num"] {
            if let Some(id) = self.extra.get(key).and_then(scalar_string) {
                return id;
            }
        }
        "unknown".to_string()
    }

    /// Resolved condition score: `condition_rating` before the `condition`
    /// alias, never both.
    pub fn condition_score(&self) -> Option<f64> {
        self.condition_rating
            .or_else(|| self.extra.get("condition").and_then(coerce_float))
    }

    /// Resolved risk label: `risk_level` before the `risk` alias.
    pub fn risk_label(&self) -> Option<String> {
        non_empty(&self.risk_level)
            .map(str::to_string)
            .or_else(|| self.extra.get("risk").and_then(scalar_string))
    }

    pub fn display_name(&self) -> Option<String> {
        non_empty(&self.name)
            .map(str::to_string)
            .or_else(|| self.extra.get("bridge_name").and_then(scalar_string))
    }

    /// `(longitude, latitude)` with coordinate aliases resolved.
    pub fn coords(&self) -> (Option<f64>, Option<f64>) {
        let lng = self.longitude.or_else(|| {
            ["lng", "lon"]
                .iter()
                .find_map(|key| self.extra.get(*key).and_then(coerce_float))
        });
        let lat = self
            .latitude
            .or_else(|| self.extra.get("lat").and_then(coerce_float));
        (lng, lat)
    }

    /// Raw value of the next-due field, `next_inspection_due` before the
    /// `next_inspection_date` alias.
    pub fn next_due_raw(&self) -> Option<Value> {
        non_empty(&self.next_inspection_due)
            .map(|s| Value::String(s.to_string()))
            .or_else(|| {
                self.extra
                    .get("next_inspection_date")
                    .filter(|v| !v.is_null() && v.as_str() != Some(""))
                    .cloned()
            })
    }

    pub fn last_inspection_raw(&self) -> Option<Value> {
        non_empty(&self.last_inspection_date).map(|s| Value::String(s.to_string()))
    }
}

fn newest_data_file(directory: &Path) -> Result<Option<PathBuf>> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json") || e.eq_ignore_ascii_case("csv"));
        if !matches {
            continue;
        }
        // schema summaries live beside the data files; they are not records
        let is_schema = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.contains("_schema"));
        if is_schema {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().is_none_or(|(when, _)| modified >= *when) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

fn load_csv(path: &Path) -> Result<Vec<BridgeRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut object = Map::new();
        for (header, field) in headers.iter().zip(row.iter()) {
            object.insert(header.to_string(), Value::String(field.to_string()));
        }
        records.push(serde_json::from_value(Value::Object(object))?);
    }
    Ok(records)
}

/// Loads the working set from the newest JSON or CSV file in `directory`.
///
/// A missing directory or the absence of candidate files is an empty set,
/// not an error. A present file that cannot be parsed is an error; whether
/// to continue with nothing is the caller's decision.
pub fn load_working_set(directory: &Path) -> Result<Vec<BridgeRecord>> {
    if !directory.exists() {
        debug!(dir = %directory.display(), "Working-set directory absent");
        return Ok(Vec::new());
    }

    let Some(path) = newest_data_file(directory)? else {
        debug!(dir = %directory.display(), "No JSON or CSV files in working-set directory");
        return Ok(Vec::new());
    };

    debug!(file = %path.display(), "Loading working set");
    if path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
    {
        let text = std::fs::read_to_string(&path)?;
        serde_json::from_str(&text)
            .with_context(|| format!("unparseable working set {}", path.display()))
    } else {
        load_csv(&path).with_context(|| format!("unparseable working set {}", path.display()))
    }
}
