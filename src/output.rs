//! Processed artifacts: the cleaned CSV and its JSON schema summary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::archive::timestamp_tag;
use crate::normalize::NormalizedBridgeRow;

/// Per-column profile in the schema summary.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FieldSummary {
    /// Sorted runtime type names observed among non-null values.
    pub types: Vec<String>,
    pub non_null: usize,
    pub example: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub record_count: usize,
    pub fields: BTreeMap<String, FieldSummary>,
}

/// Writes rows to CSV in the fixed [`NormalizedBridgeRow`] column order.
pub fn write_csv(rows: &[NormalizedBridgeRow], path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn runtime_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Profiles each canonical column: observed value types, non-null count,
/// and one example value.
pub fn summarize_schema(rows: &[NormalizedBridgeRow]) -> SchemaSummary {
    let mut fields: BTreeMap<String, FieldSummary> = BTreeMap::new();
    let as_values: Vec<Value> = rows
        .iter()
        .map(|row| serde_json::to_value(row).unwrap_or(Value::Null))
        .collect();

    for column in NormalizedBridgeRow::COLUMNS {
        let mut summary = FieldSummary::default();
        let mut types = Vec::new();
        for row in &as_values {
            let value = match row.get(*column) {
                Some(v) => v,
                None => continue,
            };
            if value.is_null() || value.as_str() == Some("") {
                continue;
            }
            summary.non_null += 1;
            if summary.example.is_none() {
                summary.example = Some(value.clone());
            }
            let name = runtime_type_name(value).to_string();
            if !types.contains(&name) {
                types.push(name);
            }
        }
        types.sort();
        summary.types = types;
        fields.insert(column.to_string(), summary);
    }

    SchemaSummary {
        record_count: rows.len(),
        fields,
    }
}

/// Paths written by one processed-artifact pass.
#[derive(Debug)]
pub struct ProcessedPaths {
    pub csv: PathBuf,
    pub schema: PathBuf,
}

/// Persists the cleaned CSV plus schema summary under `processed_dir`.
pub fn persist_processed(
    rows: &[NormalizedBridgeRow],
    processed_dir: &Path,
    prefix: &str,
) -> Result<ProcessedPaths> {
    std::fs::create_dir_all(processed_dir)?;
    let stamp = timestamp_tag();

    let csv_path = processed_dir.join(format!("{prefix}_clean_{stamp}.csv"));
    let schema_path = processed_dir.join(format!("{prefix}_schema_{stamp}.json"));

    write_csv(rows, &csv_path)?;
    let summary = summarize_schema(rows);
    std::fs::write(&schema_path, serde_json::to_string_pretty(&summary)?)?;

    info!(
        csv = %csv_path.display(),
        schema = %schema_path.display(),
        rows = rows.len(),
        "Processed artifacts saved"
    );

    Ok(ProcessedPaths {
        csv: csv_path,
        schema: schema_path,
    })
}
