//! Verbatim archiving of fetched raw features.
//!
//! Every batch is persisted before normalization runs, so a normalization
//! failure can never lose source data. Archive files are timestamp-tagged
//! and created with `create_new`: the raw directory is append-only.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::fetch::RawFeature;

/// GeoJSON envelope for the raw archive. Geometry passes through untouched.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<RawFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<RawFeature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}

/// Paths written by one archive pass.
#[derive(Debug)]
pub struct ArchivePaths {
    pub geojson: PathBuf,
    pub parquet: Option<PathBuf>,
}

/// UTC tag used to keep archive filenames unique and sortable.
pub(crate) fn timestamp_tag() -> String {
    Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}

fn create_new(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("refusing to overwrite archive file {}", path.display()))
}

/// Writes the full feature list as a GeoJSON `FeatureCollection`.
pub fn write_geojson(features: &[RawFeature], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(create_new(path)?);
    let collection = FeatureCollection::new(features.to_vec());
    serde_json::to_writer_pretty(&mut writer, &collection)?;
    writer.flush()?;
    Ok(())
}

/// Reads a GeoJSON archive back into its raw feature list.
pub fn read_geojson(path: &Path) -> Result<Vec<RawFeature>> {
    let text = std::fs::read_to_string(path)?;
    let collection: FeatureCollection = serde_json::from_str(&text)?;
    Ok(collection.features)
}

/// Archives a fetched batch under `raw_dir`, returning the written paths.
///
/// The columnar snapshot is best-effort: when the crate is built without the
/// `parquet` feature it is skipped with a warning, never an error.
pub fn archive_raw(features: &[RawFeature], raw_dir: &Path, prefix: &str) -> Result<ArchivePaths> {
    std::fs::create_dir_all(raw_dir)?;
    let stamp = timestamp_tag();

    let geojson = raw_dir.join(format!("{prefix}_{stamp}.geojson"));
    write_geojson(features, &geojson)?;
    info!(path = %geojson.display(), count = features.len(), "Raw GeoJSON archived");

    let parquet = columnar::write_snapshot(features, &raw_dir.join(format!("{prefix}_{stamp}.parquet")))?;

    Ok(ArchivePaths { geojson, parquet })
}

#[cfg(feature = "parquet")]
mod columnar {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use serde_json::Value;

    /// Flattened attribute columns plus the geometry as one JSON-string
    /// column. Columns where every present value is numeric become Float64;
    /// everything else is rendered as strings.
    pub fn write_snapshot(features: &[RawFeature], path: &Path) -> Result<Option<PathBuf>> {
        if features.is_empty() {
            info!("No features fetched; skipping columnar snapshot");
            return Ok(None);
        }

        let mut columns: BTreeMap<String, Vec<Option<Value>>> = BTreeMap::new();
        for (index, feature) in features.iter().enumerate() {
            for (key, value) in &feature.attributes {
                let series = columns
                    .entry(key.clone())
                    .or_insert_with(|| vec![None; features.len()]);
                series[index] = Some(value.clone());
            }
            let geometry = feature
                .geometry
                .as_ref()
                .map(|g| Value::String(serde_json::to_string(g).unwrap_or_default()));
            columns
                .entry("geometry".to_string())
                .or_insert_with(|| vec![None; features.len()])[index] = geometry;
        }

        let mut fields = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();
        for (name, series) in &columns {
            let numeric = series
                .iter()
                .flatten()
                .all(|v| matches!(v, Value::Number(_)));
            if numeric {
                let array: Float64Array = series
                    .iter()
                    .map(|v| v.as_ref().and_then(Value::as_f64))
                    .collect();
                fields.push(Field::new(name.clone(), DataType::Float64, true));
                arrays.push(Arc::new(array));
            } else {
                let array: StringArray = series
                    .iter()
                    .map(|v| {
                        v.as_ref().map(|value| match value {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                    })
                    .collect();
                fields.push(Field::new(name.clone(), DataType::Utf8, true));
                arrays.push(Arc::new(array));
            }
        }

        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;
        let file = create_new(path)?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;
        info!(path = %path.display(), "Columnar snapshot archived");
        Ok(Some(path.to_path_buf()))
    }
}

#[cfg(not(feature = "parquet"))]
mod columnar {
    use super::*;
    use tracing::warn;

    pub fn write_snapshot(_features: &[RawFeature], path: &Path) -> Result<Option<PathBuf>> {
        warn!(
            path = %path.display(),
            "Built without the 'parquet' feature; skipping columnar snapshot"
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::env;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("bridgewatch_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_features() -> Vec<RawFeature> {
        serde_json::from_value(json!([
            { "attributes": { "STRUCTURE_NUMBER_008": "B-1", "CONDITION_RATING": 4 },
              "geometry": { "x": -87.6, "y": 41.8 } },
            { "attributes": { "STRUCTURE_NUMBER_008": "B-2" }, "geometry": null },
        ]))
        .unwrap()
    }

    #[test]
    fn test_geojson_round_trip_is_lossless() {
        let dir = temp_dir("geojson_round_trip");
        let path = dir.join("inventory.geojson");
        let features = sample_features();

        write_geojson(&features, &path).unwrap();
        let restored = read_geojson(&path).unwrap();

        assert_eq!(restored, features);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_geojson_refuses_overwrite() {
        let dir = temp_dir("geojson_no_overwrite");
        let path = dir.join("inventory.geojson");
        let features = sample_features();

        write_geojson(&features, &path).unwrap();
        assert!(write_geojson(&features, &path).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_archive_raw_writes_tagged_geojson() {
        let dir = temp_dir("archive_raw");
        let paths = archive_raw(&sample_features(), &dir, "bridge_inventory").unwrap();

        let name = paths.geojson.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("bridge_inventory_"));
        assert!(name.ends_with(".geojson"));
        assert!(paths.geojson.exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
