//! Paginated ingestion from the remote bridge inventory feature service.
//!
//! Walks the service's offset-based pages until it stops signalling
//! `exceededTransferLimit`, accumulating raw features verbatim. Protocol
//! errors are fatal and surface as [`FeatureServiceError`]; retrying is the
//! caller's decision, never done here.

mod client;
mod service;

pub use client::FeatureQuery;
pub use service::{ArcGisQuery, DEFAULT_SERVICE_URL};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// One feature exactly as received from the service: opaque attributes plus
/// an optional geometry. Immutable once archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeature {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Map<String, Value>>,
}

#[derive(Debug, Error)]
pub enum FeatureServiceError {
    /// The page response carried no `features` list. Fatal: the service is
    /// not speaking the expected protocol.
    #[error("feature service response is missing 'features'")]
    MissingFeatures,
    #[error("feature service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feature service page could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Decoded page shape from the query endpoint.
#[derive(Debug, Deserialize)]
struct PageBody {
    features: Option<Vec<RawFeature>>,
    #[serde(default, rename = "exceededTransferLimit")]
    exceeded_transfer_limit: bool,
}

/// Fetches every feature from the service, `batch_size` records per page.
///
/// Stops early once `max_features` is reached, truncating the final page.
///
/// # Errors
///
/// Returns [`FeatureServiceError`] on HTTP failure or a malformed page; the
/// fetch is abandoned at that point and nothing is retried internally.
pub async fn fetch_all<Q: FeatureQuery>(
    query: &Q,
    batch_size: usize,
    max_features: Option<usize>,
) -> Result<Vec<RawFeature>, FeatureServiceError> {
    let mut features: Vec<RawFeature> = Vec::new();
    let mut offset = 0;

    loop {
        let payload = query.query_page(offset, batch_size).await?;
        let page: PageBody = serde_json::from_value(payload)?;
        let batch = page.features.ok_or(FeatureServiceError::MissingFeatures)?;
        debug!(offset, batch_len = batch.len(), "Feature page received");

        features.extend(batch);

        if let Some(cap) = max_features {
            if features.len() >= cap {
                features.truncate(cap);
                return Ok(features);
            }
        }

        if !page.exceeded_transfer_limit {
            break;
        }

        offset += batch_size;
    }

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// Serves a fixed sequence of pages keyed by offset order.
    struct CannedPages(Vec<Value>);

    #[async_trait]
    impl FeatureQuery for CannedPages {
        async fn query_page(
            &self,
            offset: usize,
            count: usize,
        ) -> Result<Value, FeatureServiceError> {
            let index = offset / count;
            Ok(self.0[index].clone())
        }
    }

    fn feature(id: &str) -> Value {
        json!({ "attributes": { "structure_id": id }, "geometry": null })
    }

    #[tokio::test]
    async fn test_fetch_all_walks_pages_until_limit_flag_clears() {
        let query = CannedPages(vec![
            json!({ "features": [feature("a"), feature("b")], "exceededTransferLimit": true }),
            json!({ "features": [feature("c")], "exceededTransferLimit": false }),
        ]);

        let features = fetch_all(&query, 2, None).await.unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[2].attributes["structure_id"], json!("c"));
    }

    #[tokio::test]
    async fn test_fetch_all_truncates_at_max_features() {
        let query = CannedPages(vec![
            json!({ "features": [feature("a"), feature("b")], "exceededTransferLimit": true }),
        ]);

        let features = fetch_all(&query, 2, Some(1)).await.unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].attributes["structure_id"], json!("a"));
    }

    #[tokio::test]
    async fn test_fetch_all_missing_features_is_fatal() {
        let query = CannedPages(vec![json!({ "error": "nope" })]);

        let err = fetch_all(&query, 100, None).await.unwrap_err();
        assert!(matches!(err, FeatureServiceError::MissingFeatures));
    }

    #[tokio::test]
    async fn test_fetch_all_single_page_without_flag() {
        let query = CannedPages(vec![json!({ "features": [feature("a")] })]);

        let features = fetch_all(&query, 100, None).await.unwrap();
        assert_eq!(features.len(), 1);
    }
}
