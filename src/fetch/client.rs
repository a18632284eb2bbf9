use async_trait::async_trait;
use serde_json::Value;

use super::FeatureServiceError;

/// Abstraction over one page query against a feature service.
///
/// The production implementation talks HTTP; tests substitute canned pages.
#[async_trait]
pub trait FeatureQuery: Send + Sync {
    /// Fetches the raw JSON page starting at `offset` with at most `count`
    /// records.
    async fn query_page(&self, offset: usize, count: usize) -> Result<Value, FeatureServiceError>;
}
