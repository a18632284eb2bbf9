use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{FeatureQuery, FeatureServiceError};

/// Default public endpoint for the BTS bridge inventory layer.
pub const DEFAULT_SERVICE_URL: &str = "https://services.arcgis.com/VTyQ9soqVUKDOhoj/ArcGIS/rest/services/Bridge_Inventory/FeatureServer/0";

/// [`FeatureQuery`] backed by an ArcGIS feature service query endpoint.
pub struct ArcGisQuery {
    client: reqwest::Client,
    service_url: String,
}

impl ArcGisQuery {
    pub fn new(service_url: &str) -> Result<Self, FeatureServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            service_url: service_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FeatureQuery for ArcGisQuery {
    async fn query_page(&self, offset: usize, count: usize) -> Result<Value, FeatureServiceError> {
        let url = format!("{}/query", self.service_url);
        debug!(%url, offset, count, "Requesting feature page");

        let offset_param = offset.to_string();
        let count_param = count.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("f", "json"),
                ("where", "1=1"),
                ("outFields", "*"),
                ("resultOffset", offset_param.as_str()),
                ("resultRecordCount", count_param.as_str()),
                ("outSR", "4326"),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}
