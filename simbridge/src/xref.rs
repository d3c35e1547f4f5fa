//! Aircraft cross-reference lookups against the fleet database service.
//!
//! Maps the free-form aircraft title a backend reports to structured fleet
//! records. Lookups are best-effort enrichment: any transport or decode
//! failure is logged and surfaces as an empty result set, never as an error
//! the caller must handle.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// One fleet database record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AircraftXref {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub icao_type: String,
}

#[derive(Debug, Error)]
pub enum XrefError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// HTTP client for the cross-reference service.
pub struct XrefClient {
    client: reqwest::Client,
    base_url: String,
}

impl XrefClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, XrefError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| XrefError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Records matching an aircraft title, best match first.
    ///
    /// Returns an empty vec on any failure.
    pub async fn by_name(&self, title: &str) -> Vec<AircraftXref> {
        self.fetch("aircraft", &[("name", title)]).await
    }

    /// The record with a specific fleet id, as a zero-or-one element vec.
    pub async fn by_id(&self, id: u32) -> Vec<AircraftXref> {
        self.fetch("aircraft", &[("id", &id.to_string())]).await
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> Vec<AircraftXref> {
        let url = format!("{}/{path}", self.base_url);
        let response = match self.client.get(&url).query(query).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %url, error = %err, "Cross-reference request failed");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), "Cross-reference request rejected");
            return Vec::new();
        }

        match response.json::<Vec<AircraftXref>>().await {
            Ok(records) => {
                debug!(url = %url, count = records.len(), "Cross-reference lookup complete");
                records
            }
            Err(err) => {
                warn!(url = %url, error = %err, "Cross-reference response undecodable");
                Vec::new()
            }
        }
    }
}
