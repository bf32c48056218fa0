use std::time::Duration;

use async_trait::async_trait;

use super::model::{parse_records, PortRecord};

/// Source of per-port wait time records
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Fetch the full collection of port records
    async fn wait_times(&self) -> Result<Vec<PortRecord>, FetchError>;
}

/// Client for the public border wait time endpoint
#[derive(Debug, Clone)]
pub struct HttpMetricSource {
    http_client: reqwest::Client,
    url: String,
}

impl HttpMetricSource {
    /// Build a client with a bounded per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("borderwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    async fn wait_times(&self) -> Result<Vec<PortRecord>, FetchError> {
        let response = self.http_client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(e.to_string())
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(e.to_string())
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        parse_records(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Reasons the feed is unavailable for a cycle
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Feed returned status {0}")]
    Status(u16),

    #[error("Malformed payload: {0}")]
    Decode(String),

    #[error("Target '{port_name}' ({border}) not found in feed")]
    TargetNotFound { port_name: String, border: String },
}
