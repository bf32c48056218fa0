//! Snapshot fetcher for the monitored crossing

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::client::{FetchError, MetricSource};
use super::model::MetricSnapshot;

/// Wraps a [`MetricSource`] and reduces its output to the snapshot of the
/// one configured crossing. Every failure comes back as a [`FetchError`],
/// which the scheduler treats as "feed unavailable this cycle".
pub struct MetricFetcher {
    source: Arc<dyn MetricSource>,
    port_name: String,
    border: String,
}

impl MetricFetcher {
    pub fn new(source: Arc<dyn MetricSource>, port_name: impl Into<String>, border: impl Into<String>) -> Self {
        Self {
            source,
            port_name: port_name.into(),
            border: border.into(),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Fetch and normalize the current snapshot
    pub async fn fetch(&self, now: DateTime<Utc>) -> Result<MetricSnapshot, FetchError> {
        let records = self.source.wait_times().await?;

        let record = records
            .iter()
            .find(|r| r.is_target(&self.port_name, &self.border))
            .ok_or_else(|| FetchError::TargetNotFound {
                port_name: self.port_name.clone(),
                border: self.border.clone(),
            })?;

        let snapshot = MetricSnapshot::from_record(&self.port_name, record, now);

        tracing::debug!(
            port = %snapshot.port_name,
            standard = snapshot.standard,
            sentri = snapshot.sentri,
            pedestrian = snapshot.pedestrian,
            "Fetched wait time snapshot"
        );

        Ok(snapshot)
    }
}
