//! Wait time feed records and the normalized snapshot

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::alerts::rule::MetricKind;

/// One per-port record from the wait time feed.
///
/// Only the fields the engine reads are modelled; everything else in the
/// payload is ignored. A field with an unexpected shape reads as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub port_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub border: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub passenger_vehicle_lanes: Option<LaneGroup>,
    #[serde(default, deserialize_with = "lenient")]
    pub pedestrian_lanes: Option<LaneGroup>,
}

/// Lane group (passenger vehicles or pedestrians)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaneGroup {
    #[serde(default, deserialize_with = "lenient")]
    pub standard_lanes: Option<LaneStatus>,
    #[serde(default, rename = "NEXUS_SENTRI_lanes", deserialize_with = "lenient")]
    pub nexus_sentri_lanes: Option<LaneStatus>,
}

/// Delay reported for one lane type
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaneStatus {
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub delay_minutes: u32,
}

impl PortRecord {
    /// Whether this record is the configured target
    pub fn is_target(&self, port_name: &str, border: &str) -> bool {
        self.port_name.as_deref() == Some(port_name) && self.border.as_deref() == Some(border)
    }

    /// Delay for a lane kind; a missing lane reads as no delay
    pub fn delay(&self, kind: MetricKind) -> u32 {
        let lane = match kind {
            MetricKind::Standard => self
                .passenger_vehicle_lanes
                .as_ref()
                .and_then(|g| g.standard_lanes.as_ref()),
            MetricKind::Sentri => self
                .passenger_vehicle_lanes
                .as_ref()
                .and_then(|g| g.nexus_sentri_lanes.as_ref()),
            MetricKind::Pedestrian => self
                .pedestrian_lanes
                .as_ref()
                .and_then(|g| g.standard_lanes.as_ref()),
        };
        lane.map(|l| l.delay_minutes).unwrap_or(0)
    }
}

/// Decode a feed payload. The payload must be a JSON array; elements that are
/// not records are dropped so one odd entry cannot hide the target crossing.
pub fn parse_records(payload: &[u8]) -> Result<Vec<PortRecord>, serde_json::Error> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(payload)?;
    let total = values.len();

    let records: Vec<PortRecord> = values
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    if records.len() < total {
        tracing::debug!(dropped = total - records.len(), "Ignored malformed feed entries");
    }

    Ok(records)
}

/// Current values for all monitored lanes at one crossing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub port_name: String,
    pub standard: u32,
    pub sentri: u32,
    pub pedestrian: u32,
    pub fetched_at: DateTime<Utc>,
}

impl MetricSnapshot {
    pub fn from_record(port_name: impl Into<String>, record: &PortRecord, fetched_at: DateTime<Utc>) -> Self {
        Self {
            port_name: port_name.into(),
            standard: record.delay(MetricKind::Standard),
            sentri: record.delay(MetricKind::Sentri),
            pedestrian: record.delay(MetricKind::Pedestrian),
            fetched_at,
        }
    }

    /// Value for a lane kind
    pub fn value(&self, kind: MetricKind) -> u32 {
        match kind {
            MetricKind::Standard => self.standard,
            MetricKind::Sentri => self.sentri,
            MetricKind::Pedestrian => self.pedestrian,
        }
    }
}

/// Accept numbers and numeric strings; anything else (empty string, null,
/// text, negative or non-finite numbers) reads as 0, the feed's convention
/// for "no delay".
fn lenient_minutes<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(normalize_minutes(&value))
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

pub(crate) fn normalize_minutes(value: &serde_json::Value) -> u32 {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).unwrap_or(u32::MAX)
            } else if let Some(f) = n.as_f64() {
                from_float(f)
            } else {
                0
            }
        }
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Ok(u) = s.parse::<u32>() {
                u
            } else {
                s.parse::<f64>().map(from_float).unwrap_or(0)
            }
        }
        _ => 0,
    }
}

fn from_float(f: f64) -> u32 {
    if f.is_finite() && f > 0.0 {
        f.trunc().min(u32::MAX as f64) as u32
    } else {
        0
    }
}
