//! Alert rule types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert rule as held by the rule store.
///
/// `metric_kind` and `condition` are kept as raw strings because records
/// written by other tools may carry values this engine does not know. They
/// are parsed into [`MetricKind`] and [`Condition`] at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    /// Unique rule ID, assigned by the store
    pub id: u64,
    /// Lane type the rule watches
    #[serde(rename = "type")]
    pub metric_kind: String,
    /// "below" or "above"
    pub condition: String,
    /// Threshold in minutes
    #[serde(rename = "waitTime")]
    pub threshold: i64,
    /// E-mail recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Carrier e-mail-to-SMS address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms_email: Option<String>,
    /// Inactive rules are never evaluated
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl AlertRule {
    /// Create an active rule with an e-mail target
    pub fn new(
        id: u64,
        metric_kind: impl Into<String>,
        condition: impl Into<String>,
        threshold: i64,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id,
            metric_kind: metric_kind.into(),
            condition: condition.into(),
            threshold,
            email: Some(email.into()),
            sms_email: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Set the SMS gateway address
    pub fn with_sms(mut self, sms_email: impl Into<String>) -> Self {
        self.sms_email = Some(sms_email.into());
        self
    }

    /// Replace the e-mail target
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// Set active state
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// E-mail target, if set and non-blank
    pub fn email_target(&self) -> Option<&str> {
        non_blank(self.email.as_deref())
    }

    /// SMS target, if set and non-blank
    pub fn sms_target(&self) -> Option<&str> {
        non_blank(self.sms_email.as_deref())
    }

    /// Whether at least one delivery target is present
    pub fn has_target(&self) -> bool {
        self.email_target().is_some() || self.sms_target().is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Monitored lane type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Standard,
    Sentri,
    Pedestrian,
}

impl MetricKind {
    /// Human-readable lane label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Standard => "Standard Vehicles",
            MetricKind::Sentri => "SENTRI Lanes",
            MetricKind::Pedestrian => "Pedestrian",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Standard => "standard",
            MetricKind::Sentri => "sentri",
            MetricKind::Pedestrian => "pedestrian",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(MetricKind::Standard),
            "sentri" => Ok(MetricKind::Sentri),
            "pedestrian" => Ok(MetricKind::Pedestrian),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Comparison applied to the current value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// Match when value <= threshold
    Below,
    /// Match when value >= threshold
    Above,
}

impl Condition {
    /// Both directions include the threshold itself.
    pub fn matches(&self, value: i64, threshold: i64) -> bool {
        match self {
            Condition::Below => value <= threshold,
            Condition::Above => value >= threshold,
        }
    }

    /// Direction word used in messages
    pub fn phrase(&self) -> &'static str {
        match self {
            Condition::Below => "below",
            Condition::Above => "above",
        }
    }
}

impl FromStr for Condition {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "below" => Ok(Condition::Below),
            "above" => Ok(Condition::Above),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// A string that did not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value '{0}'")]
pub struct UnknownValue(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_builder() {
        let rule = AlertRule::new(7, "sentri", "above", 45, "a@x.com").with_sms("5551234567@txt.example");

        assert_eq!(rule.id, 7);
        assert!(rule.active);
        assert_eq!(rule.email_target(), Some("a@x.com"));
        assert_eq!(rule.sms_target(), Some("5551234567@txt.example"));
        assert!(rule.has_target());
    }

    #[test]
    fn test_blank_targets_do_not_count() {
        let rule = AlertRule::new(1, "standard", "below", 30, "   ");
        assert_eq!(rule.email_target(), None);
        assert!(!rule.has_target());
    }

    #[test]
    fn test_condition_is_inclusive() {
        assert!(Condition::Below.matches(30, 30));
        assert!(Condition::Below.matches(29, 30));
        assert!(!Condition::Below.matches(31, 30));

        assert!(Condition::Above.matches(30, 30));
        assert!(Condition::Above.matches(31, 30));
        assert!(!Condition::Above.matches(29, 30));
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!("pedestrian".parse::<MetricKind>(), Ok(MetricKind::Pedestrian));
        assert_eq!(
            "bicycle".parse::<MetricKind>(),
            Err(UnknownValue("bicycle".to_string()))
        );
        assert!("sideways".parse::<Condition>().is_err());
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::json!({
            "id": 3,
            "type": "standard",
            "condition": "below",
            "waitTime": 20,
            "email": "a@x.com",
            "smsEmail": "1@sms.example",
            "created": "2024-05-01T12:00:00Z"
        });
        let rule: AlertRule = serde_json::from_value(json).unwrap();
        assert_eq!(rule.metric_kind, "standard");
        assert_eq!(rule.threshold, 20);
        assert_eq!(rule.sms_email.as_deref(), Some("1@sms.example"));
        assert!(rule.active);
    }
}
