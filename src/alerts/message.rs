//! Message templates for each delivery channel

use chrono::{DateTime, Utc};

use super::evaluator::RuleMatch;
use super::rule::{AlertRule, Condition, MetricKind};

/// A message ready for a gateway
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

/// Fixed values shared by every message
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub crossing: String,
    pub dashboard_url: String,
}

impl MessageContext {
    /// Alert e-mail for a matched rule
    pub fn alert_email(&self, matched: &RuleMatch, checked_at: DateTime<Utc>) -> RenderedMessage {
        let label = matched.kind.label();
        let subject = format!("Border Alert: {} Wait Time is now {} minutes", label, matched.value);

        let body = format!(
            r#"<div style="font-family: sans-serif; padding: 20px;">
  <h2>Border Alert Notification</h2>
  <p>Your border wait time alert condition has been met.</p>
  <ul>
    <li><strong>Border Crossing:</strong> {crossing}</li>
    <li><strong>Type:</strong> {label}</li>
    <li><strong>Current Wait Time:</strong> {value} minutes</li>
    <li><strong>Your Alert Condition:</strong> When wait time is {phrase} {threshold} minutes</li>
    <li><strong>Check Time:</strong> {checked}</li>
  </ul>
  <p>To view current wait times, visit <a href="{url}">Border Alerts Dashboard</a></p>
</div>"#,
            crossing = self.crossing,
            label = label,
            value = matched.value,
            phrase = matched.condition.phrase(),
            threshold = matched.rule.threshold,
            checked = checked_at.format("%Y-%m-%d %H:%M:%S UTC"),
            url = self.dashboard_url,
        );

        RenderedMessage {
            subject,
            body,
            is_html: true,
        }
    }

    /// Short SMS text for a matched rule
    pub fn alert_sms(&self, matched: &RuleMatch) -> RenderedMessage {
        RenderedMessage {
            subject: "Border Alert".to_string(),
            body: format!(
                "Border Alert: {} wait time is now {} minutes ({} {} min threshold).",
                matched.kind.label(),
                matched.value,
                matched.condition.phrase(),
                matched.rule.threshold
            ),
            is_html: false,
        }
    }

    /// Confirmation sent when a rule is registered
    pub fn confirmation_email(&self, rule: &AlertRule) -> RenderedMessage {
        let label = describe_kind(&rule.metric_kind);
        let direction = match rule.condition.parse::<Condition>() {
            Ok(Condition::Below) => "falls below",
            Ok(Condition::Above) => "rises above",
            Err(_) => rule.condition.as_str(),
        };

        let body = format!(
            r#"<div style="font-family: sans-serif; padding: 20px;">
  <h2>Border Alert Created</h2>
  <p>You have successfully created a border wait time alert.</p>
  <ul>
    <li><strong>Border Crossing:</strong> {crossing}</li>
    <li><strong>Type:</strong> {label}</li>
    <li><strong>Condition:</strong> When wait time {direction} {threshold} minutes</li>
    <li><strong>Created:</strong> {created}</li>
  </ul>
  <p>You will receive an alert when the specified condition is met.</p>
  <p><a href="{url}">View your notifications</a></p>
</div>"#,
            crossing = self.crossing,
            label = label,
            direction = direction,
            threshold = rule.threshold,
            created = rule.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            url = self.dashboard_url,
        );

        RenderedMessage {
            subject: "Border Alert Notification Created".to_string(),
            body,
            is_html: true,
        }
    }

    /// Plain test message, one per channel
    pub fn test_message(&self, rule: &AlertRule) -> RenderedMessage {
        RenderedMessage {
            subject: "Border Alert Test".to_string(),
            body: format!(
                "Test notification for rule {} ({} at {}). Delivery is working.",
                rule.id,
                describe_kind(&rule.metric_kind),
                self.crossing
            ),
            is_html: false,
        }
    }
}

fn describe_kind(raw: &str) -> String {
    raw.parse::<MetricKind>()
        .map(|k| k.label().to_string())
        .unwrap_or_else(|_| raw.to_string())
}
