//! Notification dispatch for matched rules

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::dedup::DedupGate;
use super::evaluator::RuleMatch;
use super::message::{MessageContext, RenderedMessage};
use super::rule::AlertRule;
use crate::gateway::{GatewayError, NotificationGateway, SendReceipt};
use crate::stats::DeliveryStats;

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Email => f.write_str("email"),
            Channel::Sms => f.write_str("sms"),
        }
    }
}

/// Summary of one dispatch pass
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Matches that passed the dedup gate
    pub allowed: usize,
    /// Matches held back by the dedup gate
    pub suppressed: usize,
    /// Successful channel deliveries
    pub sent: usize,
    pub failures: Vec<DispatchError>,
}

/// Outcome of a single channel delivery
#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub to: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Renders messages and hands them to the gateways, one rule at a time
pub struct Dispatcher {
    email: Arc<dyn NotificationGateway>,
    sms: Arc<dyn NotificationGateway>,
    context: MessageContext,
    stats: Arc<DeliveryStats>,
}

impl Dispatcher {
    pub fn new(
        email: Arc<dyn NotificationGateway>,
        sms: Arc<dyn NotificationGateway>,
        context: MessageContext,
        stats: Arc<DeliveryStats>,
    ) -> Self {
        Self {
            email,
            sms,
            context,
            stats,
        }
    }

    pub fn context(&self) -> &MessageContext {
        &self.context
    }

    /// Notify every match the dedup gate allows.
    ///
    /// The gate entry is written before any send, so a failed delivery still
    /// consumes the cool-down. Failures are recorded and never stop the
    /// remaining matches.
    pub async fn dispatch(&self, matches: &[RuleMatch], dedup: &mut DedupGate, now: DateTime<Utc>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for matched in matches {
            let rule_id = matched.rule.id;

            if !dedup.allow(rule_id, now) {
                tracing::info!(rule_id, "Skipping notification - already sent recently");
                self.stats.record_suppressed();
                report.suppressed += 1;
                continue;
            }
            report.allowed += 1;

            if let Some(to) = matched.rule.email_target() {
                let message = self.context.alert_email(matched, now);
                self.deliver_counted(Channel::Email, &matched.rule, to, &message, now, &mut report)
                    .await;
            }

            if let Some(to) = matched.rule.sms_target() {
                let message = self.context.alert_sms(matched);
                self.deliver_counted(Channel::Sms, &matched.rule, to, &message, now, &mut report)
                    .await;
            }
        }

        report
    }

    /// Send a test message to every target of a rule, bypassing the dedup
    /// gate and the delivery counters
    pub async fn send_test(&self, rule: &AlertRule) -> Vec<ChannelOutcome> {
        let message = self.context.test_message(rule);
        let mut outcomes = Vec::new();

        let targets = [
            (Channel::Email, rule.email_target()),
            (Channel::Sms, rule.sms_target()),
        ];
        for (channel, target) in targets {
            if let Some(to) = target {
                let result = self.deliver(channel, to, &message).await;
                outcomes.push(outcome(channel, to, result));
            }
        }

        outcomes
    }

    /// Send the registration confirmation e-mail. Best effort: the caller
    /// logs and ignores failures.
    pub async fn send_confirmation(&self, rule: &AlertRule) -> Option<ChannelOutcome> {
        let to = rule.email_target()?;
        let message = self.context.confirmation_email(rule);
        let result = self.deliver(Channel::Email, to, &message).await;
        Some(outcome(Channel::Email, to, result))
    }

    async fn deliver_counted(
        &self,
        channel: Channel,
        rule: &AlertRule,
        to: &str,
        message: &RenderedMessage,
        now: DateTime<Utc>,
        report: &mut DispatchReport,
    ) {
        match self.deliver(channel, to, message).await {
            Ok(receipt) => {
                tracing::info!(
                    rule_id = rule.id,
                    metric_kind = %rule.metric_kind,
                    channel = %channel,
                    to = %to,
                    message_id = receipt.message_id.as_deref().unwrap_or("-"),
                    "Notification sent"
                );
                self.stats.record_sent();
                report.sent += 1;
            }
            Err(e) => {
                let error = DispatchError {
                    rule_id: rule.id,
                    channel,
                    source: e,
                };
                tracing::error!(
                    rule_id = rule.id,
                    metric_kind = %rule.metric_kind,
                    channel = %channel,
                    error = %error.source,
                    "Failed to send notification"
                );
                self.stats.record_delivery_failure(error.to_string(), now);
                report.failures.push(error);
            }
        }
    }

    /// One gateway call; a non-success receipt is reported as an error
    async fn deliver(&self, channel: Channel, to: &str, message: &RenderedMessage) -> Result<SendReceipt, GatewayError> {
        let gateway = match channel {
            Channel::Email => &self.email,
            Channel::Sms => &self.sms,
        };

        let receipt = gateway
            .send(to, &message.subject, &message.body, message.is_html)
            .await?;

        if receipt.success {
            Ok(receipt)
        } else {
            Err(GatewayError::NotAccepted(format!("{} gateway reported failure", gateway.name())))
        }
    }
}

fn outcome(channel: Channel, to: &str, result: Result<SendReceipt, GatewayError>) -> ChannelOutcome {
    match result {
        Ok(receipt) => ChannelOutcome {
            channel,
            to: to.to_string(),
            success: true,
            message_id: receipt.message_id,
            error: None,
        },
        Err(e) => ChannelOutcome {
            channel,
            to: to.to_string(),
            success: false,
            message_id: None,
            error: Some(e.to_string()),
        },
    }
}

/// A failed delivery for one rule and channel
#[derive(Debug, Clone, thiserror::Error)]
#[error("Rule {rule_id} via {channel}: {source}")]
pub struct DispatchError {
    pub rule_id: u64,
    pub channel: Channel,
    #[source]
    pub source: GatewayError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::rule::{Condition, MetricKind};
    use crate::gateway::testing::RecordingGateway;
    use chrono::{Duration, TimeZone};

    struct Fixture {
        email: Arc<RecordingGateway>,
        sms: Arc<RecordingGateway>,
        stats: Arc<DeliveryStats>,
        dispatcher: Dispatcher,
    }

    fn fixture() -> Fixture {
        let email = Arc::new(RecordingGateway::new());
        let sms = Arc::new(RecordingGateway::new());
        let stats = Arc::new(DeliveryStats::new());
        let dispatcher = Dispatcher::new(
            email.clone(),
            sms.clone(),
            MessageContext {
                crossing: "San Ysidro".to_string(),
                dashboard_url: "http://localhost/alerts".to_string(),
            },
            stats.clone(),
        );
        Fixture {
            email,
            sms,
            stats,
            dispatcher,
        }
    }

    fn matched(rule: AlertRule, value: u32) -> RuleMatch {
        RuleMatch {
            kind: rule.metric_kind.parse::<MetricKind>().unwrap(),
            condition: rule.condition.parse::<Condition>().unwrap(),
            rule,
            value,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_sends_each_configured_channel() {
        let f = fixture();
        let rule = AlertRule::new(1, "standard", "below", 30, "a@x.com").with_sms("555@sms.example");
        let mut dedup = DedupGate::new();

        let report = f.dispatcher.dispatch(&[matched(rule, 25)], &mut dedup, t0()).await;

        assert_eq!(report.allowed, 1);
        assert_eq!(report.sent, 2);
        assert!(report.failures.is_empty());

        let email = f.email.sent();
        assert_eq!(email.len(), 1);
        assert!(email[0].is_html);
        assert_eq!(email[0].subject, "Border Alert: Standard Vehicles Wait Time is now 25 minutes");

        let sms = f.sms.sent();
        assert_eq!(sms.len(), 1);
        assert!(!sms[0].is_html);
        assert_eq!(sms[0].to, "555@sms.example");

        assert_eq!(f.stats.snapshot().sent, 2);
    }

    #[tokio::test]
    async fn test_sms_only_rule() {
        let f = fixture();
        let rule = AlertRule::new(1, "standard", "below", 30, "a@x.com")
            .with_email(None)
            .with_sms("555@sms.example");
        let mut dedup = DedupGate::new();

        f.dispatcher.dispatch(&[matched(rule, 10)], &mut dedup, t0()).await;

        assert!(f.email.sent().is_empty());
        assert_eq!(f.sms.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_rules() {
        let f = fixture();
        f.email.fail_for("a@x.com");
        let rule_a = AlertRule::new(1, "standard", "below", 30, "a@x.com");
        let rule_b = AlertRule::new(2, "standard", "below", 30, "b@x.com");
        let mut dedup = DedupGate::new();

        let report = f
            .dispatcher
            .dispatch(&[matched(rule_a, 25), matched(rule_b, 25)], &mut dedup, t0())
            .await;

        assert_eq!(f.email.recipients(), vec!["a@x.com", "b@x.com"]);
        assert_eq!(report.sent, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].rule_id, 1);
        assert_eq!(report.failures[0].channel, Channel::Email);

        let snap = f.stats.snapshot();
        assert_eq!(snap.sent, 1);
        assert_eq!(snap.delivery_failures, 1);
        assert_eq!(snap.last_error.unwrap().stage, "dispatch");
    }

    #[tokio::test]
    async fn test_failed_send_still_consumes_cooldown() {
        let f = fixture();
        f.email.reject_for("a@x.com");
        let rule = AlertRule::new(1, "standard", "below", 30, "a@x.com");
        let mut dedup = DedupGate::new();

        let first = f.dispatcher.dispatch(&[matched(rule.clone(), 25)], &mut dedup, t0()).await;
        assert!(matches!(first.failures[0].source, GatewayError::NotAccepted(_)));
        assert_eq!(dedup.last_notified(1), Some(t0()));

        let second = f
            .dispatcher
            .dispatch(&[matched(rule, 25)], &mut dedup, t0() + Duration::minutes(5))
            .await;
        assert_eq!(second.suppressed, 1);
        assert_eq!(f.email.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_send_test_bypasses_dedup() {
        let f = fixture();
        f.sms.fail_for("555@sms.example");
        let rule = AlertRule::new(4, "sentri", "above", 60, "a@x.com").with_sms("555@sms.example");

        let outcomes = f.dispatcher.send_test(&rule).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[1].error.is_some());
        // Tests are not counted as deliveries
        assert_eq!(f.stats.snapshot().sent, 0);
    }

    #[tokio::test]
    async fn test_confirmation_goes_to_email() {
        let f = fixture();
        let rule = AlertRule::new(4, "sentri", "above", 60, "a@x.com");

        let outcome = f.dispatcher.send_confirmation(&rule).await.unwrap();
        assert!(outcome.success);
        assert_eq!(f.email.sent()[0].subject, "Border Alert Notification Created");

        let sms_only = rule.with_email(None).with_sms("555@sms.example");
        assert!(f.dispatcher.send_confirmation(&sms_only).await.is_none());
    }
}
