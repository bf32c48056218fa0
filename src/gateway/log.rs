use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{GatewayError, NotificationGateway, SendReceipt};

/// Dry-run gateway: writes the message to the log and reports success.
/// Used when no SMTP relay is configured.
pub struct LogGateway {
    name: String,
    counter: AtomicU64,
}

impl LogGateway {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl NotificationGateway for LogGateway {
    async fn send(&self, to: &str, subject: &str, body: &str, is_html: bool) -> Result<SendReceipt, GatewayError> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;

        tracing::warn!(
            gateway = %self.name,
            to = %to,
            subject = %subject,
            html = is_html,
            "Notification (dry run): {}",
            body
        );

        Ok(SendReceipt::accepted(format!("{}-{}", self.name, seq)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_gateway_always_succeeds() {
        let gateway = LogGateway::new("sms");
        let first = gateway.send("1@sms.example", "Border Alert", "hi", false).await.unwrap();
        let second = gateway.send("1@sms.example", "Border Alert", "hi", false).await.unwrap();

        assert!(first.success);
        assert_eq!(first.message_id.as_deref(), Some("sms-1"));
        assert_eq!(second.message_id.as_deref(), Some("sms-2"));
    }
}
