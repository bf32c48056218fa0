//! Notification gateways
//!
//! A gateway accepts a rendered message and reports whether it was handed
//! off. The engine holds two instances: one for e-mail, one for SMS through
//! a carrier's e-mail-to-SMS address.

pub mod log;
pub mod smtp;

use async_trait::async_trait;

pub use self::log::LogGateway;
pub use self::smtp::{SmtpConfig, SmtpGateway};

/// Outcome reported by a gateway that did not error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub success: bool,
    pub message_id: Option<String>,
}

impl SendReceipt {
    pub fn accepted(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
        }
    }

    pub fn rejected() -> Self {
        Self {
            success: false,
            message_id: None,
        }
    }
}

/// Delivery backend
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Send one message
    async fn send(&self, to: &str, subject: &str, body: &str, is_html: bool) -> Result<SendReceipt, GatewayError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Gateway errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Message build error: {0}")]
    Build(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Message not accepted: {0}")]
    NotAccepted(String),
}
