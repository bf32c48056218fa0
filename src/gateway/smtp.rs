use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};

use super::{GatewayError, NotificationGateway, SendReceipt};

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Sender address
    pub from: String,
    /// Display name shown to recipients
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_from_name() -> String {
    "Border Alerts".to_string()
}

/// Gateway sending through an authenticated STARTTLS relay
pub struct SmtpGateway {
    name: String,
    sender: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpGateway {
    pub fn new(name: impl Into<String>, config: &SmtpConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let sender: Mailbox = format!("{} <{}>", config.from_name, config.from)
            .parse()
            .map_err(|e| GatewayError::InvalidAddress(format!("{}: {}", config.from, e)))?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(creds)
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            name: name.into(),
            sender,
            transport,
        })
    }
}

#[async_trait]
impl NotificationGateway for SmtpGateway {
    async fn send(&self, to: &str, subject: &str, body: &str, is_html: bool) -> Result<SendReceipt, GatewayError> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| GatewayError::InvalidAddress(format!("{}: {}", to, e)))?;

        let content_type = if is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(subject)
            .header(content_type)
            .body(body.to_string())
            .map_err(|e| GatewayError::Build(e.to_string()))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !response.is_positive() {
            return Ok(SendReceipt::rejected());
        }

        let message_id = response
            .first_line()
            .map(str::to_string)
            .unwrap_or_else(|| response.code().to_string());

        tracing::debug!(gateway = %self.name, to = %to, "SMTP relay accepted message");

        Ok(SendReceipt::accepted(message_id))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
