//! Engine configuration
//!
//! Read once at start-up from environment variables. Unparseable numbers
//! fall back to their defaults; only a half-configured SMTP relay is an
//! error.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::SmtpConfig;

pub const DEFAULT_FEED_URL: &str = "https://bwt.cbp.gov/api/waittimes";
pub const DEFAULT_PORT_NAME: &str = "San Ysidro";
pub const DEFAULT_BORDER: &str = "Mexican Border";
pub const DEFAULT_DASHBOARD_URL: &str = "http://localhost:3167/users/bordernotifs";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    /// Wait time feed endpoint
    pub feed_url: String,
    /// Monitored crossing
    pub port_name: String,
    pub border: String,
    /// Seconds between cycles
    pub interval_secs: u64,
    /// Per-request timeout for the feed
    pub fetch_timeout_secs: u64,
    /// Log a stats summary every N cycles
    pub summary_every: u64,
    /// JSON file backing the rule store
    pub rules_path: Option<PathBuf>,
    /// SMTP relay; when absent notifications are only logged
    pub smtp: Option<SmtpConfig>,
    pub dashboard_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            feed_url: DEFAULT_FEED_URL.to_string(),
            port_name: DEFAULT_PORT_NAME.to_string(),
            border: DEFAULT_BORDER.to_string(),
            interval_secs: 300,
            fetch_timeout_secs: 10,
            summary_every: 10,
            rules_path: None,
            smtp: None,
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Build from `BORDERWATCH_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &str, default: u64| var(key).and_then(|v| v.parse::<u64>().ok()).unwrap_or(default);

        let smtp = match var("BORDERWATCH_SMTP_HOST") {
            Some(host) => {
                let from = var("BORDERWATCH_SMTP_FROM")
                    .or_else(|| var("BORDERWATCH_SMTP_USERNAME"))
                    .ok_or(ConfigError::Missing("BORDERWATCH_SMTP_FROM"))?;
                Some(SmtpConfig {
                    host,
                    port: var("BORDERWATCH_SMTP_PORT")
                        .and_then(|p| p.parse().ok())
                        .unwrap_or(587),
                    username: var("BORDERWATCH_SMTP_USERNAME").unwrap_or_else(|| from.clone()),
                    password: var("BORDERWATCH_SMTP_PASSWORD").ok_or(ConfigError::Missing("BORDERWATCH_SMTP_PASSWORD"))?,
                    from,
                    from_name: var("BORDERWATCH_SMTP_FROM_NAME").unwrap_or_else(|| "Border Alerts".to_string()),
                })
            }
            None => None,
        };

        Ok(Self {
            host: var("BORDERWATCH_HOST").unwrap_or(defaults.host),
            port: var("BORDERWATCH_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            feed_url: var("BORDERWATCH_FEED_URL").unwrap_or(defaults.feed_url),
            port_name: var("BORDERWATCH_PORT_NAME").unwrap_or(defaults.port_name),
            border: var("BORDERWATCH_BORDER").unwrap_or(defaults.border),
            interval_secs: number("BORDERWATCH_INTERVAL_SECS", defaults.interval_secs).max(1),
            fetch_timeout_secs: number("BORDERWATCH_FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs).max(1),
            summary_every: number("BORDERWATCH_SUMMARY_EVERY", defaults.summary_every).max(1),
            rules_path: var("BORDERWATCH_RULES_PATH").map(PathBuf::from),
            smtp,
            dashboard_url: var("BORDERWATCH_DASHBOARD_URL").unwrap_or(defaults.dashboard_url),
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required variable: {0}")]
    Missing(&'static str),
}
