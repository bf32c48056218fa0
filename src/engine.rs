//! Wiring of the engine components from configuration

use std::sync::Arc;
use std::time::Duration;

use crate::alerts::{Dispatcher, MessageContext};
use crate::config::EngineConfig;
use crate::feed::{FetchError, HttpMetricSource, MetricFetcher};
use crate::gateway::{GatewayError, LogGateway, NotificationGateway, SmtpGateway};
use crate::scheduler::Scheduler;
use crate::stats::DeliveryStats;
use crate::store::{MemoryRuleStore, StoreError};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Fully wired engine, not yet started
pub struct Engine {
    pub scheduler: Scheduler,
    /// Dispatcher for the API (test and confirmation messages)
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<MemoryRuleStore>,
    pub stats: Arc<DeliveryStats>,
}

impl Engine {
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let store = Arc::new(match &config.rules_path {
            Some(path) => MemoryRuleStore::open(path)?,
            None => MemoryRuleStore::new(),
        });
        let stats = Arc::new(DeliveryStats::new());

        let email: Arc<dyn NotificationGateway>;
        let sms: Arc<dyn NotificationGateway>;
        match &config.smtp {
            Some(smtp) => {
                email = Arc::new(SmtpGateway::new("email", smtp, SMTP_TIMEOUT)?);
                sms = Arc::new(SmtpGateway::new("sms", smtp, SMTP_TIMEOUT)?);
            }
            None => {
                tracing::warn!("No SMTP relay configured, notifications will only be logged");
                email = Arc::new(LogGateway::new("email"));
                sms = Arc::new(LogGateway::new("sms"));
            }
        }

        let context = MessageContext {
            crossing: config.port_name.clone(),
            dashboard_url: config.dashboard_url.clone(),
        };
        let make_dispatcher = || {
            Dispatcher::new(
                Arc::clone(&email),
                Arc::clone(&sms),
                context.clone(),
                Arc::clone(&stats),
            )
        };

        let source = HttpMetricSource::new(&config.feed_url, config.fetch_timeout())?;
        let fetcher = MetricFetcher::new(Arc::new(source), &config.port_name, &config.border);

        let scheduler = Scheduler::new(fetcher, store.clone(), make_dispatcher(), Arc::clone(&stats))
            .with_interval(config.interval())
            .with_summary_every(config.summary_every);

        Ok(Self {
            scheduler,
            dispatcher: Arc::new(make_dispatcher()),
            store,
            stats,
        })
    }
}

/// Start-up errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Rule store: {0}")]
    Store(#[from] StoreError),

    #[error("Feed client: {0}")]
    Feed(#[from] FetchError),

    #[error("Gateway: {0}")]
    Gateway(#[from] GatewayError),
}
