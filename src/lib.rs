//! borderwatch: Border Wait Time Alerting Engine
//!
//! Polls the public border wait time feed on a fixed interval, evaluates
//! user-registered threshold rules for one crossing and sends deduplicated
//! e-mail and SMS notifications.
//!
//! # Features
//!
//! - **Fail-soft polling**: feed timeouts, bad payloads and a missing crossing
//!   skip a cycle without stopping the loop
//! - **Inclusive thresholds**: `below` and `above` both match at the threshold
//! - **Cool-down**: at most one notification attempt per rule per hour
//! - **Isolated failures**: a bad rule or failing channel affects only itself
//! - **Graceful stop**: the loop can be stopped between cycles or mid-sleep
//!
//! # Example
//!
//! ```no_run
//! use borderwatch::config::EngineConfig;
//! use borderwatch::engine::Engine;
//! use borderwatch::store::NewRule;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::from_config(&EngineConfig::default())?;
//!
//! engine.store.create(NewRule {
//!     metric_kind: "standard".to_string(),
//!     condition: "below".to_string(),
//!     threshold: 30,
//!     email: Some("commuter@example.com".to_string()),
//!     sms_email: None,
//! })?;
//!
//! let handle = engine.scheduler.start();
//! // ...
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod feed;
pub mod gateway;
pub mod scheduler;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use alerts::{AlertRule, Condition, MetricKind};
pub use config::EngineConfig;
pub use engine::Engine;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use stats::{DeliveryStats, StatsSnapshot};
