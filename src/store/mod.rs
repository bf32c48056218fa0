//! Alert rule storage
//!
//! The engine only ever reads active rules through [`RuleStore`]. Creation
//! and deactivation belong to the administrative side (`MemoryRuleStore` and
//! the HTTP API).

pub mod memory;

use async_trait::async_trait;

use crate::alerts::rule::AlertRule;

pub use memory::{MemoryRuleStore, NewRule};

/// Read access used by the scheduler
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules with `active = true`
    async fn list_active_rules(&self) -> Result<Vec<AlertRule>, StoreError>;
}

/// Rule store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Rule {0} not found")]
    NotFound(u64),

    #[error("Invalid rule: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
