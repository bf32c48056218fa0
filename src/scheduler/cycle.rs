//! Cycle state, reports and errors

use std::fmt;

use serde::Serialize;

use crate::alerts::DedupGate;
use crate::feed::{FetchError, MetricSnapshot};
use crate::store::StoreError;

/// State carried from one cycle to the next. Owned by the scheduler and lent
/// to the dispatcher for the length of a cycle.
#[derive(Debug, Default)]
pub struct CycleState {
    pub dedup: DedupGate,
}

/// Pipeline stage, used to classify failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Evaluation,
    Dispatch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Evaluation => "evaluation",
            Stage::Dispatch => "dispatch",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub snapshot: MetricSnapshot,
    /// Active rules examined
    pub checked: usize,
    pub matched: usize,
    /// Rules skipped as malformed
    pub rule_errors: usize,
    /// Matches that passed the dedup gate
    pub notified: usize,
    pub suppressed: usize,
    pub sent: usize,
    pub delivery_failures: usize,
}

/// A cycle that did not complete
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Wait time feed unavailable: {0}")]
    Fetch(#[from] FetchError),

    #[error("Could not list active rules: {0}")]
    Rules(#[from] StoreError),

    #[error("Cycle panicked during {stage}: {message}")]
    Panicked { stage: Stage, message: String },
}

impl CycleError {
    pub fn stage(&self) -> Stage {
        match self {
            CycleError::Fetch(_) => Stage::Fetch,
            CycleError::Rules(_) => Stage::Evaluation,
            CycleError::Panicked { stage, .. } => *stage,
        }
    }
}

/// Best-effort text from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_stage() {
        assert_eq!(CycleError::from(FetchError::Status(500)).stage(), Stage::Fetch);
        assert_eq!(
            CycleError::from(StoreError::Unavailable("db down".into())).stage(),
            Stage::Evaluation
        );
        let panicked = CycleError::Panicked {
            stage: Stage::Dispatch,
            message: "boom".into(),
        };
        assert_eq!(panicked.stage(), Stage::Dispatch);
        assert_eq!(panicked.to_string(), "Cycle panicked during dispatch: boom");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static text");
        assert_eq!(panic_message(payload.as_ref()), "static text");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned text"));
        assert_eq!(panic_message(payload.as_ref()), "owned text");

        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
