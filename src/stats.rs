//! Process-wide delivery counters

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Counters updated by the scheduler worker and read by the API.
///
/// Reset on process start. Observability only: nothing in the engine
/// branches on these values.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    cycles_run: AtomicU64,
    cycles_ok: AtomicU64,
    cycles_failed: AtomicU64,
    fetch_failures: AtomicU64,
    rule_errors: AtomicU64,
    sent: AtomicU64,
    delivery_failures: AtomicU64,
    suppressed: AtomicU64,
    last_error: Mutex<Option<LastError>>,
}

/// Most recent error seen by the worker
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LastError {
    pub stage: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Point-in-time copy of [`DeliveryStats`]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsSnapshot {
    pub cycles_run: u64,
    pub cycles_ok: u64,
    pub cycles_failed: u64,
    pub fetch_failures: u64,
    pub rule_errors: u64,
    pub sent: u64,
    pub delivery_failures: u64,
    pub suppressed: u64,
    pub last_error: Option<LastError>,
}

impl DeliveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a started cycle, returning its 1-based sequence number
    pub fn record_cycle(&self) -> u64 {
        self.cycles_run.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_cycle_ok(&self) {
        self.cycles_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_failed(&self, stage: &str, message: impl Into<String>, at: DateTime<Utc>) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(stage, message, at);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rule_error(&self, message: impl Into<String>, at: DateTime<Utc>) {
        self.rule_errors.fetch_add(1, Ordering::Relaxed);
        self.set_last_error("evaluation", message, at);
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_failure(&self, message: impl Into<String>, at: DateTime<Utc>) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
        self.set_last_error("dispatch", message, at);
    }

    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    fn set_last_error(&self, stage: &str, message: impl Into<String>, at: DateTime<Utc>) {
        *self.last_error.lock() = Some(LastError {
            stage: stage.to_string(),
            message: message.into(),
            at,
        });
    }

    /// Copy current values. Counters are read independently, so a snapshot
    /// taken mid-cycle may be slightly inconsistent across fields.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles_run: self.cycles_run.load(Ordering::Relaxed),
            cycles_ok: self.cycles_ok.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            rule_errors: self.rule_errors.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}
