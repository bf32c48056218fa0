//! Background scheduler worker

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::cycle::{panic_message, CycleError, CycleReport, CycleState, Stage};
use crate::alerts::{Dispatcher, RuleEvaluator};
use crate::clock::{Clock, SystemClock};
use crate::feed::MetricFetcher;
use crate::stats::DeliveryStats;
use crate::store::RuleStore;

/// Drives fetch, evaluate and dispatch on a fixed period
pub struct Scheduler {
    fetcher: MetricFetcher,
    store: Arc<dyn RuleStore>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    stats: Arc<DeliveryStats>,
    state: CycleState,
    interval: Duration,
    summary_every: u64,
    /// Stage currently running, for classifying panics
    stage: Stage,
}

impl Scheduler {
    /// Create a scheduler with the default 5 minute period
    pub fn new(
        fetcher: MetricFetcher,
        store: Arc<dyn RuleStore>,
        dispatcher: Dispatcher,
        stats: Arc<DeliveryStats>,
    ) -> Self {
        Self {
            fetcher,
            store,
            dispatcher,
            clock: Arc::new(SystemClock),
            stats,
            state: CycleState::default(),
            interval: Duration::from_secs(300),
            summary_every: 10,
            stage: Stage::Fetch,
        }
    }

    /// Set the period between cycles
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Log a stats summary every `n` cycles
    pub fn with_summary_every(mut self, n: u64) -> Self {
        self.summary_every = n.max(1);
        self
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn stats(&self) -> Arc<DeliveryStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    /// Run one cycle with failures contained: errors and panics are logged,
    /// counted and returned, never propagated as a panic.
    pub async fn execute_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let cycle = self.stats.record_cycle();
        tracing::info!(cycle, "Running border wait time check");

        let guarded = AssertUnwindSafe(self.run_cycle()).catch_unwind().await;
        let outcome = match guarded {
            Ok(outcome) => outcome,
            Err(payload) => Err(CycleError::Panicked {
                stage: self.stage,
                message: panic_message(payload.as_ref()),
            }),
        };

        match &outcome {
            Ok(report) => {
                self.stats.record_cycle_ok();
                tracing::info!(
                    cycle,
                    checked = report.checked,
                    matched = report.matched,
                    sent = report.sent,
                    suppressed = report.suppressed,
                    failures = report.delivery_failures,
                    "Completed border wait time check"
                );
            }
            Err(e) => {
                let stage = e.stage();
                if stage == Stage::Fetch {
                    self.stats.record_fetch_failure();
                }
                self.stats
                    .record_cycle_failed(stage.as_str(), e.to_string(), self.clock.now());
                match e {
                    CycleError::Fetch(_) => tracing::warn!(
                        cycle,
                        stage = %stage,
                        error = %e,
                        "No wait time data available, skipping rule evaluation"
                    ),
                    _ => tracing::error!(cycle, stage = %stage, error = %e, "Cycle failed"),
                }
            }
        }

        if summary_due(cycle, self.summary_every) {
            self.log_summary();
        }

        outcome
    }

    /// One unguarded fetch, evaluate, dispatch pass
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.stage = Stage::Fetch;
        let snapshot = self.fetcher.fetch(self.clock.now()).await?;

        self.stage = Stage::Evaluation;
        let rules = self.store.list_active_rules().await?;
        let evaluation = RuleEvaluator::evaluate(&rules, &snapshot);
        for error in &evaluation.errors {
            self.stats.record_rule_error(error.to_string(), self.clock.now());
        }

        self.stage = Stage::Dispatch;
        let dispatch = self
            .dispatcher
            .dispatch(&evaluation.matches, &mut self.state.dedup, self.clock.now())
            .await;

        Ok(CycleReport {
            snapshot,
            checked: evaluation.checked,
            matched: evaluation.matches.len(),
            rule_errors: evaluation.errors.len(),
            notified: dispatch.allowed,
            suppressed: dispatch.suppressed,
            sent: dispatch.sent,
            delivery_failures: dispatch.failures.len(),
        })
    }

    fn log_summary(&self) {
        let s = self.stats.snapshot();
        tracing::info!(
            cycles = s.cycles_run,
            ok = s.cycles_ok,
            failed = s.cycles_failed,
            fetch_failures = s.fetch_failures,
            rule_errors = s.rule_errors,
            sent = s.sent,
            delivery_failures = s.delivery_failures,
            suppressed = s.suppressed,
            tracked_rules = self.state.dedup.len(),
            last_error = s.last_error.as_ref().map(|e| e.message.as_str()).unwrap_or("-"),
            "Delivery summary"
        );
    }

    /// Spawn the loop on the tokio runtime.
    ///
    /// The first cycle runs immediately. The stop signal is checked before
    /// each cycle and raced against the sleep, so a stop never waits out a
    /// full period.
    pub fn start(mut self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::clone(&self.stats);

        let running_flag = Arc::clone(&running);
        let join = tokio::spawn(async move {
            tracing::info!(interval = ?self.interval, "Border checker worker started");

            loop {
                match shutdown_rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                // Errors are already logged and counted
                let _ = self.execute_cycle().await;

                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = shutdown_rx.recv() => break,
                }
            }

            running_flag.store(false, Ordering::SeqCst);
            tracing::info!("Border checker worker stopped");
        });

        SchedulerHandle {
            shutdown_tx,
            join,
            running,
            stats,
        }
    }
}

/// Whether the 1-based `cycle` should be followed by a stats summary
fn summary_due(cycle: u64, every: u64) -> bool {
    every > 0 && cycle > 0 && cycle % every == 0
}

/// Control point for a started scheduler. Dropping the handle also stops the
/// worker once its current cycle finishes.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: tokio::task::JoinHandle<()>,
    running: Arc<AtomicBool>,
    stats: Arc<DeliveryStats>,
}

impl SchedulerHandle {
    /// Signal the worker and wait for it to finish its current cycle
    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        let _ = self.shutdown_tx.send(()).await;
        self.join.await
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> Arc<DeliveryStats> {
        Arc::clone(&self.stats)
    }
}
