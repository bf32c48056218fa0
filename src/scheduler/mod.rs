//! Fixed-interval alerting loop
//!
//! Each cycle fetches the wait time snapshot, evaluates active rules and
//! dispatches notifications. A failing cycle is logged, counted and
//! forgotten; the loop only ends on an explicit stop.

pub mod cycle;
pub mod worker;

pub use cycle::{CycleError, CycleReport, CycleState, Stage};
pub use worker::{Scheduler, SchedulerHandle};
