//! Threshold alerting for border wait times
//!
//! Rules are evaluated against each snapshot; matches pass through a
//! per-rule cool-down before being rendered and handed to the gateways.

pub mod dedup;
pub mod dispatcher;
pub mod evaluator;
pub mod message;
pub mod rule;

pub use dedup::DedupGate;
pub use dispatcher::{Channel, ChannelOutcome, DispatchError, DispatchReport, Dispatcher};
pub use evaluator::{Evaluation, RuleError, RuleEvaluator, RuleMatch};
pub use message::{MessageContext, RenderedMessage};
pub use rule::{AlertRule, Condition, MetricKind};
