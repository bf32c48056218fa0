//! Rule evaluation against a wait time snapshot

use super::rule::{AlertRule, Condition, MetricKind};
use crate::feed::MetricSnapshot;

/// A rule whose condition holds for the current snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub rule: AlertRule,
    pub kind: MetricKind,
    pub condition: Condition,
    /// Value that satisfied the condition
    pub value: u32,
}

/// Result of evaluating a batch of rules
#[derive(Debug, Default)]
pub struct Evaluation {
    pub checked: usize,
    pub matches: Vec<RuleMatch>,
    pub errors: Vec<RuleError>,
}

/// Stateless evaluator. Rules are independent; a bad rule is reported and
/// skipped without affecting the others.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// Evaluate every rule against the snapshot
    pub fn evaluate(rules: &[AlertRule], snapshot: &MetricSnapshot) -> Evaluation {
        let mut evaluation = Evaluation {
            checked: rules.len(),
            ..Default::default()
        };

        for rule in rules {
            match Self::check_rule(rule, snapshot) {
                Ok(Some(matched)) => {
                    tracing::info!(
                        rule_id = rule.id,
                        metric_kind = %matched.kind,
                        value = matched.value,
                        threshold = rule.threshold,
                        "Condition met: wait time {} minutes is {} threshold {}",
                        matched.value,
                        matched.condition.phrase(),
                        rule.threshold
                    );
                    evaluation.matches.push(matched);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        rule_id = rule.id,
                        metric_kind = %rule.metric_kind,
                        error = %e,
                        "Skipping rule"
                    );
                    evaluation.errors.push(e);
                }
            }
        }

        evaluation
    }

    /// Check a single rule
    pub fn check_rule(rule: &AlertRule, snapshot: &MetricSnapshot) -> Result<Option<RuleMatch>, RuleError> {
        if !rule.active {
            return Err(RuleError::Inactive { rule_id: rule.id });
        }

        let kind: MetricKind = rule
            .metric_kind
            .parse()
            .map_err(|_| RuleError::UnknownMetricKind {
                rule_id: rule.id,
                kind: rule.metric_kind.clone(),
            })?;

        let condition: Condition = rule
            .condition
            .parse()
            .map_err(|_| RuleError::UnknownCondition {
                rule_id: rule.id,
                condition: rule.condition.clone(),
            })?;

        if rule.threshold < 0 {
            return Err(RuleError::InvalidThreshold {
                rule_id: rule.id,
                threshold: rule.threshold,
            });
        }

        if !rule.has_target() {
            return Err(RuleError::NoTarget { rule_id: rule.id });
        }

        let value = snapshot.value(kind);
        if condition.matches(i64::from(value), rule.threshold) {
            Ok(Some(RuleMatch {
                rule: rule.clone(),
                kind,
                condition,
                value,
            }))
        } else {
            Ok(None)
        }
    }
}

/// Malformed rule data
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    #[error("Rule {rule_id}: unknown metric kind '{kind}'")]
    UnknownMetricKind { rule_id: u64, kind: String },

    #[error("Rule {rule_id}: unknown condition '{condition}'")]
    UnknownCondition { rule_id: u64, condition: String },

    #[error("Rule {rule_id}: invalid threshold {threshold}")]
    InvalidThreshold { rule_id: u64, threshold: i64 },

    #[error("Rule {rule_id}: no delivery target")]
    NoTarget { rule_id: u64 },

    #[error("Rule {rule_id}: rule is inactive")]
    Inactive { rule_id: u64 },
}

impl RuleError {
    pub fn rule_id(&self) -> u64 {
        match self {
            RuleError::UnknownMetricKind { rule_id, .. }
            | RuleError::UnknownCondition { rule_id, .. }
            | RuleError::InvalidThreshold { rule_id, .. }
            | RuleError::NoTarget { rule_id }
            | RuleError::Inactive { rule_id } => *rule_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(standard: u32, sentri: u32, pedestrian: u32) -> MetricSnapshot {
        MetricSnapshot {
            port_name: "San Ysidro".to_string(),
            standard,
            sentri,
            pedestrian,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_below_is_inclusive() {
        let rule = AlertRule::new(1, "standard", "below", 30, "a@x.com");

        for (value, expected) in [(29, true), (30, true), (31, false)] {
            let result = RuleEvaluator::check_rule(&rule, &snapshot(value, 0, 0)).unwrap();
            assert_eq!(result.is_some(), expected, "value {}", value);
        }
    }

    #[test]
    fn test_above_is_inclusive() {
        let rule = AlertRule::new(1, "pedestrian", "above", 60, "a@x.com");

        for (value, expected) in [(59, false), (60, true), (61, true)] {
            let result = RuleEvaluator::check_rule(&rule, &snapshot(0, 0, value)).unwrap();
            assert_eq!(result.is_some(), expected, "value {}", value);
        }
    }

    #[test]
    fn test_selects_value_by_kind() {
        let rule = AlertRule::new(1, "sentri", "below", 10, "a@x.com");
        let matched = RuleEvaluator::check_rule(&rule, &snapshot(90, 5, 90))
            .unwrap()
            .unwrap();
        assert_eq!(matched.kind, MetricKind::Sentri);
        assert_eq!(matched.value, 5);
    }

    #[test]
    fn test_zero_lane_matches_below() {
        let rule = AlertRule::new(1, "pedestrian", "below", 0, "a@x.com");
        assert!(RuleEvaluator::check_rule(&rule, &snapshot(0, 0, 0)).unwrap().is_some());
    }

    #[test]
    fn test_unknown_kind_is_skipped() {
        let rules = vec![
            AlertRule::new(1, "unknown", "below", 30, "a@x.com"),
            AlertRule::new(2, "standard", "below", 30, "b@x.com"),
        ];

        let evaluation = RuleEvaluator::evaluate(&rules, &snapshot(25, 0, 0));
        assert_eq!(evaluation.checked, 2);
        assert_eq!(evaluation.matches.len(), 1);
        assert_eq!(evaluation.matches[0].rule.id, 2);
        assert_eq!(
            evaluation.errors,
            vec![RuleError::UnknownMetricKind {
                rule_id: 1,
                kind: "unknown".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_rules() {
        let snap = snapshot(25, 25, 25);

        let rule = AlertRule::new(3, "standard", "between", 30, "a@x.com");
        assert!(matches!(
            RuleEvaluator::check_rule(&rule, &snap),
            Err(RuleError::UnknownCondition { rule_id: 3, .. })
        ));

        let rule = AlertRule::new(4, "standard", "above", -1, "a@x.com");
        assert!(matches!(
            RuleEvaluator::check_rule(&rule, &snap),
            Err(RuleError::InvalidThreshold { rule_id: 4, threshold: -1 })
        ));

        let rule = AlertRule::new(5, "standard", "above", 1, "a@x.com").with_email(None);
        assert_eq!(
            RuleEvaluator::check_rule(&rule, &snap),
            Err(RuleError::NoTarget { rule_id: 5 })
        );

        let rule = AlertRule::new(6, "standard", "above", 1, "a@x.com").with_active(false);
        let err = RuleEvaluator::check_rule(&rule, &snap).unwrap_err();
        assert_eq!(err.rule_id(), 6);
    }
}
