//! Per-rule notification cool-down

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Minimum seconds between notifications for the same rule
pub const COOLDOWN_SECS: i64 = 60 * 60;

/// Cool-down window as a duration
pub fn cooldown() -> Duration {
    Duration::seconds(COOLDOWN_SECS)
}

/// Tracks when each rule last had a notification attempt.
///
/// Entries are created on first allowed match and never pruned, so memory is
/// bounded by the number of distinct rule IDs ever matched. State is lost on
/// restart, which can only cause an extra notification, never a missed one.
#[derive(Debug, Default)]
pub struct DedupGate {
    last_notified: HashMap<u64, DateTime<Utc>>,
}

impl DedupGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records `now` if the rule has no entry or its last
    /// attempt is more than [`cooldown()`] ago. Otherwise returns false and
    /// leaves the entry untouched.
    pub fn allow(&mut self, rule_id: u64, now: DateTime<Utc>) -> bool {
        let allowed = match self.last_notified.get(&rule_id) {
            Some(last) => now - *last > cooldown(),
            None => true,
        };

        if allowed {
            self.last_notified.insert(rule_id, now);
        }
        allowed
    }

    pub fn last_notified(&self, rule_id: u64) -> Option<DateTime<Utc>> {
        self.last_notified.get(&rule_id).copied()
    }

    pub fn len(&self) -> usize {
        self.last_notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_notified.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_first_match_is_allowed() {
        let mut gate = DedupGate::new();
        assert!(gate.allow(1, t0()));
        assert_eq!(gate.last_notified(1), Some(t0()));
    }

    #[test]
    fn test_within_window_is_suppressed() {
        let mut gate = DedupGate::new();
        assert!(gate.allow(1, t0()));
        assert!(!gate.allow(1, t0() + Duration::minutes(59)));
        // A denied call does not move the window
        assert_eq!(gate.last_notified(1), Some(t0()));
        assert!(gate.allow(1, t0() + Duration::minutes(61)));
        assert_eq!(gate.last_notified(1), Some(t0() + Duration::minutes(61)));
    }

    #[test]
    fn test_exactly_one_hour_is_suppressed() {
        let mut gate = DedupGate::new();
        assert!(gate.allow(1, t0()));
        assert!(!gate.allow(1, t0() + cooldown()));
        assert!(gate.allow(1, t0() + cooldown() + Duration::seconds(1)));
    }

    #[test]
    fn test_rules_are_independent() {
        let mut gate = DedupGate::new();
        assert!(gate.allow(1, t0()));
        assert!(gate.allow(2, t0() + Duration::minutes(1)));
        assert!(!gate.allow(1, t0() + Duration::minutes(2)));
        assert_eq!(gate.len(), 2);
    }
}
