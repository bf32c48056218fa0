//! In-memory rule store with optional JSON file persistence

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{RuleStore, StoreError};
use crate::alerts::rule::{AlertRule, Condition, MetricKind};

/// Registration request for a new rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    #[serde(rename = "type")]
    pub metric_kind: String,
    pub condition: String,
    #[serde(rename = "waitTime")]
    pub threshold: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sms_email: Option<String>,
}

impl NewRule {
    /// Check the request before it becomes a rule
    pub fn validate(&self) -> Result<(), StoreError> {
        self.metric_kind
            .parse::<MetricKind>()
            .map_err(|e| StoreError::Invalid(format!("type: {}", e)))?;
        self.condition
            .parse::<Condition>()
            .map_err(|e| StoreError::Invalid(format!("condition: {}", e)))?;

        if self.threshold < 0 {
            return Err(StoreError::Invalid("waitTime must not be negative".to_string()));
        }

        let email = non_blank(&self.email);
        let sms = non_blank(&self.sms_email);
        if email.is_none() && sms.is_none() {
            return Err(StoreError::Invalid(
                "at least one of email or smsEmail is required".to_string(),
            ));
        }
        for address in email.into_iter().chain(sms) {
            if !email_pattern().is_match(address) {
                return Err(StoreError::Invalid(format!("'{}' is not a valid address", address)));
            }
        }

        Ok(())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid address pattern"))
}

/// On-disk layout
#[derive(Debug, Serialize)]
struct StoreFile<'a> {
    next_id: u64,
    rules: Vec<&'a AlertRule>,
}

/// On-disk layout as read back. Rules stay raw so one bad record does not
/// reject the whole file.
#[derive(Debug, Default, Deserialize)]
struct LoadedFile {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    rules: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
struct Inner {
    next_id: u64,
    rules: BTreeMap<u64, AlertRule>,
}

/// Rule store kept in memory, optionally mirrored to a JSON file after every
/// change. Rules are never removed; deactivation flips `active`.
///
/// With a file attached, a change is only applied in memory once it has been
/// written, so a failed write leaves the store as it was.
#[derive(Debug)]
pub struct MemoryRuleStore {
    inner: RwLock<Inner>,
    path: Option<PathBuf>,
}

impl MemoryRuleStore {
    /// Create an empty, non-persistent store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                rules: BTreeMap::new(),
            }),
            path: None,
        }
    }

    /// Open a store backed by `path`, loading it if the file exists.
    ///
    /// Records that cannot be read as rules are logged and skipped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let file = if path.exists() {
            let data = std::fs::read(&path)?;
            serde_json::from_slice::<LoadedFile>(&data)
                .map_err(|e| StoreError::Serialization(e.to_string()))?
        } else {
            LoadedFile::default()
        };

        let mut rules = BTreeMap::new();
        let mut skipped = 0usize;
        for (index, record) in file.rules.into_iter().enumerate() {
            match serde_json::from_value::<AlertRule>(record) {
                Ok(rule) => {
                    rules.insert(rule.id, rule);
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(path = %path.display(), index, error = %e, "Skipping unreadable rule record");
                }
            }
        }
        let max_id = rules.keys().next_back().copied().unwrap_or(0);

        tracing::info!(path = %path.display(), rules = rules.len(), skipped, "Loaded rule store");

        Ok(Self {
            inner: RwLock::new(Inner {
                next_id: file.next_id.max(max_id.saturating_add(1)),
                rules,
            }),
            path: Some(path),
        })
    }

    /// Register a new active rule
    pub fn create(&self, request: NewRule) -> Result<AlertRule, StoreError> {
        request.validate()?;

        let mut inner = self.inner.write();
        let id = inner.next_id;
        if id == u64::MAX {
            return Err(StoreError::Unavailable("rule ids exhausted".to_string()));
        }
        let rule = AlertRule {
            id,
            metric_kind: request.metric_kind,
            condition: request.condition,
            threshold: request.threshold,
            email: non_blank(&request.email).map(str::to_string),
            sms_email: non_blank(&request.sms_email).map(str::to_string),
            active: true,
            created_at: Utc::now(),
        };

        let mut pending = inner.clone();
        pending.next_id = id + 1;
        pending.rules.insert(id, rule.clone());
        self.persist(&pending)?;
        *inner = pending;

        tracing::info!(rule_id = id, metric_kind = %rule.metric_kind, "Rule created");
        Ok(rule)
    }

    /// Insert a rule record as-is, without validation. Used to import rules
    /// produced elsewhere.
    pub fn insert(&self, rule: AlertRule) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let mut pending = inner.clone();
        pending.next_id = pending.next_id.max(rule.id.saturating_add(1));
        pending.rules.insert(rule.id, rule);
        self.persist(&pending)?;
        *inner = pending;
        Ok(())
    }

    /// Mark a rule inactive
    pub fn deactivate(&self, id: u64) -> Result<AlertRule, StoreError> {
        let mut inner = self.inner.write();
        if !inner.rules.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }

        let mut pending = inner.clone();
        let rule = pending.rules.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        rule.active = false;
        let rule = rule.clone();
        self.persist(&pending)?;
        *inner = pending;

        tracing::info!(rule_id = id, "Rule deactivated");
        Ok(rule)
    }

    /// Get a rule by ID
    pub fn get(&self, id: u64) -> Option<AlertRule> {
        self.inner.read().rules.get(&id).cloned()
    }

    /// All rules, active or not, in ID order
    pub fn list(&self) -> Vec<AlertRule> {
        self.inner.read().rules.values().cloned().collect()
    }

    fn persist(&self, inner: &Inner) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = StoreFile {
            next_id: inner.next_id,
            rules: inner.rules.values().collect(),
        };
        let data = serde_json::to_vec_pretty(&file).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Default for MemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list_active_rules(&self) -> Result<Vec<AlertRule>, StoreError> {
        Ok(self
            .inner
            .read()
            .rules
            .values()
            .filter(|r| r.active)
            .cloned()
            .collect())
    }
}
