//! Threshold rules over aggregate feedback counts.
//!
//! Rules are persisted through a [`RuleStore`]. Every condition a rule sets
//! must hold for it to trigger; a rule that sets a minimum count but neither
//! a sector nor a county has nothing to compare against and never triggers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use sauti_common::{Error, Result, Validate, ValidationError, ValidationResult};

use crate::clock::Clock;
use crate::model::{Alert, AlertDraft, AlertType, NotifyTargets, Severity};

const MAX_NAME_LEN: usize = 128;
const DEFAULT_RULE_NAME: &str = "Untitled rule";

// ============================================================================
// Types
// ============================================================================

/// A persisted alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub sector: Option<String>,
    pub county: Option<String>,
    pub min_count: Option<i64>,
    pub notify_slack: bool,
    pub notify_webhook: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    /// Severity implied by the threshold.
    pub fn severity(&self) -> Severity {
        match self.min_count.unwrap_or(0) {
            n if n >= 50 => Severity::Critical,
            n if n >= 20 => Severity::High,
            _ => Severity::Medium,
        }
    }

    fn notify_targets(&self) -> NotifyTargets {
        NotifyTargets {
            chat: self.notify_slack,
            webhook: self.notify_webhook,
        }
    }
}

/// Create or patch payload. Absent fields keep their current (or default) value;
/// a blank sector or county clears it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleInput {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub sector: Option<String>,
    pub county: Option<String>,
    pub min_count: Option<i64>,
    pub notify_slack: Option<bool>,
    pub notify_webhook: Option<bool>,
}

impl Validate for RuleInput {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Some(name) = &self.name {
            if name.chars().count() > MAX_NAME_LEN {
                errors.push(ValidationError::InvalidValue {
                    field: "name".into(),
                    reason: format!("must be at most {MAX_NAME_LEN} characters"),
                });
            }
        }
        if let Some(min_count) = self.min_count {
            if min_count < 1 {
                errors.push(ValidationError::InvalidValue {
                    field: "min_count".into(),
                    reason: "must be at least 1".into(),
                });
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    sauti_common::util::non_empty(value)
}

impl RuleInput {
    /// Parse an untyped request body; any shape error is an input error.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidInput(e.to_string()))
    }

    fn into_rule(self, id: String, created_at: DateTime<Utc>) -> AlertRule {
        AlertRule {
            id,
            name: clean(self.name.as_deref()).unwrap_or_else(|| DEFAULT_RULE_NAME.into()),
            enabled: self.enabled.unwrap_or(true),
            sector: clean(self.sector.as_deref()),
            county: clean(self.county.as_deref()),
            min_count: self.min_count,
            notify_slack: self.notify_slack.unwrap_or(false),
            notify_webhook: self.notify_webhook.unwrap_or(false),
            created_at,
        }
    }

    fn apply_to(self, rule: &mut AlertRule) {
        if let Some(name) = self.name {
            rule.name = clean(Some(&name)).unwrap_or_else(|| DEFAULT_RULE_NAME.into());
        }
        if let Some(enabled) = self.enabled {
            rule.enabled = enabled;
        }
        if let Some(sector) = self.sector {
            rule.sector = clean(Some(&sector));
        }
        if let Some(county) = self.county {
            rule.county = clean(Some(&county));
        }
        if self.min_count.is_some() {
            rule.min_count = self.min_count;
        }
        if let Some(flag) = self.notify_slack {
            rule.notify_slack = flag;
        }
        if let Some(flag) = self.notify_webhook {
            rule.notify_webhook = flag;
        }
    }
}

/// A rule whose conditions held for the supplied counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredRule {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub description: String,
    pub sector: Option<String>,
    pub county: Option<String>,
    pub notify: NotifyTargets,
}

impl TriggeredRule {
    pub fn to_alert_draft(&self) -> AlertDraft {
        let mut draft = AlertDraft::new(
            AlertType::RuleTriggered,
            self.severity,
            self.rule_name.clone(),
            self.description.clone(),
        );
        draft.sector = self.sector.clone();
        draft.affected_counties = self.county.iter().cloned().collect();
        draft.metadata = json!({
            "rule_id": self.rule_id,
            "notify_slack": self.notify.chat,
            "notify_webhook": self.notify.webhook,
        });
        draft.notify = self.notify;
        draft
    }

    /// Alert-shaped preview with a fresh id, not persisted.
    pub fn to_alert(&self, now: DateTime<Utc>) -> Alert {
        self.to_alert_draft()
            .into_alert(uuid::Uuid::new_v4().to_string(), now)
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Lowercase the keys of a count map, summing collisions.
fn normalize_counts(counts: &HashMap<String, u64>) -> HashMap<String, u64> {
    let mut normalized = HashMap::with_capacity(counts.len());
    for (key, count) in counts {
        *normalized.entry(key.trim().to_lowercase()).or_insert(0) += count;
    }
    normalized
}

fn meets(counts: &HashMap<String, u64>, key: &str, min_count: Option<i64>) -> bool {
    let Some(min) = min_count else {
        return true;
    };
    let count = counts.get(&key.to_lowercase()).copied().unwrap_or(0);
    i64::try_from(count).unwrap_or(i64::MAX) >= min
}

/// Evaluate `rules` in order against the counts.
pub fn evaluate_rules(
    rules: &[AlertRule],
    counts_by_sector: &HashMap<String, u64>,
    counts_by_county: &HashMap<String, u64>,
) -> Vec<TriggeredRule> {
    let sectors = normalize_counts(counts_by_sector);
    let counties = normalize_counts(counts_by_county);

    rules
        .iter()
        .filter(|rule| rule.enabled)
        .filter(|rule| {
            if rule.sector.is_none() && rule.county.is_none() {
                return rule.min_count.is_none();
            }
            let sector_ok = rule
                .sector
                .as_deref()
                .map_or(true, |s| meets(&sectors, s, rule.min_count));
            let county_ok = rule
                .county
                .as_deref()
                .map_or(true, |c| meets(&counties, c, rule.min_count));
            sector_ok && county_ok
        })
        .map(|rule| {
            let mut parts = Vec::new();
            if let Some(sector) = &rule.sector {
                parts.push(format!("Sector '{sector}' threshold reached"));
            }
            if let Some(county) = &rule.county {
                parts.push(format!("County '{county}' threshold reached"));
            }
            let description = if parts.is_empty() {
                "Threshold reached".to_string()
            } else {
                parts.join(", ")
            };

            TriggeredRule {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                severity: rule.severity(),
                description,
                sector: rule.sector.clone(),
                county: rule.county.clone(),
                notify: rule.notify_targets(),
            }
        })
        .collect()
}

// ============================================================================
// Store and engine
// ============================================================================

/// Persistence for alert rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules, oldest first.
    async fn list_rules(&self) -> anyhow::Result<Vec<AlertRule>>;
    async fn get_rule(&self, id: &str) -> anyhow::Result<Option<AlertRule>>;
    async fn upsert_rule(&self, rule: &AlertRule) -> anyhow::Result<()>;
    /// Returns false when no rule had that id.
    async fn delete_rule(&self, id: &str) -> anyhow::Result<bool>;
}

/// CRUD and evaluation over a [`RuleStore`].
pub struct RuleEngine {
    store: Arc<dyn RuleStore>,
    clock: Arc<dyn Clock>,
}

impl RuleEngine {
    pub fn new(store: Arc<dyn RuleStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list(&self) -> Result<Vec<AlertRule>> {
        self.store.list_rules().await.map_err(Error::storage)
    }

    pub async fn create(&self, input: RuleInput) -> Result<AlertRule> {
        input.validate()?;
        let rule = input.into_rule(uuid::Uuid::new_v4().to_string(), self.clock.now());
        self.store.upsert_rule(&rule).await.map_err(Error::storage)?;
        info!(rule_id = %rule.id, name = %rule.name, "Alert rule created");
        Ok(rule)
    }

    pub async fn update(&self, id: &str, input: RuleInput) -> Result<AlertRule> {
        input.validate()?;
        let mut rule = self
            .store
            .get_rule(id)
            .await
            .map_err(Error::storage)?
            .ok_or_else(|| Error::NotFound(format!("rule {id}")))?;

        input.apply_to(&mut rule);
        self.store.upsert_rule(&rule).await.map_err(Error::storage)?;
        info!(rule_id = %rule.id, "Alert rule updated");
        Ok(rule)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.store.delete_rule(id).await.map_err(Error::storage)? {
            info!(rule_id = %id, "Alert rule deleted");
            Ok(())
        } else {
            Err(Error::NotFound(format!("rule {id}")))
        }
    }

    /// Evaluate every stored rule.
    pub async fn evaluate(
        &self,
        counts_by_sector: &HashMap<String, u64>,
        counts_by_county: &HashMap<String, u64>,
    ) -> Result<Vec<TriggeredRule>> {
        let rules = self.list().await?;
        let triggered = evaluate_rules(&rules, counts_by_sector, counts_by_county);
        debug!(rules = rules.len(), triggered = triggered.len(), "Rules evaluated");
        Ok(triggered)
    }
}
