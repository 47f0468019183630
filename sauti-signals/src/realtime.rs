//! Realtime update loop: recent-feedback counters feeding the rule engine.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use sauti_common::{RealtimeConfig, Result};

use crate::cache::Cache;
use crate::clock::Clock;
use crate::dispatcher::AlertDispatcher;
use crate::model::{Alert, FeedbackItem};
use crate::rules::RuleEngine;
use crate::sector::detect_sector;
use crate::source::FeedbackSource;

const CACHE_KEY: &str = "realtime_updates";
const LOOKBACK_HOURS: i64 = 24;

/// Feedback counts by sector and county, keys lowercase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Counters {
    pub by_sector: BTreeMap<String, u64>,
    pub by_county: BTreeMap<String, u64>,
}

impl Counters {
    pub fn from_items(items: &[FeedbackItem]) -> Self {
        let mut counters = Self::default();
        for item in items {
            if let Some(county) = item.location_key() {
                *counters.by_county.entry(county).or_insert(0) += 1;
            }
            let sector = item.sector.unwrap_or_else(|| detect_sector(&item.text));
            *counters
                .by_sector
                .entry(sector.as_str().to_string())
                .or_insert(0) += 1;
        }
        counters
    }

    fn as_maps(&self) -> (HashMap<String, u64>, HashMap<String, u64>) {
        (
            self.by_sector.clone().into_iter().collect(),
            self.by_county.clone().into_iter().collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeData {
    pub new_feedback: usize,
    pub latest: Option<FeedbackItem>,
    pub rule_alerts: Vec<Alert>,
    pub counters: Counters,
}

/// `{"type": "update", "data": {...}, "timestamp": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeUpdate {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: RealtimeData,
    pub timestamp: DateTime<Utc>,
}

/// Builds realtime updates, evaluating rules against fresh counters.
pub struct RealtimeMonitor {
    source: Arc<dyn FeedbackSource>,
    rules: Arc<RuleEngine>,
    dispatcher: Arc<AlertDispatcher>,
    cache: Arc<dyn Cache<Arc<RealtimeUpdate>>>,
    clock: Arc<dyn Clock>,
    config: RealtimeConfig,
}

impl RealtimeMonitor {
    pub fn new(
        source: Arc<dyn FeedbackSource>,
        rules: Arc<RuleEngine>,
        dispatcher: Arc<AlertDispatcher>,
        cache: Arc<dyn Cache<Arc<RealtimeUpdate>>>,
        clock: Arc<dyn Clock>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            source,
            rules,
            dispatcher,
            cache,
            clock,
            config,
        }
    }

    /// Latest update, or `None` when there is no recent feedback and no rule
    /// fired. A cached update is served with a fresh timestamp.
    pub async fn updates(&self) -> Result<Option<RealtimeUpdate>> {
        let now = self.clock.now();
        if let Some(cached) = self.cache.get(CACHE_KEY) {
            let mut update = (*cached).clone();
            update.timestamp = now;
            return Ok(Some(update));
        }

        let since = now - Duration::hours(LOOKBACK_HOURS);
        let feedback = self
            .source
            .fetch_since(since, self.config.feedback_limit)
            .await?;

        let counters = Counters::from_items(&feedback);
        let (by_sector, by_county) = counters.as_maps();
        let triggered = self.rules.evaluate(&by_sector, &by_county).await?;

        let rule_alerts = if triggered.is_empty() {
            Vec::new()
        } else {
            let drafts = triggered.iter().map(|t| t.to_alert_draft()).collect();
            match self.dispatcher.dispatch(drafts).await {
                Ok(stored) if !stored.is_empty() => stored,
                Ok(_) => triggered.iter().map(|t| t.to_alert(now)).collect(),
                Err(e) => {
                    warn!(error = %e, "Failed to persist rule alerts");
                    triggered.iter().map(|t| t.to_alert(now)).collect()
                }
            }
        };

        if feedback.is_empty() && rule_alerts.is_empty() {
            debug!("No realtime activity");
            return Ok(None);
        }

        let update = RealtimeUpdate {
            kind: "update",
            data: RealtimeData {
                new_feedback: feedback.len(),
                latest: feedback.first().cloned(),
                rule_alerts,
                counters,
            },
            timestamp: now,
        };
        self.cache.set(
            CACHE_KEY,
            Arc::new(update.clone()),
            std::time::Duration::from_secs(self.config.cache_ttl_secs),
        );
        Ok(Some(update))
    }

    /// Scheduled tick: refresh counters and evaluate rules.
    pub async fn tick(&self) -> Result<()> {
        self.cache.evict(CACHE_KEY);
        if let Some(update) = self.updates().await? {
            info!(
                feedback = update.data.new_feedback,
                rule_alerts = update.data.rule_alerts.len(),
                "Realtime tick"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::clock::ManualClock;
    use crate::model::Sentiment;
    use crate::notification::NotificationQueue;
    use crate::rules::RuleInput;
    use crate::sector::Sector;
    use crate::storage::SqliteStore;
    use chrono::TimeZone;
    use sauti_common::{AlertsConfig, NotificationsConfig, RuntimeConfigStore};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn feedback(id: &str, location: &str, sector: Option<Sector>, hours_ago: i64) -> FeedbackItem {
        FeedbackItem {
            id: id.into(),
            text: "The clinic has no drugs".into(),
            source: "sms".into(),
            location: Some(location.into()),
            created_at: now() - Duration::hours(hours_ago),
            sentiment: Some(Sentiment::Negative),
            sector,
        }
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        store: Arc<SqliteStore>,
        rules: Arc<RuleEngine>,
        monitor: RealtimeMonitor,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(now()));
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let queue = Arc::new(NotificationQueue::start(
            &NotificationsConfig::default(),
            Arc::new(RuntimeConfigStore::in_memory()),
        ));
        let dispatcher = Arc::new(AlertDispatcher::new(
            store.clone(),
            queue,
            clock.clone(),
            &AlertsConfig::default(),
        ));
        let rules = Arc::new(RuleEngine::new(store.clone(), clock.clone()));
        let monitor = RealtimeMonitor::new(
            store.clone(),
            rules.clone(),
            dispatcher,
            Arc::new(TtlCache::<Arc<RealtimeUpdate>>::new(clock.clone())),
            clock.clone(),
            RealtimeConfig::default(),
        );
        Fixture {
            clock,
            store,
            rules,
            monitor,
        }
    }

    #[test]
    fn test_counters_lowercase_and_detect_sector() {
        let items = vec![
            feedback("1", "Nairobi", None, 1),
            feedback("2", " nairobi ", Some(Sector::Transport), 1),
        ];
        let counters = Counters::from_items(&items);
        assert_eq!(counters.by_county.get("nairobi"), Some(&2));
        assert_eq!(counters.by_sector.get("health"), Some(&1));
        assert_eq!(counters.by_sector.get("transport"), Some(&1));
    }

    #[tokio::test]
    async fn test_no_activity_returns_none() {
        let fx = fixture();
        assert!(fx.monitor.updates().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rule_fires_and_update_is_cached() {
        let fx = fixture();
        for i in 0..3 {
            fx.store
                .insert_feedback(&feedback(&format!("f{i}"), "Kisumu", Some(Sector::Health), 1))
                .await
                .unwrap();
        }
        fx.store
            .insert_feedback(&feedback("old", "Kisumu", Some(Sector::Health), 30))
            .await
            .unwrap();

        fx.rules
            .create(RuleInput {
                name: Some("Kisumu health".into()),
                sector: Some("Health".into()),
                county: Some("kisumu".into()),
                min_count: Some(3),
                ..RuleInput::default()
            })
            .await
            .unwrap();

        let update = fx.monitor.updates().await.unwrap().unwrap();
        assert_eq!(update.kind, "update");
        assert_eq!(update.data.new_feedback, 3);
        assert_eq!(update.data.rule_alerts.len(), 1);
        assert_eq!(update.data.rule_alerts[0].title, "Kisumu health");
        assert_eq!(update.data.counters.by_county.get("kisumu"), Some(&3));

        fx.clock.advance(Duration::seconds(2));
        let cached = fx.monitor.updates().await.unwrap().unwrap();
        assert_eq!(cached.data, update.data);
        assert_eq!(cached.timestamp, now() + Duration::seconds(2));
    }
}
