//! SQLite persistence for feedback, alerts and alert rules.
//!
//! One connection behind an async mutex. Timestamps are stored as RFC 3339
//! strings with microsecond precision and a `Z` suffix so they sort
//! lexically in time order.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::model::{Alert, AlertType, FeedbackItem, Sentiment, Severity};
use crate::rules::{AlertRule, RuleStore};
use crate::sector::Sector;
use crate::source::{FeedbackSource, SourceError};

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS citizen_feedback (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'unknown',
    location TEXT,
    sentiment TEXT,
    sector TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_feedback_created
ON citizen_feedback(created_at DESC);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    sector TEXT,
    affected_counties TEXT NOT NULL DEFAULT '[]',
    metadata TEXT NOT NULL DEFAULT '{}',
    dedup_key TEXT,
    acknowledged INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_alerts_type_created
ON alerts(alert_type, created_at DESC);

CREATE TABLE IF NOT EXISTS alert_rules (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    sector TEXT,
    county TEXT,
    min_count INTEGER,
    notify_slack INTEGER NOT NULL DEFAULT 0,
    notify_webhook INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
"#;

const ALERT_COLUMNS: &str = "id, alert_type, severity, title, description, sector, \
     affected_counties, metadata, dedup_key, acknowledged, created_at";

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse the timestamp stored in column `idx`. A corrupt value fails the row.
fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            warn!(column = idx, value = %s, "Corrupt timestamp in store");
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })
}

// ============================================================================
// Alert store interface
// ============================================================================

/// Filter for listing alerts. Newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertQuery {
    pub alert_type: Option<AlertType>,
    /// Exact severity match.
    pub severity: Option<Severity>,
    pub acknowledged: Option<bool>,
    /// `signal_type` recorded in the alert metadata.
    pub signal_type: Option<String>,
    pub limit: usize,
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            alert_type: None,
            severity: None,
            acknowledged: None,
            signal_type: None,
            limit: 50,
        }
    }
}

/// Persistence for alerts.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Store `alerts` in one transaction.
    ///
    /// With `dedup_since`, an alert whose type and title already exist at or
    /// after that instant (or earlier in the same batch) is skipped. Returns
    /// the alerts actually stored.
    async fn insert_alerts(
        &self,
        alerts: Vec<Alert>,
        dedup_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Alert>>;

    async fn list_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>>;

    /// Mark acknowledged. `None` when the id is unknown.
    async fn acknowledge_alert(&self, id: &str) -> Result<Option<Alert>>;

    /// Any alert of `alert_type` created at or after `since`, restricted to
    /// `dedup_key` when given.
    async fn alert_exists_since(
        &self,
        alert_type: AlertType,
        since: DateTime<Utc>,
        dedup_key: Option<&str>,
    ) -> Result<bool>;
}

// ============================================================================
// SQLite store
// ============================================================================

/// SQLite-backed implementation of every storage interface.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set database pragmas")?;

        let store = Self::init(conn)?;
        info!(db_path = %path.display(), "Initialized signal store");
        Ok(store)
    }

    /// A private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES_SQL)
            .context("Failed to create database tables")?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    /// Insert or replace a feedback item.
    pub async fn insert_feedback(&self, item: &FeedbackItem) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            r"
            INSERT OR REPLACE INTO citizen_feedback
                (id, text, source, location, sentiment, sector, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                item.id,
                item.text,
                item.source,
                item.location,
                item.sentiment.map(|s| s.as_str()),
                item.sector.map(|s| s.as_str()),
                ts(item.created_at),
            ],
        )
        .with_context(|| format!("Failed to insert feedback '{}'", item.id))?;
        Ok(())
    }

    /// Feedback created at or after `since`, newest first.
    pub async fn recent_feedback(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<FeedbackItem>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            r"
            SELECT id, text, source, location, sentiment, sector, created_at
            FROM citizen_feedback
            WHERE created_at >= ?1
            ORDER BY created_at DESC, id ASC
            LIMIT ?2
            ",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![ts(since), limit], Self::row_to_feedback)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn row_to_feedback(row: &rusqlite::Row) -> rusqlite::Result<FeedbackItem> {
        let sentiment: Option<String> = row.get(4)?;
        let sector: Option<String> = row.get(5)?;
        let created_at: String = row.get(6)?;

        Ok(FeedbackItem {
            id: row.get(0)?,
            text: row.get(1)?,
            source: row.get(2)?,
            location: row.get(3)?,
            sentiment: sentiment.as_deref().and_then(Sentiment::parse),
            sector: sector.as_deref().map(Sector::from_label),
            created_at: parse_ts(6, &created_at)?,
        })
    }

    // ========================================================================
    // Alerts
    // ========================================================================

    fn row_to_alert(row: &rusqlite::Row) -> rusqlite::Result<Alert> {
        let alert_type: String = row.get(1)?;
        let severity: String = row.get(2)?;
        let counties: String = row.get(6)?;
        let metadata: String = row.get(7)?;
        let acknowledged: i64 = row.get(9)?;
        let created_at: String = row.get(10)?;

        Ok(Alert {
            id: row.get(0)?,
            alert_type: alert_type.parse().unwrap_or(AlertType::CrisisSignal),
            severity: severity.parse().unwrap_or(Severity::Medium),
            title: row.get(3)?,
            description: row.get(4)?,
            sector: row.get(5)?,
            affected_counties: serde_json::from_str(&counties).unwrap_or_default(),
            metadata: serde_json::from_str(&metadata)
                .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new())),
            dedup_key: row.get(8)?,
            acknowledged: acknowledged != 0,
            created_at: parse_ts(10, &created_at)?,
        })
    }

    fn get_alert(conn: &Connection, id: &str) -> Result<Option<Alert>> {
        conn.query_row(
            &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"),
            params![id],
            Self::row_to_alert,
        )
        .optional()
        .with_context(|| format!("Failed to get alert '{id}'"))
    }

    // ========================================================================
    // Rules
    // ========================================================================

    fn row_to_rule(row: &rusqlite::Row) -> rusqlite::Result<AlertRule> {
        let enabled: i64 = row.get(2)?;
        let notify_slack: i64 = row.get(6)?;
        let notify_webhook: i64 = row.get(7)?;
        let created_at: String = row.get(8)?;

        Ok(AlertRule {
            id: row.get(0)?,
            name: row.get(1)?,
            enabled: enabled != 0,
            sector: row.get(3)?,
            county: row.get(4)?,
            min_count: row.get(5)?,
            notify_slack: notify_slack != 0,
            notify_webhook: notify_webhook != 0,
            created_at: parse_ts(8, &created_at)?,
        })
    }
}

#[async_trait]
impl FeedbackSource for SqliteStore {
    async fn fetch_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> std::result::Result<Vec<FeedbackItem>, SourceError> {
        self.recent_feedback(since, limit)
            .await
            .map_err(|e| SourceError::Query(format!("{e:#}")))
    }
}

#[async_trait]
impl AlertStore for SqliteStore {
    async fn insert_alerts(
        &self,
        alerts: Vec<Alert>,
        dedup_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Alert>> {
        if alerts.is_empty() {
            return Ok(Vec::new());
        }

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let mut stored = Vec::with_capacity(alerts.len());
        let mut seen: HashSet<(AlertType, String)> = HashSet::new();

        for alert in alerts {
            if let Some(since) = dedup_since {
                let batch_dup = !seen.insert((alert.alert_type, alert.title.clone()));
                let stored_dup = tx
                    .query_row(
                        r"
                        SELECT 1 FROM alerts
                        WHERE alert_type = ?1 AND title = ?2 AND created_at >= ?3
                        LIMIT 1
                        ",
                        params![alert.alert_type.as_str(), alert.title, ts(since)],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                if batch_dup || stored_dup {
                    debug!(alert_type = %alert.alert_type, title = %alert.title, "Skipping duplicate alert");
                    continue;
                }
            }

            tx.execute(
                &format!(
                    "INSERT INTO alerts ({ALERT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    alert.id,
                    alert.alert_type.as_str(),
                    alert.severity.as_str(),
                    alert.title,
                    alert.description,
                    alert.sector,
                    serde_json::to_string(&alert.affected_counties)?,
                    serde_json::to_string(&alert.metadata)?,
                    alert.dedup_key,
                    i64::from(alert.acknowledged),
                    ts(alert.created_at),
                ],
            )
            .with_context(|| format!("Failed to insert alert '{}'", alert.id))?;
            stored.push(alert);
        }

        tx.commit().context("Failed to commit alert batch")?;
        Ok(stored)
    }

    async fn list_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        let db = self.db.lock().await;

        let mut sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE 1 = 1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(alert_type) = query.alert_type {
            args.push(Box::new(alert_type.as_str()));
            sql.push_str(&format!(" AND alert_type = ?{}", args.len()));
        }
        if let Some(severity) = query.severity {
            args.push(Box::new(severity.as_str()));
            sql.push_str(&format!(" AND severity = ?{}", args.len()));
        }
        if let Some(acknowledged) = query.acknowledged {
            args.push(Box::new(i64::from(acknowledged)));
            sql.push_str(&format!(" AND acknowledged = ?{}", args.len()));
        }
        if let Some(signal_type) = &query.signal_type {
            args.push(Box::new(signal_type.clone()));
            sql.push_str(&format!(
                " AND json_extract(metadata, '$.signal_type') = ?{}",
                args.len()
            ));
        }
        args.push(Box::new(i64::try_from(query.limit).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" ORDER BY created_at DESC, id ASC LIMIT ?{}", args.len()));

        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            Self::row_to_alert,
        )?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    async fn acknowledge_alert(&self, id: &str) -> Result<Option<Alert>> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE alerts SET acknowledged = 1 WHERE id = ?1",
            params![id],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        Self::get_alert(&db, id)
    }

    async fn alert_exists_since(
        &self,
        alert_type: AlertType,
        since: DateTime<Utc>,
        dedup_key: Option<&str>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let found = match dedup_key {
            Some(key) => db
                .query_row(
                    r"
                    SELECT 1 FROM alerts
                    WHERE alert_type = ?1 AND created_at >= ?2 AND dedup_key = ?3
                    LIMIT 1
                    ",
                    params![alert_type.as_str(), ts(since), key],
                    |_| Ok(()),
                )
                .optional()?,
            None => db
                .query_row(
                    "SELECT 1 FROM alerts WHERE alert_type = ?1 AND created_at >= ?2 LIMIT 1",
                    params![alert_type.as_str(), ts(since)],
                    |_| Ok(()),
                )
                .optional()?,
        };
        Ok(found.is_some())
    }
}

#[async_trait]
impl RuleStore for SqliteStore {
    async fn list_rules(&self) -> Result<Vec<AlertRule>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            r"
            SELECT id, name, enabled, sector, county, min_count,
                   notify_slack, notify_webhook, created_at
            FROM alert_rules
            ORDER BY created_at ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], Self::row_to_rule)?;

        let mut rules = Vec::new();
        for row in rows {
            rules.push(row?);
        }
        Ok(rules)
    }

    async fn get_rule(&self, id: &str) -> Result<Option<AlertRule>> {
        let db = self.db.lock().await;
        db.query_row(
            r"
            SELECT id, name, enabled, sector, county, min_count,
                   notify_slack, notify_webhook, created_at
            FROM alert_rules WHERE id = ?1
            ",
            params![id],
            Self::row_to_rule,
        )
        .optional()
        .with_context(|| format!("Failed to get rule '{id}'"))
    }

    async fn upsert_rule(&self, rule: &AlertRule) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            r"
            INSERT OR REPLACE INTO alert_rules
                (id, name, enabled, sector, county, min_count,
                 notify_slack, notify_webhook, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                rule.id,
                rule.name,
                i64::from(rule.enabled),
                rule.sector,
                rule.county,
                rule.min_count,
                i64::from(rule.notify_slack),
                i64::from(rule.notify_webhook),
                ts(rule.created_at),
            ],
        )
        .with_context(|| format!("Failed to save rule '{}'", rule.id))?;
        Ok(())
    }

    async fn delete_rule(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM alert_rules WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
