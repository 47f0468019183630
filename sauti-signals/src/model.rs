//! Core data model: feedback items, snapshots, severities and alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::sector::Sector;

// ============================================================================
// Severity
// ============================================================================

/// Alert and signal severity. Ordering is total: critical > high > medium > low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

// ============================================================================
// Feedback
// ============================================================================

/// Sentiment label assigned upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    /// Parse a stored label; anything unrecognised is treated as unknown.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// One piece of citizen feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub id: String,
    pub text: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `None` when the classifier has not labelled the item.
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub sector: Option<Sector>,
}

fn default_source() -> String {
    "unknown".into()
}

impl FeedbackItem {
    pub fn is_negative(&self) -> bool {
        self.sentiment == Some(Sentiment::Negative)
    }

    /// Lowercased, trimmed location, if any.
    pub fn location_key(&self) -> Option<String> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_lowercase)
    }
}

/// The bounded, newest-first slice of feedback one detection cycle works on.
///
/// Cloning is cheap; all clones share the same items.
#[derive(Debug, Clone)]
pub struct FeedbackSnapshot {
    items: Arc<[FeedbackItem]>,
    window_hours: u32,
    taken_at: DateTime<Utc>,
}

impl FeedbackSnapshot {
    /// Upper bound on items in a snapshot.
    pub const MAX_ITEMS: usize = 1000;

    /// Build a snapshot. Items are ordered newest first (ties by id) and capped.
    pub fn new(mut items: Vec<FeedbackItem>, window_hours: u32, taken_at: DateTime<Utc>) -> Self {
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        items.truncate(Self::MAX_ITEMS);

        Self {
            items: items.into(),
            window_hours,
            taken_at,
        }
    }

    pub fn empty(window_hours: u32, taken_at: DateTime<Utc>) -> Self {
        Self::new(Vec::new(), window_hours, taken_at)
    }

    pub fn items(&self) -> &[FeedbackItem] {
        &self.items
    }

    /// The first `n` items (or all of them).
    pub fn prefix(&self, n: usize) -> &[FeedbackItem] {
        &self.items[..n.min(self.items.len())]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn window_hours(&self) -> u32 {
        self.window_hours
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn negative_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_negative()).count()
    }

    /// Share of negative items in `[0, 1]`; 0 for an empty snapshot.
    pub fn negative_fraction(&self) -> f64 {
        if self.items.is_empty() {
            return 0.0;
        }
        self.negative_count() as f64 / self.items.len() as f64
    }

    /// A snapshot over the items matching `keep`, same window and timestamp.
    pub fn filtered(&self, keep: impl Fn(&FeedbackItem) -> bool) -> Self {
        let items: Vec<FeedbackItem> = self.items.iter().filter(|i| keep(i)).cloned().collect();
        Self {
            items: items.into(),
            window_hours: self.window_hours,
            taken_at: self.taken_at,
        }
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// What produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    RedFlag,
    TrendingIssue,
    CrisisSignal,
    RuleTriggered,
    Test,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RedFlag => "red_flag",
            Self::TrendingIssue => "trending_issue",
            Self::CrisisSignal => "crisis_signal",
            Self::RuleTriggered => "rule_triggered",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red_flag" => Ok(Self::RedFlag),
            "trending_issue" => Ok(Self::TrendingIssue),
            "crisis_signal" => Ok(Self::CrisisSignal),
            "rule_triggered" => Ok(Self::RuleTriggered),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown alert type: {other}")),
        }
    }
}

/// Which channels an alert should be delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyTargets {
    pub chat: bool,
    pub webhook: bool,
}

impl Default for NotifyTargets {
    fn default() -> Self {
        Self {
            chat: true,
            webhook: true,
        }
    }
}

impl NotifyTargets {
    pub fn any(&self) -> bool {
        self.chat || self.webhook
    }
}

/// A persisted alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub affected_counties: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
}

/// An alert that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub sector: Option<String>,
    pub affected_counties: Vec<String>,
    pub metadata: serde_json::Value,
    pub dedup_key: Option<String>,
    pub notify: NotifyTargets,
}

impl AlertDraft {
    pub fn new(
        alert_type: AlertType,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            severity,
            title: title.into(),
            description: description.into(),
            sector: None,
            affected_counties: Vec::new(),
            metadata: serde_json::Value::Object(Default::default()),
            dedup_key: None,
            notify: NotifyTargets::default(),
        }
    }

    pub fn into_alert(self, id: String, created_at: DateTime<Utc>) -> Alert {
        Alert {
            id,
            alert_type: self.alert_type,
            severity: self.severity,
            title: self.title,
            description: self.description,
            sector: self.sector,
            affected_counties: self.affected_counties,
            metadata: self.metadata,
            created_at,
            acknowledged: false,
            dedup_key: self.dedup_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn item(id: &str, minutes_ago: i64, sentiment: Option<Sentiment>) -> FeedbackItem {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        FeedbackItem {
            id: id.into(),
            text: format!("item {id}"),
            source: "twitter".into(),
            location: Some(" Nairobi ".into()),
            created_at: now - Duration::minutes(minutes_ago),
            sentiment,
            sector: None,
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!("HIGH".parse::<Severity>(), Ok(Severity::High));
    }

    #[test]
    fn test_snapshot_orders_newest_first_and_caps() {
        let now = Utc::now();
        let items: Vec<FeedbackItem> = (0..1200)
            .map(|i| item(&format!("{i:04}"), i, Some(Sentiment::Neutral)))
            .collect();
        let snapshot = FeedbackSnapshot::new(items, 24, now);
        assert_eq!(snapshot.len(), FeedbackSnapshot::MAX_ITEMS);
        assert_eq!(snapshot.items()[0].id, "0000");
        assert_eq!(snapshot.prefix(3).len(), 3);
        assert_eq!(snapshot.prefix(5000).len(), 1000);
    }

    #[test]
    fn test_negative_fraction() {
        let snapshot = FeedbackSnapshot::new(
            vec![
                item("a", 1, Some(Sentiment::Negative)),
                item("b", 2, Some(Sentiment::Negative)),
                item("c", 3, Some(Sentiment::Positive)),
                item("d", 4, None),
            ],
            24,
            Utc::now(),
        );
        assert_eq!(snapshot.negative_count(), 2);
        assert!((snapshot.negative_fraction() - 0.5).abs() < f64::EPSILON);
        assert_eq!(FeedbackSnapshot::empty(24, Utc::now()).negative_fraction(), 0.0);
    }

    #[test]
    fn test_feedback_item_defaults() {
        let json = r#"{"id":"x","text":"hello","created_at":"2026-03-01T12:00:00Z"}"#;
        let parsed: FeedbackItem = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.source, "unknown");
        assert_eq!(parsed.sentiment, None);
        assert_eq!(item("a", 0, None).location_key().as_deref(), Some("nairobi"));
    }

    #[test]
    fn test_alert_type_round_trips_as_str() {
        for t in [
            AlertType::RedFlag,
            AlertType::TrendingIssue,
            AlertType::CrisisSignal,
            AlertType::RuleTriggered,
            AlertType::Test,
        ] {
            assert_eq!(t.as_str().parse::<AlertType>(), Ok(t));
        }
    }
}
