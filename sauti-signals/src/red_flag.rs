//! Red-flag detection for single feedback items and trending complaints.
//!
//! Keyword tiers are checked critical first; the first keyword found in the
//! first matching tier decides the severity.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use sauti_common::util::{snippet, title_case, truncate_with_ellipsis};
use sauti_common::{AlertsConfig, RedFlagDedupMode};

use crate::clock::Clock;
use crate::model::{AlertDraft, AlertType, FeedbackItem, Severity};
use crate::sector::detect_sector;
use crate::signal::{CrisisSignal, SignalKind};
use crate::storage::AlertStore;

// ============================================================================
// Keyword tiers
// ============================================================================

pub const CRITICAL_KEYWORDS: &[&str] = &[
    "collapse",
    "collapsing",
    "emergency",
    "urgent",
    "dangerous",
    "life-threatening",
    "death",
    "died",
    "fatal",
    "accident",
    "disaster",
    "crisis",
    "outbreak",
    "epidemic",
    "violence",
    "attack",
    "fire",
    "flood",
    "landslide",
];

pub const HIGH_KEYWORDS: &[&str] = &[
    "broken",
    "damaged",
    "unsafe",
    "hazardous",
    "contaminated",
    "polluted",
    "corruption",
    "fraud",
    "theft",
    "robbery",
    "missing",
    "lost",
    "stolen",
    "abandoned",
    "neglected",
];

pub const MEDIUM_KEYWORDS: &[&str] = &[
    "problem",
    "issue",
    "concern",
    "complaint",
    "poor",
    "inadequate",
    "insufficient",
    "delayed",
    "late",
    "slow",
];

const TIERS: [(Severity, &[&str]); 3] = [
    (Severity::Critical, CRITICAL_KEYWORDS),
    (Severity::High, HIGH_KEYWORDS),
    (Severity::Medium, MEDIUM_KEYWORDS),
];

const TITLE_MAX_CHARS: usize = 80;
const DESCRIPTION_SNIPPET_CHARS: usize = 300;
const METADATA_SNIPPET_CHARS: usize = 200;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid sentence pattern"));

// ============================================================================
// Classification
// ============================================================================

/// Tier and keyword that flagged an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedFlagMatch {
    pub severity: Severity,
    pub keyword: String,
}

/// Classify `text`; `None` when no tier matches.
pub fn classify(text: &str) -> Option<RedFlagMatch> {
    let lower = text.to_lowercase();
    TIERS.iter().find_map(|(severity, keywords)| {
        keywords
            .iter()
            .find(|k| lower.contains(*k))
            .map(|k| RedFlagMatch {
                severity: *severity,
                keyword: (*k).to_string(),
            })
    })
}

/// Text up to the first sentence terminator, trimmed.
fn first_sentence(text: &str) -> &str {
    SENTENCE_END
        .split(text)
        .next()
        .map(str::trim)
        .unwrap_or_default()
}

pub fn red_flag_title(text: &str, severity: Severity) -> String {
    let sentence = truncate_with_ellipsis(first_sentence(text), TITLE_MAX_CHARS);
    let prefix = if severity == Severity::Critical {
        "🚨 CRITICAL: "
    } else {
        "⚠️ "
    };
    format!("{prefix}{sentence}")
}

pub fn red_flag_description(text: &str, keyword: &str, location: Option<&str>) -> String {
    let mut desc = format!("Red flag detected in citizen feedback. Keywords: {keyword}. ");
    if let Some(location) = location.filter(|l| !l.trim().is_empty()) {
        desc.push_str(&format!("Location: {location}. "));
    }
    desc.push_str(&format!(
        "Details: {}",
        snippet(text, DESCRIPTION_SNIPPET_CHARS)
    ));
    desc
}

/// Fingerprint of keyword, location and opening sentence.
pub fn content_key(item: &FeedbackItem, keyword: &str) -> String {
    let material = format!(
        "{}|{}|{}",
        keyword.to_lowercase(),
        item.location_key().unwrap_or_default(),
        first_sentence(&item.text).to_lowercase()
    );
    format!("{:016x}", xxh3_64(material.as_bytes()))
}

/// Fingerprint of a batch cluster: one per critical keyword.
pub fn cluster_key(keyword: &str) -> String {
    format!("{:016x}", xxh3_64(format!("cluster|{}", keyword.to_lowercase()).as_bytes()))
}

/// Alert draft for a flagged item. Carries its content key for later dedup.
pub fn red_flag_draft(item: &FeedbackItem, flag: &RedFlagMatch) -> AlertDraft {
    let mut draft = AlertDraft::new(
        AlertType::RedFlag,
        flag.severity,
        red_flag_title(&item.text, flag.severity),
        red_flag_description(&item.text, &flag.keyword, item.location.as_deref()),
    );
    draft.sector = Some(detect_sector(&item.text).as_str().to_string());
    draft.affected_counties = item
        .location
        .iter()
        .filter(|l| !l.trim().is_empty())
        .cloned()
        .collect();
    draft.metadata = json!({
        "feedback_id": item.id,
        "source": item.source,
        "matched_keywords": [flag.keyword],
        "text_snippet": snippet(&item.text, METADATA_SNIPPET_CHARS),
    });
    draft.dedup_key = Some(content_key(item, &flag.keyword));
    draft
}

// ============================================================================
// Batch scan
// ============================================================================

/// Critical-tier reports sharing one keyword within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedFlagCluster {
    pub keyword: String,
    pub severity: Severity,
    pub count: usize,
    pub sector: String,
    pub feedback_ids: Vec<String>,
    /// Distinct locations, sorted.
    pub affected_counties: Vec<String>,
}

fn distinct_counties(items: &[&FeedbackItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| i.location.as_deref())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// One critical red-flag signal per critical keyword found in `items`.
///
/// Items must be newest first; the newest report of each cluster supplies the
/// title and description. Signals follow keyword tier order.
pub fn red_flag_scan(items: &[FeedbackItem]) -> Vec<CrisisSignal> {
    let mut clusters: HashMap<&str, Vec<&FeedbackItem>> = HashMap::new();
    for item in items {
        if let Some(flag) = classify(&item.text).filter(|f| f.severity == Severity::Critical) {
            if let Some(keyword) = CRITICAL_KEYWORDS.iter().copied().find(|k| *k == flag.keyword) {
                clusters.entry(keyword).or_default().push(item);
            }
        }
    }

    CRITICAL_KEYWORDS
        .iter()
        .filter_map(|keyword| clusters.get(keyword).map(|members| (*keyword, members)))
        .map(|(keyword, members)| {
            let newest = members[0];
            let mut description =
                red_flag_description(&newest.text, keyword, newest.location.as_deref());
            if members.len() > 1 {
                description.push_str(&format!(" ({} related reports)", members.len()));
            }

            CrisisSignal {
                severity: Severity::Critical,
                title: red_flag_title(&newest.text, Severity::Critical),
                description,
                recommendation: "Verify the report and dispatch the responsible agency".into(),
                kind: SignalKind::RedFlag(RedFlagCluster {
                    keyword: keyword.to_string(),
                    severity: Severity::Critical,
                    count: members.len(),
                    sector: detect_sector(&newest.text).as_str().to_string(),
                    feedback_ids: members.iter().map(|i| i.id.clone()).collect(),
                    affected_counties: distinct_counties(members),
                }),
            }
        })
        .collect()
}

// ============================================================================
// Trending complaints
// ============================================================================

/// A critical or high keyword reported by many items in one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingIssue {
    pub keyword: String,
    pub count: usize,
    pub time_window_hours: u32,
    pub severity: Severity,
    pub sector: String,
    pub feedback_ids: Vec<String>,
    /// Distinct locations, sorted.
    pub affected_counties: Vec<String>,
}

/// Group items by their first critical or high keyword and keep groups of at
/// least `threshold` items. Largest groups first, ties by keyword.
pub fn trending_complaints(
    items: &[FeedbackItem],
    window_hours: u32,
    threshold: usize,
) -> Vec<TrendingIssue> {
    let threshold = threshold.max(1);
    if items.len() < threshold {
        return Vec::new();
    }

    let mut groups: HashMap<&'static str, Vec<&FeedbackItem>> = HashMap::new();
    for item in items {
        let lower = item.text.to_lowercase();
        if let Some(keyword) = CRITICAL_KEYWORDS
            .iter()
            .chain(HIGH_KEYWORDS)
            .copied()
            .find(|k| lower.contains(k))
        {
            groups.entry(keyword).or_default().push(item);
        }
    }

    let mut issues: Vec<TrendingIssue> = groups
        .into_iter()
        .filter(|(_, members)| members.len() >= threshold)
        .map(|(keyword, members)| {
            TrendingIssue {
                keyword: keyword.to_string(),
                count: members.len(),
                time_window_hours: window_hours,
                severity: if members.len() >= threshold * 2 {
                    Severity::High
                } else {
                    Severity::Medium
                },
                sector: detect_sector(&members[0].text).as_str().to_string(),
                feedback_ids: members.iter().map(|i| i.id.clone()).collect(),
                affected_counties: distinct_counties(&members),
            }
        })
        .collect();

    issues.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.keyword.cmp(&b.keyword)));
    issues
}

pub fn trending_issue_signal(issue: &TrendingIssue) -> CrisisSignal {
    CrisisSignal {
        severity: issue.severity,
        title: format!(
            "Trending Issue: {} ({} reports)",
            title_case(&issue.keyword),
            issue.count
        ),
        description: format!(
            "Multiple reports ({}) about '{}' in the last {} hours.",
            issue.count, issue.keyword, issue.time_window_hours
        ),
        recommendation: "Investigate the reported issue and brief the responsible department"
            .into(),
        kind: SignalKind::TrendingIssue(issue.clone()),
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Suppression of new red-flag alerts by those stored within the window.
///
/// In type-window mode any red flag inside the window suppresses; in
/// content-key mode only one carrying the same dedup key does.
#[derive(Debug, Clone, Copy)]
pub struct RedFlagGate {
    mode: RedFlagDedupMode,
    window: Duration,
}

impl RedFlagGate {
    pub fn new(config: &AlertsConfig) -> Self {
        Self {
            mode: config.red_flag_dedup,
            window: Duration::hours(i64::from(config.red_flag_window_hours)),
        }
    }

    /// Whether `draft` may be raised at `now`. A failed lookup admits it.
    pub async fn admits(&self, alerts: &dyn AlertStore, draft: &AlertDraft, now: DateTime<Utc>) -> bool {
        let key = match self.mode {
            RedFlagDedupMode::TypeWindow => None,
            RedFlagDedupMode::ContentKey => draft.dedup_key.as_deref(),
        };

        match alerts
            .alert_exists_since(AlertType::RedFlag, now - self.window, key)
            .await
        {
            Ok(true) => {
                debug!(title = %draft.title, "Red flag suppressed by recent alert");
                false
            }
            Ok(false) => true,
            Err(e) => {
                warn!(error = %e, title = %draft.title, "Red flag dedup check failed, raising anyway");
                true
            }
        }
    }
}

/// Single-item red-flag check with suppression against stored alerts.
pub struct RedFlagDetector {
    alerts: Arc<dyn AlertStore>,
    clock: Arc<dyn Clock>,
    gate: RedFlagGate,
}

impl RedFlagDetector {
    pub fn new(alerts: Arc<dyn AlertStore>, clock: Arc<dyn Clock>, config: &AlertsConfig) -> Self {
        Self {
            alerts,
            clock,
            gate: RedFlagGate::new(config),
        }
    }

    /// Draft a red-flag alert for `item`, or `None` when it has no red-flag
    /// keyword or a matching alert was stored within the window.
    pub async fn check_item(&self, item: &FeedbackItem) -> Option<AlertDraft> {
        let flag = classify(&item.text)?;
        let draft = red_flag_draft(item, &flag);

        if self
            .gate
            .admits(self.alerts.as_ref(), &draft, self.clock.now())
            .await
        {
            Some(draft)
        } else {
            debug!(feedback_id = %item.id, keyword = %flag.keyword, "Red flag not raised");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::SqliteStore;
    use chrono::{DateTime, TimeZone, Utc};
    use test_case::test_case;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn item(id: &str, text: &str, location: Option<&str>) -> FeedbackItem {
        FeedbackItem {
            id: id.into(),
            text: text.into(),
            source: "sms".into(),
            location: location.map(String::from),
            created_at: now(),
            sentiment: None,
            sector: None,
        }
    }

    #[test_case("The bridge may collapse any moment", Some(Severity::Critical), "collapse")]
    #[test_case("Water pipe broken and a fire nearby", Some(Severity::Critical), "fire")]
    #[test_case("Broken streetlights everywhere", Some(Severity::High), "broken")]
    #[test_case("Service is slow", Some(Severity::Medium), "slow")]
    #[test_case("Thank you for the new road", None, "")]
    fn test_classify_tiers(text: &str, severity: Option<Severity>, keyword: &str) {
        let flag = classify(text);
        assert_eq!(flag.as_ref().map(|f| f.severity), severity);
        if let Some(flag) = flag {
            assert_eq!(flag.keyword, keyword);
        }
    }

    #[test]
    fn test_title_uses_first_sentence_and_prefix() {
        assert_eq!(
            red_flag_title("Bridge collapsed! Help us now.", Severity::Critical),
            "🚨 CRITICAL: Bridge collapsed"
        );
        assert_eq!(
            red_flag_title("Pipes are broken", Severity::High),
            "⚠️ Pipes are broken"
        );

        let long = "a".repeat(120);
        let title = red_flag_title(&long, Severity::Medium);
        assert_eq!(title, format!("⚠️ {}...", "a".repeat(77)));
    }

    #[test]
    fn test_description_and_draft() {
        let feedback = item(
            "f1",
            "The hospital roof may collapse. Patients are at risk.",
            Some("Kisumu"),
        );
        let flag = classify(&feedback.text).unwrap();
        let draft = red_flag_draft(&feedback, &flag);

        assert_eq!(draft.severity, Severity::Critical);
        assert_eq!(draft.sector.as_deref(), Some("health"));
        assert_eq!(draft.affected_counties, vec!["Kisumu"]);
        assert!(draft
            .description
            .starts_with("Red flag detected in citizen feedback. Keywords: collapse. Location: Kisumu. Details: The hospital"));
        assert_eq!(draft.metadata["feedback_id"], "f1");
        assert_eq!(draft.metadata["matched_keywords"][0], "collapse");
    }

    #[test]
    fn test_content_key_ignores_case_and_trailing_text() {
        let a = item("1", "Road is BROKEN. Since May.", Some("Nairobi"));
        let b = item("2", "road is broken! nobody came", Some(" nairobi "));
        let c = item("3", "road is broken", Some("Mombasa"));
        assert_eq!(content_key(&a, "broken"), content_key(&b, "broken"));
        assert_ne!(content_key(&a, "broken"), content_key(&c, "broken"));
    }

    #[test]
    fn test_trending_groups_by_first_keyword() {
        let mut items: Vec<FeedbackItem> = (0..10)
            .map(|i| item(&format!("c{i}"), "building collapse downtown", Some("Nairobi")))
            .collect();
        items.extend((0..5).map(|i| item(&format!("t{i}"), "phone stolen at the bus stage", Some("Nakuru"))));
        items.extend((0..4).map(|i| item(&format!("f{i}"), "fraud at the office", None)));

        let issues = trending_complaints(&items, 24, 5);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].keyword, "collapse");
        assert_eq!(issues[0].severity, Severity::High);
        assert_eq!(issues[1].keyword, "stolen");
        assert_eq!(issues[1].severity, Severity::Medium);
        assert_eq!(issues[1].sector, "transport");

        let signal = trending_issue_signal(&issues[0]);
        assert_eq!(signal.title, "Trending Issue: Collapse (10 reports)");
        assert_eq!(
            signal.description,
            "Multiple reports (10) about 'collapse' in the last 24 hours."
        );
    }

    #[test]
    fn test_trending_needs_threshold_items() {
        let items: Vec<FeedbackItem> = (0..4)
            .map(|i| item(&format!("c{i}"), "collapse", None))
            .collect();
        assert!(trending_complaints(&items, 24, 5).is_empty());
    }

    #[test]
    fn test_red_flag_scan_clusters_critical_reports() {
        let items = vec![
            item("n", "Bridge collapse near the market. Come quickly", Some("Kisumu")),
            item("o", "the old bridge could collapse", Some("Siaya")),
            item("f", "Fire at the depot", None),
            item("b", "Broken lights", Some("Kisumu")),
        ];
        let signals = red_flag_scan(&items);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].title, "🚨 CRITICAL: Bridge collapse near the market");
        assert_eq!(signals[0].alert_type(), AlertType::RedFlag);
        match &signals[0].kind {
            SignalKind::RedFlag(cluster) => {
                assert_eq!(cluster.count, 2);
                assert_eq!(cluster.feedback_ids, vec!["n", "o"]);
                assert_eq!(cluster.affected_counties, vec!["Kisumu", "Siaya"]);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(signals[0].description.ends_with("(2 related reports)"));
        assert_eq!(signals[1].severity, Severity::Critical);
    }

    async fn detector(mode: RedFlagDedupMode) -> (Arc<SqliteStore>, Arc<ManualClock>, RedFlagDetector) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(now()));
        let config = AlertsConfig {
            red_flag_dedup: mode,
            ..AlertsConfig::default()
        };
        let detector = RedFlagDetector::new(store.clone(), clock.clone(), &config);
        (store, clock, detector)
    }

    #[tokio::test]
    async fn test_type_window_suppresses_any_recent_red_flag() {
        let (store, clock, detector) = detector(RedFlagDedupMode::TypeWindow).await;
        let first = detector
            .check_item(&item("1", "Fire at the market", Some("Nairobi")))
            .await
            .unwrap();
        store
            .insert_alerts(vec![first.into_alert("a1".into(), now())], None)
            .await
            .unwrap();

        let unrelated = item("2", "School roof broken", Some("Kisumu"));
        assert!(detector.check_item(&unrelated).await.is_none());

        clock.advance(Duration::hours(25));
        assert!(detector.check_item(&unrelated).await.is_some());
    }

    #[tokio::test]
    async fn test_content_key_only_suppresses_same_report() {
        let (store, _clock, detector) = detector(RedFlagDedupMode::ContentKey).await;
        let first = detector
            .check_item(&item("1", "Fire at the market", Some("Nairobi")))
            .await
            .unwrap();
        store
            .insert_alerts(vec![first.into_alert("a1".into(), now())], None)
            .await
            .unwrap();

        assert!(detector
            .check_item(&item("2", "fire at the market!", Some("nairobi")))
            .await
            .is_none());
        assert!(detector
            .check_item(&item("3", "School roof broken", Some("Kisumu")))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_no_keyword_no_alert() {
        let (_store, _clock, detector) = detector(RedFlagDedupMode::TypeWindow).await;
        assert!(detector
            .check_item(&item("1", "Thanks for the new clinic", None))
            .await
            .is_none());
    }
}
