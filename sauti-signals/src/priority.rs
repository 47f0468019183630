//! Composite priority score for a single feedback item.
//!
//! Five components add up to at most 95 points: sentiment (25), urgency
//! keywords (25), report volume at the same location (20), sector
//! criticality (15) and recency (10).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

use sauti_common::util::round2;

use crate::model::{FeedbackItem, FeedbackSnapshot, Sentiment, Severity};
use crate::sector::{detect_sector, Sector};

const CRITICAL_URGENCY: &[&str] = &[
    "emergency",
    "urgent",
    "immediate",
    "critical",
    "life-threatening",
    "dangerous",
    "collapse",
    "accident",
    "death",
    "fatal",
];

const HIGH_URGENCY: &[&str] = &[
    "broken",
    "damaged",
    "unsafe",
    "hazardous",
    "problem",
    "issue",
    "concern",
    "complaint",
];

/// Trailing window used for the volume component.
const VOLUME_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriorityBreakdown {
    pub sentiment: f64,
    pub urgency_keywords: f64,
    pub volume_trend: f64,
    pub sector_criticality: f64,
    pub time_decay: f64,
}

impl PriorityBreakdown {
    pub fn total(&self) -> f64 {
        self.sentiment
            + self.urgency_keywords
            + self.volume_trend
            + self.sector_criticality
            + self.time_decay
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityScore {
    pub feedback_id: String,
    /// In `[0, 100]`, two decimals.
    pub score: f64,
    pub level: Severity,
    pub breakdown: PriorityBreakdown,
}

pub fn sentiment_weight(sentiment: Option<Sentiment>) -> f64 {
    match sentiment {
        Some(Sentiment::Negative) => 25.0,
        Some(Sentiment::Positive) => 5.0,
        Some(Sentiment::Neutral) | None => 10.0,
    }
}

pub fn urgency_weight(text: &str) -> f64 {
    let lower = text.to_lowercase();
    if CRITICAL_URGENCY.iter().any(|k| lower.contains(k)) {
        25.0
    } else if HIGH_URGENCY.iter().any(|k| lower.contains(k)) {
        15.0
    } else {
        5.0
    }
}

/// `similar` counts the item itself.
pub fn volume_weight(similar: usize) -> f64 {
    match similar {
        n if n >= 10 => 20.0,
        n if n >= 5 => 15.0,
        n if n >= 2 => 10.0,
        _ => 5.0,
    }
}

pub fn sector_weight(sector: Sector) -> f64 {
    match sector {
        Sector::Health | Sector::Security => 15.0,
        Sector::Infrastructure => 12.0,
        Sector::Governance => 10.0,
        Sector::Education | Sector::Transport => 8.0,
        Sector::Economy => 7.0,
        Sector::Environment => 6.0,
        Sector::Other => 5.0,
    }
}

pub fn time_decay_weight(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours_ago = (now - created_at).num_seconds() as f64 / 3600.0;
    if hours_ago < 1.0 {
        10.0
    } else if hours_ago < 6.0 {
        8.0
    } else if hours_ago < 24.0 {
        6.0
    } else if hours_ago < 72.0 {
        4.0
    } else {
        2.0
    }
}

/// Level thresholds: 80 critical, 60 high, 40 medium.
pub fn level_for(score: f64) -> Severity {
    if score >= 80.0 {
        Severity::Critical
    } else if score >= 60.0 {
        Severity::High
    } else if score >= 40.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Scores items against the feedback around them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScorer;

impl PriorityScorer {
    /// Score `item` given `similar`, the number of reports from the same
    /// location (or all reports, when the item has none) in the trailing 24 h.
    pub fn score_with_volume(
        &self,
        item: &FeedbackItem,
        similar: usize,
        now: DateTime<Utc>,
    ) -> PriorityScore {
        let sector = item.sector.unwrap_or_else(|| detect_sector(&item.text));
        let breakdown = PriorityBreakdown {
            sentiment: sentiment_weight(item.sentiment),
            urgency_keywords: urgency_weight(&item.text),
            volume_trend: volume_weight(similar),
            sector_criticality: sector_weight(sector),
            time_decay: time_decay_weight(item.created_at, now),
        };

        let score = round2(breakdown.total().clamp(0.0, 100.0));
        PriorityScore {
            feedback_id: item.id.clone(),
            score,
            level: level_for(score),
            breakdown,
        }
    }

    /// Score `item` against `recent`, which should include the item itself.
    pub fn score(
        &self,
        item: &FeedbackItem,
        recent: &[FeedbackItem],
        now: DateTime<Utc>,
    ) -> PriorityScore {
        let since = now - Duration::hours(VOLUME_WINDOW_HOURS);
        let key = item.location_key();
        let similar = recent
            .iter()
            .filter(|other| other.created_at >= since)
            .filter(|other| key.is_none() || other.location_key() == key)
            .count();
        self.score_with_volume(item, similar, now)
    }

    /// Score every item of a snapshot, highest first (ties by snapshot order).
    pub fn score_snapshot(&self, snapshot: &FeedbackSnapshot, now: DateTime<Utc>) -> Vec<PriorityScore> {
        let since = now - Duration::hours(VOLUME_WINDOW_HOURS);
        let recent: Vec<&FeedbackItem> = snapshot
            .items()
            .iter()
            .filter(|i| i.created_at >= since)
            .collect();

        let mut by_location: HashMap<String, usize> = HashMap::new();
        for item in &recent {
            if let Some(key) = item.location_key() {
                *by_location.entry(key).or_insert(0) += 1;
            }
        }

        let mut scores: Vec<PriorityScore> = snapshot
            .items()
            .iter()
            .map(|item| {
                let similar = match item.location_key() {
                    Some(key) => by_location.get(&key).copied().unwrap_or(0),
                    None => recent.len(),
                };
                self.score_with_volume(item, similar, now)
            })
            .collect();

        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_case::test_case;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn item(id: &str, text: &str, location: Option<&str>, hours_ago: i64) -> FeedbackItem {
        FeedbackItem {
            id: id.into(),
            text: text.into(),
            source: "sms".into(),
            location: location.map(String::from),
            created_at: now() - Duration::hours(hours_ago),
            sentiment: Some(Sentiment::Negative),
            sector: None,
        }
    }

    #[test_case(80.0, Severity::Critical)]
    #[test_case(79.99, Severity::High)]
    #[test_case(60.0, Severity::High)]
    #[test_case(59.99, Severity::Medium)]
    #[test_case(40.0, Severity::Medium)]
    #[test_case(39.99, Severity::Low)]
    fn test_level_thresholds(score: f64, expected: Severity) {
        assert_eq!(level_for(score), expected);
    }

    #[test_case(0, 10.0 ; "just now")]
    #[test_case(3, 8.0 ; "three hours")]
    #[test_case(12, 6.0 ; "twelve hours")]
    #[test_case(48, 4.0 ; "two days")]
    #[test_case(100, 2.0 ; "old")]
    fn test_time_decay(hours_ago: i64, expected: f64) {
        assert_eq!(time_decay_weight(now() - Duration::hours(hours_ago), now()), expected);
    }

    #[test]
    fn test_emergency_at_hospital_is_critical() {
        let target = item("x", "Emergency at the hospital, no doctors", Some("Nairobi"), 0);
        let mut recent: Vec<FeedbackItem> = (0..9)
            .map(|i| item(&format!("n{i}"), "queue", Some("nairobi"), 2))
            .collect();
        recent.push(target.clone());
        recent.push(item("old", "queue", Some("Nairobi"), 30));
        recent.push(item("k", "queue", Some("Kisumu"), 1));

        let score = PriorityScorer.score(&target, &recent, now());
        assert_eq!(score.breakdown.volume_trend, 20.0);
        assert_eq!(score.breakdown.sector_criticality, 15.0);
        // 25 + 25 + 20 + 15 + 10
        assert_eq!(score.score, 95.0);
        assert_eq!(score.level, Severity::Critical);
    }

    #[test]
    fn test_quiet_positive_item_is_low() {
        let mut quiet = item("q", "Nice park", None, 100);
        quiet.sentiment = Some(Sentiment::Positive);
        let score = PriorityScorer.score_with_volume(&quiet, 1, now());
        // 5 + 5 + 5 + 5 + 2
        assert_eq!(score.score, 22.0);
        assert_eq!(score.level, Severity::Low);
    }

    #[test]
    fn test_labelled_sector_wins_over_text() {
        let mut labelled = item("s", "hospital queue", None, 0);
        labelled.sector = Some(Sector::Environment);
        let score = PriorityScorer.score_with_volume(&labelled, 1, now());
        assert_eq!(score.breakdown.sector_criticality, 6.0);
    }

    #[test]
    fn test_score_snapshot_orders_and_is_deterministic() {
        let items = vec![
            item("a", "nice", Some("Nairobi"), 1),
            item("b", "urgent fire", Some("Nairobi"), 0),
            item("c", "broken pipe", None, 5),
        ];
        let snapshot = FeedbackSnapshot::new(items, 24, now());
        let first = PriorityScorer.score_snapshot(&snapshot, now());
        let second = PriorityScorer.score_snapshot(&snapshot, now());
        assert_eq!(first, second);
        assert_eq!(first[0].feedback_id, "b");
        assert_eq!(first.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_score_bounded(
            text in "[a-z ]{0,60}",
            similar in 0usize..50,
            hours_ago in -5i64..500,
            sentiment in prop_oneof![
                Just(None),
                Just(Some(Sentiment::Negative)),
                Just(Some(Sentiment::Positive)),
                Just(Some(Sentiment::Neutral)),
            ],
        ) {
            let mut feedback = item("p", &text, None, hours_ago);
            feedback.sentiment = sentiment;
            let score = PriorityScorer.score_with_volume(&feedback, similar, now());
            prop_assert!((0.0..=100.0).contains(&score.score));
            prop_assert_eq!(score.level, level_for(score.score));
        }
    }
}
