//! Policy-crisis and protest-organizing detectors, plus per-policy monitoring.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use super::hashtag::{hashtag_intelligence, HashtagReport};
use super::keywords::{contains_any, matched_terms, POLICY_TERMS, PROTEST_ORGANIZING_TERMS};
use super::velocity::{sentiment_velocity, VelocityReport};
use crate::model::{FeedbackItem, FeedbackSnapshot, Severity};
use crate::signal::{CrisisSignal, SignalKind};

/// Items scanned by the keyword detectors.
pub const SCAN_LIMIT: usize = 500;

const MIN_POLICY_TERMS: usize = 5;
const MIN_ORGANIZING_KEYWORDS: usize = 2;
const MIN_ORGANIZING_ITEMS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyCrisisData {
    pub policy: String,
    /// Distinct policy terms present in the scanned corpus.
    pub mentions: usize,
    pub negative_percent: f64,
    /// Items mentioning at least one policy term.
    pub total_feedback: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtestOrganizingData {
    pub organizing_messages: usize,
    pub sample_keywords: Vec<String>,
}

/// Fires when policy vocabulary is widespread and the items using it are mostly negative.
pub fn detect_policy_crisis(snapshot: &FeedbackSnapshot) -> Option<CrisisSignal> {
    let scanned = snapshot.prefix(SCAN_LIMIT);
    if scanned.is_empty() {
        return None;
    }

    let lowered: Vec<String> = scanned.iter().map(|i| i.text.to_lowercase()).collect();

    let mentions = POLICY_TERMS
        .iter()
        .filter(|term| lowered.iter().any(|text| text.contains(*term)))
        .count();
    if mentions < MIN_POLICY_TERMS {
        return None;
    }

    let matching: Vec<&FeedbackItem> = scanned
        .iter()
        .zip(&lowered)
        .filter(|(_, text)| contains_any(text, POLICY_TERMS))
        .map(|(item, _)| item)
        .collect();
    if matching.is_empty() {
        return None;
    }

    let negative = matching.iter().filter(|i| i.is_negative()).count();
    let negative_percent = negative as f64 / matching.len() as f64 * 100.0;
    if negative_percent <= 70.0 {
        return None;
    }

    let severity = if negative_percent > 85.0 {
        Severity::Critical
    } else {
        Severity::High
    };

    Some(CrisisSignal {
        severity,
        title: "Policy-Related Crisis Detected".into(),
        description: format!(
            "Policy-related content mentioned {mentions} times with {negative_percent:.0}% negative sentiment"
        ),
        recommendation: "URGENT: Review policy provisions and engage citizens immediately".into(),
        kind: SignalKind::PolicyCrisis(PolicyCrisisData {
            policy: "Policy/Issue".into(),
            mentions,
            negative_percent,
            total_feedback: matching.len(),
        }),
    })
}

/// Fires when enough messages each carry several organizing keywords.
pub fn detect_protest_organizing(snapshot: &FeedbackSnapshot) -> Option<CrisisSignal> {
    let mut organizing = 0usize;
    let mut keywords: BTreeSet<&str> = BTreeSet::new();

    for item in snapshot.prefix(SCAN_LIMIT) {
        let found = matched_terms(&item.text.to_lowercase(), PROTEST_ORGANIZING_TERMS);
        if found.len() >= MIN_ORGANIZING_KEYWORDS {
            organizing += 1;
            keywords.extend(found);
        }
    }

    if organizing < MIN_ORGANIZING_ITEMS {
        return None;
    }

    let severity = if organizing >= 10 {
        Severity::High
    } else {
        Severity::Medium
    };

    Some(CrisisSignal {
        severity,
        title: format!("Protest Organizing Detected: {organizing} organizing messages"),
        description: "Multiple messages contain protest organizing language. Potential demonstration being planned.".into(),
        recommendation: "Monitor closely and prepare for potential demonstrations".into(),
        kind: SignalKind::ProtestOrganizing(ProtestOrganizingData {
            organizing_messages: organizing,
            sample_keywords: keywords.into_iter().take(5).map(String::from).collect(),
        }),
    })
}

// ============================================================================
// Policy monitoring
// ============================================================================

/// Outcome class of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    NoData,
    NoMentions,
    Critical,
    HighRisk,
    ModerateRisk,
    LowRisk,
    Error,
}

/// Result of monitoring one named policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyAssessment {
    pub policy: String,
    pub status: PolicyStatus,
    pub total_mentions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_sentiment_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_velocity: Option<VelocityReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtag_intelligence: Option<HashtagReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PolicyAssessment {
    fn bare(policy: &str, status: PolicyStatus) -> Self {
        Self {
            policy: policy.to_string(),
            status,
            total_mentions: 0,
            negative_sentiment_pct: None,
            sentiment_velocity: None,
            hashtag_intelligence: None,
            recommendation: None,
            error: None,
        }
    }

    /// Assessment for a policy whose feedback could not be loaded.
    pub fn failed(policy: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::bare(policy, PolicyStatus::Error)
        }
    }
}

/// Assess public reaction to one policy from a snapshot.
///
/// Items mention the policy when their text contains any of `keywords`
/// (case-insensitive). Blank keywords are ignored.
pub fn assess_policy(
    policy: &str,
    keywords: &[String],
    snapshot: &FeedbackSnapshot,
    now: DateTime<Utc>,
) -> PolicyAssessment {
    if snapshot.is_empty() {
        return PolicyAssessment::bare(policy, PolicyStatus::NoData);
    }

    let needles: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let mentions = snapshot.filtered(|item| {
        let text = item.text.to_lowercase();
        needles.iter().any(|k| text.contains(k.as_str()))
    });
    if mentions.is_empty() {
        return PolicyAssessment::bare(policy, PolicyStatus::NoMentions);
    }

    let negative_pct = mentions.negative_fraction() * 100.0;
    let velocity = sentiment_velocity(mentions.items(), snapshot.window_hours(), now);
    let hashtags = hashtag_intelligence(mentions.items());

    let status = if negative_pct > 80.0 && velocity.velocity_score > 0.5 {
        PolicyStatus::Critical
    } else if negative_pct > 60.0 {
        PolicyStatus::HighRisk
    } else if negative_pct > 40.0 {
        PolicyStatus::ModerateRisk
    } else {
        PolicyStatus::LowRisk
    };

    PolicyAssessment {
        policy: policy.to_string(),
        status,
        total_mentions: mentions.len(),
        negative_sentiment_pct: Some(negative_pct),
        sentiment_velocity: Some(velocity),
        hashtag_intelligence: Some(hashtags),
        recommendation: Some(policy_recommendation(status, negative_pct)),
        error: None,
    }
}

fn policy_recommendation(status: PolicyStatus, negative_pct: f64) -> String {
    match status {
        PolicyStatus::Critical => format!(
            "CRITICAL: {negative_pct:.0}% negative sentiment with rapid deterioration. Immediate policy review and citizen engagement required."
        ),
        PolicyStatus::HighRisk => format!(
            "HIGH RISK: {negative_pct:.0}% negative sentiment. Proactive engagement recommended."
        ),
        PolicyStatus::ModerateRisk => {
            format!("MODERATE RISK: {negative_pct:.0}% negative sentiment. Monitor closely.")
        }
        _ => "LOW RISK: Policy sentiment is manageable. Continue monitoring.".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sentiment;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn item(id: usize, text: &str, sentiment: Sentiment, hours_ago: i64) -> FeedbackItem {
        FeedbackItem {
            id: format!("f{id:03}"),
            text: text.into(),
            source: "twitter".into(),
            location: None,
            created_at: now() - Duration::hours(hours_ago),
            sentiment: Some(sentiment),
            sector: None,
        }
    }

    fn snapshot(items: Vec<FeedbackItem>) -> FeedbackSnapshot {
        FeedbackSnapshot::new(items, 24, now())
    }

    const POLICY_TEXT: &str = "This bill and the new law, the regulation, the amendment and the policy";

    #[test]
    fn test_policy_crisis_critical_above_85_percent() {
        let mut items: Vec<FeedbackItem> = (0..9)
            .map(|i| item(i, POLICY_TEXT, Sentiment::Negative, 1))
            .collect();
        items.push(item(9, POLICY_TEXT, Sentiment::Neutral, 1));

        let signal = detect_policy_crisis(&snapshot(items)).unwrap();
        assert_eq!(signal.severity, Severity::Critical);
        match signal.kind {
            SignalKind::PolicyCrisis(data) => {
                assert!(data.mentions >= 5);
                assert_eq!(data.total_feedback, 10);
                assert!((data.negative_percent - 90.0).abs() < 1e-9);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_policy_crisis_high_between_70_and_85() {
        let items: Vec<FeedbackItem> = (0..10)
            .map(|i| {
                let s = if i < 8 { Sentiment::Negative } else { Sentiment::Positive };
                item(i, POLICY_TEXT, s, 1)
            })
            .collect();
        assert_eq!(
            detect_policy_crisis(&snapshot(items)).unwrap().severity,
            Severity::High
        );
    }

    #[test]
    fn test_policy_crisis_needs_70_percent_exclusive() {
        let items: Vec<FeedbackItem> = (0..10)
            .map(|i| {
                let s = if i < 7 { Sentiment::Negative } else { Sentiment::Positive };
                item(i, POLICY_TEXT, s, 1)
            })
            .collect();
        assert!(detect_policy_crisis(&snapshot(items)).is_none());
    }

    #[test]
    fn test_policy_crisis_needs_five_distinct_terms() {
        let items: Vec<FeedbackItem> = (0..20)
            .map(|i| item(i, "the bill is bad", Sentiment::Negative, 1))
            .collect();
        assert!(detect_policy_crisis(&snapshot(items)).is_none());
    }

    #[test]
    fn test_protest_organizing_thresholds() {
        let organizing = "We reject this, join the march on tuesday";
        let four: Vec<FeedbackItem> = (0..4)
            .map(|i| item(i, organizing, Sentiment::Negative, 1))
            .collect();
        assert!(detect_protest_organizing(&snapshot(four)).is_none());

        let six: Vec<FeedbackItem> = (0..6)
            .map(|i| item(i, organizing, Sentiment::Negative, 1))
            .collect();
        let signal = detect_protest_organizing(&snapshot(six)).unwrap();
        assert_eq!(signal.severity, Severity::Medium);

        let twelve: Vec<FeedbackItem> = (0..12)
            .map(|i| item(i, organizing, Sentiment::Negative, 1))
            .collect();
        let signal = detect_protest_organizing(&snapshot(twelve)).unwrap();
        assert_eq!(signal.severity, Severity::High);
        match signal.kind {
            SignalKind::ProtestOrganizing(data) => {
                assert_eq!(data.organizing_messages, 12);
                assert_eq!(data.sample_keywords, vec!["march", "reject", "tuesday"]);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_single_organizing_keyword_not_enough() {
        let items: Vec<FeedbackItem> = (0..10)
            .map(|i| item(i, "there was a protest", Sentiment::Negative, 1))
            .collect();
        assert!(detect_protest_organizing(&snapshot(items)).is_none());
    }

    #[test]
    fn test_assess_policy_statuses() {
        let keywords = vec!["Finance Bill".to_string()];

        let empty = FeedbackSnapshot::empty(168, now());
        assert_eq!(
            assess_policy("Finance Bill", &keywords, &empty, now()).status,
            PolicyStatus::NoData
        );

        let unrelated = snapshot(vec![item(0, "roads are fine", Sentiment::Positive, 1)]);
        assert_eq!(
            assess_policy("Finance Bill", &keywords, &unrelated, now()).status,
            PolicyStatus::NoMentions
        );

        let items: Vec<FeedbackItem> = (0..10)
            .map(|i| {
                let s = if i < 7 { Sentiment::Negative } else { Sentiment::Neutral };
                item(i, "the finance bill hurts", s, 1)
            })
            .collect();
        let result = assess_policy("Finance Bill", &keywords, &snapshot(items), now());
        assert_eq!(result.status, PolicyStatus::HighRisk);
        assert_eq!(result.total_mentions, 10);
        assert_eq!(
            result.recommendation.as_deref(),
            Some("HIGH RISK: 70% negative sentiment. Proactive engagement recommended.")
        );
    }

    #[test]
    fn test_assess_policy_critical_requires_velocity() {
        // calm 20h ago, furious now
        let mut items: Vec<FeedbackItem> = (0..4)
            .map(|i| item(i, "finance bill", Sentiment::Neutral, 20))
            .collect();
        items.extend((4..40).map(|i| item(i, "finance bill", Sentiment::Negative, 1)));

        let result = assess_policy(
            "Finance Bill",
            &["finance bill".to_string()],
            &snapshot(items),
            now(),
        );
        assert_eq!(result.status, PolicyStatus::Critical);
    }
}
