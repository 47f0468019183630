//! Crisis signals: what a detection cycle hands to the dispatcher.
//!
//! Every signal shares a header (severity, title, description, recommendation)
//! and carries a kind-specific payload. Serialized as
//! `{"type": ..., "severity": ..., "title": ..., "description": ..., "recommendation": ..., "data": {...}}`.

use serde::Serialize;
use serde_json::json;

use crate::analyzer::{HashtagReport, PolicyCrisisData, ProtestOrganizingData, VelocityReport};
use crate::escalation::EscalationPrediction;
use crate::model::{AlertDraft, AlertType, Severity};
use crate::red_flag::{cluster_key, RedFlagCluster, TrendingIssue};

/// Kind-specific payload of a [`CrisisSignal`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SignalKind {
    SentimentVelocity(VelocityReport),
    HashtagTrending(HashtagReport),
    PolicyCrisis(PolicyCrisisData),
    ProtestOrganizing(ProtestOrganizingData),
    EscalationPrediction(EscalationPrediction),
    TrendingIssue(TrendingIssue),
    RedFlag(RedFlagCluster),
}

impl SignalKind {
    pub fn signal_type(&self) -> &'static str {
        match self {
            Self::SentimentVelocity(_) => "sentiment_velocity",
            Self::HashtagTrending(_) => "hashtag_trending",
            Self::PolicyCrisis(_) => "policy_crisis",
            Self::ProtestOrganizing(_) => "protest_organizing",
            Self::EscalationPrediction(_) => "escalation_prediction",
            Self::TrendingIssue(_) => "trending_issue",
            Self::RedFlag(_) => "red_flag",
        }
    }
}

/// A detected signal. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrisisSignal {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub recommendation: String,
    #[serde(flatten)]
    pub kind: SignalKind,
}

impl CrisisSignal {
    pub fn signal_type(&self) -> &'static str {
        self.kind.signal_type()
    }

    /// Alert category the signal is stored under.
    pub fn alert_type(&self) -> AlertType {
        match self.kind {
            SignalKind::TrendingIssue(_) => AlertType::TrendingIssue,
            SignalKind::RedFlag(_) => AlertType::RedFlag,
            _ => AlertType::CrisisSignal,
        }
    }

    /// Payload as JSON.
    pub fn data(&self) -> serde_json::Value {
        let payload = match &self.kind {
            SignalKind::SentimentVelocity(d) => serde_json::to_value(d),
            SignalKind::HashtagTrending(d) => serde_json::to_value(d),
            SignalKind::PolicyCrisis(d) => serde_json::to_value(d),
            SignalKind::ProtestOrganizing(d) => serde_json::to_value(d),
            SignalKind::EscalationPrediction(d) => serde_json::to_value(d),
            SignalKind::TrendingIssue(d) => serde_json::to_value(d),
            SignalKind::RedFlag(d) => serde_json::to_value(d),
        };
        payload.unwrap_or(serde_json::Value::Null)
    }

    /// Build the alert this signal should be persisted as.
    pub fn to_alert_draft(&self) -> AlertDraft {
        let mut draft = AlertDraft::new(
            self.alert_type(),
            self.severity,
            self.title.clone(),
            self.description.clone(),
        );

        match &self.kind {
            SignalKind::TrendingIssue(issue) => {
                draft.sector = Some(issue.sector.clone());
                draft.affected_counties = issue.affected_counties.clone();
                draft.metadata = json!({
                    "keyword": issue.keyword,
                    "count": issue.count,
                    "time_window_hours": issue.time_window_hours,
                    "feedback_ids": issue.feedback_ids,
                    "recommendation": self.recommendation,
                });
            }
            SignalKind::RedFlag(cluster) => {
                draft.dedup_key = Some(cluster_key(&cluster.keyword));
                draft.sector = Some(cluster.sector.clone());
                draft.affected_counties = cluster.affected_counties.clone();
                draft.metadata = json!({
                    "signal_type": self.signal_type(),
                    "matched_keywords": [cluster.keyword],
                    "count": cluster.count,
                    "feedback_ids": cluster.feedback_ids,
                    "recommendation": self.recommendation,
                });
            }
            _ => {
                draft.metadata = json!({
                    "signal_type": self.signal_type(),
                    "recommendation": self.recommendation,
                    "data": self.data(),
                });
            }
        }
        draft
    }
}
