//! Escalation prediction.
//!
//! Five independent risk factors, each contributing a fixed weight. Weights
//! are summed in tenths so threshold comparisons are exact.

use serde::Serialize;

use crate::analyzer::keywords::{contains_any, ESCALATION_TERMS, EXTREME_SENTIMENT_TERMS};
use crate::analyzer::policy::SCAN_LIMIT;
use crate::analyzer::{HashtagReport, VelocityReport};
use crate::model::{FeedbackItem, FeedbackSnapshot, Severity};
use crate::signal::{CrisisSignal, SignalKind};

/// Probability above which an escalation signal is raised.
pub const SIGNAL_THRESHOLD: f64 = 0.6;

/// A contributing risk factor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "factor", rename_all = "snake_case")]
pub enum RiskFactor {
    /// Velocity score above 0.5
    RapidSentimentDeterioration,
    /// Three or more trending hashtags
    MultipleTrendingHashtags,
    /// More than 50 items in the snapshot
    HighFeedbackVolume,
    /// More than 5 scanned items with escalation language
    EscalationLanguage { items: usize },
    /// Negative share strictly above 80%
    ExtremeNegativity { negative_pct: f64 },
}

impl RiskFactor {
    /// Contribution in tenths.
    fn weight_tenths(&self) -> u32 {
        match self {
            Self::RapidSentimentDeterioration | Self::EscalationLanguage { .. } => 3,
            Self::MultipleTrendingHashtags
            | Self::HighFeedbackVolume
            | Self::ExtremeNegativity { .. } => 2,
        }
    }

    pub fn weight(&self) -> f64 {
        f64::from(self.weight_tenths()) / 10.0
    }

    pub fn describe(&self) -> String {
        match self {
            Self::RapidSentimentDeterioration => "Rapid sentiment deterioration".into(),
            Self::MultipleTrendingHashtags => "Multiple trending hashtags".into(),
            Self::HighFeedbackVolume => "High feedback volume".into(),
            Self::EscalationLanguage { .. } => "Escalation language detected".into(),
            Self::ExtremeNegativity { negative_pct } => {
                format!("Extremely high negative sentiment ({negative_pct:.0}%)")
            }
        }
    }
}

/// Combined escalation estimate for a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EscalationPrediction {
    /// `min(1, risk_score)`
    pub escalation_probability: f64,
    pub risk_score: f64,
    pub risk_factors: Vec<RiskFactor>,
    pub negative_sentiment_pct: f64,
    pub total_feedback: usize,
    /// Scanned items containing escalation language.
    pub escalation_language_items: usize,
    /// Scanned items containing extreme-sentiment phrasing. Informational only.
    pub extreme_language_items: usize,
    pub recommendation: String,
}

/// Items among the first [`SCAN_LIMIT`] whose text matches any of `terms`.
fn count_matching(items: &[FeedbackItem], terms: &[&str]) -> usize {
    items
        .iter()
        .take(SCAN_LIMIT)
        .filter(|item| contains_any(&item.text.to_lowercase(), terms))
        .count()
}

/// Predict escalation from the snapshot and the analyzer outputs.
pub fn predict_escalation(
    snapshot: &FeedbackSnapshot,
    velocity: &VelocityReport,
    hashtags: &HashtagReport,
) -> EscalationPrediction {
    if snapshot.is_empty() {
        return EscalationPrediction {
            recommendation: escalation_recommendation(0.0).into(),
            ..EscalationPrediction::default()
        };
    }

    let escalation_items = count_matching(snapshot.items(), ESCALATION_TERMS);
    let extreme_items = count_matching(snapshot.items(), EXTREME_SENTIMENT_TERMS);
    let negative_pct = snapshot.negative_fraction() * 100.0;

    let mut factors = Vec::new();
    if velocity.velocity_score > 0.5 {
        factors.push(RiskFactor::RapidSentimentDeterioration);
    }
    if hashtags.trending_count() >= 3 {
        factors.push(RiskFactor::MultipleTrendingHashtags);
    }
    if snapshot.len() > 50 {
        factors.push(RiskFactor::HighFeedbackVolume);
    }
    if escalation_items > 5 {
        factors.push(RiskFactor::EscalationLanguage {
            items: escalation_items,
        });
    }
    if snapshot.negative_count() * 5 > snapshot.len() * 4 {
        factors.push(RiskFactor::ExtremeNegativity {
            negative_pct,
        });
    }

    let tenths: u32 = factors.iter().map(RiskFactor::weight_tenths).sum();
    let risk_score = f64::from(tenths) / 10.0;
    let escalation_probability = f64::from(tenths.min(10)) / 10.0;

    EscalationPrediction {
        escalation_probability,
        risk_score,
        risk_factors: factors,
        negative_sentiment_pct: negative_pct,
        total_feedback: snapshot.len(),
        escalation_language_items: escalation_items,
        extreme_language_items: extreme_items,
        recommendation: escalation_recommendation(escalation_probability).into(),
    }
}

/// Tiered recommendation for a probability.
pub fn escalation_recommendation(probability: f64) -> &'static str {
    if probability > 0.8 {
        "CRITICAL: Immediate government intervention required. Consider policy amendments or public engagement."
    } else if probability > 0.6 {
        "HIGH RISK: Proactive engagement recommended. Address concerns before escalation."
    } else if probability > 0.4 {
        "MODERATE RISK: Monitor closely and prepare response strategy."
    } else {
        "LOW RISK: Continue monitoring."
    }
}

/// Escalation signal when the probability exceeds [`SIGNAL_THRESHOLD`].
pub fn escalation_signal(prediction: &EscalationPrediction) -> Option<CrisisSignal> {
    let probability = prediction.escalation_probability;
    if probability <= SIGNAL_THRESHOLD {
        return None;
    }

    let description = if prediction.risk_factors.is_empty() {
        "Multiple risk factors detected".to_string()
    } else {
        prediction
            .risk_factors
            .iter()
            .map(RiskFactor::describe)
            .collect::<Vec<String>>()
            .join("; ")
    };

    Some(CrisisSignal {
        severity: if probability > 0.8 {
            Severity::Critical
        } else {
            Severity::High
        },
        title: format!("High Escalation Risk: {:.0}% probability", probability * 100.0),
        description,
        recommendation: "URGENT: Immediate intervention required to prevent escalation".into(),
        kind: SignalKind::EscalationPrediction(prediction.clone()),
    })
}
