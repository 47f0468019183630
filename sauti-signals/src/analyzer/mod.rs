//! Signal analyzers.
//!
//! Pure, deterministic computations over one [`FeedbackSnapshot`]:
//! - `velocity` - sentiment velocity across time buckets
//! - `hashtag` - hashtag frequency and growth
//! - `policy` - policy-crisis and protest-organizing detectors, policy monitoring
//! - `keywords` - curated keyword sets

pub mod hashtag;
pub mod keywords;
pub mod policy;
pub mod velocity;

use chrono::{DateTime, Utc};
use std::panic::{catch_unwind, AssertUnwindSafe};

pub use hashtag::{hashtag_intelligence, HashtagReport, HashtagStat};
pub use policy::{
    assess_policy, detect_policy_crisis, detect_protest_organizing, PolicyAssessment,
    PolicyCrisisData, PolicyStatus, ProtestOrganizingData,
};
pub use velocity::{sentiment_velocity, VelocityReport};

use crate::model::{FeedbackSnapshot, Severity};
use crate::signal::{CrisisSignal, SignalKind};

/// Velocity score above which a deterioration signal is raised.
pub const VELOCITY_SIGNAL_THRESHOLD: f64 = 0.7;

/// Outputs of every analyzer for one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzerOutput {
    pub velocity: VelocityReport,
    pub hashtags: HashtagReport,
    pub policy_crisis: Option<CrisisSignal>,
    pub protest_organizing: Option<CrisisSignal>,
}

/// Run `f`, turning a panic into the neutral default so one broken analyzer
/// cannot take down the rest of the cycle.
pub(crate) fn guarded<T: Default>(analyzer: &'static str, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            tracing::error!(analyzer, "Analyzer panicked, using empty result");
            T::default()
        }
    }
}

/// Run all analyzers concurrently over the same snapshot.
pub async fn run_analyzers(snapshot: &FeedbackSnapshot, now: DateTime<Utc>) -> AnalyzerOutput {
    let window = snapshot.window_hours();
    let (velocity, hashtags, policy_crisis, protest_organizing) = tokio::join!(
        async { guarded("sentiment_velocity", || sentiment_velocity(snapshot.items(), window, now)) },
        async { guarded("hashtag_intelligence", || hashtag_intelligence(snapshot.items())) },
        async { guarded("policy_crisis", || detect_policy_crisis(snapshot)) },
        async { guarded("protest_organizing", || detect_protest_organizing(snapshot)) },
    );

    AnalyzerOutput {
        velocity,
        hashtags,
        policy_crisis,
        protest_organizing,
    }
}

/// Deterioration signal when the velocity score exceeds [`VELOCITY_SIGNAL_THRESHOLD`].
pub fn velocity_signal(report: &VelocityReport, window_hours: u32) -> Option<CrisisSignal> {
    if report.velocity_score <= VELOCITY_SIGNAL_THRESHOLD {
        return None;
    }

    Some(CrisisSignal {
        severity: Severity::High,
        title: "Rapid Sentiment Deterioration Detected".into(),
        description: format!(
            "Negative sentiment increased by {:.1}% in {} hours",
            report.velocity_percent, window_hours
        ),
        recommendation: "Immediate government engagement recommended".into(),
        kind: SignalKind::SentimentVelocity(report.clone()),
    })
}

/// Trending-hashtag signal; high severity from three trending tags up.
pub fn hashtag_signal(report: &HashtagReport) -> Option<CrisisSignal> {
    if report.trending_hashtags.is_empty() {
        return None;
    }

    let top: Vec<&str> = report
        .trending_hashtags
        .iter()
        .take(3)
        .map(|h| h.hashtag.as_str())
        .collect();
    let severity = if report.trending_count() < 3 {
        Severity::Medium
    } else {
        Severity::High
    };

    Some(CrisisSignal {
        severity,
        title: format!("Trending Hashtags Detected: {}", top.join(", ")),
        description: format!(
            "{} hashtags showing rapid growth",
            report.trending_count()
        ),
        recommendation: "Monitor hashtag growth and prepare response".into(),
        kind: SignalKind::HashtagTrending(report.clone()),
    })
}
