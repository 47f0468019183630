//! Sentiment velocity: how fast the negative share moves across a window.
//!
//! The window is split into four buckets of `max(1, H / 4)` hours. Buckets are
//! compared oldest to newest: the two most recent non-empty buckets against
//! everything before them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{FeedbackItem, Sentiment};

/// Number of buckets a window is divided into.
pub const BUCKETS: usize = 4;

/// Sentiment counts for one time bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketStats {
    /// 0 is the newest bucket.
    pub hours_ago_start: u32,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub total: usize,
    pub negative_fraction: f64,
}

/// Result of the velocity analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VelocityReport {
    /// Normalized magnitude in `[0, 1]`.
    pub velocity_score: f64,
    /// Relative change of the negative share, in percent. Positive means worsening.
    pub velocity_percent: f64,
    pub recent_negative_pct: f64,
    pub earlier_negative_pct: f64,
    /// Non-empty buckets, oldest first.
    pub buckets: Vec<BucketStats>,
}

/// Width of one bucket in hours.
pub fn bucket_hours(window_hours: u32) -> u32 {
    (window_hours / BUCKETS as u32).max(1)
}

/// Compute sentiment velocity for `items` over a window ending at `now`.
///
/// Fewer than two non-empty buckets yields a zero score.
pub fn sentiment_velocity(
    items: &[FeedbackItem],
    window_hours: u32,
    now: DateTime<Utc>,
) -> VelocityReport {
    let width = f64::from(bucket_hours(window_hours));
    // index 0 = newest
    let mut counts: [BucketStats; BUCKETS] = Default::default();

    for item in items {
        let hours_ago = ((now - item.created_at).num_seconds().max(0) as f64) / 3600.0;
        let index = ((hours_ago / width).floor() as usize).min(BUCKETS - 1);

        let bucket = &mut counts[index];
        match item.sentiment {
            Some(Sentiment::Positive) => bucket.positive += 1,
            Some(Sentiment::Negative) => bucket.negative += 1,
            Some(Sentiment::Neutral) => bucket.neutral += 1,
            None => {}
        }
        bucket.total += 1;
    }

    let buckets: Vec<BucketStats> = counts
        .into_iter()
        .enumerate()
        .rev()
        .filter(|(_, b)| b.total > 0)
        .map(|(index, mut b)| {
            b.hours_ago_start = index as u32 * bucket_hours(window_hours);
            b.negative_fraction = b.negative as f64 / b.total as f64;
            b
        })
        .collect();

    if buckets.len() < 2 {
        return VelocityReport {
            buckets,
            ..VelocityReport::default()
        };
    }

    let fractions: Vec<f64> = buckets.iter().map(|b| b.negative_fraction).collect();
    let split = fractions.len() - 2;
    let recent_avg = mean(&fractions[split..]);
    let earlier_avg = if split == 0 {
        fractions[0]
    } else {
        mean(&fractions[..split])
    };

    let velocity_percent = (recent_avg - earlier_avg) / earlier_avg.max(0.1) * 100.0;
    let velocity_score = (velocity_percent.abs() / 50.0).min(1.0);

    VelocityReport {
        velocity_score,
        velocity_percent,
        recent_negative_pct: recent_avg * 100.0,
        earlier_negative_pct: earlier_avg * 100.0,
        buckets,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
