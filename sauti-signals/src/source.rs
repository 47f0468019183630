//! Feedback snapshot provider.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::{FeedbackItem, FeedbackSnapshot};

/// Failure to obtain feedback from the backing source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("feedback source unreachable: {0}")]
    Unavailable(String),

    #[error("feedback query failed: {0}")]
    Query(String),
}

impl From<SourceError> for sauti_common::Error {
    fn from(err: SourceError) -> Self {
        sauti_common::Error::SourceUnavailable(err.to_string())
    }
}

/// Supplies recent feedback, newest first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackSource: Send + Sync {
    /// Items created at or after `since`, newest first, at most `limit`.
    async fn fetch_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<FeedbackItem>, SourceError>;
}

/// Take a snapshot of the last `window_hours` hours.
pub async fn fetch_snapshot(
    source: &dyn FeedbackSource,
    window_hours: u32,
    now: DateTime<Utc>,
) -> Result<FeedbackSnapshot, SourceError> {
    let since = now - Duration::hours(i64::from(window_hours));
    let items = source
        .fetch_since(since, FeedbackSnapshot::MAX_ITEMS)
        .await?;
    Ok(FeedbackSnapshot::new(items, window_hours, now))
}
