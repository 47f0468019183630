//! Hashtag intelligence: frequency and cross-source growth of `#tags`.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::model::FeedbackItem;

/// Items scanned for hashtags.
pub const MAX_ITEMS: usize = 1000;
/// Occurrences needed before a tag counts as trending.
pub const MIN_TRENDING_COUNT: usize = 3;
/// Trending tags reported.
pub const MAX_TRENDING: usize = 50;

static HASHTAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\w+").expect("hashtag pattern is valid"));

/// Aggregated statistics for one hashtag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HashtagStat {
    pub hashtag: String,
    pub count: usize,
    pub sources: Vec<String>,
    /// `count × distinct sources`
    pub growth_score: usize,
    pub first_seen: DateTime<Utc>,
}

/// Result of the hashtag analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HashtagReport {
    /// Distinct hashtags seen.
    pub total_hashtags: usize,
    /// Occurrences per lowercased tag.
    pub hashtag_counts: BTreeMap<String, usize>,
    /// Tags with at least [`MIN_TRENDING_COUNT`] occurrences, by growth score.
    pub trending_hashtags: Vec<HashtagStat>,
    pub top_hashtag: Option<HashtagStat>,
}

impl HashtagReport {
    pub fn trending_count(&self) -> usize {
        self.trending_hashtags.len()
    }
}

/// Lowercased hashtags in `text`, in order of appearance, duplicates kept.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    HASHTAG_PATTERN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    first_seen: Option<DateTime<Utc>>,
    sources: BTreeSet<String>,
}

/// Analyze hashtags across the first [`MAX_ITEMS`] items.
pub fn hashtag_intelligence(items: &[FeedbackItem]) -> HashtagReport {
    let mut tags: BTreeMap<String, Accumulator> = BTreeMap::new();

    for item in items.iter().take(MAX_ITEMS) {
        let source = if item.source.trim().is_empty() {
            "unknown".to_string()
        } else {
            item.source.clone()
        };

        for tag in extract_hashtags(&item.text) {
            let acc = tags.entry(tag).or_default();
            acc.count += 1;
            acc.first_seen = Some(match acc.first_seen {
                Some(seen) => seen.min(item.created_at),
                None => item.created_at,
            });
            acc.sources.insert(source.clone());
        }
    }

    let mut trending: Vec<HashtagStat> = tags
        .iter()
        .filter(|(_, acc)| acc.count >= MIN_TRENDING_COUNT)
        .filter_map(|(tag, acc)| {
            Some(HashtagStat {
                hashtag: tag.clone(),
                count: acc.count,
                sources: acc.sources.iter().cloned().collect(),
                growth_score: acc.count * acc.sources.len(),
                first_seen: acc.first_seen?,
            })
        })
        .collect();

    // BTreeMap order already sorts by tag, so a stable sort keeps ties alphabetical.
    trending.sort_by(|a, b| b.growth_score.cmp(&a.growth_score));
    trending.truncate(MAX_TRENDING);

    HashtagReport {
        total_hashtags: tags.len(),
        hashtag_counts: tags.iter().map(|(t, acc)| (t.clone(), acc.count)).collect(),
        top_hashtag: trending.first().cloned(),
        trending_hashtags: trending,
    }
}
