//! Rule-based urgency classification for incoming feedback.

use crate::model::{Sentiment, Severity};

const CRITICAL_TERMS: &[&str] = &[
    "emergency",
    "urgent",
    "critical",
    "immediate",
    "life-threatening",
    "death",
    "died",
    "kill",
    "violence",
    "attack",
    "crisis",
    "disaster",
];

const HIGH_TERMS: &[&str] = &[
    "serious",
    "severe",
    "important",
    "urgent",
    "need",
    "must",
    "should",
    "problem",
    "issue",
    "complaint",
    "concern",
    "worry",
    "danger",
];

const MEDIUM_TERMS: &[&str] = &["issue", "problem", "concern", "request", "help", "assistance"];

fn count_terms(text_lower: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|t| text_lower.contains(*t)).count()
}

/// Classify how urgently an item needs attention.
///
/// Negative sentiment lowers the keyword bar: three high-urgency terms make a
/// negative item critical, one makes it high, and any negative item is at
/// least medium.
pub fn classify_urgency(text: &str, sentiment: Option<Sentiment>) -> Severity {
    let lower = text.to_lowercase();
    let critical = count_terms(&lower, CRITICAL_TERMS);
    let high = count_terms(&lower, HIGH_TERMS);
    let medium = count_terms(&lower, MEDIUM_TERMS);
    let negative = sentiment == Some(Sentiment::Negative);

    if critical > 0 || (negative && high >= 3) {
        Severity::Critical
    } else if high >= 2 || (negative && high >= 1) {
        Severity::High
    } else if medium >= 1 || negative {
        Severity::Medium
    } else {
        Severity::Low
    }
}
