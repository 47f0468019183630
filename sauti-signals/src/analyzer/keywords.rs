//! Curated keyword sets used by the signal detectors.
//!
//! Matching is plain substring search on lowercased text, so "act" also hits
//! "action". The detectors rely on volume thresholds rather than precision.

/// Generic policy vocabulary.
pub const POLICY_TERMS: &[&str] = &[
    "policy",
    "bill",
    "legislation",
    "law",
    "act",
    "regulation",
    "proposal",
    "amendment",
    "reform",
    "change",
];

/// Language used when organizing demonstrations.
pub const PROTEST_ORGANIZING_TERMS: &[&str] = &[
    "protest",
    "demonstration",
    "march",
    "rally",
    "occupy",
    "reject",
    "oppose",
    "boycott",
    "strike",
    "shutdown",
    "tuesday",
    "thursday",
    "monday",
    "weekend",
    "next week",
];

/// Signs that a situation is turning violent or physically dangerous.
pub const ESCALATION_TERMS: &[&str] = &[
    "violence",
    "police",
    "arrest",
    "tear gas",
    "water cannon",
    "injured",
    "hospital",
    "death",
    "killed",
    "shot",
    "parliament",
    "state house",
    "riot",
    "looting",
    "collapse",
];

/// Strongly emotional phrasing.
pub const EXTREME_SENTIMENT_TERMS: &[&str] = &[
    "angry",
    "furious",
    "outraged",
    "disgusted",
    "betrayed",
    "enough is enough",
    "we are tired",
    "this is too much",
];

/// True when any term occurs in `text_lower`.
pub fn contains_any(text_lower: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| text_lower.contains(term))
}

/// Distinct terms occurring in `text_lower`, in list order.
pub fn matched_terms<'a>(text_lower: &str, terms: &[&'a str]) -> Vec<&'a str> {
    terms
        .iter()
        .copied()
        .filter(|term| text_lower.contains(term))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_terms_in_list_order() {
        let text = "rally on tuesday, we reject this";
        assert_eq!(
            matched_terms(text, PROTEST_ORGANIZING_TERMS),
            vec!["rally", "reject", "tuesday"]
        );
    }

    #[test]
    fn test_multi_word_terms() {
        assert!(contains_any("they used tear gas on us", ESCALATION_TERMS));
        assert!(contains_any("enough is enough!", EXTREME_SENTIMENT_TERMS));
        assert!(!contains_any("a calm day", ESCALATION_TERMS));
    }
}
