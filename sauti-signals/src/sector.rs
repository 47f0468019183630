//! Government sectors and keyword-based sector inference.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sector a piece of feedback is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Health,
    Security,
    Infrastructure,
    Governance,
    Education,
    Transport,
    Economy,
    Environment,
    Other,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Security => "security",
            Self::Infrastructure => "infrastructure",
            Self::Governance => "governance",
            Self::Education => "education",
            Self::Transport => "transport",
            Self::Economy => "economy",
            Self::Environment => "environment",
            Self::Other => "other",
        }
    }

    /// Lenient parse of classifier labels ("Healthcare", " roads ").
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Self::Other)
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "health" | "healthcare" => Ok(Self::Health),
            "security" => Ok(Self::Security),
            "infrastructure" => Ok(Self::Infrastructure),
            "governance" => Ok(Self::Governance),
            "education" => Ok(Self::Education),
            "transport" | "transportation" | "roads" => Ok(Self::Transport),
            "economy" | "economic" => Ok(Self::Economy),
            "environment" | "environmental" => Ok(Self::Environment),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown sector: {other}")),
        }
    }
}

/// Keyword groups checked in order; the first group with a hit wins.
const SECTOR_KEYWORDS: &[(Sector, &[&str])] = &[
    (Sector::Health, &["hospital", "clinic", "doctor", "medicine", "health"]),
    (Sector::Education, &["school", "teacher", "student", "education"]),
    (Sector::Transport, &["road", "traffic", "bus", "transport", "vehicle"]),
    (Sector::Governance, &["government", "minister", "policy", "corruption"]),
    (Sector::Infrastructure, &["water", "electricity", "internet", "housing"]),
    (Sector::Security, &["police", "crime", "safety", "violence"]),
];

/// Infer a sector from free text. Falls back to [`Sector::Other`].
pub fn detect_sector(text: &str) -> Sector {
    let lower = text.to_lowercase();
    SECTOR_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(sector, _)| *sector)
        .unwrap_or(Sector::Other)
}
