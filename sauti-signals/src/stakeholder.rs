//! Crisis briefings for government stakeholders.
//!
//! Each configured stakeholder has a minimum severity. Every signal at or
//! above it produces a briefing, posted to the stakeholder's webhook when one
//! is configured.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use sauti_common::StakeholderConfig;

use crate::model::Severity;
use crate::notification::{NotificationJob, NotificationQueue};
use crate::signal::{CrisisSignal, SignalKind};

/// How quickly a stakeholder is expected to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BriefingUrgency {
    Immediate,
    High,
    Normal,
}

impl From<Severity> for BriefingUrgency {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Self::Immediate,
            Severity::High => Self::High,
            Severity::Medium | Severity::Low => Self::Normal,
        }
    }
}

/// Structured alert handed to one stakeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrisisBriefing {
    pub stakeholder_id: String,
    pub stakeholder_name: String,
    pub alert_type: &'static str,
    pub signal_type: &'static str,
    pub severity: Severity,
    pub urgency: BriefingUrgency,
    pub title: String,
    pub summary: String,
    pub recommendation: String,
    pub data: serde_json::Value,
    pub action_required: bool,
    pub suggested_actions: Vec<&'static str>,
    pub detected_at: DateTime<Utc>,
    /// Whether the briefing was handed to the notification queue.
    pub delivered: bool,
}

/// Suggested follow-up for a signal.
pub fn suggested_actions(signal: &CrisisSignal) -> Vec<&'static str> {
    match &signal.kind {
        SignalKind::SentimentVelocity(_) => vec![
            "Review recent policy announcements or decisions",
            "Engage with citizens through official channels",
            "Consider public statement addressing concerns",
        ],
        SignalKind::HashtagTrending(_) => vec![
            "Monitor trending hashtags and social media conversations",
            "Prepare response strategy for public engagement",
            "Consider proactive communication",
        ],
        SignalKind::PolicyCrisis(_) => vec![
            "URGENT: Review policy provisions causing concern",
            "Consider policy amendments or clarifications",
            "Schedule public engagement session",
            "Prepare detailed explanation of policy rationale",
        ],
        SignalKind::ProtestOrganizing(_) => vec![
            "Monitor for planned demonstrations",
            "Coordinate with security agencies if needed",
            "Prepare public communication",
        ],
        SignalKind::EscalationPrediction(_) if signal.severity == Severity::Critical => vec![
            "IMMEDIATE: High-level government intervention required",
            "Consider emergency policy review",
            "Activate crisis response team",
        ],
        SignalKind::EscalationPrediction(_) => vec![
            "Proactive engagement to prevent escalation",
            "Address root causes of citizen concerns",
        ],
        SignalKind::TrendingIssue(_) | SignalKind::RedFlag(_) => Vec::new(),
    }
}

struct Stakeholder {
    id: String,
    name: String,
    min_severity: Severity,
    webhook_url: Option<String>,
}

/// Routes signals to the stakeholders whose threshold they meet.
pub struct StakeholderRouter {
    stakeholders: Vec<Stakeholder>,
    queue: Arc<NotificationQueue>,
}

impl StakeholderRouter {
    pub fn new(configs: &[StakeholderConfig], queue: Arc<NotificationQueue>) -> Self {
        let stakeholders = configs
            .iter()
            .map(|c| {
                let min_severity = c.min_severity.parse().unwrap_or_else(|e| {
                    warn!(stakeholder = %c.id, error = %e, "Invalid stakeholder threshold, using low");
                    Severity::Low
                });
                Stakeholder {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    min_severity,
                    webhook_url: c.webhook_url.clone().filter(|u| !u.trim().is_empty()),
                }
            })
            .collect();
        Self {
            stakeholders,
            queue,
        }
    }

    /// Stakeholder ids that should hear about a signal of `severity`.
    pub fn recipients(&self, severity: Severity) -> Vec<&str> {
        self.stakeholders
            .iter()
            .filter(|s| severity >= s.min_severity)
            .map(|s| s.id.as_str())
            .collect()
    }

    /// Build and send briefings for every qualifying signal.
    pub fn route(&self, signals: &[CrisisSignal], now: DateTime<Utc>) -> Vec<CrisisBriefing> {
        let mut briefings = Vec::new();

        for signal in signals {
            for stakeholder in self.stakeholders.iter().filter(|s| signal.severity >= s.min_severity) {
                let mut briefing = CrisisBriefing {
                    stakeholder_id: stakeholder.id.clone(),
                    stakeholder_name: stakeholder.name.clone(),
                    alert_type: "crisis_detection",
                    signal_type: signal.signal_type(),
                    severity: signal.severity,
                    urgency: signal.severity.into(),
                    title: signal.title.clone(),
                    summary: signal.description.clone(),
                    recommendation: signal.recommendation.clone(),
                    data: signal.data(),
                    action_required: true,
                    suggested_actions: suggested_actions(signal),
                    detected_at: now,
                    delivered: false,
                };

                match &stakeholder.webhook_url {
                    Some(url) => {
                        let payload = serde_json::to_value(&briefing).unwrap_or_default();
                        briefing.delivered = self.queue.enqueue(NotificationJob::Webhook {
                            label: format!("stakeholder:{}", stakeholder.id),
                            url: url.clone(),
                            payload,
                        });
                    }
                    None => {
                        debug!(stakeholder = %stakeholder.id, "No delivery channel configured for stakeholder");
                    }
                }
                briefings.push(briefing);
            }
        }

        if !briefings.is_empty() {
            info!(
                briefings = briefings.len(),
                delivered = briefings.iter().filter(|b| b.delivered).count(),
                "Stakeholder briefings prepared"
            );
        }
        briefings
    }
}
