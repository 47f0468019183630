//! Detection cycle orchestration.
//!
//! A cycle takes one snapshot, fans analyzers, the red-flag batch scan and
//! priority scoring out over it, feeds the results to the escalation
//! predictor and hands the resulting signals to the dispatcher and the
//! stakeholder router.

use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use sauti_common::logging::generate_cycle_id;
use sauti_common::{DetectionConfig, Result};

use crate::analyzer::{
    assess_policy, hashtag_signal, run_analyzers, velocity_signal, AnalyzerOutput, HashtagReport,
    PolicyAssessment, VelocityReport,
};
use crate::cache::Cache;
use crate::clock::Clock;
use crate::dispatcher::AlertDispatcher;
use crate::escalation::{escalation_signal, predict_escalation, EscalationPrediction};
use crate::model::{Alert, AlertType, FeedbackSnapshot};
use crate::priority::{PriorityScore, PriorityScorer};
use crate::red_flag::{red_flag_scan, trending_complaints, trending_issue_signal};
use crate::signal::CrisisSignal;
use crate::source::{fetch_snapshot, FeedbackSource};
use crate::stakeholder::{CrisisBriefing, StakeholderRouter};
use crate::storage::AlertQuery;

/// Lookback used by policy monitoring when none is given.
pub const DEFAULT_POLICY_WINDOW_HOURS: u32 = 168;
/// Minimum volume for dashboard detection.
pub const DASHBOARD_MIN_VOLUME: usize = 5;
const DASHBOARD_RECENT_ALERTS: usize = 10;

/// Cached signal list of one `(window, min_volume)` pair.
pub type SignalList = Arc<Vec<CrisisSignal>>;

/// Everything a detection cycle computed.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    pub cycle_id: String,
    pub window_hours: u32,
    pub feedback_analyzed: usize,
    pub signals: SignalList,
    pub escalation: EscalationPrediction,
    /// Highest-priority items first.
    pub priorities: Vec<PriorityScore>,
    pub alerts_stored: usize,
    pub briefings: Vec<CrisisBriefing>,
    pub sentiment_velocity: VelocityReport,
    pub hashtag_intelligence: HashtagReport,
}

/// Crisis monitoring view over a number of days.
#[derive(Debug, Clone, Serialize)]
pub struct CrisisDashboard {
    pub signals: SignalList,
    pub sentiment_velocity: VelocityReport,
    pub hashtag_intelligence: HashtagReport,
    pub escalation_prediction: EscalationPrediction,
    pub recent_alerts: Vec<Alert>,
    pub total_feedback_analyzed: usize,
    pub time_period_days: u32,
}

/// Pure results of analyzing one snapshot.
struct Analysis {
    output: AnalyzerOutput,
    escalation: EscalationPrediction,
    priorities: Vec<PriorityScore>,
    signals: Vec<CrisisSignal>,
}

/// Runs detection cycles and the on-demand crisis operations.
pub struct CrisisMonitor {
    source: Arc<dyn FeedbackSource>,
    dispatcher: Arc<AlertDispatcher>,
    stakeholders: Arc<StakeholderRouter>,
    signal_cache: Arc<dyn Cache<SignalList>>,
    dashboard_cache: Arc<dyn Cache<Arc<CrisisDashboard>>>,
    clock: Arc<dyn Clock>,
    config: DetectionConfig,
}

impl CrisisMonitor {
    pub fn new(
        source: Arc<dyn FeedbackSource>,
        dispatcher: Arc<AlertDispatcher>,
        stakeholders: Arc<StakeholderRouter>,
        signal_cache: Arc<dyn Cache<SignalList>>,
        dashboard_cache: Arc<dyn Cache<Arc<CrisisDashboard>>>,
        clock: Arc<dyn Clock>,
        config: DetectionConfig,
    ) -> Self {
        Self {
            source,
            dispatcher,
            stakeholders,
            signal_cache,
            dashboard_cache,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.cache_ttl_secs)
    }

    async fn analyze(&self, snapshot: Arc<FeedbackSnapshot>) -> Analysis {
        let now = self.clock.now();
        let window = snapshot.window_hours();
        let threshold = self.config.trending_threshold;

        let (output, (red_flags, trending), priorities) = tokio::join!(
            run_analyzers(&snapshot, now),
            async {
                (
                    crate::analyzer::guarded("red_flag_scan", || red_flag_scan(snapshot.items())),
                    crate::analyzer::guarded("trending_complaints", || {
                        trending_complaints(snapshot.items(), window, threshold)
                    }),
                )
            },
            async {
                crate::analyzer::guarded("priority", || PriorityScorer.score_snapshot(&snapshot, now))
            },
        );

        let escalation = crate::analyzer::guarded("escalation", || {
            predict_escalation(&snapshot, &output.velocity, &output.hashtags)
        });

        let mut signals = Vec::new();
        signals.extend(velocity_signal(&output.velocity, window));
        signals.extend(hashtag_signal(&output.hashtags));
        signals.extend(output.policy_crisis.clone());
        signals.extend(output.protest_organizing.clone());
        signals.extend(escalation_signal(&escalation));
        signals.extend(red_flags);
        signals.extend(trending.iter().map(trending_issue_signal));

        Analysis {
            output,
            escalation,
            priorities,
            signals,
        }
    }

    /// Run one full cycle over the last `window_hours` and refresh the cache.
    ///
    /// Returns `None` when no snapshot could be taken or it holds fewer than
    /// `min_volume` items; nothing is cached or dispatched in that case.
    pub async fn run_cycle(&self, window_hours: u32, min_volume: usize) -> Option<CycleOutcome> {
        let snapshot = match fetch_snapshot(self.source.as_ref(), window_hours, self.clock.now()).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!(error = %e, window_hours, "Feedback source unavailable, skipping cycle");
                return None;
            }
        };
        self.cycle_on(snapshot, window_hours, min_volume).await
    }

    /// Cycle over a snapshot already taken for `window_hours`.
    async fn cycle_on(
        &self,
        snapshot: Arc<FeedbackSnapshot>,
        window_hours: u32,
        min_volume: usize,
    ) -> Option<CycleOutcome> {
        let cycle_id = generate_cycle_id();
        let span = info_span!("detection_cycle", cycle_id = %cycle_id, window_hours);

        async move {
            if snapshot.len() < min_volume {
                debug!(items = snapshot.len(), min_volume, "Not enough feedback for detection");
                return None;
            }

            let now = self.clock.now();
            let analysis = self.analyze(snapshot.clone()).await;
            let signals: SignalList = Arc::new(analysis.signals);

            let alerts_stored = match self.dispatcher.dispatch_signals(&signals).await {
                Ok(stored) => stored.len(),
                Err(e) => {
                    warn!(error = %e, "Failed to persist crisis signals");
                    0
                }
            };
            let briefings = self.stakeholders.route(&signals, now);

            self.signal_cache.set(
                &signal_cache_key(window_hours, min_volume),
                signals.clone(),
                self.ttl(),
            );

            info!(
                items = snapshot.len(),
                signals = signals.len(),
                alerts_stored,
                escalation_probability = analysis.escalation.escalation_probability,
                "Detection cycle complete"
            );

            Some(CycleOutcome {
                cycle_id,
                window_hours,
                feedback_analyzed: snapshot.len(),
                signals,
                escalation: analysis.escalation,
                priorities: analysis.priorities,
                alerts_stored,
                briefings,
                sentiment_velocity: analysis.output.velocity,
                hashtag_intelligence: analysis.output.hashtags,
            })
        }
        .instrument(span)
        .await
    }

    /// Signals for the last `window_hours`, served from cache while fresh.
    pub async fn detect(&self, window_hours: u32, min_volume: usize) -> SignalList {
        let key = signal_cache_key(window_hours, min_volume);
        if let Some(signals) = self.signal_cache.get(&key) {
            debug!(key = %key, "Returning cached crisis signals");
            return signals;
        }

        match self.run_cycle(window_hours, min_volume).await {
            Some(outcome) => outcome.signals,
            None => Arc::new(Vec::new()),
        }
    }

    /// Scheduled cycle using the configured window and volume.
    ///
    /// An unavailable source is an error; too little feedback is `Ok(None)`.
    pub async fn run_scheduled(&self) -> Result<Option<CycleOutcome>> {
        let window = self.config.window_hours;
        let snapshot = fetch_snapshot(self.source.as_ref(), window, self.clock.now()).await?;
        Ok(self
            .cycle_on(Arc::new(snapshot), window, self.config.min_volume)
            .await)
    }

    /// Public reaction to one policy, matched by keyword.
    pub async fn monitor_policy(
        &self,
        policy: &str,
        keywords: &[String],
        window_hours: Option<u32>,
    ) -> PolicyAssessment {
        let window = window_hours.unwrap_or(DEFAULT_POLICY_WINDOW_HOURS);
        let now = self.clock.now();
        match fetch_snapshot(self.source.as_ref(), window, now).await {
            Ok(snapshot) => {
                let assessment = assess_policy(policy, keywords, &snapshot, now);
                info!(
                    policy,
                    status = ?assessment.status,
                    mentions = assessment.total_mentions,
                    "Policy monitored"
                );
                assessment
            }
            Err(e) => {
                warn!(policy, error = %e, "Policy monitoring failed");
                PolicyAssessment::failed(policy, e.to_string())
            }
        }
    }

    /// Crisis overview for the last `days` days, cached per day count.
    pub async fn dashboard(&self, days: u32) -> Result<Arc<CrisisDashboard>> {
        let days = days.max(1);
        let key = format!("crisis_dashboard_{days}");
        if let Some(dashboard) = self.dashboard_cache.get(&key) {
            return Ok(dashboard);
        }

        // One snapshot feeds every field of the dashboard.
        let window = days.saturating_mul(24);
        let now = self.clock.now();
        let snapshot = Arc::new(fetch_snapshot(self.source.as_ref(), window, now).await?);
        let total_feedback_analyzed = snapshot.len();

        let (signals, sentiment_velocity, hashtag_intelligence, escalation_prediction) =
            match self.cycle_on(snapshot.clone(), window, DASHBOARD_MIN_VOLUME).await {
                Some(outcome) => (
                    outcome.signals,
                    outcome.sentiment_velocity,
                    outcome.hashtag_intelligence,
                    outcome.escalation,
                ),
                None => {
                    let analysis = self.analyze(snapshot).await;
                    (
                        Arc::new(Vec::new()),
                        analysis.output.velocity,
                        analysis.output.hashtags,
                        analysis.escalation,
                    )
                }
            };

        let since = now - Duration::days(i64::from(days));
        let recent_alerts = self
            .dispatcher
            .list(&AlertQuery {
                alert_type: Some(AlertType::CrisisSignal),
                limit: DASHBOARD_RECENT_ALERTS,
                ..AlertQuery::default()
            })
            .await?
            .into_iter()
            .filter(|a| a.created_at >= since)
            .collect();

        let dashboard = Arc::new(CrisisDashboard {
            signals,
            sentiment_velocity,
            hashtag_intelligence,
            escalation_prediction,
            recent_alerts,
            total_feedback_analyzed,
            time_period_days: days,
        });
        self.dashboard_cache.set(&key, dashboard.clone(), self.ttl());
        Ok(dashboard)
    }

    /// Raise trending-issue alerts for keywords reported at least `threshold`
    /// times in the last `hours`. Returns the alerts stored.
    pub async fn check_trending(&self, hours: Option<u32>, threshold: Option<usize>) -> Result<Vec<Alert>> {
        let hours = hours.unwrap_or(self.config.window_hours);
        let threshold = threshold.unwrap_or(self.config.trending_threshold);
        let snapshot = fetch_snapshot(self.source.as_ref(), hours, self.clock.now()).await?;

        let signals: Vec<CrisisSignal> = trending_complaints(snapshot.items(), hours, threshold)
            .iter()
            .map(trending_issue_signal)
            .collect();
        if signals.is_empty() {
            return Ok(Vec::new());
        }

        let stored = self.dispatcher.dispatch_signals(&signals).await?;
        info!(issues = signals.len(), stored = stored.len(), "Trending complaints checked");
        Ok(stored)
    }
}

fn signal_cache_key(window_hours: u32, min_volume: usize) -> String {
    format!("crisis_signals_{window_hours}_{min_volume}")
}
