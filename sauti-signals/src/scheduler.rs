//! Cron-driven scheduling of detection cycles and realtime rule ticks.
//!
//! Expressions use the six-field form with seconds, e.g.
//!
//! ```json
//! {
//!   "detection": { "schedule": "0 */15 * * * *" },
//!   "realtime": { "schedule": "*/30 * * * * *" }
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use sauti_common::Config;

use crate::clock::Clock;
use crate::monitor::CrisisMonitor;
use crate::realtime::RealtimeMonitor;

/// How often due schedules are checked.
const CHECK_INTERVAL: Duration = Duration::from_secs(1);
/// A fire time older than this is considered missed and skipped.
const GRACE_SECONDS: i64 = 60;
/// Consecutive failures before an error is raised for a task.
const FAILURE_ALERT_THRESHOLD: u32 = 5;

/// Scheduled task type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledTask {
    /// Full crisis detection cycle
    DetectionCycle,
    /// Realtime counters and rule evaluation
    RealtimeTick,
}

impl ScheduledTask {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DetectionCycle => "detection_cycle",
            Self::RealtimeTick => "realtime_tick",
        }
    }
}

/// Parse a six-field cron expression.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    Schedule::from_str(expr).with_context(|| format!("Invalid cron expression: {expr}"))
}

/// Whether `schedule` fired in `(last, now]` within the grace period.
///
/// Only fire times from the last grace period count.
pub fn is_due(schedule: &Schedule, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let grace = chrono::Duration::seconds(GRACE_SECONDS);
    let after = last.map_or(now - grace, |l| l.max(now - grace));

    schedule
        .after(&after)
        .take_while(|fire| *fire <= now)
        .any(|fire| now - fire < grace)
}

struct ParsedSchedule {
    task: ScheduledTask,
    schedule: Schedule,
}

/// Runs the detection cycle and the realtime tick on their cron schedules.
pub struct SignalScheduler {
    schedules: Vec<ParsedSchedule>,
    crisis: Arc<CrisisMonitor>,
    realtime: Arc<RealtimeMonitor>,
    clock: Arc<dyn Clock>,
    last_executions: RwLock<HashMap<ScheduledTask, DateTime<Utc>>>,
    failure_counts: RwLock<HashMap<ScheduledTask, u32>>,
}

impl SignalScheduler {
    pub fn new(
        config: &Config,
        crisis: Arc<CrisisMonitor>,
        realtime: Arc<RealtimeMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut schedules = Vec::new();

        if config.detection.enabled {
            schedules.push(ParsedSchedule {
                task: ScheduledTask::DetectionCycle,
                schedule: parse_schedule(&config.detection.schedule)
                    .context("detection.schedule")?,
            });
        }
        if config.realtime.enabled {
            schedules.push(ParsedSchedule {
                task: ScheduledTask::RealtimeTick,
                schedule: parse_schedule(&config.realtime.schedule)
                    .context("realtime.schedule")?,
            });
        }

        info!(
            detection = config.detection.enabled.then_some(config.detection.schedule.as_str()),
            realtime = config.realtime.enabled.then_some(config.realtime.schedule.as_str()),
            "Scheduler configured"
        );

        Ok(Self {
            schedules,
            crisis,
            realtime,
            clock,
            last_executions: RwLock::new(HashMap::new()),
            failure_counts: RwLock::new(HashMap::new()),
        })
    }

    /// Tasks with a schedule.
    pub fn tasks(&self) -> Vec<ScheduledTask> {
        self.schedules.iter().map(|s| s.task).collect()
    }

    /// Run until the future is dropped.
    pub async fn run(&self) {
        if self.schedules.is_empty() {
            info!("No scheduled tasks enabled, scheduler not started");
            return;
        }

        info!(tasks = self.schedules.len(), "Scheduler started");
        let mut ticker = interval(CHECK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.check_and_execute().await;
        }
    }

    /// Execute every task that is due now. Returns the tasks that ran.
    pub async fn check_and_execute(&self) -> Vec<ScheduledTask> {
        let now = self.clock.now();
        let mut ran = Vec::new();

        for parsed in &self.schedules {
            let last = self.last_executions.read().await.get(&parsed.task).copied();
            if is_due(&parsed.schedule, last, now) {
                self.last_executions.write().await.insert(parsed.task, now);
                self.execute(parsed.task).await;
                ran.push(parsed.task);
            }
        }
        ran
    }

    async fn execute(&self, task: ScheduledTask) {
        debug!(task = task.name(), "Executing scheduled task");

        let result: Result<()> = match task {
            ScheduledTask::DetectionCycle => self
                .crisis
                .run_scheduled()
                .await
                .map(|_| ())
                .map_err(anyhow::Error::from),
            ScheduledTask::RealtimeTick => self.realtime.tick().await.map_err(anyhow::Error::from),
        };

        match result {
            Ok(()) => {
                self.failure_counts.write().await.insert(task, 0);
            }
            Err(e) => {
                error!(task = task.name(), error = %e, "Scheduled task failed");
                self.track_failure(task).await;
            }
        }
    }

    async fn track_failure(&self, task: ScheduledTask) {
        let mut failures = self.failure_counts.write().await;
        let count = failures.entry(task).or_insert(0);
        *count += 1;

        if *count >= FAILURE_ALERT_THRESHOLD {
            error!(
                task = task.name(),
                failure_count = *count,
                threshold = FAILURE_ALERT_THRESHOLD,
                "Task failure threshold exceeded"
            );
            *count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap()
    }

    #[test_case("0 */15 * * * *")]
    #[test_case("*/30 * * * * *")]
    #[test_case("0 0 6 * * Mon-Fri")]
    fn test_valid_expressions(expr: &str) {
        assert!(parse_schedule(expr).is_ok());
    }

    #[test]
    fn test_invalid_expression() {
        let err = parse_schedule("every minute").unwrap_err();
        assert!(err.to_string().contains("every minute"));
    }

    #[test]
    fn test_due_once_per_fire_time() {
        let schedule = parse_schedule("0 */15 * * * *").unwrap();
        assert!(is_due(&schedule, None, at(12, 15, 3)));
        assert!(!is_due(&schedule, Some(at(12, 15, 3)), at(12, 15, 4)));
        assert!(!is_due(&schedule, Some(at(12, 15, 3)), at(12, 29, 59)));
        assert!(is_due(&schedule, Some(at(12, 15, 3)), at(12, 30, 0)));
    }

    fn scheduler_over(source: crate::source::MockFeedbackSource) -> SignalScheduler {
        use crate::cache::TtlCache;
        use crate::clock::ManualClock;
        use crate::dispatcher::AlertDispatcher;
        use crate::monitor::{CrisisDashboard, SignalList};
        use crate::notification::NotificationQueue;
        use crate::realtime::RealtimeUpdate;
        use crate::rules::RuleEngine;
        use crate::stakeholder::StakeholderRouter;
        use crate::storage::SqliteStore;
        use sauti_common::RuntimeConfigStore;

        let config = Config::default();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(at(12, 0, 0)));
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let source: Arc<dyn crate::source::FeedbackSource> = Arc::new(source);
        let queue = Arc::new(NotificationQueue::start(
            &config.notifications,
            Arc::new(RuntimeConfigStore::in_memory()),
        ));
        let dispatcher = Arc::new(AlertDispatcher::new(
            store.clone(),
            queue.clone(),
            clock.clone(),
            &config.alerts,
        ));
        let crisis = Arc::new(CrisisMonitor::new(
            source.clone(),
            dispatcher.clone(),
            Arc::new(StakeholderRouter::new(&[], queue)),
            Arc::new(TtlCache::<SignalList>::new(clock.clone())),
            Arc::new(TtlCache::<Arc<CrisisDashboard>>::new(clock.clone())),
            clock.clone(),
            config.detection.clone(),
        ));
        let realtime = Arc::new(RealtimeMonitor::new(
            source,
            Arc::new(RuleEngine::new(store, clock.clone())),
            dispatcher,
            Arc::new(TtlCache::<Arc<RealtimeUpdate>>::new(clock.clone())),
            clock.clone(),
            config.realtime.clone(),
        ));
        SignalScheduler::new(&config, crisis, realtime, clock).unwrap()
    }

    #[tokio::test]
    async fn test_unavailable_source_counts_as_failure() {
        let mut source = crate::source::MockFeedbackSource::new();
        source.expect_fetch_since().returning(|_, _| {
            Err(crate::source::SourceError::Unavailable("connection refused".into()))
        });
        let scheduler = scheduler_over(source);

        scheduler.execute(ScheduledTask::DetectionCycle).await;
        scheduler.execute(ScheduledTask::DetectionCycle).await;
        let failures = scheduler.failure_counts.read().await;
        assert_eq!(failures.get(&ScheduledTask::DetectionCycle), Some(&2));
    }

    #[tokio::test]
    async fn test_quiet_cycle_is_not_a_failure() {
        let mut source = crate::source::MockFeedbackSource::new();
        source.expect_fetch_since().returning(|_, _| Ok(Vec::new()));
        let scheduler = scheduler_over(source);

        scheduler.execute(ScheduledTask::DetectionCycle).await;
        let failures = scheduler.failure_counts.read().await;
        assert_eq!(failures.get(&ScheduledTask::DetectionCycle), Some(&0));
    }

    #[test]
    fn test_missed_fire_time_is_skipped() {
        let schedule = parse_schedule("0 */15 * * * *").unwrap();
        assert!(!is_due(&schedule, None, at(12, 20, 0)));
        assert!(!is_due(&schedule, Some(at(11, 0, 0)), at(12, 10, 0)));
    }
}
