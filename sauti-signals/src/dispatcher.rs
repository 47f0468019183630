//! Alert persistence and notification fan-out.

use chrono::Duration;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use sauti_common::{AlertsConfig, Error, Result};

use crate::clock::Clock;
use crate::model::{Alert, AlertDraft, AlertType, NotifyTargets, Severity};
use crate::notification::{NotificationJob, NotificationQueue};
use crate::red_flag::RedFlagGate;
use crate::signal::CrisisSignal;
use crate::storage::{AlertQuery, AlertStore};

/// Default page size for alert listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;
/// Default page size for red-flag listings.
pub const DEFAULT_RED_FLAG_LIMIT: usize = 20;

/// Persists alerts and hands them to the notification queue.
pub struct AlertDispatcher {
    store: Arc<dyn AlertStore>,
    queue: Arc<NotificationQueue>,
    clock: Arc<dyn Clock>,
    dedup_window: Duration,
    red_flag_gate: RedFlagGate,
}

impl AlertDispatcher {
    pub fn new(
        store: Arc<dyn AlertStore>,
        queue: Arc<NotificationQueue>,
        clock: Arc<dyn Clock>,
        config: &AlertsConfig,
    ) -> Self {
        Self {
            store,
            queue,
            clock,
            dedup_window: Duration::seconds(i64::try_from(config.dedup_window_secs).unwrap_or(i64::MAX)),
            red_flag_gate: RedFlagGate::new(config),
        }
    }

    /// Persist `drafts` in one batch and queue their notifications.
    ///
    /// Drafts whose type and title were stored within the dedup window are
    /// skipped. Returns the alerts that were stored.
    pub async fn dispatch(&self, drafts: Vec<AlertDraft>) -> Result<Vec<Alert>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let mut targets = Vec::with_capacity(drafts.len());
        let alerts: Vec<Alert> = drafts
            .into_iter()
            .map(|draft| {
                let id = uuid::Uuid::new_v4().to_string();
                targets.push((id.clone(), draft.notify));
                draft.into_alert(id, now)
            })
            .collect();
        let requested = alerts.len();

        let stored = self
            .store
            .insert_alerts(alerts, Some(now - self.dedup_window))
            .await
            .map_err(Error::storage)?;

        for alert in &stored {
            let notify = targets
                .iter()
                .find(|(id, _)| *id == alert.id)
                .map(|(_, t)| *t)
                .unwrap_or_default();
            self.notify(alert, notify);
        }

        info!(
            requested,
            stored = stored.len(),
            skipped = requested - stored.len(),
            "Alerts dispatched"
        );
        Ok(stored)
    }

    /// Convert signals to alerts and dispatch them.
    ///
    /// Red-flag signals are first checked against the red-flag window, so a
    /// cluster seen on every cycle is raised once per window.
    pub async fn dispatch_signals(&self, signals: &[CrisisSignal]) -> Result<Vec<Alert>> {
        let now = self.clock.now();
        let mut drafts = Vec::with_capacity(signals.len());
        for draft in signals.iter().map(CrisisSignal::to_alert_draft) {
            if draft.alert_type == AlertType::RedFlag
                && !self.red_flag_gate.admits(self.store.as_ref(), &draft, now).await
            {
                continue;
            }
            drafts.push(draft);
        }
        self.dispatch(drafts).await
    }

    fn notify(&self, alert: &Alert, targets: NotifyTargets) {
        if !targets.any() {
            return;
        }
        if !self.queue.enqueue(NotificationJob::Alert {
            alert: alert.clone(),
            targets,
        }) {
            warn!(alert_id = %alert.id, "Alert stored but notification dropped");
        }
    }

    pub async fn acknowledge(&self, id: &str) -> Result<Alert> {
        let alert = self
            .store
            .acknowledge_alert(id)
            .await
            .map_err(Error::storage)?
            .ok_or_else(|| Error::NotFound(format!("alert {id}")))?;
        info!(alert_id = %id, "Alert acknowledged");
        Ok(alert)
    }

    pub async fn list(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        self.store.list_alerts(query).await.map_err(Error::storage)
    }

    pub async fn red_flags(&self, severity: Option<Severity>, limit: Option<usize>) -> Result<Vec<Alert>> {
        self.list(&AlertQuery {
            alert_type: Some(AlertType::RedFlag),
            severity,
            limit: limit.unwrap_or(DEFAULT_RED_FLAG_LIMIT),
            ..AlertQuery::default()
        })
        .await
    }

    pub async fn crisis_signals(
        &self,
        signal_type: Option<&str>,
        severity: Option<Severity>,
        limit: Option<usize>,
    ) -> Result<Vec<Alert>> {
        self.list(&AlertQuery {
            alert_type: Some(AlertType::CrisisSignal),
            severity,
            signal_type: signal_type.map(String::from),
            limit: limit.unwrap_or(DEFAULT_LIST_LIMIT),
            ..AlertQuery::default()
        })
        .await
    }

    /// Store and send a test alert. Bypasses the dedup window.
    pub async fn send_test_alert(&self) -> Result<Alert> {
        let now = self.clock.now();
        let mut draft = AlertDraft::new(
            AlertType::Test,
            Severity::Medium,
            "Test alert",
            "This is a test alert to verify notification channels.",
        );
        draft.metadata = json!({ "test": true, "sent_at": now });

        let alert = draft.into_alert(uuid::Uuid::new_v4().to_string(), now);
        let stored = self
            .store
            .insert_alerts(vec![alert], None)
            .await
            .map_err(Error::storage)?;
        let alert = stored
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal("test alert was not stored".into()))?;

        self.notify(&alert, NotifyTargets::default());
        Ok(alert)
    }
}
