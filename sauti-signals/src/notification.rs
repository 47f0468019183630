//! Outbound alert notifications.
//!
//! Jobs go through a bounded queue to a single worker that delivers up to
//! `max_concurrency` of them at once. Deliveries are attempted once; failures
//! are logged and counted, never retried.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use sauti_common::{NotificationsConfig, RuntimeConfigStore};

use crate::model::{Alert, NotifyTargets};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("endpoint returned HTTP {0}")]
    Status(u16),
}

impl From<NotifyError> for sauti_common::Error {
    fn from(err: NotifyError) -> Self {
        sauti_common::Error::Notification(err.to_string())
    }
}

// ============================================================================
// HTTP client
// ============================================================================

/// Chat message body: `[SEVERITY] title` then the description.
pub fn chat_text(alert: &Alert) -> String {
    format!(
        "[{}] {}\n{}",
        alert.severity.as_str().to_uppercase(),
        alert.title,
        alert.description
    )
}

/// Posts JSON payloads to chat and generic webhooks.
#[derive(Clone)]
pub struct NotificationClient {
    client: reqwest::Client,
}

impl NotificationClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, payload: &T) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status(response.status().as_u16()))
        }
    }

    pub async fn post_chat(&self, url: &str, text: &str) -> Result<(), NotifyError> {
        self.post_json(url, &serde_json::json!({ "text": text })).await
    }
}

// ============================================================================
// Queue
// ============================================================================

/// A unit of notification work.
#[derive(Debug, Clone)]
pub enum NotificationJob {
    /// Deliver an alert to the configured channels it targets.
    Alert { alert: Alert, targets: NotifyTargets },
    /// Post an arbitrary payload to a fixed URL.
    Webhook {
        label: String,
        url: String,
        payload: serde_json::Value,
    },
}

#[derive(Debug, Default)]
pub struct NotificationStats {
    pub queued: AtomicU64,
    pub sent: AtomicU64,
    pub failed: AtomicU64,
    pub dropped: AtomicU64,
    pending: AtomicU64,
}

/// Point-in-time copy of [`NotificationStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStatsSnapshot {
    pub queued: u64,
    pub sent: u64,
    pub failed: u64,
    pub dropped: u64,
    pub pending: u64,
}

impl NotificationStats {
    pub fn snapshot(&self) -> NotificationStatsSnapshot {
        NotificationStatsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
        }
    }

    fn record(&self, channel: &'static str, result: Result<(), NotifyError>) {
        match result {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                debug!(channel, "Notification delivered");
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(channel, error = %e, "Notification delivery failed");
            }
        }
    }
}

/// Holds one unit of the pending count; released on drop, including when a
/// delivery task panics or the queue is torn down.
struct PendingGuard(Arc<NotificationStats>);

impl PendingGuard {
    fn acquire(stats: &Arc<NotificationStats>) -> Self {
        stats.pending.fetch_add(1, Ordering::AcqRel);
        Self(stats.clone())
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A job on the queue together with its pending slot.
struct Queued {
    job: NotificationJob,
    pending: PendingGuard,
}

/// Where alert notifications go, resolved per job.
struct Channels {
    runtime: Arc<RuntimeConfigStore>,
    fallback: NotificationsConfig,
}

/// Bounded notification queue with a background delivery worker.
pub struct NotificationQueue {
    tx: mpsc::Sender<Queued>,
    stats: Arc<NotificationStats>,
}

impl NotificationQueue {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn start(config: &NotificationsConfig, runtime: Arc<RuntimeConfigStore>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let stats = Arc::new(NotificationStats::default());
        let client = NotificationClient::new(Duration::from_secs(config.timeout_secs));
        let channels = Arc::new(Channels {
            runtime,
            fallback: config.clone(),
        });

        tokio::spawn(Self::worker(
            rx,
            client,
            channels,
            stats.clone(),
            config.max_concurrency.max(1),
        ));

        Self { tx, stats }
    }

    pub fn stats(&self) -> &NotificationStats {
        &self.stats
    }

    /// Queue a job without waiting. Returns false when it was dropped.
    pub fn enqueue(&self, job: NotificationJob) -> bool {
        let queued = Queued {
            job,
            pending: PendingGuard::acquire(&self.stats),
        };
        match self.tx.try_send(queued) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Notification queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                error!("Notification worker stopped, dropping job");
                false
            }
        }
    }

    /// Wait until every queued job has finished, up to `timeout`.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.stats.pending.load(Ordering::Acquire) > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }

    async fn worker(
        mut rx: mpsc::Receiver<Queued>,
        client: NotificationClient,
        channels: Arc<Channels>,
        stats: Arc<NotificationStats>,
        max_concurrency: usize,
    ) {
        let limiter = Arc::new(Semaphore::new(max_concurrency));
        let mut tasks = JoinSet::new();
        info!(max_concurrency, "Notification worker started");

        while let Some(Queued { job, pending }) = rx.recv().await {
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!(error = %e, "Notification task failed");
                }
            }

            let Ok(permit) = limiter.clone().acquire_owned().await else {
                break;
            };
            let client = client.clone();
            let channels = channels.clone();
            let stats = stats.clone();

            tasks.spawn(async move {
                let _pending = pending;
                deliver(&client, &channels, &stats, job).await;
                drop(permit);
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Notification task failed");
            }
        }
        info!("Notification worker stopped");
    }
}

async fn deliver(
    client: &NotificationClient,
    channels: &Channels,
    stats: &NotificationStats,
    job: NotificationJob,
) {
    match job {
        NotificationJob::Alert { alert, targets } => {
            let resolved = channels.runtime.resolve_channels(&channels.fallback);
            let chat_url = resolved.slack_webhook_url.filter(|_| targets.chat);
            let hook_url = resolved.alert_webhook_url.filter(|_| targets.webhook);
            if chat_url.is_none() && hook_url.is_none() {
                debug!(alert_id = %alert.id, "No notification channel configured");
                return;
            }

            let text = chat_text(&alert);
            let chat = async {
                if let Some(url) = &chat_url {
                    stats.record("chat", client.post_chat(url, &text).await);
                }
            };
            let hook = async {
                if let Some(url) = &hook_url {
                    stats.record("webhook", client.post_json(url, &alert).await);
                }
            };
            tokio::join!(chat, hook);
        }
        NotificationJob::Webhook {
            label,
            url,
            payload,
        } => {
            debug!(label = %label, "Posting webhook notification");
            stats.record("stakeholder", client.post_json(&url, &payload).await);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertDraft, AlertType, Severity};
    use chrono::Utc;
    use sauti_common::AlertChannelOverrides;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> Alert {
        AlertDraft::new(AlertType::RedFlag, Severity::Critical, "Bridge collapse", "Kisumu bridge")
            .into_alert("a1".into(), Utc::now())
    }

    fn config(chat: Option<String>, hook: Option<String>) -> NotificationsConfig {
        NotificationsConfig {
            slack_webhook_url: chat,
            alert_webhook_url: hook,
            ..NotificationsConfig::default()
        }
    }

    #[test]
    fn test_chat_text_format() {
        assert_eq!(chat_text(&alert()), "[CRITICAL] Bridge collapse\nKisumu bridge");
    }

    #[tokio::test]
    async fn test_alert_delivered_to_both_channels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(serde_json::json!({"text": "[CRITICAL] Bridge collapse\nKisumu bridge"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({"id": "a1", "alert_type": "red_flag"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let queue = NotificationQueue::start(
            &config(
                Some(format!("{}/chat", server.uri())),
                Some(format!("{}/hook", server.uri())),
            ),
            Arc::new(RuntimeConfigStore::in_memory()),
        );
        assert!(queue.enqueue(NotificationJob::Alert {
            alert: alert(),
            targets: NotifyTargets::default(),
        }));
        assert!(queue.wait_idle(Duration::from_secs(5)).await);

        let stats = queue.stats().snapshot();
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_targets_and_runtime_override() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/override"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/static"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let runtime = Arc::new(RuntimeConfigStore::in_memory());
        runtime
            .set_alert_channels(&AlertChannelOverrides {
                slack_webhook_url: String::new(),
                alert_webhook_url: format!("{}/override", server.uri()),
            })
            .unwrap();

        let queue = NotificationQueue::start(
            &config(
                Some(format!("{}/static", server.uri())),
                Some(format!("{}/static", server.uri())),
            ),
            runtime,
        );
        queue.enqueue(NotificationJob::Alert {
            alert: alert(),
            targets: NotifyTargets {
                chat: false,
                webhook: true,
            },
        });
        assert!(queue.wait_idle(Duration::from_secs(5)).await);
        assert_eq!(queue.stats().snapshot().sent, 1);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let queue = NotificationQueue::start(
            &NotificationsConfig::default(),
            Arc::new(RuntimeConfigStore::in_memory()),
        );
        queue.enqueue(NotificationJob::Webhook {
            label: "parliament".into(),
            url: format!("{}/brief", server.uri()),
            payload: serde_json::json!({"urgency": "HIGH"}),
        });
        assert!(queue.wait_idle(Duration::from_secs(5)).await);

        let stats = queue.stats().snapshot();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.sent, 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let queue = NotificationQueue::start(
            &NotificationsConfig {
                queue_capacity: 1,
                max_concurrency: 1,
                ..NotificationsConfig::default()
            },
            Arc::new(RuntimeConfigStore::in_memory()),
        );
        // no channels configured, so jobs finish immediately; flood faster than the worker drains
        let accepted = (0..100)
            .filter(|_| {
                queue.enqueue(NotificationJob::Alert {
                    alert: alert(),
                    targets: NotifyTargets::default(),
                })
            })
            .count() as u64;
        let stats = queue.stats().snapshot();
        assert_eq!(stats.queued, accepted);
        assert_eq!(stats.queued + stats.dropped, 100);
        assert!(stats.dropped > 0);
    }

    #[tokio::test]
    async fn test_dropped_jobs_leave_nothing_pending() {
        let queue = NotificationQueue::start(
            &NotificationsConfig {
                queue_capacity: 1,
                max_concurrency: 1,
                ..NotificationsConfig::default()
            },
            Arc::new(RuntimeConfigStore::in_memory()),
        );
        for _ in 0..50 {
            queue.enqueue(NotificationJob::Alert {
                alert: alert(),
                targets: NotifyTargets::default(),
            });
        }
        assert!(queue.wait_idle(Duration::from_secs(5)).await);
        assert_eq!(queue.stats().snapshot().pending, 0);
    }

    #[tokio::test]
    async fn test_pending_released_when_task_panics() {
        let stats = Arc::new(NotificationStats::default());
        let guard = PendingGuard::acquire(&stats);
        assert_eq!(stats.snapshot().pending, 1);

        let handle = tokio::spawn(async move {
            let _pending = guard;
            panic!("delivery blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(stats.snapshot().pending, 0);
    }
}
