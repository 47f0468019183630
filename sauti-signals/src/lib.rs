//! Sauti Signals - Crisis signal detection and alerting for civic feedback.
//!
//! This crate provides:
//! - Signal analyzers (sentiment velocity, hashtag trends, policy crisis, protest organizing)
//! - Escalation prediction over analyzer outputs
//! - Red-flag keyword detection and trending complaints
//! - Composite priority scoring and urgency classification
//! - A persisted threshold rule engine
//! - Alert dispatch with dedup and a bounded notification worker
//! - Stakeholder crisis briefings
//! - Cron-driven detection cycles and realtime rule ticks
//! - HTTP API for ingestion, detection and management
//!
//! # Architecture
//!
//! ```text
//!   FeedbackSource ──▶ snapshot ──┬─▶ analyzers ──────┐
//!                                 ├─▶ red-flag scan ──┼─▶ escalation ─▶ signals
//!                                 └─▶ priority ───────┘                   │
//!                                                                        ▼
//!             NotificationQueue ◀── AlertDispatcher ◀── StakeholderRouter
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analyzer;
pub mod cache;
pub mod clock;
pub mod dispatcher;
pub mod escalation;
pub mod model;
pub mod monitor;
pub mod notification;
pub mod priority;
pub mod realtime;
pub mod red_flag;
pub mod routes;
pub mod rules;
pub mod scheduler;
pub mod sector;
pub mod signal;
pub mod source;
pub mod stakeholder;
pub mod storage;
pub mod urgency;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use sauti_common::{Config, RuntimeConfigStore};

use crate::cache::TtlCache;
use crate::clock::{Clock, SystemClock};
use crate::dispatcher::AlertDispatcher;
use crate::monitor::{CrisisDashboard, CrisisMonitor, SignalList};
use crate::notification::NotificationQueue;
use crate::realtime::{RealtimeMonitor, RealtimeUpdate};
use crate::red_flag::RedFlagDetector;
use crate::rules::RuleEngine;
use crate::scheduler::SignalScheduler;
use crate::stakeholder::StakeholderRouter;
use crate::storage::SqliteStore;

pub use model::{Alert, AlertType, FeedbackItem, FeedbackSnapshot, Sentiment, Severity};
pub use routes::{build_router, SignalState};
pub use signal::{CrisisSignal, SignalKind};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// How long queued notifications may drain on shutdown.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

// ============================================================================
// Signal Service
// ============================================================================

/// Runs the HTTP server and the detection scheduler over one shared state.
pub struct SignalService {
    config: Config,
    state: Arc<SignalState>,
}

impl SignalService {
    /// Open the configured database and runtime settings and build the service.
    pub fn new(config: Config) -> Result<Self> {
        let db_path = config.storage.db_path();
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open signal store at {}", db_path.display()))?;
        let runtime = RuntimeConfigStore::open(config.storage.runtime_path())
            .context("Failed to open runtime settings")?;

        Ok(Self::with_parts(config, store, runtime, Arc::new(SystemClock)))
    }

    /// Build every component once and share them as `Arc`s.
    ///
    /// Must be called inside a tokio runtime: the notification worker is
    /// spawned here.
    pub fn with_parts(
        config: Config,
        store: SqliteStore,
        runtime: RuntimeConfigStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(store);
        let runtime = Arc::new(runtime);

        let queue = Arc::new(NotificationQueue::start(
            &config.notifications,
            Arc::clone(&runtime),
        ));
        let dispatcher = Arc::new(AlertDispatcher::new(
            store.clone(),
            Arc::clone(&queue),
            Arc::clone(&clock),
            &config.alerts,
        ));
        let red_flags = Arc::new(RedFlagDetector::new(
            store.clone(),
            Arc::clone(&clock),
            &config.alerts,
        ));
        let rules = Arc::new(RuleEngine::new(store.clone(), Arc::clone(&clock)));
        let stakeholders = Arc::new(StakeholderRouter::new(
            &config.notifications.stakeholders,
            Arc::clone(&queue),
        ));

        let crisis = Arc::new(CrisisMonitor::new(
            store.clone(),
            Arc::clone(&dispatcher),
            stakeholders,
            Arc::new(TtlCache::<SignalList>::new(Arc::clone(&clock))),
            Arc::new(TtlCache::<Arc<CrisisDashboard>>::new(Arc::clone(&clock))),
            Arc::clone(&clock),
            config.detection.clone(),
        ));
        let realtime = Arc::new(RealtimeMonitor::new(
            store.clone(),
            Arc::clone(&rules),
            Arc::clone(&dispatcher),
            Arc::new(TtlCache::<Arc<RealtimeUpdate>>::new(Arc::clone(&clock))),
            Arc::clone(&clock),
            config.realtime.clone(),
        ));

        let state = Arc::new(SignalState {
            store,
            crisis,
            realtime,
            rules,
            dispatcher,
            red_flags,
            queue,
            runtime,
            clock,
        });

        Self { config, state }
    }

    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Build the router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        with_middleware(build_router(self.state()), REQUEST_TIMEOUT)
    }

    /// Serve HTTP and run scheduled tasks until Ctrl-C.
    pub async fn start(self) -> Result<()> {
        let scheduler = SignalScheduler::new(
            &self.config,
            Arc::clone(&self.state.crisis),
            Arc::clone(&self.state.realtime),
            Arc::clone(&self.state.clock),
        )?;
        let scheduler_task = tokio::spawn(async move { scheduler.run().await });

        let router = self.build_router();
        let addr: SocketAddr = self
            .config
            .listen_addr()
            .parse()
            .with_context(|| format!("Invalid listen address {}", self.config.listen_addr()))?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        scheduler_task.abort();
        if !self.state.queue.wait_idle(SHUTDOWN_DRAIN).await {
            tracing::warn!(
                pending = self.state.queue.stats().snapshot().pending,
                "Shutting down with undelivered notifications"
            );
        }
        tracing::info!("Signal service stopped");
        Ok(())
    }
}

/// Body limit, request timeout (408) and permissive CORS.
fn with_middleware(router: Router, timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(cors)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "done"
            }),
        );
        let app = with_middleware(router, Duration::from_millis(50));

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let router = Router::new().route("/echo", axum::routing::post(|body: String| async move { body }));
        let app = with_middleware(router, REQUEST_TIMEOUT);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .body(Body::from(vec![b'a'; MAX_BODY_BYTES + 1]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
