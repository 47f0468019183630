//! HTTP routes for the signal service.
//!
//! Provides REST API endpoints for:
//! - Feedback ingestion and triage
//! - Crisis detection, policy monitoring and the crisis dashboard
//! - Alert rule CRUD and evaluation
//! - Alert listing, acknowledgement and trending checks
//! - Runtime notification settings and delivery stats

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use sauti_common::{AlertChannelOverrides, Error, RuntimeConfigStore};

use crate::analyzer::PolicyAssessment;
use crate::clock::Clock;
use crate::dispatcher::AlertDispatcher;
use crate::model::{Alert, AlertType, FeedbackItem, Sentiment, Severity};
use crate::monitor::{CrisisDashboard, CrisisMonitor, SignalList};
use crate::notification::{NotificationQueue, NotificationStatsSnapshot};
use crate::priority::{PriorityScore, PriorityScorer};
use crate::realtime::{RealtimeMonitor, RealtimeUpdate};
use crate::red_flag::RedFlagDetector;
use crate::rules::{AlertRule, RuleEngine, RuleInput};
use crate::sector::Sector;
use crate::storage::{AlertQuery, SqliteStore};
use crate::urgency::classify_urgency;

/// Items considered when scoring an ingested item against recent volume.
const PRIORITY_CONTEXT_LIMIT: usize = 1000;

// ============================================================================
// State
// ============================================================================

/// Shared state for the signal HTTP server.
pub struct SignalState {
    pub store: Arc<SqliteStore>,
    pub crisis: Arc<CrisisMonitor>,
    pub realtime: Arc<RealtimeMonitor>,
    pub rules: Arc<RuleEngine>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub red_flags: Arc<RedFlagDetector>,
    pub queue: Arc<NotificationQueue>,
    pub runtime: Arc<RuntimeConfigStore>,
    pub clock: Arc<dyn Clock>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        })
    }
}

/// Error body: `{"success": false, "error": {"code": ..., "message": ...}}`
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// [`Error`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "error": ErrorBody {
                code: self.0.code(),
                message: self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn parse_severity(value: Option<&str>) -> Result<Option<Severity>, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.parse::<Severity>().map_err(Error::InvalidInput))
        .transpose()
        .map_err(ApiError::from)
}

fn json_body(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<serde_json::Value, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| Error::InvalidInput(e.body_text()).into())
}

// ============================================================================
// Health Routes
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "sauti-signals",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Feedback Routes
// ============================================================================

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    id: Option<String>,
    text: String,
    #[serde(default = "default_source")]
    source: String,
    location: Option<String>,
    created_at: Option<DateTime<Utc>>,
    sentiment: Option<String>,
    sector: Option<String>,
}

fn default_source() -> String {
    "api".into()
}

impl FeedbackRequest {
    fn into_item(self, now: DateTime<Utc>) -> Result<FeedbackItem, ApiError> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidInput("text must not be empty".into()).into());
        }
        let sentiment = match self.sentiment.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(label) => Some(
                Sentiment::parse(label)
                    .ok_or_else(|| Error::InvalidInput(format!("unknown sentiment: {label}")))?,
            ),
            None => None,
        };

        Ok(FeedbackItem {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            text: self.text,
            source: self.source,
            location: self.location.filter(|l| !l.trim().is_empty()),
            created_at: self.created_at.unwrap_or(now),
            sentiment,
            sector: self.sector.as_deref().map(Sector::from_label),
        })
    }
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    feedback: FeedbackItem,
    red_flag: Option<Alert>,
    priority: PriorityScore,
    urgency: Severity,
}

async fn ingest_feedback(
    State(state): State<Arc<SignalState>>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<IngestResponse> {
    let now = state.clock.now();
    let item = req.into_item(now)?;
    state.store.insert_feedback(&item).await.map_err(Error::storage)?;

    let red_flag = match state.red_flags.check_item(&item).await {
        Some(draft) => state.dispatcher.dispatch(vec![draft]).await?.into_iter().next(),
        None => None,
    };

    let recent = state
        .store
        .recent_feedback(now - Duration::hours(24), PRIORITY_CONTEXT_LIMIT)
        .await
        .map_err(Error::storage)?;
    let priority = PriorityScorer.score(&item, &recent, now);
    let urgency = classify_urgency(&item.text, item.sentiment);

    tracing::info!(
        feedback_id = %item.id,
        priority = priority.score,
        urgency = %urgency,
        red_flag = red_flag.is_some(),
        "Feedback ingested"
    );

    Ok(ApiResponse::success(IngestResponse {
        feedback: item,
        red_flag,
        priority,
        urgency,
    }))
}

#[derive(Debug, Deserialize)]
struct TriageRequest {
    items: Vec<FeedbackRequest>,
}

#[derive(Debug, Serialize)]
struct TriageEntry {
    #[serde(flatten)]
    priority: PriorityScore,
    urgency: Severity,
}

/// Score a batch against itself without storing it. Highest priority first.
async fn triage_feedback(
    State(state): State<Arc<SignalState>>,
    Json(req): Json<TriageRequest>,
) -> ApiResult<Vec<TriageEntry>> {
    let now = state.clock.now();
    let items = req
        .items
        .into_iter()
        .map(|r| r.into_item(now))
        .collect::<Result<Vec<_>, _>>()?;

    let mut entries: Vec<TriageEntry> = items
        .iter()
        .map(|item| TriageEntry {
            priority: PriorityScorer.score(item, &items, now),
            urgency: classify_urgency(&item.text, item.sentiment),
        })
        .collect();
    entries.sort_by(|a, b| b.priority.score.total_cmp(&a.priority.score));
    Ok(ApiResponse::success(entries))
}

// ============================================================================
// Crisis Routes
// ============================================================================

#[derive(Debug, Deserialize)]
struct DetectParams {
    time_window_hours: Option<u32>,
    min_volume: Option<usize>,
}

#[derive(Debug, Serialize)]
struct DetectResponse {
    signals: SignalList,
    time_window_hours: u32,
    total_signals: usize,
    critical_count: usize,
    high_count: usize,
}

async fn detect_crisis(
    State(state): State<Arc<SignalState>>,
    Query(params): Query<DetectParams>,
) -> ApiResult<DetectResponse> {
    let config = state.crisis.config();
    let window = params.time_window_hours.unwrap_or(config.window_hours).max(1);
    let min_volume = params.min_volume.unwrap_or(config.min_volume);

    let signals = state.crisis.detect(window, min_volume).await;
    let count = |severity: Severity| signals.iter().filter(|s| s.severity == severity).count();
    let response = DetectResponse {
        time_window_hours: window,
        total_signals: signals.len(),
        critical_count: count(Severity::Critical),
        high_count: count(Severity::High),
        signals: signals.clone(),
    };
    let message = format!("Detected {} crisis signals", response.total_signals);
    Ok(ApiResponse::with_message(response, message))
}

#[derive(Debug, Deserialize)]
struct MonitorPolicyParams {
    policy_name: String,
    /// Comma-separated
    keywords: String,
    time_window_hours: Option<u32>,
}

async fn monitor_policy(
    State(state): State<Arc<SignalState>>,
    Query(params): Query<MonitorPolicyParams>,
) -> ApiResult<PolicyAssessment> {
    if params.policy_name.trim().is_empty() {
        return Err(Error::InvalidInput("policy_name must not be empty".into()).into());
    }
    let keywords: Vec<String> = params
        .keywords
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect();
    if keywords.is_empty() {
        return Err(Error::InvalidInput("at least one keyword is required".into()).into());
    }

    let assessment = state
        .crisis
        .monitor_policy(params.policy_name.trim(), &keywords, params.time_window_hours)
        .await;
    Ok(ApiResponse::success(assessment))
}

#[derive(Debug, Deserialize)]
struct DashboardParams {
    days: Option<u32>,
}

async fn crisis_dashboard(
    State(state): State<Arc<SignalState>>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<Arc<CrisisDashboard>> {
    let dashboard = state.crisis.dashboard(params.days.unwrap_or(7)).await?;
    Ok(ApiResponse::success(dashboard))
}

#[derive(Debug, Deserialize)]
struct SignalListParams {
    limit: Option<usize>,
    severity: Option<String>,
    signal_type: Option<String>,
}

async fn list_crisis_signals(
    State(state): State<Arc<SignalState>>,
    Query(params): Query<SignalListParams>,
) -> ApiResult<Vec<Alert>> {
    let severity = parse_severity(params.severity.as_deref())?;
    let signals = state
        .dispatcher
        .crisis_signals(
            params.signal_type.as_deref().filter(|t| !t.is_empty()),
            severity,
            Some(params.limit.unwrap_or(20)),
        )
        .await?;
    Ok(ApiResponse::success(signals))
}

// ============================================================================
// Rule Routes
// ============================================================================

async fn list_rules(State(state): State<Arc<SignalState>>) -> ApiResult<Vec<AlertRule>> {
    Ok(ApiResponse::success(state.rules.list().await?))
}

async fn create_rule(
    State(state): State<Arc<SignalState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AlertRule>>), ApiError> {
    let input = RuleInput::from_json(json_body(body)?)?;
    let rule = state.rules.create(input).await?;
    Ok((StatusCode::CREATED, ApiResponse::success(rule)))
}

async fn update_rule(
    State(state): State<Arc<SignalState>>,
    Path(id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<AlertRule> {
    let input = RuleInput::from_json(json_body(body)?)?;
    Ok(ApiResponse::success(state.rules.update(&id, input).await?))
}

async fn delete_rule(
    State(state): State<Arc<SignalState>>,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    state.rules.delete(&id).await?;
    Ok(ApiResponse::success(true))
}

#[derive(Debug, Default, Deserialize)]
struct EvaluateRequest {
    #[serde(default)]
    counts_by_sector: HashMap<String, u64>,
    #[serde(default)]
    counts_by_county: HashMap<String, u64>,
}

/// Preview the alerts rules would raise for the given counts. Nothing is stored.
async fn evaluate_rules(
    State(state): State<Arc<SignalState>>,
    Json(req): Json<EvaluateRequest>,
) -> ApiResult<Vec<Alert>> {
    let now = state.clock.now();
    let triggered = state
        .rules
        .evaluate(&req.counts_by_sector, &req.counts_by_county)
        .await?;
    Ok(ApiResponse::success(
        triggered.iter().map(|t| t.to_alert(now)).collect(),
    ))
}

// ============================================================================
// Alert Routes
// ============================================================================

#[derive(Debug, Deserialize)]
struct AlertListParams {
    alert_type: Option<String>,
    severity: Option<String>,
    acknowledged: Option<bool>,
    limit: Option<usize>,
}

async fn list_alerts(
    State(state): State<Arc<SignalState>>,
    Query(params): Query<AlertListParams>,
) -> ApiResult<Vec<Alert>> {
    let alert_type = params
        .alert_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(|t| t.parse::<AlertType>().map_err(Error::InvalidInput))
        .transpose()?;

    let alerts = state
        .dispatcher
        .list(&AlertQuery {
            alert_type,
            severity: parse_severity(params.severity.as_deref())?,
            acknowledged: params.acknowledged,
            limit: params.limit.unwrap_or(crate::dispatcher::DEFAULT_LIST_LIMIT),
            ..AlertQuery::default()
        })
        .await?;
    Ok(ApiResponse::success(alerts))
}

async fn acknowledge_alert(
    State(state): State<Arc<SignalState>>,
    Path(id): Path<String>,
) -> ApiResult<Alert> {
    Ok(ApiResponse::success(state.dispatcher.acknowledge(&id).await?))
}

#[derive(Debug, Deserialize)]
struct RedFlagParams {
    severity: Option<String>,
    limit: Option<usize>,
}

async fn list_red_flags(
    State(state): State<Arc<SignalState>>,
    Query(params): Query<RedFlagParams>,
) -> ApiResult<Vec<Alert>> {
    let severity = parse_severity(params.severity.as_deref())?;
    Ok(ApiResponse::success(
        state.dispatcher.red_flags(severity, params.limit).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct TrendingParams {
    hours: Option<u32>,
    threshold: Option<usize>,
}

async fn check_trending(
    State(state): State<Arc<SignalState>>,
    Query(params): Query<TrendingParams>,
) -> ApiResult<Vec<Alert>> {
    let alerts = state
        .crisis
        .check_trending(Some(params.hours.unwrap_or(24)), Some(params.threshold.unwrap_or(5)))
        .await?;
    let message = format!("Created {} trending issue alerts", alerts.len());
    Ok(ApiResponse::with_message(alerts, message))
}

async fn send_test_alert(State(state): State<Arc<SignalState>>) -> ApiResult<Alert> {
    Ok(ApiResponse::success(state.dispatcher.send_test_alert().await?))
}

// ============================================================================
// Config, Realtime and Stats Routes
// ============================================================================

async fn get_alert_config(State(state): State<Arc<SignalState>>) -> ApiResult<AlertChannelOverrides> {
    Ok(ApiResponse::success(state.runtime.alert_channels()))
}

async fn put_alert_config(
    State(state): State<Arc<SignalState>>,
    Json(overrides): Json<AlertChannelOverrides>,
) -> ApiResult<AlertChannelOverrides> {
    state
        .runtime
        .set_alert_channels(&overrides)
        .map_err(Error::storage)?;
    Ok(ApiResponse::success(state.runtime.alert_channels()))
}

async fn realtime_updates(
    State(state): State<Arc<SignalState>>,
) -> ApiResult<Option<RealtimeUpdate>> {
    Ok(ApiResponse::success(state.realtime.updates().await?))
}

async fn notification_stats(
    State(state): State<Arc<SignalState>>,
) -> Json<ApiResponse<NotificationStatsSnapshot>> {
    ApiResponse::success(state.queue.stats().snapshot())
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: Arc<SignalState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health))
        // Feedback
        .route("/api/v1/feedback", post(ingest_feedback))
        .route("/api/v1/feedback/triage", post(triage_feedback))
        // Crisis
        .route("/api/v1/crisis/detect", post(detect_crisis))
        .route("/api/v1/crisis/monitor-policy", post(monitor_policy))
        .route("/api/v1/crisis/dashboard", get(crisis_dashboard))
        .route("/api/v1/crisis/signals", get(list_crisis_signals))
        // Rules
        .route("/api/v1/rules", get(list_rules).post(create_rule))
        .route("/api/v1/rules/evaluate", post(evaluate_rules))
        .route("/api/v1/rules/:id", patch(update_rule).delete(delete_rule))
        // Alerts
        .route("/api/v1/alerts", get(list_alerts))
        .route("/api/v1/alerts/red-flags", get(list_red_flags))
        .route("/api/v1/alerts/check-trending", post(check_trending))
        .route("/api/v1/alerts/test", post(send_test_alert))
        .route("/api/v1/alerts/:id/ack", post(acknowledge_alert))
        // Settings and stats
        .route("/api/v1/config/alerts", get(get_alert_config).put(put_alert_config))
        .route("/api/v1/realtime/updates", get(realtime_updates))
        .route("/api/v1/notifications/stats", get(notification_stats))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::SignalService;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use sauti_common::Config;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let service = SignalService::with_parts(
            Config::default(),
            SqliteStore::in_memory().unwrap(),
            RuntimeConfigStore::in_memory(),
            clock,
        );
        build_router(service.state())
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_malformed_rule_is_rejected() {
        let app = test_app();
        let (status, body) = send(&app, "POST", "/api/v1/rules", Some(r#"{"min_count": 0}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");

        let (status, _) = send(&app, "POST", "/api/v1/rules", Some(r#"{"min_count": "#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "POST", "/api/v1/rules", Some(r#"{"colour": "red"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, "GET", "/api/v1/rules", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_rule_crud_and_evaluate() {
        let app = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/rules",
            Some(r#"{"name": "Health surge", "sector": "health", "min_count": 10}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, body) = send(
            &app,
            "POST",
            "/api/v1/rules/evaluate",
            Some(r#"{"counts_by_sector": {"Health": 15}}"#),
        )
        .await;
        assert_eq!(body["data"][0]["severity"], "medium");
        assert_eq!(body["data"][0]["alert_type"], "rule_triggered");

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/api/v1/rules/{id}"),
            Some(r#"{"enabled": false}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["enabled"], false);

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/rules/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "DELETE", &format!("/api/v1/rules/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_ingest_raises_red_flag() {
        let app = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/feedback",
            Some(r#"{"text": "Emergency: the hospital ward may collapse", "location": "Kisumu", "sentiment": "negative"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["red_flag"]["severity"], "critical");
        assert_eq!(body["data"]["urgency"], "critical");
        assert_eq!(body["data"]["priority"]["breakdown"]["sector_criticality"], 15.0);

        let (_, body) = send(&app, "GET", "/api/v1/alerts/red-flags?severity=critical", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_severity_filter() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/v1/alerts?severity=urgent", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_alert_config_round_trip() {
        let app = test_app();
        let (status, _) = send(
            &app,
            "PUT",
            "/api/v1/config/alerts",
            Some(r#"{"slack_webhook_url": "https://hooks.example/chat"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, "GET", "/api/v1/config/alerts", None).await;
        assert_eq!(body["data"]["slack_webhook_url"], "https://hooks.example/chat");
        assert_eq!(body["data"]["alert_webhook_url"], "");
    }

    #[tokio::test]
    async fn test_alert_config_write_failure_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let service = SignalService::with_parts(
            Config::default(),
            SqliteStore::in_memory().unwrap(),
            RuntimeConfigStore::open(blocker.join("runtime.json")).unwrap(),
            Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())),
        );
        let app = build_router(service.state());

        let (status, body) = send(
            &app,
            "PUT",
            "/api/v1/config/alerts",
            Some(r#"{"slack_webhook_url": "https://hooks.example/chat"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "STORAGE_ERROR");

        let (_, body) = send(&app, "GET", "/api/v1/config/alerts", None).await;
        assert_eq!(body["data"]["slack_webhook_url"], "");
    }

    #[tokio::test]
    async fn test_acknowledge_unknown_alert() {
        let app = test_app();
        let (status, _) = send(&app, "POST", "/api/v1/alerts/missing/ack", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
