//! HTTP API tests against the fully layered router.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use sauti_common::{Config, RuntimeConfigStore};
use sauti_signals::clock::ManualClock;
use sauti_signals::storage::SqliteStore;
use sauti_signals::SignalService;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn app() -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now()));
    let service = SignalService::with_parts(
        Config::default(),
        SqliteStore::in_memory().unwrap(),
        RuntimeConfigStore::in_memory(),
        clock.clone(),
    );
    (service.build_router(), clock)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn ingest(app: &Router, text: &str, location: &str, minutes_ago: i64) {
    let (status, _) = call(
        app,
        "POST",
        "/api/v1/feedback",
        Some(json!({
            "text": text,
            "location": location,
            "sentiment": "negative",
            "created_at": now() - Duration::minutes(minutes_ago),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_detect_after_ingest() {
    let (app, _clock) = app();
    for i in 0..12 {
        ingest(&app, &format!("Clinic in ward {i} has no nurses and patients wait all day"), "Machakos", i).await;
    }

    let (status, body) = call(&app, "POST", "/api/v1/crisis/detect?time_window_hours=24&min_volume=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["time_window_hours"], 24);
    let total = body["data"]["total_signals"].as_u64().unwrap();
    assert_eq!(body["data"]["signals"].as_array().unwrap().len() as u64, total);

    let (_, body) = call(&app, "POST", "/api/v1/crisis/detect?min_volume=50", None).await;
    assert_eq!(body["data"]["total_signals"], 0);
}

#[tokio::test]
async fn test_check_trending_creates_alerts() {
    let (app, _clock) = app();
    for i in 0..5 {
        ingest(&app, &format!("Raw sewage keeps flowing, the water is contaminated ({i})"), "Mombasa", i).await;
    }

    let (status, body) = call(&app, "POST", "/api/v1/alerts/check-trending?threshold=5", None).await;
    assert_eq!(status, StatusCode::OK);
    let alerts = body["data"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["alert_type"], "trending_issue");
    assert_eq!(alerts[0]["affected_counties"], json!(["Mombasa"]));

    let (_, body) = call(&app, "GET", "/api/v1/alerts?alert_type=trending_issue", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_acknowledge_flow() {
    let (app, _clock) = app();
    let (status, body) = call(&app, "POST", "/api/v1/alerts/test", None).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, "POST", &format!("/api/v1/alerts/{id}/ack"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["acknowledged"], true);

    let (_, body) = call(&app, "GET", "/api/v1/alerts?acknowledged=false", None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_monitor_policy_requires_keywords() {
    let (app, _clock) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/crisis/monitor-policy?policy_name=Finance%20Bill&keywords=%20,%20",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/crisis/monitor-policy?policy_name=Finance%20Bill&keywords=finance%20bill,tax",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "no_data");
}

#[tokio::test]
async fn test_dashboard_and_realtime() {
    let (app, clock) = app();
    for i in 0..6 {
        ingest(&app, &format!("Potholes on the county road are getting worse ({i})"), "Nakuru", i).await;
    }

    let (status, body) = call(&app, "GET", "/api/v1/crisis/dashboard?days=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["time_period_days"], 1);
    assert_eq!(body["data"]["total_feedback_analyzed"], 6);

    let (status, body) = call(&app, "GET", "/api/v1/realtime/updates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["type"], "update");
    assert_eq!(body["data"]["data"]["counters"]["by_county"]["nakuru"], 6);

    clock.advance(Duration::days(2));
    let (_, body) = call(&app, "GET", "/api/v1/realtime/updates", None).await;
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_triage_orders_by_priority() {
    let (app, _clock) = app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/feedback/triage",
        Some(json!({
            "items": [
                {"id": "calm", "text": "Thanks for the new library hours", "sentiment": "positive", "created_at": now() - Duration::days(3)},
                {"id": "urgent", "text": "Emergency at the hospital, a patient died waiting", "sentiment": "negative"},
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries[0]["feedback_id"], "urgent");
    assert_eq!(entries[0]["urgency"], "critical");
    assert_eq!(entries[1]["feedback_id"], "calm");

    let (status, _) = call(&app, "POST", "/api/v1/feedback/triage", Some(json!({"items": [{"text": "  "}]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notification_stats_and_health() {
    let (app, _clock) = app();
    let (status, body) = call(&app, "GET", "/api/v1/notifications/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["dropped"], 0);

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "sauti-signals");
}
