//! HTTP API integration tests.
//!
//! Each test wires the full pipeline over an in-memory store and drives
//! the real router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use depot_core::broker::MemoryBroker;
use depot_core::config::Config;
use depot_core::deposit::{DepositState, DepositStore, SqliteDepositStore};
use depot_core::jobs::StepSequencer;
use depot_core::notify::{event_channel, LoggingNotifier};
use depot_core::runtime::PipelineRuntime;

use depot_server::{create_router, jobs, AppState};

struct TestServer {
    app: Router,
    store: Arc<dyn DepositStore>,
    runtime: PipelineRuntime,
}

async fn test_server() -> TestServer {
    let store: Arc<dyn DepositStore> =
        Arc::new(SqliteDepositStore::in_memory().expect("in-memory store"));
    let broker = MemoryBroker::new();
    let (events, _events_rx) = event_channel(64);
    let sequencer = Arc::new(StepSequencer::new(
        jobs::pipeline_steps(),
        Arc::clone(&store),
    ));

    let config = Config::default();
    let mut orchestrator = config.orchestrator.clone();
    orchestrator.cleanup_delay_secs = 0;

    let runtime = PipelineRuntime::new(
        Arc::clone(&store),
        broker.clone(),
        Arc::new(jobs::job_registry()),
        sequencer,
        Arc::new(LoggingNotifier),
        events,
        orchestrator,
    );
    runtime.start().await;

    let state = Arc::new(AppState::new(
        config,
        Arc::clone(&store),
        broker,
        runtime.controller(),
        runtime.switch(),
    ));
    TestServer {
        app: create_router(state),
        store,
        runtime,
    }
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn wait_for_state(store: &Arc<dyn DepositStore>, id: &str, expected: DepositState) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if store.get_state(id).unwrap() == expected {
            return;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "deposit {id} never reached {expected}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_health_reports_ok() {
    let server = test_server().await;
    let (status, body) = get_json(&server.app, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    server.runtime.shutdown().await;
}

#[tokio::test]
async fn test_unknown_deposit_is_404() {
    let server = test_server().await;
    let (status, body) = get_json(&server.app, "/api/v1/deposits/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
    server.runtime.shutdown().await;
}

#[tokio::test]
async fn test_registered_deposit_completes_via_api() {
    let server = test_server().await;
    let (status, body) = post_json(
        &server.app,
        "/api/v1/deposits",
        json!({
            "deposit_id": "dep-1",
            "username": "alice",
            "fields": {"container": "vault-1", "depositorEmail": "alice@example.org"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["deposit_id"], "dep-1");

    wait_for_state(&server.store, "dep-1", DepositState::Finished).await;

    let (status, body) = get_json(&server.app, "/api/v1/deposits/dep-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "finished");
    assert_eq!(body["fields"]["container"], "vault-1");
    assert_eq!(
        body["fields"]["archiveLocation"],
        "archive://deposits/dep-1"
    );
    server.runtime.shutdown().await;
}

#[tokio::test]
async fn test_invalid_submission_fails() {
    let server = test_server().await;
    // No container field: the validate step raises a domain failure.
    let (status, _) = post_json(
        &server.app,
        "/api/v1/deposits",
        json!({
            "deposit_id": "dep-bad",
            "username": "alice",
            "fields": {"depositorEmail": "alice@example.org"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_for_state(&server.store, "dep-bad", DepositState::Failed).await;
    let (_, body) = get_json(&server.app, "/api/v1/deposits/dep-bad").await;
    assert_eq!(body["fields"]["errorMessage"], "submission has no container");
    server.runtime.shutdown().await;
}

#[tokio::test]
async fn test_pipeline_quiet_and_unquiet_via_api() {
    let server = test_server().await;
    let (status, _) = post_json(
        &server.app,
        "/api/v1/pipeline/quiet",
        json!({"username": "admin"}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let (_, body) = get_json(&server.app, "/api/v1/pipeline").await;
        if body["consuming"] == Value::Bool(false) {
            assert_eq!(body["state"], "quieted");
            break;
        }
        assert!(std::time::Instant::now() < deadline, "pipeline never quieted");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Consumption resumes and deposits flow again after unquiet.
    let (status, _) = post_json(
        &server.app,
        "/api/v1/pipeline/unquiet",
        json!({"username": "admin"}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = post_json(
        &server.app,
        "/api/v1/deposits",
        json!({
            "deposit_id": "dep-2",
            "username": "alice",
            "fields": {"container": "vault-2", "depositorEmail": "alice@example.org"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_state(&server.store, "dep-2", DepositState::Finished).await;
    server.runtime.shutdown().await;
}

#[tokio::test]
async fn test_metrics_exposed() {
    let server = test_server().await;
    let response = server
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("depot_"));
    server.runtime.shutdown().await;
}
