//! Drives the gateway's axum front end with an in-process upstream

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use swanstudios_sync::{
    cache::{CacheNames, InMemoryCache},
    gateway::OfflineGateway,
    messages::MessageHandler,
    proxy::{build_router, ProxyState, SOURCE_HEADER},
    queue::{FileQueue, InMemoryQueue, OfflineQueue},
    sync::BackgroundSync,
    transport::{Transport, TransportError, UpstreamRequest, UpstreamResponse},
};
use tower::ServiceExt;

/// Echoes the request path while online
struct SwitchableUpstream {
    online: AtomicBool,
}

#[async_trait]
impl Transport for SwitchableUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(TransportError::Network("connection refused".into()));
        }
        let status = if request.method == "POST" { 201 } else { 200 };
        Ok(UpstreamResponse::json(
            status,
            &json!({ "path": request.path_and_query }),
        ))
    }
}

fn app() -> (Router, Arc<SwitchableUpstream>) {
    app_with_queue(Arc::new(InMemoryQueue::new()))
}

fn app_with_queue(queue: Arc<dyn OfflineQueue>) -> (Router, Arc<SwitchableUpstream>) {
    let upstream = Arc::new(SwitchableUpstream {
        online: AtomicBool::new(true),
    });
    let gateway = Arc::new(OfflineGateway::new(
        upstream.clone(),
        Arc::new(InMemoryCache::new()),
        queue.clone(),
        CacheNames::new("v1"),
    ));
    let sync = Arc::new(BackgroundSync::new(upstream.clone(), queue));

    let router = build_router(ProxyState {
        gateway: gateway.clone(),
        messages: Arc::new(MessageHandler::new(gateway, sync)),
    });
    (router, upstream)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let source = response
        .headers()
        .get(SOURCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, source, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_cached_schedule_served_when_offline() {
    let (app, upstream) = app();

    let (status, source, body) = call(&app, get("/api/schedule?start=2026-01-05")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("network"));
    assert_eq!(body["path"], "/api/schedule?start=2026-01-05");

    upstream.online.store(false, Ordering::SeqCst);

    let (status, source, body) = call(&app, get("/api/schedule?start=2026-01-05")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("cache"));
    assert_eq!(body["path"], "/api/schedule?start=2026-01-05");

    let (status, source, body) = call(&app, get("/api/schedule?start=2026-02-02")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(source.as_deref(), Some("offline"));
    assert_eq!(body["offline"], true);
}

#[tokio::test]
async fn test_offline_workout_queued_and_force_synced() {
    let (app, upstream) = app();
    upstream.online.store(false, Ordering::SeqCst);

    let (status, _, _) = call(&app, post_json("/api/workouts", json!({ "title": "Tempo run" }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, _, reply) = call(
        &app,
        post_json("/__gateway/messages", json!({ "type": "GET_OFFLINE_WORKOUTS" })),
    )
    .await;
    assert_eq!(reply["workouts"].as_array().unwrap().len(), 1);
    assert_eq!(reply["workouts"][0]["synced"], false);

    upstream.online.store(true, Ordering::SeqCst);
    let (status, _, reply) = call(
        &app,
        post_json("/__gateway/messages", json!({ "type": "FORCE_SYNC" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["synced"], 1);

    let (_, _, reply) = call(
        &app,
        post_json("/__gateway/messages", json!({ "type": "GET_OFFLINE_WORKOUTS" })),
    )
    .await;
    assert!(reply["workouts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_queued_workout_survives_gateway_restart() {
    let temp_dir = tempfile::TempDir::new().unwrap();

    {
        let queue = Arc::new(FileQueue::open(temp_dir.path()).await.unwrap());
        let (app, upstream) = app_with_queue(queue);
        upstream.online.store(false, Ordering::SeqCst);

        let request = Request::builder()
            .method("POST")
            .uri("/api/workouts")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, "Bearer t")
            .body(Body::from(json!({ "title": "Intervals" }).to_string()))
            .unwrap();
        let (status, _, _) = call(&app, request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    let queue = Arc::new(FileQueue::open(temp_dir.path()).await.unwrap());
    let (app, _) = app_with_queue(queue);

    let (_, _, reply) = call(
        &app,
        post_json("/__gateway/messages", json!({ "type": "GET_OFFLINE_WORKOUTS" })),
    )
    .await;
    let workouts = reply["workouts"].as_array().unwrap();
    assert_eq!(workouts.len(), 1);
    assert_eq!(workouts[0]["body"]["title"], "Intervals");
    assert!(workouts[0].get("authorization").is_none());

    let (_, _, reply) = call(
        &app,
        post_json("/__gateway/messages", json!({ "type": "FORCE_SYNC" })),
    )
    .await;
    assert_eq!(reply["synced"], 1);
}

#[tokio::test]
async fn test_unknown_message_rejected() {
    let (app, _) = app();

    let (status, _, _) = call(
        &app,
        post_json("/__gateway/messages", json!({ "type": "RELOAD" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_health() {
    let (app, upstream) = app();
    upstream.online.store(false, Ordering::SeqCst);

    let (status, _, body) = call(&app, get("/__gateway/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
