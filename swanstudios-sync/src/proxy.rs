/// HTTP front of the gateway
///
/// - `GET  /__gateway/health`
/// - `POST /__gateway/messages` - client message channel
/// - anything else is handed to [`OfflineGateway::handle`]
///
/// Proxied responses carry `x-gateway-source: network | cache | offline`.

use crate::{
    gateway::OfflineGateway,
    messages::{ClientMessage, MessageHandler, MessageReply},
    transport::{is_hop_by_hop, UpstreamRequest},
};
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Largest request body forwarded upstream
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub const SOURCE_HEADER: &str = "x-gateway-source";

#[derive(Clone)]
pub struct ProxyState {
    pub gateway: Arc<OfflineGateway>,
    pub messages: Arc<MessageHandler>,
}

pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/__gateway/health", get(health))
        .route("/__gateway/messages", post(message))
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn message(
    State(state): State<ProxyState>,
    Json(message): Json<ClientMessage>,
) -> Json<MessageReply> {
    Json(state.messages.handle(message).await)
}

async fn proxy(State(state): State<ProxyState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected request body");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "payload_too_large", "message": e.to_string() })),
            )
                .into_response();
        }
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let result = state
        .gateway
        .handle(UpstreamRequest {
            method: parts.method.as_str().to_string(),
            path_and_query,
            headers,
            body,
        })
        .await;

    let status = StatusCode::from_u16(result.response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(result.response.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &result.response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers.insert(
        HeaderName::from_static(SOURCE_HEADER),
        HeaderValue::from_static(result.source.as_str()),
    );

    response
}
