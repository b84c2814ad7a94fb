/// Offline gateway
///
/// Applies the per-class strategy to one request:
///
/// ```text
/// ApiCritical  network ─ ok ──> cache GET 2xx, record POST /api/workouts (synced)
///                      └ err ─> queue POST /api/workouts (pending)
///                               cached copy, else synthetic 503
/// Static       network ─ ok ──> cache 2xx unless video/*
///                      └ err ─> cached copy, else synthetic 503
/// Video        network ─ err ─> synthetic 503
/// Passthrough  network ─ err ─> synthetic 503
/// ```
///
/// Any transport error counts as offline. Upstream error statuses are
/// returned as-is and never cached.

use crate::{
    cache::{cache_key, CacheNames, ResponseCache},
    queue::OfflineQueue,
    router::{classify, is_video_content_type, is_workout_write, RequestClass},
    transport::{Transport, UpstreamRequest, UpstreamResponse},
};
use serde_json::json;
use std::sync::Arc;

pub const OFFLINE_STATUS: u16 = 503;

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    Offline,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub response: UpstreamResponse,
    pub source: ResponseSource,

    /// Set when a workout write was stored for replay
    pub queued_key: Option<String>,
}

impl GatewayResponse {
    fn network(response: UpstreamResponse) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
            queued_key: None,
        }
    }
}

/// `{ "error": "offline", "message": ..., "offline": true }` with status 503
pub fn offline_response(message: &str) -> UpstreamResponse {
    UpstreamResponse::json(
        OFFLINE_STATUS,
        &json!({
            "error": "offline",
            "message": message,
            "offline": true,
        }),
    )
}

pub struct OfflineGateway {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn ResponseCache>,
    queue: Arc<dyn OfflineQueue>,
    names: CacheNames,
}

impl OfflineGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn ResponseCache>,
        queue: Arc<dyn OfflineQueue>,
        names: CacheNames,
    ) -> Self {
        Self {
            transport,
            cache,
            queue,
            names,
        }
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<dyn OfflineQueue> {
        &self.queue
    }

    pub async fn handle(&self, request: UpstreamRequest) -> GatewayResponse {
        let class = classify(&request.path_and_query);
        tracing::debug!(
            method = %request.method,
            path = %request.path_and_query,
            class = class.as_str(),
            "Gateway request"
        );

        match class {
            RequestClass::ApiCritical => self.handle_api(request).await,
            RequestClass::Static => self.handle_static(request).await,
            RequestClass::Video | RequestClass::Passthrough => self.network_only(request).await,
        }
    }

    async fn handle_api(&self, request: UpstreamRequest) -> GatewayResponse {
        let workout_write = is_workout_write(&request.method, &request.path_and_query);
        let key = cache_key(&request);

        // Keep what we need for queuing before the body moves
        let write = workout_write.then(|| {
            (
                request.path_and_query.clone(),
                serde_json::from_slice::<serde_json::Value>(&request.body).ok(),
                request.header("authorization").map(str::to_string),
            )
        });

        match self.transport.send(request).await {
            Ok(response) => {
                if let Some(key) = &key {
                    if response.is_success() {
                        self.cache.put(&self.names.api(), key, response.clone()).await;
                    }
                }

                let mut result = GatewayResponse::network(response);
                if let Some((url, Some(body), auth)) = write {
                    if result.response.is_success() {
                        match self.queue.enqueue(&url, body, auth, true).await {
                            Ok(entry) => result.queued_key = Some(entry.key),
                            Err(e) => tracing::warn!(error = %e, "Failed to record synced workout"),
                        }
                    }
                }
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upstream unreachable, serving offline response");

                let queued_key = match write {
                    Some((url, Some(body), auth)) => match self.queue.enqueue(&url, body, auth, false).await {
                        Ok(entry) => {
                            tracing::info!(key = %entry.key, "Workout queued for background sync");
                            Some(entry.key)
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to queue offline workout");
                            None
                        }
                    },
                    Some((_, None, _)) => {
                        tracing::warn!("Workout body is not JSON; not queued");
                        None
                    }
                    None => None,
                };

                let mut result = self
                    .from_cache_or_offline(&self.names.api(), key.as_deref(), queued_key.is_some())
                    .await;
                result.queued_key = queued_key;
                result
            }
        }
    }

    async fn handle_static(&self, request: UpstreamRequest) -> GatewayResponse {
        let key = cache_key(&request);

        match self.transport.send(request).await {
            Ok(response) => {
                let is_video = response.header("content-type").is_some_and(is_video_content_type);
                if let (Some(key), true, false) = (&key, response.is_success(), is_video) {
                    self.cache
                        .put(&self.names.static_assets(), key, response.clone())
                        .await;
                }
                GatewayResponse::network(response)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upstream unreachable for static asset");
                self.from_cache_or_offline(&self.names.static_assets(), key.as_deref(), false)
                    .await
            }
        }
    }

    async fn network_only(&self, request: UpstreamRequest) -> GatewayResponse {
        match self.transport.send(request).await {
            Ok(response) => GatewayResponse::network(response),
            Err(e) => {
                tracing::warn!(error = %e, "Upstream unreachable");
                GatewayResponse {
                    response: offline_response("You are offline and this content is not available offline"),
                    source: ResponseSource::Offline,
                    queued_key: None,
                }
            }
        }
    }

    async fn from_cache_or_offline(
        &self,
        cache: &str,
        key: Option<&str>,
        queued: bool,
    ) -> GatewayResponse {
        if let Some(key) = key {
            if let Some(hit) = self.cache.get(cache, key).await {
                tracing::debug!(cache, key, "Serving cached response");
                return GatewayResponse {
                    response: hit.response,
                    source: ResponseSource::Cache,
                    queued_key: None,
                };
            }
        }

        let message = if queued {
            "You are offline. Your workout was saved and will sync when you reconnect"
        } else {
            "You are offline and no cached copy is available"
        };

        GatewayResponse {
            response: offline_response(message),
            source: ResponseSource::Offline,
            queued_key: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{cache::InMemoryCache, queue::InMemoryQueue, transport::TransportError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Scripted upstream; flips between online and offline
    pub(crate) struct FakeTransport {
        pub online: AtomicBool,
        pub status: Mutex<u16>,
        pub content_type: Mutex<String>,
        pub calls: AtomicUsize,
        pub sent: Mutex<Vec<UpstreamRequest>>,
    }

    impl FakeTransport {
        pub(crate) fn new(online: bool) -> Arc<Self> {
            Arc::new(Self {
                online: AtomicBool::new(online),
                status: Mutex::new(200),
                content_type: Mutex::new("application/json".to_string()),
                calls: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.online.load(Ordering::SeqCst) {
                return Err(TransportError::Network("connection refused".into()));
            }

            let body = json!({ "path": request.path_and_query, "method": request.method });
            self.sent.lock().await.push(request);

            let mut response = UpstreamResponse::json(*self.status.lock().await, &body);
            response.headers = vec![("content-type".into(), self.content_type.lock().await.clone())];
            Ok(response)
        }
    }

    pub(crate) fn gateway(
        transport: Arc<FakeTransport>,
    ) -> (OfflineGateway, Arc<InMemoryCache>, Arc<InMemoryQueue>) {
        let cache = Arc::new(InMemoryCache::new());
        let queue = Arc::new(InMemoryQueue::new());
        let gateway = OfflineGateway::new(transport, cache.clone(), queue.clone(), CacheNames::new("v1"));
        (gateway, cache, queue)
    }

    #[tokio::test]
    async fn test_api_get_cached_then_served_offline() {
        let transport = FakeTransport::new(true);
        let (gateway, cache, _) = gateway(transport.clone());

        let online = gateway.handle(UpstreamRequest::new("GET", "/api/schedule")).await;
        assert_eq!(online.source, ResponseSource::Network);
        assert_eq!(cache.len("swanstudios-api-v1").await, 1);

        transport.set_online(false);
        let offline = gateway.handle(UpstreamRequest::new("GET", "/api/schedule")).await;
        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.response, online.response);
    }

    #[tokio::test]
    async fn test_api_miss_offline_is_synthetic_503() {
        let transport = FakeTransport::new(false);
        let (gateway, _, _) = gateway(transport);

        let result = gateway.handle(UpstreamRequest::new("GET", "/api/auth/me")).await;
        assert_eq!(result.source, ResponseSource::Offline);
        assert_eq!(result.response.status, 503);

        let body: serde_json::Value = serde_json::from_slice(&result.response.body).unwrap();
        assert_eq!(body["error"], "offline");
        assert_eq!(body["offline"], true);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_error_status_not_cached() {
        let transport = FakeTransport::new(true);
        *transport.status.lock().await = 500;
        let (gateway, cache, _) = gateway(transport);

        let result = gateway.handle(UpstreamRequest::new("GET", "/api/schedule")).await;
        assert_eq!(result.response.status, 500);
        assert_eq!(cache.len("swanstudios-api-v1").await, 0);
    }

    #[tokio::test]
    async fn test_offline_workout_write_is_queued() {
        let transport = FakeTransport::new(false);
        let (gateway, _, queue) = gateway(transport);

        let request = UpstreamRequest::new("POST", "/api/workouts")
            .with_header("authorization", "Bearer t")
            .with_json(&json!({ "title": "Leg day" }));
        let result = gateway.handle(request).await;

        assert_eq!(result.response.status, 503);
        let key = result.queued_key.expect("workout should be queued");

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, key);
        assert_eq!(pending[0].body["title"], "Leg day");
        assert_eq!(pending[0].authorization.as_deref(), Some("Bearer t"));
    }

    #[tokio::test]
    async fn test_online_workout_write_recorded_as_synced() {
        let transport = FakeTransport::new(true);
        *transport.status.lock().await = 201;
        let (gateway, cache, queue) = gateway(transport);

        let request = UpstreamRequest::new("POST", "/api/workouts").with_json(&json!({ "title": "Run" }));
        let result = gateway.handle(request).await;

        assert_eq!(result.response.status, 201);
        assert!(result.queued_key.is_some());
        assert!(queue.pending().await.unwrap().is_empty());
        assert_eq!(queue.all().await.unwrap().len(), 1);
        // POST responses are never cached
        assert_eq!(cache.len("swanstudios-api-v1").await, 0);
    }

    #[tokio::test]
    async fn test_static_video_content_not_cached() {
        let transport = FakeTransport::new(true);
        *transport.content_type.lock().await = "video/mp4".to_string();
        let (gateway, cache, _) = gateway(transport);

        gateway.handle(UpstreamRequest::new("GET", "/assets/promo.js")).await;
        assert_eq!(cache.len("swanstudios-static-v1").await, 0);
    }

    #[tokio::test]
    async fn test_static_cached_and_served_offline() {
        let transport = FakeTransport::new(true);
        let (gateway, _, _) = gateway(transport.clone());

        gateway.handle(UpstreamRequest::new("GET", "/assets/app.css")).await;
        transport.set_online(false);

        let result = gateway.handle(UpstreamRequest::new("GET", "/assets/app.css")).await;
        assert_eq!(result.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_video_never_cached() {
        let transport = FakeTransport::new(true);
        let (gateway, cache, _) = gateway(transport.clone());

        gateway.handle(UpstreamRequest::new("GET", "/videos/squat.mp4")).await;
        assert!(cache.cache_names().await.is_empty());

        transport.set_online(false);
        let result = gateway.handle(UpstreamRequest::new("GET", "/videos/squat.mp4")).await;
        assert_eq!(result.source, ResponseSource::Offline);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }
}
