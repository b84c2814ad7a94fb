/// Response caches
///
/// Caches are named and versioned, e.g. `swanstudios-api-v1`. Activating a
/// new version deletes every older `swanstudios-*` cache. Only GET
/// responses are stored, keyed by path and query.

use crate::transport::{UpstreamRequest, UpstreamResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub const CACHE_PREFIX: &str = "swanstudios-";

/// Current cache names for one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub version: String,
}

impl CacheNames {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    pub fn api(&self) -> String {
        format!("{}api-{}", CACHE_PREFIX, self.version)
    }

    pub fn static_assets(&self) -> String {
        format!("{}static-{}", CACHE_PREFIX, self.version)
    }

    /// Ours, but not this version
    pub fn is_stale(&self, name: &str) -> bool {
        name.starts_with(CACHE_PREFIX) && name != self.api() && name != self.static_assets()
    }
}

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub response: UpstreamResponse,
    pub stored_at: DateTime<Utc>,
}

/// Cache key for a request, or None if it can't be cached
pub fn cache_key(request: &UpstreamRequest) -> Option<String> {
    request.is_get().then(|| request.path_and_query.clone())
}

#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, cache: &str, key: &str) -> Option<CachedResponse>;

    async fn put(&self, cache: &str, key: &str, response: UpstreamResponse);

    async fn cache_names(&self) -> Vec<String>;

    /// Returns false if no such cache existed
    async fn delete_cache(&self, cache: &str) -> bool;
}

/// Deletes stale caches, returning the names removed
pub async fn purge_stale(cache: &dyn ResponseCache, names: &CacheNames) -> Vec<String> {
    let mut purged = Vec::new();

    for name in cache.cache_names().await {
        if names.is_stale(&name) && cache.delete_cache(&name).await {
            tracing::info!(cache = %name, "Deleted stale cache");
            purged.push(name);
        }
    }

    purged.sort();
    purged
}

#[derive(Default)]
pub struct InMemoryCache {
    caches: RwLock<HashMap<String, HashMap<String, CachedResponse>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, cache: &str) -> usize {
        self.caches.read().await.get(cache).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    async fn get(&self, cache: &str, key: &str) -> Option<CachedResponse> {
        self.caches.read().await.get(cache)?.get(key).cloned()
    }

    async fn put(&self, cache: &str, key: &str, response: UpstreamResponse) {
        self.caches
            .write()
            .await
            .entry(cache.to_string())
            .or_default()
            .insert(
                key.to_string(),
                CachedResponse {
                    response,
                    stored_at: Utc::now(),
                },
            );
    }

    async fn cache_names(&self) -> Vec<String> {
        self.caches.read().await.keys().cloned().collect()
    }

    async fn delete_cache(&self, cache: &str) -> bool {
        self.caches.write().await.remove(cache).is_some()
    }
}
