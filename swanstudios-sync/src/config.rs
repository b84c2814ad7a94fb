/// Gateway configuration
///
/// # Environment Variables
///
/// - `GATEWAY_HOST`: host to bind to (default: 127.0.0.1)
/// - `GATEWAY_PORT`: port to bind to (default: 8090)
/// - `UPSTREAM_URL`: API base URL (default: http://127.0.0.1:8080)
/// - `UPSTREAM_TIMEOUT_SECS`: per-request upstream timeout (default: 10)
/// - `SYNC_INTERVAL_SECS`: background sync period (default: 30)
/// - `CACHE_VERSION`: suffix for cache names (default: v1)
/// - `QUEUE_DIR`: where offline workouts are stored (default: ./data/offline-queue)

use std::{env, path::PathBuf, time::Duration};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub host: String,
    pub port: u16,
    pub upstream_url: String,
    pub upstream_timeout: Duration,
    pub sync_interval: Duration,
    pub cache_version: String,
    pub queue_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
            upstream_url: "http://127.0.0.1:8080".to_string(),
            upstream_timeout: Duration::from_secs(10),
            sync_interval: Duration::from_secs(30),
            cache_version: "v1".to_string(),
            queue_dir: PathBuf::from("./data/offline-queue"),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let port = match env::var("GATEWAY_PORT") {
            Ok(v) => v.parse::<u16>()?,
            Err(_) => defaults.port,
        };

        let upstream_timeout = match env::var("UPSTREAM_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.parse::<u64>()?),
            Err(_) => defaults.upstream_timeout,
        };

        let sync_interval = match env::var("SYNC_INTERVAL_SECS") {
            Ok(v) => Duration::from_secs(v.parse::<u64>()?),
            Err(_) => defaults.sync_interval,
        };
        if sync_interval.is_zero() {
            anyhow::bail!("SYNC_INTERVAL_SECS must be greater than 0");
        }

        let upstream_url = env::var("UPSTREAM_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.upstream_url);
        if !upstream_url.starts_with("http://") && !upstream_url.starts_with("https://") {
            anyhow::bail!("UPSTREAM_URL must start with http:// or https://");
        }

        let cache_version = env::var("CACHE_VERSION").unwrap_or(defaults.cache_version);
        if cache_version.is_empty() {
            anyhow::bail!("CACHE_VERSION cannot be empty");
        }

        let queue_dir = match env::var("QUEUE_DIR") {
            Ok(dir) if dir.trim().is_empty() => anyhow::bail!("QUEUE_DIR cannot be empty"),
            Ok(dir) => PathBuf::from(dir),
            Err(_) => defaults.queue_dir,
        };

        Ok(Self {
            host: env::var("GATEWAY_HOST").unwrap_or(defaults.host),
            port,
            upstream_url,
            upstream_timeout,
            sync_interval,
            cache_version,
            queue_dir,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8090");
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert_eq!(config.cache_version, "v1");
        assert_eq!(config.queue_dir, PathBuf::from("./data/offline-queue"));
    }
}
