/// Offline workout queue
///
/// Entries are keyed `<unix-ms>-<random suffix>`. An entry with
/// `synced = false` is waiting for replay; the sync worker deletes entries
/// once the API has accepted them. There is no ordering, backoff or dedup
/// beyond that flag; the API deduplicates on `client_ref`.
///
/// [`FileQueue`] keeps one JSON file per entry so pending workouts survive a
/// gateway restart. [`InMemoryQueue`] is the same contract without a disk.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::Mutex};

const SUFFIX_LEN: usize = 9;
const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue entry encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedWorkout {
    pub key: String,

    /// Path the write was sent to
    pub url: String,

    pub body: serde_json::Value,

    /// Forwarded on replay so the API can authenticate it
    #[serde(skip_serializing)]
    pub authorization: Option<String>,

    pub timestamp: DateTime<Utc>,
    pub synced: bool,
}

impl QueuedWorkout {
    fn new(
        key: String,
        url: &str,
        body: serde_json::Value,
        authorization: Option<String>,
        synced: bool,
    ) -> Self {
        Self {
            key,
            url: url.to_string(),
            body,
            authorization,
            timestamp: Utc::now(),
            synced,
        }
    }
}

/// `<unix-ms>-<9 lowercase alphanumerics>`
pub fn new_queue_key(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}-{}", now.timestamp_millis(), suffix)
}

/// Keys double as file names, so only `[0-9a-z-]` is accepted
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || c == '-')
}

/// Sets `client_ref` to the queue key unless the client already chose one
pub fn with_client_ref(body: &serde_json::Value, key: &str) -> serde_json::Value {
    let mut body = body.clone();
    if let Some(obj) = body.as_object_mut() {
        obj.entry("client_ref")
            .or_insert_with(|| serde_json::Value::String(key.to_string()));
    }
    body
}

#[async_trait]
pub trait OfflineQueue: Send + Sync {
    async fn enqueue(
        &self,
        url: &str,
        body: serde_json::Value,
        authorization: Option<String>,
        synced: bool,
    ) -> Result<QueuedWorkout, QueueError>;

    /// Every entry, oldest key first
    async fn all(&self) -> Result<Vec<QueuedWorkout>, QueueError>;

    async fn pending(&self) -> Result<Vec<QueuedWorkout>, QueueError> {
        Ok(self.all().await?.into_iter().filter(|w| !w.synced).collect())
    }

    async fn remove(&self, key: &str) -> Result<bool, QueueError>;
}

#[derive(Default)]
pub struct InMemoryQueue {
    entries: Mutex<BTreeMap<String, QueuedWorkout>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfflineQueue for InMemoryQueue {
    async fn enqueue(
        &self,
        url: &str,
        body: serde_json::Value,
        authorization: Option<String>,
        synced: bool,
    ) -> Result<QueuedWorkout, QueueError> {
        let mut entries = self.entries.lock().await;

        let mut key = new_queue_key(Utc::now());
        while entries.contains_key(&key) {
            key = new_queue_key(Utc::now());
        }

        let entry = QueuedWorkout::new(key.clone(), url, body, authorization, synced);
        entries.insert(key, entry.clone());

        tracing::debug!(key = %entry.key, synced, "Workout stored in offline queue");
        Ok(entry)
    }

    async fn all(&self) -> Result<Vec<QueuedWorkout>, QueueError> {
        Ok(self.entries.lock().await.values().cloned().collect())
    }

    async fn remove(&self, key: &str) -> Result<bool, QueueError> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }
}

/// On-disk form; unlike the API view it keeps the Authorization header
#[derive(Serialize, Deserialize)]
struct StoredWorkout {
    key: String,
    url: String,
    body: serde_json::Value,
    authorization: Option<String>,
    timestamp: DateTime<Utc>,
    synced: bool,
}

impl From<&QueuedWorkout> for StoredWorkout {
    fn from(w: &QueuedWorkout) -> Self {
        Self {
            key: w.key.clone(),
            url: w.url.clone(),
            body: w.body.clone(),
            authorization: w.authorization.clone(),
            timestamp: w.timestamp,
            synced: w.synced,
        }
    }
}

impl From<StoredWorkout> for QueuedWorkout {
    fn from(w: StoredWorkout) -> Self {
        Self {
            key: w.key,
            url: w.url,
            body: w.body,
            authorization: w.authorization,
            timestamp: w.timestamp,
            synced: w.synced,
        }
    }
}

/// Directory-backed queue: `<dir>/<key>.json`, written via rename
pub struct FileQueue {
    dir: PathBuf,

    /// Serializes writers so two enqueues can't claim the same key
    lock: Mutex<()>,
}

impl FileQueue {
    /// Opens (creating if needed) the queue directory
    ///
    /// Leftover temp files from an interrupted write are removed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, QueueError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                tracing::warn!(path = %path.display(), "Removing partial queue write");
                fs::remove_file(&path).await?;
            }
        }

        tracing::info!(dir = %dir.display(), "Offline queue opened");
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    async fn write_entry(&self, entry: &QueuedWorkout) -> Result<(), QueueError> {
        let path = self.entry_path(&entry.key);
        let temp_path = path.with_extension("tmp");

        let bytes = serde_json::to_vec(&StoredWorkout::from(entry))?;
        fs::write(&temp_path, bytes).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl OfflineQueue for FileQueue {
    async fn enqueue(
        &self,
        url: &str,
        body: serde_json::Value,
        authorization: Option<String>,
        synced: bool,
    ) -> Result<QueuedWorkout, QueueError> {
        let _guard = self.lock.lock().await;

        let mut key = new_queue_key(Utc::now());
        while fs::try_exists(self.entry_path(&key)).await? {
            key = new_queue_key(Utc::now());
        }

        let entry = QueuedWorkout::new(key, url, body, authorization, synced);
        self.write_entry(&entry).await?;

        tracing::debug!(key = %entry.key, synced, "Workout written to offline queue");
        Ok(entry)
    }

    async fn all(&self) -> Result<Vec<QueuedWorkout>, QueueError> {
        let mut found = BTreeMap::new();

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                continue;
            }

            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                // Removed by a concurrent sync pass
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            match serde_json::from_slice::<StoredWorkout>(&bytes) {
                Ok(stored) => {
                    found.insert(stored.key.clone(), QueuedWorkout::from(stored));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable queue entry");
                }
            }
        }

        Ok(found.into_values().collect())
    }

    async fn remove(&self, key: &str) -> Result<bool, QueueError> {
        if !is_valid_key(key) {
            return Ok(false);
        }

        let _guard = self.lock.lock().await;
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_queue_key_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let key = new_queue_key(now);

        let (ms, suffix) = key.split_once('-').unwrap();
        assert_eq!(ms, now.timestamp_millis().to_string());
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_client_ref_added_once() {
        let body = with_client_ref(&json!({ "title": "Run" }), "1-abc");
        assert_eq!(body["client_ref"], "1-abc");

        let kept = with_client_ref(&json!({ "title": "Run", "client_ref": "mine" }), "1-abc");
        assert_eq!(kept["client_ref"], "mine");
    }

    async fn assert_pending_excludes_synced(queue: &dyn OfflineQueue) {
        let waiting = queue
            .enqueue("/api/workouts", json!({ "title": "A" }), None, false)
            .await
            .unwrap();
        queue
            .enqueue("/api/workouts", json!({ "title": "B" }), None, true)
            .await
            .unwrap();

        assert_eq!(queue.all().await.unwrap().len(), 2);
        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, waiting.key);

        assert!(queue.remove(&waiting.key).await.unwrap());
        assert!(!queue.remove(&waiting.key).await.unwrap());
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_excludes_synced() {
        assert_pending_excludes_synced(&InMemoryQueue::new()).await;
    }

    #[tokio::test]
    async fn test_file_queue_pending_excludes_synced() {
        let temp_dir = TempDir::new().unwrap();
        let queue = FileQueue::open(temp_dir.path()).await.unwrap();
        assert_pending_excludes_synced(&queue).await;
    }

    #[tokio::test]
    async fn test_file_queue_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        let queued = {
            let queue = FileQueue::open(temp_dir.path()).await.unwrap();
            queue
                .enqueue(
                    "/api/workouts",
                    json!({ "title": "Hill sprints" }),
                    Some("Bearer t".into()),
                    false,
                )
                .await
                .unwrap()
        };

        let reopened = FileQueue::open(temp_dir.path()).await.unwrap();
        let pending = reopened.pending().await.unwrap();
        assert_eq!(pending, vec![queued]);
        // Needed for replay, so it is kept on disk
        assert_eq!(pending[0].authorization.as_deref(), Some("Bearer t"));
    }

    #[tokio::test]
    async fn test_file_queue_skips_junk_and_cleans_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("1-broken.json"), b"{ not json").unwrap();
        std::fs::write(temp_dir.path().join("2-partial.tmp"), b"{").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();

        let queue = FileQueue::open(temp_dir.path()).await.unwrap();
        assert!(!temp_dir.path().join("2-partial.tmp").exists());
        assert!(queue.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_queue_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let queue = FileQueue::open(temp_dir.path().join("queue")).await.unwrap();
        std::fs::write(temp_dir.path().join("outside.json"), b"{}").unwrap();

        assert!(!queue.remove("../outside").await.unwrap());
        assert!(temp_dir.path().join("outside.json").exists());
    }

    #[test]
    fn test_valid_keys() {
        assert!(is_valid_key(&new_queue_key(Utc::now())));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("../etc/passwd"));
        assert!(!is_valid_key("1-ABC"));
    }

    #[test]
    fn test_authorization_is_not_serialized() {
        let entry = QueuedWorkout {
            key: "1-abc".into(),
            url: "/api/workouts".into(),
            body: json!({}),
            authorization: Some("Bearer secret".into()),
            timestamp: Utc::now(),
            synced: false,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("authorization").is_none());
        assert_eq!(json["synced"], false);
    }
}
