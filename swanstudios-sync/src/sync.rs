/// Background sync
///
/// [`BackgroundSync::sync_once`] replays every pending workout once:
/// accepted entries (any 2xx) are deleted, everything else stays queued for
/// the next pass. Entries already marked synced are deleted without replay.
///
/// [`SyncWorker`] runs a pass every interval until its token is cancelled.
///
/// # Example
///
/// ```no_run
/// use std::{sync::Arc, time::Duration};
/// use swanstudios_sync::{
///     queue::InMemoryQueue,
///     sync::{BackgroundSync, SyncWorker},
///     transport::HttpTransport,
/// };
///
/// # async fn example() -> anyhow::Result<()> {
/// let transport = Arc::new(HttpTransport::new("http://127.0.0.1:8080", Duration::from_secs(10))?);
/// let sync = Arc::new(BackgroundSync::new(transport, Arc::new(InMemoryQueue::new())));
///
/// let worker = SyncWorker::new(sync, Duration::from_secs(30));
/// let token = worker.shutdown_token();
/// let handle = tokio::spawn(async move { worker.run().await });
///
/// token.cancel();
/// handle.await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    queue::{with_client_ref, OfflineQueue, QueueError, QueuedWorkout},
    transport::{Transport, UpstreamRequest},
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("A sync pass is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,

    /// Already-synced entries removed without a request
    pub pruned: usize,

    pub remaining: usize,
}

pub struct BackgroundSync {
    transport: Arc<dyn Transport>,
    queue: Arc<dyn OfflineQueue>,

    /// Held for the duration of a pass
    running: Mutex<()>,
}

enum Replay {
    Accepted(u16),
    Rejected(u16),
    Offline(String),
}

impl BackgroundSync {
    pub fn new(transport: Arc<dyn Transport>, queue: Arc<dyn OfflineQueue>) -> Self {
        Self {
            transport,
            queue,
            running: Mutex::new(()),
        }
    }

    /// Runs one pass over the queue
    ///
    /// # Errors
    ///
    /// [`SyncError::AlreadyRunning`] if another pass holds the queue;
    /// [`SyncError::Queue`] if the queue can't be listed.
    pub async fn sync_once(&self) -> Result<SyncReport, SyncError> {
        let _guard = self.running.try_lock().map_err(|_| SyncError::AlreadyRunning)?;
        let mut report = SyncReport::default();

        for entry in self.queue.all().await? {
            if entry.synced {
                match self.queue.remove(&entry.key).await {
                    Ok(true) => report.pruned += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(key = %entry.key, error = %e, "Failed to prune synced workout"),
                }
                continue;
            }

            report.attempted += 1;
            match self.replay(&entry).await {
                Replay::Accepted(status) => {
                    // Replayed again next pass if this fails; the API dedups on client_ref
                    if let Err(e) = self.queue.remove(&entry.key).await {
                        tracing::warn!(key = %entry.key, error = %e, "Failed to remove synced workout");
                    }
                    report.synced += 1;
                    tracing::info!(key = %entry.key, status, "Offline workout synced");
                }
                Replay::Rejected(status) => {
                    report.failed += 1;
                    tracing::warn!(key = %entry.key, status, "Offline workout rejected; kept for retry");
                }
                Replay::Offline(reason) => {
                    report.failed += 1;
                    tracing::debug!(key = %entry.key, %reason, "Still offline; kept for retry");
                }
            }
        }

        report.remaining = self.queue.pending().await?.len();

        if report.attempted > 0 || report.pruned > 0 {
            tracing::info!(
                attempted = report.attempted,
                synced = report.synced,
                failed = report.failed,
                remaining = report.remaining,
                "Sync pass finished"
            );
        }

        Ok(report)
    }

    async fn replay(&self, entry: &QueuedWorkout) -> Replay {
        let mut request =
            UpstreamRequest::new("POST", entry.url.clone()).with_json(&with_client_ref(&entry.body, &entry.key));
        if let Some(auth) = &entry.authorization {
            request = request.with_header("authorization", auth.clone());
        }

        match self.transport.send(request).await {
            Ok(response) if response.is_success() => Replay::Accepted(response.status),
            Ok(response) => Replay::Rejected(response.status),
            Err(e) => Replay::Offline(e.to_string()),
        }
    }
}

/// Periodic sync loop
pub struct SyncWorker {
    sync: Arc<BackgroundSync>,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl SyncWorker {
    pub fn new(sync: Arc<BackgroundSync>, interval: Duration) -> Self {
        Self {
            sync,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs until the shutdown token is cancelled
    pub async fn run(&self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Sync worker starting");

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            match self.sync.sync_once().await {
                Ok(_) => {}
                Err(SyncError::AlreadyRunning) => {
                    tracing::debug!("Skipping scheduled sync; a pass is already running");
                }
                Err(e @ SyncError::Queue(_)) => {
                    tracing::error!(error = %e, "Scheduled sync failed");
                }
            }
        }

        tracing::info!("Sync worker shut down");
    }
}
