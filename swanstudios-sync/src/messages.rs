/// Client message channel
///
/// The web client posts `{ "type": "SKIP_WAITING" }` and friends; each
/// message gets one JSON reply.

use crate::{
    cache::purge_stale,
    gateway::OfflineGateway,
    queue::QueuedWorkout,
    sync::{BackgroundSync, SyncError, SyncReport},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate this cache version, deleting older ones
    SkipWaiting,
    GetOfflineWorkouts,
    ForceSync,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageReply {
    Activated {
        version: String,
        purged: Vec<String>,
    },
    OfflineWorkouts {
        workouts: Vec<QueuedWorkout>,
    },
    SyncComplete {
        #[serde(flatten)]
        report: SyncReport,
    },
    SyncBusy {
        message: String,
    },

    /// The offline queue could not be read
    QueueError {
        message: String,
    },
}

pub struct MessageHandler {
    gateway: Arc<OfflineGateway>,
    sync: Arc<BackgroundSync>,
}

impl MessageHandler {
    pub fn new(gateway: Arc<OfflineGateway>, sync: Arc<BackgroundSync>) -> Self {
        Self { gateway, sync }
    }

    pub async fn handle(&self, message: ClientMessage) -> MessageReply {
        tracing::debug!(?message, "Client message");

        match message {
            ClientMessage::SkipWaiting => {
                let names = self.gateway.names();
                let purged = purge_stale(self.gateway.cache().as_ref(), names).await;
                tracing::info!(version = %names.version, purged = purged.len(), "Cache version activated");
                MessageReply::Activated {
                    version: names.version.clone(),
                    purged,
                }
            }
            ClientMessage::GetOfflineWorkouts => match self.gateway.queue().pending().await {
                Ok(workouts) => MessageReply::OfflineWorkouts { workouts },
                Err(e) => {
                    tracing::error!(error = %e, "Failed to list offline workouts");
                    MessageReply::QueueError {
                        message: e.to_string(),
                    }
                }
            },
            ClientMessage::ForceSync => match self.sync.sync_once().await {
                Ok(report) => MessageReply::SyncComplete { report },
                Err(e @ SyncError::AlreadyRunning) => MessageReply::SyncBusy {
                    message: e.to_string(),
                },
                Err(e @ SyncError::Queue(_)) => MessageReply::QueueError {
                    message: e.to_string(),
                },
            },
        }
    }
}
