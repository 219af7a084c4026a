// # Ingestion and Notification Collaborators
//
// The knowledge store and the notification subsystem are external. The
// engine only needs one call on each.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::DownloadedArtifact;

/// Outcome recorded for a processed file version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// Content was ingested into the brain
    Success {
        /// Remote file name
        file_name: String,
    },
    /// Download or ingestion failed; the file will be retried
    Failed {
        /// Remote file name
        file_name: String,
        /// Human-readable reason
        reason: String,
    },
}

/// Trait for the knowledge store that receives downloaded content
///
/// Ingestion must tolerate receiving the same file version more than once:
/// the engine delivers at least once.
#[async_trait]
pub trait Ingestor: Send + Sync {
    /// Attach `artifact` to the brain `brain_id`
    ///
    /// The artifact is owned by the ingestor from here on; its content can
    /// be read exactly once.
    async fn ingest(&self, brain_id: Uuid, artifact: DownloadedArtifact) -> Result<(), crate::Error>;
}

/// Trait for the notification sink
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Record the outcome for `notification_id`
    async fn record(
        &self,
        notification_id: Uuid,
        outcome: NotificationOutcome,
    ) -> Result<(), crate::Error>;
}
