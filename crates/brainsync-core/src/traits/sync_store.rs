// # Sync Store Trait
//
// Defines the interface for persisted sync state.
//
// ## Purpose
//
// The sync store makes repeated passes idempotent by tracking:
// - One `SyncRecord` per previously considered remote path
// - The session high-water mark (`last_synced`)
//
// ## Implementations
//
// - In-memory: `MemorySyncStore`
// - File-based: `FileSyncStore` (JSON, atomic writes)
// - Future: the service database

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{SessionId, SyncRecord};

/// Trait for sync store implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Ownership
///
/// - Records are upserted keyed by `(record.session_id, record.path)`; paths
///   are unique within a session.
/// - `set_last_synced` is called once per completed pass by the engine and by
///   nothing else.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// List every record of a session
    async fn list_records(&self, session_id: SessionId) -> Result<Vec<SyncRecord>, crate::Error>;

    /// Get the record for a path
    async fn get_record(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> Result<Option<SyncRecord>, crate::Error>;

    /// Insert or replace the record for `(record.session_id, record.path)`
    async fn upsert_record(&self, record: &SyncRecord) -> Result<(), crate::Error>;

    /// Read the session high-water mark
    async fn get_last_synced(
        &self,
        session_id: SessionId,
    ) -> Result<Option<DateTime<Utc>>, crate::Error>;

    /// Write the session high-water mark
    async fn set_last_synced(
        &self,
        session_id: SessionId,
        instant: DateTime<Utc>,
    ) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing sync stores from configuration
#[async_trait]
pub trait SyncStoreFactory: Send + Sync {
    /// Create a SyncStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<std::sync::Arc<dyn SyncStore>, crate::Error>;
}
