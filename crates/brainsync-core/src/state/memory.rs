// # Memory Sync Store
//
// In-memory implementation of SyncStore.
//
// ## Crash Behavior
//
// - All records and marks are lost on restart
// - The first pass after a restart treats every file as new and
//   re-ingests it
//
// ## When to Use
//
// - Testing environments
// - One-shot runs where re-ingestion is harmless

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::SessionState;
use crate::Error;
use crate::config::StoreConfig;
use crate::model::{SessionId, SyncRecord};
use crate::traits::{SyncStore, SyncStoreFactory};

/// In-memory sync store
///
/// # Example
///
/// ```rust,no_run
/// use brainsync_core::state::MemorySyncStore;
/// use brainsync_core::traits::SyncStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemorySyncStore::new();
///     store.set_last_synced(1, chrono::Utc::now()).await?;
///     assert!(store.get_last_synced(1).await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySyncStore {
    inner: Arc<RwLock<HashMap<SessionId, SessionState>>>,
}

impl MemorySyncStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all sessions
    pub async fn len(&self) -> usize {
        self.inner
            .read()
            .await
            .values()
            .map(|session| session.records.len())
            .sum()
    }

    /// Check if the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Forget everything
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl SyncStore for MemorySyncStore {
    async fn list_records(&self, session_id: SessionId) -> Result<Vec<SyncRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(&session_id)
            .map(|session| session.records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_record(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> Result<Option<SyncRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(&session_id)
            .and_then(|session| session.records.get(path).cloned()))
    }

    async fn upsert_record(&self, record: &SyncRecord) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard
            .entry(record.session_id)
            .or_default()
            .records
            .insert(record.path.clone(), record.clone());
        Ok(())
    }

    async fn get_last_synced(&self, session_id: SessionId) -> Result<Option<DateTime<Utc>>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(&session_id).and_then(|session| session.last_synced))
    }

    async fn set_last_synced(
        &self,
        session_id: SessionId,
        instant: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.entry(session_id).or_default().last_synced = Some(instant);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Factory for the `memory` store type
pub struct MemoryStoreFactory;

#[async_trait]
impl SyncStoreFactory for MemoryStoreFactory {
    async fn create(&self, _config: &StoreConfig) -> Result<Arc<dyn SyncStore>, Error> {
        Ok(Arc::new(MemorySyncStore::new()))
    }
}
