// # File Sync Store
//
// File-based implementation of SyncStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Automatic backup: the previous file is kept as `.backup`
// - Recovery: a file that fails to parse is replaced by its backup
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "sessions": {
//     "42": {
//       "last_synced": "2025-01-09T12:00:00Z",
//       "records": {
//         "notes/plan.md": {
//           "id": "4b0c...",
//           "path": "notes/plan.md",
//           "session_id": 42,
//           "last_modified": "2025-01-09T11:58:02Z",
//           "brain_id": "9f2e...",
//           "supported": true,
//           "mime_type": "text/markdown"
//         }
//       }
//     }
//   }
// }
// ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use super::SessionState;
use crate::Error;
use crate::config::StoreConfig;
use crate::model::{SessionId, SyncRecord};
use crate::traits::{SyncStore, SyncStoreFactory};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

/// File-based sync store with crash recovery
///
/// Every mutation is written through to disk before it returns.
///
/// # Example
///
/// ```rust,no_run
/// use brainsync_core::state::FileSyncStore;
/// use brainsync_core::traits::SyncStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileSyncStore::new("/var/lib/brainsync/state.json").await?;
///     store.set_last_synced(42, chrono::Utc::now()).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileSyncStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,

    /// Serializes writers of the temp file
    write_lock: Mutex<()>,
}

#[derive(Debug)]
struct FileState {
    sessions: HashMap<SessionId, SessionState>,
    dirty: bool,
}

/// Serializable state file format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateFileFormat {
    version: String,
    #[serde(default)]
    sessions: HashMap<SessionId, SessionState>,
}

impl FileSyncStore {
    /// Create or load a file sync store
    ///
    /// 1. Load the state file if it exists
    /// 2. If it is corrupted, load the backup and restore it
    /// 3. If both fail, start empty
    ///
    /// Parent directories are created as needed.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let sessions = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                sessions,
                dirty: false,
            })),
            write_lock: Mutex::new(()),
        })
    }

    async fn load_state_with_recovery(
        path: &Path,
    ) -> Result<HashMap<SessionId, SessionState>, Error> {
        match Self::load_state(path).await {
            Ok(sessions) => {
                tracing::debug!("Loaded sync state: {} session(s)", sessions.len());
                Ok(sessions)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "State file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty state.");
                    return Ok(HashMap::new());
                }

                match Self::load_state(&backup_path).await {
                    Ok(sessions) => {
                        tracing::info!("Recovered state from backup: {} session(s)", sessions.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore state file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(sessions)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting with empty state.",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load_state(path: &Path) -> Result<HashMap<SessionId, SessionState>, Error> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            ))
        })?;

        let state_file: StateFileFormat = serde_json::from_str(&content)?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        Ok(state_file.sessions)
    }

    /// Write state to file atomically
    async fn write_state(&self) -> Result<(), Error> {
        let _writer = self.write_lock.lock().await;

        let json = {
            let state_guard = self.state.read().await;
            let state_file = StateFileFormat {
                version: STATE_FILE_VERSION.to_string(),
                sessions: state_guard.sessions.clone(),
            };
            serde_json::to_string_pretty(&state_file)?
        };

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        self.state.write().await.dirty = false;

        tracing::trace!("Sync state written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    async fn mutate(&self, apply: impl FnOnce(&mut HashMap<SessionId, SessionState>)) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            apply(&mut state_guard.sessions);
            state_guard.dirty = true;
        }
        self.write_state().await
    }
}

#[async_trait]
impl SyncStore for FileSyncStore {
    async fn list_records(&self, session_id: SessionId) -> Result<Vec<SyncRecord>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .sessions
            .get(&session_id)
            .map(|session| session.records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_record(
        &self,
        session_id: SessionId,
        path: &str,
    ) -> Result<Option<SyncRecord>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .sessions
            .get(&session_id)
            .and_then(|session| session.records.get(path).cloned()))
    }

    async fn upsert_record(&self, record: &SyncRecord) -> Result<(), Error> {
        let record = record.clone();
        self.mutate(move |sessions| {
            sessions
                .entry(record.session_id)
                .or_default()
                .records
                .insert(record.path.clone(), record);
        })
        .await
    }

    async fn get_last_synced(&self, session_id: SessionId) -> Result<Option<DateTime<Utc>>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .sessions
            .get(&session_id)
            .and_then(|session| session.last_synced))
    }

    async fn set_last_synced(
        &self,
        session_id: SessionId,
        instant: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.mutate(move |sessions| {
            sessions.entry(session_id).or_default().last_synced = Some(instant);
        })
        .await
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write_state().await } else { Ok(()) }
    }
}

/// Factory for the `file` store type
pub struct FileStoreFactory;

#[async_trait]
impl SyncStoreFactory for FileStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn SyncStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Arc::new(FileSyncStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
