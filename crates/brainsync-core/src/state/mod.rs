// # Sync Store Implementations
//
// This module provides implementations of the SyncStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileStoreFactory, FileSyncStore};
pub use memory::{MemoryStoreFactory, MemorySyncStore};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::SyncRecord;

/// Everything stored for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SessionState {
    /// Records keyed by remote path
    #[serde(default)]
    pub records: HashMap<String, SyncRecord>,

    /// High-water mark
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
}
