//! Previously synced files, keyed by remote path
//!
//! The index is a snapshot taken once per pass and never mutated while the
//! pass runs, which keeps [`filter_on_supported_files`] a pure function.

use std::collections::HashMap;

use tracing::debug;

use crate::model::{RemoteFile, SyncRecord};

/// Immutable path → record snapshot for one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingFileIndex {
    records: HashMap<String, SyncRecord>,
}

impl ExistingFileIndex {
    /// Empty index (first sync)
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for a path, if one exists
    pub fn get(&self, path: &str) -> Option<&SyncRecord> {
        self.records.get(path)
    }

    /// Number of tracked paths
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been tracked yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<HashMap<String, SyncRecord>> for ExistingFileIndex {
    fn from(records: HashMap<String, SyncRecord>) -> Self {
        Self { records }
    }
}

impl FromIterator<SyncRecord> for ExistingFileIndex {
    fn from_iter<I: IntoIterator<Item = SyncRecord>>(iter: I) -> Self {
        Self {
            records: iter
                .into_iter()
                .map(|record| (record.path.clone(), record))
                .collect(),
        }
    }
}

/// Pair each remote file with its existing record, dropping rejected files
///
/// - No record: the file passes through with `None`; support is checked later.
/// - Record with `supported == true`: passes through with the record.
/// - Record with `supported == false`: dropped, unless the mime type stored
///   with the record differs from the current one, in which case the file is
///   evaluated again as new (paired with `None`).
///
/// Input order is preserved.
pub fn filter_on_supported_files(
    files: &[RemoteFile],
    existing: &ExistingFileIndex,
) -> Vec<(RemoteFile, Option<SyncRecord>)> {
    files
        .iter()
        .filter_map(|file| match existing.get(&file.name) {
            None => Some((file.clone(), None)),
            Some(record) if record.supported => Some((file.clone(), Some(record.clone()))),
            Some(record) if mime_changed(record, file) => {
                debug!(
                    "{} changed type since it was rejected, evaluating again",
                    file.name
                );
                Some((file.clone(), None))
            }
            Some(_) => {
                debug!("{} was rejected by a previous pass, skipping", file.name);
                None
            }
        })
        .collect()
}

fn mime_changed(record: &SyncRecord, file: &RemoteFile) -> bool {
    record
        .mime_type
        .as_deref()
        .is_some_and(|previous| previous != file.mime_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_index_from_records_keys_by_path() {
        let record = SyncRecord {
            id: Uuid::new_v4(),
            path: "a/b.txt".to_string(),
            session_id: 1,
            last_modified: "2024-01-01T00:00:00Z".to_string(),
            brain_id: Uuid::new_v4(),
            supported: true,
            mime_type: None,
        };
        let index: ExistingFileIndex = vec![record.clone()].into_iter().collect();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a/b.txt"), Some(&record));
        assert!(index.get("b.txt").is_none());
    }
}
