//! Expansion of requested file and folder ids into a flat file list
//!
//! Folders are walked breadth-first to any depth, following the provider's
//! pagination. Ids that cannot be resolved are skipped with a warning so a
//! single deleted or revoked item never fails a whole pass.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Error;
use crate::model::{Credentials, RemoteFile};
use crate::traits::SyncProvider;

/// Result of a discovery run
#[derive(Debug, Default)]
pub struct DiscoveredFiles {
    /// Non-folder files, each id at most once, explicit files first
    pub files: Vec<RemoteFile>,
    /// Ids the provider could not resolve or list
    pub warnings: Vec<Error>,
}

impl DiscoveredFiles {
    /// Number of files found
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when nothing was found
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Walks provider folders on behalf of the engine
#[derive(Clone)]
pub struct FileDiscovery {
    provider: Arc<dyn SyncProvider>,
}

impl FileDiscovery {
    /// Create a discovery helper over `provider`
    pub fn new(provider: Arc<dyn SyncProvider>) -> Self {
        Self { provider }
    }

    /// Resolve `file_ids` and recursively expand `folder_ids`
    ///
    /// An explicit file id that turns out to be a folder is expanded too.
    /// Never fails: unresolvable ids end up in [`DiscoveredFiles::warnings`].
    pub async fn get_syncfiles_from_ids(
        &self,
        credentials: &Credentials,
        file_ids: &[String],
        folder_ids: &[String],
    ) -> DiscoveredFiles {
        let mut discovered = DiscoveredFiles::default();
        let mut seen_files: HashSet<String> = HashSet::new();
        let mut visited_folders: HashSet<String> = HashSet::new();
        let mut folders: VecDeque<String> = folder_ids.iter().cloned().collect();

        for file_id in file_ids {
            if seen_files.contains(file_id) {
                continue;
            }
            match self.provider.get_file(file_id, credentials).await {
                Ok(file) if file.is_folder => folders.push_back(file.id),
                Ok(file) => {
                    seen_files.insert(file.id.clone());
                    discovered.files.push(file);
                }
                Err(e) => {
                    warn!("Skipping file {}: {}", file_id, e);
                    discovered.warnings.push(Error::discovery(file_id, &e));
                }
            }
        }

        while let Some(folder_id) = folders.pop_front() {
            if !visited_folders.insert(folder_id.clone()) {
                continue;
            }
            self.expand_folder(
                &folder_id,
                credentials,
                &mut folders,
                &mut seen_files,
                &mut discovered,
            )
            .await;
        }

        debug!(
            "Discovered {} file(s) from {} file id(s) and {} folder id(s) via {}",
            discovered.files.len(),
            file_ids.len(),
            folder_ids.len(),
            self.provider.provider_name()
        );

        discovered
    }

    /// List every page of one folder, queueing sub-folders
    async fn expand_folder(
        &self,
        folder_id: &str,
        credentials: &Credentials,
        folders: &mut VecDeque<String>,
        seen_files: &mut HashSet<String>,
        discovered: &mut DiscoveredFiles,
    ) {
        let mut continuation: Option<String> = None;

        loop {
            let page = match self
                .provider
                .list_folder(folder_id, credentials, continuation.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    // Keep whatever earlier pages produced
                    warn!("Skipping rest of folder {}: {}", folder_id, e);
                    discovered
                        .warnings
                        .push(Error::discovery(folder_id, &e));
                    return;
                }
            };

            for file in page.files {
                if file.is_folder {
                    folders.push_back(file.id);
                } else if seen_files.insert(file.id.clone()) {
                    discovered.files.push(file);
                }
            }

            match page.next_continuation {
                Some(next) if continuation.as_deref() == Some(next.as_str()) => {
                    warn!(
                        "Provider repeated continuation token for folder {}, stopping",
                        folder_id
                    );
                    return;
                }
                Some(next) => continuation = Some(next),
                None => return,
            }
        }
    }
}
