// # Sync Provider Trait
//
// Defines the interface for reading files from a remote storage provider.
//
// ## Implementations
//
// - Local directory tree: `brainsync-provider-local` crate
// - Future: Google Drive, SharePoint, Dropbox, Notion, etc.
//
// ## Usage
//
// ```rust,ignore
// use brainsync_core::SyncProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* SyncProvider implementation */;
//     let credentials = brainsync_core::Credentials::empty();
//
//     let page = provider.list_folder("root", &credentials, None).await?;
//     for file in page.files {
//         println!("{} ({})", file.name, file.mime_type);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use bytes::Bytes;

use crate::model::{Credentials, RemoteFile};

/// One page of a folder listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderPage {
    /// Direct children of the folder (files and sub-folders)
    pub files: Vec<RemoteFile>,
    /// Token for the next page, `None` on the last page
    pub next_continuation: Option<String>,
}

/// Trait for remote provider implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// Providers are the sole point of contact with the remote API. They own
/// request throttling and retry of transient failures; the engine never
/// retries a provider call itself.
///
/// ## Allowed Capabilities
/// - ✅ Perform API calls to their endpoints
/// - ✅ Parse provider-specific responses into [`RemoteFile`]
/// - ✅ Retry transient failures and honour rate limits before surfacing an error
///
/// ## Forbidden Capabilities
/// - ❌ Decide whether a file needs downloading (owned by the engine's policies)
/// - ❌ Access the sync store or the knowledge store
/// - ❌ Ingest content or record notifications
///
/// # Errors
///
/// Missing resources should surface as [`crate::Error::NotFound`] and refused
/// access as [`crate::Error::PermissionDenied`] so the engine can classify
/// download failures as permanent.
#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// List one page of a folder's direct children
    ///
    /// # Parameters
    ///
    /// - `folder_id`: Provider id of the folder
    /// - `credentials`: Account credentials
    /// - `continuation`: Token returned by the previous page, `None` for the first page
    async fn list_folder(
        &self,
        folder_id: &str,
        credentials: &Credentials,
        continuation: Option<&str>,
    ) -> Result<FolderPage, crate::Error>;

    /// Resolve a single file or folder by id
    async fn get_file(
        &self,
        file_id: &str,
        credentials: &Credentials,
    ) -> Result<RemoteFile, crate::Error>;

    /// Fetch the full content of a file
    async fn fetch_bytes(
        &self,
        file_id: &str,
        credentials: &Credentials,
    ) -> Result<Bytes, crate::Error>;

    /// Get the provider name (for policy lookup and logging)
    ///
    /// # Returns
    ///
    /// A static string identifying the provider (e.g., "google", "notion")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing providers from configuration
pub trait SyncProviderFactory: Send + Sync {
    /// Create a SyncProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<std::sync::Arc<dyn SyncProvider>, crate::Error>;
}
