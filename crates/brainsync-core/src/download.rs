//! Fetching a single remote file into a [`DownloadedArtifact`]
//!
//! The coordinator makes exactly one provider call per file. Retrying
//! transient failures is the provider's job; deciding whether a failure is
//! fatal is the engine's.

use std::sync::Arc;

use tracing::debug;

use crate::error::{DownloadFailure, Error, Result};
use crate::model::{Credentials, DownloadedArtifact, FileData, RemoteFile};
use crate::policy::SupportPolicy;
use crate::traits::SyncProvider;

/// Downloads file content through the provider
#[derive(Clone)]
pub struct DownloadCoordinator {
    provider: Arc<dyn SyncProvider>,
}

impl DownloadCoordinator {
    /// Create a coordinator over `provider`
    pub fn new(provider: Arc<dyn SyncProvider>) -> Self {
        Self { provider }
    }

    /// Fetch `file` and package it for ingestion
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for folders
    /// - `Download` when the provider returns no bytes, refuses access,
    ///   no longer has the file, or fails in transport
    pub async fn download_file(
        &self,
        file: &RemoteFile,
        credentials: &Credentials,
    ) -> Result<DownloadedArtifact> {
        if file.is_folder {
            return Err(Error::invalid_input(format!(
                "{} is a folder and has no content",
                file.name
            )));
        }

        let bytes = self
            .provider
            .fetch_bytes(&file.id, credentials)
            .await
            .map_err(|e| Error::download(&file.name, classify(e)))?;

        if bytes.is_empty() {
            return Err(Error::download(&file.name, DownloadFailure::EmptyContent));
        }

        debug!("Downloaded {} ({} bytes)", file.name, bytes.len());

        Ok(DownloadedArtifact {
            file_name: file.name.clone(),
            extension: SupportPolicy::resolve_extension(file).unwrap_or_default(),
            file_data: FileData::new(bytes),
        })
    }
}

fn classify(err: Error) -> DownloadFailure {
    match err {
        Error::NotFound(_) => DownloadFailure::NotFound,
        Error::PermissionDenied(_) => DownloadFailure::PermissionDenied,
        Error::Download { failure, .. } => failure,
        other => DownloadFailure::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_provider_errors() {
        assert_eq!(classify(Error::not_found("x")), DownloadFailure::NotFound);
        assert_eq!(
            classify(Error::permission_denied("x")),
            DownloadFailure::PermissionDenied
        );
        assert!(matches!(
            classify(Error::provider("google", "502 bad gateway")),
            DownloadFailure::Transport(msg) if msg.contains("502")
        ));
    }
}
