//! Data model shared by the engine and its collaborators

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a sync session (one user account bound to one brain)
pub type SessionId = i64;

/// A file or folder as listed by a remote provider
///
/// Identity for matching against previously synced files is `name`, not
/// `id`: providers may reassign ids across listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-assigned id
    pub id: String,
    /// Path-like name, used as the sync identity
    pub name: String,
    /// Folders are structural and never downloaded
    pub is_folder: bool,
    /// Modification time in the provider's native format
    pub last_modified: String,
    /// Provider mime type (or provider-specific type tag)
    pub mime_type: String,
    /// Link to the file in the provider UI
    #[serde(default)]
    pub web_view_link: String,
    /// Notification to record once this file version is ingested
    #[serde(default)]
    pub notification_id: Option<Uuid>,
}

impl RemoteFile {
    /// Create a non-folder file entry
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        last_modified: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_folder: false,
            last_modified: last_modified.into(),
            mime_type: mime_type.into(),
            web_view_link: String::new(),
            notification_id: None,
        }
    }

    /// Create a folder entry
    pub fn folder(id: impl Into<String>, name: impl Into<String>, last_modified: impl Into<String>) -> Self {
        Self {
            is_folder: true,
            ..Self::new(id, name, last_modified, "folder")
        }
    }

    /// Attach a notification id
    pub fn with_notification_id(mut self, notification_id: Uuid) -> Self {
        self.notification_id = Some(notification_id);
        self
    }

    /// Set the provider web link
    pub fn with_web_view_link(mut self, link: impl Into<String>) -> Self {
        self.web_view_link = link.into();
        self
    }
}

/// A previously considered remote file, keyed by `(session_id, path)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Record id
    pub id: Uuid,
    /// Remote path (the file's `name` when it was recorded)
    pub path: String,
    /// Owning sync session
    pub session_id: SessionId,
    /// Remote modification time when the record was written
    pub last_modified: String,
    /// Brain the content was ingested into
    pub brain_id: Uuid,
    /// `false` marks a file permanently excluded by the support policy
    pub supported: bool,
    /// Mime type seen when the record was written
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl SyncRecord {
    /// Create a record for `file` in `session`
    pub fn for_file(file: &RemoteFile, session: &SyncSession, supported: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: file.name.clone(),
            session_id: session.id,
            last_modified: file.last_modified.clone(),
            brain_id: session.brain_id,
            supported,
            mime_type: Some(file.mime_type.clone()),
        }
    }

    /// Keep the identity of an existing record for the same path
    pub fn replacing(mut self, previous: Option<&SyncRecord>) -> Self {
        if let Some(previous) = previous {
            self.id = previous.id;
        }
        self
    }
}

/// Which remote ids a session synchronizes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Explicit file ids
    #[serde(default)]
    pub files: Vec<String>,
    /// Folder ids, expanded recursively
    #[serde(default)]
    pub folders: Vec<String>,
}

/// One configured binding between a user's external account and a brain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSession {
    /// Session id
    pub id: SessionId,
    /// Display name
    pub name: String,
    /// Owning user account binding
    pub user_sync_id: i64,
    /// Owning user
    pub user_id: Uuid,
    /// Selected files and folders
    #[serde(default)]
    pub settings: SyncSettings,
    /// High-water mark of the last completed pass (`None` before the first sync)
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
    /// Cadence hint for the external scheduler
    pub sync_interval_minutes: u32,
    /// Target brain
    pub brain_id: Uuid,
}

/// A user's connected provider account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSync {
    /// Account binding id
    pub id: i64,
    /// Owning user
    pub user_id: Uuid,
    /// Display name
    pub name: String,
    /// Provider identifier (e.g. "google", "notion")
    pub provider: String,
    /// Opaque provider credentials
    pub credentials: Credentials,
    /// Provider-managed state (continuation tokens and the like)
    #[serde(default)]
    pub state: serde_json::Value,
    /// Free-form provider data
    #[serde(default)]
    pub additional_data: serde_json::Value,
}

/// Opaque provider credentials
///
/// The Debug implementation never exposes the contents.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(serde_json::Value);

impl Credentials {
    /// Wrap a credential document
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Empty credentials (public or local providers)
    pub fn empty() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }

    /// Look up a string field, e.g. an access token
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Borrow the raw document
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(<REDACTED>)")
    }
}

/// File content that can be consumed exactly once
#[derive(Debug)]
pub struct FileData {
    bytes: Bytes,
}

impl FileData {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }

    /// Number of bytes available
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when no content is available
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the content as a single buffer
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Consume the content as an async reader
    pub fn into_reader(self) -> impl tokio::io::AsyncRead + Send + Unpin {
        std::io::Cursor::new(self.bytes)
    }
}

/// A fetched remote file, ready for ingestion
#[derive(Debug)]
pub struct DownloadedArtifact {
    /// Remote file name
    pub file_name: String,
    /// Lower-cased, dot-prefixed extension (e.g. ".pdf")
    pub extension: String,
    /// File content
    pub file_data: FileData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new(serde_json::json!({ "access_token": "secret-token" }));
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("secret-token"));
        assert_eq!(creds.get_str("access_token"), Some("secret-token"));
    }

    #[test]
    fn settings_default_when_missing() {
        let session: SyncSession = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "docs",
            "user_sync_id": 1,
            "user_id": Uuid::nil(),
            "sync_interval_minutes": 60,
            "brain_id": Uuid::nil(),
        }))
        .unwrap();
        assert!(session.settings.files.is_empty());
        assert!(session.last_synced.is_none());
    }

    #[tokio::test]
    async fn file_data_reads_through_reader() {
        use tokio::io::AsyncReadExt;

        let data = FileData::new(Bytes::from_static(b"hello"));
        let mut reader = data.into_reader();
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "hello");
    }
}
