//! Error types for the sync engine
//!
//! Per-file failures (`Discovery`, `UnsupportedFormat`, `Download`,
//! `Ingestion`) are reported to the pass runner, which decides whether they
//! are skippable. None of them aborts a whole session pass.

use thiserror::Error;
use uuid::Uuid;

use crate::model::SessionId;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why fetching a file's bytes failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFailure {
    /// Provider returned zero bytes
    EmptyContent,
    /// The remote file no longer exists
    NotFound,
    /// Credentials no longer grant access to the file
    PermissionDenied,
    /// Network or provider-side failure that may succeed later
    Transport(String),
}

impl DownloadFailure {
    /// Permanent failures are recorded and skipped; transient ones are retried on a later pass
    pub fn is_permanent(&self) -> bool {
        !matches!(self, DownloadFailure::Transport(_))
    }
}

impl std::fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadFailure::EmptyContent => write!(f, "provider returned no content"),
            DownloadFailure::NotFound => write!(f, "file not found"),
            DownloadFailure::PermissionDenied => write!(f, "permission denied"),
            DownloadFailure::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// Core error type for the sync engine
#[derive(Error, Debug)]
pub enum Error {
    /// A requested file or folder id could not be resolved by the provider
    #[error("Discovery failed for {id}: {message}")]
    Discovery {
        /// Remote file or folder id
        id: String,
        /// Provider message
        message: String,
        /// Whether the underlying provider failure may clear up
        retryable: bool,
    },

    /// File type is not ingestible
    #[error("Invalid value: unsupported file format '{extension}' for {file_name}")]
    UnsupportedFormat {
        /// Remote file name
        file_name: String,
        /// Resolved extension (empty when none could be derived)
        extension: String,
    },

    /// Fetching bytes for a file failed
    #[error("Download of {file_name} failed: {failure}")]
    Download {
        /// Remote file name
        file_name: String,
        /// Failure classification
        failure: DownloadFailure,
    },

    /// The knowledge store rejected the content
    #[error("Ingestion into brain {brain_id} failed: {message}")]
    Ingestion {
        /// Target brain
        brain_id: Uuid,
        /// Collaborator message
        message: String,
    },

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Remote resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Access to a remote resource was refused
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Sync store errors
    #[error("Sync store error: {0}")]
    Store(String),

    /// Notification sink errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Another pass already holds the session
    #[error("Sync pass already running for session {0}")]
    SessionBusy(SessionId),

    /// A file task was aborted before it finished
    #[error("File task cancelled")]
    Cancelled,

    /// A file task panicked
    #[error("File task failed: {0}")]
    Task(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a discovery error for `id` caused by a provider failure
    pub fn discovery(id: impl Into<String>, cause: &Error) -> Self {
        Self::Discovery {
            id: id.into(),
            message: cause.to_string(),
            retryable: cause.is_retryable(),
        }
    }

    /// Create an unsupported format error
    pub fn unsupported_format(file_name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            file_name: file_name.into(),
            extension: extension.into(),
        }
    }

    /// Create a download error
    pub fn download(file_name: impl Into<String>, failure: DownloadFailure) -> Self {
        Self::Download {
            file_name: file_name.into(),
            failure,
        }
    }

    /// Create an ingestion error
    pub fn ingestion(brain_id: Uuid, message: impl Into<String>) -> Self {
        Self::Ingestion {
            brain_id,
            message: message.into(),
        }
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a permission error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a sync store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True for failures that should be retried on the next pass.
    ///
    /// Retryable failures keep the session's high-water mark from advancing.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Discovery { retryable, .. } => *retryable,
            Error::Download { failure, .. } => !failure.is_permanent(),
            Error::Ingestion { .. }
            | Error::Store(_)
            | Error::Notification(_)
            | Error::RateLimited(_)
            | Error::Provider { .. }
            | Error::Io(_)
            | Error::Cancelled
            | Error::Task(_) => true,
            _ => false,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
