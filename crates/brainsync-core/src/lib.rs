// # brainsync-core
//
// Decision engine for incremental file synchronization into knowledge stores.
//
// ## Architecture Overview
//
// Given a remote storage provider, the previously recorded sync state of a
// session, and a fresh listing of remote files, the engine decides which files
// must be (re)downloaded and ingested into a brain:
// - **SyncProvider**: Trait for listing and fetching remote files
// - **Ingestor** / **Notifier**: Traits for the knowledge store and notification sink
// - **SyncStore**: Trait for persisted sync records and the session high-water mark
// - **SyncEngine**: Orchestrates discovery → filtering → download → ingestion
// - **ProviderRegistry**: Plugin-based registry for providers and stores
//
// ## Design Principles
//
// 1. **Pure decisions**: filtering and staleness checks are side-effect free
// 2. **Provider quirks in tables**: per-provider timestamp formats and exclusions
//    live in configuration, not in inline conditionals
// 3. **Library-first**: the engine is embedded by an outer scheduler
// 4. **Idempotency**: repeated passes never duplicate work for unchanged files

pub mod config;
pub mod discovery;
pub mod download;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod policy;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, PolicyConfig, ProviderConfig, StoreConfig, SyncConfig};
pub use discovery::{DiscoveredFiles, FileDiscovery};
pub use download::DownloadCoordinator;
pub use engine::{FileFailure, FileOutcome, PassReport, SyncEngine, SyncEvent};
pub use error::{DownloadFailure, Error, Result};
pub use index::{ExistingFileIndex, filter_on_supported_files};
pub use model::{
    Credentials, DownloadedArtifact, FileData, RemoteFile, SessionId, SyncRecord, SyncSession,
    SyncSettings, UserSync,
};
pub use policy::{ProviderPolicy, SupportPolicy, TimestampFormat, should_download_file};
pub use registry::ProviderRegistry;
pub use state::{FileSyncStore, MemorySyncStore};
pub use traits::{Ingestor, Notifier, SyncProvider, SyncStore};
