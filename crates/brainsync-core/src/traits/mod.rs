//! Collaborator interfaces consumed by the sync engine
//!
//! - [`SyncProvider`]: List folders, resolve ids and fetch bytes from a remote provider
//! - [`Ingestor`]: Hand downloaded content to a brain
//! - [`Notifier`]: Record the outcome of processing a file version
//! - [`SyncStore`]: Persist sync records and the session high-water mark

pub mod collaborators;
pub mod provider;
pub mod sync_store;

pub use collaborators::{Ingestor, NotificationOutcome, Notifier};
pub use provider::{FolderPage, SyncProvider, SyncProviderFactory};
pub use sync_store::{SyncStore, SyncStoreFactory};
