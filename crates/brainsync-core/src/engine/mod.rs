//! Core sync engine
//!
//! The SyncEngine is responsible for:
//! - Expanding a session's selection into remote files
//! - Deciding which files changed since the last pass
//! - Rejecting unsupported formats before anything is downloaded
//! - Downloading, ingesting, and recording each changed file
//! - Advancing the session's high-water mark once the pass is complete
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   RemoteFile    ┌──────────────┐
//! │ SyncProvider │───────────────▶│  SyncEngine  │
//! └──────────────┘                 └──────────────┘
//!                                         │
//!         ┌───────────────┬───────────────┼───────────────┐
//!         ▼               ▼               ▼               ▼
//! ┌─────────────┐ ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//! │  SyncStore  │ │  Ingestor   │ │  Notifier   │ │   Events    │
//! │ (records)   │ │ (content)   │ │ (outcome)   │ │ (monitor)   │
//! └─────────────┘ └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Claim the session (one pass per session at a time)
//! 2. Discover files and load the existing record index
//! 3. Drop files whose format an earlier pass rejected
//! 4. Process the rest concurrently, bounded by `max_concurrent_downloads`
//! 5. Record newly rejected formats
//! 6. Advance `last_synced` to the pass start, unless the pass was cut short
//!    or a retryable failure happened

mod report;

pub use report::{FileFailure, FileOutcome, PassReport};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::discovery::{DiscoveredFiles, FileDiscovery};
use crate::download::DownloadCoordinator;
use crate::error::{Error, Result};
use crate::index::{ExistingFileIndex, filter_on_supported_files};
use crate::model::{
    Credentials, DownloadedArtifact, RemoteFile, SessionId, SyncRecord, SyncSession, UserSync,
};
use crate::policy::{ProviderPolicy, SessionPolicy, SupportPolicy};
use crate::traits::{Ingestor, NotificationOutcome, Notifier, SyncProvider, SyncStore};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Pass started
    PassStarted {
        session_id: SessionId,
        provider: String,
    },

    /// Discovery finished
    FilesDiscovered {
        session_id: SessionId,
        count: usize,
        warnings: usize,
    },

    /// File downloaded, ingested and recorded
    FileIngested {
        session_id: SessionId,
        file_name: String,
        notification_id: Uuid,
    },

    /// File unchanged since the last pass
    FileSkipped {
        session_id: SessionId,
        file_name: String,
    },

    /// File format cannot be ingested
    FileUnsupported {
        session_id: SessionId,
        file_name: String,
        extension: String,
    },

    /// File failed
    FileFailed {
        session_id: SessionId,
        file_name: String,
        error: String,
        retryable: bool,
    },

    /// Pass stopped dispatching before all files were started
    PassCancelled {
        session_id: SessionId,
        remaining: usize,
    },

    /// Pass finished
    PassCompleted { report: PassReport },
}

/// Core sync engine
///
/// Cloning is cheap; clones share collaborators, session claims and the
/// event channel.
///
/// ## Concurrency
///
/// Files within a pass are processed on separate tasks, at most
/// `max_concurrent_downloads` at a time. Passes for different sessions may
/// run concurrently. A second pass for a session that is already running
/// fails with [`Error::SessionBusy`].
///
/// ## Cancellation
///
/// Cancelling the token given to [`SyncEngine::run_pass_with_cancel`], or
/// reaching `pass_timeout_secs`, stops new files from starting. Files already
/// in flight finish. The high-water mark is left untouched so the next pass
/// picks up the remainder.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: Arc<dyn SyncStore>,
    ingestor: Arc<dyn Ingestor>,
    notifier: Arc<dyn Notifier>,
    discovery: FileDiscovery,
    downloads: DownloadCoordinator,
    providers: ProviderPolicy,
    support: SupportPolicy,
    max_concurrent_downloads: usize,
    pass_timeout: Option<Duration>,

    /// Sessions with a pass in progress
    claims: Mutex<HashSet<SessionId>>,

    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Parameters
    ///
    /// - `provider`: Provider the session's files live in
    /// - `store`: Record and high-water mark persistence
    /// - `ingestor`: Receives downloaded content
    /// - `notifier`: Receives per-file outcomes
    /// - `config`: Sync configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        provider: Arc<dyn SyncProvider>,
        store: Arc<dyn SyncStore>,
        ingestor: Arc<dyn Ingestor>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let inner = EngineInner {
            store,
            ingestor,
            notifier,
            discovery: FileDiscovery::new(provider.clone()),
            downloads: DownloadCoordinator::new(provider),
            providers: ProviderPolicy::from_config(&config.policy),
            support: SupportPolicy::from_config(&config.policy),
            max_concurrent_downloads: config.engine.max_concurrent_downloads,
            pass_timeout: config.engine.pass_timeout(),
            claims: Mutex::new(HashSet::new()),
            event_tx: tx,
        };

        Ok((
            Self {
                inner: Arc::new(inner),
            },
            rx,
        ))
    }

    /// Expand file and folder ids into the files they contain
    pub async fn get_syncfiles_from_ids(
        &self,
        credentials: &Credentials,
        file_ids: &[String],
        folder_ids: &[String],
    ) -> DiscoveredFiles {
        self.inner
            .discovery
            .get_syncfiles_from_ids(credentials, file_ids, folder_ids)
            .await
    }

    /// Download a single file
    pub async fn download_file(
        &self,
        file: &RemoteFile,
        credentials: &Credentials,
    ) -> Result<DownloadedArtifact> {
        self.inner.downloads.download_file(file, credentials).await
    }

    /// Decide whether `file` must be downloaded for a `provider_name` session
    pub fn should_download(
        &self,
        file: &RemoteFile,
        last_synced: Option<DateTime<Utc>>,
        provider_name: &str,
    ) -> bool {
        self.inner
            .providers
            .resolve(provider_name)
            .should_download(file, last_synced)
    }

    /// Process one file of a session
    ///
    /// Returns `UpToDate` without touching the provider when the file has not
    /// changed. Otherwise checks the format, downloads, ingests, records the
    /// file, and reports success under the file's notification id. On a
    /// download or ingestion failure a failed outcome is reported and no
    /// record is written.
    ///
    /// # Errors
    ///
    /// - `UnsupportedFormat` before any download when the format is rejected;
    ///   recording the rejection is left to the caller
    /// - `Download`, `Ingestion`, `Store`, `Notification` from the
    ///   corresponding step
    pub async fn process_sync_file(
        &self,
        file: &RemoteFile,
        previous_file: Option<&SyncRecord>,
        current_user: &UserSync,
        sync_active: &SyncSession,
    ) -> Result<FileOutcome> {
        let policy = self.inner.providers.resolve(&current_user.provider);
        self.process_with_policy(&policy, file, previous_file, current_user, sync_active)
            .await
    }

    /// Run one pass over a session
    ///
    /// On success `sync_active.last_synced` reflects the stored mark.
    pub async fn run_pass(
        &self,
        current_user: &UserSync,
        sync_active: &mut SyncSession,
    ) -> Result<PassReport> {
        self.run_pass_with_cancel(current_user, sync_active, &CancellationToken::new())
            .await
    }

    /// Run one pass over a session, stopping early when `cancel` fires
    pub async fn run_pass_with_cancel(
        &self,
        current_user: &UserSync,
        sync_active: &mut SyncSession,
        cancel: &CancellationToken,
    ) -> Result<PassReport> {
        let _claim = SessionClaim::acquire(&self.inner.claims, sync_active.id)?;
        let started_at = Utc::now();
        let session_id = sync_active.id;

        info!(
            "Starting pass for session {} ({}) via {}",
            session_id, sync_active.name, current_user.provider
        );
        self.emit_event(SyncEvent::PassStarted {
            session_id,
            provider: current_user.provider.clone(),
        });

        let discovered = self
            .get_syncfiles_from_ids(
                &current_user.credentials,
                &sync_active.settings.files,
                &sync_active.settings.folders,
            )
            .await;
        self.emit_event(SyncEvent::FilesDiscovered {
            session_id,
            count: discovered.len(),
            warnings: discovered.warnings.len(),
        });

        let existing: ExistingFileIndex = self
            .inner
            .store
            .list_records(session_id)
            .await?
            .into_iter()
            .collect();
        let candidates = filter_on_supported_files(&discovered.files, &existing);

        let mut report = PassReport::new(session_id);
        report.discovered = discovered.len();
        report.previously_rejected = discovered.len() - candidates.len();
        report.discovery_warnings = discovered.warnings.iter().map(|e| e.to_string()).collect();
        report.discovery_incomplete = discovered.warnings.iter().any(Error::is_retryable);

        let pass_token = cancel.child_token();
        let watchdog = self.inner.pass_timeout.map(|timeout| {
            let token = pass_token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        warn!("Pass for session {} exceeded {:?}, cancelling", session_id, timeout);
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        });

        let policy = Arc::new(self.inner.providers.resolve(&current_user.provider));
        let user = Arc::new(current_user.clone());
        let session = Arc::new(sync_active.clone());
        let semaphore = Arc::new(Semaphore::new(self.inner.max_concurrent_downloads));
        let mut tasks = JoinSet::new();
        let mut running: HashMap<tokio::task::Id, RemoteFile> = HashMap::new();
        let mut pending = candidates.into_iter();

        while let Some((file, previous)) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = pass_token.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                report.cancelled = 1 + pending.len();
                warn!(
                    "Pass for session {} cancelled with {} file(s) not started",
                    session_id, report.cancelled
                );
                self.emit_event(SyncEvent::PassCancelled {
                    session_id,
                    remaining: report.cancelled,
                });
                break;
            };

            let engine = self.clone();
            let policy = policy.clone();
            let user = user.clone();
            let session = session.clone();
            let task_file = file.clone();
            let handle = tasks.spawn(async move {
                let _permit = permit;
                let result = engine
                    .process_with_policy(&policy, &file, previous.as_ref(), &user, &session)
                    .await;
                (file, previous, result)
            });
            running.insert(handle.id(), task_file);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, (file, previous, result))) => {
                    running.remove(&id);
                    self.settle(&mut report, &session, &file, previous.as_ref(), result)
                        .await;
                }
                Err(e) => {
                    let file_name = running
                        .remove(&e.id())
                        .map(|file| file.name)
                        .unwrap_or_default();
                    let err = if e.is_cancelled() {
                        Error::Cancelled
                    } else {
                        Error::Task(e.to_string())
                    };
                    self.record_failure(&mut report, session_id, &file_name, err);
                }
            }
        }

        if let Some(handle) = watchdog {
            handle.abort();
        }

        if report.discovery_incomplete {
            warn!(
                "Discovery for session {} was incomplete, files may be retried next pass",
                session_id
            );
        }

        if report.cancelled == 0 && !report.has_retryable_failures() {
            self.inner
                .store
                .set_last_synced(session_id, started_at)
                .await?;
            sync_active.last_synced = Some(started_at);
            report.mark_advanced = true;
        } else {
            warn!(
                "Keeping high-water mark for session {} at {:?}",
                session_id, sync_active.last_synced
            );
        }
        self.inner.store.flush().await?;
        report.last_synced = sync_active.last_synced;

        info!(
            "Pass for session {} done: {} ingested, {} up to date, {} unsupported, {} failed, {} cancelled",
            session_id,
            report.ingested,
            report.skipped,
            report.unsupported,
            report.failed,
            report.cancelled
        );
        self.emit_event(SyncEvent::PassCompleted {
            report: report.clone(),
        });

        Ok(report)
    }

    async fn process_with_policy(
        &self,
        policy: &SessionPolicy,
        file: &RemoteFile,
        previous_file: Option<&SyncRecord>,
        current_user: &UserSync,
        sync_active: &SyncSession,
    ) -> Result<FileOutcome> {
        if !policy.should_download(file, sync_active.last_synced) {
            debug!("{} is up to date", file.name);
            self.emit_event(SyncEvent::FileSkipped {
                session_id: sync_active.id,
                file_name: file.name.clone(),
            });
            return Ok(FileOutcome::UpToDate);
        }

        let extension = self.inner.support.check(file)?;
        debug!("{} accepted as {}", file.name, extension);

        let notification_id = file.notification_id.unwrap_or_else(Uuid::new_v4);

        let artifact = match self
            .download_file(file, &current_user.credentials)
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => {
                self.notify_failure(notification_id, file, &e).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .inner
            .ingestor
            .ingest(sync_active.brain_id, artifact)
            .await
        {
            let e = match e {
                Error::Ingestion { .. } => e,
                other => Error::ingestion(sync_active.brain_id, other.to_string()),
            };
            self.notify_failure(notification_id, file, &e).await;
            return Err(e);
        }

        let record = SyncRecord::for_file(file, sync_active, true).replacing(previous_file);
        self.inner.store.upsert_record(&record).await?;

        self.inner
            .notifier
            .record(
                notification_id,
                NotificationOutcome::Success {
                    file_name: file.name.clone(),
                },
            )
            .await?;

        info!("Ingested {} into brain {}", file.name, sync_active.brain_id);
        self.emit_event(SyncEvent::FileIngested {
            session_id: sync_active.id,
            file_name: file.name.clone(),
            notification_id,
        });

        Ok(FileOutcome::Ingested { notification_id })
    }

    /// Fold one file's result into the report
    async fn settle(
        &self,
        report: &mut PassReport,
        session: &SyncSession,
        file: &RemoteFile,
        previous: Option<&SyncRecord>,
        result: Result<FileOutcome>,
    ) {
        match result {
            Ok(FileOutcome::Ingested { .. }) => report.ingested += 1,
            Ok(FileOutcome::UpToDate) => report.skipped += 1,
            Err(Error::UnsupportedFormat { extension, .. }) => {
                let record = SyncRecord::for_file(file, session, false).replacing(previous);
                match self.inner.store.upsert_record(&record).await {
                    Ok(()) => {
                        debug!("Recorded {} as unsupported ({})", file.name, extension);
                        report.unsupported += 1;
                        self.emit_event(SyncEvent::FileUnsupported {
                            session_id: session.id,
                            file_name: file.name.clone(),
                            extension,
                        });
                    }
                    Err(e) => self.record_failure(report, session.id, &file.name, e),
                }
            }
            Err(e) => self.record_failure(report, session.id, &file.name, e),
        }
    }

    fn record_failure(
        &self,
        report: &mut PassReport,
        session_id: SessionId,
        file_name: &str,
        err: Error,
    ) {
        let retryable = err.is_retryable();
        error!("Failed to sync {}: {}", file_name, err);

        report.failed += 1;
        report.failures.push(FileFailure {
            file_name: file_name.to_string(),
            error: err.to_string(),
            retryable,
        });
        self.emit_event(SyncEvent::FileFailed {
            session_id,
            file_name: file_name.to_string(),
            error: err.to_string(),
            retryable,
        });
    }

    async fn notify_failure(&self, notification_id: Uuid, file: &RemoteFile, err: &Error) {
        let outcome = NotificationOutcome::Failed {
            file_name: file.name.clone(),
            reason: err.to_string(),
        };
        if let Err(e) = self.inner.notifier.record(notification_id, outcome).await {
            warn!("Could not report failure of {}: {}", file.name, e);
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: SyncEvent) {
        if self.inner.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Exclusive claim on a session, released on drop
struct SessionClaim<'a> {
    claims: &'a Mutex<HashSet<SessionId>>,
    session_id: SessionId,
}

impl<'a> SessionClaim<'a> {
    fn acquire(claims: &'a Mutex<HashSet<SessionId>>, session_id: SessionId) -> Result<Self> {
        let mut held = claims.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !held.insert(session_id) {
            return Err(Error::SessionBusy(session_id));
        }
        Ok(Self { claims, session_id })
    }
}

impl Drop for SessionClaim<'_> {
    fn drop(&mut self) {
        let mut held = self
            .claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        held.remove(&self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_claim_is_exclusive_until_dropped() {
        let claims = Mutex::new(HashSet::new());

        let first = SessionClaim::acquire(&claims, 3).unwrap();
        assert!(matches!(
            SessionClaim::acquire(&claims, 3),
            Err(Error::SessionBusy(3))
        ));
        assert!(SessionClaim::acquire(&claims, 4).is_ok());

        drop(first);
        assert!(SessionClaim::acquire(&claims, 3).is_ok());
    }

    #[test]
    fn test_sync_event_clone() {
        let event = SyncEvent::FileSkipped {
            session_id: 1,
            file_name: "notes.md".to_string(),
        };
        assert_eq!(event.clone(), event);
    }
}
