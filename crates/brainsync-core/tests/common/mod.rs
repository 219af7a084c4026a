//! Test doubles and common utilities for contract tests
//!
//! The doubles record every call so tests can assert on side effects
//! (downloads, ingestions, notifications) rather than only on return values.

#![allow(dead_code)]

use brainsync_core::config::{ProviderConfig, SyncConfig};
use brainsync_core::error::{Error, Result};
use brainsync_core::model::{
    Credentials, DownloadedArtifact, RemoteFile, SessionId, SyncRecord, SyncSession, SyncSettings,
    UserSync,
};
use brainsync_core::state::MemorySyncStore;
use brainsync_core::traits::{
    FolderPage, Ingestor, NotificationOutcome, Notifier, SyncProvider, SyncStore,
};
use brainsync_core::{SyncEngine, SyncEvent};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Timestamp comfortably before any pass start
pub const OLD: &str = "2024-01-01T00:00:00Z";

/// How a fetch should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    NotFound,
    Transient,
    RateLimited,
    Empty,
}

/// An in-memory provider with folders, pagination and fault injection
pub struct MockProvider {
    name: &'static str,
    entries: Mutex<HashMap<String, RemoteFile>>,
    children: HashMap<String, Vec<String>>,
    contents: HashMap<String, Bytes>,
    faults: HashMap<String, Fault>,
    flaky_folders: Mutex<HashSet<String>>,
    page_size: usize,
    fetch_delay: Option<Duration>,
    fetch_count: AtomicUsize,
    list_count: AtomicUsize,
    fetched: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
            children: HashMap::new(),
            contents: HashMap::new(),
            faults: HashMap::new(),
            flaky_folders: Mutex::new(HashSet::new()),
            page_size: 100,
            fetch_delay: None,
            fetch_count: AtomicUsize::new(0),
            list_count: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Add a file with some content
    pub fn with_file(mut self, file: RemoteFile) -> Self {
        self.contents
            .insert(file.id.clone(), Bytes::from(format!("content of {}", file.name)));
        self.entries
            .get_mut()
            .unwrap()
            .insert(file.id.clone(), file);
        self
    }

    /// Add a folder holding `children` (ids of entries added separately)
    pub fn with_folder(mut self, folder: RemoteFile, children: &[&str]) -> Self {
        self.children.insert(
            folder.id.clone(),
            children.iter().map(|id| id.to_string()).collect(),
        );
        self.entries
            .get_mut()
            .unwrap()
            .insert(folder.id.clone(), folder);
        self
    }

    pub fn with_fault(mut self, id: &str, fault: Fault) -> Self {
        self.faults.insert(id.to_string(), fault);
        self
    }

    /// Fail the next listing of `folder_id` with a provider outage
    pub fn fail_listing_once(&self, folder_id: &str) {
        self.flaky_folders
            .lock()
            .unwrap()
            .insert(folder_id.to_string());
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Change a file's modification time
    pub fn touch(&self, id: &str, last_modified: &str) {
        if let Some(file) = self.entries.lock().unwrap().get_mut(id) {
            file.last_modified = last_modified.to_string();
        }
    }

    /// Change a file's mime type
    pub fn retype(&self, id: &str, mime_type: &str) {
        if let Some(file) = self.entries.lock().unwrap().get_mut(id) {
            file.mime_type = mime_type.to_string();
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SyncProvider for MockProvider {
    async fn list_folder(
        &self,
        folder_id: &str,
        _credentials: &Credentials,
        continuation: Option<&str>,
    ) -> Result<FolderPage> {
        self.list_count.fetch_add(1, Ordering::SeqCst);

        if self.flaky_folders.lock().unwrap().remove(folder_id) {
            return Err(Error::provider(self.name, "503 service unavailable"));
        }

        let children = self
            .children
            .get(folder_id)
            .ok_or_else(|| Error::not_found(format!("folder {}", folder_id)))?;
        let offset: usize = continuation.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (offset + self.page_size).min(children.len());

        let entries = self.entries.lock().unwrap();
        let files = children[offset..end]
            .iter()
            .filter_map(|id| entries.get(id).cloned())
            .collect();

        Ok(FolderPage {
            files,
            next_continuation: (end < children.len()).then(|| end.to_string()),
        })
    }

    async fn get_file(&self, file_id: &str, _credentials: &Credentials) -> Result<RemoteFile> {
        self.entries
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("file {}", file_id)))
    }

    async fn fetch_bytes(&self, file_id: &str, _credentials: &Credentials) -> Result<Bytes> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(file_id.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.faults.get(file_id) {
            Some(Fault::NotFound) => Err(Error::not_found(format!("file {}", file_id))),
            Some(Fault::Transient) => Err(Error::provider(self.name, "503 service unavailable")),
            Some(Fault::RateLimited) => Err(Error::rate_limited("429 too many requests")),
            Some(Fault::Empty) => Ok(Bytes::new()),
            None => self
                .contents
                .get(file_id)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("file {}", file_id))),
        }
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// What an ingestor received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    pub brain_id: Uuid,
    pub file_name: String,
    pub extension: String,
    pub content: Bytes,
}

/// Records ingested artifacts; can be told to fail
#[derive(Default)]
pub struct MockIngestor {
    received: Mutex<Vec<Ingested>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
}

impl MockIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail ingestion of `file_name` until [`MockIngestor::recover`]
    pub fn fail_on(&self, file_name: &str) {
        self.failing.lock().unwrap().insert(file_name.to_string());
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Panic while ingesting `file_name`
    pub fn panic_on(&self, file_name: &str) {
        self.panicking.lock().unwrap().insert(file_name.to_string());
    }

    pub fn received(&self) -> Vec<Ingested> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Ingestor for MockIngestor {
    async fn ingest(&self, brain_id: Uuid, artifact: DownloadedArtifact) -> Result<()> {
        let panics = self.panicking.lock().unwrap().contains(&artifact.file_name);
        if panics {
            panic!("ingestor crashed on {}", artifact.file_name);
        }

        if self.failing.lock().unwrap().contains(&artifact.file_name) {
            return Err(Error::Other("vector store unavailable".to_string()));
        }

        self.received.lock().unwrap().push(Ingested {
            brain_id,
            file_name: artifact.file_name,
            extension: artifact.extension,
            content: artifact.file_data.into_bytes(),
        });
        Ok(())
    }
}

/// Records every notification outcome; can be told to fail
#[derive(Default)]
pub struct MockNotifier {
    outcomes: Mutex<Vec<(Uuid, NotificationOutcome)>>,
    failing: AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every outcome until [`MockNotifier::recover`]
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    pub fn outcomes(&self) -> Vec<(Uuid, NotificationOutcome)> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn successes(&self) -> usize {
        self.outcomes()
            .iter()
            .filter(|(_, outcome)| matches!(outcome, NotificationOutcome::Success { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes()
            .iter()
            .filter(|(_, outcome)| matches!(outcome, NotificationOutcome::Failed { .. }))
            .count()
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn record(&self, notification_id: Uuid, outcome: NotificationOutcome) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::notification("notification sink down"));
        }
        self.outcomes.lock().unwrap().push((notification_id, outcome));
        Ok(())
    }
}

/// Memory store whose record writes can be told to fail
#[derive(Default)]
pub struct MockStore {
    inner: MemorySyncStore,
    failing_upserts: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject record upserts until [`MockStore::recover`]
    pub fn fail_upserts(&self) {
        self.failing_upserts.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.failing_upserts.store(false, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SyncStore for MockStore {
    async fn list_records(&self, session_id: SessionId) -> Result<Vec<SyncRecord>> {
        self.inner.list_records(session_id).await
    }

    async fn get_record(&self, session_id: SessionId, path: &str) -> Result<Option<SyncRecord>> {
        self.inner.get_record(session_id, path).await
    }

    async fn upsert_record(&self, record: &SyncRecord) -> Result<()> {
        if self.failing_upserts.load(Ordering::SeqCst) {
            return Err(Error::store("database unavailable"));
        }
        self.inner.upsert_record(record).await
    }

    async fn get_last_synced(&self, session_id: SessionId) -> Result<Option<DateTime<Utc>>> {
        self.inner.get_last_synced(session_id).await
    }

    async fn set_last_synced(&self, session_id: SessionId, instant: DateTime<Utc>) -> Result<()> {
        self.inner.set_last_synced(session_id, instant).await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}

/// A user account on `provider`
pub fn user(provider: &str) -> UserSync {
    UserSync {
        id: 10,
        user_id: Uuid::nil(),
        name: "test account".to_string(),
        provider: provider.to_string(),
        credentials: Credentials::new(serde_json::json!({ "token": "secret" })),
        state: serde_json::Value::Null,
        additional_data: serde_json::Value::Null,
    }
}

/// A never-synced session selecting `files` and `folders`
pub fn session(files: &[&str], folders: &[&str]) -> SyncSession {
    SyncSession {
        id: 1,
        name: "test session".to_string(),
        user_sync_id: 10,
        user_id: Uuid::nil(),
        settings: SyncSettings {
            files: files.iter().map(|id| id.to_string()).collect(),
            folders: folders.iter().map(|id| id.to_string()).collect(),
        },
        last_synced: None,
        sync_interval_minutes: 60,
        brain_id: Uuid::from_u128(0xb2a1),
    }
}

/// Config for an engine driven by a [`MockProvider`]
pub fn minimal_config() -> SyncConfig {
    SyncConfig::new(ProviderConfig::Custom {
        factory: "mock".to_string(),
        config: serde_json::json!({}),
    })
}

/// Engine wired to fresh doubles
pub struct Harness {
    pub engine: SyncEngine,
    pub events: mpsc::Receiver<SyncEvent>,
    pub provider: Arc<MockProvider>,
    pub store: Arc<MockStore>,
    pub ingestor: Arc<MockIngestor>,
    pub notifier: Arc<MockNotifier>,
}

impl Harness {
    pub fn new(provider: MockProvider) -> Self {
        Self::with_config(provider, minimal_config())
    }

    pub fn with_config(provider: MockProvider, config: SyncConfig) -> Self {
        let provider = Arc::new(provider);
        let store = Arc::new(MockStore::new());
        let ingestor = Arc::new(MockIngestor::new());
        let notifier = Arc::new(MockNotifier::new());

        let (engine, events) = SyncEngine::new(
            provider.clone(),
            store.clone(),
            ingestor.clone(),
            notifier.clone(),
            config,
        )
        .expect("engine construction succeeds");

        Self {
            engine,
            events,
            provider,
            store,
            ingestor,
            notifier,
        }
    }

    /// Drain every event emitted so far
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
