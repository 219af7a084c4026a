// # brainsyncd - Brainsync Daemon
//
// Thin integration layer around brainsync-core. All sync decisions live in
// the core crate; this binary only wires collaborators together.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers and building the store
// 4. Running one sync pass and exiting
//
// When to run is left to an external timer (a systemd timer or cron).
//
// Ingested content is written below `BRAINSYNC_BRAIN_DIR/<brain id>/`, and
// notification outcomes are logged.
//
// ## Configuration
//
// ### Source
// - `BRAINSYNC_SOURCE_ROOT`: Directory to sync from (required)
// - `BRAINSYNC_FOLDERS`: Comma-separated folder ids relative to the root (default: the root)
// - `BRAINSYNC_FILES`: Comma-separated file ids relative to the root
//
// ### Target
// - `BRAINSYNC_BRAIN_DIR`: Directory receiving ingested content (required)
// - `BRAINSYNC_BRAIN_ID`: Brain UUID (default: nil UUID)
// - `BRAINSYNC_SESSION_ID`: Session id (default: 1)
//
// ### Store
// - `BRAINSYNC_STORE_TYPE`: file or memory (default: file)
// - `BRAINSYNC_STORE_PATH`: State file (required for file store)
//
// ### Engine
// - `BRAINSYNC_MAX_CONCURRENT_DOWNLOADS`: Parallel downloads per pass (default: 4)
// - `BRAINSYNC_PASS_TIMEOUT_SECS`: Stop starting new files after this long; 0 disables (default: 0)
// - `BRAINSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export BRAINSYNC_SOURCE_ROOT=/srv/shared/notes
// export BRAINSYNC_BRAIN_DIR=/var/lib/brainsync/brains
// export BRAINSYNC_STORE_PATH=/var/lib/brainsync/state.json
//
// brainsyncd
// ```

use std::env;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use brainsync_core::config::{EngineConfig, ProviderConfig, StoreConfig, SyncConfig};
use brainsync_core::model::{Credentials, DownloadedArtifact, SyncSession, SyncSettings, UserSync};
use brainsync_core::traits::{Ingestor, NotificationOutcome, Notifier};
use brainsync_core::{ProviderRegistry, SyncEngine, SyncEvent};
use tokio::io::AsyncWriteExt;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy)]
enum BrainsyncExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<BrainsyncExitCode> for ExitCode {
    fn from(code: BrainsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    source_root: String,
    folders: Vec<String>,
    files: Vec<String>,
    brain_dir: String,
    brain_id: Uuid,
    session_id: i64,
    store_type: String,
    store_path: Option<String>,
    max_concurrent_downloads: usize,
    pass_timeout_secs: u64,
    log_level: String,
}

fn list_var(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid ('{}'): {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mut folders = list_var("BRAINSYNC_FOLDERS");
        let files = list_var("BRAINSYNC_FILES");
        if folders.is_empty() && files.is_empty() {
            folders.push(String::new());
        }

        Ok(Self {
            source_root: env::var("BRAINSYNC_SOURCE_ROOT")
                .context("BRAINSYNC_SOURCE_ROOT is required")?,
            folders,
            files,
            brain_dir: env::var("BRAINSYNC_BRAIN_DIR")
                .context("BRAINSYNC_BRAIN_DIR is required")?,
            brain_id: parsed_var("BRAINSYNC_BRAIN_ID", Uuid::nil())?,
            session_id: parsed_var("BRAINSYNC_SESSION_ID", 1)?,
            store_type: env::var("BRAINSYNC_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("BRAINSYNC_STORE_PATH").ok(),
            max_concurrent_downloads: parsed_var("BRAINSYNC_MAX_CONCURRENT_DOWNLOADS", 4)?,
            pass_timeout_secs: parsed_var("BRAINSYNC_PASS_TIMEOUT_SECS", 0)?,
            log_level: env::var("BRAINSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if !Path::new(&self.source_root).is_dir() {
            anyhow::bail!(
                "BRAINSYNC_SOURCE_ROOT must be an existing directory. Got: {}",
                self.source_root
            );
        }

        if self.brain_dir.is_empty() {
            anyhow::bail!("BRAINSYNC_BRAIN_DIR cannot be empty");
        }

        match self.store_type.as_str() {
            "file" => match self.store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "BRAINSYNC_STORE_PATH is required when BRAINSYNC_STORE_TYPE=file. \
                    Set it via: export BRAINSYNC_STORE_PATH=/var/lib/brainsync/state.json"
                ),
                Some(_) => {}
            },
            "memory" => eprintln!(
                "WARNING: memory store keeps no history, every pass re-ingests all files"
            ),
            other => anyhow::bail!(
                "BRAINSYNC_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        }

        if self.max_concurrent_downloads == 0 || self.max_concurrent_downloads > 64 {
            anyhow::bail!(
                "BRAINSYNC_MAX_CONCURRENT_DOWNLOADS must be between 1 and 64. Got: {}",
                self.max_concurrent_downloads
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "BRAINSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn sync_config(&self) -> SyncConfig {
        let store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            _ => StoreConfig::File {
                path: self.store_path.clone().unwrap_or_default(),
            },
        };

        SyncConfig {
            provider: ProviderConfig::Local {
                root: self.source_root.clone(),
                page_size: 100,
            },
            store,
            engine: EngineConfig {
                max_concurrent_downloads: self.max_concurrent_downloads,
                pass_timeout_secs: self.pass_timeout_secs,
                ..EngineConfig::default()
            },
            policy: Default::default(),
        }
    }
}

/// Writes ingested content below `<root>/<brain id>/`
struct DirectoryIngestor {
    root: PathBuf,
}

#[async_trait]
impl Ingestor for DirectoryIngestor {
    async fn ingest(&self, brain_id: Uuid, artifact: DownloadedArtifact) -> brainsync_core::Result<()> {
        let mut target = self.root.join(brain_id.to_string());
        for component in Path::new(&artifact.file_name).components() {
            match component {
                Component::Normal(part) => target.push(part),
                _ => {
                    return Err(brainsync_core::Error::ingestion(
                        brain_id,
                        format!("refusing to write '{}'", artifact.file_name),
                    ));
                }
            }
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = artifact.file_data.into_reader();
        let mut file = tokio::fs::File::create(&target).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        debug!("Wrote {} bytes to {}", written, target.display());
        Ok(())
    }
}

/// Logs notification outcomes
struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn record(
        &self,
        notification_id: Uuid,
        outcome: NotificationOutcome,
    ) -> brainsync_core::Result<()> {
        match outcome {
            NotificationOutcome::Success { file_name } => {
                info!("[{}] {} synced", notification_id, file_name)
            }
            NotificationOutcome::Failed { file_name, reason } => {
                warn!("[{}] {} failed: {}", notification_id, file_name, reason)
            }
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return BrainsyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return BrainsyncExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return BrainsyncExitCode::ConfigError.into();
    }

    info!("Starting brainsyncd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return BrainsyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            BrainsyncExitCode::RuntimeError
        } else {
            BrainsyncExitCode::CleanShutdown
        }
    })
    .into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let sync_config = config.sync_config();

    let registry = ProviderRegistry::with_builtin_stores();
    brainsync_provider_local::register(&registry);

    let provider = registry.create_provider(&sync_config.provider)?;
    let store = registry.create_store(&sync_config.store).await?;
    let ingestor = Arc::new(DirectoryIngestor {
        root: PathBuf::from(&config.brain_dir),
    });

    let (engine, events) = SyncEngine::new(
        provider,
        store.clone(),
        ingestor,
        Arc::new(LogNotifier),
        sync_config,
    )?;

    let event_logger = tokio::spawn(log_events(events));

    let current_user = UserSync {
        id: config.session_id,
        user_id: Uuid::nil(),
        name: "local".to_string(),
        provider: "local".to_string(),
        credentials: Credentials::empty(),
        state: Default::default(),
        additional_data: Default::default(),
    };
    let mut sync_active = SyncSession {
        id: config.session_id,
        name: config.source_root.clone(),
        user_sync_id: config.session_id,
        user_id: Uuid::nil(),
        settings: SyncSettings {
            files: config.files.clone(),
            folders: config.folders.clone(),
        },
        last_synced: store.get_last_synced(config.session_id).await?,
        sync_interval_minutes: 0,
        brain_id: config.brain_id,
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_for_shutdown(shutdown.clone()));

    let report = engine
        .run_pass_with_cancel(&current_user, &mut sync_active, &shutdown)
        .await?;

    if !report.failures.is_empty() {
        warn!("{} file(s) failed this pass", report.failures.len());
    }
    if !report.mark_advanced {
        info!("High-water mark unchanged; skipped work is retried next run");
    }

    drop(engine);
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    info!("Shutting down brainsyncd");
    Ok(())
}

async fn log_events(events: tokio::sync::mpsc::Receiver<SyncEvent>) {
    let mut stream = ReceiverStream::new(events);
    while let Some(event) = stream.next().await {
        match event {
            SyncEvent::PassCompleted { report } => info!(
                "Session {}: {} ingested, {} up to date, {} unsupported, {} failed",
                report.session_id, report.ingested, report.skipped, report.unsupported, report.failed
            ),
            other => debug!("{:?}", other),
        }
    }
}

/// Cancel `token` on SIGTERM or SIGINT
#[cfg(unix)]
async fn watch_for_shutdown(token: CancellationToken) {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to set up signal handlers: {}", e);
            return;
        }
    };

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    info!("Received {}, finishing in-flight files", name);
    token.cancel();
}

/// Cancel `token` on CTRL-C
#[cfg(not(unix))]
async fn watch_for_shutdown(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received CTRL-C, finishing in-flight files");
            token.cancel();
        }
        Err(e) => error!("Failed to wait for CTRL-C: {}", e),
    }
}
