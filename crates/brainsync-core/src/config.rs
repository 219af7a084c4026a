//! Configuration types for the sync engine
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::policy::timestamp::{NaiveZone, TimestampFormat};

/// Main sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Provider configuration
    pub provider: ProviderConfig,

    /// Sync store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Format support and provider quirks
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl SyncConfig {
    /// Create a configuration with defaults for the given provider
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            store: StoreConfig::default(),
            engine: EngineConfig::default(),
            policy: PolicyConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.store.validate()?;
        self.engine.validate()?;
        self.policy.validate()?;
        Ok(())
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Local directory tree
    Local {
        /// Root directory; ids are paths relative to it
        root: String,
        /// Entries per folder page
        #[serde(default = "default_page_size")]
        page_size: usize,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Local { root, page_size } => {
                if root.is_empty() {
                    return Err(crate::Error::config("Local provider root cannot be empty"));
                }
                if *page_size == 0 {
                    return Err(crate::Error::config("Local provider page size must be > 0"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Local { .. } => "local",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Sync store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            StoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of files downloaded and ingested at the same time
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Pass-level timeout (in seconds)
    ///
    /// When it elapses no new downloads are started; in-flight ones finish.
    /// Set to 0 to disable.
    #[serde(default)]
    pub pass_timeout_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_concurrent_downloads == 0 {
            return Err(crate::Error::config("max_concurrent_downloads must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }

    /// Pass timeout, if enabled
    pub fn pass_timeout(&self) -> Option<Duration> {
        (self.pass_timeout_secs > 0).then(|| Duration::from_secs(self.pass_timeout_secs))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent_downloads(),
            pass_timeout_secs: 0,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Per-provider quirks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// How the provider writes modification times
    pub timestamp_format: TimestampFormat,

    /// Mime types the provider lists but which carry no ingestible content
    #[serde(default)]
    pub excluded_mime_types: Vec<String>,
}

impl ProviderProfile {
    /// Profile with no exclusions
    pub fn new(timestamp_format: TimestampFormat) -> Self {
        Self {
            timestamp_format,
            excluded_mime_types: Vec::new(),
        }
    }

    /// Add an excluded mime type
    pub fn excluding(mut self, mime_type: impl Into<String>) -> Self {
        self.excluded_mime_types.push(mime_type.into());
        self
    }
}

/// Format support and provider quirk configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Ingestible extensions, dot-prefixed (e.g. ".pdf")
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,

    /// Provider profiles keyed by provider name
    #[serde(default = "builtin_provider_profiles")]
    pub providers: HashMap<String, ProviderProfile>,
}

impl PolicyConfig {
    /// Validate the policy configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.supported_extensions.is_empty() {
            return Err(crate::Error::config("No supported extensions configured"));
        }
        for ext in &self.supported_extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(crate::Error::config(format!(
                    "Supported extension '{}' must be dot-prefixed, e.g. '.pdf'",
                    ext
                )));
            }
        }
        for (name, profile) in &self.providers {
            if profile.timestamp_format.pattern.is_empty() {
                return Err(crate::Error::config(format!(
                    "Timestamp format for provider '{}' cannot be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            supported_extensions: default_supported_extensions(),
            providers: builtin_provider_profiles(),
        }
    }
}

/// Extensions the knowledge store can ingest
pub fn default_supported_extensions() -> Vec<String> {
    [
        ".txt", ".csv", ".md", ".markdown", ".pdf", ".html", ".docx", ".pptx", ".xlsx", ".xls",
        ".odt", ".epub", ".ipynb", ".py", ".bib", ".mp3", ".mp4", ".mpeg", ".mpga", ".m4a",
        ".wav", ".webm",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Profiles for the providers the service ships with
pub fn builtin_provider_profiles() -> HashMap<String, ProviderProfile> {
    let fractional = TimestampFormat::new("%Y-%m-%dT%H:%M:%S%.fZ", NaiveZone::Utc);
    let whole_seconds = TimestampFormat::new("%Y-%m-%dT%H:%M:%SZ", NaiveZone::Utc);

    HashMap::from([
        ("google".to_string(), ProviderProfile::new(fractional.clone())),
        ("azure".to_string(), ProviderProfile::new(whole_seconds.clone())),
        ("sharepoint".to_string(), ProviderProfile::new(whole_seconds.clone())),
        ("dropbox".to_string(), ProviderProfile::new(whole_seconds.clone())),
        ("github".to_string(), ProviderProfile::new(whole_seconds)),
        (
            "notion".to_string(),
            ProviderProfile::new(fractional).excluding("db"),
        ),
        ("local".to_string(), ProviderProfile::new(TimestampFormat::rfc3339())),
    ])
}

fn default_page_size() -> usize {
    100
}

fn default_max_concurrent_downloads() -> usize {
    4
}

fn default_event_channel_capacity() -> usize {
    1000
}
