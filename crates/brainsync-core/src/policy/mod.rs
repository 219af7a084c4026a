//! Download and format policies
//!
//! - [`timestamp`]: provider timestamp parsing and the staleness rule
//! - [`exclusion`]: provider-specific mime type exclusions
//! - [`support`]: which file types are ingestible
//!
//! [`ProviderPolicy`] holds the configured provider profiles. It is resolved
//! once per session into a [`SessionPolicy`], which makes the per-file
//! download decision.

pub mod exclusion;
pub mod support;
pub mod timestamp;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{PolicyConfig, ProviderProfile};
use crate::model::RemoteFile;

pub use exclusion::ExclusionTable;
pub use support::SupportPolicy;
pub use timestamp::{NaiveZone, TimestampFormat, should_download_file};

/// Configured provider profiles
#[derive(Debug, Clone)]
pub struct ProviderPolicy {
    profiles: HashMap<String, ProviderProfile>,
    exclusions: ExclusionTable,
}

impl ProviderPolicy {
    /// Build from the policy configuration
    pub fn from_config(config: &PolicyConfig) -> Self {
        let profiles = config
            .providers
            .iter()
            .map(|(name, profile)| (name.to_ascii_lowercase(), profile.clone()))
            .collect();

        Self {
            profiles,
            exclusions: ExclusionTable::from_profiles(&config.providers),
        }
    }

    /// Timestamp format for `provider_name`, RFC 3339 when the provider is unknown
    pub fn timestamp_format(&self, provider_name: &str) -> TimestampFormat {
        self.profiles
            .get(&provider_name.to_ascii_lowercase())
            .map(|profile| profile.timestamp_format.clone())
            .unwrap_or_else(TimestampFormat::rfc3339)
    }

    /// Resolve the rules for one session's provider
    pub fn resolve(&self, provider_name: &str) -> SessionPolicy {
        SessionPolicy::new(
            provider_name,
            self.timestamp_format(provider_name),
            self.exclusions.excluded_for(provider_name),
        )
    }
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

/// Download rules for a single provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    provider_name: String,
    timestamp_format: TimestampFormat,
    excluded_mime_types: HashSet<String>,
}

impl SessionPolicy {
    /// Create rules for `provider_name`
    pub fn new(
        provider_name: impl Into<String>,
        timestamp_format: TimestampFormat,
        excluded_mime_types: HashSet<String>,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            timestamp_format,
            excluded_mime_types,
        }
    }

    /// Provider these rules apply to
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Provider timestamp format
    pub fn timestamp_format(&self) -> &TimestampFormat {
        &self.timestamp_format
    }

    /// Decide whether `file` must be downloaded
    ///
    /// See [`should_download_file`] for the rules.
    pub fn should_download(&self, file: &RemoteFile, last_synced: Option<DateTime<Utc>>) -> bool {
        if file.is_folder {
            return false;
        }

        if self
            .excluded_mime_types
            .contains(&file.mime_type.to_ascii_lowercase())
        {
            debug!(
                "Skipping {}: mime type '{}' is excluded for provider {}",
                file.name, file.mime_type, self.provider_name
            );
            return false;
        }

        match last_synced {
            None => true,
            Some(last_synced) => self
                .timestamp_format
                .is_modified_since(&file.last_modified, last_synced),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_falls_back_to_rfc3339() {
        let policy = ProviderPolicy::default();
        assert_eq!(policy.timestamp_format("box"), TimestampFormat::rfc3339());
        assert_eq!(
            policy.timestamp_format("Google").pattern,
            "%Y-%m-%dT%H:%M:%S%.fZ"
        );
    }

    #[test]
    fn test_configured_exclusion_applies() {
        let mut config = PolicyConfig::default();
        config.providers.insert(
            "confluence".to_string(),
            ProviderProfile::new(TimestampFormat::rfc3339()).excluding("whiteboard"),
        );
        let session = ProviderPolicy::from_config(&config).resolve("confluence");

        let board = RemoteFile::new("1", "plan", "2024-01-01T00:00:00Z", "whiteboard");
        let page = RemoteFile::new("2", "plan.html", "2024-01-01T00:00:00Z", "page");
        assert!(!session.should_download(&board, None));
        assert!(session.should_download(&page, None));
    }
}
