//! Provider-specific exclusion rules
//!
//! Some providers list objects that carry no ingestible content, such as
//! Notion databases. Rules are keyed by provider name and matched on mime
//! type; adding a provider means adding a profile, not a conditional.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::config::{ProviderProfile, builtin_provider_profiles};

static BUILTIN: LazyLock<ExclusionTable> =
    LazyLock::new(|| ExclusionTable::from_profiles(&builtin_provider_profiles()));

/// Excluded mime types per provider (names and types compared case-insensitively)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionTable {
    rules: HashMap<String, HashSet<String>>,
}

impl ExclusionTable {
    /// Build the table from provider profiles
    pub fn from_profiles(profiles: &HashMap<String, ProviderProfile>) -> Self {
        let rules = profiles
            .iter()
            .filter(|(_, profile)| !profile.excluded_mime_types.is_empty())
            .map(|(name, profile)| {
                let mime_types = profile
                    .excluded_mime_types
                    .iter()
                    .map(|m| m.to_ascii_lowercase())
                    .collect();
                (name.to_ascii_lowercase(), mime_types)
            })
            .collect();

        Self { rules }
    }

    /// Table built from the shipped provider profiles
    pub fn builtin() -> &'static ExclusionTable {
        &BUILTIN
    }

    /// Mime types excluded for `provider_name`
    pub fn excluded_for(&self, provider_name: &str) -> HashSet<String> {
        self.rules
            .get(&provider_name.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// True when `mime_type` is excluded for `provider_name`
    pub fn excludes(&self, provider_name: &str, mime_type: &str) -> bool {
        self.rules
            .get(&provider_name.to_ascii_lowercase())
            .is_some_and(|types| types.contains(&mime_type.to_ascii_lowercase()))
    }
}
