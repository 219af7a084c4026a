//! Provider timestamp parsing and staleness decisions
//!
//! Providers write modification times in their own formats. Each provider
//! profile carries a [`TimestampFormat`]; values are normalised to UTC
//! instants before any comparison.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::RemoteFile;
use crate::policy::SessionPolicy;
use crate::policy::exclusion::ExclusionTable;

/// Pattern value selecting RFC 3339 parsing instead of a strftime pattern
const RFC3339: &str = "rfc3339";

/// Zone used for timestamps that carry no offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NaiveZone {
    /// Treat naive values as UTC
    #[default]
    Utc,
    /// Treat naive values as the host's local time
    Local,
}

impl NaiveZone {
    fn resolve(self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            NaiveZone::Utc => Some(naive.and_utc()),
            // Ambiguous wall-clock times (DST fold) take the earlier instant;
            // non-existent ones (DST gap) do not resolve.
            NaiveZone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// How a provider formats modification times
///
/// `pattern` uses chrono strftime syntax (e.g. `%Y-%m-%dT%H:%M:%S%.fZ`), or
/// the literal `rfc3339`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampFormat {
    /// strftime pattern or `rfc3339`
    pub pattern: String,
    /// Zone applied when the pattern carries no offset
    #[serde(default)]
    pub naive_zone: NaiveZone,
}

impl TimestampFormat {
    /// Create a format from a strftime pattern
    pub fn new(pattern: impl Into<String>, naive_zone: NaiveZone) -> Self {
        Self {
            pattern: pattern.into(),
            naive_zone,
        }
    }

    /// RFC 3339 timestamps with explicit offsets
    pub fn rfc3339() -> Self {
        Self::new(RFC3339, NaiveZone::Utc)
    }

    /// Parse a provider timestamp into a UTC instant
    pub fn parse(&self, raw: &str) -> Result<DateTime<Utc>> {
        let raw = raw.trim();

        if self.pattern.eq_ignore_ascii_case(RFC3339) {
            return DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::invalid_input(format!("'{}' is not RFC 3339: {}", raw, e)));
        }

        // Patterns with an offset directive produce zoned values directly
        if let Ok(dt) = DateTime::parse_from_str(raw, &self.pattern) {
            return Ok(dt.with_timezone(&Utc));
        }

        let naive = match NaiveDateTime::parse_from_str(raw, &self.pattern) {
            Ok(naive) => naive,
            Err(e) => NaiveDate::parse_from_str(raw, &self.pattern)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .ok_or_else(|| {
                    Error::invalid_input(format!(
                        "'{}' does not match '{}': {}",
                        raw, self.pattern, e
                    ))
                })?,
        };

        self.naive_zone.resolve(naive).ok_or_else(|| {
            Error::invalid_input(format!("'{}' does not exist in the local time zone", raw))
        })
    }

    /// True when `last_modified` is strictly after `last_synced`
    ///
    /// Unparseable values count as modified so content is re-ingested
    /// rather than silently skipped.
    pub fn is_modified_since(&self, last_modified: &str, last_synced: DateTime<Utc>) -> bool {
        match self.parse(last_modified) {
            Ok(modified) => modified > last_synced,
            Err(e) => {
                warn!("Treating file as modified, timestamp unreadable: {}", e);
                true
            }
        }
    }
}

/// Decide whether a remote file must be downloaded
///
/// Rules, in order:
/// 1. Folders are never downloaded.
/// 2. Mime types excluded for `provider_name` (e.g. Notion databases) are never downloaded.
/// 3. Without a previous sync, everything else is downloaded.
/// 4. Otherwise the file is downloaded iff it was modified strictly after `last_synced`.
///
/// Exclusions come from the built-in provider profiles; engines built from a
/// [`crate::config::PolicyConfig`] use [`crate::ProviderPolicy`] instead.
pub fn should_download_file(
    file: &RemoteFile,
    last_synced: Option<DateTime<Utc>>,
    provider_name: &str,
    timestamp_format: &TimestampFormat,
) -> bool {
    SessionPolicy::new(
        provider_name,
        timestamp_format.clone(),
        ExclusionTable::builtin().excluded_for(provider_name),
    )
    .should_download(file, last_synced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_fractional_utc() {
        let format = TimestampFormat::new("%Y-%m-%dT%H:%M:%S%.fZ", NaiveZone::Utc);
        let parsed = format.parse("2024-03-01T10:15:30.250Z").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap()
            + Duration::milliseconds(250);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_with_offset_normalises_to_utc() {
        let format = TimestampFormat::new("%Y-%m-%d %H:%M:%S %z", NaiveZone::Utc);
        let parsed = format.parse("2024-03-01 12:00:00 +0200").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rfc3339() {
        let parsed = TimestampFormat::rfc3339()
            .parse("2024-03-01T10:00:00-05:00")
            .unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_date_only() {
        let format = TimestampFormat::new("%Y-%m-%d", NaiveZone::Utc);
        let parsed = format.parse("2024-03-01").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_garbage_is_rejected_but_counts_as_modified() {
        let format = TimestampFormat::new("%Y-%m-%dT%H:%M:%SZ", NaiveZone::Utc);
        assert!(format.parse("yesterday-ish").is_err());
        assert!(format.is_modified_since("yesterday-ish", Utc::now()));
    }
}
