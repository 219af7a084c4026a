//! Ingestible format policy

use std::collections::HashSet;

use crate::config::{PolicyConfig, default_supported_extensions};
use crate::error::{Error, Result};
use crate::model::RemoteFile;

/// Extensions for files whose names carry none (e.g. exported documents)
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("application/pdf", ".pdf"),
    ("text/plain", ".txt"),
    ("text/markdown", ".md"),
    ("text/csv", ".csv"),
    ("text/html", ".html"),
    ("application/epub+zip", ".epub"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".docx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".pptx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".xlsx",
    ),
    ("application/vnd.ms-excel", ".xls"),
    ("application/vnd.oasis.opendocument.text", ".odt"),
    ("audio/mpeg", ".mp3"),
    ("audio/wav", ".wav"),
    ("video/mp4", ".mp4"),
];

/// Decides whether a file's type is ingestible
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportPolicy {
    extensions: HashSet<String>,
}

impl SupportPolicy {
    /// Build from configured extensions
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::with_extensions(config.supported_extensions.iter().cloned())
    }

    /// Build from an explicit extension list (dot-prefixed)
    pub fn with_extensions(extensions: impl IntoIterator<Item = String>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Lower-cased, dot-prefixed extension of `file`
    ///
    /// Taken from the last dot-separated suffix of the name; names without
    /// one fall back to the mime type.
    pub fn resolve_extension(file: &RemoteFile) -> Option<String> {
        extension_from_name(&file.name).or_else(|| {
            let mime = file.mime_type.to_ascii_lowercase();
            MIME_EXTENSIONS
                .iter()
                .find(|(m, _)| *m == mime)
                .map(|(_, ext)| ext.to_string())
        })
    }

    /// True when the file can be ingested
    pub fn is_supported(&self, file: &RemoteFile) -> bool {
        Self::resolve_extension(file).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Return the file's extension, or `UnsupportedFormat`
    pub fn check(&self, file: &RemoteFile) -> Result<String> {
        match Self::resolve_extension(file) {
            Some(ext) if self.extensions.contains(&ext) => Ok(ext),
            other => Err(Error::unsupported_format(
                &file.name,
                other.unwrap_or_default(),
            )),
        }
    }
}

impl Default for SupportPolicy {
    fn default() -> Self {
        Self::with_extensions(default_supported_extensions())
    }
}

fn extension_from_name(name: &str) -> Option<String> {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let (stem, suffix) = base.rsplit_once('.')?;
    if stem.is_empty() || suffix.is_empty() {
        return None;
    }
    Some(format!(".{}", suffix.to_ascii_lowercase()))
}
