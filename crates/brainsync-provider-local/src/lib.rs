// # Local Directory Provider
//
// Exposes a directory tree on the local filesystem as a sync provider.
//
// ## Identity
//
// - File and folder ids are `/`-separated paths relative to the root
// - The root itself is the empty id (`""` or `"."`)
// - Names equal ids, so records stay stable across renames of the root
//
// ## Behavior
//
// - Listings are sorted by name and paginated by offset
// - Modification times are reported as RFC 3339 in UTC
// - Mime types are guessed from the file extension
// - Ids that escape the root (absolute paths, `..`) are refused
//
// ## Constraints
//
// **Allowed**: read-only filesystem access below the root.
//
// **Forbidden**:
// - Writing below the root
// - Retrying failed reads (a later pass retries)
// - Caching listings between calls

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs;

use brainsync_core::config::ProviderConfig;
use brainsync_core::error::{Error, Result};
use brainsync_core::model::{Credentials, RemoteFile};
use brainsync_core::traits::{FolderPage, SyncProvider, SyncProviderFactory};

const PROVIDER_NAME: &str = "local";

/// Mime types for common extensions; anything else is `application/octet-stream`
const MIME_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("markdown", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("pdf", "application/pdf"),
    ("json", "application/json"),
    ("ipynb", "application/x-ipynb+json"),
    ("py", "text/x-python"),
    ("epub", "application/epub+zip"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
];

/// Sync provider over a local directory
#[derive(Debug, Clone)]
pub struct LocalFolderProvider {
    root: PathBuf,
    page_size: usize,
}

impl LocalFolderProvider {
    /// Create a provider rooted at `root`
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn new(root: impl Into<PathBuf>, page_size: usize) -> Self {
        assert!(page_size > 0, "page size must be > 0");
        Self {
            root: root.into(),
            page_size,
        }
    }

    /// Directory this provider exposes
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an id to a path below the root
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let mut path = self.root.clone();

        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(Error::permission_denied(format!(
                        "'{}' is outside the sync root",
                        id
                    )));
                }
            }
        }

        Ok(path)
    }

    async fn describe(&self, id: String, path: &Path) -> Result<RemoteFile> {
        let metadata = fs::metadata(path).await.map_err(|e| io_error(&id, e))?;
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .map_err(|e| io_error(&id, e))?
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        if metadata.is_dir() {
            return Ok(RemoteFile::folder(id.clone(), id, last_modified));
        }

        let mime_type = guess_mime_type(&id);
        let link = format!("file://{}", path.display());
        Ok(RemoteFile::new(id.clone(), id, last_modified, mime_type).with_web_view_link(link))
    }
}

#[async_trait]
impl SyncProvider for LocalFolderProvider {
    async fn list_folder(
        &self,
        folder_id: &str,
        _credentials: &Credentials,
        continuation: Option<&str>,
    ) -> Result<FolderPage> {
        let dir = self.resolve(folder_id)?;
        let offset = match continuation {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                Error::invalid_input(format!("Bad continuation token '{}'", token))
            })?,
        };

        let mut reader = fs::read_dir(&dir).await.map_err(|e| io_error(folder_id, e))?;
        let mut names = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_error(folder_id, e))?
        {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            } else {
                tracing::warn!(
                    "Skipping non UTF-8 entry in {}: {:?}",
                    dir.display(),
                    entry.file_name()
                );
            }
        }
        names.sort();

        let end = (offset + self.page_size).min(names.len());
        let mut files = Vec::with_capacity(end.saturating_sub(offset));
        for name in names.iter().take(end).skip(offset) {
            let id = child_id(folder_id, name);
            files.push(self.describe(id, &dir.join(name)).await?);
        }

        tracing::debug!(
            "Listed {} entr(ies) of '{}' from offset {}",
            files.len(),
            folder_id,
            offset
        );

        Ok(FolderPage {
            files,
            next_continuation: (end < names.len()).then(|| end.to_string()),
        })
    }

    async fn get_file(&self, file_id: &str, _credentials: &Credentials) -> Result<RemoteFile> {
        let path = self.resolve(file_id)?;
        self.describe(normalize_id(file_id), &path).await
    }

    async fn fetch_bytes(&self, file_id: &str, _credentials: &Credentials) -> Result<Bytes> {
        let path = self.resolve(file_id)?;
        let content = fs::read(&path).await.map_err(|e| io_error(file_id, e))?;
        Ok(Bytes::from(content))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

fn normalize_id(id: &str) -> String {
    id.trim_matches('/')
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn child_id(folder_id: &str, name: &str) -> String {
    let parent = normalize_id(folder_id);
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

fn guess_mime_type(id: &str) -> &'static str {
    let extension = Path::new(id)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    MIME_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

fn io_error(id: &str, err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::NotFound => Error::not_found(format!("'{}' does not exist", id)),
        std::io::ErrorKind::PermissionDenied => {
            Error::permission_denied(format!("'{}' is not readable", id))
        }
        _ => Error::Io(err),
    }
}

/// Factory for creating local directory providers
pub struct LocalProviderFactory;

impl SyncProviderFactory for LocalProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn SyncProvider>> {
        match config {
            ProviderConfig::Local { root, page_size } => {
                config.validate()?;
                if !Path::new(root).is_dir() {
                    return Err(Error::config(format!(
                        "Local provider root {} is not a directory",
                        root
                    )));
                }
                Ok(Arc::new(LocalFolderProvider::new(root, *page_size)))
            }
            _ => Err(Error::config("Invalid config for local provider")),
        }
    }
}

/// Register the local provider with a registry
///
/// # Example
///
/// ```rust
/// use brainsync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// brainsync_provider_local::register(&registry);
/// assert!(registry.has_provider("local"));
/// ```
pub fn register(registry: &brainsync_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(LocalProviderFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tree() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        std::fs::write(dir.path().join("b.md"), b"# beta").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("c.pdf"), b"%PDF").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_list_root_is_sorted_and_typed() {
        let dir = tree();
        let provider = LocalFolderProvider::new(dir.path(), 100);

        let page = provider
            .list_folder("", &Credentials::empty(), None)
            .await
            .unwrap();

        let ids: Vec<&str> = page.files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "b.md", "docs"]);
        assert!(page.files[2].is_folder);
        assert_eq!(page.files[1].mime_type, "text/markdown");
        assert!(page.next_continuation.is_none());
    }

    #[tokio::test]
    async fn test_pagination() {
        let dir = tree();
        let provider = LocalFolderProvider::new(dir.path(), 2);
        let creds = Credentials::empty();

        let first = provider.list_folder(".", &creds, None).await.unwrap();
        assert_eq!(first.files.len(), 2);
        let token = first.next_continuation.unwrap();

        let second = provider
            .list_folder(".", &creds, Some(&token))
            .await
            .unwrap();
        assert_eq!(second.files.len(), 1);
        assert_eq!(second.files[0].id, "docs");
        assert!(second.next_continuation.is_none());
    }

    #[tokio::test]
    async fn test_nested_ids_and_content() {
        let dir = tree();
        let provider = LocalFolderProvider::new(dir.path(), 100);
        let creds = Credentials::empty();

        let page = provider.list_folder("docs", &creds, None).await.unwrap();
        assert_eq!(page.files[0].id, "docs/c.pdf");
        assert_eq!(page.files[0].mime_type, "application/pdf");

        let bytes = provider.fetch_bytes("docs/c.pdf", &creds).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF");

        let file = provider.get_file("docs/c.pdf", &creds).await.unwrap();
        assert!(!file.is_folder);
        assert!(file.web_view_link.starts_with("file://"));
        assert!(file.web_view_link.ends_with("c.pdf"));
        assert!(DateTime::parse_from_rfc3339(&file.last_modified).is_ok());
    }

    #[tokio::test]
    async fn test_missing_and_escaping_ids() {
        let dir = tree();
        let provider = LocalFolderProvider::new(dir.path(), 100);
        let creds = Credentials::empty();

        assert!(matches!(
            provider.get_file("nope.txt", &creds).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            provider.fetch_bytes("../secret", &creds).await,
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            provider.list_folder("/etc", &creds, None).await,
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_factory_requires_directory() {
        let dir = tree();
        let ok = ProviderConfig::Local {
            root: dir.path().to_string_lossy().into_owned(),
            page_size: 10,
        };
        assert!(LocalProviderFactory.create(&ok).is_ok());

        let missing = ProviderConfig::Local {
            root: dir.path().join("missing").to_string_lossy().into_owned(),
            page_size: 10,
        };
        assert!(matches!(
            LocalProviderFactory.create(&missing),
            Err(Error::Config(_))
        ));
    }
}
