use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tracing::{debug, info};

use crate::core::error::StorageError;
use crate::core::types::now_epoch_millis;

use super::content_type_for_path;

/// Prefix under which stored files are referenced by assets.
pub const FILE_URL_PREFIX: &str = "/files/";

/// An opened media file with its total length known up front.
pub struct OpenFile {
    pub file: File,
    pub total_len: u64,
    pub content_type: &'static str,
    pub file_name: String,
}

/// Local-disk file store rooted at the configured upload directory.
///
/// Location references look like `/files/<name>`; anything else, and any
/// name that would escape the root, is rejected before touching the
/// filesystem.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(upload_dir: impl AsRef<Path>) -> Self {
        Self {
            root: upload_dir.as_ref().to_path_buf(),
        }
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Map a `/files/<name>` location reference to a path under the root.
    fn resolve(&self, location: &str) -> Result<PathBuf, StorageError> {
        let name = location
            .strip_prefix(FILE_URL_PREFIX)
            .ok_or_else(|| StorageError::InvalidLocation {
                location: location.to_string(),
            })?;
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(StorageError::InvalidLocation {
                location: location.to_string(),
            });
        }
        Ok(self.root.join(name))
    }

    /// Open the file behind a location reference and report its length.
    pub async fn open(&self, location: &str) -> Result<OpenFile, StorageError> {
        let path = self.resolve(location)?;
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::FileNotFound {
                    location: location.to_string(),
                });
            }
            Err(e) => return Err(StorageError::Io(e)),
        };
        let total_len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(location, total_len, "opened media file");
        Ok(OpenFile {
            file,
            total_len,
            content_type: content_type_for_path(location),
            file_name,
        })
    }

    /// Store an uploaded body under `<epoch-millis>-<filename>` and return
    /// its location reference. Empty uploads are rejected.
    pub async fn store(&self, original_name: &str, body: Bytes) -> Result<String, StorageError> {
        if body.is_empty() {
            return Err(StorageError::EmptyUpload);
        }
        self.ensure_root().await?;

        let clean = sanitize_file_name(original_name);
        let stored_name = format!("{}-{}", now_epoch_millis(), clean);
        let path = self.root.join(&stored_name);
        tokio::fs::write(&path, &body).await?;

        info!(name = %stored_name, size = body.len(), "stored uploaded file");
        Ok(format!("{}{}", FILE_URL_PREFIX, stored_name))
    }
}

/// Keep only the final path component and drop characters that do not
/// belong in a stored file name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_store_then_open() {
        let (_dir, store) = store();
        let location = store
            .store("clip.mp4", Bytes::from(vec![7u8; 500]))
            .await
            .unwrap();
        assert!(location.starts_with(FILE_URL_PREFIX));
        assert!(location.ends_with("-clip.mp4"));

        let opened = store.open(&location).await.unwrap();
        assert_eq!(opened.total_len, 500);
        assert_eq!(opened.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let (_dir, store) = store();
        let result = store.store("clip.mp4", Bytes::new()).await;
        assert!(matches!(result, Err(StorageError::EmptyUpload)));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (_dir, store) = store();
        let result = store.open("/files/nope.mp4").await;
        assert!(matches!(result, Err(StorageError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_traversal_locations_rejected() {
        let (_dir, store) = store();
        for loc in [
            "/files/../etc/passwd",
            "/files/a/b.mp4",
            "/elsewhere/x.mp4",
            "/files/",
        ] {
            let result = store.open(loc).await;
            assert!(
                matches!(result, Err(StorageError::InvalidLocation { .. })),
                "{} should be rejected",
                loc
            );
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../evil.mp4"), "evil.mp4");
        assert_eq!(sanitize_file_name("dir/song one.mp3"), "songone.mp3");
        assert_eq!(sanitize_file_name("///"), "upload");
    }
}
