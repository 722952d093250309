//! Object storage for uploaded files.
//!
//! Keys are content-addressed: the first 16 hex chars of the SHA-256 of the
//! data, followed by a sanitized copy of the original file name. Re-uploading
//! identical bytes under the same name yields the same key.

use async_trait::async_trait;
use axum::body::Bytes;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Fallback name for uploads whose file name sanitizes to nothing.
const DEFAULT_FILE_NAME: &str = "upload";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Location of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Durable storage that hands back a reference URL for each object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, file_name: &str, data: Bytes) -> Result<StoredObject, StoreError>;

    /// Returns `Ok(None)` when no object exists under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Filesystem-backed store that serves objects back through `GET /files/{key}`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create the storage directory if it does not exist.
    pub async fn init(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tracing::info!("Upload store initialized at {}", self.root.display());
        Ok(())
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_key(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/files/{}", self.public_url, key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, file_name: &str, data: Bytes) -> Result<StoredObject, StoreError> {
        let digest = hex::encode(Sha256::digest(&data));
        let key = format!("{}-{}", &digest[..16], sanitize_file_name(file_name));
        let path = self.object_path(&key)?;

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!("Object {} already exists, skipping write", key);
        } else {
            tokio::fs::create_dir_all(&self.root).await?;
            tokio::fs::write(&path, &data).await?;
            tracing::debug!("Stored object {} ({} bytes)", key, data.len());
        }

        Ok(StoredObject {
            url: self.url_for(&key),
            key,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`, dropping any
/// directory part and leading dots.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if is_key_char(c) { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.starts_with('.') && key.chars().all(is_key_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\bob\\notes.txt"), "notes.txt");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name("..."), "upload");
    }

    #[test]
    fn test_key_validation() {
        assert!(is_valid_key("0123456789abcdef-report.pdf"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("../secret"));
        assert!(!is_valid_key(".env"));
        assert!(!is_valid_key("a/b"));
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("uploads"), "http://localhost:8000/");
        store.init().await.unwrap();

        let stored = store
            .put("hello.txt", Bytes::from_static(b"hello world"))
            .await
            .unwrap();

        assert!(stored.key.ends_with("-hello.txt"));
        assert_eq!(stored.key.len(), 16 + 1 + "hello.txt".len());
        assert_eq!(stored.url, format!("http://localhost:8000/files/{}", stored.key));

        let data = store.get(&stored.key).await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"hello world"[..]));
    }

    #[tokio::test]
    async fn test_identical_uploads_share_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost");

        let first = store.put("a.bin", Bytes::from_static(b"same")).await.unwrap();
        let second = store.put("a.bin", Bytes::from_static(b"same")).await.unwrap();
        let other = store.put("a.bin", Bytes::from_static(b"different")).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first.key, other.key);
    }

    #[tokio::test]
    async fn test_get_missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost");

        assert!(store.get("0000000000000000-none.txt").await.unwrap().is_none());
        assert!(matches!(
            store.get("../escape").await,
            Err(StoreError::InvalidKey(_))
        ));
    }
}
