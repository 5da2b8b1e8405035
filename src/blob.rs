//! Object storage for media blobs.
//!
//! Blob paths are namespaced per feature (`media/<filename>`,
//! `avatars/<uid>`, `profilePictures/<uid>`). Uploading returns a retrievable
//! URL that features store back into their document; deleting a
//! media-bearing document resolves the path from that URL again.

use async_trait::async_trait;
use hashbrown::HashMap;
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

const MEMORY_BASE_URL: &str = "memory://blobs/";

/// Failures raised by a [`BlobStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    /// No blob stored at this path.
    #[error("blob not found: {0}")]
    NotFound(String),
    /// The URL does not identify a blob of this store.
    #[error("cannot resolve blob path from url: {0}")]
    Unresolvable(String),
    /// Storage service failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Media blob namespace for a file name.
pub fn media_path(file_name: &str) -> String {
    format!("media/{file_name}")
}

/// Avatar blob namespace for a user.
pub fn avatar_path(uid: &str) -> String {
    format!("avatars/{uid}")
}

/// Profile picture blob namespace for a user.
pub fn profile_picture_path(uid: &str) -> String {
    format!("profilePictures/{uid}")
}

/// Hosted object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` at `path`, replacing any existing blob, and returns a
    /// download URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, BlobError>;

    /// Removes the blob at `path`.
    async fn delete(&self, path: &str) -> Result<(), BlobError>;

    /// Resolves the storage path encoded in a download URL.
    fn path_from_url(&self, url: &str) -> Result<String, BlobError>;
}

/// In-process [`BlobStore`] whose URLs follow the `/o/<encoded path>` layout.
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Creates an empty store serving URLs under `memory://blobs/`.
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a copy of the blob at `path`.
    pub async fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.lock().await.get(path).cloned()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn url_for(&self, path: &str) -> String {
        let encoded = utf8_percent_encode(path, NON_ALPHANUMERIC).to_string();
        format!("{MEMORY_BASE_URL}o/{encoded}?alt=media")
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        tracing::debug!(path, size = bytes.len(), "blob uploaded");
        self.blobs.lock().await.insert(path.to_string(), bytes);
        Ok(self.url_for(path))
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        match self.blobs.lock().await.remove(path) {
            Some(_) => Ok(()),
            None => Err(BlobError::NotFound(path.to_string())),
        }
    }

    fn path_from_url(&self, url: &str) -> Result<String, BlobError> {
        resolve_object_path(url)
    }
}

/// Extracts the percent-decoded object path following `/o/` in `url`.
pub fn resolve_object_path(url: &str) -> Result<String, BlobError> {
    let parsed = Url::parse(url).map_err(|_| BlobError::Unresolvable(url.to_string()))?;
    let encoded = parsed
        .path()
        .split_once("/o/")
        .map(|(_, rest)| rest)
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| BlobError::Unresolvable(url.to_string()))?;
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|p| p.into_owned())
        .map_err(|_| BlobError::Unresolvable(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_url_resolves_back_to_path() {
        let store = MemoryBlobStore::new();
        let url = store
            .upload(&media_path("our trip.jpg"), vec![1, 2, 3])
            .await
            .expect("upload");
        assert_eq!(store.path_from_url(&url).expect("path"), "media/our trip.jpg");
        assert_eq!(store.read("media/our trip.jpg").await, Some(vec![1, 2, 3]));
    }

    #[test]
    fn foreign_urls_do_not_resolve() {
        assert!(resolve_object_path("http://x/no-object-here").is_err());
        assert!(resolve_object_path("not a url").is_err());
    }

    #[tokio::test]
    async fn deleting_twice_reports_not_found() {
        let store = MemoryBlobStore::new();
        store.upload("avatars/u1", vec![0]).await.expect("upload");
        store.delete("avatars/u1").await.expect("delete");
        assert_eq!(
            store.delete("avatars/u1").await,
            Err(BlobError::NotFound("avatars/u1".to_string()))
        );
    }
}
