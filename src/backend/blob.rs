use super::{BackendError, BackendResult, RestBackend, rest::check};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use uuid::Uuid;

/// Storage for uploaded images, addressed by generated paths.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under a fresh path and returns it.
    async fn upload(&self, bytes: Bytes, extension: &str) -> BackendResult<String>;

    async fn fetch(&self, path: &str) -> BackendResult<Option<Bytes>>;
}

/// `{uuid}.{ext}` with the extension reduced to lowercase alphanumerics.
pub fn blob_path(extension: &str) -> String {
    let ext: String = extension
        .trim_start_matches('.')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(8)
        .collect();

    if ext.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        format!("{}.{}", Uuid::new_v4(), ext)
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, bytes: Bytes, extension: &str) -> BackendResult<String> {
        let path = blob_path(extension);
        self.blobs.insert(path.clone(), bytes);
        Ok(path)
    }

    async fn fetch(&self, path: &str) -> BackendResult<Option<Bytes>> {
        Ok(self.blobs.get(path).map(|b| b.value().clone()))
    }
}

/// Object storage next to the REST API: `/storage/v1/object/{bucket}/{path}`.
#[derive(Debug, Clone)]
pub struct RestBlobStore {
    backend: RestBackend,
    bucket: String,
}

impl RestBlobStore {
    pub fn new(backend: RestBackend, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.backend.config().base_url,
            self.bucket,
            path
        )
    }
}

#[async_trait]
impl BlobStore for RestBlobStore {
    async fn upload(&self, bytes: Bytes, extension: &str) -> BackendResult<String> {
        let path = blob_path(extension);
        let content_type = mime_guess::from_path(&path).first_or_octet_stream();
        let response = self
            .backend
            .authorize(self.backend.client().post(self.url(&path)))
            .header("content-type", content_type.essence_str())
            .body(bytes)
            .send()
            .await?;
        check(response).await?;
        Ok(path)
    }

    async fn fetch(&self, path: &str) -> BackendResult<Option<Bytes>> {
        let response = self
            .backend
            .authorize(self.backend.client().get(self.url(path)))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(Some(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_paths_are_unique_and_sanitized() {
        let a = blob_path(".PNG");
        let b = blob_path("png");
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
        assert!(!blob_path("../x").contains('/'));
        assert!(!blob_path("").contains('.'));
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryBlobStore::new();
        let path = store
            .upload(Bytes::from_static(b"\x89PNG"), "png")
            .await
            .unwrap();

        assert_eq!(
            store.fetch(&path).await.unwrap(),
            Some(Bytes::from_static(b"\x89PNG"))
        );
        assert_eq!(store.fetch("missing.png").await.unwrap(), None);
    }
}
