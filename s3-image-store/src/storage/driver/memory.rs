use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::{HeaderMap, HeaderValue, header};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::storage::driver::filesystem::content_type_for;
use crate::storage::paths::join_key;
use crate::storage::{ObjectStream, ObjectStore, PutOptions};

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub body: Bytes,
    pub options: PutOptions,
}

/// An in-process bucket. Writes are atomic per key, so conditional puts
/// behave like they do against S3.
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
    unavailable: AtomicBool,
    chunk_size: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits GET bodies into chunks of at most `size` bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// While set, every request fails as if the store could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn insert(&self, key: &str, body: impl Into<Bytes>) {
        let object = StoredObject {
            body: body.into(),
            options: PutOptions::default(),
        };
        self.objects.write().await.insert(join_key([key]), object);
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(&join_key([key])).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check_available(&self, key: &str) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::backend(
                key,
                std::io::Error::other("object store unavailable"),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStorage {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<(), StoreError> {
        self.check_available(key)?;
        let key = join_key([key]);
        let mut objects = self.objects.write().await;
        if options.if_absent && objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        objects.insert(
            key,
            StoredObject {
                body,
                options: options.clone(),
            },
        );
        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<(), StoreError> {
        self.check_available(key)?;
        if self.objects.read().await.contains_key(&join_key([key])) {
            Ok(())
        } else {
            Err(StoreError::NotFound(key.to_string()))
        }
    }

    async fn get_object(&self, key: &str) -> Result<ObjectStream, StoreError> {
        self.check_available(key)?;
        let object = self
            .object(key)
            .await
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from(object.body.len()),
        );
        let content_type = object
            .options
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
            .unwrap_or_else(|| HeaderValue::from_static(content_type_for(key)));
        headers.insert(header::CONTENT_TYPE, content_type);
        if let Some(cache_control) = object
            .options
            .cache_control
            .as_deref()
            .and_then(|cc| HeaderValue::from_str(cc).ok())
        {
            headers.insert(header::CACHE_CONTROL, cache_control);
        }

        let chunk_size = self.chunk_size.unwrap_or(object.body.len().max(1));
        let body = object.body;
        let chunks: Vec<Result<Bytes, StoreError>> = (0..body.len())
            .step_by(chunk_size)
            .map(|start| Ok(body.slice(start..(start + chunk_size).min(body.len()))))
            .collect();
        Ok(ObjectStream {
            headers,
            body: futures::stream::iter(chunks).boxed(),
        })
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.check_available(key)?;
        match self.objects.write().await.remove(&join_key([key])) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_conditional_put_rejects_existing_key() {
        let storage = MemoryStorage::new();
        let options = PutOptions {
            if_absent: true,
            ..PutOptions::default()
        };
        storage.put_object("a/cat.jpg", Bytes::from_static(b"1"), &options).await.unwrap();
        let err = storage
            .put_object("/a/cat.jpg", Bytes::from_static(b"2"), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(key) if key == "a/cat.jpg"));
        assert_eq!(storage.object("a/cat.jpg").await.unwrap().body, Bytes::from_static(b"1"));
    }

    #[tokio::test]
    async fn test_get_streams_in_chunks() {
        let storage = MemoryStorage::new().with_chunk_size(2);
        storage.insert("cat.png", Bytes::from_static(b"12345")).await;

        let object = storage.get_object("cat.png").await.unwrap();
        assert_eq!(object.headers[header::CONTENT_TYPE], "image/png");
        let chunks: Vec<Bytes> = object.body.try_collect().await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), b"12345");
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let storage = MemoryStorage::new();
        storage.insert("cat.png", Bytes::from_static(b"x")).await;
        storage.set_unavailable(true);

        assert!(matches!(
            storage.head_object("cat.png").await,
            Err(StoreError::Backend { .. })
        ));
        assert!(storage.get_object("cat.png").await.is_err());
        assert!(matches!(
            storage.delete_object("cat.png").await,
            Err(StoreError::Backend { .. })
        ));

        storage.set_unavailable(false);
        storage.head_object("cat.png").await.unwrap();
    }
}
