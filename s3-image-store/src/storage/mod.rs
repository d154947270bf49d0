use axum::http::HeaderMap;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::StoreError;

pub mod driver;
pub mod paths;
pub mod resolver;

pub use paths::StorageKey;

/// Object metadata written alongside an upload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub public_read: bool,
    /// Fail with [`StoreError::AlreadyExists`] instead of overwriting.
    pub if_absent: bool,
}

/// A streamed GET: the response headers arrive first, then the body.
pub struct ObjectStream {
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Result<Bytes, StoreError>>,
}

/// Remote object storage as consumed by the adapter.
///
/// Every method addresses a key within the driver's bucket. Missing objects
/// are reported as [`StoreError::NotFound`] by `head_object`, `get_object`
/// and `delete_object` alike.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, options: &PutOptions)
    -> Result<(), StoreError>;
    async fn head_object(&self, key: &str) -> Result<(), StoreError>;
    async fn get_object(&self, key: &str) -> Result<ObjectStream, StoreError>;
    async fn delete_object(&self, key: &str) -> Result<(), StoreError>;
}
