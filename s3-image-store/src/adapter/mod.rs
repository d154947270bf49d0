//! The storage adapter the host dispatches against.
//!
//! The host owns uploads, routing and its own error pages. It talks to the
//! adapter only through [`AssetStore`]: `save` an uploaded image and get its
//! public URL back, ask whether a key `exists`, `delete` a file, and `serve`
//! reads through an axum middleware slot.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::SaveError;

mod scratch;
pub mod serve;
mod store;

pub use serve::ServePhase;
pub use store::ImageStore;

/// Computes the default target directory from the path prefix. Injected by
/// the host; [`dated_target_dir`](crate::storage::paths::dated_target_dir)
/// is used when it supplies none.
pub type TargetDirFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// One uploaded image, owned by the `save` call that consumes it.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// Local file the host wrote the upload to.
    pub source_path: PathBuf,
    /// Original file name; becomes the base of the storage key.
    pub file_name: String,
    pub mime_type: String,
    /// Directory relative to the path prefix. `None` uses the default.
    pub target_dir: Option<String>,
}

impl UploadRequest {
    pub fn new(
        source_path: impl Into<PathBuf>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            target_dir: None,
        }
    }

    pub fn in_dir(mut self, target_dir: impl Into<String>) -> Self {
        self.target_dir = Some(target_dir.into());
        self
    }
}

#[async_trait::async_trait]
pub trait AssetStore: Send + Sync {
    /// Compresses and uploads the image, returning its public URL.
    async fn save(&self, request: UploadRequest) -> Result<String, SaveError>;

    /// Whether an object is stored under `file_name` (a full key).
    /// Any failure reads as `false`.
    async fn exists(&self, file_name: &str) -> bool;

    /// Removes `file_name` from `target_dir`. Any failure, including a
    /// missing object, reads as `false`.
    async fn delete(&self, file_name: &str, target_dir: Option<&str>) -> bool;

    /// Streams the object named by the request path. On failure the
    /// response of `next` is returned with status 404.
    async fn serve(&self, req: Request, next: Next) -> Response;

    /// The directory new uploads land in when the host names none.
    fn target_dir(&self, prefix: &str) -> String;
}
