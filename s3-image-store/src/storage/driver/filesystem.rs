use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::http::{HeaderMap, HeaderValue, header};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use tokio::{
    fs::{File, OpenOptions, create_dir_all, metadata, remove_file},
    io::{AsyncWriteExt, BufWriter},
};
use tokio_util::io::ReaderStream;

use crate::error::StoreError;
use crate::storage::paths::join_key;
use crate::storage::{ObjectStream, ObjectStore, PutOptions};

/// Keeps objects as plain files under a root directory. Meant for local
/// development and tests; ACL and cache metadata are not persisted.
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        FilesystemStorage {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(join_key([key]))
    }

    async fn crate_path(&self, key: &str) -> std::io::Result<PathBuf> {
        let file_path = self.path_for(key);
        if let Some(parent) = file_path.parent() {
            create_dir_all(parent).await?;
        }
        Ok(file_path)
    }
}

fn not_found(key: &str, err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io(err)
    }
}

/// Content type guessed from the key's extension.
pub(crate) fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[async_trait::async_trait]
impl ObjectStore for FilesystemStorage {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<(), StoreError> {
        let file_path = self.crate_path(key).await?;
        let file = if options.if_absent {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&file_path)
                .await
                .map_err(|err| match err.kind() {
                    ErrorKind::AlreadyExists => StoreError::AlreadyExists(key.to_string()),
                    _ => StoreError::Io(err),
                })?
        } else {
            File::create(&file_path).await?
        };

        let mut file_writer = BufWriter::new(file);
        file_writer.write_all(&body).await?;
        file_writer.flush().await?;
        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<(), StoreError> {
        let meta = metadata(self.path_for(key))
            .await
            .map_err(|err| not_found(key, err))?;
        if meta.is_file() {
            Ok(())
        } else {
            Err(StoreError::NotFound(key.to_string()))
        }
    }

    async fn get_object(&self, key: &str) -> Result<ObjectStream, StoreError> {
        let path = self.path_for(key);
        let file = File::open(&path).await.map_err(|err| not_found(key, err))?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.len()));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type_for(key)),
        );
        if let Ok(modified) = meta.modified() {
            let modified: DateTime<Utc> = modified.into();
            let http_date = modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
            if let Ok(value) = HeaderValue::from_str(&http_date) {
                headers.insert(header::LAST_MODIFIED, value);
            }
        }

        let body = ReaderStream::new(file).map_err(StoreError::from).boxed();
        Ok(ObjectStream { headers, body })
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        remove_file(self.path_for(key))
            .await
            .map_err(|err| not_found(key, err))
    }
}
