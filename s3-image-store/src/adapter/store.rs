use std::path::Path;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use bytes::Bytes;

use crate::adapter::scratch::ScratchDir;
use crate::adapter::{AssetStore, TargetDirFn, UploadRequest, serve};
use crate::compressor::{CompressionOptions, Compressor, ImageCompressor};
use crate::config::{CACHE_MAX_AGE_SECS, StoreConfig};
use crate::error::{ConfigError, ResolutionError, SaveError, StoreError};
use crate::storage::driver::s3::S3Storage;
use crate::storage::paths::{
    StorageKey, confine_relative, dated_target_dir, join_key, upload_base_name,
};
use crate::storage::resolver::resolve_unique_key;
use crate::storage::{ObjectStore, PutOptions};

/// Image storage on top of an object store: compress, name, upload, serve.
#[derive(Clone)]
pub struct ImageStore {
    config: Arc<StoreConfig>,
    host: String,
    store: Arc<dyn ObjectStore>,
    compressor: Arc<dyn Compressor>,
    target_dir: TargetDirFn,
}

impl ImageStore {
    pub fn new(
        config: StoreConfig,
        store: Arc<dyn ObjectStore>,
        compressor: Arc<dyn Compressor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            host: config.host(),
            config: Arc::new(config),
            store,
            compressor,
            target_dir: Arc::new(dated_target_dir),
        })
    }

    /// An S3-backed store using the bundled image compressor.
    pub async fn connect(config: StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = S3Storage::new(&config).await;
        Self::new(config, Arc::new(store), Arc::new(ImageCompressor))
    }

    /// Replaces the default `<prefix>/<yyyy>/<mm>` target directory.
    pub fn with_target_dir<F>(mut self, target_dir: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.target_dir = Arc::new(target_dir);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url_for(&self, key: &StorageKey) -> String {
        format!("{}/{}", self.host, key)
    }

    fn directory_for(&self, target_dir: Option<&str>) -> String {
        let prefix = self.config.path_prefix();
        match target_dir {
            Some(dir) => join_key([prefix, confine_relative(dir).as_str()]),
            None => join_key([(self.target_dir)(prefix).as_str()]),
        }
    }

    async fn resolve(&self, base_name: &str, directory: &str) -> Result<StorageKey, SaveError> {
        let key = resolve_unique_key(
            self.store.as_ref(),
            base_name,
            directory,
            self.config.max_resolve_attempts(),
        )
        .await?;
        Ok(key)
    }

    async fn read_artifact(path: &Path) -> Result<Bytes, SaveError> {
        tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|source| SaveError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn compress_and_upload(
        &self,
        request: &UploadRequest,
        scratch: &ScratchDir,
        base_name: &str,
        directory: &str,
    ) -> Result<String, SaveError> {
        let options = CompressionOptions {
            mime_type: Some(request.mime_type.clone()),
            quality: self.config.quality(),
        };
        let artifact = self
            .compressor
            .compress(&request.source_path, scratch.path(), &options)
            .await?;

        let (mut key, body) = tokio::try_join!(
            self.resolve(base_name, directory),
            Self::read_artifact(&artifact),
        )?;

        let put_options = PutOptions {
            content_type: Some(request.mime_type.clone()),
            cache_control: Some(format!("max-age={CACHE_MAX_AGE_SECS}")),
            public_read: true,
            if_absent: self.config.conditional_writes(),
        };

        let max_attempts = self.config.max_resolve_attempts();
        let mut attempt = 1;
        loop {
            match self
                .store
                .put_object(key.as_str(), body.clone(), &put_options)
                .await
            {
                Ok(()) => break,
                Err(StoreError::AlreadyExists(_)) if attempt < max_attempts => {
                    tracing::debug!(%key, attempt, "key claimed by a concurrent upload, resolving again");
                    attempt += 1;
                    key = self.resolve(base_name, directory).await?;
                }
                Err(StoreError::AlreadyExists(_)) => {
                    return Err(ResolutionError::Exhausted {
                        name: base_name.to_string(),
                        directory: directory.to_string(),
                        attempts: max_attempts,
                    }
                    .into());
                }
                Err(source) => {
                    return Err(SaveError::Upload {
                        key: key.into_string(),
                        source,
                    });
                }
            }
        }

        tracing::info!(%key, bucket = self.config.bucket(), bytes = body.len(), "image uploaded");
        Ok(self.url_for(&key))
    }
}

#[async_trait::async_trait]
impl AssetStore for ImageStore {
    async fn save(&self, request: UploadRequest) -> Result<String, SaveError> {
        let directory = self.directory_for(request.target_dir.as_deref());
        let base_name = upload_base_name(&request.file_name);

        let scratch = ScratchDir::create(&self.config.scratch_dir())
            .await
            .map_err(SaveError::Scratch)?;
        let result = self
            .compress_and_upload(&request, &scratch, &base_name, &directory)
            .await;
        scratch.release().await;

        if let Err(err) = &result {
            tracing::error!(file = %request.file_name, %directory, "failed to save image: {err}");
        }
        result
    }

    async fn exists(&self, file_name: &str) -> bool {
        let key = StorageKey::from_parts([file_name]);
        match self.store.head_object(key.as_str()).await {
            Ok(()) => true,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(%key, "object does not exist");
                false
            }
            Err(err) => {
                tracing::warn!(%key, "existence check failed, reporting missing: {err}");
                false
            }
        }
    }

    async fn delete(&self, file_name: &str, target_dir: Option<&str>) -> bool {
        let directory = self.directory_for(target_dir);
        let file_name = confine_relative(file_name);
        if file_name.is_empty() {
            tracing::debug!(%directory, "no file name left to delete");
            return false;
        }
        let key = StorageKey::from_parts([directory.as_str(), file_name.as_str()]);
        match self.store.delete_object(key.as_str()).await {
            Ok(()) => {
                tracing::info!(%key, "object deleted");
                true
            }
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(%key, "nothing to delete");
                false
            }
            Err(err) => {
                tracing::warn!(%key, "delete failed: {err}");
                false
            }
        }
    }

    async fn serve(&self, req: Request, next: Next) -> Response {
        serve::proxy(self.store.as_ref(), req, next).await
    }

    fn target_dir(&self, prefix: &str) -> String {
        (self.target_dir)(prefix)
    }
}
