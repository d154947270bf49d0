use std::path::PathBuf;
use std::sync::Arc;

use crate::adapter::{AssetStore, ImageStore};
use crate::compressor::ImageCompressor;
use crate::config::StoreConfig;
use crate::error::ConfigError;
use crate::storage::ObjectStore;
use crate::storage::driver::{filesystem::FilesystemStorage, memory::MemoryStorage, s3::S3Storage};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AssetStore>,
    /// Where request bodies are spooled before `save` picks them up.
    pub upload_dir: PathBuf,
}

impl AppState {
    pub async fn new(
        config: StoreConfig,
        storage_typ: &str,
        root_dir: &str,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let storage_backend: Arc<dyn ObjectStore> = match storage_typ {
            "FILESYSTEM" => Arc::new(FilesystemStorage::new(root_dir)),
            "MEMORY" => Arc::new(MemoryStorage::new()),
            _ => Arc::new(S3Storage::new(&config).await),
        };
        let upload_dir = config.scratch_dir();
        let store = ImageStore::new(config, storage_backend, Arc::new(ImageCompressor))?;

        Ok(Self::with_store(Arc::new(store), upload_dir))
    }

    pub fn with_store(store: Arc<dyn AssetStore>, upload_dir: impl Into<PathBuf>) -> Self {
        AppState {
            store,
            upload_dir: upload_dir.into(),
        }
    }
}
