#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use image::{Rgb, RgbImage};
use s3_image_store::storage::driver::memory::MemoryStorage;
use s3_image_store::{
    CompressionError, CompressionOptions, Compressor, ImageCompressor, ImageStore, ObjectStore,
    ObjectStream, PutOptions, StoreConfig, StoreError,
};
use tempfile::TempDir;

pub struct Fixture {
    pub store: ImageStore,
    pub objects: Arc<MemoryStorage>,
    pub scratch: TempDir,
    pub uploads: TempDir,
}

impl Fixture {
    pub fn new(config: StoreConfig) -> Self {
        let objects = Arc::new(MemoryStorage::new());
        Self::with_parts(config, objects.clone(), objects, Arc::new(ImageCompressor))
    }

    pub fn with_parts(
        config: StoreConfig,
        objects: Arc<MemoryStorage>,
        backend: Arc<dyn ObjectStore>,
        compressor: Arc<dyn Compressor>,
    ) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let uploads = tempfile::tempdir().unwrap();
        let config = config.with_scratch_dir(scratch.path());
        let store = ImageStore::new(config, backend, compressor)
            .unwrap()
            .with_target_dir(|prefix| format!("{prefix}/2024/01"));
        Self {
            store,
            objects,
            scratch,
            uploads,
        }
    }

    /// Writes a small PNG into the upload directory and returns its path.
    pub fn png_upload(&self, name: &str) -> PathBuf {
        let path = self.uploads.path().join(name);
        sample_image().save_with_format(&path, image::ImageFormat::Png).unwrap();
        path
    }

    pub fn raw_upload(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.uploads.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    pub fn scratch_is_empty(&self) -> bool {
        scratch_entries(self.scratch.path()) == 0
    }
}

pub fn scratch_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

pub fn sample_image() -> RgbImage {
    RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 128]))
}

/// Delegates to a memory store but rejects every upload.
pub struct FailingPuts(pub Arc<MemoryStorage>);

#[async_trait::async_trait]
impl ObjectStore for FailingPuts {
    async fn put_object(&self, key: &str, _: Bytes, _: &PutOptions) -> Result<(), StoreError> {
        Err(StoreError::backend(key, std::io::Error::other("access denied")))
    }

    async fn head_object(&self, key: &str) -> Result<(), StoreError> {
        self.0.head_object(key).await
    }

    async fn get_object(&self, key: &str) -> Result<ObjectStream, StoreError> {
        self.0.get_object(key).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.0.delete_object(key).await
    }
}

/// Lets a rival writer claim the first `races` keys between the existence
/// check and the upload.
pub struct RacingWriter {
    pub inner: Arc<MemoryStorage>,
    pub races: AtomicUsize,
}

#[async_trait::async_trait]
impl ObjectStore for RacingWriter {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<(), StoreError> {
        let remaining = self.races.load(Ordering::SeqCst);
        if remaining > 0 {
            self.races.store(remaining - 1, Ordering::SeqCst);
            self.inner.insert(key, "rival").await;
        }
        self.inner.put_object(key, body, options).await
    }

    async fn head_object(&self, key: &str) -> Result<(), StoreError> {
        self.inner.head_object(key).await
    }

    async fn get_object(&self, key: &str) -> Result<ObjectStream, StoreError> {
        self.inner.get_object(key).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete_object(key).await
    }
}

/// Claims success but never writes the file it reports.
pub struct VanishingCompressor;

#[async_trait::async_trait]
impl Compressor for VanishingCompressor {
    async fn compress(
        &self,
        _source: &Path,
        output_dir: &Path,
        _options: &CompressionOptions,
    ) -> Result<PathBuf, CompressionError> {
        Ok(output_dir.join("gone.png"))
    }
}
