use std::path::{Path, PathBuf};

use crate::config::QualityRange;
use crate::error::CompressionError;

pub mod image_compressor;

pub use image_compressor::ImageCompressor;

#[derive(Clone, Debug, Default)]
pub struct CompressionOptions {
    /// Declared mime type of the source, e.g. `image/jpeg`.
    pub mime_type: Option<String>,
    pub quality: QualityRange,
}

/// Shrinks an image file into `output_dir` and returns the path it wrote.
///
/// The source is never modified. The output keeps the source's file name,
/// so callers should hand every compression its own directory.
#[async_trait::async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(
        &self,
        source: &Path,
        output_dir: &Path,
        options: &CompressionOptions,
    ) -> Result<PathBuf, CompressionError>;
}
