use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};

use crate::compressor::{CompressionOptions, Compressor};
use crate::error::CompressionError;

/// Re-encodes JPEG and PNG images with tighter settings and copies every
/// other format through untouched.
///
/// JPEGs are written at the upper bound of the quality range. PNGs are
/// re-deflated losslessly with the best compression level. Whenever the
/// re-encoded image comes out larger than the source, the source bytes are
/// kept.
#[derive(Debug, Default)]
pub struct ImageCompressor;

impl ImageCompressor {
    fn output_path(source: &Path, output_dir: &Path) -> PathBuf {
        let file_name = source
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "image".into());
        output_dir.join(file_name)
    }

    /// The content decides; the declared mime type only covers bytes that
    /// carry no recognizable signature.
    fn detect_format(data: &[u8], mime_type: Option<&str>) -> Option<ImageFormat> {
        image::guess_format(data)
            .ok()
            .or_else(|| mime_type.and_then(ImageFormat::from_mime_type))
    }

    fn encode_jpeg(data: &[u8], quality: u8) -> Result<Vec<u8>, CompressionError> {
        let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
        // JPEG carries no alpha; anything but plain grayscale goes out as RGB
        let img = match img {
            DynamicImage::ImageLuma8(_) => img,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };

        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        img.write_with_encoder(encoder)?;
        Ok(out)
    }

    fn encode_png(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let img = image::load_from_memory_with_format(data, ImageFormat::Png)?;

        let mut out = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
        img.write_with_encoder(encoder)?;
        Ok(out)
    }

    fn compress_file(
        source: &Path,
        output: &Path,
        options: &CompressionOptions,
    ) -> Result<PathBuf, CompressionError> {
        let original = fs::read(source).map_err(|source_err| CompressionError::Source {
            path: source.to_path_buf(),
            source: source_err,
        })?;

        let encoded = match Self::detect_format(&original, options.mime_type.as_deref()) {
            Some(ImageFormat::Jpeg) => Some(Self::encode_jpeg(&original, options.quality.max)?),
            Some(ImageFormat::Png) => Some(Self::encode_png(&original)?),
            _ => None,
        };

        let bytes = match encoded {
            Some(encoded) if encoded.len() < original.len() => {
                tracing::debug!(
                    source = %source.display(),
                    before = original.len(),
                    after = encoded.len(),
                    "image recompressed"
                );
                encoded
            }
            _ => original,
        };

        fs::write(output, &bytes)?;
        Ok(output.to_path_buf())
    }
}

#[async_trait::async_trait]
impl Compressor for ImageCompressor {
    async fn compress(
        &self,
        source: &Path,
        output_dir: &Path,
        options: &CompressionOptions,
    ) -> Result<PathBuf, CompressionError> {
        let source = source.to_path_buf();
        let output = Self::output_path(&source, output_dir);
        let options = options.clone();

        // decoding and encoding are CPU bound
        tokio::task::spawn_blocking(move || Self::compress_file(&source, &output, &options))
            .await?
    }
}
