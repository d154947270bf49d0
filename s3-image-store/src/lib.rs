//! S3-backed image storage for a content-management host.
//!
//! Uploaded images are recompressed, given a collision-free key under a
//! configurable path prefix, and written to a bucket with public-read access
//! and a 30-day cache lifetime. Reads are proxied straight from the bucket.
//!
//! The host plugs in through [`AssetStore`]; [`ImageStore`] is the
//! implementation, parameterised over any [`ObjectStore`] driver and
//! [`Compressor`].

pub mod adapter;
pub mod api;
pub mod compressor;
pub mod config;
pub mod error;
pub mod storage;
pub mod utils;

pub use adapter::{AssetStore, ImageStore, TargetDirFn, UploadRequest};
pub use compressor::{CompressionOptions, Compressor, ImageCompressor};
pub use config::{QualityRange, StoreConfig};
pub use error::{CompressionError, ConfigError, ResolutionError, SaveError, StoreError};
pub use storage::{ObjectStore, ObjectStream, PutOptions, StorageKey};
