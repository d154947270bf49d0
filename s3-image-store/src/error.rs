use std::io;
use std::path::PathBuf;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures reported by an [`ObjectStore`](crate::storage::ObjectStore) driver.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    // A conditional write lost against an object that already holds the key.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("object store request for `{key}` failed: {source}")]
    Backend {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn backend(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("failed to read source image {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to re-encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to write compressed image: {0}")]
    Io(#[from] io::Error),

    #[error("compression task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("existence check for `{key}` failed: {source}")]
    Lookup {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("no free key for `{name}` in `{directory}` after {attempts} attempts")]
    Exhausted {
        name: String,
        directory: String,
        attempts: u32,
    },
}

/// Failure of a `save`, tagged with the stage that failed.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("failed to prepare scratch directory: {0}")]
    Scratch(#[source] io::Error),

    #[error("compression failed: {0}")]
    Compression(#[from] CompressionError),

    #[error("key resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("failed to read compressed artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("upload of `{key}` failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bucket must not be empty")]
    MissingBucket,

    #[error("region must not be empty")]
    MissingRegion,

    #[error("access key id and secret access key must be set together")]
    PartialCredentials,

    #[error("invalid quality range {min}-{max}")]
    InvalidQuality { min: u8, max: u8 },

    #[error("max resolve attempts must be at least 1")]
    ZeroAttempts,
}

/// Errors surfaced by the HTTP API of the standalone server.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Axum error: {0}")]
    AxumError(#[from] axum::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Generating response for AppError: {:?}", self);

        let (status_code, code, message) = match &self {
            Self::NotFound(what) => (StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found")),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            Self::Save(SaveError::Compression(err)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNSUPPORTED_IMAGE",
                err.to_string(),
            ),
            Self::Save(SaveError::Upload { .. }) | Self::Save(SaveError::Resolution(_)) => (
                StatusCode::BAD_GATEWAY,
                "STORE_UNAVAILABLE",
                "object store request failed".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "an internal server error occurred".to_string(),
            ),
        };

        let body = json!({ "errors": [{ "code": code, "message": message }] });
        (status_code, Json(body)).into_response()
    }
}
