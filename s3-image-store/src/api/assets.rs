use std::io;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{self, HeaderMap, LOCATION};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;

use crate::adapter::UploadRequest;
use crate::error::AppError;
use crate::utils::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub name: String,
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub dir: Option<String>,
}

/// POST /api/v1/assets?name=<file>&dir=<dir>
pub async fn upload_asset_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    request: Request,
) -> Result<impl IntoResponse, AppError> {
    if params.name.trim().is_empty() {
        return Err(AppError::BadRequest("file name must not be empty".to_string()));
    }
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("Content-Type header is required".to_string()))?;

    tokio::fs::create_dir_all(&state.upload_dir).await?;
    let spool = tempfile::Builder::new()
        .prefix("upload-")
        .tempfile_in(&state.upload_dir)?;

    // Convert the stream into an `AsyncRead`.
    let body_with_io_error = request.into_body().into_data_stream().map_err(io::Error::other);
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file_writer = BufWriter::new(File::create(spool.path()).await?);
    let written = tokio::io::copy(&mut body_reader, &mut file_writer).await?;
    file_writer.flush().await?;
    if written == 0 {
        return Err(AppError::BadRequest("upload body is empty".to_string()));
    }

    let mut upload = UploadRequest::new(spool.path(), params.name, mime_type);
    upload.target_dir = params.dir;
    let url = state.store.save(upload).await?;

    Ok((
        StatusCode::CREATED,
        [(LOCATION, url.clone())],
        Json(json!({ "url": url })),
    ))
}

/// HEAD /api/v1/assets/<key>
pub async fn head_asset_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if state.store.exists(&key).await {
        Ok(StatusCode::OK)
    } else {
        Err(AppError::NotFound(key))
    }
}

/// DELETE /api/v1/assets/<file>?dir=<dir>
pub async fn delete_asset_handler(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, AppError> {
    if state.store.delete(&file_name, params.dir.as_deref()).await {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(AppError::NotFound(file_name))
    }
}
