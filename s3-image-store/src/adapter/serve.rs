use std::fmt;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};

use crate::error::StoreError;
use crate::storage::paths::strip_leading_slash;
use crate::storage::{ObjectStore, ObjectStream};

/// Where a serve was when it failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServePhase {
    /// The GET itself was rejected (missing key, auth, connection).
    Requesting,
    /// The store answered but the body broke off.
    StreamingBody,
}

impl fmt::Display for ServePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServePhase::Requesting => f.write_str("requesting"),
            ServePhase::StreamingBody => f.write_str("streaming-body"),
        }
    }
}

/// Pass-through proxy from the request path to a streamed GET.
///
/// The store's headers are copied onto the response and the body is
/// forwarded chunk by chunk. The first chunk is awaited before the response
/// is committed, so a failure up to that point still falls through to
/// `next` with status 404. Later failures can only be logged; the body is
/// cut short.
pub async fn proxy(store: &dyn ObjectStore, req: Request, next: Next) -> Response {
    let key = strip_leading_slash(req.uri().path()).to_string();

    let ObjectStream { headers, mut body } = match store.get_object(&key).await {
        Ok(object) => object,
        Err(err) => return fall_through(&key, ServePhase::Requesting, &err, req, next).await,
    };

    let first = match body.next().await {
        Some(Ok(chunk)) => Some(chunk),
        Some(Err(err)) => {
            return fall_through(&key, ServePhase::StreamingBody, &err, req, next).await;
        }
        None => None,
    };

    let stream_key = key.clone();
    let rest = body.inspect_err(move |err| {
        tracing::error!(
            key = %stream_key,
            phase = %ServePhase::StreamingBody,
            "object stream failed after response started: {err}"
        );
    });
    let stream = futures::stream::iter(first.map(Ok::<Bytes, StoreError>)).chain(rest);

    let mut response = Response::new(Body::from_stream(stream));
    *response.headers_mut() = headers;
    response
}

async fn fall_through(
    key: &str,
    phase: ServePhase,
    err: &StoreError,
    req: Request,
    next: Next,
) -> Response {
    tracing::error!(%key, %phase, "failed to serve object: {err}");
    let mut response = next.run(req).await;
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}
