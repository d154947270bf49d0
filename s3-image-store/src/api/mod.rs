pub mod assets;

use std::sync::Arc;

use axum::Router;
use axum::extract::{OriginalUri, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{head, post};

use crate::api::assets::{delete_asset_handler, head_asset_handler, upload_asset_handler};
use crate::error::AppError;
use crate::utils::state::AppState;

/// Mount point of the serve proxy; the rest of the path is the object key.
pub const CONTENT_PATH: &str = "/content/images";

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(CONTENT_PATH, content_router(state.clone()))
        .nest("/api/v1", assets_router())
        .with_state(state)
}

fn assets_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assets", post(upload_asset_handler))
        .route(
            "/assets/{*key}",
            head(head_asset_handler).delete(delete_asset_handler),
        )
}

// Every read under the mount point goes through the proxy first; only
// misses reach the fallback.
fn content_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .fallback(asset_not_found)
        .layer(middleware::from_fn_with_state(state, serve_asset))
}

async fn serve_asset(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    state.store.serve(req, next).await
}

async fn asset_not_found(OriginalUri(uri): OriginalUri) -> Response {
    AppError::NotFound(uri.path().to_string()).into_response()
}
