use std::sync::Arc;

use clap::Parser;
use s3_image_store::api;
use s3_image_store::utils::cli::Args;
use s3_image_store::utils::state::AppState;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    validate_args(&args).await?;

    let config = args.store_config();
    tracing::info!(
        bucket = config.bucket(),
        region = config.region(),
        host = %config.host(),
        storage = %args.storage,
        "starting asset server"
    );
    let state = Arc::new(AppState::new(config, &args.storage, &args.root).await?);

    let app = api::create_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", args.host, args.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down...");
}

async fn validate_args(args: &Args) -> anyhow::Result<()> {
    let mut validation_errors = Vec::new();

    match args.storage.as_str() {
        "S3" | "MEMORY" => {}
        "FILESYSTEM" => match tokio::fs::metadata(&args.root).await {
            Ok(meta) if !meta.is_dir() => validation_errors.push(format!(
                "ASSET_SERVER_ROOTDIR `{}` exists but is not a directory",
                args.root,
            )),
            Ok(_) => {}
            Err(_) => validation_errors.push(format!(
                "ASSET_SERVER_ROOTDIR `{}` does not exist.",
                args.root,
            )),
        },
        other => validation_errors.push(format!(
            "ASSET_SERVER_STORAGE `{other}` is not one of S3, FILESYSTEM, MEMORY"
        )),
    }

    if args.access_key_id.is_some() != args.secret_access_key.is_some() {
        validation_errors.push(
            "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together".to_string(),
        );
    }
    if args.access_key_id.is_none() && args.storage == "S3" {
        tracing::warn!("S3_ACCESS_KEY_ID is not set. Using the default AWS credential chain");
    }

    if !validation_errors.is_empty() {
        anyhow::bail!("{}", validation_errors.join("\n"));
    }
    Ok(())
}
