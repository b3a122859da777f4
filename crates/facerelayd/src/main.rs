use anyhow::{Context, Result};
use facerelay_backends::{FsBlobStore, VisionClient};
use facerelay_core::{BlobStore, FaceDetector, MemoryBlobStore};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod server;

use config::Config;
use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facerelayd starting");

    let config = Config::load()?;

    let detector = VisionClient::new(
        &config.vision_endpoint,
        &config.vision_api_key,
        Duration::from_secs(config.vision_timeout_secs),
        config.max_faces,
    )?;

    if config.ephemeral_storage {
        tracing::warn!("FACERELAY_EPHEMERAL_STORAGE set; blobs are lost on restart");
        serve(config, detector, MemoryBlobStore::new()).await
    } else {
        let store = FsBlobStore::open(&config.storage_dir)
            .await
            .with_context(|| format!("opening blob store at {}", config.storage_dir.display()))?;
        serve(config, detector, store).await
    }
}

async fn serve<D: FaceDetector, S: BlobStore>(config: Config, detector: D, store: S) -> Result<()> {
    let state = Arc::new(AppState { detector, store });
    let app = server::router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;

    tracing::info!(addr = %config.listen_addr, "facerelayd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facerelayd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
