use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use video_upload_backend::{
    build_router, cleanup, config::Config, models::AppState, system_info,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; RUST_LOG wins over the default filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("video_upload_backend=debug,tower_http=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration; invalid settings abort startup
    let config = Config::load().context("failed to load configuration")?;
    let state = Arc::new(AppState::new(config.clone()));

    // Ensure directories exist
    state.pipeline.storage().ensure_dirs().await?;

    match cleanup::sweep_stale_temp_files(&config.compressed_dir).await {
        Ok(0) => {}
        Ok(removed) => info!("[cleanup] 🧹 Removed {} stale temporary files", removed),
        Err(e) => warn!("[cleanup] Failed to sweep {:?}: {}", config.compressed_dir, e),
    }

    system_info::print_startup_info(&config, state.pipeline.runner()).await;

    if config.limits.retention_secs > 0 {
        cleanup::Retention::new(&config, state.pipeline.storage().in_flight().clone())
            .spawn(Duration::from_secs(config.limits.cleanup_interval_secs));
    }

    let app = build_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    info!("🚀 Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("✅ Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }

    info!("Shutting down gracefully...");
}
