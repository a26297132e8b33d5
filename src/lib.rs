use std::sync::Arc;

use axum::{routing::post, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub mod cleanup;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod handlers;
pub mod metadata;
pub mod models;
pub mod naming;
pub mod pipeline;
pub mod process;
pub mod storage;
pub mod system_info;

use handlers::upload_handler;
use models::AppState;

pub const UPLOAD_ROUTE: &str = "/api/video/upload";

pub fn build_router(state: Arc<AppState>) -> Router {
    let compressed_dir = state.config.compressed_dir.clone();

    Router::new()
        .route(UPLOAD_ROUTE, post(upload_handler))
        .nest_service("/compressed", ServeDir::new(compressed_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
