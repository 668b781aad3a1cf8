use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::services::storage::UPLOADS_PREFIX;

pub mod detect;
pub mod health;
pub mod metrics;

/// Client-facing routes plus the read-only asset directory.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let uploads = ServeDir::new(state.assets.root());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/upload", post(detect::submit_detection))
        .route("/video-result/{video_id}", get(detect::get_detection_result))
        .route("/api/videos/user", get(detect::list_owner_detections))
        .nest_service(UPLOADS_PREFIX, uploads)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}
