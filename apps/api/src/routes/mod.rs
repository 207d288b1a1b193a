pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::extract::MAX_UPLOAD_BYTES;
use crate::receipt::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/receipts/upload", post(handlers::handle_upload))
        .route("/api/v1/receipts", get(handlers::handle_list_receipts))
        .route("/api/v1/receipts/:id", get(handlers::handle_get_receipt))
        .route("/api/v1/receipts/:id/verify", post(handlers::handle_verify))
        .route(
            "/api/v1/profile/summary",
            get(handlers::handle_profile_summary),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
