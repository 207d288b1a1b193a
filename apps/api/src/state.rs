use std::sync::Arc;

use sqlx::PgPool;

use crate::llm_client::ModelClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// The AI model client behind a trait object so tests can swap in a stub.
    pub model: Arc<dyn ModelClient>,
}
