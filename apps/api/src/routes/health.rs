use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::db;
use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and a database probe.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let database = if db::ping(&state.db).await { "up" } else { "down" };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "nutriscan-api",
        "database": database
    }))
}
