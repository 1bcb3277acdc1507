use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /
/// Plain-text liveness line for uptime probes and the RChilli console.
pub async fn liveness_handler() -> &'static str {
    "RChilli to Vincere webhook is running"
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "mode": state.config.mode.as_str(),
    }))
}
