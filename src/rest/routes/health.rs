// rest/routes/health.rs — GET /health liveness probe.

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppContext;

/// Unauthenticated liveness probe. Reports the crate version, the configured
/// completion model, and seconds since startup.
pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": ctx.config.model,
        "uptime_secs": ctx.started_at.elapsed().as_secs(),
    }))
}
