// rest/mod.rs — Public REST API server.
//
// Axum HTTP server; bind address and port come from config.
//
// Endpoints:
//   POST /wrestling_bot
//   GET  /health

pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("wrestling bot API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // Chat relay
        .route("/wrestling_bot", post(routes::chat::wrestling_bot))
        // Health (no auth)
        .route("/health", get(routes::health::health))
        .with_state(ctx)
}
