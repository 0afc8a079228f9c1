pub mod config;
pub mod context;
pub mod gateway;
pub mod memory;
pub mod rest;
pub mod storage;

use std::sync::Arc;

use config::RelayConfig;
use gateway::CompletionGateway;
use storage::Storage;

/// Shared application state passed to every REST handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<RelayConfig>,
    pub storage: Arc<Storage>,
    /// Upstream chat-completions client (built once, connection pool reused).
    pub gateway: Arc<CompletionGateway>,
    pub started_at: std::time::Instant,
}
