use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

pub const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_API_BASE_URL: &str = "https://api.mistral.ai";
const DEFAULT_MODEL: &str = "mistral-large-latest";
const DEFAULT_SLOW_QUERY_MS: u64 = 100;

// ─── ConfigError ──────────────────────────────────────────────────────────────

/// Fatal configuration problems. The daemon refuses to start on any of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The upstream credential is mandatory — without it every relay request
    /// would fail, so startup aborts instead.
    #[error("MISTRAL_API_KEY env variable not set (and no `api_key` in config.toml)")]
    MissingApiKey,
}

// ─── TomlConfig ───────────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// HTTP server port (default: 8000).
    port: Option<u16>,
    /// Bind address (default: "0.0.0.0"; use "127.0.0.1" for loopback-only).
    bind_address: Option<String>,
    /// Upstream API key. The MISTRAL_API_KEY env var takes priority.
    api_key: Option<String>,
    /// Override the upstream API base URL (default: https://api.mistral.ai).
    api_base_url: Option<String>,
    /// Chat-completion model ID (default: mistral-large-latest).
    model: Option<String>,
    /// Log SQLite queries slower than this many milliseconds; 0 disables (default: 100).
    slow_query_ms: Option<u64>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── RelayConfig ──────────────────────────────────────────────────────────────

/// Immutable daemon configuration, resolved once at startup.
///
/// Log level and format are handled separately in `main` — the tracing
/// subscriber has to exist before this struct is built.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Bind address for the HTTP server (RINGSIDE_BIND env var, default: "0.0.0.0").
    pub bind_address: String,
    /// Upstream bearer credential (MISTRAL_API_KEY env var). Required.
    pub api_key: String,
    /// Upstream API base URL (RINGSIDE_API_URL env var, default: https://api.mistral.ai).
    pub api_base_url: String,
    /// Chat-completion model ID sent with every upstream request.
    pub model: String,
    /// Slow-query log threshold in milliseconds (0 = disabled).
    pub slow_query_ms: u64,
}

impl RelayConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    ///
    /// Fails with [`ConfigError::MissingApiKey`] when no upstream credential
    /// is found in either layer — the process must not start without one.
    pub fn new(port: Option<u16>, data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);

        let bind_address = std::env::var("RINGSIDE_BIND")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.bind_address)
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let api_key = resolve_api_key(
            std::env::var("MISTRAL_API_KEY").ok(),
            toml.api_key,
        )?;

        let api_base_url = std::env::var("RINGSIDE_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let model = toml.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let slow_query_ms = toml.slow_query_ms.unwrap_or(DEFAULT_SLOW_QUERY_MS);

        Ok(Self {
            port,
            data_dir,
            bind_address,
            api_key,
            api_base_url,
            model,
            slow_query_ms,
        })
    }
}

/// Pick the upstream credential: env var first, TOML fallback. Blank values
/// count as unset.
fn resolve_api_key(
    env_key: Option<String>,
    toml_key: Option<String>,
) -> Result<String, ConfigError> {
    env_key
        .filter(|k| !k.trim().is_empty())
        .or(toml_key.filter(|k| !k.trim().is_empty()))
        .ok_or(ConfigError::MissingApiKey)
}

/// Platform data directory: `~/Library/Application Support/ringside` on
/// macOS, `$XDG_DATA_HOME/ringside` (or `~/.local/share/ringside`) on Linux,
/// `%APPDATA%\ringside` on Windows. `.ringside` in the working directory when
/// no home can be resolved.
fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join("Library/Application Support/ringside");
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("ringside");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/share/ringside");
        }
    }
    #[cfg(target_os = "windows")]
    if let Ok(appdata) = std::env::var("APPDATA") {
        return PathBuf::from(appdata).join("ringside");
    }
    PathBuf::from(".ringside")
}
