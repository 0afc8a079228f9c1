use anyhow::{Context as _, Result};
use clap::Parser;
use ringside::{
    config::RelayConfig, gateway::CompletionGateway, rest, storage::Storage, AppContext,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "ringside",
    about = "Ringside — always-on persona chat relay daemon",
    version
)]
struct Args {
    /// HTTP server port
    #[arg(long, env = "RINGSIDE_PORT")]
    port: Option<u16>,

    /// Data directory for config and the SQLite database
    #[arg(long, env = "RINGSIDE_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RINGSIDE_LOG")]
    log: Option<String>,

    /// Log output format: "compact" (human-readable) or "json" (structured)
    #[arg(long, env = "RINGSIDE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "RINGSIDE_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Init once — must happen before any tracing calls.
    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format = args.log_format.as_deref().unwrap_or("compact").to_owned();
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    run_server(args.port, args.data_dir).await
}

/// Install the tracing subscriber once, before anything logs.
///
/// With `--log-file` the output is duplicated to a daily-rolling file; the
/// returned `WorkerGuard` must stay alive so buffered lines flush on exit.
/// `log_format` is `"compact"` (default, human-readable) or `"json"`
/// (structured, for log aggregators). A bad log path degrades to
/// stdout-only with a warning rather than aborting startup.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let json = log_format == "json";
    let stdout_only = || {
        if json {
            tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        } else {
            tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        }
    };

    let Some(path) = log_file else {
        stdout_only();
        return None;
    };

    let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let filename = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("ringside.log"));

    // tracing-appender opens the file lazily; the directory has to exist first.
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!(
            "warn: could not create log directory '{}': {e} — logging to stdout only",
            dir.display()
        );
        stdout_only();
        return None;
    }

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, filename));

    if json {
        tracing_subscriber::registry()
            .with(EnvFilter::new(log_level))
            .with(fmt::layer().json())
            .with(fmt::layer().json().with_writer(file_writer))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(EnvFilter::new(log_level))
            .with(fmt::layer().compact())
            .with(fmt::layer().with_writer(file_writer))
            .init();
    }

    Some(guard)
}

async fn run_server(port: Option<u16>, data_dir: Option<std::path::PathBuf>) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "ringside starting");

    let config =
        Arc::new(RelayConfig::new(port, data_dir).context("failed to load configuration")?);
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        model = %config.model,
        "config loaded"
    );

    let storage =
        Arc::new(Storage::new_with_slow_query(&config.data_dir, config.slow_query_ms).await?);

    let gateway = Arc::new(
        CompletionGateway::new(&config).context("failed to build upstream HTTP client")?,
    );

    let ctx = Arc::new(AppContext {
        config: config.clone(),
        storage,
        gateway,
        started_at: std::time::Instant::now(),
    });

    rest::start_rest_server(ctx).await
}
