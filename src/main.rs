use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use submerge::{logging, server, Config};

#[derive(Parser, Debug)]
#[command(name = "submerge", about = "Serve merged proxy subscriptions")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = "submerge.toml")]
    config: PathBuf,

    /// Address to listen on (overrides config and LISTEN_ADDR)
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` controls the filter (default `info`). With a log file the
/// output goes through a daily-rotating, non-blocking appender without ANSI
/// colours; otherwise to stderr. The returned guard flushes the appender on
/// drop and must live as long as `main`.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let Some(path) = log_file else {
        builder.init();
        return Ok(None);
    };

    let appender = logging::rolling_file(path)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    builder.with_ansi(false).with_writer(writer).init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // A missing .env is normal in production
    let dotenv = dotenvy::dotenv().ok();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    config
        .apply_env()
        .context("Invalid environment configuration")?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen.to_string();
    }
    config.validate().context("Invalid configuration")?;

    let _log_guard = init_tracing(config.log_file.as_deref())?;

    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }
    tracing::info!(config = ?config, "Starting submerge");

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    server::serve(Arc::new(config), listener)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
