//! httpconnect - forward a local port through an HTTP CONNECT proxy
//!
//! Every connection accepted on the local port is tunnelled to one fixed
//! target via `CONNECT <target> HTTP/1.1`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use std::io::IsTerminal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

use httpconnect::{config::ConfigManager, Config, ConnectionManager, HostPort, ShutdownCoordinator};

/// CLI arguments for httpconnect
#[derive(Parser, Debug)]
#[command(name = "httpconnect")]
#[command(about = "Forward a local port to a fixed target through an HTTP CONNECT proxy")]
#[command(version)]
#[command(long_about = "
Forward a local port to a fixed target through an HTTP CONNECT proxy.

Each client accepted on <LISTEN_PORT> gets its own connection to <PROXY>,
which is asked to CONNECT to <TARGET>. Once the proxy answers 200, bytes are
copied unchanged in both directions until both sides are done.

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file ([server] table)
3. Built-in defaults

RUST_LOG overrides --log-level when set.
")]
pub struct CliArgs {
    /// Upstream proxy as host:port
    #[arg(value_name = "PROXY")]
    pub proxy: String,

    /// Tunnel target as host:port
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Local port to listen on
    #[arg(value_name = "LISTEN_PORT")]
    pub listen_port: u16,

    /// Configuration file path
    #[arg(short, long, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    /// Bind address (overrides config file)
    #[arg(short, long, help = "Local address to bind (default 127.0.0.1)")]
    pub bind: Option<String>,

    /// Maximum number of concurrent sessions
    #[arg(long, help = "Maximum number of concurrent sessions (default unbounded)")]
    pub max_sessions: Option<usize>,

    /// Proxy connect timeout, e.g. 10s
    #[arg(long, help = "Proxy connect timeout (e.g. 10s, 500ms)")]
    pub connect_timeout: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, help = "Log level")]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize tracing before anything that logs
    let filter_handle = init_tracing(&args)?;

    let proxy: HostPort = match args.proxy.parse() {
        Ok(proxy) => proxy,
        Err(e) => {
            eprintln!("Bad proxy: {}", e);
            return Ok(());
        }
    };
    let target: HostPort = match args.target.parse() {
        Ok(target) => target,
        Err(e) => {
            eprintln!("Bad target: {}", e);
            return Ok(());
        }
    };

    let mut config = Config::new(proxy, target, args.listen_port);
    if let Some(path) = &args.config {
        config.server = ConfigManager::load_from_file(path)?;
    }
    config.merge_with_cli_args(
        args.bind.as_deref(),
        args.max_sessions,
        args.connect_timeout.as_deref(),
        args.log_level.as_deref(),
    )?;

    config
        .validate()
        .context("Final configuration validation failed")?;

    if let Some(handle) = filter_handle {
        handle
            .reload(EnvFilter::new(&config.server.log_level))
            .context("Failed to apply configured log level")?;
    }

    if args.validate_config {
        info!("Configuration is valid");
        info!("  Proxy: {}", config.proxy);
        info!("  Target: {}", config.target);
        info!("  Listen address: {}", config.listen_addr());
        info!(
            "  Max sessions: {}",
            config
                .server
                .max_sessions
                .map(|m| m.to_string())
                .unwrap_or_else(|| "unbounded".to_string())
        );
        info!("  Copy buffer: {} bytes", config.server.copy_buffer_size);
        info!("  Handshake buffer: {} bytes", config.server.handshake_buffer_size);
        return Ok(());
    }

    info!(
        "Starting httpconnect v{}: {} -> {} via {}",
        env!("CARGO_PKG_VERSION"),
        config.listen_addr(),
        config.target,
        config.proxy
    );

    let manager = ConnectionManager::bind(Arc::new(config)).await?;
    let shutdown = ShutdownCoordinator::new();
    let shutdown_rx = shutdown.subscribe();

    let server_handle = tokio::spawn(async move { manager.run_until_shutdown(shutdown_rx).await });

    tokio::select! {
        result = server_handle => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Server error: {:#}", e);
                    return Err(e);
                }
                Err(e) => {
                    error!("Server task failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        result = shutdown.listen_for_signals() => {
            if let Err(e) = result {
                error!("Error setting up signal handlers: {}", e);
            }
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging.
///
/// `RUST_LOG` wins over `--verbose`, which wins over `--log-level`. When none
/// of them is given the filter starts at `info` and the returned handle lets
/// the config file's `log_level` replace it once the file has been read.
fn init_tracing(args: &CliArgs) -> Result<Option<reload::Handle<EnvFilter, Registry>>> {
    let cli_level = if args.verbose {
        Some("debug")
    } else {
        args.log_level.as_deref()
    };

    let (env_filter, from_file) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, false),
        Err(_) => (EnvFilter::new(cli_level.unwrap_or("info")), cli_level.is_none()),
    };
    let (filter_layer, handle) = reload::Layer::new(env_filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(std::io::stdout().is_terminal()),
        )
        .init();

    Ok(from_file.then_some(handle))
}
