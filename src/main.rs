//! Relay Gateway - SMS and voice call relay controller for a GSM modem.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use clap::Parser;
use relay_gateway as app;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::config::{ConfigLoadResult, GatewayConfig, LoggingConfig};
use app::gateway::GatewayState;
use app::service::GatewayService;

/// SMS and voice call relay controller for a GSM modem.
#[derive(Parser)]
#[command(name = "relay-gateway")]
struct Cli {
    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use config.toml from current directory (dev mode)
    #[arg(long)]
    dev: bool,

    /// Forget every enrolled commander before starting
    #[arg(long)]
    reset_commanders: bool,

    /// Print a default config to stdout and exit
    #[arg(long)]
    print_config: bool,
}

fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = || EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter()).init();
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", toml::to_string_pretty(&GatewayConfig::default())?);
        return Ok(());
    }

    // Determine config path based on mode
    let config_path = match (&cli.config, cli.dev) {
        (Some(path), _) => path.clone(),
        (None, true) => PathBuf::from("config.toml"),
        (None, false) => GatewayConfig::default_path(),
    };

    let config = match GatewayConfig::try_load(&config_path) {
        ConfigLoadResult::Loaded(config) => config,
        ConfigLoadResult::Missing => {
            anyhow::bail!(
                "Config file {:?} not found; create one with --print-config",
                config_path
            )
        }
        ConfigLoadResult::Invalid(e) => {
            return Err(e).with_context(|| format!("Config file {config_path:?} is invalid"));
        }
    };

    let _guard = init_logging(&config.logging);
    tracing::info!("Relay gateway starting...");
    tracing::info!("Config path: {:?}", config_path);

    let service = GatewayService::new(config);
    if cli.reset_commanders {
        service.reset_commanders().context("Failed to reset commanders")?;
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let cancel = Arc::new(AtomicBool::new(false));
    let state = rt.block_on(service.run(cancel))?;

    if state == GatewayState::Halted {
        anyhow::bail!("Gateway halted; check the modem and SIM card");
    }
    Ok(())
}
