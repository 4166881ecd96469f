use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use etcdenv::{EngineBuilder, EngineConfig, EngineError, Outcome};

/// Run a command with its environment sourced from etcd namespaces.
#[derive(Debug, Parser)]
#[command(name = "etcdenv", version, about)]
struct Cli {
    /// Namespaces to read, in precedence order.
    #[arg(
        short = 'n',
        long = "namespace",
        env = "ETCDENV_NAMESPACES",
        value_delimiter = ',',
        default_value = "/environments/production"
    )]
    namespaces: Vec<String>,

    /// etcd endpoints, tried in order.
    #[arg(
        short = 's',
        long = "server",
        env = "ETCDENV_SERVERS",
        value_delimiter = ',',
        default_value = "http://127.0.0.1:4001"
    )]
    servers: Vec<String>,

    /// What to do when the command exits: keepalive, restart or exit.
    #[arg(short = 'b', long = "shutdown-behaviour", default_value = "exit")]
    shutdown_behaviour: String,

    /// Only restart when one of these variables changes.
    #[arg(short = 'w', long = "watched", value_delimiter = ',')]
    watched: Vec<String>,

    /// Seconds between SIGTERM and SIGKILL when stopping the command.
    #[arg(long, default_value_t = 10)]
    grace: u64,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Command to run, after `--`.
    #[arg(last = true, required = true)]
    command: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("etcdenv=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn config(cli: Cli) -> Result<EngineConfig, EngineError> {
    let mut cfg = EngineConfig::new(
        cli.namespaces,
        cli.servers,
        cli.command,
        &cli.shutdown_behaviour,
        cli.watched,
    )?;
    cfg.grace = Duration::from_secs(cli.grace);
    Ok(cfg)
}

async fn run(cfg: EngineConfig) -> anyhow::Result<Outcome> {
    let engine = EngineBuilder::new(cfg).build()?;
    let shutdown = CancellationToken::new();
    let signals = etcdenv::cancel_on_signal(shutdown.clone());

    let outcome = engine.run(shutdown.clone()).await;
    shutdown.cancel();
    join_signal_task(signals).await;
    Ok(outcome?)
}

/// Waits for the signal task to wind down; a panic or abort there is logged, not fatal.
async fn join_signal_task(signals: JoinHandle<()>) -> bool {
    match signals.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "signal listener aborted");
            false
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let cfg = match config(cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::from(2);
        }
    };
    tracing::info!(
        namespaces = ?cfg.namespaces,
        endpoints = ?cfg.endpoints,
        shutdown = %cfg.shutdown,
        "starting etcdenv"
    );

    match run(cfg).await {
        Ok(outcome) => {
            tracing::info!(?outcome, "etcdenv finished");
            ExitCode::from(u8::try_from(outcome.exit_code()).unwrap_or(1))
        }
        Err(e) => {
            let code = match e.downcast_ref::<EngineError>() {
                Some(EngineError::InvalidConfiguration { .. }) => 2,
                _ => 1,
            };
            tracing::error!(error = %format!("{e:#}"), "etcdenv failed");
            ExitCode::from(code)
        }
    }
}
