mod config;
mod control;
mod extension;
mod launcher;
mod probe;
mod relay;
mod shutdown;
mod startup;
mod teardown;

use clap::Parser;
use config::{SupervisorConfig, REQUIRED_VARS};
use shutdown::ShutdownSignal;
use startup::StartupPlan;
use std::io::IsTerminal;
use std::net::{Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::time::Duration;

/// Supervisor for a devspaces container: starts Xvnc, fluxbox, selenium and
/// code-server, then tears them down on `/shutdown` or SIGINT/SIGTERM.
#[derive(Parser, Debug)]
#[command(name = "devspaces-init", version, about)]
pub struct Cli {
    /// Resolve configuration, print the startup plan and exit
    #[arg(long)]
    dry_run: bool,

    /// Debug-level logging (overrides RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    /// Seconds to let the control endpoint drain after shutdown is requested
    #[arg(long, default_value_t = 5)]
    drain_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("devspaces_init=debug,tower_http=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("devspaces_init=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = SupervisorConfig::from_env().inspect_err(|_| {
        tracing::info!("required environment: {}", REQUIRED_VARS.join(", "));
    })?;
    let plan = StartupPlan::from_config(&config);

    if cli.dry_run {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    tracing::info!("devspaces-init v{} starting", env!("CARGO_PKG_VERSION"));

    let signal = ShutdownSignal::new();
    let signals = shutdown::listen_for_signals(signal.clone())?;

    let children = startup::start(&plan).await;

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.api_port));
    let server = control::spawn(addr, signal.clone());

    let trigger = signal.wait().await;
    tracing::info!(trigger = ?trigger, "shutting down");

    let drain = Duration::from_secs(cli.drain_secs);
    if tokio::time::timeout(drain, server).await.is_err() {
        tracing::warn!(
            drain_secs = cli.drain_secs,
            "control endpoint still draining, continuing teardown"
        );
    }
    signals.abort();

    let records = teardown::stop_all(children).await;
    let reaped = records.iter().filter(|r| r.status.is_some()).count();
    let kill_failures = records.iter().filter(|r| r.attempted && !r.killed).count();
    tracing::info!(reaped, kill_failures, "bye bye");
    Ok(())
}
