use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use log_replication::{cli::Cli, shell, system::ReplicationSystem};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    // Stay quiet by default so engine logs don't bury the prompt.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let system = ReplicationSystem::new(cli.system_config())
        .context("failed to start replication system")?;

    if cli.no_chaos {
        info!("failure simulator disabled");
    } else {
        system
            .start_failure_simulator(
                cli.failure_probability,
                cli.recovery_probability,
                cli.interval,
            )
            .context("failed to start failure simulator")?;
    }

    println!(
        "Replication system ready: 1 master, {} followers. Type HELP for commands.",
        system.followers().len()
    );

    let result = shell::run(&system, io::stdin().lock(), io::stdout().lock());
    system.shutdown();
    result
}
