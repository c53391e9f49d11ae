use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use eth_task_cli::cli::{Cli, Command};
use eth_task_cli::commands;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	init_tracing(cli.log_level.as_str());

	if let Err(err) = run(&cli).await {
		tracing::error!("{err:#}");
		std::process::exit(1);
	}
}

fn init_tracing(log_level: &str) {
	fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
		)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

async fn run(cli: &Cli) -> Result<()> {
	match &cli.command {
		Command::Blocks { id } => commands::blocks::run(cli, *id).await,
		Command::Transfer { to, amount, digits } => {
			commands::transfer::run(cli, to, *amount, *digits).await
		}
		Command::Contracts { command } => commands::contract::run(cli, command).await,
		Command::Tx { command } => commands::tx::run(cli, command).await,
		Command::EnvTemplate { output } => commands::env::run(output),
	}
}
