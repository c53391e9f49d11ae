use anyhow::{Context, Result};

use crate::cli::Cli;
use crate::commands::{connect, load_settings, print_json};
use crate::display;
use crate::rpc::NodeClient;

pub async fn run(cli: &Cli, id: u64) -> Result<()> {
	let settings = load_settings(cli)?;
	let node = connect(cli, &settings).await?;

	let block = node
		.block_by_number(id)
		.await
		.with_context(|| format!("failed to fetch block {id}"))?;

	if cli.json {
		print_json(&block)
	} else {
		println!("{}", display::format_block(&block));
		Ok(())
	}
}
