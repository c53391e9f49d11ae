use alloy::primitives::TxHash;
use anyhow::{Context, Result};
use serde_json::json;

use crate::cli::{Cli, TxCommand};
use crate::commands::{connect, load_settings, print_json};
use crate::display;
use crate::lifecycle;
use crate::rpc::NodeClient;

pub async fn run(cli: &Cli, cmd: &TxCommand) -> Result<()> {
	let settings = load_settings(cli)?;
	let node = connect(cli, &settings).await?;

	match cmd {
		TxCommand::Status { tx_hash } => {
			let hash = parse_hash(tx_hash)?;
			let status = node.transaction_status(hash).await?;
			if cli.json {
				print_json(&json!({ "hash": hash, "status": format!("{status:?}") }))
			} else {
				println!("{}", display::format_status(&hash, status));
				Ok(())
			}
		}
		TxCommand::Wait { tx_hash } => {
			let hash = parse_hash(tx_hash)?;
			let receipt = lifecycle::await_confirmation(&node, hash, &settings.confirmation).await?;
			if cli.json {
				print_json(&receipt)?;
			} else {
				println!("{}", display::format_receipt(&receipt));
			}
			let outcome = lifecycle::interpret(&receipt)?;
			if !cli.json {
				println!("{}", display::format_outcome(&outcome));
			}
			Ok(())
		}
	}
}

fn parse_hash(s: &str) -> Result<TxHash> {
	s.trim()
		.parse()
		.with_context(|| format!("invalid transaction hash: {s}"))
}
