use alloy::primitives::Address;
use anyhow::{Context, Result};

use crate::cli::Cli;
use crate::commands::{connect, load_settings, print_json};
use crate::crypto;
use crate::display;
use crate::lifecycle;
use crate::rpc::NodeClient;
use crate::tx_builder::{self, TRANSFER_GAS_LIMIT};

pub async fn run(cli: &Cli, to: &str, amount: i64, digits: u32) -> Result<()> {
	let recipient: Address = to
		.parse()
		.with_context(|| format!("invalid recipient address: {to}"))?;
	let value = tx_builder::to_wei(amount, digits)?;

	let settings = load_settings(cli)?;
	let signer = crypto::load_signer(settings.private_key()?)?;
	let sender = signer.address();

	tracing::info!(
		from = %sender,
		to = %recipient,
		value = %display::format_value(value),
		"Preparing transfer"
	);

	let node = connect(cli, &settings).await?;
	let nonce = node.pending_nonce(sender).await?;
	let gas_price = node.gas_price().await?;
	let chain_id = node.chain_id().await?;
	tracing::debug!(nonce, gas_price, chain_id, "Fetched transaction parameters");

	let request = tx_builder::build_transaction(
		sender,
		recipient,
		value,
		TRANSFER_GAS_LIMIT,
		gas_price,
		nonce,
	);
	let signed = tx_builder::sign(request, chain_id, &signer)?;
	let hash = node.send_raw_transaction(&signed).await?;
	tracing::info!(tx_hash = %hash, "Transaction broadcast");

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
