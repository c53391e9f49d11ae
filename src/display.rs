use std::fmt::Write;

use alloy::primitives::{utils::format_ether, TxHash, U256};
use chrono::DateTime;

use crate::receipt::{Outcome, Receipt};
use crate::rpc::{BlockSummary, TransactionStatus};

pub fn format_block(block: &BlockSummary) -> String {
	let time = i64::try_from(block.timestamp)
		.ok()
		.and_then(|ts| DateTime::from_timestamp(ts, 0))
		.map(|dt| format!(" ({})", dt.to_rfc3339()))
		.unwrap_or_default();

	let mut out = String::new();
	let _ = writeln!(out, "Block:        {}", block.number);
	let _ = writeln!(out, "Hash:         {}", block.hash);
	let _ = writeln!(out, "Timestamp:    {}{time}", block.timestamp);
	let _ = write!(out, "Transactions: {}", block.transaction_count);
	out
}

pub fn format_receipt(receipt: &Receipt) -> String {
	let mut out = String::new();
	let _ = writeln!(out, "Transaction:  {}", receipt.transaction_hash);
	let _ = writeln!(
		out,
		"Status:       {}",
		if receipt.success { "success" } else { "failed" }
	);
	let _ = writeln!(out, "Block hash:   {}", receipt.block_hash);
	let _ = writeln!(out, "Block:        {}", receipt.block_number);
	let _ = writeln!(out, "Index:        {}", receipt.transaction_index);
	if let Some(addr) = receipt.created_contract() {
		let _ = writeln!(out, "Contract:     {addr}");
	}
	let _ = write!(out, "Logs:         {}", receipt.logs.len());
	for (i, log) in receipt.logs.iter().enumerate() {
		let _ = write!(
			out,
			"\n  [{i}] {} topics={} data={}",
			log.address(),
			log.topics().len(),
			log.data().data
		);
	}
	out
}

pub fn format_outcome(outcome: &Outcome) -> String {
	match outcome {
		Outcome::Succeeded => "Transaction succeeded".to_owned(),
		Outcome::Deployed(addr) => format!("Contract deployed at {addr}"),
	}
}

pub fn format_status(hash: &TxHash, status: TransactionStatus) -> String {
	let label = match status {
		TransactionStatus::Pending => "pending",
		TransactionStatus::Mined => "mined",
		TransactionStatus::NotFound => "not found",
	};
	format!("Transaction:  {hash}\nStatus:       {label}")
}

/// `wei` with an approximate ether figure, e.g. `1000 wei (~0.000000000000001 ETH)`.
pub fn format_value(wei: U256) -> String {
	format!("{wei} wei (~{} ETH)", format_ether(wei))
}
