use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_TEMPLATE_OUTPUT;
use crate::store::DEFAULT_ADDRESS_FILE;

#[derive(Parser)]
#[command(
	name = "eth-task",
	about = "Query Sepolia blocks, send ether and drive a counter contract.",
	version
)]
pub struct Cli {
	/// Env file to load instead of searching for `.env`.
	#[arg(short = 'e', long, global = true)]
	pub env_file: Option<PathBuf>,

	/// Log verbosity. `RUST_LOG` takes precedence when set.
	#[arg(long, default_value = "info", global = true)]
	pub log_level: LogLevel,

	/// Connect through the WebSocket endpoint instead of HTTP.
	#[arg(long, global = true)]
	pub ws: bool,

	/// Override the node endpoint URL.
	#[arg(long, global = true)]
	pub rpc_url: Option<String>,

	/// Override the forward proxy (HTTP endpoints only).
	#[arg(long, global = true)]
	pub proxy: Option<String>,

	/// Print results as JSON.
	#[arg(long, global = true)]
	pub json: bool,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
	Error,
	Warn,
	Info,
	Debug,
	Trace,
}

impl LogLevel {
	pub fn as_str(&self) -> &str {
		match self {
			Self::Error => "error",
			Self::Warn => "warn",
			Self::Info => "info",
			Self::Debug => "debug",
			Self::Trace => "trace",
		}
	}
}

#[derive(Subcommand)]
pub enum Command {
	/// Show a block by number.
	Blocks {
		/// Block number.
		#[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
		id: u64,
	},

	/// Send ether and wait for confirmation.
	Transfer {
		/// Recipient address (0x-prefixed).
		#[arg(long)]
		to: String,

		/// Integer amount, scaled by 10^digits to get wei.
		#[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
		amount: i64,

		/// Decimal places applied to the amount (18 = whole ether).
		#[arg(long)]
		digits: u32,
	},

	/// Deploy and call the counter contract.
	Contracts {
		#[command(subcommand)]
		command: ContractCommand,
	},

	/// Inspect or wait for a broadcast transaction.
	Tx {
		#[command(subcommand)]
		command: TxCommand,
	},

	/// Write a `.env` template.
	EnvTemplate {
		/// Output path.
		#[arg(long, default_value = DEFAULT_TEMPLATE_OUTPUT)]
		output: PathBuf,
	},
}

// -- Contract subcommands --

#[derive(Subcommand)]
pub enum ContractCommand {
	/// Deploy the counter unless one is already recorded.
	Deploy {
		/// Deploy a fresh contract even if one is recorded.
		#[arg(long)]
		redeploy: bool,

		/// File holding the deployed contract address.
		#[arg(long, default_value = DEFAULT_ADDRESS_FILE)]
		path: String,
	},

	/// Call a counter method.
	Call {
		/// Method name: `count` or `increment`.
		#[arg(long)]
		method: String,

		/// File holding the deployed contract address.
		#[arg(long, default_value = DEFAULT_ADDRESS_FILE)]
		path: String,
	},
}

// -- Tx subcommands --

#[derive(Subcommand)]
pub enum TxCommand {
	/// Show whether a transaction is pending, mined or unknown.
	Status {
		/// Transaction hash (0x-prefixed).
		tx_hash: String,
	},

	/// Wait for a transaction to be mined and print its receipt.
	Wait {
		/// Transaction hash (0x-prefixed).
		tx_hash: String,
	},
}
