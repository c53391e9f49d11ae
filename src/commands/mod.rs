pub mod blocks;
pub mod contract;
pub mod env;
pub mod transfer;
pub mod tx;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::Cli;
use crate::config::{EnvConfig, Settings};
use crate::rpc::{RpcClient, TransportConfig};

/// Load the env file selected by the CLI and derive settings from it.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
	let env = EnvConfig::load(cli.env_file.as_deref())?;
	tracing::info!(path = %env.path().display(), "Using env file");
	Ok(Settings::from_env(&env)?)
}

/// Endpoint and proxy, with CLI flags taking precedence over the env file.
pub fn resolve_transport(cli: &Cli, settings: &Settings) -> TransportConfig {
	let mut transport = settings.transport(cli.ws);
	if let Some(url) = &cli.rpc_url {
		transport.url = url.clone();
	}
	if cli.proxy.is_some() {
		transport = transport.with_proxy(cli.proxy.clone());
	}
	transport
}

pub async fn connect(cli: &Cli, settings: &Settings) -> Result<RpcClient> {
	let transport = resolve_transport(cli, settings);
	let client = RpcClient::connect(&transport)
		.await
		.context("failed to connect to node")?;
	tracing::info!(endpoint = %client.endpoint(), "Using node");
	Ok(client)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;
	use crate::config::EnvConfig;

	fn settings() -> (tempfile::TempDir, Settings) {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join(".env");
		std::fs::write(
			&path,
			"RPC_URL=https://node.example/v3/<API_KEY>\nAPI_KEY=k\nPROXY_URL=socks5://127.0.0.1:1080\n",
		)
		.unwrap();
		let settings = Settings::from_env(&EnvConfig::from_file(&path).unwrap()).unwrap();
		(dir, settings)
	}

	#[test]
	fn env_file_values_are_used_by_default() {
		let (_dir, settings) = settings();
		let cli = Cli::try_parse_from(["eth-task", "blocks", "--id", "1"]).unwrap();
		let t = resolve_transport(&cli, &settings);
		assert_eq!(t.url, "https://node.example/v3/k");
		assert_eq!(t.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
	}

	#[test]
	fn ws_drops_env_proxy_but_keeps_explicit_one() {
		let (_dir, settings) = settings();

		let cli = Cli::try_parse_from(["eth-task", "--ws", "blocks", "--id", "1"]).unwrap();
		assert_eq!(resolve_transport(&cli, &settings).proxy, None);

		let cli = Cli::try_parse_from([
			"eth-task",
			"--ws",
			"--proxy",
			"socks5://127.0.0.1:9050",
			"blocks",
			"--id",
			"1",
		])
		.unwrap();
		let t = resolve_transport(&cli, &settings);
		assert!(t.is_websocket());
		assert_eq!(t.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
	}

	#[test]
	fn flags_override_env_file() {
		let (_dir, settings) = settings();
		let cli = Cli::try_parse_from([
			"eth-task",
			"--rpc-url",
			"http://localhost:8545",
			"--proxy",
			"",
			"blocks",
			"--id",
			"1",
		])
		.unwrap();
		let t = resolve_transport(&cli, &settings);
		assert_eq!(t.url, "http://localhost:8545");
		assert_eq!(t.proxy, None);
	}
}
