use anyhow::Result;
use serde_json::json;

use crate::cli::{Cli, ContractCommand};
use crate::commands::{connect, load_settings, print_json};
use crate::contracts::{CallResult, ContractService, CounterMethod};
use crate::crypto;
use crate::display;
use crate::rpc::{NodeClient, RpcClient};
use crate::store::AddressStore;

enum Action {
	Deploy { redeploy: bool },
	Call(CounterMethod),
}

pub async fn run(cli: &Cli, cmd: &ContractCommand) -> Result<()> {
	// Reject unknown methods before touching config or the network.
	let (path, action) = match cmd {
		ContractCommand::Deploy { path, redeploy } => (path, Action::Deploy { redeploy: *redeploy }),
		ContractCommand::Call { path, method } => (path, Action::Call(method.parse()?)),
	};
	let store = AddressStore::new(path)?;

	let settings = load_settings(cli)?;
	let signer = match action {
		Action::Call(CounterMethod::Count) => None,
		_ => Some(crypto::load_signer(settings.private_key()?)?),
	};
	let node = connect(cli, &settings).await?;
	let mut service = ContractService::open(node, signer, store, settings.confirmation)?;

	let result = match action {
		Action::Deploy { redeploy } => deploy(cli, &mut service, redeploy).await,
		Action::Call(method) => call(cli, &mut service, method).await,
	};

	finish(service, result)
}

/// Persist whatever address we ended up with, even after a failed call.
/// A save failure is only reported when it would not mask `result`.
fn finish<N: NodeClient>(service: ContractService<N>, result: Result<()>) -> Result<()> {
	if let Err(err) = service.close() {
		if result.is_ok() {
			return Err(err.into());
		}
		tracing::error!(error = %err, "Failed to save contract address");
	}
	result
}

async fn deploy(
	cli: &Cli,
	service: &mut ContractService<RpcClient>,
	redeploy: bool,
) -> Result<()> {
	let address = service.deploy(redeploy).await?;
	if cli.json {
		print_json(&json!({ "address": address }))
	} else {
		println!("Counter contract: {address}");
		Ok(())
	}
}

async fn call(
	cli: &Cli,
	service: &mut ContractService<RpcClient>,
	method: CounterMethod,
) -> Result<()> {
	match service.call(method.as_str()).await? {
		CallResult::Count(value) => {
			if cli.json {
				print_json(&json!({ "count": value.to_string() }))?;
			} else {
				println!("count() = {value}");
			}
		}
		CallResult::Incremented(receipt) => {
			if cli.json {
				print_json(&receipt)?;
			} else {
				println!("{}", display::format_receipt(&receipt));
				println!("increment() confirmed");
			}
		}
	}
	Ok(())
}
