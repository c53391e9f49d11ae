use std::str::FromStr;

use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolCall;
use thiserror::Error;

use crate::lifecycle::{self, ConfirmationPolicy, LifecycleError};
use crate::receipt::{Outcome, Receipt};
use crate::rpc::{NodeClient, NodeError};
use crate::store::{AddressStore, StoreError};
use crate::tx_builder::{self, TxError};

sol! {
	/// Minimal counter: one storage slot, a getter and an incrementer.
	interface ICounter {
		function count() external view returns (uint256);
		function increment() external;
	}
}

/// Gas for creating the counter (init code is tiny).
pub const DEPLOY_GAS_LIMIT: u64 = 200_000;
/// Gas for one `increment()` call.
pub const INCREMENT_GAS_LIMIT: u64 = 100_000;

// -- Bytecode --

mod op {
	pub const STOP: u8 = 0x00;
	pub const ADD: u8 = 0x01;
	pub const EQ: u8 = 0x14;
	pub const SHR: u8 = 0x1c;
	pub const CALLDATALOAD: u8 = 0x35;
	pub const CODECOPY: u8 = 0x39;
	pub const MSTORE: u8 = 0x52;
	pub const SLOAD: u8 = 0x54;
	pub const SSTORE: u8 = 0x55;
	pub const JUMPI: u8 = 0x57;
	pub const JUMPDEST: u8 = 0x5b;
	pub const PUSH1: u8 = 0x60;
	pub const PUSH4: u8 = 0x63;
	pub const DUP1: u8 = 0x80;
	pub const RETURN: u8 = 0xf3;
	pub const REVERT: u8 = 0xfd;
}

/// Length of the selector dispatch prologue in [`counter_runtime`].
const DISPATCH_LEN: u8 = 30;
/// Length of the `count()` body.
const COUNT_BODY_LEN: u8 = 12;

/// Runtime code of the counter, dispatching on the `ICounter` selectors.
/// Slot 0 holds the count.
pub fn counter_runtime() -> Vec<u8> {
	use op::*;

	let count_dest = DISPATCH_LEN;
	let increment_dest = DISPATCH_LEN + COUNT_BODY_LEN;

	let mut code = vec![PUSH1, 0x00, CALLDATALOAD, PUSH1, 0xe0, SHR];
	for (selector, dest) in [
		(ICounter::countCall::SELECTOR, count_dest),
		(ICounter::incrementCall::SELECTOR, increment_dest),
	] {
		code.extend([DUP1, PUSH4]);
		code.extend(selector);
		code.extend([EQ, PUSH1, dest, JUMPI]);
	}
	// Unknown selector.
	code.extend([PUSH1, 0x00, DUP1, REVERT]);
	debug_assert_eq!(code.len(), usize::from(DISPATCH_LEN));

	// count(): return slot 0.
	code.extend([
		JUMPDEST, PUSH1, 0x00, SLOAD, PUSH1, 0x00, MSTORE, PUSH1, 0x20, PUSH1, 0x00, RETURN,
	]);
	debug_assert_eq!(code.len(), usize::from(increment_dest));

	// increment(): slot 0 += 1.
	code.extend([
		JUMPDEST, PUSH1, 0x00, SLOAD, PUSH1, 0x01, ADD, PUSH1, 0x00, SSTORE, STOP,
	]);
	code
}

/// Creation code: copy the runtime into memory and return it.
pub fn counter_init_code() -> Bytes {
	use op::*;

	const HEADER_LEN: u8 = 11;
	let runtime = counter_runtime();
	let runtime_len = u8::try_from(runtime.len()).unwrap_or(u8::MAX);

	let mut code = vec![
		PUSH1, runtime_len, DUP1, PUSH1, HEADER_LEN, PUSH1, 0x00, CODECOPY, PUSH1, 0x00, RETURN,
	];
	debug_assert_eq!(code.len(), usize::from(HEADER_LEN));
	code.extend(runtime);
	code.into()
}

// -- Methods --

/// The counter methods callable from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMethod {
	/// Read-only; answered by `eth_call`.
	Count,
	/// State-changing; sent as a transaction.
	Increment,
}

impl CounterMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Count => "count",
			Self::Increment => "increment",
		}
	}

	fn calldata(&self) -> Bytes {
		match self {
			Self::Count => ICounter::countCall {}.abi_encode().into(),
			Self::Increment => ICounter::incrementCall {}.abi_encode().into(),
		}
	}
}

impl FromStr for CounterMethod {
	type Err = ContractError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"count" => Ok(Self::Count),
			"increment" => Ok(Self::Increment),
			_ => Err(ContractError::UnsupportedMethod(s.to_owned())),
		}
	}
}

/// Result of [`ContractService::call`].
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
	Count(U256),
	Incremented(Receipt),
}

#[derive(Debug, Error)]
pub enum ContractError {
	#[error("unsupported contract method {0:?} (expected 'count' or 'increment')")]
	UnsupportedMethod(String),
	#[error("no contract deployed yet; run `contracts deploy` first")]
	NotDeployed,
	#[error("{0} sends a transaction and needs PRIVATE_KEY")]
	NoSigner(&'static str),
	#[error("deployment {0} was mined but reported no contract address")]
	NoContractCreated(alloy::primitives::TxHash),
	#[error("unexpected return data from count(): {0}")]
	BadReturnData(Bytes),
	#[error(transparent)]
	Node(#[from] NodeError),
	#[error(transparent)]
	Tx(#[from] TxError),
	#[error(transparent)]
	Lifecycle(#[from] LifecycleError),
	#[error(transparent)]
	Store(#[from] StoreError),
}

// -- Service --

/// Deploys and drives the counter contract, remembering its address in
/// an [`AddressStore`] across invocations.
pub struct ContractService<N: NodeClient> {
	node: N,
	/// Only deployments and `increment()` sign; reads work without a key.
	signer: Option<PrivateKeySigner>,
	store: AddressStore,
	policy: ConfirmationPolicy,
	address: Option<Address>,
}

impl<N: NodeClient> ContractService<N> {
	/// Open the service, loading a previously deployed address if any.
	pub fn open(
		node: N,
		signer: Option<PrivateKeySigner>,
		store: AddressStore,
		policy: ConfirmationPolicy,
	) -> Result<Self, ContractError> {
		let address = store.load()?;
		if let Some(addr) = address {
			tracing::info!(address = %addr, path = %store.path().display(), "Loaded deployed contract");
		}
		Ok(Self {
			node,
			signer,
			store,
			policy,
			address,
		})
	}

	pub fn address(&self) -> Option<Address> {
		self.address
	}

	/// Deploy the counter unless one is already known and `force` is off,
	/// in which case the cached address is returned without touching the
	/// node.
	pub async fn deploy(&mut self, force: bool) -> Result<Address, ContractError> {
		if let (Some(addr), false) = (self.address, force) {
			tracing::info!(address = %addr, "Contract already deployed; pass --redeploy to replace it");
			return Ok(addr);
		}

		tracing::info!("Deploying counter contract");
		let sender = self.signer("deploy")?.address();
		let nonce = self.node.pending_nonce(sender).await?;
		let gas_price = self.node.gas_price().await?;
		let chain_id = self.node.chain_id().await?;

		let request = tx_builder::build_deployment(
			sender,
			counter_init_code(),
			DEPLOY_GAS_LIMIT,
			gas_price,
			nonce,
		);
		let receipt = self.submit(request, chain_id).await?;

		match lifecycle::interpret(&receipt)? {
			Outcome::Deployed(addr) => {
				if !receipt.success {
					tracing::warn!(address = %addr, "Deployment reported failure status but created a contract");
				}
				tracing::info!(address = %addr, "Counter deployed");
				self.address = Some(addr);
				Ok(addr)
			}
			Outcome::Succeeded => Err(ContractError::NoContractCreated(receipt.transaction_hash)),
		}
	}

	/// Invoke `method` on the deployed counter.
	///
	/// Method names are checked before any network access. Reads go
	/// through `eth_call` and never wait for confirmation.
	pub async fn call(&mut self, method: &str) -> Result<CallResult, ContractError> {
		let method: CounterMethod = method.parse()?;
		let address = self.address.ok_or(ContractError::NotDeployed)?;
		tracing::debug!(method = method.as_str(), address = %address, "Calling counter");

		match method {
			CounterMethod::Count => {
				let data = self.node.call(address, method.calldata()).await?;
				if data.len() < 32 {
					return Err(ContractError::BadReturnData(data));
				}
				let value = U256::from_be_slice(&data[..32]);
				tracing::info!(address = %address, count = %value, "Read counter");
				Ok(CallResult::Count(value))
			}
			CounterMethod::Increment => {
				tracing::info!(address = %address, "Calling increment()");
				let sender = self.signer(method.as_str())?.address();
				let nonce = self.node.pending_nonce(sender).await?;
				let gas_price = self.node.gas_price().await?;
				let chain_id = self.node.chain_id().await?;

				let request = tx_builder::build_call(
					sender,
					address,
					method.calldata(),
					INCREMENT_GAS_LIMIT,
					gas_price,
					nonce,
				);
				let receipt = self.submit(request, chain_id).await?;
				lifecycle::interpret(&receipt)?;
				Ok(CallResult::Incremented(receipt))
			}
		}
	}

	/// Persist the known address, then release the node connection.
	pub fn close(self) -> Result<(), ContractError> {
		let Self {
			node, store, address, ..
		} = self;
		if let Some(addr) = address {
			store.save(&addr)?;
			tracing::debug!(address = %addr, path = %store.path().display(), "Saved contract address");
		}
		drop(node);
		Ok(())
	}

	fn signer(&self, action: &'static str) -> Result<&PrivateKeySigner, ContractError> {
		self.signer.as_ref().ok_or(ContractError::NoSigner(action))
	}

	async fn submit(
		&self,
		request: tx_builder::TransactionRequest,
		chain_id: u64,
	) -> Result<Receipt, ContractError> {
		let signed = tx_builder::sign(request, chain_id, self.signer("transaction")?)?;
		let hash = self.node.send_raw_transaction(&signed).await?;
		tracing::info!(tx_hash = %hash, "Transaction broadcast");
		Ok(lifecycle::await_confirmation(&self.node, hash, &self.policy).await?)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::{Arc, Mutex};
	use std::time::Duration;

	use alloy::primitives::{address, TxHash};
	use async_trait::async_trait;

	use super::*;
	use crate::receipt;
	use crate::rpc::{BlockSummary, TransactionStatus};
	use crate::tx_builder::SignedTransaction;

	const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const DEPLOYED: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
	const CACHED: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");

	#[derive(Default)]
	struct Calls {
		broadcasts: AtomicUsize,
		polls: AtomicUsize,
		reads: AtomicUsize,
		other: AtomicUsize,
	}

	/// Mines every broadcast immediately. Deployments yield `DEPLOYED`.
	struct FakeNode {
		calls: Arc<Calls>,
		last: Mutex<Option<SignedTransaction>>,
		deploy_success: bool,
		count: U256,
	}

	impl FakeNode {
		fn new(calls: Arc<Calls>) -> Self {
			Self {
				calls,
				last: Mutex::new(None),
				deploy_success: true,
				count: U256::from(41u64),
			}
		}
	}

	#[async_trait]
	impl NodeClient for FakeNode {
		async fn block_by_number(&self, _: u64) -> Result<BlockSummary, NodeError> {
			unreachable!()
		}
		async fn pending_nonce(&self, _: Address) -> Result<u64, NodeError> {
			self.calls.other.fetch_add(1, Ordering::SeqCst);
			Ok(3)
		}
		async fn gas_price(&self) -> Result<u128, NodeError> {
			self.calls.other.fetch_add(1, Ordering::SeqCst);
			Ok(1_000_000_000)
		}
		async fn chain_id(&self) -> Result<u64, NodeError> {
			self.calls.other.fetch_add(1, Ordering::SeqCst);
			Ok(11_155_111)
		}
		async fn transaction_status(&self, _: TxHash) -> Result<TransactionStatus, NodeError> {
			self.calls.polls.fetch_add(1, Ordering::SeqCst);
			Ok(TransactionStatus::Mined)
		}
		async fn transaction_receipt(&self, hash: TxHash) -> Result<Receipt, NodeError> {
			let last = self.last.lock().unwrap();
			let tx = last.as_ref().expect("receipt before broadcast");
			assert_eq!(tx.hash, hash);
			Ok(match tx.request.recipient {
				None => receipt::sample(hash, self.deploy_success, Some(DEPLOYED)),
				Some(_) => receipt::sample(hash, true, None),
			})
		}
		async fn send_raw_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, NodeError> {
			self.calls.broadcasts.fetch_add(1, Ordering::SeqCst);
			*self.last.lock().unwrap() = Some(tx.clone());
			Ok(tx.hash)
		}
		async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, NodeError> {
			self.calls.reads.fetch_add(1, Ordering::SeqCst);
			assert_eq!(data.as_ref(), ICounter::countCall::SELECTOR.as_slice());
			assert!(!to.is_zero());
			Ok(self.count.to_be_bytes::<32>().to_vec().into())
		}
	}

	fn policy() -> ConfirmationPolicy {
		ConfirmationPolicy {
			max_attempts: 3,
			poll_interval: Duration::from_millis(10),
		}
	}

	fn service(
		node: FakeNode,
		dir: &tempfile::TempDir,
		cached: Option<Address>,
	) -> ContractService<FakeNode> {
		let store = AddressStore::at(dir.path().join("addr"));
		if let Some(addr) = cached {
			store.save(&addr).unwrap();
		}
		ContractService::open(node, Some(DEV_KEY.parse().unwrap()), store, policy()).unwrap()
	}

	fn keyless_service(
		node: FakeNode,
		dir: &tempfile::TempDir,
		cached: Option<Address>,
	) -> ContractService<FakeNode> {
		let store = AddressStore::at(dir.path().join("addr"));
		if let Some(addr) = cached {
			store.save(&addr).unwrap();
		}
		ContractService::open(node, None, store, policy()).unwrap()
	}

	#[test]
	fn runtime_layout() {
		let code = counter_runtime();
		assert_eq!(code.len(), 53);
		assert_eq!(code[usize::from(DISPATCH_LEN)], op::JUMPDEST);
		assert_eq!(code[usize::from(DISPATCH_LEN + COUNT_BODY_LEN)], op::JUMPDEST);
		assert_eq!(&code[8..12], ICounter::countCall::SELECTOR.as_slice());
		assert_eq!(&code[18..22], ICounter::incrementCall::SELECTOR.as_slice());
	}

	#[test]
	fn init_code_returns_runtime() {
		let init = counter_init_code();
		let runtime = counter_runtime();
		assert_eq!(init.len(), 11 + runtime.len());
		assert_eq!(init[1] as usize, runtime.len());
		assert_eq!(init[4], 11);
		assert_eq!(&init[11..], runtime.as_slice());
	}

	#[test]
	fn method_names_are_case_insensitive() {
		assert_eq!("Count".parse::<CounterMethod>().unwrap(), CounterMethod::Count);
		assert_eq!(
			" INCREMENT ".parse::<CounterMethod>().unwrap(),
			CounterMethod::Increment
		);
		assert!(matches!(
			"reset".parse::<CounterMethod>(),
			Err(ContractError::UnsupportedMethod(_))
		));
	}

	#[tokio::test]
	async fn deploy_is_a_noop_when_cached() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let mut svc = service(FakeNode::new(calls.clone()), &dir, Some(CACHED));

		assert_eq!(svc.deploy(false).await.unwrap(), CACHED);
		assert_eq!(svc.deploy(false).await.unwrap(), CACHED);

		assert_eq!(calls.broadcasts.load(Ordering::SeqCst), 0);
		assert_eq!(calls.other.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn first_deploy_then_cached() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let mut svc = service(FakeNode::new(calls.clone()), &dir, None);

		assert_eq!(svc.deploy(false).await.unwrap(), DEPLOYED);
		assert_eq!(svc.deploy(false).await.unwrap(), DEPLOYED);
		assert_eq!(calls.broadcasts.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn forced_redeploy_always_broadcasts_and_persists() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let mut svc = service(FakeNode::new(calls.clone()), &dir, Some(CACHED));

		assert_eq!(svc.deploy(true).await.unwrap(), DEPLOYED);
		assert_eq!(svc.deploy(true).await.unwrap(), DEPLOYED);
		assert_eq!(calls.broadcasts.load(Ordering::SeqCst), 2);

		svc.close().unwrap();
		let store = AddressStore::at(dir.path().join("addr"));
		assert_eq!(store.load().unwrap(), Some(DEPLOYED));
	}

	#[tokio::test]
	async fn deployment_with_failed_status_still_yields_address() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let mut node = FakeNode::new(calls.clone());
		node.deploy_success = false;
		let mut svc = service(node, &dir, None);

		assert_eq!(svc.deploy(false).await.unwrap(), DEPLOYED);
		assert_eq!(svc.address(), Some(DEPLOYED));
	}

	#[tokio::test]
	async fn count_never_touches_the_lifecycle() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let mut svc = service(FakeNode::new(calls.clone()), &dir, Some(CACHED));

		let result = svc.call("count").await.unwrap();

		assert_eq!(result, CallResult::Count(U256::from(41u64)));
		assert_eq!(calls.reads.load(Ordering::SeqCst), 1);
		assert_eq!(calls.broadcasts.load(Ordering::SeqCst), 0);
		assert_eq!(calls.polls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn increment_goes_through_confirmation() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let mut svc = service(FakeNode::new(calls.clone()), &dir, Some(CACHED));

		let result = svc.call("increment").await.unwrap();

		assert!(matches!(result, CallResult::Incremented(r) if r.success));
		assert_eq!(calls.broadcasts.load(Ordering::SeqCst), 1);
		assert_eq!(calls.polls.load(Ordering::SeqCst), 1);
		assert_eq!(calls.reads.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn unknown_method_makes_no_network_call() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let mut svc = service(FakeNode::new(calls.clone()), &dir, Some(CACHED));

		let err = svc.call("unknown").await.unwrap_err();

		assert!(matches!(err, ContractError::UnsupportedMethod(m) if m == "unknown"));
		assert_eq!(calls.reads.load(Ordering::SeqCst), 0);
		assert_eq!(calls.broadcasts.load(Ordering::SeqCst), 0);
		assert_eq!(calls.other.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn count_needs_no_key() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let mut svc = keyless_service(FakeNode::new(calls.clone()), &dir, Some(CACHED));

		let result = svc.call("count").await.unwrap();

		assert_eq!(result, CallResult::Count(U256::from(41u64)));
		assert_eq!(calls.reads.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn signing_paths_without_key_fail_before_the_node() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let mut svc = keyless_service(FakeNode::new(calls.clone()), &dir, Some(CACHED));

		assert!(matches!(
			svc.call("increment").await,
			Err(ContractError::NoSigner("increment"))
		));
		assert!(matches!(
			svc.deploy(true).await,
			Err(ContractError::NoSigner("deploy"))
		));
		// A cached deploy is answered from the store and needs no key.
		assert_eq!(svc.deploy(false).await.unwrap(), CACHED);

		assert_eq!(calls.other.load(Ordering::SeqCst), 0);
		assert_eq!(calls.broadcasts.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn call_without_deployment_fails() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let mut svc = service(FakeNode::new(calls.clone()), &dir, None);

		assert!(matches!(
			svc.call("count").await,
			Err(ContractError::NotDeployed)
		));
	}

	#[tokio::test]
	async fn close_without_address_writes_nothing() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(Calls::default());
		let svc = service(FakeNode::new(calls), &dir, None);
		svc.close().unwrap();
		assert!(!dir.path().join("addr").exists());
	}
}
