use std::fmt;

use alloy::eips::BlockNumberOrTag;
use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, TxHash, B256};
use alloy::providers::{Provider, RootProvider, WsConnect};
use alloy::rpc::client::{ClientBuilder, RpcClient as AlloyRpcClient};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::transports::http::Http;
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::receipt::Receipt;
use crate::tx_builder::SignedTransaction;

/// Coarse category of a transport failure, as reported by the transport
/// layer itself rather than inferred from error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
	/// TCP connect / DNS resolution / TLS handshake failed.
	Connect,
	/// The request or connection timed out.
	Timeout,
	/// A persistent connection was closed underneath us.
	Closed,
	/// The endpoint answered with 5xx or 429.
	Unavailable,
	/// Anything the transport could not categorize.
	Other,
}

impl fmt::Display for TransportKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Connect => "connect",
			Self::Timeout => "timeout",
			Self::Closed => "closed",
			Self::Unavailable => "unavailable",
			Self::Other => "other",
		};
		f.write_str(s)
	}
}

/// Failures surfaced by a [`NodeClient`].
#[derive(Debug, Error)]
pub enum NodeError {
	/// The node could not be reached (or the connection dropped).
	#[error("transport error ({kind}): {message}")]
	Transport { kind: TransportKind, message: String },
	/// The node answered but holds no such data.
	#[error("not found: {0}")]
	NotFound(String),
	/// The node explicitly rejected the request (JSON-RPC error object).
	#[error("node rejected request: {0}")]
	Rejected(String),
	/// The node answered with something we could not make sense of.
	#[error("malformed node response: {0}")]
	Protocol(String),
}

impl NodeError {
	pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
		Self::Transport {
			kind,
			message: message.into(),
		}
	}
}

/// Inclusion state of a transaction as seen by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
	/// Known to the node, sitting in the mempool.
	Pending,
	/// Included in a block; a receipt should be available.
	Mined,
	/// The node does not know the hash (not propagated yet, or dropped).
	NotFound,
}

/// The handful of block fields the CLI reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
	pub number: u64,
	pub hash: B256,
	pub timestamp: u64,
	pub transaction_count: usize,
}

/// Primitive operations against a remote Ethereum node.
///
/// Everything above this trait (signing, confirmation polling, the
/// contract service) only talks to the node through it, so tests can
/// swap in a scripted stub.
#[async_trait]
pub trait NodeClient: Send + Sync {
	async fn block_by_number(&self, number: u64) -> Result<BlockSummary, NodeError>;

	/// Next nonce for `address`, counting transactions still in the mempool.
	async fn pending_nonce(&self, address: Address) -> Result<u64, NodeError>;

	async fn gas_price(&self) -> Result<u128, NodeError>;

	async fn chain_id(&self) -> Result<u64, NodeError>;

	async fn transaction_status(&self, hash: TxHash) -> Result<TransactionStatus, NodeError>;

	/// Receipt of a mined transaction; `NotFound` while it is not mined.
	async fn transaction_receipt(&self, hash: TxHash) -> Result<Receipt, NodeError>;

	/// Broadcast a signed transaction and return the hash the node reports.
	async fn send_raw_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, NodeError>;

	/// Execute a read-only call against the latest state.
	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, NodeError>;
}

/// Where and how to reach the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
	pub url: String,
	/// Optional forward proxy (`socks5://host:port` or `http://host:port`).
	/// Only supported for HTTP endpoints.
	pub proxy: Option<String>,
}

impl TransportConfig {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			proxy: None,
		}
	}

	pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
		self.proxy = proxy.filter(|p| !p.trim().is_empty());
		self
	}

	pub fn is_websocket(&self) -> bool {
		self.url.starts_with("ws://") || self.url.starts_with("wss://")
	}
}

/// [`NodeClient`] backed by an alloy provider over HTTP or WebSocket.
pub struct RpcClient {
	provider: RootProvider<Ethereum>,
	url: String,
}

impl RpcClient {
	/// Open a connection according to `config`.
	///
	/// HTTP clients are lazy (nothing is sent until the first request);
	/// WebSocket clients complete the handshake here.
	pub async fn connect(config: &TransportConfig) -> Result<Self, NodeError> {
		let client = if config.is_websocket() {
			if config.proxy.is_some() {
				return Err(NodeError::Protocol(
					"a forward proxy is only supported for http(s) endpoints".into(),
				));
			}
			ClientBuilder::default()
				.ws(WsConnect::new(config.url.clone()))
				.await
				.map_err(map_rpc_error)?
		} else {
			let url: reqwest::Url = config
				.url
				.parse()
				.map_err(|e| NodeError::Protocol(format!("invalid RPC URL: {e}")))?;
			let http = http_client(config.proxy.as_deref())?;
			AlloyRpcClient::new(Http::with_client(http, url), false)
		};

		tracing::debug!(url = %redact_url(&config.url), proxy = config.proxy.is_some(), "Connected to node");

		Ok(Self {
			provider: RootProvider::new(client),
			url: config.url.clone(),
		})
	}

	/// Endpoint with any path segments (API keys) stripped, for logs.
	pub fn endpoint(&self) -> String {
		redact_url(&self.url)
	}
}

#[async_trait]
impl NodeClient for RpcClient {
	async fn block_by_number(&self, number: u64) -> Result<BlockSummary, NodeError> {
		let block = self
			.provider
			.get_block_by_number(BlockNumberOrTag::Number(number))
			.await
			.map_err(map_rpc_error)?
			.ok_or_else(|| NodeError::NotFound(format!("block {number}")))?;

		Ok(BlockSummary {
			number: block.header.number,
			hash: block.header.hash,
			timestamp: block.header.timestamp,
			transaction_count: block.transactions.len(),
		})
	}

	async fn pending_nonce(&self, address: Address) -> Result<u64, NodeError> {
		self.provider
			.get_transaction_count(address)
			.pending()
			.await
			.map_err(map_rpc_error)
	}

	async fn gas_price(&self) -> Result<u128, NodeError> {
		self.provider.get_gas_price().await.map_err(map_rpc_error)
	}

	async fn chain_id(&self) -> Result<u64, NodeError> {
		self.provider.get_chain_id().await.map_err(map_rpc_error)
	}

	async fn transaction_status(&self, hash: TxHash) -> Result<TransactionStatus, NodeError> {
		let tx = self
			.provider
			.get_transaction_by_hash(hash)
			.await
			.map_err(map_rpc_error)?;

		Ok(match tx {
			None => TransactionStatus::NotFound,
			Some(tx) if tx.block_number.is_none() => TransactionStatus::Pending,
			Some(_) => TransactionStatus::Mined,
		})
	}

	async fn transaction_receipt(&self, hash: TxHash) -> Result<Receipt, NodeError> {
		let receipt = self
			.provider
			.get_transaction_receipt(hash)
			.await
			.map_err(map_rpc_error)?
			.ok_or_else(|| NodeError::NotFound(format!("receipt for {hash}")))?;

		Ok(Receipt {
			transaction_hash: receipt.transaction_hash,
			block_hash: receipt.block_hash.unwrap_or_default(),
			block_number: receipt.block_number.unwrap_or_default(),
			transaction_index: receipt.transaction_index.unwrap_or_default(),
			success: receipt.status(),
			contract_address: receipt.contract_address,
			logs: receipt.inner.logs().to_vec(),
		})
	}

	async fn send_raw_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, NodeError> {
		let pending = self
			.provider
			.send_raw_transaction(&tx.raw)
			.await
			.map_err(map_rpc_error)?;
		Ok(*pending.tx_hash())
	}

	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, NodeError> {
		let request = TransactionRequest::default()
			.to(to)
			.input(TransactionInput::new(data));
		self.provider.call(request).await.map_err(map_rpc_error)
	}
}

// -- Private helpers --

fn http_client(proxy: Option<&str>) -> Result<reqwest::Client, NodeError> {
	let mut builder = reqwest::Client::builder();
	if let Some(proxy) = proxy {
		let proxy = reqwest::Proxy::all(proxy)
			.map_err(|e| NodeError::Protocol(format!("invalid proxy URL: {e}")))?;
		builder = builder.proxy(proxy);
	}
	builder
		.build()
		.map_err(|e| NodeError::Protocol(format!("failed to build HTTP client: {e}")))
}

/// Translate alloy's error into our taxonomy. Transport failures keep the
/// category the transport exposes so retry decisions don't depend on
/// error wording.
pub(crate) fn map_rpc_error(err: RpcError<TransportErrorKind>) -> NodeError {
	match err {
		RpcError::ErrorResp(payload) => NodeError::Rejected(payload.to_string()),
		RpcError::NullResp => NodeError::Protocol("node returned a null response".into()),
		RpcError::DeserError { err, text } => {
			NodeError::Protocol(format!("{err} (response: {text})"))
		}
		RpcError::Transport(kind) => map_transport_error(kind),
		other => NodeError::Protocol(other.to_string()),
	}
}

fn map_transport_error(kind: TransportErrorKind) -> NodeError {
	let message = kind.to_string();
	let category = match &kind {
		TransportErrorKind::BackendGone => TransportKind::Closed,
		TransportErrorKind::HttpError(e) if e.status == 429 || e.status >= 500 => {
			TransportKind::Unavailable
		}
		TransportErrorKind::Custom(inner) => match inner.downcast_ref::<reqwest::Error>() {
			Some(e) if e.is_timeout() => TransportKind::Timeout,
			Some(e) if e.is_connect() => TransportKind::Connect,
			_ => TransportKind::Other,
		},
		_ => TransportKind::Other,
	};
	NodeError::transport(category, message)
}

fn redact_url(url: &str) -> String {
	match url.parse::<reqwest::Url>() {
		Ok(u) => match u.host_str() {
			Some(host) => format!("{}://{host}", u.scheme()),
			None => u.scheme().to_owned(),
		},
		Err(_) => "<invalid url>".into(),
	}
}
