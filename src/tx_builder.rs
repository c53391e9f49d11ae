use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use thiserror::Error;

/// Gas for a plain value transfer with no payload.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

#[derive(Debug, Error)]
pub enum TxError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error("{amount} x 10^{digits} does not fit in 256 bits")]
	ValueOverflow { amount: i64, digits: u32 },
	#[error("invalid key: {0}")]
	Key(String),
	#[error("cannot encode transaction: {0}")]
	Encoding(String),
}

/// Unsigned transaction fields, consumed by [`sign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
	pub sender: Address,
	/// `None` creates a contract from `input`.
	pub recipient: Option<Address>,
	pub value: U256,
	pub gas_limit: u64,
	pub gas_price: u128,
	pub nonce: u64,
	pub input: Bytes,
}

/// A signed, RLP-encoded transaction ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
	pub request: TransactionRequest,
	pub chain_id: u64,
	pub hash: TxHash,
	/// EIP-2718 encoding sent with `eth_sendRawTransaction`.
	pub raw: Bytes,
}

/// Convert `amount x 10^digits` to an exact integer number of wei.
pub fn to_wei(amount: i64, digits: u32) -> Result<U256, TxError> {
	let magnitude = u64::try_from(amount)
		.map_err(|_| TxError::InvalidArgument(format!("amount must not be negative, got {amount}")))?;
	if magnitude == 0 {
		return Ok(U256::ZERO);
	}

	let overflow = || TxError::ValueOverflow { amount, digits };
	let scale = U256::from(10u8)
		.checked_pow(U256::from(digits))
		.ok_or_else(overflow)?;
	U256::from(magnitude).checked_mul(scale).ok_or_else(overflow)
}

pub fn build_transaction(
	sender: Address,
	recipient: Address,
	value: U256,
	gas_limit: u64,
	gas_price: u128,
	nonce: u64,
) -> TransactionRequest {
	TransactionRequest {
		sender,
		recipient: Some(recipient),
		value,
		gas_limit,
		gas_price,
		nonce,
		input: Bytes::new(),
	}
}

/// Contract creation: no recipient, `init_code` as payload.
pub fn build_deployment(
	sender: Address,
	init_code: Bytes,
	gas_limit: u64,
	gas_price: u128,
	nonce: u64,
) -> TransactionRequest {
	TransactionRequest {
		sender,
		recipient: None,
		value: U256::ZERO,
		gas_limit,
		gas_price,
		nonce,
		input: init_code,
	}
}

/// Zero-value call carrying `calldata` to a deployed contract.
pub fn build_call(
	sender: Address,
	contract: Address,
	calldata: Bytes,
	gas_limit: u64,
	gas_price: u128,
	nonce: u64,
) -> TransactionRequest {
	TransactionRequest {
		input: calldata,
		..build_transaction(sender, contract, U256::ZERO, gas_limit, gas_price, nonce)
	}
}

/// Sign `request` as an EIP-155 legacy transaction bound to `chain_id`.
///
/// Signing is deterministic (RFC 6979), so identical inputs produce
/// byte-identical output.
pub fn sign(
	request: TransactionRequest,
	chain_id: u64,
	signer: &PrivateKeySigner,
) -> Result<SignedTransaction, TxError> {
	if signer.address() != request.sender {
		return Err(TxError::Key(format!(
			"key controls {} but the transaction is from {}",
			signer.address(),
			request.sender
		)));
	}
	if request.recipient.is_none() && request.input.is_empty() {
		return Err(TxError::Encoding(
			"contract creation without init code".into(),
		));
	}

	let tx = TxLegacy {
		chain_id: Some(chain_id),
		nonce: request.nonce,
		gas_price: request.gas_price,
		gas_limit: request.gas_limit,
		to: request.recipient.map_or(TxKind::Create, TxKind::Call),
		value: request.value,
		input: request.input.clone(),
	};

	let signature = signer
		.sign_hash_sync(&tx.signature_hash())
		.map_err(|e| TxError::Key(e.to_string()))?;
	let signed = tx.into_signed(signature);
	let hash = *signed.hash();
	let raw = TxEnvelope::Legacy(signed).encoded_2718();

	Ok(SignedTransaction {
		request,
		chain_id,
		hash,
		raw: raw.into(),
	})
}
