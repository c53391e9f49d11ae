use alloy::primitives::{Address, TxHash, B256};
use alloy::rpc::types::Log;
use serde::Serialize;
use thiserror::Error;

/// Node-issued record of a mined transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
	pub transaction_hash: TxHash,
	pub block_hash: B256,
	pub block_number: u64,
	pub transaction_index: u64,
	/// EIP-658 status flag.
	pub success: bool,
	/// Set when the transaction created a contract.
	pub contract_address: Option<Address>,
	pub logs: Vec<Log>,
}

/// What a mined transaction amounts to for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Succeeded,
	/// A contract now lives at this address.
	Deployed(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transaction {0} was mined but reverted")]
pub struct RevertedError(pub TxHash);

impl Receipt {
	/// Created contract address, treating the zero address as absent.
	pub fn created_contract(&self) -> Option<Address> {
		self.contract_address.filter(|a| !a.is_zero())
	}

	/// Classify the receipt.
	///
	/// A receipt carrying a contract address is a deployment regardless of
	/// its status flag. Without one, a false status is a revert.
	pub fn outcome(&self) -> Result<Outcome, RevertedError> {
		if let Some(address) = self.created_contract() {
			return Ok(Outcome::Deployed(address));
		}
		if self.success {
			Ok(Outcome::Succeeded)
		} else {
			Err(RevertedError(self.transaction_hash))
		}
	}
}

#[cfg(test)]
pub(crate) fn sample(hash: TxHash, success: bool, contract: Option<Address>) -> Receipt {
	Receipt {
		transaction_hash: hash,
		block_hash: B256::repeat_byte(0xbb),
		block_number: 7_000_000,
		transaction_index: 3,
		success,
		contract_address: contract,
		logs: Vec::new(),
	}
}
