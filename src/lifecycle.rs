//! Confirmation tracking for broadcast transactions.
//!
//! The node only offers pull-style queries, so confirmation is a fixed
//! cadence poll: sleep, ask whether the transaction is still pending, and
//! once it is not, fetch its receipt. Transport blips are retried within
//! the attempt budget; anything else ends the wait.

use std::time::Duration;

use alloy::primitives::TxHash;
use thiserror::Error;

use crate::receipt::{Outcome, Receipt, RevertedError};
use crate::rpc::{NodeClient, NodeError, TransactionStatus, TransportKind};

/// Attempt budget and cadence for one confirmation wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
	pub max_attempts: u32,
	pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 10,
			poll_interval: Duration::from_secs(5),
		}
	}
}

impl ConfirmationPolicy {
	/// Upper bound of a wait that ends in a timeout.
	pub fn budget(&self) -> Duration {
		self.poll_interval * self.max_attempts
	}
}

#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error("transaction {hash} not confirmed within {}s", .elapsed.as_secs())]
	Timeout { hash: TxHash, elapsed: Duration },
	#[error("failed to track transaction {hash}: {source}")]
	Protocol {
		hash: TxHash,
		#[source]
		source: NodeError,
	},
	#[error(transparent)]
	Reverted(#[from] RevertedError),
}

/// Poll `node` until `hash` is mined, the budget runs out, or the node
/// fails in a way retrying will not fix.
#[tracing::instrument(skip_all, fields(tx_hash = %hash))]
pub async fn await_confirmation(
	node: &dyn NodeClient,
	hash: TxHash,
	policy: &ConfirmationPolicy,
) -> Result<Receipt, LifecycleError> {
	if policy.max_attempts == 0 {
		return Err(LifecycleError::InvalidArgument(
			"max_attempts must be greater than 0".into(),
		));
	}

	tracing::info!(
		max_attempts = policy.max_attempts,
		poll_interval_secs = policy.poll_interval.as_secs_f64(),
		"Waiting for confirmation"
	);

	for attempt in 1..=policy.max_attempts {
		tokio::time::sleep(policy.poll_interval).await;

		match node.transaction_status(hash).await {
			Ok(TransactionStatus::Mined) => {}
			Ok(TransactionStatus::Pending) => {
				tracing::info!(attempt, "Transaction still pending");
				continue;
			}
			Ok(TransactionStatus::NotFound) => {
				tracing::info!(attempt, "Transaction not yet visible to the node");
				continue;
			}
			Err(e) if is_retryable(&e) => {
				tracing::warn!(attempt, error = %e, "Network error while polling, retrying");
				continue;
			}
			Err(source) => return Err(LifecycleError::Protocol { hash, source }),
		}

		// No longer pending, so a missing receipt means the node is
		// inconsistent rather than slow.
		let receipt = node
			.transaction_receipt(hash)
			.await
			.map_err(|source| LifecycleError::Protocol { hash, source })?;

		tracing::info!(
			attempt,
			block = receipt.block_number,
			elapsed_secs = (policy.poll_interval * attempt).as_secs(),
			"Transaction confirmed"
		);
		return Ok(receipt);
	}

	Err(LifecycleError::Timeout {
		hash,
		elapsed: policy.budget(),
	})
}

/// Receipt interpretation callers apply after a successful wait.
pub fn interpret(receipt: &Receipt) -> Result<Outcome, LifecycleError> {
	Ok(receipt.outcome()?)
}

/// Message fragments that indicate a transport-level hiccup when the
/// transport did not tell us the category itself.
const RETRYABLE_PATTERNS: &[&str] = &[
	"connection",
	"timeout",
	"timed out",
	"network",
	"dns",
	"eof",
	"reset",
	"broken pipe",
	"closed",
];

/// Whether polling should shrug `err` off and try again.
pub fn is_retryable(err: &NodeError) -> bool {
	match err {
		NodeError::Transport { kind, message } => match kind {
			TransportKind::Connect
			| TransportKind::Timeout
			| TransportKind::Closed
			| TransportKind::Unavailable => true,
			TransportKind::Other => {
				let message = message.to_ascii_lowercase();
				RETRYABLE_PATTERNS.iter().any(|p| message.contains(p))
			}
		},
		NodeError::NotFound(_) | NodeError::Rejected(_) | NodeError::Protocol(_) => false,
	}
}
