use std::fmt;

use alloy::signers::local::PrivateKeySigner;
use zeroize::Zeroizing;

use crate::tx_builder::TxError;

/// String holding key material. Zeroed on drop and redacted in
/// `Debug`/`Display` so it cannot end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Expose the secret to a closure, keeping the exposed scope small.
	pub fn with_exposed<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&str) -> R,
	{
		f(&self.0)
	}

	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretString(***)")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("***")
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s.to_owned())
	}
}

// -- Key loading --

/// Parse a 32-byte hex private key (`0x` prefix optional).
///
/// Errors never include the key itself.
pub fn load_signer(key: &SecretString) -> Result<PrivateKeySigner, TxError> {
	if key.is_empty() {
		return Err(TxError::Key("private key is empty".into()));
	}

	let bytes = key.with_exposed(|k| {
		let k = k.trim();
		let clean = k.strip_prefix("0x").unwrap_or(k);
		hex::decode(clean).map(Zeroizing::new)
	});
	let bytes = bytes.map_err(|_| TxError::Key("private key is not valid hex".into()))?;

	if bytes.len() != 32 {
		return Err(TxError::Key(format!(
			"private key must be 32 bytes, got {}",
			bytes.len()
		)));
	}

	PrivateKeySigner::from_slice(&bytes)
		.map_err(|_| TxError::Key("private key is not a valid secp256k1 scalar".into()))
}
