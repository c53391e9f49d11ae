use std::io;
use std::path::{Path, PathBuf};

use alloy::primitives::Address;
use thiserror::Error;

/// Where the deployed counter's address is kept between runs.
pub const DEFAULT_ADDRESS_FILE: &str = "~/.eth_task_contract_address";

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("could not determine home directory")]
	NoHome,
	#[error("address file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("address file {path} does not hold an address: {content:?}")]
	Corrupt { path: PathBuf, content: String },
}

/// Plain-text file holding exactly one address. Writes replace the
/// whole file; the last writer wins.
#[derive(Debug, Clone)]
pub struct AddressStore {
	path: PathBuf,
}

impl AddressStore {
	/// `~` at the start of `path` expands to the home directory.
	pub fn new(path: &str) -> Result<Self, StoreError> {
		Ok(Self {
			path: expand_home(path)?,
		})
	}

	pub fn at(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// The stored address, or `None` when the file is missing or empty.
	pub fn load(&self) -> Result<Option<Address>, StoreError> {
		let content = match std::fs::read_to_string(&self.path) {
			Ok(c) => c,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
			Err(source) => {
				return Err(StoreError::Io {
					path: self.path.clone(),
					source,
				})
			}
		};

		let trimmed = content.trim();
		if trimmed.is_empty() {
			return Ok(None);
		}
		trimmed
			.parse()
			.map(Some)
			.map_err(|_| StoreError::Corrupt {
				path: self.path.clone(),
				content: trimmed.to_owned(),
			})
	}

	pub fn save(&self, address: &Address) -> Result<(), StoreError> {
		let io_err = |source| StoreError::Io {
			path: self.path.clone(),
			source,
		};
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).map_err(io_err)?;
		}
		std::fs::write(&self.path, address.to_checksum(None)).map_err(io_err)
	}
}

fn expand_home(path: &str) -> Result<PathBuf, StoreError> {
	match path.strip_prefix('~') {
		Some(rest) => {
			let home = dirs::home_dir().ok_or(StoreError::NoHome)?;
			Ok(home.join(rest.trim_start_matches(['/', '\\'])))
		}
		None => Ok(PathBuf::from(path)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::address;

	const ADDR: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

	#[test]
	fn missing_file_means_nothing_deployed() {
		let dir = tempfile::tempdir().unwrap();
		let store = AddressStore::at(dir.path().join("addr"));
		assert_eq!(store.load().unwrap(), None);
	}

	#[test]
	fn save_then_load() {
		let dir = tempfile::tempdir().unwrap();
		let store = AddressStore::at(dir.path().join("nested").join("addr"));
		store.save(&ADDR).unwrap();
		assert_eq!(store.load().unwrap(), Some(ADDR));

		let raw = std::fs::read_to_string(store.path()).unwrap();
		assert_eq!(raw, "0x5FbDB2315678afecb367f032d93F642f64180aa3");
	}

	#[test]
	fn save_overwrites_previous_address() {
		let dir = tempfile::tempdir().unwrap();
		let store = AddressStore::at(dir.path().join("addr"));
		std::fs::write(store.path(), "0x0000000000000000000000000000000000000001\n\n").unwrap();
		store.save(&ADDR).unwrap();
		assert_eq!(store.load().unwrap(), Some(ADDR));
	}

	#[test]
	fn whitespace_only_file_is_empty() {
		let dir = tempfile::tempdir().unwrap();
		let store = AddressStore::at(dir.path().join("addr"));
		std::fs::write(store.path(), " \n").unwrap();
		assert_eq!(store.load().unwrap(), None);
	}

	#[test]
	fn garbage_is_reported() {
		let dir = tempfile::tempdir().unwrap();
		let store = AddressStore::at(dir.path().join("addr"));
		std::fs::write(store.path(), "not-an-address").unwrap();
		assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
	}

	#[test]
	fn tilde_expands_to_home() {
		let Some(home) = dirs::home_dir() else {
			return;
		};
		let store = AddressStore::new("~/.some_file").unwrap();
		assert_eq!(store.path(), home.join(".some_file"));

		let plain = AddressStore::new("/tmp/x").unwrap();
		assert_eq!(plain.path(), Path::new("/tmp/x"));
	}
}
