use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::crypto::SecretString;
use crate::lifecycle::ConfirmationPolicy;
use crate::rpc::TransportConfig;

/// Template written by `env-template` and shown when no `.env` exists.
pub const ENV_TEMPLATE: &str = include_str!("../.env.template");

pub const ENV_FILE_NAME: &str = ".env";
pub const DEFAULT_TEMPLATE_OUTPUT: &str = ".env.template";

/// How many parent directories are searched for `.env`.
pub const SEARCH_DEPTH: usize = 5;

pub const DEFAULT_RPC_URL: &str = "https://sepolia.infura.io/v3/<API_KEY>";
pub const DEFAULT_WS_RPC_URL: &str = "wss://ethereum-sepolia-rpc.publicnode.com";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error(
		"no {} file found within {} directories of {start}; \
		 create one using this template:\n\n{}",
		ENV_FILE_NAME,
		SEARCH_DEPTH,
		ENV_TEMPLATE
	)]
	NotFound { start: PathBuf },
	#[error("env file {path}: {reason}")]
	InvalidEnvFile { path: PathBuf, reason: String },
	#[error("cannot parse env file {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: dotenvy::Error,
	},
	#[error("missing configuration key {0}")]
	MissingKey(String),
	#[error("invalid value for {key}: {reason}")]
	Invalid { key: String, reason: String },
	#[error("{0} already exists, refusing to overwrite")]
	AlreadyExists(PathBuf),
	#[error("{path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

// -- Env file --

/// Key/value pairs from one `.env` file.
///
/// The process environment is never modified; values are looked up from
/// this object only.
#[derive(Debug, Clone)]
pub struct EnvConfig {
	path: PathBuf,
	values: HashMap<String, String>,
}

impl EnvConfig {
	/// Load `explicit` if given, otherwise the nearest `.env` above the
	/// current directory.
	pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
		let path = match explicit {
			Some(path) => {
				validate_env_file(path)?;
				path.to_path_buf()
			}
			None => {
				let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
					path: PathBuf::from("."),
					source,
				})?;
				find_env_file(&cwd, SEARCH_DEPTH).ok_or(ConfigError::NotFound { start: cwd })?
			}
		};
		Self::from_file(path)
	}

	pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
		let path = path.into();
		let values = read_values(&path)?;
		tracing::debug!(path = %path.display(), keys = values.len(), "Loaded env file");
		Ok(Self { path, values })
	}

	/// Re-read the file this config came from.
	pub fn reload(&mut self) -> Result<(), ConfigError> {
		self.values = read_values(&self.path)?;
		tracing::info!(path = %self.path.display(), "Reloaded env file");
		Ok(())
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.values.get(key).map(String::as_str)
	}

	/// Value of `key`, treating blank values as unset.
	fn non_blank(&self, key: &str) -> Option<&str> {
		self.get(key).map(str::trim).filter(|v| !v.is_empty())
	}

	/// Replace every `<KEY>` in `template` with the value of `KEY`.
	///
	/// Text in angle brackets that is not a plain identifier is copied
	/// through untouched.
	pub fn resolve(&self, template: &str) -> Result<String, ConfigError> {
		let mut out = String::with_capacity(template.len());
		let mut rest = template;

		while let Some(open) = rest.find('<') {
			out.push_str(&rest[..open]);
			let after = &rest[open + 1..];
			let Some(close) = after.find('>') else {
				out.push_str(&rest[open..]);
				return Ok(out);
			};

			let key = &after[..close];
			if is_placeholder(key) {
				let value = self
					.get(key)
					.ok_or_else(|| ConfigError::MissingKey(key.to_owned()))?;
				out.push_str(value);
			} else {
				out.push_str(&rest[open..open + close + 2]);
			}
			rest = &after[close + 1..];
		}

		out.push_str(rest);
		Ok(out)
	}
}

fn is_placeholder(key: &str) -> bool {
	!key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn read_values(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
	let parse_err = |source| ConfigError::Parse {
		path: path.to_path_buf(),
		source,
	};
	dotenvy::from_path_iter(path)
		.map_err(parse_err)?
		.collect::<Result<HashMap<_, _>, _>>()
		.map_err(parse_err)
}

/// Check that `path` names a readable regular file.
pub fn validate_env_file(path: &Path) -> Result<(), ConfigError> {
	let invalid = |reason: String| ConfigError::InvalidEnvFile {
		path: path.to_path_buf(),
		reason,
	};

	let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
		io::ErrorKind::NotFound => invalid("does not exist".into()),
		_ => invalid(format!("cannot be accessed: {e}")),
	})?;
	if meta.is_dir() {
		return Err(invalid("is a directory, not a file".into()));
	}
	std::fs::File::open(path).map_err(|e| invalid(format!("is not readable: {e}")))?;
	Ok(())
}

/// Nearest `.env` in `start` or one of its first `max_levels` ancestors.
pub fn find_env_file(start: &Path, max_levels: usize) -> Option<PathBuf> {
	for dir in start.ancestors().take(max_levels + 1) {
		let candidate = dir.join(ENV_FILE_NAME);
		if candidate.is_file() {
			return Some(candidate);
		}
	}
	tracing::debug!(start = %start.display(), max_levels, "No env file found");
	None
}

/// Write [`ENV_TEMPLATE`] to `output`, refusing to replace an existing file.
pub fn write_template(output: &Path) -> Result<(), ConfigError> {
	use std::io::Write;

	let mut file = std::fs::OpenOptions::new()
		.write(true)
		.create_new(true)
		.open(output)
		.map_err(|source| match source.kind() {
			io::ErrorKind::AlreadyExists => ConfigError::AlreadyExists(output.to_path_buf()),
			_ => ConfigError::Io {
				path: output.to_path_buf(),
				source,
			},
		})?;
	file.write_all(ENV_TEMPLATE.as_bytes())
		.map_err(|source| ConfigError::Io {
			path: output.to_path_buf(),
			source,
		})
}

// -- Typed settings --

/// Everything the commands need, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
	pub rpc_url: String,
	pub ws_rpc_url: String,
	pub proxy: Option<String>,
	private_key: Option<SecretString>,
	pub confirmation: ConfirmationPolicy,
}

impl Settings {
	pub fn from_env(env: &EnvConfig) -> Result<Self, ConfigError> {
		let rpc_url = env.resolve(env.non_blank("RPC_URL").unwrap_or(DEFAULT_RPC_URL))?;
		let ws_rpc_url = env.resolve(env.non_blank("WS_RPC_URL").unwrap_or(DEFAULT_WS_RPC_URL))?;
		let proxy = env.non_blank("PROXY_URL").map(|p| env.resolve(p)).transpose()?;
		let private_key = env.non_blank("PRIVATE_KEY").map(SecretString::from);

		let defaults = ConfirmationPolicy::default();
		let max_attempts = parse_or(env, "CONFIRM_MAX_ATTEMPTS", defaults.max_attempts)?;
		if max_attempts == 0 {
			return Err(ConfigError::Invalid {
				key: "CONFIRM_MAX_ATTEMPTS".into(),
				reason: "must be at least 1".into(),
			});
		}
		let poll_secs = parse_or(
			env,
			"CONFIRM_POLL_INTERVAL_SECS",
			defaults.poll_interval.as_secs(),
		)?;

		Ok(Self {
			rpc_url,
			ws_rpc_url,
			proxy,
			private_key,
			confirmation: ConfirmationPolicy {
				max_attempts,
				poll_interval: Duration::from_secs(poll_secs),
			},
		})
	}

	/// The signing key; only commands that send transactions ask for it.
	pub fn private_key(&self) -> Result<&SecretString, ConfigError> {
		self.private_key
			.as_ref()
			.ok_or_else(|| ConfigError::MissingKey("PRIVATE_KEY".into()))
	}

	/// Transport for the HTTP endpoint, or the WebSocket one when `ws` is set.
	///
	/// `PROXY_URL` only applies to HTTP; the WebSocket endpoint is dialed
	/// directly.
	pub fn transport(&self, ws: bool) -> TransportConfig {
		if ws {
			if self.proxy.is_some() {
				tracing::warn!("PROXY_URL is ignored for WebSocket endpoints");
			}
			return TransportConfig::new(self.ws_rpc_url.clone());
		}
		TransportConfig::new(self.rpc_url.clone()).with_proxy(self.proxy.clone())
	}
}

fn parse_or<T>(env: &EnvConfig, key: &str, default: T) -> Result<T, ConfigError>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	match env.non_blank(key) {
		None => Ok(default),
		Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
			key: key.to_owned(),
			reason: format!("{raw:?}: {e}"),
		}),
	}
}
