use std::path::Path;

use anyhow::Result;

use crate::config;

/// Write the env template; needs no existing configuration.
pub fn run(output: &Path) -> Result<()> {
	config::write_template(output)?;
	tracing::info!(path = %output.display(), "Wrote env template");
	println!("Template written to {}. Fill it in and save it as .env.", output.display());
	Ok(())
}
