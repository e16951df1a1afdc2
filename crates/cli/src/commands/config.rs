//! Config Commands

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use droidgate_e2e::DroidgateConfig;

use crate::output::print_success;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the effective configuration back to the config file
    #[arg(long)]
    pub save: bool,
}

pub fn execute(args: ConfigArgs, config: &DroidgateConfig, path: &Path) -> Result<()> {
    print!("{}", config.to_toml()?);

    if args.save {
        config
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        print_success(&format!("Configuration written to {}", path.display()));
    }

    Ok(())
}
