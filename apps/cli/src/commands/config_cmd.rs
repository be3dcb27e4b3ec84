//! Config command implementation.

use anyhow::Context;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use tabpipe_training::PipelineConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Write the default configuration to a file
    Init {
        /// Destination (defaults to ./tabpipe.toml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub fn execute(command: ConfigCommand, effective: &PipelineConfig) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            print!("{}", effective.to_toml()?);
            Ok(())
        }
        ConfigCommand::Init { path, force } => {
            let path = path.unwrap_or_else(PipelineConfig::default_local_path);
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            PipelineConfig::default()
                .save_to_file(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} {}", "✓ Wrote default configuration to".green(), path.display());
            Ok(())
        }
    }
}
