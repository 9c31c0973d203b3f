//! CLI command handlers.

pub mod ask;
pub mod chat;
pub mod config;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use console::Style;
use ticketwise_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Where to look for `ticketwise.toml`.
    pub project_dir: Option<PathBuf>,
}

impl Context {
    /// Load the merged configuration, printing any load warnings.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = ticketwise_config::load_config(self.project_dir.as_deref())
            .context("failed to load configuration")?;
        if !self.json_output {
            let yellow = Style::new().yellow();
            for warning in &loaded.warnings {
                eprintln!("{} {}", yellow.apply_to("warning:"), warning);
            }
        }
        Ok(loaded)
    }
}
