//! Configuration system for ticketwise.
//!
//! Provides TOML-based configuration with:
//! - One optional section per collaborator (`[llm]`, `[tracker]`, `[graph]`,
//!   `[session]`, `[orchestrator]`)
//! - Config file layering (user config dir + project-local overrides)
//! - Environment overrides for connection settings
//! - Secret resolution (env var → config file, with a plaintext warning)

pub mod discovery;
pub mod env;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, save_config,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{ResolvedSecret, SecretKind, SecretSource, mask_secret, resolve_secret};
pub use types::*;
