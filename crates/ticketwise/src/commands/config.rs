//! Config command - configuration management.

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};

use ticketwise_config::{
    LoadedConfig, SecretKind, TicketwiseConfig, mask_secret, resolve_secret, save_config,
    user_config_path,
};

use super::Context;

const PROJECT_CONFIG_FILE: &str = "ticketwise.toml";

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration with secrets masked
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./ticketwise.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Init { local } => cmd_init(local),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    if ctx.json_output {
        let masked: toml::Value = toml::from_str(&config.to_toml_masked()?)?;
        println!("{}", serde_json::to_string_pretty(&masked)?);
        return Ok(());
    }

    println!("# ticketwise configuration\n");
    print_sources(&loaded);

    println!("{}", config.to_toml_masked()?);

    println!("# Secrets\n");
    let llm = config.llm();
    let tracker = config.tracker();
    let graph = config.graph();
    for kind in SecretKind::ALL {
        let config_value = match kind {
            SecretKind::LlmApiKey => llm.api_key.as_deref(),
            SecretKind::TrackerToken => tracker.api_token.as_deref(),
            SecretKind::GraphPassword => graph.password.as_deref(),
        };
        match resolve_secret(kind, config_value) {
            Some(secret) => println!(
                "  {}: {} ({})",
                kind.label(),
                mask_secret(&secret.value),
                secret.source
            ),
            None => println!(
                "  {}: {} (set {} or {})",
                kind.label(),
                style("not set").yellow(),
                kind.env_var(),
                kind.config_key()
            ),
        }
    }
    println!();
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let dim = Style::new().dim();
    let green = Style::new().green();

    println!("{}", style("Config sources (lowest precedence first)").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    for source in &loaded.sources {
        let marker = if source.loaded {
            green.apply_to("●")
        } else {
            dim.apply_to("○")
        };
        println!("  {} {}", marker, source.path.display());
    }
    println!(
        "  {} {}",
        dim.apply_to("+"),
        dim.apply_to("environment overrides (TICKETWISE_*)")
    );
    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        std::env::current_dir()?.join(PROJECT_CONFIG_FILE)
    } else {
        user_config_path().context("could not determine the user config directory")?
    };
    if path.exists() {
        bail!("config file already exists: {}", path.display());
    }

    save_config(&TicketwiseConfig::new(), &path)?;
    println!(
        "{} Created {}",
        Style::new().green().apply_to("✓"),
        path.display()
    );
    Ok(())
}

fn cmd_path() -> Result<()> {
    match user_config_path() {
        Some(path) => println!("{}", path.display()),
        None => bail!("could not determine the user config directory"),
    }
    Ok(())
}

fn print_sources(loaded: &LoadedConfig) {
    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Loaded from:");
        for path in sources {
            println!("  {}", path.display());
        }
        println!();
    }
}
