//! Secret resolution.
//!
//! Resolution order:
//! 1. Environment variable
//! 2. Config file (with warning)

use std::fmt;

/// The secrets ticketwise knows how to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// Language-model API key.
    LlmApiKey,
    /// Issue-tracker API token.
    TrackerToken,
    /// Relationship-store password.
    GraphPassword,
}

impl SecretKind {
    /// Environment variable consulted first.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::LlmApiKey => "OPENAI_API_KEY",
            Self::TrackerToken => "JIRA_API_TOKEN",
            Self::GraphPassword => "NEO4J_PASSWORD",
        }
    }

    /// Config key that may hold the value.
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::LlmApiKey => "[llm] api_key",
            Self::TrackerToken => "[tracker] api_token",
            Self::GraphPassword => "[graph] password",
        }
    }

    /// Human label for messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LlmApiKey => "language model API key",
            Self::TrackerToken => "issue tracker API token",
            Self::GraphPassword => "relationship store password",
        }
    }

    /// Every kind.
    pub const ALL: [SecretKind; 3] = [Self::LlmApiKey, Self::TrackerToken, Self::GraphPassword];
}

/// Result of secret resolution with provenance.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

impl fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("value", &mask_secret(&self.value))
            .field("source", &self.source)
            .finish()
    }
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve a secret from the process environment, then the config value.
pub fn resolve_secret(kind: SecretKind, config_value: Option<&str>) -> Option<ResolvedSecret> {
    resolve_secret_with(kind, config_value, |var| std::env::var(var).ok())
}

/// Resolve a secret with an explicit environment lookup.
pub fn resolve_secret_with(
    kind: SecretKind,
    config_value: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<ResolvedSecret> {
    let env_var = kind.env_var();
    if let Some(value) = lookup(env_var).filter(|v| !v.is_empty()) {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(env_var.to_string()),
        });
    }

    config_value
        .filter(|v| !v.is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}

/// Mask a secret for display, keeping a short prefix for recognisability.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(3).collect();
    if secret.chars().count() <= 8 {
        "***".to_string()
    } else {
        format!("{}***", visible)
    }
}
