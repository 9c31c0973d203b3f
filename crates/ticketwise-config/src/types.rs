//! Configuration types.
//!
//! Every section is optional. A missing section means "use defaults", and
//! when layers are merged a later section replaces an earlier one whole.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Root
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketwiseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker: Option<TrackerConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<OrchestratorConfig>,
}

impl TicketwiseConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Serialize with every secret replaced by a mask.
    pub fn to_toml_masked(&self) -> crate::Result<String> {
        let mut masked = self.clone();
        if let Some(ref mut llm) = masked.llm {
            llm.api_key = llm.api_key.as_deref().map(crate::mask_secret);
        }
        if let Some(ref mut tracker) = masked.tracker {
            tracker.api_token = tracker.api_token.as_deref().map(crate::mask_secret);
        }
        if let Some(ref mut graph) = masked.graph {
            graph.password = graph.password.as_deref().map(crate::mask_secret);
        }
        masked.to_toml()
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: TicketwiseConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.tracker.is_some() {
            self.tracker = other.tracker;
        }
        if other.graph.is_some() {
            self.graph = other.graph;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.orchestrator.is_some() {
            self.orchestrator = other.orchestrator;
        }
    }

    /// The `[llm]` section or its defaults.
    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    /// The `[tracker]` section or its defaults.
    pub fn tracker(&self) -> TrackerConfig {
        self.tracker.clone().unwrap_or_default()
    }

    /// The `[graph]` section or its defaults.
    pub fn graph(&self) -> GraphConfig {
        self.graph.clone().unwrap_or_default()
    }

    /// The `[session]` section or its defaults.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// The `[orchestrator]` section or its defaults.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        self.orchestrator.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// [llm]
// ─────────────────────────────────────────────────────────────────────────────

/// Language-model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name. Only `openai` (and compatible endpoints) is supported.
    pub backend: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Prefer `OPENAI_API_KEY` over putting this in a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            model: "gpt-4o".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.1,
            max_tokens: 1024,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// [tracker]
// ─────────────────────────────────────────────────────────────────────────────

/// Issue-tracker connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Project used when a create request names none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            api_token: None,
            default_project: None,
            max_results: 50,
            timeout_secs: 20,
        }
    }
}

impl TrackerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// [graph]
// ─────────────────────────────────────────────────────────────────────────────

/// Relationship-store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Master toggle. When false the store is never contacted.
    pub enabled: bool,
    pub uri: String,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub timeout_secs: u64,
    /// Background re-probe cadence. Unset probes only at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_interval_secs: Option<u64>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            uri: "bolt://localhost:7687".to_string(),
            database: "neo4j".to_string(),
            username: "neo4j".to_string(),
            password: None,
            timeout_secs: 5,
            probe_interval_secs: None,
        }
    }
}

impl GraphConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_interval(&self) -> Option<Duration> {
        self.probe_interval_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// [session]
// ─────────────────────────────────────────────────────────────────────────────

/// Where conversation history lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Session store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    /// SQLite database path. Defaults to `history.db` in the user config dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub max_sessions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    pub max_history_entries: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Memory,
            path: None,
            max_sessions: 1000,
            ttl_secs: None,
            max_history_entries: 200,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// [orchestrator]
// ─────────────────────────────────────────────────────────────────────────────

/// Turn pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Deadline for the classification call.
    pub classify_timeout_secs: u64,
    /// Deadline for a single agent execution.
    pub agent_timeout_secs: u64,
    /// Rephrase structured results through the language model.
    pub polish_answers: bool,
    /// Re-probe the relationship store before every turn.
    pub probe_per_request: bool,
    /// History entries handed to the general agent.
    pub history_window: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            classify_timeout_secs: 15,
            agent_timeout_secs: 30,
            polish_answers: false,
            probe_per_request: false,
            history_window: 10,
        }
    }
}

impl OrchestratorConfig {
    pub fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.classify_timeout_secs)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
