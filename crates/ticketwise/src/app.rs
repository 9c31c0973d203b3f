//! Wiring from configuration to a running orchestrator.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ticketwise_agent::{CapabilityProbe, Orchestrator, OrchestratorConfig, TracingObserver};
use ticketwise_config::{SecretKind, SessionBackend, TicketwiseConfig, resolve_secret, user_config_dir};
use ticketwise_graph::{Neo4jConfig, Neo4jStore, SharedStore};
use ticketwise_llm::{OpenAiBackend, OpenAiConfig, SharedBackend};
use ticketwise_session::{InMemorySessionStore, SharedSessionStore, SqliteSessionStore, StoreConfig};
use ticketwise_tracker::{JiraClient, SharedTracker};

const HISTORY_DB: &str = "history.db";

/// Everything a command needs for one process lifetime.
pub struct App {
    pub orchestrator: Orchestrator,
    pub backend: SharedBackend,
    pub tracker: Option<SharedTracker>,
    pub graph: Option<SharedStore>,
    pub session_backend: SessionBackend,
    refresh: Option<(CancellationToken, JoinHandle<()>)>,
}

impl App {
    /// Build collaborators from `config`, probe capabilities and start the
    /// background refresh when one is configured.
    pub async fn start(config: &TicketwiseConfig) -> Result<Self> {
        let llm = config.llm();
        let tracker_config = config.tracker();
        let graph_config = config.graph();
        let session_config = config.session();
        let orchestrator_config = config.orchestrator();

        let mut secrets = Vec::new();

        // Language model
        if llm.backend != "openai" {
            warn!(backend = %llm.backend, "unsupported llm backend, using the OpenAI-compatible client");
        }
        let api_key = resolve_secret(SecretKind::LlmApiKey, llm.api_key.as_deref()).with_context(|| {
            format!(
                "no {} found; set {} or {}",
                SecretKind::LlmApiKey.label(),
                SecretKind::LlmApiKey.env_var(),
                SecretKind::LlmApiKey.config_key()
            )
        })?;
        let mut openai = OpenAiConfig::openai(api_key.value.clone())
            .with_model(llm.model.clone())
            .with_timeout(llm.timeout());
        if let Some(ref url) = llm.base_url {
            openai = openai.with_base_url(url.clone());
        }
        secrets.push(api_key.value);
        let backend: SharedBackend =
            Arc::new(OpenAiBackend::new(openai).context("failed to create language model client")?);

        // Issue tracker
        let token = resolve_secret(SecretKind::TrackerToken, tracker_config.api_token.as_deref());
        let tracker: Option<SharedTracker> = match (&tracker_config.url, &tracker_config.username, &token) {
            (Some(url), Some(username), Some(token)) => {
                secrets.push(token.value.clone());
                let client = JiraClient::builder()
                    .base_url(url.clone())
                    .username(username.clone())
                    .api_token(token.value.clone())
                    .timeout(tracker_config.timeout())
                    .build()
                    .context("failed to create issue tracker client")?;
                Some(Arc::new(client))
            }
            _ => {
                warn!("issue tracker not configured; ticket requests will report a configuration problem");
                None
            }
        };

        // Relationship store
        let graph: Option<SharedStore> = if graph_config.enabled {
            let password = resolve_secret(SecretKind::GraphPassword, graph_config.password.as_deref())
                .map(|s| s.value)
                .unwrap_or_default();
            if !password.is_empty() {
                secrets.push(password.clone());
            }
            let neo4j = Neo4jConfig::new(
                graph_config.uri.clone(),
                graph_config.username.clone(),
                password,
            )
            .with_database(graph_config.database.clone())
            .with_timeout(graph_config.timeout());
            match Neo4jStore::new(neo4j) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    warn!(error = %e, "relationship store disabled");
                    None
                }
            }
        } else {
            info!("relationship store disabled by configuration");
            None
        };

        // Sessions
        let store_config = StoreConfig::default()
            .with_max_sessions(session_config.max_sessions)
            .with_max_history_entries(session_config.max_history_entries);
        let store_config = match session_config.ttl() {
            Some(ttl) => store_config.with_ttl(ttl),
            None => store_config,
        };
        let sessions: SharedSessionStore = match session_config.backend {
            SessionBackend::Memory => Arc::new(InMemorySessionStore::new(store_config)),
            SessionBackend::Sqlite => {
                let path = match session_config.path {
                    Some(ref path) => path.clone(),
                    None => user_config_dir()
                        .context("no config directory for the session database; set [session] path")?
                        .join(HISTORY_DB),
                };
                debug!(path = %path.display(), "opening session database");
                Arc::new(
                    SqliteSessionStore::open(&path, session_config.max_history_entries)
                        .with_context(|| format!("failed to open {}", path.display()))?,
                )
            }
        };

        let probe = CapabilityProbe::new(graph.clone())
            .with_enabled(graph_config.enabled)
            .with_timeout(graph_config.timeout());

        let mut builder = Orchestrator::builder()
            .with_shared_backend(backend.clone())
            .with_session_store(sessions)
            .with_observer(Arc::new(TracingObserver))
            .with_probe(probe)
            .with_config(agent_config(config));
        if let Some(ref tracker) = tracker {
            builder = builder.with_tracker(tracker.clone());
        }
        if let Some(ref graph) = graph {
            builder = builder.with_graph(graph.clone());
        }
        for secret in secrets {
            builder = builder.with_secret(secret);
        }
        let orchestrator = builder.build()?;

        let flags = orchestrator.probe_capabilities().await;
        info!(relationship_store = flags.relationship_store, "capabilities probed");

        let refresh = graph_config.probe_interval().map(|interval| {
            let cancel = CancellationToken::new();
            let handle = orchestrator.probe().spawn_refresh(interval, cancel.clone());
            (cancel, handle)
        });

        debug!(
            probe_per_request = orchestrator_config.probe_per_request,
            polish_answers = orchestrator_config.polish_answers,
            "orchestrator ready"
        );

        Ok(Self {
            orchestrator,
            backend,
            tracker,
            graph,
            session_backend: session_config.backend,
            refresh,
        })
    }

    /// Stop background work.
    pub async fn shutdown(self) {
        if let Some((cancel, handle)) = self.refresh {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "capability refresh task ended abnormally");
            }
        }
    }
}

/// Map the file configuration onto the orchestrator's runtime settings.
pub fn agent_config(config: &TicketwiseConfig) -> OrchestratorConfig {
    let llm = config.llm();
    let tracker = config.tracker();
    let orchestrator = config.orchestrator();
    OrchestratorConfig {
        model: llm.model,
        temperature: Some(llm.temperature),
        max_tokens: llm.max_tokens,
        classify_timeout: orchestrator.classify_timeout(),
        agent_timeout: orchestrator.agent_timeout(),
        polish_answers: orchestrator.polish_answers,
        probe_per_request: orchestrator.probe_per_request,
        history_window: orchestrator.history_window,
        default_project: tracker.default_project,
        max_results: tracker.max_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_agent_config_from_file() {
        let config = TicketwiseConfig::from_toml(
            r#"
[llm]
model = "gpt-4o-mini"
temperature = 0.3

[tracker]
default_project = "OPS"
max_results = 25

[orchestrator]
classify_timeout_secs = 4
polish_answers = true
history_window = 6
"#,
        )
        .unwrap();

        let mapped = agent_config(&config);
        assert_eq!(mapped.model, "gpt-4o-mini");
        assert_eq!(mapped.temperature, Some(0.3));
        assert_eq!(mapped.default_project.as_deref(), Some("OPS"));
        assert_eq!(mapped.max_results, 25);
        assert_eq!(mapped.classify_timeout, Duration::from_secs(4));
        assert_eq!(mapped.agent_timeout, Duration::from_secs(30));
        assert!(mapped.polish_answers);
        assert!(!mapped.probe_per_request);
        assert_eq!(mapped.history_window, 6);
    }

    #[test]
    fn test_agent_config_defaults() {
        let mapped = agent_config(&TicketwiseConfig::new());
        assert_eq!(mapped.model, "gpt-4o");
        assert_eq!(mapped.max_results, 50);
        assert_eq!(mapped.history_window, 10);
        assert!(!mapped.polish_answers);
    }
}
