//! The turn orchestrator.
//!
//! [`Orchestrator`] runs one request through
//! `START → CLASSIFY → ROUTE → EXECUTE → SYNTHESIZE → DONE` and persists the
//! conversation history at `DONE`. It is built once per process by
//! [`OrchestratorBuilder`] and shared by every session.
//!
//! # Example
//!
//! ```rust,ignore
//! let orchestrator = Orchestrator::builder()
//!     .with_shared_backend(backend)
//!     .with_tracker(tracker)
//!     .with_graph(graph)
//!     .build()?;
//! orchestrator.probe_capabilities().await;
//!
//! let answer = orchestrator.run("What tickets are assigned to me?", None).await;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use ticketwise_graph::SharedStore;
use ticketwise_llm::{LlmBackend, SharedBackend};
use ticketwise_session::{
    History, HistoryEntry, InMemorySessionStore, SessionGuard, SessionLocks, SharedSessionStore,
    StoreConfig,
};
use ticketwise_tracker::SharedTracker;

use crate::agents::{AgentSet, DEFAULT_AGENT_TIMEOUT, GeneralAgent, RelationshipAgent, TicketAgent};
use crate::capability::{CapabilityFlags, CapabilityProbe};
use crate::classifier::{DEFAULT_CLASSIFY_TIMEOUT, TaskClassifier, route};
use crate::error::{AgentError, Result};
use crate::failure::ErrorKind;
use crate::observer::{LogLevel, SharedObserver, TracingObserver};
use crate::redact::Redactor;
use crate::state::{AgentName, AgentOutcome, ConversationState, TaskType, TurnPhase};
use crate::synthesizer::{FALLBACK_ANSWER, ResponseSynthesizer};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime settings for the orchestrator and the agents it builds.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Model used for classification, general answers and polishing.
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    pub classify_timeout: Duration,
    /// Bound on each capability call made by an agent.
    pub agent_timeout: Duration,
    /// Rephrase structured results through the language model.
    pub polish_answers: bool,
    /// Re-probe the relationship store before every routing decision.
    pub probe_per_request: bool,
    /// History entries sent to the general agent.
    pub history_window: usize,
    pub default_project: Option<String>,
    pub max_results: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: None,
            max_tokens: 1024,
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
            polish_answers: false,
            probe_per_request: false,
            history_window: crate::agents::DEFAULT_HISTORY_WINDOW,
            default_project: None,
            max_results: crate::agents::DEFAULT_MAX_RESULTS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a caller may want to know about a finished turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The user-facing answer. Never empty.
    pub answer: String,
    pub conversation_id: String,
    pub task_type: Option<TaskType>,
    /// The agent that executed, if any.
    pub agent: Option<AgentName>,
    /// Set when the executed agent failed.
    pub error_kind: Option<ErrorKind>,
    /// Diagnostic annotations collected during the turn.
    pub metadata: Map<String, Value>,
}

impl TurnOutcome {
    fn fallback(conversation_id: String) -> Self {
        Self {
            answer: FALLBACK_ANSWER.to_string(),
            conversation_id,
            task_type: None,
            agent: None,
            error_kind: None,
            metadata: Map::new(),
        }
    }

    fn from_state(state: &ConversationState) -> Self {
        let outcome = state.results().iter().next();
        Self {
            answer: state.final_answer().unwrap_or(FALLBACK_ANSWER).to_string(),
            conversation_id: state.conversation_id().to_string(),
            task_type: state.task_type(),
            agent: outcome.map(|(name, _)| *name),
            error_kind: outcome.and_then(|(_, o)| o.failure()).map(|f| f.kind),
            metadata: state.metadata().clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    backend: Option<SharedBackend>,
    tracker: Option<SharedTracker>,
    graph: Option<SharedStore>,
    sessions: Option<SharedSessionStore>,
    observer: Option<SharedObserver>,
    probe: Option<CapabilityProbe>,
    redactor: Redactor,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the language-model backend. Required.
    pub fn with_backend(mut self, backend: impl LlmBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    pub fn with_shared_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_tracker(mut self, tracker: SharedTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_graph(mut self, graph: SharedStore) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Defaults to an in-memory store.
    pub fn with_session_store(mut self, store: SharedSessionStore) -> Self {
        self.sessions = Some(store);
        self
    }

    /// Defaults to [`TracingObserver`].
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace the probe built over the graph store.
    pub fn with_probe(mut self, probe: CapabilityProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    /// Register a configured secret so it never appears in logged detail.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.redactor.register(secret);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let backend = self
            .backend
            .ok_or_else(|| AgentError::config("a language model backend is required"))?;
        let config = self.config;
        if config.model.trim().is_empty() {
            return Err(AgentError::config("model name must not be empty"));
        }

        let redactor = Arc::new(self.redactor);
        let probe = self
            .probe
            .unwrap_or_else(|| CapabilityProbe::new(self.graph.clone()));

        let classifier = TaskClassifier::new(backend.clone(), config.model.clone())
            .with_timeout(config.classify_timeout)
            .with_redactor(redactor.clone());

        let ticket = TicketAgent::new(self.tracker)
            .with_default_project(config.default_project.clone())
            .with_max_results(config.max_results)
            .with_timeout(config.agent_timeout)
            .with_redactor(redactor.clone());
        let relationship = RelationshipAgent::new(self.graph)
            .with_timeout(config.agent_timeout)
            .with_redactor(redactor.clone());
        let mut general = GeneralAgent::new(backend.clone(), config.model.clone())
            .with_max_tokens(config.max_tokens)
            .with_history_window(config.history_window)
            .with_timeout(config.agent_timeout)
            .with_redactor(redactor.clone());
        if let Some(temperature) = config.temperature {
            general = general.with_temperature(temperature);
        }

        let mut synthesizer = ResponseSynthesizer::new().with_redactor(redactor.clone());
        if config.polish_answers {
            synthesizer = synthesizer
                .with_polish(backend, config.model.clone())
                .with_polish_timeout(config.agent_timeout);
        }

        Ok(Orchestrator {
            classifier,
            agents: AgentSet::new(ticket, relationship, general),
            synthesizer,
            probe,
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(InMemorySessionStore::new(StoreConfig::default()))),
            locks: SessionLocks::new(),
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            redactor,
            config,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Runs turns. Shared across sessions; turns for the same conversation are
/// serialized, turns for different conversations run concurrently.
pub struct Orchestrator {
    classifier: TaskClassifier,
    agents: AgentSet,
    synthesizer: ResponseSynthesizer,
    probe: CapabilityProbe,
    sessions: SharedSessionStore,
    locks: SessionLocks,
    observer: SharedObserver,
    redactor: Arc<Redactor>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("classifier", &self.classifier)
            .field("agents", &self.agents)
            .field("probe", &self.probe)
            .field("sessions", &self.sessions.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The capability probe, for starting a background refresh.
    pub fn probe(&self) -> &CapabilityProbe {
        &self.probe
    }

    /// Current capability flags without probing.
    pub fn capabilities(&self) -> CapabilityFlags {
        self.probe.flags()
    }

    /// Probe optional collaborators now. Call once at startup.
    pub async fn probe_capabilities(&self) -> CapabilityFlags {
        self.probe.probe().await
    }

    pub fn session_store(&self) -> &SharedSessionStore {
        &self.sessions
    }

    /// Answer `input`. Never fails and never returns an empty string.
    pub async fn run(&self, input: &str, conversation_id: Option<&str>) -> String {
        self.run_turn(input, conversation_id).await.answer
    }

    /// Answer `input` and report how the turn went.
    pub async fn run_turn(&self, input: &str, conversation_id: Option<&str>) -> TurnOutcome {
        let id = resolve_conversation_id(conversation_id);
        match self
            .run_turn_with_cancel(input, Some(&id), CancellationToken::new())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(conversation_id = %id, error = %e, "turn aborted");
                TurnOutcome::fallback(id)
            }
        }
    }

    /// Like [`run_turn`](Self::run_turn), abandoning the turn when `cancel`
    /// fires. A cancelled turn leaves the stored history untouched.
    pub async fn run_turn_with_cancel(
        &self,
        input: &str,
        conversation_id: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        let id = resolve_conversation_id(conversation_id);
        let started = Instant::now();

        let processed = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            processed = self.process(input, &id, started) => Some(processed),
        };
        let Some((guard, state)) = processed else {
            tracing::info!(conversation_id = %id, "turn cancelled, history not saved");
            return Err(AgentError::Cancelled);
        };

        // Not raced against cancellation: history is written whole or not at all.
        self.commit(&state).await;
        drop(guard);

        let outcome = TurnOutcome::from_state(&state);
        tracing::info!(
            conversation_id = %id,
            task_type = ?outcome.task_type,
            agent = ?outcome.agent,
            error_kind = ?outcome.error_kind,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn completed"
        );
        Ok(outcome)
    }

    /// START through DONE, holding the conversation lock.
    async fn process(
        &self,
        input: &str,
        conversation_id: &str,
        started: Instant,
    ) -> (SessionGuard, ConversationState) {
        let guard = self.locks.acquire(conversation_id).await;
        let history = self.load_history(conversation_id).await;
        let mut state = ConversationState::new(conversation_id, input, history);

        self.classify_and_route(&mut state).await;
        self.execute(&mut state).await;
        self.synthesize(&mut state).await;

        step(&mut state, TurnPhase::Done);
        state.annotate("elapsed_ms", started.elapsed().as_millis() as u64);
        (guard, state)
    }

    async fn load_history(&self, conversation_id: &str) -> History {
        match self.sessions.load(conversation_id).await {
            Ok(history) => history,
            Err(e) => {
                self.observer.log(
                    LogLevel::Warn,
                    "failed to load conversation history, starting fresh",
                    &json!({
                        "conversation_id": conversation_id,
                        "store": self.sessions.name(),
                        "detail": self.redactor.redact(&e.to_string()),
                    }),
                );
                History::new()
            }
        }
    }

    async fn classify_and_route(&self, state: &mut ConversationState) {
        step(state, TurnPhase::Classify);
        let classification = self
            .classifier
            .classify(state.user_input(), state.history())
            .await;
        state.annotate("classifier", classification.source.as_str());
        state.annotate("classifier_rationale", classification.rationale.clone());

        step(state, TurnPhase::Route);
        let flags = if self.config.probe_per_request {
            self.probe.probe().await
        } else {
            self.probe.flags()
        };
        let decision = route(classification.task_type, state.user_input(), flags);
        state.annotate("relationship_store_available", flags.relationship_store);
        state.annotate("requested_task_type", decision.requested.as_str());

        if decision.is_downgraded() {
            state.annotate("downgraded_from", decision.requested.as_str());
            self.observer.log(
                LogLevel::Warn,
                "relationship store unavailable, request downgraded",
                &json!({
                    "conversation_id": state.conversation_id(),
                    "requested": decision.requested.as_str(),
                    "task_type": decision.task_type.as_str(),
                }),
            );
        }

        if let Err(e) = state.set_task_type(decision.task_type) {
            tracing::error!(conversation_id = state.conversation_id(), error = %e, "task type not recorded");
        }
    }

    async fn execute(&self, state: &mut ConversationState) {
        step(state, TurnPhase::Execute);
        let task_type = state.task_type().unwrap_or(TaskType::General);
        let agent = self.agents.select(task_type);
        state.annotate("agent", agent.name().as_str());
        tracing::debug!(
            conversation_id = state.conversation_id(),
            task_type = %task_type,
            agent = %agent.name(),
            "executing agent"
        );

        agent.execute(state).await;

        if let Some(AgentOutcome::Failure(failure)) = state.result(agent.name()) {
            self.observer.log(
                LogLevel::Error,
                "agent call failed",
                &json!({
                    "conversation_id": state.conversation_id(),
                    "agent": failure.agent.as_str(),
                    "error_kind": failure.kind.as_str(),
                    "source": failure.source.as_str(),
                    "detail": failure.detail,
                    "at": failure.at.to_rfc3339(),
                }),
            );
        }
    }

    async fn synthesize(&self, state: &mut ConversationState) {
        step(state, TurnPhase::Synthesize);
        let synthesis = self.synthesizer.synthesize(state).await;
        if let Some(kind) = synthesis.error_kind {
            state.annotate("error_kind", kind.as_str());
        }
        state.annotate("polished", synthesis.polished);

        if let Err(e) = state.set_final_answer(synthesis.answer) {
            tracing::error!(conversation_id = state.conversation_id(), error = %e, "answer rejected, using fallback");
            if state.final_answer().is_none()
                && let Err(e) = state.set_final_answer(FALLBACK_ANSWER)
            {
                tracing::error!(conversation_id = state.conversation_id(), error = %e, "fallback answer rejected");
            }
        }
    }

    /// Append this turn to the stored history in a single save.
    async fn commit(&self, state: &ConversationState) {
        let task_type = state.task_type().unwrap_or(TaskType::General).as_str();
        let answer = state.final_answer().unwrap_or(FALLBACK_ANSWER);

        let mut history = state.history().clone();
        history.push(HistoryEntry::user(state.user_input()).with_task_type(task_type));
        history.push(HistoryEntry::assistant(answer).with_task_type(task_type));

        if let Err(e) = self.sessions.save(state.conversation_id(), history).await {
            self.observer.log(
                LogLevel::Error,
                "failed to save conversation history",
                &json!({
                    "conversation_id": state.conversation_id(),
                    "store": self.sessions.name(),
                    "detail": self.redactor.redact(&e.to_string()),
                }),
            );
        }
    }
}

fn resolve_conversation_id(conversation_id: Option<&str>) -> String {
    conversation_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Advance the phase. Out-of-order steps are defects and only logged.
fn step(state: &mut ConversationState, to: TurnPhase) {
    if let Err(e) = state.advance(to) {
        tracing::error!(conversation_id = state.conversation_id(), error = %e, "phase transition rejected");
    }
}
