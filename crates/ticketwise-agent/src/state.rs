//! Conversation state threaded through one turn.
//!
//! The record is single-shaped: every phase of the pipeline reads and writes
//! the same [`ConversationState`]. Write-once fields reject a second write
//! instead of silently replacing the first.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ticketwise_session::History;

use crate::error::{AgentError, Result};
use crate::failure::CapturedFailure;

// ─────────────────────────────────────────────────────────────────────────────
// Routing categories
// ─────────────────────────────────────────────────────────────────────────────

/// Routing category assigned to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Issue-tracker work: search, create, get, update.
    TicketOps,
    /// Blocking relationships and change history.
    RelationshipReasoning,
    /// Anything else, answered by the language model alone.
    General,
}

impl TaskType {
    /// Every category.
    pub const ALL: [TaskType; 3] = [Self::TicketOps, Self::RelationshipReasoning, Self::General];

    /// Canonical label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TicketOps => "ticket_ops",
            Self::RelationshipReasoning => "relationship_reasoning",
            Self::General => "general",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an agent adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    Ticket,
    Relationship,
    General,
}

impl AgentName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticket => "ticket",
            Self::Relationship => "relationship",
            Self::General => "general",
        }
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent results
// ─────────────────────────────────────────────────────────────────────────────

/// Structured output of a successful agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPayload {
    /// Human-readable answer body.
    pub summary: String,
    /// Number of items (tickets, relations) the answer is built from.
    pub item_count: usize,
    /// Reasoning trace appended verbatim after the summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    /// Whether the summary may be rephrased by the language model.
    pub polishable: bool,
}

impl AgentPayload {
    /// A payload that may be polished.
    pub fn new(summary: impl Into<String>, item_count: usize) -> Self {
        Self {
            summary: summary.into(),
            item_count,
            trace: None,
            polishable: true,
        }
    }

    /// A payload that must reach the user verbatim (model output, questions).
    pub fn verbatim(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            item_count: 0,
            trace: None,
            polishable: false,
        }
    }

    /// Attach a reasoning trace.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

/// What an agent left behind: data either way, never a raised error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AgentOutcome {
    Success(AgentPayload),
    Failure(CapturedFailure),
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure(&self) -> Option<&CapturedFailure> {
        match self {
            Self::Failure(f) => Some(f),
            Self::Success(_) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn phases
// ─────────────────────────────────────────────────────────────────────────────

/// Pipeline phase. Each turn walks these once, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnPhase {
    Start,
    Classify,
    Route,
    Execute,
    Synthesize,
    Done,
}

impl TurnPhase {
    /// The only phase reachable from this one.
    pub fn next(&self) -> Option<TurnPhase> {
        match self {
            Self::Start => Some(Self::Classify),
            Self::Classify => Some(Self::Route),
            Self::Route => Some(Self::Execute),
            Self::Execute => Some(Self::Synthesize),
            Self::Synthesize => Some(Self::Done),
            Self::Done => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Classify => "CLASSIFY",
            Self::Route => "ROUTE",
            Self::Execute => "EXECUTE",
            Self::Synthesize => "SYNTHESIZE",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation state
// ─────────────────────────────────────────────────────────────────────────────

/// The unit of work for one request.
#[derive(Debug, Clone)]
pub struct ConversationState {
    conversation_id: String,
    user_input: String,
    history: History,
    phase: TurnPhase,
    task_type: Option<TaskType>,
    agent_results: BTreeMap<AgentName, AgentOutcome>,
    final_answer: Option<String>,
    metadata: serde_json::Map<String, Value>,
}

impl ConversationState {
    /// Fresh state for a turn, carrying the history loaded at `START`.
    pub fn new(conversation_id: impl Into<String>, user_input: impl Into<String>, history: History) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_input: user_input.into(),
            history,
            phase: TurnPhase::Start,
            task_type: None,
            agent_results: BTreeMap::new(),
            final_answer: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    /// History persisted by earlier turns.
    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Move to `to`, which must be the phase directly after the current one.
    pub fn advance(&mut self, to: TurnPhase) -> Result<()> {
        if self.phase.next() != Some(to) {
            return Err(AgentError::InvalidTransition { from: self.phase, to });
        }
        self.phase = to;
        Ok(())
    }

    pub fn task_type(&self) -> Option<TaskType> {
        self.task_type
    }

    /// Set the routing category. Fails if already set.
    pub fn set_task_type(&mut self, task_type: TaskType) -> Result<()> {
        if let Some(existing) = self.task_type {
            return Err(AgentError::state(format!(
                "task type already set to {}",
                existing
            )));
        }
        self.task_type = Some(task_type);
        Ok(())
    }

    /// Record an agent's outcome. Fails if that agent already reported.
    pub fn record_result(&mut self, agent: AgentName, outcome: AgentOutcome) -> Result<()> {
        if self.agent_results.contains_key(&agent) {
            return Err(AgentError::DuplicateResult(agent));
        }
        self.agent_results.insert(agent, outcome);
        Ok(())
    }

    pub fn result(&self, agent: AgentName) -> Option<&AgentOutcome> {
        self.agent_results.get(&agent)
    }

    pub fn results(&self) -> &BTreeMap<AgentName, AgentOutcome> {
        &self.agent_results
    }

    /// Agents that ran this turn.
    pub fn executed_agents(&self) -> Vec<AgentName> {
        self.agent_results.keys().copied().collect()
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    /// Set the user-facing answer. Fails if blank or already set.
    pub fn set_final_answer(&mut self, answer: impl Into<String>) -> Result<()> {
        if self.final_answer.is_some() {
            return Err(AgentError::state("final answer already set"));
        }
        let answer = answer.into();
        if answer.trim().is_empty() {
            return Err(AgentError::state("final answer must not be empty"));
        }
        self.final_answer = Some(answer);
        Ok(())
    }

    /// Add a diagnostic entry. Returns false (and keeps the old value) if
    /// the key already exists.
    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.metadata.contains_key(&key) {
            return false;
        }
        self.metadata.insert(key, value.into());
        true
    }

    pub fn metadata(&self) -> &serde_json::Map<String, Value> {
        &self.metadata
    }
}
