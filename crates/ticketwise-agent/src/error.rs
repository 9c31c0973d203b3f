//! Error types for the orchestration core.
//!
//! Turn processing never surfaces these from [`Orchestrator::run`]; they
//! cover construction, state-machine misuse and cancellation.
//!
//! [`Orchestrator::run`]: crate::Orchestrator::run

use thiserror::Error;

use crate::state::{AgentName, TurnPhase};

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for orchestration operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A required collaborator or setting is missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A write-once field of the conversation state was written twice.
    #[error("Conversation state error: {0}")]
    State(String),

    /// An agent result was recorded twice for the same agent.
    #[error("Result already recorded for agent '{0}'")]
    DuplicateResult(AgentName),

    /// The turn tried to move to a phase out of order.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: TurnPhase, to: TurnPhase },

    /// The caller abandoned the turn.
    #[error("Turn cancelled")]
    Cancelled,
}

impl AgentError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state error.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}
