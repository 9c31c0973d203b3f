//! Request orchestration core for ticketwise.
//!
//! A turn takes a user request and a conversation id and always produces a
//! non-empty, non-technical answer:
//!
//! ```text
//! request ──► Orchestrator
//!               │ START       load history (per-conversation lock held)
//!               │ CLASSIFY    TaskClassifier ─► task type
//!               │ ROUTE       capability flags may downgrade the task type
//!               │ EXECUTE     exactly one Agent; failures become data
//!               │ SYNTHESIZE  ResponseSynthesizer ─► final answer
//!               ▼ DONE        save history, return the answer
//! ```
//!
//! External capabilities (language model, issue tracker, relationship store)
//! are reached through the traits in `ticketwise-llm`, `ticketwise-tracker`
//! and `ticketwise-graph`. Every call is bounded by a timeout. Technical
//! detail from failed calls is redacted and reported to an [`Observer`];
//! callers only ever see the fixed message for the failure's [`ErrorKind`].

pub mod agents;
pub mod capability;
pub mod classifier;
pub mod error;
pub mod failure;
pub mod observer;
pub mod orchestrator;
pub mod redact;
pub mod state;
pub mod synthesizer;

pub use agents::{
    Agent, AgentSet, GeneralAgent, RelationshipAgent, TicketAgent, TicketPlan, build_jql,
    interpret_relationship, plan_ticket_operation,
};
pub use capability::{CapabilityFlags, CapabilityProbe};
pub use classifier::{
    Classification, ClassificationSource, RouteDecision, TaskClassifier, mentions_work_items,
    parse_classification, route,
};
pub use error::{AgentError, Result};
pub use failure::{CapturedFailure, ErrorKind, FailureSource, classify_error};
pub use observer::{
    LogLevel, LogRecord, Observer, RecordingObserver, SharedObserver, TracingObserver,
};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig, TurnOutcome};
pub use redact::Redactor;
pub use state::{AgentName, AgentOutcome, AgentPayload, ConversationState, TaskType, TurnPhase};
pub use synthesizer::{FALLBACK_ANSWER, ResponseSynthesizer, Synthesis};
