//! Agent adapters.
//!
//! Each adapter wraps one capability and leaves exactly one
//! [`AgentOutcome`] in the conversation state. Adapters never return
//! errors; every failure becomes a [`CapturedFailure`].

mod general;
mod jql;
mod relationship;
mod ticket;

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

pub use general::{DEFAULT_HISTORY_WINDOW, GeneralAgent};
pub use jql::build_jql;
pub use relationship::{RelationshipAgent, interpret_relationship};
pub use ticket::{DEFAULT_MAX_RESULTS, TicketAgent, TicketPlan, plan_ticket_operation};
pub(crate) use ticket::ASK_TITLE;

use crate::failure::{CapturedFailure, FailureSource};
use crate::redact::Redactor;
use crate::state::{AgentName, AgentOutcome, ConversationState, TaskType};

/// An issue key such as `OPS-12`. Keys are upper case; `covid-19` is not one.
pub(crate) static ISSUE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][A-Z0-9]+-\d+)\b").expect("issue key pattern compiles"));

/// Default bound on a single capability call made by an adapter.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(30);

/// The closed set of adapters.
#[derive(Debug)]
pub enum Agent {
    Ticket(TicketAgent),
    Relationship(RelationshipAgent),
    General(GeneralAgent),
}

impl Agent {
    pub fn name(&self) -> AgentName {
        match self {
            Self::Ticket(_) => AgentName::Ticket,
            Self::Relationship(_) => AgentName::Relationship,
            Self::General(_) => AgentName::General,
        }
    }

    /// Run the adapter, recording its outcome in `state`.
    pub async fn execute(&self, state: &mut ConversationState) {
        match self {
            Self::Ticket(agent) => agent.execute(state).await,
            Self::Relationship(agent) => agent.execute(state).await,
            Self::General(agent) => agent.execute(state).await,
        }
    }
}

/// One adapter per routing category.
#[derive(Debug)]
pub struct AgentSet {
    ticket: Agent,
    relationship: Agent,
    general: Agent,
}

impl AgentSet {
    pub fn new(ticket: TicketAgent, relationship: RelationshipAgent, general: GeneralAgent) -> Self {
        Self {
            ticket: Agent::Ticket(ticket),
            relationship: Agent::Relationship(relationship),
            general: Agent::General(general),
        }
    }

    /// The adapter for `task_type`. Total over [`TaskType`].
    pub fn select(&self, task_type: TaskType) -> &Agent {
        match task_type {
            TaskType::TicketOps => &self.ticket,
            TaskType::RelationshipReasoning => &self.relationship,
            TaskType::General => &self.general,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared adapter plumbing
// ─────────────────────────────────────────────────────────────────────────────

/// A failed capability call before redaction.
pub(crate) struct CallFailure {
    pub source: FailureSource,
    pub detail: String,
}

impl CallFailure {
    pub fn new(source: FailureSource, detail: impl Into<String>) -> Self {
        Self {
            source,
            detail: detail.into(),
        }
    }

    pub fn capture(self, agent: AgentName, redactor: &Redactor) -> CapturedFailure {
        CapturedFailure::new(agent, self.source, redactor.redact(&self.detail))
    }
}

/// Await `call` for at most `timeout`. A timeout is a connectivity failure.
pub(crate) async fn bounded<T, E, F>(
    service: &str,
    timeout: Duration,
    source_of: impl Fn(&E) -> FailureSource,
    call: F,
) -> Result<T, CallFailure>
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CallFailure::new(source_of(&e), e.to_string())),
        Err(_) => Err(CallFailure::new(
            FailureSource::Connectivity,
            format!("{} call timed out after {}s", service, timeout.as_secs()),
        )),
    }
}

/// Record `outcome` for `agent`. A second record for the same agent is a
/// defect; it is logged and the first outcome kept.
pub(crate) fn record(state: &mut ConversationState, agent: AgentName, outcome: AgentOutcome) {
    if let Err(e) = state.record_result(agent, outcome) {
        tracing::error!(
            conversation_id = state.conversation_id(),
            agent = %agent,
            error = %e,
            "agent outcome dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use ticketwise_llm::MockBackend;

    fn agents() -> AgentSet {
        AgentSet::new(
            TicketAgent::new(None),
            RelationshipAgent::new(None),
            GeneralAgent::new(Arc::new(MockBackend::with_text("hi")), "test-model"),
        )
    }

    #[test]
    fn test_select_is_total() {
        let set = agents();
        assert_eq!(set.select(TaskType::TicketOps).name(), AgentName::Ticket);
        assert_eq!(
            set.select(TaskType::RelationshipReasoning).name(),
            AgentName::Relationship
        );
        assert_eq!(set.select(TaskType::General).name(), AgentName::General);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_timeout_is_connectivity() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, String>(1)
        };
        let err = bounded("ticket system", Duration::from_secs(1), |_: &String| FailureSource::TicketSystem, slow)
            .await
            .err()
            .unwrap();
        assert_eq!(err.source, FailureSource::Connectivity);
        assert!(err.detail.contains("timed out after 1s"));
    }
}
