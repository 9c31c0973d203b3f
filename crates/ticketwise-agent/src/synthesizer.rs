//! Response synthesis.
//!
//! Turns the single executed agent's outcome into the user-facing answer.
//! Failures always become the fixed message for their [`ErrorKind`]; the
//! captured technical detail never reaches the answer.

use std::sync::Arc;
use std::time::Duration;

use ticketwise_llm::{CompletionRequest, Message, SharedBackend};

use crate::failure::ErrorKind;
use crate::redact::Redactor;
use crate::state::{AgentOutcome, AgentPayload, ConversationState};

/// Returned when no agent produced usable output.
pub const FALLBACK_ANSWER: &str = "I'm sorry, but I encountered an unexpected issue. Please try again.";

const DEFAULT_POLISH_TIMEOUT: Duration = Duration::from_secs(20);

const POLISH_PROMPT: &str = "Rewrite the assistant draft below so it reads naturally as a reply to the user's request. \
Keep every ticket key, title, status, count and list item exactly as given; do not drop, merge or invent items. \
Reply with the rewritten answer only.";

/// The synthesized answer for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub answer: String,
    /// Set when the executed agent failed.
    pub error_kind: Option<ErrorKind>,
    pub polished: bool,
}

#[derive(Clone)]
struct Polisher {
    backend: SharedBackend,
    model: String,
    timeout: Duration,
}

/// Composes the final answer from a conversation state.
#[derive(Clone, Default)]
pub struct ResponseSynthesizer {
    polisher: Option<Polisher>,
    redactor: Arc<Redactor>,
}

impl std::fmt::Debug for ResponseSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSynthesizer")
            .field("polish", &self.polisher.as_ref().map(|p| p.model.as_str()))
            .finish()
    }
}

impl ResponseSynthesizer {
    /// A synthesizer that passes agent summaries through verbatim.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rephrase polishable summaries with the language model.
    pub fn with_polish(mut self, backend: SharedBackend, model: impl Into<String>) -> Self {
        self.polisher = Some(Polisher {
            backend,
            model: model.into(),
            timeout: DEFAULT_POLISH_TIMEOUT,
        });
        self
    }

    pub fn with_polish_timeout(mut self, timeout: Duration) -> Self {
        if let Some(polisher) = self.polisher.as_mut() {
            polisher.timeout = timeout;
        }
        self
    }

    pub fn with_redactor(mut self, redactor: Arc<Redactor>) -> Self {
        self.redactor = redactor;
        self
    }

    /// Synthesize the answer for `state`.
    ///
    /// Reads the outcome of the agent that ran this turn. With no outcome
    /// the fallback answer is returned.
    pub async fn synthesize(&self, state: &ConversationState) -> Synthesis {
        let Some(outcome) = state.results().values().next() else {
            return Synthesis {
                answer: FALLBACK_ANSWER.to_string(),
                error_kind: None,
                polished: false,
            };
        };

        match outcome {
            AgentOutcome::Failure(failure) => Synthesis {
                answer: failure.user_message().to_string(),
                error_kind: Some(failure.kind),
                polished: false,
            },
            AgentOutcome::Success(payload) => self.from_payload(state, payload).await,
        }
    }

    async fn from_payload(&self, state: &ConversationState, payload: &AgentPayload) -> Synthesis {
        let summary = payload.summary.trim();
        if summary.is_empty() {
            return Synthesis {
                answer: FALLBACK_ANSWER.to_string(),
                error_kind: None,
                polished: false,
            };
        }

        let (body, polished) = match &self.polisher {
            Some(polisher) if payload.polishable => {
                match self.polish(polisher, state.user_input(), summary).await {
                    Some(text) => (text, true),
                    None => (summary.to_string(), false),
                }
            }
            _ => (summary.to_string(), false),
        };

        let answer = match payload.trace.as_deref().map(str::trim) {
            Some(trace) if !trace.is_empty() => format!("{}\n\n{}", body, trace),
            _ => body,
        };
        Synthesis {
            answer,
            error_kind: None,
            polished,
        }
    }

    async fn polish(&self, polisher: &Polisher, request: &str, draft: &str) -> Option<String> {
        let prompt = format!("User request:\n{}\n\nAssistant draft:\n{}", request, draft);
        let completion = CompletionRequest::new(polisher.model.clone(), vec![Message::user(prompt)], 1024)
            .with_system(POLISH_PROMPT)
            .with_temperature(0.2);

        match tokio::time::timeout(polisher.timeout, polisher.backend.complete(completion)).await {
            Ok(Ok(response)) => {
                let text = response.text().trim();
                if text.is_empty() {
                    tracing::debug!("polish returned an empty reply, keeping the draft");
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %self.redactor.redact(&e.to_string()), "answer polish failed, keeping the draft");
                None
            }
            Err(_) => {
                tracing::warn!(timeout_secs = polisher.timeout.as_secs(), "answer polish timed out, keeping the draft");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{CapturedFailure, FailureSource};
    use crate::state::AgentName;
    use ticketwise_llm::MockBackend;
    use ticketwise_session::History;

    fn state_with(outcome: AgentOutcome) -> ConversationState {
        let mut state = ConversationState::new("c1", "list my tickets", History::new());
        state.record_result(AgentName::Ticket, outcome).unwrap();
        state
    }

    #[tokio::test]
    async fn test_no_agent_gives_fallback() {
        let state = ConversationState::new("c1", "hi", History::new());
        let synthesis = ResponseSynthesizer::new().synthesize(&state).await;
        assert_eq!(synthesis.answer, FALLBACK_ANSWER);
        assert_eq!(synthesis.error_kind, None);
    }

    #[tokio::test]
    async fn test_failure_uses_fixed_message() {
        let failure = CapturedFailure::new(
            AgentName::Ticket,
            FailureSource::TicketSystem,
            "ticket system authentication failed (HTTP 401): Unauthorized",
        );
        let state = state_with(AgentOutcome::Failure(failure));
        let synthesis = ResponseSynthesizer::new().synthesize(&state).await;
        assert_eq!(synthesis.answer, ErrorKind::TicketAuthFailure.user_message());
        assert_eq!(synthesis.error_kind, Some(ErrorKind::TicketAuthFailure));
        assert!(!synthesis.answer.contains("401"));
    }

    #[tokio::test]
    async fn test_success_with_trace() {
        let payload = AgentPayload::new("OPS-1 is blocked by 1 issue", 1).with_trace("How I got here:\n- x");
        let state = state_with(AgentOutcome::Success(payload));
        let synthesis = ResponseSynthesizer::new().synthesize(&state).await;
        assert_eq!(synthesis.answer, "OPS-1 is blocked by 1 issue\n\nHow I got here:\n- x");
        assert!(!synthesis.polished);
    }

    #[tokio::test]
    async fn test_blank_summary_gives_fallback() {
        let state = state_with(AgentOutcome::Success(AgentPayload::verbatim("   ")));
        let synthesis = ResponseSynthesizer::new().synthesize(&state).await;
        assert_eq!(synthesis.answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_polish_applies_to_polishable_only() {
        let backend = Arc::new(MockBackend::with_text("You have one ticket: OPS-1."));
        let synthesizer = ResponseSynthesizer::new().with_polish(backend.clone(), "test-model");

        let state = state_with(AgentOutcome::Success(AgentPayload::new("Found 1 ticket:\n1. OPS-1", 1)));
        let synthesis = synthesizer.synthesize(&state).await;
        assert_eq!(synthesis.answer, "You have one ticket: OPS-1.");
        assert!(synthesis.polished);

        let state = state_with(AgentOutcome::Success(AgentPayload::verbatim("Which project?")));
        let synthesis = synthesizer.synthesize(&state).await;
        assert_eq!(synthesis.answer, "Which project?");
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_polish_failure_keeps_draft() {
        let synthesizer = ResponseSynthesizer::new()
            .with_polish(Arc::new(MockBackend::failing("language model down")), "test-model");
        let state = state_with(AgentOutcome::Success(AgentPayload::new("Found 1 ticket:\n1. OPS-1", 1)));
        let synthesis = synthesizer.synthesize(&state).await;
        assert_eq!(synthesis.answer, "Found 1 ticket:\n1. OPS-1");
        assert!(!synthesis.polished);
    }
}
