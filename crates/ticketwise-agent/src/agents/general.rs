//! General agent: the language model alone, with recent history as context.

use std::sync::Arc;
use std::time::Duration;

use ticketwise_llm::{CompletionRequest, LlmError, Message, SharedBackend};
use ticketwise_session::EntryRole;

use super::{CallFailure, DEFAULT_AGENT_TIMEOUT, bounded, record};
use crate::failure::FailureSource;
use crate::redact::Redactor;
use crate::state::{AgentName, AgentOutcome, AgentPayload, ConversationState};

/// Default number of history entries sent with a request.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

const GENERAL_PROMPT: &str = "You are ticketwise, an assistant for a software team that tracks its work in an issue tracker. \
Answer the user's question helpfully and concisely. You have no access to live ticket data in this mode; \
if the user needs ticket information, suggest they ask about their tickets directly.";

/// Adapter over the language model.
pub struct GeneralAgent {
    backend: SharedBackend,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    history_window: usize,
    timeout: Duration,
    redactor: Arc<Redactor>,
}

impl std::fmt::Debug for GeneralAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneralAgent")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("history_window", &self.history_window)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeneralAgent {
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            max_tokens: 1024,
            temperature: None,
            history_window: DEFAULT_HISTORY_WINDOW,
            timeout: DEFAULT_AGENT_TIMEOUT,
            redactor: Arc::new(Redactor::new()),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_redactor(mut self, redactor: Arc<Redactor>) -> Self {
        self.redactor = redactor;
        self
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        let request = self.build_request(state);
        state.annotate("history_sent", request.messages.len().saturating_sub(1));

        let outcome = match bounded(
            "language model",
            self.timeout,
            llm_source,
            self.backend.complete(request),
        )
        .await
        {
            Ok(response) => AgentOutcome::Success(AgentPayload::verbatim(response.text().trim())),
            Err(failure) => {
                AgentOutcome::Failure(failure.capture(AgentName::General, &self.redactor))
            }
        };
        record(state, AgentName::General, outcome);
    }

    fn build_request(&self, state: &ConversationState) -> CompletionRequest {
        let mut messages: Vec<Message> = state
            .history()
            .recent(self.history_window)
            .iter()
            .map(|entry| match entry.role {
                EntryRole::User => Message::user(entry.content.clone()),
                EntryRole::Assistant => Message::assistant(entry.content.clone()),
            })
            .collect();
        messages.push(Message::user(state.user_input()));

        let request = CompletionRequest::new(self.model.clone(), messages, self.max_tokens)
            .with_system(GENERAL_PROMPT);
        match self.temperature {
            Some(t) => request.with_temperature(t),
            None => request,
        }
    }
}

fn llm_source(err: &LlmError) -> FailureSource {
    match err {
        LlmError::Network(_) | LlmError::Timeout(_) => FailureSource::Connectivity,
        _ => FailureSource::LanguageModel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketwise_llm::{MockBackend, MockResponse};
    use ticketwise_session::{History, HistoryEntry};

    #[tokio::test]
    async fn test_answer_with_history_window() {
        let backend = Arc::new(MockBackend::with_text("  Sprint planning is on Monday.  "));
        let agent = GeneralAgent::new(backend.clone(), "test-model").with_history_window(2);
        let history = History::from_entries(vec![
            HistoryEntry::user("first"),
            HistoryEntry::assistant("one"),
            HistoryEntry::user("second"),
            HistoryEntry::assistant("two"),
        ]);
        let mut state = ConversationState::new("c1", "when is planning?", history);
        agent.execute(&mut state).await;

        let AgentOutcome::Success(payload) = state.result(AgentName::General).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(payload.summary, "Sprint planning is on Monday.");
        assert!(!payload.polishable);

        let sent = &backend.requests()[0];
        let texts: Vec<_> = sent.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["second", "two", "when is planning?"]);
        assert_eq!(state.metadata()["history_sent"], 2);
    }

    #[tokio::test]
    async fn test_model_failure_is_captured() {
        let backend = MockBackend::new(vec![MockResponse::AuthError(
            "HTTP 401: invalid api key sk-abcdefgh12345".to_string(),
        )]);
        let agent = GeneralAgent::new(Arc::new(backend), "test-model");
        let mut state = ConversationState::new("c1", "hello", History::new());
        agent.execute(&mut state).await;

        let failure = state.result(AgentName::General).unwrap().failure().unwrap();
        assert_eq!(failure.kind, crate::ErrorKind::LanguageModelUnavailable);
        assert_eq!(failure.source, FailureSource::LanguageModel);
        assert!(!failure.detail.contains("abcdefgh12345"));
    }
}
