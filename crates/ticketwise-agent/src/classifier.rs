//! Task classification and capability-aware routing.
//!
//! Classification never fails: a model error, a timeout, or an unreadable
//! reply all resolve to [`TaskType::General`]. Routing then applies the
//! capability flags, downgrading relationship requests when the store is
//! unavailable.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use ticketwise_llm::{CompletionRequest, Message, SharedBackend};
use ticketwise_session::{EntryRole, History};

use crate::agents::{ASK_TITLE, ISSUE_KEY};
use crate::capability::CapabilityFlags;
use crate::redact::Redactor;
use crate::state::TaskType;

/// Default bound on the classification call.
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(15);

/// History entries inspected for follow-up detection.
const CONTEXT_WINDOW: usize = 5;

const CLASSIFY_MAX_TOKENS: u32 = 200;

const CLASSIFIER_PROMPT: &str = r#"You are a task classifier for an issue-tracking assistant. Decide which specialised agent should handle the user's request.

Agents:
1. ticket_ops: issue tracker operations.
   - "What tickets are assigned to me?"
   - "Create a new bug in project OPS: login fails"
   - "Show me open issues in project PGA"
   - "Move OPS-12 to In Progress"
   Keywords: ticket, issue, assigned, project, epic, story, task, bug, sprint, backlog, JQL.
2. relationship_reasoning: dependencies and history between tickets.
   - "Why is OPS-12 blocked?"
   - "What does OPS-7 block?"
   - "What changed on OPS-3 this week?"
3. general: conversation or questions that need no tracker data.

Respond with JSON only:
{"task_type": "ticket_ops|relationship_reasoning|general", "reasoning": "brief explanation"}"#;

/// Wording in recent history that marks an ongoing tracker conversation.
const TICKET_CONTEXT_INDICATORS: &[&str] = &[
    "jira",
    "ticket",
    "assigned",
    "username",
    "email address",
    "project key",
    "search for tickets",
    "clarification needed",
    "could you please tell me",
];

/// Words that mean the request is about tracked work items.
const WORK_ITEM_WORDS: &[&str] = &[
    "ticket", "tickets", "issue", "issues", "bug", "bugs", "story", "stories", "epic", "epics",
    "task", "tasks", "jira", "sprint", "backlog", "assigned", "project",
];

static FOLLOW_UP: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // email
        r"^[A-Za-z0-9_.+-]+@[A-Za-z0-9-]+\.[A-Za-z0-9.-]+$",
        // username-like, dotted names included
        r"^[A-Za-z][A-Za-z0-9._-]{2,20}$",
        // project key
        r"^[A-Z]{2,10}$",
        // confirmation
        r"(?i)^(yes|y|no|n|ok|okay|sure)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("follow-up pattern compiles"))
    .collect()
});

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("json block pattern compiles"));

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// How a classification was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    /// Follow-up to an ongoing tracker conversation; no model call.
    Context,
    /// Parsed from the model's reply.
    Model,
    /// The model call failed or its reply was unusable.
    Fallback,
}

impl ClassificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Model => "model",
            Self::Fallback => "fallback",
        }
    }
}

/// Output of the classification step, before routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub task_type: TaskType,
    pub source: ClassificationSource,
    pub rationale: String,
}

impl Classification {
    fn fallback(rationale: impl Into<String>) -> Self {
        Self {
            task_type: TaskType::General,
            source: ClassificationSource::Fallback,
            rationale: rationale.into(),
        }
    }
}

/// Output of the routing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    /// Category the turn will run under.
    pub task_type: TaskType,
    /// Category the classifier asked for.
    pub requested: TaskType,
}

impl RouteDecision {
    pub fn is_downgraded(&self) -> bool {
        self.task_type != self.requested
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classifier
// ─────────────────────────────────────────────────────────────────────────────

/// Maps a request to a routing category using the language model.
#[derive(Clone)]
pub struct TaskClassifier {
    backend: SharedBackend,
    model: String,
    temperature: f32,
    timeout: Duration,
    redactor: Arc<Redactor>,
}

impl std::fmt::Debug for TaskClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskClassifier")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TaskClassifier {
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature: 0.1,
            timeout: DEFAULT_CLASSIFY_TIMEOUT,
            redactor: Arc::new(Redactor::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_redactor(mut self, redactor: Arc<Redactor>) -> Self {
        self.redactor = redactor;
        self
    }

    /// Classify `input`, consulting recent history first.
    pub async fn classify(&self, input: &str, history: &History) -> Classification {
        if let Some(rationale) = follow_up_rationale(input, history) {
            return Classification {
                task_type: TaskType::TicketOps,
                source: ClassificationSource::Context,
                rationale,
            };
        }

        let request = CompletionRequest::new(
            self.model.clone(),
            vec![Message::user(input)],
            CLASSIFY_MAX_TOKENS,
        )
        .with_system(CLASSIFIER_PROMPT)
        .with_temperature(self.temperature);

        let response = match tokio::time::timeout(self.timeout, self.backend.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let detail = self.redactor.redact(&e.to_string());
                tracing::warn!(error = %detail, "task classification failed, defaulting to general");
                return Classification::fallback(format!("classification call failed: {}", detail));
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "task classification timed out, defaulting to general"
                );
                return Classification::fallback(format!(
                    "classification timed out after {}s",
                    self.timeout.as_secs()
                ));
            }
        };

        match parse_classification(response.text()) {
            Some((task_type, reasoning)) => Classification {
                task_type,
                source: ClassificationSource::Model,
                rationale: reasoning,
            },
            None => {
                tracing::debug!(reply = response.text(), "unparseable classification reply");
                Classification::fallback("unparseable classification reply")
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────────────────────────────────────

/// Apply capability flags to a requested category.
///
/// Relationship requests without a reachable store become ticket work when
/// the request mentions tracked items, and general otherwise.
pub fn route(requested: TaskType, input: &str, flags: CapabilityFlags) -> RouteDecision {
    let task_type = match requested {
        TaskType::RelationshipReasoning if !flags.relationship_store => {
            if mentions_work_items(input) {
                TaskType::TicketOps
            } else {
                TaskType::General
            }
        }
        other => other,
    };
    RouteDecision {
        task_type,
        requested,
    }
}

/// Whether the text refers to issue-tracker items.
pub fn mentions_work_items(input: &str) -> bool {
    if ISSUE_KEY.is_match(input) {
        return true;
    }
    input
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .any(|word| WORK_ITEM_WORDS.contains(&word.as_str()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn follow_up_rationale(input: &str, history: &History) -> Option<String> {
    // Any reply to the title question is the title, however long.
    if let Some(last) = history.entries().last()
        && last.role == EntryRole::Assistant
        && last.content == ASK_TITLE
        && !input.trim().is_empty()
    {
        return Some("answer to the pending ticket title question".to_string());
    }

    let indicator = history.recent(CONTEXT_WINDOW).iter().find_map(|entry| {
        let content = entry.content.to_lowercase();
        TICKET_CONTEXT_INDICATORS
            .iter()
            .find(|i| content.contains(*i))
            .copied()
    })?;

    let trimmed = input.trim();
    let pattern_match = FOLLOW_UP.iter().any(|re| re.is_match(trimmed));
    let short = trimmed.split_whitespace().count() <= 3;
    if pattern_match || short {
        Some(format!(
            "follow-up to an ongoing ticket conversation (history mentions \"{}\")",
            indicator
        ))
    } else {
        None
    }
}

#[derive(Deserialize)]
struct ClassifierReply {
    task_type: String,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse a model reply into a category and its reasoning.
///
/// Accepts the first `{...}` block or a bare label.
pub fn parse_classification(reply: &str) -> Option<(TaskType, String)> {
    if let Some(block) = JSON_BLOCK.find(reply) {
        let parsed: ClassifierReply = serde_json::from_str(block.as_str()).ok()?;
        let task_type = parse_label(&parsed.task_type)?;
        return Some((task_type, parsed.reasoning.unwrap_or_default()));
    }
    parse_label(reply).map(|t| (t, String::new()))
}

/// Map a label (canonical or legacy alias) to a category.
pub fn parse_label(label: &str) -> Option<TaskType> {
    let cleaned = label
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .to_lowercase();
    match cleaned.as_str() {
        "ticket_ops" | "jira" | "mcp" | "ticket" => Some(TaskType::TicketOps),
        "relationship_reasoning" | "graph" => Some(TaskType::RelationshipReasoning),
        "general" => Some(TaskType::General),
        _ => None,
    }
}
