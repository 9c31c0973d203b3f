//! Relationship agent: blocking chains and change history from the graph store.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use ticketwise_graph::{DEFAULT_HISTORY_DAYS, GraphError, Relation, RelationPattern, SharedStore};

use super::{CallFailure, DEFAULT_AGENT_TIMEOUT, ISSUE_KEY, bounded, record};
use crate::failure::FailureSource;
use crate::redact::Redactor;
use crate::state::{AgentName, AgentOutcome, AgentPayload, ConversationState};

static LAST_N_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:last|past)\s+(\d{1,3})\s+days?\b").expect("days pattern compiles"));

const HISTORY_WORDS: &[&str] = &["changed", "changes", "change", "history", "happened", "updated"];

/// Map a request to the graph pattern that answers it.
pub fn interpret_relationship(request: &str) -> RelationPattern {
    let lower = request.to_ascii_lowercase();
    let key = ISSUE_KEY
        .captures(request)
        .and_then(|c| c.get(1))
        .map(|m| (m.start(), m.end(), m.as_str().to_string()));
    let mentions_history = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| HISTORY_WORDS.contains(&w));

    let Some((start, end, issue)) = key else {
        return if mentions_history {
            RelationPattern::ChangeHistory {
                issue: None,
                days: history_days(&lower),
            }
        } else {
            RelationPattern::Dependencies
        };
    };

    let before = lower[..start].trim_end();
    let after = lower[end..].trim_start();
    let next_word = after.split(|c: char| !c.is_alphanumeric()).next().unwrap_or("");

    // "what is blocked by X", "what depends on X", "does X block", "X is blocking"
    if before.ends_with("blocked by")
        || before.ends_with("depends on")
        || before.ends_with("depend on")
        || matches!(next_word, "block" | "blocks" | "blocking")
        || after.starts_with("is blocking")
    {
        return RelationPattern::Blocks { issue };
    }
    if lower.contains("block") || lower.contains("depend") {
        return RelationPattern::BlockedBy { issue };
    }
    if mentions_history {
        return RelationPattern::ChangeHistory {
            issue: Some(issue),
            days: history_days(&lower),
        };
    }
    RelationPattern::BlockedBy { issue }
}

fn history_days(lower: &str) -> u32 {
    if let Some(days) = LAST_N_DAYS
        .captures(lower)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        return days.max(1);
    }
    if lower.contains("today") {
        1
    } else if lower.contains("yesterday") {
        2
    } else if lower.contains("month") {
        30
    } else {
        DEFAULT_HISTORY_DAYS
    }
}

/// Adapter over the relationship store.
pub struct RelationshipAgent {
    store: Option<SharedStore>,
    timeout: Duration,
    redactor: Arc<Redactor>,
}

impl std::fmt::Debug for RelationshipAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipAgent")
            .field("store", &self.store.as_ref().map(|s| s.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RelationshipAgent {
    pub fn new(store: Option<SharedStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_AGENT_TIMEOUT,
            redactor: Arc::new(Redactor::new()),
        }
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
        let pattern = interpret_relationship(state.user_input());
        if let Ok(value) = serde_json::to_value(&pattern) {
            state.annotate("relation_pattern", value);
        }

        let outcome = match self.run(&pattern).await {
            Ok(payload) => AgentOutcome::Success(payload),
            Err(failure) => {
                AgentOutcome::Failure(failure.capture(AgentName::Relationship, &self.redactor))
            }
        };
        record(state, AgentName::Relationship, outcome);
    }

    async fn run(&self, pattern: &RelationPattern) -> Result<AgentPayload, CallFailure> {
        let store = self.store.as_ref().ok_or_else(|| {
            CallFailure::new(FailureSource::RelationshipStore, "relationship store not configured")
        })?;
        let relations = bounded(
            "relationship store",
            self.timeout,
            |_: &GraphError| FailureSource::RelationshipStore,
            store.query(pattern),
        )
        .await?;

        let trace = format!(
            "How I got here:\n- Interpreted the request as: {}\n- Queried {} for that pattern\n- {} {} returned",
            pattern,
            store.name(),
            relations.len(),
            if relations.len() == 1 { "result" } else { "results" }
        );
        Ok(AgentPayload::new(summarize(pattern, &relations), relations.len()).with_trace(trace))
    }
}

fn summarize(pattern: &RelationPattern, relations: &[Relation]) -> String {
    let lines = || {
        relations
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let plural = |n: usize, one: &str, many: &str| if n == 1 { one.to_string() } else { many.to_string() };
    let n = relations.len();

    match pattern {
        RelationPattern::BlockedBy { issue } if n == 0 => {
            format!("I found nothing blocking {}.", issue)
        }
        RelationPattern::BlockedBy { issue } => format!(
            "{} is blocked by {} {}:\n{}",
            issue,
            n,
            plural(n, "issue", "issues"),
            lines()
        ),
        RelationPattern::Blocks { issue } if n == 0 => {
            format!("{} is not blocking any issues.", issue)
        }
        RelationPattern::Blocks { issue } => format!(
            "{} blocks {} {}:\n{}",
            issue,
            n,
            plural(n, "issue", "issues"),
            lines()
        ),
        RelationPattern::ChangeHistory { .. } if n == 0 => {
            format!("No {} were recorded.", pattern)
        }
        RelationPattern::ChangeHistory { .. } => format!(
            "{} {} ({}):\n{}",
            n,
            plural(n, "change", "changes"),
            pattern,
            lines()
        ),
        RelationPattern::Dependencies if n == 0 => "No blocking relationships are recorded.".to_string(),
        RelationPattern::Dependencies => format!(
            "Found {} blocking {}:\n{}",
            n,
            plural(n, "relationship", "relationships"),
            lines()
        ),
    }
}
