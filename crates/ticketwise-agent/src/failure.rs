//! Failure capture and the closed user-facing error taxonomy.
//!
//! Raw failures from any collaborator are matched against lower-cased text
//! markers. Every input lands on exactly one [`ErrorKind`], and every kind
//! maps to one fixed message that carries no technical detail.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::state::AgentName;

// ─────────────────────────────────────────────────────────────────────────────
// Error kinds
// ─────────────────────────────────────────────────────────────────────────────

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LanguageModelUnavailable,
    TicketAuthFailure,
    RelationshipStoreUnavailable,
    Connectivity,
    Generic,
}

impl ErrorKind {
    /// Every kind.
    pub const ALL: [ErrorKind; 5] = [
        Self::LanguageModelUnavailable,
        Self::TicketAuthFailure,
        Self::RelationshipStoreUnavailable,
        Self::Connectivity,
        Self::Generic,
    ];

    /// Fixed message shown to the user for this kind.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::LanguageModelUnavailable => {
                "I'm having trouble connecting to my language processing service. This might be a temporary issue. Please try again in a moment."
            }
            Self::TicketAuthFailure => {
                "I'm unable to access your issue tracker right now. Please check your Jira credentials and configuration, then try again."
            }
            Self::RelationshipStoreUnavailable => {
                "I can't reach the relationship data right now, so I couldn't trace dependencies or change history. Please try again later, or ask about the tickets directly."
            }
            Self::Connectivity => {
                "I'm experiencing connection issues with one of my services. Please try again in a moment."
            }
            Self::Generic => {
                "I encountered an issue while processing your request. Please try rephrasing your question or try again later."
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LanguageModelUnavailable => "language_model_unavailable",
            Self::TicketAuthFailure => "ticket_auth_failure",
            Self::RelationshipStoreUnavailable => "relationship_store_unavailable",
            Self::Connectivity => "connectivity",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// 401/403 only as an HTTP status, never inside keys or numbers.
static AUTH_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\bhttp|\bstatus(?:\s+code)?)\s*[:=]?\s*\(?40[13]\b|\(40[13]\)")
        .expect("auth status pattern compiles")
});

const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "forbidden",
    "authentication",
    "invalid api key",
    "credential",
    "not configured",
    "configuration error",
];
const CONNECTIVITY_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "connect error",
    "unreachable",
    "refused",
    "network",
    "dns",
];
const TICKET_HINTS: &[&str] = &["ticket system", "jira", "issue tracker"];
const GRAPH_HINTS: &[&str] = &["relationship store", "neo4j", "graph database"];
const LLM_HINTS: &[&str] = &["language model", "openai", "api key"];

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

/// Map a raw failure to its kind and fixed user message.
///
/// Service hints in the text win over the reporting agent; the agent only
/// disambiguates bare auth failures.
pub fn classify_error(raw_error: &str, agent: AgentName) -> (ErrorKind, &'static str) {
    let kind = classify_kind(&raw_error.to_lowercase(), agent);
    (kind, kind.user_message())
}

fn classify_kind(text: &str, agent: AgentName) -> ErrorKind {
    let auth = AUTH_STATUS.is_match(text) || contains_any(text, AUTH_MARKERS);

    if auth && contains_any(text, TICKET_HINTS) {
        return ErrorKind::TicketAuthFailure;
    }
    if contains_any(text, GRAPH_HINTS) {
        return ErrorKind::RelationshipStoreUnavailable;
    }
    if contains_any(text, LLM_HINTS) {
        return ErrorKind::LanguageModelUnavailable;
    }
    if auth {
        return match agent {
            AgentName::Ticket => ErrorKind::TicketAuthFailure,
            AgentName::Relationship => ErrorKind::RelationshipStoreUnavailable,
            AgentName::General => ErrorKind::LanguageModelUnavailable,
        };
    }
    if contains_any(text, CONNECTIVITY_MARKERS) {
        return ErrorKind::Connectivity;
    }
    ErrorKind::Generic
}

// ─────────────────────────────────────────────────────────────────────────────
// Captured failures
// ─────────────────────────────────────────────────────────────────────────────

/// Which kind of external call raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSource {
    TicketSystem,
    RelationshipStore,
    LanguageModel,
    Connectivity,
}

impl FailureSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TicketSystem => "ticket_system",
            Self::RelationshipStore => "relationship_store",
            Self::LanguageModel => "language_model",
            Self::Connectivity => "connectivity",
        }
    }
}

/// A failure converted to data at the agent boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedFailure {
    pub agent: AgentName,
    pub source: FailureSource,
    pub kind: ErrorKind,
    /// Technical message, already redacted. Never shown to the user.
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl CapturedFailure {
    /// Capture a failure. `detail` must already be redacted.
    ///
    /// Text with no recognisable markers falls back to the source category
    /// before settling on [`ErrorKind::Generic`].
    pub fn new(agent: AgentName, source: FailureSource, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let (mut kind, _) = classify_error(&detail, agent);
        if kind == ErrorKind::Generic {
            kind = match source {
                FailureSource::RelationshipStore => ErrorKind::RelationshipStoreUnavailable,
                FailureSource::LanguageModel => ErrorKind::LanguageModelUnavailable,
                FailureSource::Connectivity => ErrorKind::Connectivity,
                FailureSource::TicketSystem => ErrorKind::Generic,
            };
        }
        Self {
            agent,
            source,
            kind,
            detail,
            at: Utc::now(),
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_distinct_message() {
        let mut seen = std::collections::HashSet::new();
        for kind in ErrorKind::ALL {
            let msg = kind.user_message();
            assert!(!msg.is_empty());
            assert!(seen.insert(msg), "duplicate message for {}", kind);
        }
    }

    #[test]
    fn test_ticket_auth() {
        let (kind, msg) = classify_error(
            "ticket system authentication failed (HTTP 401): Unauthorized",
            AgentName::Ticket,
        );
        assert_eq!(kind, ErrorKind::TicketAuthFailure);
        assert!(!msg.contains("401"));
    }

    #[test]
    fn test_bare_unauthorized_uses_agent() {
        assert_eq!(
            classify_error("HTTP 401 Unauthorized", AgentName::Ticket).0,
            ErrorKind::TicketAuthFailure
        );
        assert_eq!(
            classify_error("HTTP 401 Unauthorized", AgentName::General).0,
            ErrorKind::LanguageModelUnavailable
        );
    }

    #[test]
    fn test_language_model() {
        assert_eq!(
            classify_error("language model request timed out: 30s", AgentName::General).0,
            ErrorKind::LanguageModelUnavailable
        );
        assert_eq!(
            classify_error("Incorrect API key provided", AgentName::General).0,
            ErrorKind::LanguageModelUnavailable
        );
    }

    #[test]
    fn test_relationship_store() {
        assert_eq!(
            classify_error("relationship store unreachable: connection refused", AgentName::Relationship).0,
            ErrorKind::RelationshipStoreUnavailable
        );
    }

    #[test]
    fn test_connectivity() {
        assert_eq!(
            classify_error("ticket system request timed out: deadline", AgentName::Ticket).0,
            ErrorKind::Connectivity
        );
        assert_eq!(
            classify_error("error sending request: connection reset", AgentName::Ticket).0,
            ErrorKind::Connectivity
        );
    }

    #[test]
    fn test_generic_fallback() {
        assert_eq!(classify_error("", AgentName::General).0, ErrorKind::Generic);
        assert_eq!(
            classify_error("ticket system: not found: issue OPS-9", AgentName::Ticket).0,
            ErrorKind::Generic
        );
    }

    #[test]
    fn test_status_digits_in_keys_are_not_auth() {
        for raw in [
            "ticket system: not found: issue OPS-401",
            "ticket system: not found: issue PGA-1403",
            "ticket system API error (500): index 4015 out of range",
        ] {
            assert_eq!(
                classify_error(raw, AgentName::Ticket).0,
                ErrorKind::Generic,
                "{}",
                raw
            );
        }
        assert_eq!(
            classify_error("ticket system API error (403): no browse permission", AgentName::Ticket).0,
            ErrorKind::TicketAuthFailure
        );
        assert_eq!(
            classify_error("request failed with status code 401", AgentName::Ticket).0,
            ErrorKind::TicketAuthFailure
        );
    }

    #[test]
    fn test_capture_falls_back_to_source() {
        let failure = CapturedFailure::new(
            AgentName::Relationship,
            FailureSource::RelationshipStore,
            "something odd",
        );
        assert_eq!(failure.kind, ErrorKind::RelationshipStoreUnavailable);

        let failure = CapturedFailure::new(AgentName::Ticket, FailureSource::TicketSystem, "odd");
        assert_eq!(failure.kind, ErrorKind::Generic);
    }
}
