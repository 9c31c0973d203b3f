//! Relationship query patterns and results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default look-back window for change history queries.
pub const DEFAULT_HISTORY_DAYS: u32 = 7;

/// A question to ask the relationship store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum RelationPattern {
    /// Issues that block the given issue.
    BlockedBy { issue: String },
    /// Issues the given issue blocks.
    Blocks { issue: String },
    /// Changes recorded in the last `days` days, optionally for one issue.
    ChangeHistory { issue: Option<String>, days: u32 },
    /// The whole blocking graph.
    Dependencies,
}

impl RelationPattern {
    /// The issue the pattern is anchored on, if any.
    pub fn issue(&self) -> Option<&str> {
        match self {
            Self::BlockedBy { issue } | Self::Blocks { issue } => Some(issue),
            Self::ChangeHistory { issue, .. } => issue.as_deref(),
            Self::Dependencies => None,
        }
    }

    /// Whether a relation answers this pattern.
    pub fn matches(&self, relation: &Relation) -> bool {
        match self {
            Self::BlockedBy { issue } => {
                relation.kind == RelationKind::Blocks && relation.to.eq_ignore_ascii_case(issue)
            }
            Self::Blocks { issue } => {
                relation.kind == RelationKind::Blocks && relation.from.eq_ignore_ascii_case(issue)
            }
            Self::ChangeHistory { issue, .. } => {
                relation.kind == RelationKind::Changed
                    && issue
                        .as_deref()
                        .is_none_or(|i| relation.from.eq_ignore_ascii_case(i))
            }
            Self::Dependencies => relation.kind == RelationKind::Blocks,
        }
    }
}

impl fmt::Display for RelationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockedBy { issue } => write!(f, "issues blocking {}", issue),
            Self::Blocks { issue } => write!(f, "issues blocked by {}", issue),
            Self::ChangeHistory {
                issue: Some(issue),
                days,
            } => write!(f, "changes to {} in the last {} days", issue, days),
            Self::ChangeHistory { issue: None, days } => {
                write!(f, "changes in the last {} days", days)
            }
            Self::Dependencies => write!(f, "all blocking dependencies"),
        }
    }
}

/// Kind of edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// `from` blocks `to`.
    Blocks,
    /// `from` (an issue) had field `to` changed.
    Changed,
}

/// One edge returned from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Timestamp as reported by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,
}

impl Relation {
    /// `from` blocks `to`.
    pub fn blocks(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind: RelationKind::Blocks,
            detail: None,
            at: None,
        }
    }

    /// A change to `field` on `issue`.
    pub fn changed(issue: impl Into<String>, field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            from: issue.into(),
            to: field.into(),
            kind: RelationKind::Changed,
            detail: Some(detail.into()),
            at: None,
        }
    }

    /// Attach a detail string.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach a timestamp.
    pub fn at(mut self, at: impl Into<String>) -> Self {
        self.at = Some(at.into());
        self
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RelationKind::Blocks => write!(f, "{} blocks {}", self.from, self.to)?,
            RelationKind::Changed => write!(f, "{} changed {}", self.from, self.to)?,
        }
        if let Some(ref detail) = self.detail {
            write!(f, " ({})", detail)?;
        }
        if let Some(ref at) = self.at {
            write!(f, " at {}", at)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        let edge = Relation::blocks("A-1", "A-2");
        assert!(RelationPattern::BlockedBy { issue: "a-2".into() }.matches(&edge));
        assert!(!RelationPattern::BlockedBy { issue: "A-1".into() }.matches(&edge));
        assert!(RelationPattern::Blocks { issue: "A-1".into() }.matches(&edge));
        assert!(RelationPattern::Dependencies.matches(&edge));

        let change = Relation::changed("A-1", "status", "To Do -> Done");
        let history = RelationPattern::ChangeHistory {
            issue: None,
            days: DEFAULT_HISTORY_DAYS,
        };
        assert!(history.matches(&change));
        assert!(!history.matches(&edge));
    }

    #[test]
    fn test_display() {
        let change = Relation::changed("A-1", "status", "Open -> Done").at("2024-05-01");
        assert_eq!(change.to_string(), "A-1 changed status (Open -> Done) at 2024-05-01");
        assert_eq!(
            RelationPattern::ChangeHistory {
                issue: Some("A-1".into()),
                days: 3
            }
            .to_string(),
            "changes to A-1 in the last 3 days"
        );
    }
}
