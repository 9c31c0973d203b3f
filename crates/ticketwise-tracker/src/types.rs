//! Issue types exchanged with the tracker.

use serde::{Deserialize, Serialize};

/// A tracked work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue key, e.g. `ABC-123`.
    pub key: String,
    /// One-line summary.
    pub title: String,
    /// Workflow status name.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    /// Browse URL, when the tracker provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Issue {
    /// Create an issue with the required fields.
    pub fn new(key: impl Into<String>, title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            status: status.into(),
            assignee: None,
            priority: None,
            issue_type: None,
            url: None,
        }
    }

    /// Set the assignee.
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Set the issue type.
    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = Some(issue_type.into());
        self
    }

    /// Project key portion of the issue key.
    pub fn project(&self) -> &str {
        self.key.split('-').next().unwrap_or(&self.key)
    }
}

/// Parameters for creating an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub project: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub issue_type: String,
}

impl NewIssue {
    /// Create a new issue request with the default `Task` type.
    pub fn new(project: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            title: title.into(),
            body: String::new(),
            issue_type: "Task".to_string(),
        }
    }

    /// Set the description body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the issue type.
    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = issue_type.into();
        self
    }
}

/// Field changes for an existing issue. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl IssueUpdate {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.assignee.is_none()
            && self.priority.is_none()
    }

    /// Apply the changes to an in-memory issue.
    pub fn apply_to(&self, issue: &mut Issue) {
        if let Some(ref title) = self.title {
            issue.title = title.clone();
        }
        if let Some(ref status) = self.status {
            issue.status = status.clone();
        }
        if let Some(ref assignee) = self.assignee {
            issue.assignee = Some(assignee.clone());
        }
        if let Some(ref priority) = self.priority {
            issue.priority = Some(priority.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_project() {
        let issue = Issue::new("PLAT-42", "Fix login", "Open");
        assert_eq!(issue.project(), "PLAT");
    }

    #[test]
    fn test_update_apply() {
        let mut issue = Issue::new("A-1", "Old", "To Do");
        let update = IssueUpdate {
            status: Some("In Progress".into()),
            assignee: Some("alice".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        update.apply_to(&mut issue);
        assert_eq!(issue.title, "Old");
        assert_eq!(issue.status, "In Progress");
        assert_eq!(issue.assignee.as_deref(), Some("alice"));
        assert!(IssueUpdate::default().is_empty());
    }
}
