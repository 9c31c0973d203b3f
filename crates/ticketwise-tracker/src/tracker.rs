//! The issue-tracker trait and a scripted mock.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{Issue, IssueUpdate, NewIssue};

/// Structured operations against an issue tracker.
///
/// Every method makes a single attempt; callers bound latency with their
/// own timeout.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Run a JQL search, returning at most `max_results` issues.
    async fn search(&self, jql: &str, max_results: usize) -> Result<Vec<Issue>>;

    /// Create an issue and return it as stored.
    async fn create(&self, issue: NewIssue) -> Result<Issue>;

    /// Fetch one issue by key.
    async fn get(&self, key: &str) -> Result<Issue>;

    /// Apply field changes and return the updated issue.
    async fn update(&self, key: &str, update: IssueUpdate) -> Result<Issue>;

    /// Verify credentials and reachability.
    async fn health_check(&self) -> Result<()>;

    /// Display name for logs.
    fn name(&self) -> &str;
}

/// A tracker that can be shared across threads.
pub type SharedTracker = Arc<dyn IssueTracker>;

#[cfg(any(test, feature = "testing"))]
pub use mock::MockTracker;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::IssueTracker;
    use crate::error::{Result, TrackerError};
    use crate::types::{Issue, IssueUpdate, NewIssue};

    /// In-memory tracker for tests.
    ///
    /// `search` ignores the query and returns every stored issue, so tests
    /// control results by seeding. A configured failure is returned from
    /// every operation.
    #[derive(Debug, Default)]
    pub struct MockTracker {
        issues: Mutex<Vec<Issue>>,
        failure: Option<TrackerError>,
        delay: Option<Duration>,
        queries: Mutex<Vec<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTracker {
        /// Create an empty mock tracker.
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a mock seeded with issues.
        pub fn with_issues(issues: Vec<Issue>) -> Self {
            Self {
                issues: Mutex::new(issues),
                ..Self::default()
            }
        }

        /// Make every operation fail with `err`.
        pub fn failing(err: TrackerError) -> Self {
            Self {
                failure: Some(err),
                ..Self::default()
            }
        }

        /// Sleep before answering each call.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// JQL strings passed to `search`, in order.
        pub fn queries(&self) -> Vec<String> {
            self.queries.lock().map(|q| q.clone()).unwrap_or_default()
        }

        /// Operation names invoked, in order.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        /// Snapshot of stored issues.
        pub fn issues(&self) -> Vec<Issue> {
            self.issues.lock().map(|i| i.clone()).unwrap_or_default()
        }

        async fn enter(&self, op: &str) -> Result<()> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(op.to_string());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        fn lock_issues(&self) -> Result<std::sync::MutexGuard<'_, Vec<Issue>>> {
            self.issues
                .lock()
                .map_err(|_| TrackerError::Network("mock tracker poisoned".to_string()))
        }
    }

    #[async_trait]
    impl IssueTracker for MockTracker {
        async fn search(&self, jql: &str, max_results: usize) -> Result<Vec<Issue>> {
            if let Ok(mut queries) = self.queries.lock() {
                queries.push(jql.to_string());
            }
            self.enter("search").await?;
            let issues = self.lock_issues()?;
            Ok(issues.iter().take(max_results).cloned().collect())
        }

        async fn create(&self, new: NewIssue) -> Result<Issue> {
            self.enter("create").await?;
            let mut issues = self.lock_issues()?;
            let number = issues
                .iter()
                .filter(|i| i.project() == new.project)
                .count()
                + 1;
            let issue = Issue::new(format!("{}-{}", new.project, number), new.title, "To Do")
                .with_issue_type(new.issue_type);
            issues.push(issue.clone());
            Ok(issue)
        }

        async fn get(&self, key: &str) -> Result<Issue> {
            self.enter("get").await?;
            let issues = self.lock_issues()?;
            issues
                .iter()
                .find(|i| i.key.eq_ignore_ascii_case(key))
                .cloned()
                .ok_or_else(|| TrackerError::not_found(format!("issue {}", key)))
        }

        async fn update(&self, key: &str, update: IssueUpdate) -> Result<Issue> {
            self.enter("update").await?;
            let mut issues = self.lock_issues()?;
            let issue = issues
                .iter_mut()
                .find(|i| i.key.eq_ignore_ascii_case(key))
                .ok_or_else(|| TrackerError::not_found(format!("issue {}", key)))?;
            update.apply_to(issue);
            Ok(issue.clone())
        }

        async fn health_check(&self) -> Result<()> {
            self.enter("health_check").await
        }

        fn name(&self) -> &str {
            "mock-tracker"
        }
    }
}
