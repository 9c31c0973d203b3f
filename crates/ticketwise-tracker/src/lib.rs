//! Issue-tracker capability for ticketwise.
//!
//! The orchestration core reaches the issue tracker only through the
//! [`IssueTracker`] trait. [`JiraClient`] implements it against the Jira REST
//! API; [`MockTracker`] (behind the `testing` feature) scripts it for tests.

pub mod error;
pub mod jira;
pub mod tracker;
pub mod types;

pub use error::{Result, TrackerError};
pub use jira::{JiraClient, JiraClientBuilder};
#[cfg(any(test, feature = "testing"))]
pub use tracker::MockTracker;
pub use tracker::{IssueTracker, SharedTracker};
pub use types::{Issue, IssueUpdate, NewIssue};
