//! Ticket agent: plans tracker operations from request wording and
//! summarises the results.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use ticketwise_session::EntryRole;
use ticketwise_tracker::{Issue, IssueUpdate, NewIssue, SharedTracker, TrackerError};

use super::jql::{build_jql, project_key};
use super::{CallFailure, DEFAULT_AGENT_TIMEOUT, ISSUE_KEY, bounded, record};
use crate::failure::FailureSource;
use crate::redact::Redactor;
use crate::state::{AgentName, AgentOutcome, AgentPayload, ConversationState};

/// Default cap on search results.
pub const DEFAULT_MAX_RESULTS: usize = 50;

const ASK_PROJECT: &str = "Could you please tell me the project key for the new ticket (for example, OPS)?";
pub(crate) const ASK_TITLE: &str = "Could you please tell me the title for the new ticket? You can put it in quotes or after a colon, for example: create a bug in project OPS: Login page fails";

static CREATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcreate\b|\b(?:open|file|raise|add|log)\s+(?:a|an)\b|\bnew\s+(?:ticket|bug|story|task|epic|issue)\b")
        .expect("create pattern compiles")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["“]([^"”]+)["”]"#).expect("quoted pattern compiles"));

const UPDATE_WORDS: &[&str] = &[
    "move", "set", "assign", "reassign", "transition", "update", "change", "mark",
];

// ─────────────────────────────────────────────────────────────────────────────
// Planning
// ─────────────────────────────────────────────────────────────────────────────

/// What the ticket agent will do for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketPlan {
    Search { jql: String },
    Get { key: String },
    Create(NewIssue),
    Update { key: String, update: IssueUpdate },
    /// Not enough information; ask the user.
    Clarify { question: String },
}

impl TicketPlan {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Search { .. } => "search",
            Self::Get { .. } => "get",
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Clarify { .. } => "clarify",
        }
    }
}

/// Plan the tracker operation for `request`.
pub fn plan_ticket_operation(request: &str, default_project: Option<&str>) -> TicketPlan {
    let words: Vec<String> = request
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let has_word = |set: &[&str]| words.iter().any(|w| set.contains(&w.as_str()));

    if let Some(key) = ISSUE_KEY.captures(request).and_then(|c| c.get(1)) {
        let key = key.as_str().to_string();
        if has_word(UPDATE_WORDS) {
            let update = parse_update(request, &words);
            if update.is_empty() {
                return TicketPlan::Clarify {
                    question: format!(
                        "What should I change on {}? For example: move {} to In Progress",
                        key, key
                    ),
                };
            }
            return TicketPlan::Update { key, update };
        }
        if !CREATE.is_match(request) {
            return TicketPlan::Get { key };
        }
    }

    if CREATE.is_match(request) {
        let Some(title) = extract_title(request) else {
            return TicketPlan::Clarify {
                question: ASK_TITLE.to_string(),
            };
        };
        let Some(project) = project_key(request).or(default_project) else {
            return TicketPlan::Clarify {
                question: ASK_PROJECT.to_string(),
            };
        };
        let issue_type = issue_type_of(&words);
        return TicketPlan::Create(
            NewIssue::new(project, title)
                .with_issue_type(issue_type)
                .with_body(format!("Created by ticketwise from the request: {}", request)),
        );
    }

    TicketPlan::Search {
        jql: build_jql(request),
    }
}

fn parse_update(request: &str, words: &[String]) -> IssueUpdate {
    let lower = request.to_ascii_lowercase();
    let mut update = IssueUpdate::default();
    let Some(idx) = lower.rfind(" to ") else {
        return update;
    };
    let value = request[idx + 4..]
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '!' || c == '?')
        .trim();
    if value.is_empty() {
        return update;
    }

    let has = |w: &str| words.iter().any(|x| x == w);
    if has("priority") {
        update.priority = Some(title_case(value));
    } else if has("title") || has("summary") {
        update.title = Some(extract_title(&request[idx..]).unwrap_or_else(|| value.to_string()));
    } else if has("assign") || has("reassign") || has("assignee") {
        update.assignee = Some(value.to_string());
    } else {
        update.status = Some(normalize_status(value));
    }
    update
}

fn extract_title(request: &str) -> Option<String> {
    if let Some(quoted) = QUOTED.captures(request).and_then(|c| c.get(1)) {
        let title = quoted.as_str().trim();
        if !title.is_empty() {
            return Some(title.to_string());
        }
    }
    request
        .split_once(':')
        .map(|(_, rest)| rest.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn issue_type_of(words: &[String]) -> &'static str {
    for (forms, name) in [
        (&["bug", "defect"][..], "Bug"),
        (&["story"][..], "Story"),
        (&["epic"][..], "Epic"),
    ] {
        if words.iter().any(|w| forms.contains(&w.as_str())) {
            return name;
        }
    }
    "Task"
}

fn normalize_status(value: &str) -> String {
    match value.to_lowercase().as_str() {
        "in progress" | "progress" | "in-progress" => "In Progress".to_string(),
        "to do" | "todo" => "To Do".to_string(),
        "done" | "complete" | "completed" => "Done".to_string(),
        _ => title_case(value),
    }
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// Adapter over the issue tracker.
pub struct TicketAgent {
    tracker: Option<SharedTracker>,
    default_project: Option<String>,
    max_results: usize,
    timeout: Duration,
    redactor: Arc<Redactor>,
}

impl std::fmt::Debug for TicketAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketAgent")
            .field("tracker", &self.tracker.as_ref().map(|t| t.name().to_string()))
            .field("default_project", &self.default_project)
            .field("max_results", &self.max_results)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TicketAgent {
    /// `None` means no tracker is configured; every operation then fails.
    pub fn new(tracker: Option<SharedTracker>) -> Self {
        Self {
            tracker,
            default_project: None,
            max_results: DEFAULT_MAX_RESULTS,
            timeout: DEFAULT_AGENT_TIMEOUT,
            redactor: Arc::new(Redactor::new()),
        }
    }

    pub fn with_default_project(mut self, project: Option<String>) -> Self {
        self.default_project = project;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
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
        let (request, project) = effective_request(state);
        let project = project.or_else(|| self.default_project.clone());
        let plan = plan_ticket_operation(&request, project.as_deref());
        state.annotate("ticket_plan", plan.label());
        if let TicketPlan::Search { ref jql } = plan {
            state.annotate("jql", jql.clone());
        }
        tracing::debug!(
            conversation_id = state.conversation_id(),
            plan = plan.label(),
            "ticket agent planned"
        );

        let outcome = match self.run(plan).await {
            Ok(payload) => AgentOutcome::Success(payload),
            Err(failure) => AgentOutcome::Failure(failure.capture(AgentName::Ticket, &self.redactor)),
        };
        record(state, AgentName::Ticket, outcome);
    }

    async fn run(&self, plan: TicketPlan) -> Result<AgentPayload, CallFailure> {
        if let TicketPlan::Clarify { question } = plan {
            return Ok(AgentPayload::verbatim(question));
        }
        let tracker = self
            .tracker
            .as_ref()
            .ok_or_else(|| CallFailure::new(FailureSource::TicketSystem, "ticket system not configured"))?;

        match plan {
            TicketPlan::Search { jql } => {
                let issues = self.call(tracker.search(&jql, self.max_results)).await?;
                Ok(summarize_search(&issues, self.max_results))
            }
            TicketPlan::Get { key } => {
                let issue = self.call(tracker.get(&key)).await?;
                Ok(AgentPayload::new(describe_issue(&issue), 1))
            }
            TicketPlan::Create(new) => {
                let project = new.project.clone();
                let issue = self.call(tracker.create(new)).await?;
                Ok(AgentPayload::new(
                    format!(
                        "Created {} in project {}: {} ({}).",
                        issue.key,
                        project,
                        issue.title,
                        issue.issue_type.as_deref().unwrap_or("Task")
                    ),
                    1,
                ))
            }
            TicketPlan::Update { key, update } => {
                let changes = describe_update(&update);
                let issue = self.call(tracker.update(&key, update)).await?;
                Ok(AgentPayload::new(
                    format!("Updated {} ({}).\n{}", issue.key, changes, issue_line(1, &issue)),
                    1,
                ))
            }
            TicketPlan::Clarify { question } => Ok(AgentPayload::verbatim(question)),
        }
    }

    async fn call<T>(
        &self,
        fut: impl std::future::Future<Output = ticketwise_tracker::Result<T>>,
    ) -> Result<T, CallFailure> {
        bounded("ticket system", self.timeout, tracker_source, fut).await
    }
}

fn tracker_source(err: &TrackerError) -> FailureSource {
    match err {
        TrackerError::Network(_) | TrackerError::Timeout(_) => FailureSource::Connectivity,
        _ => FailureSource::TicketSystem,
    }
}

/// The request to plan, plus a project key supplied as a follow-up answer.
///
/// When the user is answering one of our clarifying questions, the earlier
/// request is resumed with the answer filled in.
fn effective_request(state: &ConversationState) -> (String, Option<String>) {
    let input = state.user_input().trim();
    let unchanged = (input.to_string(), None);
    let entries = state.history().entries();
    let Some((last, earlier)) = entries.split_last() else {
        return unchanged;
    };
    if last.role != EntryRole::Assistant {
        return unchanged;
    }
    let Some(previous) = earlier.iter().rev().find(|e| e.role == EntryRole::User) else {
        return unchanged;
    };

    // Titles run long; project keys are a word or two.
    if last.content == ASK_PROJECT && input.split_whitespace().count() <= 3 {
        (previous.content.clone(), Some(input.to_uppercase()))
    } else if last.content == ASK_TITLE && !input.is_empty() {
        (format!("{}: {}", previous.content, input), None)
    } else {
        unchanged
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatting
// ─────────────────────────────────────────────────────────────────────────────

fn issue_line(n: usize, issue: &Issue) -> String {
    let mut line = format!("{}. {}: {} ({})", n, issue.key, issue.title, issue.status);
    let extras: Vec<String> = [
        issue.assignee.as_ref().map(|a| format!("assignee: {}", a)),
        issue.priority.as_ref().map(|p| format!("priority: {}", p)),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !extras.is_empty() {
        line.push_str(&format!(" [{}]", extras.join(", ")));
    }
    line
}

fn summarize_search(issues: &[Issue], max_results: usize) -> AgentPayload {
    if issues.is_empty() {
        return AgentPayload::new("No matching tickets were found.", 0);
    }
    let noun = if issues.len() == 1 { "ticket" } else { "tickets" };
    let mut lines = vec![format!("Found {} {}:", issues.len(), noun)];
    lines.extend(issues.iter().enumerate().map(|(i, issue)| issue_line(i + 1, issue)));
    if issues.len() >= max_results {
        lines.push(format!(
            "Showing the first {} results; narrow the request to see more.",
            max_results
        ));
    }
    AgentPayload::new(lines.join("\n"), issues.len())
}

fn describe_issue(issue: &Issue) -> String {
    let mut lines = vec![
        format!("{}: {}", issue.key, issue.title),
        format!("Status: {}", issue.status),
    ];
    if let Some(ref t) = issue.issue_type {
        lines.push(format!("Type: {}", t));
    }
    lines.push(format!(
        "Assignee: {}",
        issue.assignee.as_deref().unwrap_or("Unassigned")
    ));
    if let Some(ref p) = issue.priority {
        lines.push(format!("Priority: {}", p));
    }
    if let Some(ref url) = issue.url {
        lines.push(format!("Link: {}", url));
    }
    lines.join("\n")
}

fn describe_update(update: &IssueUpdate) -> String {
    [
        update.status.as_ref().map(|s| format!("status set to {}", s)),
        update.assignee.as_ref().map(|a| format!("assigned to {}", a)),
        update.priority.as_ref().map(|p| format!("priority set to {}", p)),
        update.title.as_ref().map(|t| format!("title set to \"{}\"", t)),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketwise_session::{History, HistoryEntry};
    use ticketwise_tracker::MockTracker;

    fn agent(tracker: MockTracker) -> TicketAgent {
        TicketAgent::new(Some(Arc::new(tracker)))
    }

    fn state(input: &str) -> ConversationState {
        ConversationState::new("c1", input, History::new())
    }

    #[test]
    fn test_plan_get_and_update() {
        assert_eq!(
            plan_ticket_operation("show me OPS-12", None),
            TicketPlan::Get { key: "OPS-12".into() }
        );

        let TicketPlan::Update { key, update } =
            plan_ticket_operation("Move OPS-12 to in progress", None)
        else {
            panic!("expected update");
        };
        assert_eq!(key, "OPS-12");
        assert_eq!(update.status.as_deref(), Some("In Progress"));

        let TicketPlan::Update { update, .. } =
            plan_ticket_operation("assign OPS-3 to alice.smith", None)
        else {
            panic!("expected update");
        };
        assert_eq!(update.assignee.as_deref(), Some("alice.smith"));

        let TicketPlan::Update { update, .. } =
            plan_ticket_operation("set priority of OPS-3 to high", None)
        else {
            panic!("expected update");
        };
        assert_eq!(update.priority.as_deref(), Some("High"));

        assert!(matches!(
            plan_ticket_operation("update OPS-3", None),
            TicketPlan::Clarify { .. }
        ));
    }

    #[test]
    fn test_plan_create() {
        let TicketPlan::Create(new) =
            plan_ticket_operation("Create a bug in project OPS: Login page fails", None)
        else {
            panic!("expected create");
        };
        assert_eq!(new.project, "OPS");
        assert_eq!(new.title, "Login page fails");
        assert_eq!(new.issue_type, "Bug");

        let TicketPlan::Create(new) =
            plan_ticket_operation("file a ticket \"Renew TLS cert\"", Some("INFRA"))
        else {
            panic!("expected create");
        };
        assert_eq!(new.project, "INFRA");
        assert_eq!(new.issue_type, "Task");

        assert_eq!(
            plan_ticket_operation("create a story: onboarding flow", None),
            TicketPlan::Clarify {
                question: ASK_PROJECT.to_string()
            }
        );
        assert_eq!(
            plan_ticket_operation("create a new ticket", Some("OPS")),
            TicketPlan::Clarify {
                question: ASK_TITLE.to_string()
            }
        );
    }

    #[test]
    fn test_plan_search() {
        assert_eq!(
            plan_ticket_operation("What tickets are assigned to me?", None),
            TicketPlan::Search {
                jql: "assignee = currentUser() ORDER BY created DESC".into()
            }
        );
    }

    #[tokio::test]
    async fn test_search_enumerates_every_item() {
        let tracker = MockTracker::with_issues(vec![
            Issue::new("OPS-1", "Rotate certs", "Open").with_assignee("Alice"),
            Issue::new("OPS-2", "Patch kernel", "In Progress").with_priority("High"),
        ]);
        let mut s = state("my open tickets");
        agent(tracker).execute(&mut s).await;

        let AgentOutcome::Success(payload) = s.result(AgentName::Ticket).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(payload.item_count, 2);
        assert!(payload.summary.contains("1. OPS-1: Rotate certs (Open) [assignee: Alice]"));
        assert!(payload.summary.contains("2. OPS-2: Patch kernel (In Progress) [priority: High]"));
        assert_eq!(s.metadata()["ticket_plan"], "search");
    }

    #[tokio::test]
    async fn test_empty_search() {
        let mut s = state("tickets created today");
        agent(MockTracker::new()).execute(&mut s).await;
        let AgentOutcome::Success(payload) = s.result(AgentName::Ticket).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(payload.summary, "No matching tickets were found.");
    }

    #[tokio::test]
    async fn test_result_cap_is_reported() {
        let issues = (1..=5)
            .map(|n| Issue::new(format!("OPS-{}", n), "t", "Open"))
            .collect();
        let mut s = state("show tickets");
        agent(MockTracker::with_issues(issues))
            .with_max_results(3)
            .execute(&mut s)
            .await;
        let AgentOutcome::Success(payload) = s.result(AgentName::Ticket).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(payload.item_count, 3);
        assert!(payload.summary.contains("Showing the first 3 results"));
    }

    #[tokio::test]
    async fn test_auth_failure_is_captured_and_redacted() {
        let tracker = MockTracker::failing(TrackerError::auth(401, "token=abc123 rejected"));
        let mut s = state("my tickets");
        agent(tracker).execute(&mut s).await;

        let failure = s.result(AgentName::Ticket).unwrap().failure().unwrap().clone();
        assert_eq!(failure.kind, crate::ErrorKind::TicketAuthFailure);
        assert_eq!(failure.source, FailureSource::TicketSystem);
        assert!(!failure.detail.contains("abc123"));
    }

    #[tokio::test]
    async fn test_missing_tracker() {
        let mut s = state("my tickets");
        TicketAgent::new(None).execute(&mut s).await;
        let failure = s.result(AgentName::Ticket).unwrap().failure().unwrap();
        assert_eq!(failure.kind, crate::ErrorKind::TicketAuthFailure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tracker_times_out() {
        let tracker = MockTracker::new().with_delay(Duration::from_secs(120));
        let mut s = state("my tickets");
        agent(tracker)
            .with_timeout(Duration::from_secs(5))
            .execute(&mut s)
            .await;
        let failure = s.result(AgentName::Ticket).unwrap().failure().unwrap();
        assert_eq!(failure.kind, crate::ErrorKind::Connectivity);
    }

    #[tokio::test]
    async fn test_clarification_follow_up_creates() {
        let tracker = Arc::new(MockTracker::new());
        let agent = TicketAgent::new(Some(tracker.clone()));
        let history = History::from_entries(vec![
            HistoryEntry::user("create a bug: login fails"),
            HistoryEntry::assistant(ASK_PROJECT),
        ]);
        let mut s = ConversationState::new("c1", "ops", history);
        agent.execute(&mut s).await;

        let AgentOutcome::Success(payload) = s.result(AgentName::Ticket).unwrap() else {
            panic!("expected success");
        };
        assert!(payload.summary.starts_with("Created OPS-1 in project OPS: login fails (Bug)"));
        assert_eq!(tracker.issues().len(), 1);
    }

    #[tokio::test]
    async fn test_long_title_answer_creates() {
        let tracker = Arc::new(MockTracker::new());
        let agent = TicketAgent::new(Some(tracker.clone()));
        let history = History::from_entries(vec![
            HistoryEntry::user("create a bug in project OPS"),
            HistoryEntry::assistant(ASK_TITLE),
        ]);
        let mut s = ConversationState::new("c1", "Login page fails on Safari", history);
        agent.execute(&mut s).await;

        let AgentOutcome::Success(payload) = s.result(AgentName::Ticket).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(
            payload.summary,
            "Created OPS-1 in project OPS: Login page fails on Safari (Bug)."
        );
        assert_eq!(s.metadata()["ticket_plan"], "create");
        assert_eq!(tracker.issues().len(), 1);
    }

    #[test]
    fn test_long_reply_to_project_question_is_a_new_request() {
        let history = History::from_entries(vec![
            HistoryEntry::user("create a bug: login fails"),
            HistoryEntry::assistant(ASK_PROJECT),
        ]);
        let s = ConversationState::new("c1", "actually show me my open tickets", history);
        let (request, project) = effective_request(&s);
        assert_eq!(request, "actually show me my open tickets");
        assert_eq!(project, None);
    }

    #[tokio::test]
    async fn test_missing_issue_with_status_like_key_is_not_auth() {
        let mut s = state("show me OPS-401");
        agent(MockTracker::new()).execute(&mut s).await;

        let failure = s.result(AgentName::Ticket).unwrap().failure().unwrap();
        assert_eq!(failure.kind, crate::ErrorKind::Generic);
        assert!(failure.detail.contains("OPS-401"));
    }

    #[tokio::test]
    async fn test_update_reports_changes() {
        let tracker = MockTracker::with_issues(vec![Issue::new("OPS-4", "Upgrade db", "To Do")]);
        let mut s = state("move OPS-4 to done");
        agent(tracker).execute(&mut s).await;
        let AgentOutcome::Success(payload) = s.result(AgentName::Ticket).unwrap() else {
            panic!("expected success");
        };
        assert!(payload.summary.starts_with("Updated OPS-4 (status set to Done)."));
        assert!(payload.summary.contains("1. OPS-4: Upgrade db (Done)"));
    }
}
