//! Properties every turn must hold, whatever the collaborators do.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{Harness, classify_as, three_issues};
use ticketwise_agent::{AgentError, AgentName, ErrorKind, FALLBACK_ANSWER, TaskType};
use ticketwise_graph::{GraphError, MockGraph};
use ticketwise_llm::MockResponse;
use ticketwise_tracker::{MockTracker, TrackerError};
use tokio_util::sync::CancellationToken;

const TECHNICAL_MARKERS: &[&str] = &[
    "401",
    "HTTP",
    "refused",
    "timed out",
    "ticket system",
    "relationship store",
    "language model",
    "Unauthorized",
];

fn assert_user_safe(answer: &str) {
    assert!(!answer.trim().is_empty(), "empty answer");
    for marker in TECHNICAL_MARKERS {
        assert!(
            !answer.contains(marker),
            "technical detail {:?} leaked into {:?}",
            marker,
            answer
        );
    }
}

#[tokio::test]
async fn test_language_model_down_still_answers() {
    let harness = Harness::builder(Vec::new())
        .fallback(MockResponse::Error("language model backend error: 503 upstream".into()))
        .build();

    let outcome = harness.orchestrator.run_turn("tell me a joke", None).await;
    assert_eq!(outcome.task_type, Some(TaskType::General));
    assert_eq!(outcome.error_kind, Some(ErrorKind::LanguageModelUnavailable));
    assert_eq!(outcome.answer, ErrorKind::LanguageModelUnavailable.user_message());
    assert_user_safe(&outcome.answer);
}

#[tokio::test]
async fn test_tracker_connection_failure_is_connectivity() {
    let harness = Harness::builder(vec![classify_as("ticket_ops")])
        .tracker(MockTracker::failing(TrackerError::Network(
            "connection refused (os error 111)".into(),
        )))
        .build();

    let answer = harness.orchestrator.run("show my tickets", None).await;
    assert_eq!(answer, ErrorKind::Connectivity.user_message());
    assert_user_safe(&answer);
}

#[tokio::test(start_paused = true)]
async fn test_slow_tracker_is_bounded() {
    let harness = Harness::builder(vec![classify_as("ticket_ops")])
        .tracker(MockTracker::with_issues(three_issues()).with_delay(Duration::from_secs(600)))
        .agent_timeout(Duration::from_secs(5))
        .build();

    let outcome = harness.orchestrator.run_turn("show my tickets", None).await;
    assert_eq!(outcome.error_kind, Some(ErrorKind::Connectivity));
    assert_user_safe(&outcome.answer);
    assert!(harness.observer.contains("timed out after 5s"));
}

#[tokio::test]
async fn test_relationship_query_failure_is_captured() {
    let harness = Harness::builder(vec![classify_as("relationship_reasoning")])
        .graph(MockGraph::new(Vec::new()).with_failure(GraphError::Unavailable(
            "neo4j://graph:7687 connection reset".into(),
        )))
        .start()
        .await;

    let outcome = harness.orchestrator.run_turn("what blocks OPS-9?", None).await;
    assert_eq!(outcome.agent, Some(AgentName::Relationship));
    assert_eq!(outcome.error_kind, Some(ErrorKind::RelationshipStoreUnavailable));
    assert_user_safe(&outcome.answer);
}

#[tokio::test]
async fn test_unconfigured_tracker_answers() {
    let backend = ticketwise_llm::MockBackend::new(vec![classify_as("ticket_ops")]);
    let orchestrator = ticketwise_agent::Orchestrator::builder()
        .with_backend(backend)
        .build()
        .unwrap();

    let outcome = orchestrator.run_turn("list open bugs", None).await;
    assert_eq!(outcome.error_kind, Some(ErrorKind::TicketAuthFailure));
    assert_user_safe(&outcome.answer);
}

#[tokio::test]
async fn test_unavailable_store_never_routes_to_relationship_agent() {
    let inputs = [
        "why is OPS-12 blocked?",
        "what does OPS-7 block",
        "what changed this week",
        "show the dependency graph",
    ];
    let harness = Harness::builder(Vec::new())
        .fallback(classify_as("relationship_reasoning"))
        .graph(MockGraph::unreachable())
        .start()
        .await;

    for input in inputs {
        let outcome = harness.orchestrator.run_turn(input, None).await;
        assert_ne!(outcome.agent, Some(AgentName::Relationship), "{}", input);
        assert_ne!(outcome.task_type, Some(TaskType::RelationshipReasoning), "{}", input);
        assert!(!outcome.answer.is_empty());
    }
    assert!(harness.graph.patterns().is_empty());
}

#[tokio::test]
async fn test_exactly_one_agent_per_turn() {
    let harness = Harness::builder(vec![classify_as("ticket_ops")])
        .tracker(MockTracker::with_issues(three_issues()))
        .build();

    let outcome = harness.orchestrator.run_turn("open tickets in OPS", None).await;
    assert_eq!(outcome.agent, Some(AgentName::Ticket));
    assert_eq!(outcome.metadata["agent"], "ticket");
    assert_eq!(outcome.metadata["requested_task_type"], "ticket_ops");
    // Only the classifier reached the model; the general agent never ran.
    assert_eq!(harness.backend.request_count(), 1);
    assert_eq!(harness.tracker.calls(), vec!["search".to_string()]);
    assert!(harness.graph.patterns().is_empty());
}

#[test]
fn test_every_error_kind_has_a_distinct_fixed_message() {
    let messages: HashSet<&str> = ErrorKind::ALL.iter().map(|k| k.user_message()).collect();
    assert_eq!(messages.len(), ErrorKind::ALL.len());
    for kind in ErrorKind::ALL {
        assert_user_safe(kind.user_message());
        assert_ne!(kind.user_message(), FALLBACK_ANSWER);
    }
}

#[tokio::test]
async fn test_same_conversation_sees_earlier_turns() {
    let harness = Harness::builder(vec![
        classify_as("general"),
        MockResponse::text("Nice to meet you, Robin."),
        classify_as("general"),
        MockResponse::text("You told me your name is Robin."),
        classify_as("general"),
        MockResponse::text("I don't know your name yet."),
    ])
    .build();

    harness.orchestrator.run("my name is Robin", Some("alpha")).await;
    harness.orchestrator.run("what is my name?", Some("alpha")).await;
    harness.orchestrator.run("what is my name?", Some("beta")).await;

    let requests = harness.backend.requests();
    let contents = |i: usize| -> Vec<String> {
        requests[i].messages.iter().map(|m| m.content.clone()).collect()
    };

    // Request 3 is alpha's second general call; request 5 is beta's.
    assert_eq!(
        contents(3),
        vec![
            "my name is Robin".to_string(),
            "Nice to meet you, Robin.".to_string(),
            "what is my name?".to_string(),
        ]
    );
    assert_eq!(contents(5), vec!["what is my name?".to_string()]);

    let store = harness.orchestrator.session_store();
    assert_eq!(store.load("alpha").await.unwrap().len(), 4);
    assert_eq!(store.load("beta").await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_turns_on_one_conversation_are_serialized() {
    let harness = Harness::builder(Vec::new())
        .fallback(classify_as("ticket_ops"))
        .tracker(MockTracker::with_issues(three_issues()).with_delay(Duration::from_millis(50)))
        .build();
    let orchestrator = &harness.orchestrator;

    let (a, b) = tokio::join!(
        orchestrator.run_turn("list my tickets", Some("shared")),
        orchestrator.run_turn("list my tickets", Some("shared")),
    );
    assert!(a.error_kind.is_none() && b.error_kind.is_none());

    // Without serialization the second save would overwrite the first.
    let history = orchestrator.session_store().load("shared").await.unwrap();
    assert_eq!(history.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_turn_leaves_history_untouched() {
    let harness = Harness::builder(Vec::new())
        .fallback(classify_as("ticket_ops"))
        .tracker(MockTracker::with_issues(three_issues()).with_delay(Duration::from_secs(10)))
        .build();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = harness
        .orchestrator
        .run_turn_with_cancel("list my tickets", Some("c-cancel"), cancel)
        .await;
    assert!(matches!(result, Err(AgentError::Cancelled)));

    let store = harness.orchestrator.session_store();
    assert!(store.load("c-cancel").await.unwrap().is_empty());

    // The conversation lock was released.
    let outcome = tokio::time::timeout(
        Duration::from_secs(60),
        harness.orchestrator.run_turn("list my tickets", Some("c-cancel")),
    )
    .await
    .expect("second turn completes");
    assert!(outcome.answer.starts_with("Found 3 tickets:"));
    assert_eq!(store.load("c-cancel").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_probe_per_request_sees_store_going_down() {
    let harness = Harness::builder(Vec::new())
        .fallback(classify_as("relationship_reasoning"))
        .config(|c| c.probe_per_request = true)
        .start()
        .await;
    assert!(harness.orchestrator.capabilities().relationship_store);

    let first = harness.orchestrator.run_turn("what blocks OPS-1?", None).await;
    assert_eq!(first.agent, Some(AgentName::Relationship));

    harness.graph.set_reachable(false);
    let second = harness.orchestrator.run_turn("what blocks OPS-1?", None).await;
    assert_eq!(second.agent, Some(AgentName::Ticket));
    assert_eq!(second.metadata["downgraded_from"], "relationship_reasoning");
    assert_eq!(harness.graph.probe_count(), 3);
}

#[tokio::test]
async fn test_generated_conversation_ids_are_distinct() {
    let harness = Harness::builder(Vec::new())
        .fallback(MockResponse::text("general"))
        .build();
    let a = harness.orchestrator.run_turn("hi", None).await;
    let b = harness.orchestrator.run_turn("hi", None).await;
    assert_ne!(a.conversation_id, b.conversation_id);
    assert!(!a.conversation_id.is_empty());
}

#[tokio::test]
async fn test_configured_secret_never_logged() {
    let harness = Harness::builder(vec![classify_as("ticket_ops")])
        .tracker(MockTracker::failing(TrackerError::Api {
            status: 500,
            message: "upstream rejected s3cr3t-jira-token".into(),
        }))
        .secret("s3cr3t-jira-token")
        .build();

    let outcome = harness.orchestrator.run_turn("list my tickets", None).await;
    assert_user_safe(&outcome.answer);
    assert!(!harness.observer.contains("s3cr3t-jira-token"));
    assert!(harness.observer.contains("[REDACTED]"));
}
