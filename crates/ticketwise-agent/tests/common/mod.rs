//! Shared harness for orchestrator integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ticketwise_agent::{Orchestrator, OrchestratorConfig, RecordingObserver};
use ticketwise_graph::MockGraph;
use ticketwise_llm::{MockBackend, MockResponse};
use ticketwise_tracker::{Issue, MockTracker};

/// A scripted classifier reply selecting `task_type`.
pub fn classify_as(task_type: &str) -> MockResponse {
    MockResponse::text(format!(
        r#"{{"task_type": "{}", "reasoning": "scripted"}}"#,
        task_type
    ))
}

pub fn three_issues() -> Vec<Issue> {
    vec![
        Issue::new("OPS-101", "Rotate TLS certificates", "In Progress").with_assignee("me"),
        Issue::new("OPS-102", "Upgrade Postgres to 16", "To Do").with_assignee("me"),
        Issue::new("OPS-107", "Fix flaky deploy job", "Open").with_assignee("me"),
    ]
}

/// An orchestrator over mocks, with handles kept for assertions.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub backend: Arc<MockBackend>,
    pub tracker: Arc<MockTracker>,
    pub graph: Arc<MockGraph>,
    pub observer: Arc<RecordingObserver>,
}

pub struct HarnessBuilder {
    backend: MockBackend,
    tracker: MockTracker,
    graph: MockGraph,
    config: OrchestratorConfig,
    secrets: Vec<String>,
}

impl Harness {
    pub fn builder(responses: Vec<MockResponse>) -> HarnessBuilder {
        HarnessBuilder {
            backend: MockBackend::new(responses),
            tracker: MockTracker::new(),
            graph: MockGraph::new(Vec::new()),
            config: OrchestratorConfig {
                model: "test-model".to_string(),
                ..OrchestratorConfig::default()
            },
            secrets: Vec::new(),
        }
    }
}

impl HarnessBuilder {
    pub fn fallback(mut self, reply: MockResponse) -> Self {
        self.backend = self.backend.with_fallback(reply);
        self
    }

    pub fn tracker(mut self, tracker: MockTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn graph(mut self, graph: MockGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn config(mut self, f: impl FnOnce(&mut OrchestratorConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn secret(mut self, secret: &str) -> Self {
        self.secrets.push(secret.to_string());
        self
    }

    pub fn agent_timeout(self, timeout: Duration) -> Self {
        self.config(|c| c.agent_timeout = timeout)
    }

    /// Build without probing; the relationship store counts as unavailable.
    pub fn build(self) -> Harness {
        let backend = Arc::new(self.backend);
        let tracker = Arc::new(self.tracker);
        let graph = Arc::new(self.graph);
        let observer = Arc::new(RecordingObserver::new());

        let mut builder = Orchestrator::builder()
            .with_shared_backend(backend.clone())
            .with_tracker(tracker.clone())
            .with_graph(graph.clone())
            .with_observer(observer.clone())
            .with_config(self.config);
        for secret in self.secrets {
            builder = builder.with_secret(secret);
        }

        Harness {
            orchestrator: builder.build().expect("orchestrator builds"),
            backend,
            tracker,
            graph,
            observer,
        }
    }

    /// Build and run the startup probe.
    pub async fn start(self) -> Harness {
        let harness = self.build();
        harness.orchestrator.probe_capabilities().await;
        harness
    }
}
