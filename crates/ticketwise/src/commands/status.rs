//! Status command - shows which collaborators are reachable.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use ticketwise_graph::RelationshipStore;
use ticketwise_llm::LlmBackend;
use ticketwise_tracker::IssueTracker;

use super::Context;
use crate::app::App;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Seconds to wait for each check
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,
}

#[derive(Debug, Serialize)]
struct CheckOutput {
    name: String,
    configured: bool,
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    language_model: CheckOutput,
    issue_tracker: CheckOutput,
    relationship_store: CheckOutput,
    session_backend: String,
}

async fn check<E: std::fmt::Display>(
    name: &str,
    limit: Duration,
    call: impl Future<Output = std::result::Result<(), E>>,
) -> CheckOutput {
    let error = match tokio::time::timeout(limit, call).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("no response after {}s", limit.as_secs())),
    };
    CheckOutput {
        name: name.to_string(),
        configured: true,
        reachable: error.is_none(),
        error,
    }
}

fn not_configured(name: &str) -> CheckOutput {
    CheckOutput {
        name: name.to_string(),
        configured: false,
        reachable: false,
        error: None,
    }
}

/// Run the status command.
pub async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let app = App::start(&loaded.config).await?;
    let limit = Duration::from_secs(args.timeout.max(1));

    let language_model = check(app.backend.name(), limit, app.backend.health_check()).await;
    let issue_tracker = match app.tracker {
        Some(ref tracker) => check(tracker.name(), limit, tracker.health_check()).await,
        None => not_configured("jira"),
    };
    let relationship_store = match app.graph {
        Some(ref graph) => {
            // Probe bypasses the cached flag so the answer is current.
            let reachable = tokio::time::timeout(limit, graph.is_reachable())
                .await
                .unwrap_or(false);
            CheckOutput {
                name: graph.name().to_string(),
                configured: true,
                reachable,
                error: None,
            }
        }
        None => not_configured("neo4j"),
    };

    let output = StatusOutput {
        language_model,
        issue_tracker,
        relationship_store,
        session_backend: format!("{:?}", app.session_backend).to_lowercase(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("ticketwise status").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!();
        print_check("Language model:", &output.language_model);
        print_check("Issue tracker:", &output.issue_tracker);
        print_check("Relationships:", &output.relationship_store);
        println!("  {} {}", dim.apply_to("Sessions:"), output.session_backend);
        println!();
    }

    app.shutdown().await;
    Ok(())
}

fn print_check(label: &str, check: &CheckOutput) {
    let dim = Style::new().dim();
    let green = Style::new().green();
    let red = Style::new().red();
    let yellow = Style::new().yellow();

    let state = if !check.configured {
        yellow.apply_to("○ not configured".to_string())
    } else if check.reachable {
        green.apply_to(format!("● {}", check.name))
    } else {
        red.apply_to(format!("● {} unreachable", check.name))
    };
    println!("  {} {}", dim.apply_to(label), state);
    if let Some(ref error) = check.error {
        println!("    {}", dim.apply_to(error));
    }
}
