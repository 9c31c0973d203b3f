//! Ask command - one-shot question.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use super::Context;
use crate::app::App;

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question or request to send
    #[arg(required = true)]
    pub prompt: String,

    /// Continue an existing conversation
    #[arg(short, long)]
    pub conversation: Option<String>,
}

#[derive(Debug, Serialize)]
struct AskOutput<'a> {
    answer: &'a str,
    conversation_id: &'a str,
    task_type: Option<&'a str>,
    error_kind: Option<&'a str>,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let app = App::start(&loaded.config).await?;
    let dim = Style::new().dim();

    let outcome = app
        .orchestrator
        .run_turn(&args.prompt, args.conversation.as_deref())
        .await;

    if ctx.json_output {
        let output = AskOutput {
            answer: &outcome.answer,
            conversation_id: &outcome.conversation_id,
            task_type: outcome.task_type.map(|t| t.as_str()),
            error_kind: outcome.error_kind.map(|k| k.as_str()),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", outcome.answer);
        println!();
        println!(
            "{}",
            dim.apply_to(format!("conversation: {}", outcome.conversation_id))
        );
        if ctx.verbose {
            println!(
                "{}",
                dim.apply_to(serde_json::to_string(&outcome.metadata)?)
            );
        }
    }

    app.shutdown().await;
    Ok(())
}
