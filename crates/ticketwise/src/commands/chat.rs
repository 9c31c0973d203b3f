//! Chat command - interactive REPL mode.

use anyhow::Result;
use clap::Args;
use console::{Style, Term, style};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tokio_util::sync::CancellationToken;

use super::Context;
use crate::app::App;
use ticketwise_agent::{AgentError, Orchestrator};

/// Arguments for the chat command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Resume an existing conversation
    #[arg(short, long)]
    pub conversation: Option<String>,
}

/// Run the chat command (REPL).
pub async fn run(args: ChatArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let app = App::start(&loaded.config).await?;

    let result = match Repl::new(&app.orchestrator, args.conversation, ctx.verbose) {
        Ok(mut repl) => repl.run().await,
        Err(e) => Err(e),
    };

    app.shutdown().await;
    result
}

enum ControlFlow {
    Continue,
    Exit,
}

/// REPL state for one chat session.
struct Repl<'a> {
    orchestrator: &'a Orchestrator,
    conversation_id: Option<String>,
    editor: Editor<(), DefaultHistory>,
    term: Term,
    verbose: bool,
}

impl<'a> Repl<'a> {
    fn new(
        orchestrator: &'a Orchestrator,
        conversation_id: Option<String>,
        verbose: bool,
    ) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let editor = Editor::with_config(config)?;

        Ok(Self {
            orchestrator,
            conversation_id,
            editor,
            term: Term::stdout(),
            verbose,
        })
    }

    async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            let prompt = format!("{} ", style("ticketwise>").cyan().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    if line.starts_with('/') {
                        match self.handle_slash_command(line) {
                            Ok(ControlFlow::Continue) => continue,
                            Ok(ControlFlow::Exit) => break,
                            Err(e) => {
                                self.print_error(&format!("Command error: {}", e));
                                continue;
                            }
                        }
                    }

                    self.send_message(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!();
                    self.print_dim("(Interrupted - type /quit to exit)");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => {
                    self.print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        self.print_dim("Goodbye!");
        Ok(())
    }

    /// Run one turn; Ctrl+C abandons it without touching the history.
    async fn send_message(&mut self, message: &str) {
        let cancel = CancellationToken::new();
        let conversation_id = self.conversation_id.clone();
        let result = {
            let turn = self.orchestrator.run_turn_with_cancel(
                message,
                conversation_id.as_deref(),
                cancel.clone(),
            );
            tokio::pin!(turn);

            tokio::select! {
                result = &mut turn => result,
                _ = tokio::signal::ctrl_c() => {
                    cancel.cancel();
                    turn.await
                }
            }
        };

        match result {
            Ok(outcome) => {
                println!("{}", outcome.answer);
                if self.verbose
                    && let Ok(meta) = serde_json::to_string(&outcome.metadata)
                {
                    self.print_dim(&meta);
                }
                println!();
                self.conversation_id = Some(outcome.conversation_id);
            }
            Err(AgentError::Cancelled) => {
                println!();
                self.print_dim("(Cancelled)");
            }
            Err(e) => self.print_error(&e.to_string()),
        }
    }

    fn handle_slash_command(&mut self, input: &str) -> Result<ControlFlow> {
        let cmd = input[1..].split_whitespace().next().unwrap_or("");

        match cmd {
            "quit" | "q" | "exit" => return Ok(ControlFlow::Exit),
            "help" | "h" | "?" => self.print_help(),
            "clear" | "cls" => self.term.clear_screen()?,
            "new" => {
                self.conversation_id = None;
                self.print_dim("Started new conversation");
            }
            "id" | "conversation" => match self.conversation_id {
                Some(ref id) => println!("Current conversation: {}", id),
                None => self.print_dim("No conversation yet (one starts with your first message)"),
            },
            "status" => {
                let flags = self.orchestrator.capabilities();
                let state = if !self.orchestrator.probe().is_enabled() {
                    Style::new().dim().apply_to("○ disabled by configuration")
                } else if flags.relationship_store {
                    Style::new().green().apply_to("● available")
                } else {
                    Style::new().yellow().apply_to("○ unavailable")
                };
                println!("Relationship store: {}", state);
            }
            "" => self.print_dim("Type /help for available commands"),
            _ => {
                self.print_error(&format!("Unknown command: /{}", cmd));
                self.print_dim("Type /help for available commands");
            }
        }

        Ok(ControlFlow::Continue)
    }

    fn print_welcome(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("ticketwise").bold().cyan());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("{}", dim.apply_to("Ask about your tickets and press Enter."));
        println!("{}", dim.apply_to("Use /help for commands, Ctrl+D to exit."));
        println!();
    }

    fn print_help(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Available Commands").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {}  - Exit the REPL", style("/quit, /q").cyan());
        println!("  {}  - Show this help", style("/help, /h, /?").cyan());
        println!("  {}  - Clear the screen", style("/clear").cyan());
        println!("  {}  - Show relationship store availability", style("/status").cyan());
        println!("  {}  - Start a new conversation", style("/new").cyan());
        println!("  {}  - Show the conversation id", style("/id").cyan());
        println!();
        println!("{}", dim.apply_to("Keyboard shortcuts:"));
        println!("  {} - Cancel the running request", dim.apply_to("Ctrl+C"));
        println!("  {} - Exit the REPL", dim.apply_to("Ctrl+D"));
        println!();
    }

    fn print_dim(&self, msg: &str) {
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(msg));
    }

    fn print_error(&self, msg: &str) {
        let red = Style::new().red();
        println!("{} {}", red.apply_to("Error:"), msg);
    }
}
