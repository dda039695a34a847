//! # Interactive Builder
//!
//! A line-oriented guided builder.  It walks the daemon's step graph one step at a time,
//! lists compatible candidates for the current step and saves after every selection.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::build::{resume_or_exit, summarize};
use crate::commands::errors::format_cli_error;
use crate::commands::shared::or_exit;
use crate::{
    BuildId, BuildSession, CandidateRequest, ComponentCategory, ComponentId, PcBuilderClient,
    SessionError, ValidationError, cli_utils,
};

const HELP: &str = r#"Commands:
  list [search]      List compatible components for the current step
  more               Show the next page of the last listing
  pick <id>          Select a component for the current step
  drop [category]    Clear the current (or named) step and its dependents
  next | back        Move to the next or previous unlocked step
  skip               Skip the current optional step
  goto <n|category>  Jump to a step by number or category
  name <text>        Rename the build
  status             Show the build so far
  save               Save the build
  done               Complete the build
  help               Show this help
  quit               Leave (the build stays saved)"#;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List(Option<String>),
    More,
    Pick(ComponentId),
    Drop(Option<ComponentCategory>),
    Next,
    Back,
    Skip,
    GotoIndex(usize),
    GotoStep(ComponentCategory),
    Name(String),
    Status,
    Save,
    Done,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let arg = (!rest.is_empty()).then(|| rest.to_string());
    match word.to_ascii_lowercase().as_str() {
        "list" | "ls" => Ok(Command::List(arg)),
        "more" => Ok(Command::More),
        "pick" | "select" => rest
            .parse()
            .map(Command::Pick)
            .map_err(|_| "usage: pick <component-id>".to_string()),
        "drop" | "deselect" => match arg {
            None => Ok(Command::Drop(None)),
            Some(arg) => arg
                .parse()
                .map(|c| Command::Drop(Some(c)))
                .map_err(|e: crate::UnknownCategory| e.to_string()),
        },
        "next" | "n" => Ok(Command::Next),
        "back" | "b" => Ok(Command::Back),
        "skip" => Ok(Command::Skip),
        "goto" => match rest.parse::<usize>() {
            Ok(0) => Err("steps are numbered from 1".to_string()),
            Ok(n) => Ok(Command::GotoIndex(n - 1)),
            Err(_) => rest
                .parse()
                .map(Command::GotoStep)
                .map_err(|_| "usage: goto <step-number|category>".to_string()),
        },
        "name" | "rename" => arg
            .map(Command::Name)
            .ok_or_else(|| "usage: name <text>".to_string()),
        "status" | "show" => Ok(Command::Status),
        "save" => Ok(Command::Save),
        "done" | "complete" => Ok(Command::Done),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        "" => Err(String::new()),
        other => Err(format!("unknown command '{}', try 'help'", other)),
    }
}

struct Interactive {
    session: BuildSession<PcBuilderClient>,
    output_format: cli_utils::OutputFormat,
    search: Option<String>,
    cursor: Option<ComponentId>,
}

impl Interactive {
    fn print_step(&self) {
        let step = self.session.current_step();
        let index = self.session.state().current_step_index();
        let selected = match self.session.selected(step.category) {
            Some(c) => format!(" | selected: {} ({})", c.name, c.price),
            None => String::new(),
        };
        println!(
            "Step {}/{}: {}{}{}",
            index + 1,
            self.session.graph().len(),
            step.label(),
            if step.required { "" } else { " (optional)" },
            selected
        );
        if !step.description.is_empty() {
            println!("  {}", step.description);
        }
        println!(
            "  {} of {} steps selected, total {}",
            self.session.completed_count(),
            self.session.graph().len(),
            self.session.total_price()
        );
    }

    async fn list(&mut self) {
        let category = self.session.current_step().category;
        let request = CandidateRequest {
            search: self.search.clone(),
            cursor: self.cursor,
            ..CandidateRequest::default()
        };
        match self.session.candidates(category, request).await {
            Ok(page) => {
                if page.items.is_empty() {
                    println!("No compatible components.");
                }
                for component in &page.items {
                    println!(
                        "  {:>6}  {:<40} {:>8}",
                        component.id, component.name, component.price
                    );
                }
                self.cursor = page.next_cursor;
                if page.has_more {
                    println!("  ... 'more' for the next page");
                }
            }
            Err(e) => eprintln!("{}", format_cli_error(&e)),
        }
    }

    /// Runs one command.  Returns false when the loop should stop.
    async fn execute(&mut self, command: Command) -> bool {
        let result = match command {
            Command::List(search) => {
                self.search = search;
                self.cursor = None;
                self.list().await;
                return true;
            }
            Command::More => {
                if self.cursor.is_none() {
                    println!("Nothing more to show; use 'list' first.");
                } else {
                    self.list().await;
                }
                return true;
            }
            Command::Pick(id) => {
                let category = self.session.current_step().category;
                self.session
                    .select_component(category, id)
                    .await
                    .map(|t| report_cleared(&t.cleared))
            }
            Command::Drop(category) => {
                let category = category.unwrap_or(self.session.current_step().category);
                self.session
                    .deselect_component(category)
                    .await
                    .map(|t| report_cleared(&t.cleared))
            }
            Command::Next => {
                self.session.advance();
                Ok(())
            }
            Command::Back => {
                self.session.retreat();
                Ok(())
            }
            Command::Skip => self.session.skip().map(|_| ()).map_err(SessionError::from),
            Command::GotoIndex(index) => self
                .session
                .navigate_to(index)
                .map(|_| ())
                .map_err(SessionError::from),
            Command::GotoStep(category) => match self.session.graph().index_of(category) {
                Some(index) => self
                    .session
                    .navigate_to(index)
                    .map(|_| ())
                    .map_err(SessionError::from),
                None => Err(SessionError::from(ValidationError::UnknownStep(category))),
            },
            Command::Name(name) => self.session.rename(name).await,
            Command::Status => {
                cli_utils::print_formatted_or_exit(
                    &summarize(&self.session, Vec::new()),
                    self.output_format,
                    "build",
                );
                return true;
            }
            Command::Save => self.session.save().await.map(|record| {
                println!("Saved build {}", record.id);
            }),
            Command::Done => self.session.complete().await.map(|record| {
                println!(
                    "Completed build {} '{}', total {}",
                    record.id, record.name, record.total_price
                );
            }),
            Command::Help => {
                println!("{}", HELP);
                return true;
            }
            Command::Quit => return false,
        };
        match result {
            Ok(()) => {
                self.search = None;
                self.cursor = None;
                self.print_step();
            }
            Err(e) => eprintln!("{}", format_cli_error(&e)),
        }
        true
    }
}

fn report_cleared(cleared: &[ComponentCategory]) {
    if !cleared.is_empty() {
        let keys: Vec<&str> = cleared.iter().map(|c| c.key()).collect();
        println!("Cleared incompatible selections: {}", keys.join(", "));
    }
}

/// Runs the guided builder on a new build, or on the saved build `id`.
pub async fn run_interactive(
    client: &PcBuilderClient,
    id: Option<BuildId>,
    output_format: cli_utils::OutputFormat,
) {
    let session = match id {
        Some(id) => resume_or_exit(client, id).await,
        None => {
            let graph = or_exit(client.steps().await, "Failed to fetch step graph");
            BuildSession::new(graph, client.clone(), "Untitled build")
        }
    };
    let mut interactive = Interactive {
        session,
        output_format,
        search: None,
        cursor: None,
    };
    println!("Type 'help' for commands.");
    interactive.print_step();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => cli_utils::exit_with_error(&format!("Failed to read input: {}", e)),
        };
        match parse_command(&line) {
            Ok(command) => {
                if !interactive.execute(command).await {
                    break;
                }
            }
            Err(message) if message.is_empty() => {}
            Err(message) => eprintln!("{}", message),
        }
    }
    if let Some(id) = interactive.session.state().persisted_id() {
        println!("Build {} saved.", id);
    }
}
