use arrrg::CommandLine;
use arrrg_derive::CommandLine;

use pcbuilder::{
    PcBuilderClient,
    cli_utils::{self, OutputFormat},
    commands::{handle_build_command, handle_component_command, handle_steps_command},
};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Options {
    #[arrrg(optional, "Base URL of the pcbuilder API server")]
    base_url: String,
    #[arrrg(
        optional,
        "Output format for get/list commands: json or yaml (default: json)"
    )]
    output: OutputFormat,
}

const USAGE: &str = r#"Usage: pcbctl [options] <command> [args...]

Options:
  --base-url <url>     Base URL of the pcbuilder API server (default: http://localhost:8080)
  --output <format>    Output format for get/list commands: json or yaml (default: json)

Commands:
  steps                                        Show the step graph the daemon runs
  component list [options]                     List components (--category, --search, --sort, ...)
  component get <id>                           Get a component by ID
  component create <json>                      Create a component
  component update <id> <json>                 Update a component
  component delete <id>                        Delete a component
  component import <file.json|file.yaml>       Create every component listed in a file
  build list [options]                         List saved builds
  build get <id>                               Get a build by ID
  build create <name...>                       Create an empty build
  build delete <id>                            Delete a build
  build select <id> <category> <component-id>  Select a component for a step
  build deselect <id> <category>               Clear a step and every step depending on it
  build complete <id>                          Mark a build completed
  build candidates <id> <category> [options]   List compatible components for a step
  build rename <id> <name...>                  Rename a build
  build interactive [id]                       Guided step-by-step builder"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (options, free) = Options::from_command_line_relaxed("USAGE: pcbctl <command> [args...]");

    if free.is_empty() {
        cli_utils::exit_with_usage_error("No command specified", USAGE);
    }

    let base_url = if options.base_url.is_empty() {
        "http://localhost:8080".to_string()
    } else {
        options.base_url
    };

    let client = PcBuilderClient::new(base_url);

    match free[0].as_str() {
        "steps" => {
            handle_steps_command(&free[1..], &client, options.output).await;
        }
        "component" => {
            handle_component_command(&free[1..], &client, options.output).await;
        }
        "build" => {
            handle_build_command(&free[1..], &client, options.output).await;
        }
        "help" => {
            println!("{}", USAGE);
        }
        _ => {
            cli_utils::exit_with_error(&format!(
                "Unknown command '{}'. Available commands: steps, component, build",
                free[0]
            ));
        }
    }

    Ok(())
}
