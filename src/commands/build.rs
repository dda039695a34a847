//! # Build Command Handler
//!
//! Saved build management.  Commands that change selections resume a [`BuildSession`]
//! against the daemon, so they follow the same step locking and cascade rules as the
//! interactive builder.

use serde::Serialize;

use crate::commands::component::parse_wire_or_exit;
use crate::commands::interactive::run_interactive;
use crate::commands::shared::{
    dispatch_command, or_exit, parse_or_exit, split_options, validate_args_count_or_exit,
};
use crate::{
    BuildId, BuildPersistence, BuildSession, BuildStatus, CandidateRequest, ComponentCategory,
    ComponentId, CreateBuildRequest, ListBuildsQuery, PcBuilderClient, cli_utils,
};

const BUILD_USAGE: &str = "Usage: pcbctl build <list|get|create|delete|select|deselect|complete|candidates|rename|interactive> [args...]";

const LIST_USAGE: &str = r#"Usage: pcbctl build list [options]
Options:
  --search <text>     Case-insensitive name substring
  --status <status>   draft, completed or saved
  --sort <field>      name, total_price or created_at
  --order <dir>       asc or desc"#;

const CANDIDATES_USAGE: &str = r#"Usage: pcbctl build candidates <build-id> <category> [options]
Options:
  --search <text>     Case-insensitive name substring
  --sort <field>      name, price or date
  --order <dir>       asc or desc
  --limit <n>         Page size (1-100, default 20)
  --cursor <id>       Id of the last component of the previous page"#;

/// Handles all build-related commands.
///
/// # Arguments
/// * `args` - Command arguments (first element is the subcommand)
/// * `client` - HTTP client for API communication
/// * `output_format` - Output format for get/list commands
pub async fn handle_build_command(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    dispatch_command!("build", BUILD_USAGE, args, client, output_format, {
        "list" => handle_build_list,
        "get" => handle_build_get,
        "create" => handle_build_create,
        "delete" => handle_build_delete,
        "select" => handle_build_select,
        "deselect" => handle_build_deselect,
        "complete" => handle_build_complete,
        "candidates" => handle_build_candidates,
        "rename" => handle_build_rename,
        "interactive" => handle_build_interactive,
    });
}

#[derive(Debug, Serialize)]
pub(crate) struct SelectionLine {
    step: ComponentCategory,
    id: ComponentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<i64>,
}

/// What the CLI prints after a session command.
#[derive(Debug, Serialize)]
pub(crate) struct SessionSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<BuildId>,
    name: String,
    status: BuildStatus,
    current_step: ComponentCategory,
    completed: usize,
    steps: usize,
    total_price: i64,
    selections: Vec<SelectionLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cleared: Vec<ComponentCategory>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_required: Vec<ComponentCategory>,
}

pub(crate) fn summarize(
    session: &BuildSession<PcBuilderClient>,
    cleared: Vec<ComponentCategory>,
) -> SessionSummary {
    let state = session.state();
    let graph = session.graph();
    let selections = graph
        .steps()
        .iter()
        .filter_map(|step| {
            let id = state.selection(step.category)?;
            let component = session.selected(step.category);
            Some(SelectionLine {
                step: step.category,
                id,
                name: component.map(|c| c.name.clone()),
                price: component.map(|c| c.price),
            })
        })
        .collect();
    SessionSummary {
        build: state.persisted_id(),
        name: state.name().to_string(),
        status: state.status(),
        current_step: session.current_step().category,
        completed: session.completed_count(),
        steps: graph.len(),
        total_price: session.total_price(),
        selections,
        cleared,
        missing_required: state.missing_required(graph),
    }
}

/// Resumes a saved build against the daemon's step graph.
pub(crate) async fn resume_or_exit(
    client: &PcBuilderClient,
    id: BuildId,
) -> BuildSession<PcBuilderClient> {
    let graph = or_exit(client.steps().await, "Failed to fetch step graph");
    or_exit(
        BuildSession::resume(graph, client.clone(), id).await,
        &format!("Failed to load build {}", id),
    )
}

async fn handle_build_list(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    let (positional, options) = split_options(args, LIST_USAGE);
    validate_args_count_or_exit(&positional, 1, 1, "list", LIST_USAGE);
    let mut query = ListBuildsQuery::default();
    for (name, value) in &options {
        match name.as_str() {
            "search" => query.search = Some(value.clone()),
            "status" => query.status = Some(parse_wire_or_exit(&value.to_uppercase(), "status")),
            "sort" => query.sort_by = Some(parse_wire_or_exit(value, "sort field")),
            "order" => query.sort_order = Some(parse_wire_or_exit(value, "sort order")),
            _ => cli_utils::exit_with_usage_error(&format!("unknown option --{}", name), LIST_USAGE),
        }
    }
    let builds = or_exit(client.list_builds(&query).await, "Failed to list builds");
    cli_utils::print_formatted_or_exit(&builds, output_format, "builds");
}

async fn handle_build_get(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(args, 2, 2, "get", "Usage: pcbctl build get <build-id>");
    let id: BuildId = parse_or_exit(&args[1], "build ID");
    match or_exit(client.get_build(id).await, &format!("Failed to get build {}", id)) {
        Some(build) => cli_utils::print_formatted_or_exit(&build, output_format, "build"),
        None => cli_utils::exit_with_error(&format!("Build {} not found", id)),
    }
}

async fn handle_build_create(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        2,
        usize::MAX,
        "create",
        "Usage: pcbctl build create <name...>",
    );
    let request = CreateBuildRequest::named(args[1..].join(" "));
    let build = or_exit(client.create_build(&request).await, "Failed to create build");
    println!("Created build:");
    cli_utils::print_formatted_or_exit(&build, output_format, "build");
}

async fn handle_build_delete(
    args: &[String],
    client: &PcBuilderClient,
    _output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(args, 2, 2, "delete", "Usage: pcbctl build delete <build-id>");
    let id: BuildId = parse_or_exit(&args[1], "build ID");
    if or_exit(client.delete_build(id).await, &format!("Failed to delete build {}", id)) {
        println!("Deleted build {}", id);
    } else {
        cli_utils::exit_with_error(&format!("Build {} not found", id));
    }
}

async fn handle_build_select(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        4,
        4,
        "select",
        "Usage: pcbctl build select <build-id> <category> <component-id>",
    );
    let id: BuildId = parse_or_exit(&args[1], "build ID");
    let category: ComponentCategory = parse_or_exit(&args[2], "category");
    let component: ComponentId = parse_or_exit(&args[3], "component ID");
    let mut session = resume_or_exit(client, id).await;
    let transition = or_exit(
        session.select_component(category, component).await,
        &format!("Failed to select {} for {}", component, category.key()),
    );
    cli_utils::print_formatted_or_exit(
        &summarize(&session, transition.cleared),
        output_format,
        "build",
    );
}

async fn handle_build_deselect(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        3,
        3,
        "deselect",
        "Usage: pcbctl build deselect <build-id> <category>",
    );
    let id: BuildId = parse_or_exit(&args[1], "build ID");
    let category: ComponentCategory = parse_or_exit(&args[2], "category");
    let mut session = resume_or_exit(client, id).await;
    let transition = or_exit(
        session.deselect_component(category).await,
        &format!("Failed to deselect {}", category.key()),
    );
    cli_utils::print_formatted_or_exit(
        &summarize(&session, transition.cleared),
        output_format,
        "build",
    );
}

async fn handle_build_complete(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        2,
        2,
        "complete",
        "Usage: pcbctl build complete <build-id>",
    );
    let id: BuildId = parse_or_exit(&args[1], "build ID");
    let mut session = resume_or_exit(client, id).await;
    let build = or_exit(session.complete().await, &format!("Failed to complete build {}", id));
    println!("Completed build:");
    cli_utils::print_formatted_or_exit(&build, output_format, "build");
}

async fn handle_build_candidates(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    let (positional, options) = split_options(args, CANDIDATES_USAGE);
    validate_args_count_or_exit(&positional, 3, 3, "candidates", CANDIDATES_USAGE);
    let id: BuildId = parse_or_exit(&positional[1], "build ID");
    let category: ComponentCategory = parse_or_exit(&positional[2], "category");
    let mut request = CandidateRequest::default();
    for (name, value) in &options {
        match name.as_str() {
            "search" => request.search = Some(value.clone()),
            "sort" => request.sort_by = Some(parse_wire_or_exit(value, "sort field")),
            "order" => request.sort_order = Some(parse_wire_or_exit(value, "sort order")),
            "limit" => request.limit = Some(parse_or_exit(value, "limit")),
            "cursor" => request.cursor = Some(parse_or_exit(value, "cursor")),
            _ => cli_utils::exit_with_usage_error(
                &format!("unknown option --{}", name),
                CANDIDATES_USAGE,
            ),
        }
    }
    let mut session = resume_or_exit(client, id).await;
    let page = or_exit(
        session.candidates(category, request).await,
        &format!("Failed to list candidates for {}", category.key()),
    );
    cli_utils::print_formatted_or_exit(&page, output_format, "candidates");
}

async fn handle_build_rename(
    args: &[String],
    client: &PcBuilderClient,
    _output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        3,
        usize::MAX,
        "rename",
        "Usage: pcbctl build rename <build-id> <name...>",
    );
    let id: BuildId = parse_or_exit(&args[1], "build ID");
    let name = args[2..].join(" ");
    let mut session = resume_or_exit(client, id).await;
    or_exit(session.rename(name.as_str()).await, &format!("Failed to rename build {}", id));
    println!("Renamed build {} to '{}'", id, name);
}

async fn handle_build_interactive(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        1,
        2,
        "interactive",
        "Usage: pcbctl build interactive [build-id]",
    );
    let id = args.get(1).map(|s| parse_or_exit::<BuildId, _>(s, "build ID"));
    run_interactive(client, id, output_format).await;
}
