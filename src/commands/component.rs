//! # Component Command Handler
//!
//! Catalog management: listing with filters and paging, retrieval, creation, update,
//! deletion, and bulk import from a JSON or YAML file.

use serde::de::DeserializeOwned;

use crate::commands::shared::{
    dispatch_command, or_exit, parse_or_exit, read_document_or_exit, split_options,
    validate_args_count_or_exit,
};
use crate::{
    ComponentCatalog, ComponentCategory, ComponentId, CreateComponentRequest,
    ListComponentsQuery, PcBuilderClient, UpdateComponentRequest, cli_utils,
};

const COMPONENT_USAGE: &str =
    "Usage: pcbctl component <list|get|create|update|delete|import> [args...]";

const LIST_USAGE: &str = r#"Usage: pcbctl component list [options]
Options:
  --category <cat>        cpu, motherboard, ram, storage, gpu, psu, case or cooling
  --search <text>         Case-insensitive name substring
  --sort <field>          name, price or date
  --order <dir>           asc or desc
  --limit <n>             Page size (1-100, default 20)
  --cursor <id>           Id of the last component of the previous page
  --cpu <id>              Only components compatible with this CPU
  --motherboard <id>      Only components compatible with this motherboard"#;

/// Handles all component-related commands.
///
/// # Arguments
/// * `args` - Command arguments (first element is the subcommand)
/// * `client` - HTTP client for API communication
/// * `output_format` - Output format for get/list commands
pub async fn handle_component_command(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    dispatch_command!("component", COMPONENT_USAGE, args, client, output_format, {
        "list" => handle_component_list,
        "get" => handle_component_get,
        "create" => handle_component_create,
        "update" => handle_component_update,
        "delete" => handle_component_delete,
        "import" => handle_component_import,
    });
}

/// Parses a lower-case enum value the way the API does.
pub(crate) fn parse_wire_or_exit<T: DeserializeOwned>(value: &str, what: &str) -> T {
    or_exit(
        serde_json::from_value(serde_json::Value::String(value.to_string())),
        &format!("Invalid {} '{}'", what, value),
    )
}

/// Builds a listing query from `--name value` options.
pub(crate) fn list_query_from_options(
    options: &[(String, String)],
    usage: &str,
) -> ListComponentsQuery {
    let mut query = ListComponentsQuery::default();
    for (name, value) in options {
        match name.as_str() {
            "category" => {
                query.category = Some(parse_or_exit::<ComponentCategory, _>(value, "category"))
            }
            "search" => query.search = Some(value.clone()),
            "sort" => query.sort_by = Some(parse_wire_or_exit(value, "sort field")),
            "order" => query.sort_order = Some(parse_wire_or_exit(value, "sort order")),
            "limit" => query.limit = Some(parse_or_exit(value, "limit")),
            "cursor" => query.cursor = Some(parse_or_exit(value, "cursor")),
            "cpu" => query.cpu_id = Some(parse_or_exit(value, "CPU id")),
            "motherboard" => {
                query.motherboard_id = Some(parse_or_exit(value, "motherboard id"))
            }
            _ => cli_utils::exit_with_usage_error(&format!("unknown option --{}", name), usage),
        }
    }
    query
}

async fn handle_component_list(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    let (positional, options) = split_options(args, LIST_USAGE);
    validate_args_count_or_exit(&positional, 1, 1, "list", LIST_USAGE);
    let query = list_query_from_options(&options, LIST_USAGE);
    let page = or_exit(
        client.list_components(&query).await,
        "Failed to list components",
    );
    cli_utils::print_formatted_or_exit(&page, output_format, "components");
}

async fn handle_component_get(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(args, 2, 2, "get", "Usage: pcbctl component get <component-id>");
    let id: ComponentId = parse_or_exit(&args[1], "component ID");
    match or_exit(
        client.get_component(id).await,
        &format!("Failed to get component {}", id),
    ) {
        Some(component) => {
            cli_utils::print_formatted_or_exit(&component, output_format, "component")
        }
        None => cli_utils::exit_with_error(&format!("Component {} not found", id)),
    }
}

async fn handle_component_create(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        2,
        2,
        "create",
        r#"Usage: pcbctl component create <component-json>
Example: pcbctl component create '{"category":"CPU","name":"Ryzen 7 7700X","price":299,"specifications":{"socket":"AM5"}}'"#,
    );
    let request: CreateComponentRequest =
        or_exit(serde_json::from_str(&args[1]), "Failed to parse component");
    let component = or_exit(
        client.create_component(&request).await,
        "Failed to create component",
    );
    println!("Created component:");
    cli_utils::print_formatted_or_exit(&component, output_format, "component");
}

async fn handle_component_update(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        3,
        3,
        "update",
        r#"Usage: pcbctl component update <component-id> <changes-json>
Example: pcbctl component update 7 '{"price":279}'"#,
    );
    let id: ComponentId = parse_or_exit(&args[1], "component ID");
    let request: UpdateComponentRequest =
        or_exit(serde_json::from_str(&args[2]), "Failed to parse changes");
    let component = or_exit(
        client.update_component(id, &request).await,
        &format!("Failed to update component {}", id),
    );
    println!("Updated component:");
    cli_utils::print_formatted_or_exit(&component, output_format, "component");
}

async fn handle_component_delete(
    args: &[String],
    client: &PcBuilderClient,
    _output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        2,
        2,
        "delete",
        "Usage: pcbctl component delete <component-id>",
    );
    let id: ComponentId = parse_or_exit(&args[1], "component ID");
    if or_exit(
        client.delete_component(id).await,
        &format!("Failed to delete component {}", id),
    ) {
        println!("Deleted component {}", id);
    } else {
        cli_utils::exit_with_error(&format!("Component {} not found", id));
    }
}

/// Imports every component listed in a JSON or YAML file.  Failures are reported per
/// component and do not stop the import.
async fn handle_component_import(
    args: &[String],
    client: &PcBuilderClient,
    _output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        2,
        2,
        "import",
        "Usage: pcbctl component import <file.json|file.yaml>",
    );
    let requests: Vec<CreateComponentRequest> = read_document_or_exit(&args[1]);
    let mut failed = 0usize;
    for request in &requests {
        match client.create_component(request).await {
            Ok(component) => println!(
                "Imported {} {} ({})",
                component.category, component.id, component.name
            ),
            Err(e) => {
                failed += 1;
                eprintln!("Failed to import '{}': {}", request.name, e);
            }
        }
    }
    println!(
        "Imported {} of {} components",
        requests.len() - failed,
        requests.len()
    );
    if failed > 0 {
        std::process::exit(1);
    }
}
