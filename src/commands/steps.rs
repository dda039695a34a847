//! # Steps Command Handler
//!
//! Prints the step graph the daemon runs.

use crate::commands::shared::{or_exit, validate_args_count_or_exit};
use crate::{PcBuilderClient, cli_utils};

/// Handles `pcbctl steps`.
pub async fn handle_steps_command(
    args: &[String],
    client: &PcBuilderClient,
    output_format: cli_utils::OutputFormat,
) {
    validate_args_count_or_exit(args, 0, 0, "steps", "Usage: pcbctl steps");
    let graph = or_exit(client.steps().await, "Failed to fetch step graph");
    cli_utils::print_formatted_or_exit(&graph, output_format, "steps");
}
