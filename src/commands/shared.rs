//! # Shared Command Utilities
//!
//! This module provides shared validation, parsing, and utility functions
//! used across multiple command handlers to reduce code duplication.

use std::path::Path;
use std::str::FromStr;

use handled::Handle;
use serde::de::DeserializeOwned;

use crate::cli_utils;
use crate::commands::errors::UserError;

/// Exits with the user-facing form of `error`, including its usage hint if any.
pub fn exit_with_user_error<E>(error: &E, context: &str) -> !
where
    E: Handle<UserError> + std::fmt::Display,
{
    match error.handle() {
        Some(user_error) => {
            let message = format!("{}: {}", context, user_error.message);
            match user_error.usage_hint {
                Some(hint) => cli_utils::exit_with_usage_error(&message, &hint),
                None => cli_utils::exit_with_error(&message),
            }
        }
        None => cli_utils::exit_with_error(&format!("{}: {}", context, error)),
    }
}

/// Unwraps `result` or exits with the user-facing form of its error.
pub fn or_exit<T, E>(result: Result<T, E>, context: &str) -> T
where
    E: Handle<UserError> + std::fmt::Display,
{
    result.unwrap_or_else(|e| exit_with_user_error(&e, context))
}

/// Parses `input` as a `T` or exits with the user-facing form of the parse error.
pub fn parse_or_exit<T, E>(input: &str, what: &str) -> T
where
    T: FromStr<Err = E>,
    E: Handle<UserError> + std::fmt::Display,
{
    input
        .parse()
        .unwrap_or_else(|e: E| exit_with_user_error(&e, &format!("Invalid {} '{}'", what, input)))
}

/// Reads a JSON or YAML document, choosing the format by file extension.
pub fn read_document_or_exit<T: DeserializeOwned>(path: &str) -> T {
    let text = or_exit(std::fs::read_to_string(path), "Failed to read file");
    let is_yaml = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    if is_yaml {
        or_exit(serde_yml::from_str(&text), &format!("Failed to parse {}", path))
    } else {
        or_exit(serde_json::from_str(&text), &format!("Failed to parse {}", path))
    }
}

/// Validates both minimum and maximum argument counts.
///
/// # Arguments
/// * `args` - The command arguments array
/// * `min_count` - The minimum number of arguments required (including subcommand)
/// * `max_count` - The maximum number of arguments allowed (including subcommand)
/// * `command` - The command name for error message
/// * `usage` - The usage string to display
pub fn validate_args_count_or_exit(
    args: &[String],
    min_count: usize,
    max_count: usize,
    command: &str,
    usage: &str,
) {
    if args.len() < min_count {
        cli_utils::exit_with_usage_error(
            &format!("{} command requires more arguments", command),
            usage,
        );
    }
    if args.len() > max_count {
        cli_utils::exit_with_usage_error(
            &format!("{} command has too many arguments", command),
            usage,
        );
    }
}

/// Splits `--name value` options from positional arguments.
///
/// Returns the positional arguments and the options in the order given.  An option without
/// a value exits with `usage`.
pub fn split_options(args: &[String], usage: &str) -> (Vec<String>, Vec<(String, String)>) {
    let mut positional = Vec::new();
    let mut options = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(name) = arg.strip_prefix("--") {
            match iter.next() {
                Some(value) => options.push((name.to_string(), value.clone())),
                None => cli_utils::exit_with_usage_error(
                    &format!("option --{} requires a value", name),
                    usage,
                ),
            }
        } else {
            positional.push(arg.clone());
        }
    }
    (positional, options)
}

/// Macro to generate command dispatcher boilerplate.
macro_rules! dispatch_command {
    ($command_name:expr, $usage:expr, $args:expr, $client:expr, $output_format:expr, {
        $($subcommand:expr => $handler:expr),* $(,)?
    }) => {
        if $args.is_empty() {
            crate::cli_utils::exit_with_usage_error(
                &format!("{} command requires a subcommand", $command_name),
                $usage,
            );
        }

        match $args[0].as_str() {
            $(
                $subcommand => $handler($args, $client, $output_format).await,
            )*
            _ => {
                let available_subcommands = vec![$($subcommand),*];
                crate::cli_utils::exit_with_error(&format!(
                    "Unknown {} subcommand '{}'. Available subcommands: {}",
                    $command_name,
                    $args[0],
                    available_subcommands.join(", ")
                ));
            }
        }
    };
}

pub(crate) use dispatch_command;

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn options_are_split_from_positionals() {
        let (positional, options) = split_options(
            &strings(&["list", "--category", "cpu", "--search", "ryzen"]),
            "usage",
        );
        assert_eq!(positional, strings(&["list"]));
        assert_eq!(
            options,
            vec![
                ("category".to_string(), "cpu".to_string()),
                ("search".to_string(), "ryzen".to_string())
            ]
        );
    }
}
