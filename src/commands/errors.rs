//! # Command Error Handling
//!
//! This module turns library errors into messages for pcbctl users, using the handled
//! crate for consistent error property extraction.

use std::num::ParseIntError;

use handled::Handle;

use crate::config::ConfigError;
use crate::{DataStoreError, SessionError, UnknownCategory, ValidationError};

/// User-friendly error information that can be extracted from various error types
#[derive(Debug, Clone)]
pub struct UserError {
    /// The main error message to display to the user
    pub message: String,
    /// Optional usage hint to help the user correct the error
    pub usage_hint: Option<String>,
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Handle<UserError> for UserError {
    fn handle(&self) -> Option<UserError> {
        Some(self.clone())
    }
}

impl Handle<UserError> for DataStoreError {
    fn handle(&self) -> Option<UserError> {
        let usage_hint = match self {
            DataStoreError::NotFound => {
                Some("The requested resource was not found. Check the ID and try again.")
            }
            DataStoreError::AlreadyExists => Some("A resource with that identity already exists."),
            DataStoreError::InvalidInput(_) => {
                Some("Invalid request. Check your input data and try again.")
            }
            DataStoreError::IoError(_) => {
                Some("Could not reach the daemon. Check --base-url and that pcbuilderd is running.")
            }
            DataStoreError::SerializationError(_) => {
                Some("The daemon sent a response this client does not understand.")
            }
            DataStoreError::Internal(_) => {
                Some("Server error. The service may be temporarily unavailable.")
            }
        };
        Some(UserError {
            message: self.to_string(),
            usage_hint: usage_hint.map(str::to_string),
        })
    }
}

impl Handle<UserError> for ValidationError {
    fn handle(&self) -> Option<UserError> {
        let usage_hint = match self {
            ValidationError::StepLocked { missing, .. } => Some(format!(
                "Select {} first.",
                missing
                    .iter()
                    .map(|c| c.key())
                    .collect::<Vec<_>>()
                    .join(" and ")
            )),
            ValidationError::MissingRequired(_) => {
                Some("Select every required component before completing the build.".to_string())
            }
            ValidationError::CategoryMismatch { step, .. } => Some(format!(
                "List candidates with 'pcbctl build candidates <build-id> {}'.",
                step.key()
            )),
            _ => None,
        };
        Some(UserError {
            message: self.to_string(),
            usage_hint,
        })
    }
}

impl Handle<UserError> for SessionError {
    fn handle(&self) -> Option<UserError> {
        match self {
            SessionError::Validation(e) => e.handle(),
            SessionError::Catalog(e) => e.handle(),
            SessionError::BuildNotFound(_) => Some(UserError {
                message: self.to_string(),
                usage_hint: Some("List saved builds with 'pcbctl build list'.".to_string()),
            }),
            SessionError::Persistence { source, .. } => Some(UserError {
                message: self.to_string(),
                usage_hint: source.handle().and_then(|e| e.usage_hint),
            }),
        }
    }
}

impl Handle<UserError> for UnknownCategory {
    fn handle(&self) -> Option<UserError> {
        Some(UserError {
            message: self.to_string(),
            usage_hint: Some(
                "Categories: cpu, motherboard, ram, storage, gpu, psu, case, cooling".to_string(),
            ),
        })
    }
}

impl Handle<UserError> for ParseIntError {
    fn handle(&self) -> Option<UserError> {
        Some(UserError {
            message: format!("Invalid ID: {}", self),
            usage_hint: Some("IDs are positive integers, e.g. 42".to_string()),
        })
    }
}

impl Handle<UserError> for ConfigError {
    fn handle(&self) -> Option<UserError> {
        Some(UserError {
            message: self.to_string(),
            usage_hint: Some("Config files are YAML (.yaml, .yml) or JSON.".to_string()),
        })
    }
}

impl Handle<UserError> for serde_json::Error {
    fn handle(&self) -> Option<UserError> {
        Some(UserError {
            message: format!("JSON parsing error: {}", self),
            usage_hint: Some(
                "Ensure the JSON is properly formatted and contains all required fields"
                    .to_string(),
            ),
        })
    }
}

impl Handle<UserError> for serde_yml::Error {
    fn handle(&self) -> Option<UserError> {
        Some(UserError {
            message: format!("YAML parsing error: {}", self),
            usage_hint: Some(
                "Ensure the YAML is properly formatted and contains all required fields"
                    .to_string(),
            ),
        })
    }
}

impl Handle<UserError> for std::io::Error {
    fn handle(&self) -> Option<UserError> {
        let hint = match self.kind() {
            std::io::ErrorKind::NotFound => {
                Some("The specified file was not found. Check the file path.".to_string())
            }
            std::io::ErrorKind::PermissionDenied => {
                Some("Permission denied. Check file permissions.".to_string())
            }
            std::io::ErrorKind::InvalidData => Some("The file contains invalid data.".to_string()),
            _ => None,
        };

        Some(UserError {
            message: format!("File operation error: {}", self),
            usage_hint: hint,
        })
    }
}

/// Enhanced error formatting for CLI output
pub fn format_cli_error<E>(error: &E) -> String
where
    E: Handle<UserError> + std::fmt::Display,
{
    if let Some(user_error) = error.handle() {
        let mut output = format!("Error: {}", user_error.message);
        if let Some(hint) = user_error.usage_hint {
            output.push_str(&format!("\nHint: {}", hint));
        }
        output
    } else {
        format!("Error: {}", error)
    }
}
