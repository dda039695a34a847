//! # Command Handlers
//!
//! This module contains organized command handlers for the pcbctl CLI application.
//! Each command type is implemented in a dedicated submodule.
//!
//! ## Structure
//!
//! - `component` - Catalog commands (list, get, create, update, delete, import)
//! - `build` - Saved build commands, including selection changes through a build session
//! - `interactive` - The guided step-by-step builder
//! - `steps` - Prints the daemon's step graph
//! - `shared` - Shared utilities and validation functions
//! - `errors` - User-facing error extraction

pub mod build;
pub mod component;
pub mod errors;
pub mod interactive;
pub mod shared;
pub mod steps;

pub use build::handle_build_command;
pub use component::handle_component_command;
pub use steps::handle_steps_command;
