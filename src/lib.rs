//! # pcbuilder: Guided PC Build Configuration
//!
//! pcbuilder walks a user through assembling a computer one component category at a time.
//! Each category is a step; some steps depend on earlier ones, and the choice made upstream
//! narrows what is offered downstream.
//!
//! The crate provides:
//!
//! - **Step Graph**: an ordered, acyclic set of build steps with direct dependencies.  A
//!   step is locked until every step it depends on has a selection.
//! - **Compatibility Rules**: a fixed table that narrows the candidates for a step by the
//!   specifications of the selected upstream component (CPU socket, memory type, board
//!   form factor).
//! - **Build Sessions**: the state machine that applies selections, cascades resets to
//!   dependent steps and saves after every change.
//! - **Catalog and Build Storage**: trait-based storage with in-memory, PostgreSQL and HTTP
//!   backends.
//! - **HTTP API**: axum routers for the catalog, saved builds and the configuration.
//!
//! ## Core Concepts
//!
//! ### Steps
//! A [`BuildStep`] selects exactly one [`ComponentCategory`].  The [`StepGraph`] holds the
//! steps in the order they are presented.  A step may only depend on steps before it, so
//! the graph is acyclic by construction.
//!
//! ### Cascades
//! Changing or clearing a selection clears every step that transitively depends on it, since
//! those selections were filtered against the old upstream part.
//!
//! ### Compatibility
//! [`compat::predicate_for`] turns the selected upstream components into a predicate over
//! candidate [`Component`]s.  Components without the relevant specification are admitted.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ CLI (pcbctl) / HTTP API (pcbuilderd)    │
//! ├─────────────────────────────────────────┤
//! │ Build Session (state machine)           │
//! ├─────────────────────────────────────────┤
//! │ Step Graph & Compatibility Rules        │
//! ├─────────────────────────────────────────┤
//! │ Data Store (Trait-based abstraction)    │
//! ├─────────────────────────────────────────┤
//! │ In-memory / PostgreSQL / HTTP backends  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage Examples
//!
//! ### Locking and cascades
//!
//! ```rust
//! use pcbuilder::{BuildState, ComponentCategory, ComponentId, StepGraph};
//!
//! let graph = StepGraph::standard();
//! let mut state = BuildState::new("Workstation");
//! assert!(graph.is_locked(state.selections(), ComponentCategory::Motherboard));
//!
//! state.select(&graph, ComponentCategory::Cpu, ComponentId(1)).unwrap();
//! state.select(&graph, ComponentCategory::Motherboard, ComponentId(2)).unwrap();
//! state.select(&graph, ComponentCategory::Ram, ComponentId(3)).unwrap();
//!
//! // A different CPU invalidates the board, and with it the memory.
//! let transition = state.select(&graph, ComponentCategory::Cpu, ComponentId(4)).unwrap();
//! assert_eq!(
//!     transition.cleared,
//!     vec![ComponentCategory::Motherboard, ComponentCategory::Ram]
//! );
//! ```
//!
//! ### Running a session against a store
//!
//! ```rust
//! use std::sync::Arc;
//! use pcbuilder::specs::Specifications;
//! use pcbuilder::{
//!     BuildSession, ComponentCatalog, ComponentCategory, CreateComponentRequest,
//!     InMemoryDataStore, StepGraph,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = Arc::new(InMemoryDataStore::new());
//! let cpu = store
//!     .create_component(&CreateComponentRequest {
//!         category: ComponentCategory::Cpu,
//!         name: "Ryzen 7 7700X".to_string(),
//!         price: 299,
//!         image_url: None,
//!         specifications: Specifications::new().with("socket", "AM5"),
//!     })
//!     .await
//!     .unwrap();
//!
//! let mut session = BuildSession::new(StepGraph::standard(), Arc::clone(&store), "Gaming");
//! session.select_component(ComponentCategory::Cpu, cpu.id).await.unwrap();
//! assert_eq!(session.total_price(), 299);
//! assert!(session.state().persisted_id().is_some());
//! # }
//! ```

#![deny(missing_docs)]
mod build;
mod category;
mod component;
mod data_store;
mod errors;
mod router;
mod session;
mod steps;

/// Compatibility rules between upstream selections and candidate components.
pub mod compat;

/// Builder configuration and its read-only HTTP routes.
pub mod config;

/// Specification maps and the per-category field catalog.
pub mod specs;

/// PostgreSQL storage backend.
pub mod sql;

// CLI utility modules

/// Command-line interface utilities for program termination and output formatting.
///
/// This module provides common CLI utilities for pcbuilder binaries, including
/// error handling, formatted output, and program termination functions.
pub mod cli_utils;

/// Command-line interface command handlers.
///
/// This module contains organized command handlers for the pcbctl CLI application,
/// with each command type implemented in a dedicated submodule.
pub mod commands;

/// HTTP client for a running pcbuilder daemon.
pub mod http_utils;

pub use build::{
    BuildId, BuildRecord, BuildSortBy, BuildStatus, CreateBuildRequest, ListBuildsQuery,
    Selections, UpdateBuildRequest, create_build_router,
};
pub use category::{ComponentCategory, UnknownCategory};
pub use component::{
    Component, ComponentId, ComponentPage, ComponentSortBy, CreateComponentRequest,
    DEFAULT_PAGE_SIZE, ListComponentsQuery, MAX_PAGE_SIZE, SortOrder, UpdateComponentRequest,
    create_component_router,
};
pub use config::{BuilderConfig, ConfigError, create_config_router};
pub use data_store::{BuildPersistence, ComponentCatalog, DataStore, InMemoryDataStore};
pub use errors::{DataStoreError, http_error};
pub use http_utils::PcBuilderClient;
pub use router::create_api_router;
pub use session::{
    BuildSession, BuildState, CandidateRequest, SessionError, Transition, ValidationError,
};
pub use sql::PgDataStore;
pub use steps::{BuildStep, GraphError, StepGraph};
