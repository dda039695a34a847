//! Builder configuration.
//!
//! A configuration names the step graph the guided builder runs and how catalog listings
//! treat upstream components that cannot be found.  It loads from YAML or JSON:
//!
//! ```yaml
//! compatibility: fail_closed
//! steps:
//!   - category: CPU
//!     required: true
//!   - category: MOTHERBOARD
//!     required: true
//!     depends_on: [CPU]
//! ```

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use serde::{Deserialize, Serialize};

use crate::StepGraph;
use crate::compat::CompatibilityPolicy;

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid YAML for a configuration.
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yml::Error),
    /// The file is not valid JSON for a configuration.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// The configuration shared by the daemon and its clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// The build steps, in order.
    #[serde(default)]
    pub steps: StepGraph,
    /// How listings treat unresolvable upstream ids.
    #[serde(default)]
    pub compatibility: CompatibilityPolicy,
}

impl BuilderConfig {
    /// Loads a configuration file.  `.yaml` and `.yml` files parse as YAML, anything else
    /// as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        let config = if is_yaml {
            Self::from_yaml(&text)?
        } else {
            serde_json::from_str(&text)?
        };
        tracing::debug!(path = %path.display(), steps = config.steps.len(), "loaded config");
        Ok(config)
    }

    /// Parses a YAML configuration.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(text)?)
    }
}

async fn get_config(State(config): State<Arc<BuilderConfig>>) -> Json<BuilderConfig> {
    Json(config.as_ref().clone())
}

async fn get_steps(State(config): State<Arc<BuilderConfig>>) -> Json<StepGraph> {
    Json(config.steps.clone())
}

/// Creates a router that serves the configuration read-only.
///
/// # Routes
/// - `GET /config` - The whole configuration
/// - `GET /config/steps` - The step graph alone
pub fn create_config_router(config: Arc<BuilderConfig>) -> Router {
    Router::new()
        .route("/config", get(get_config))
        .route("/config/steps", get(get_steps))
        .with_state(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComponentCategory;
    use axum_test::TestServer;

    #[test]
    fn defaults_to_standard_graph() {
        let config: BuilderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.steps, StepGraph::standard());
        assert_eq!(config.compatibility, CompatibilityPolicy::FailOpen);
    }

    #[test]
    fn yaml_with_custom_steps() {
        let config = BuilderConfig::from_yaml(
            r#"
compatibility: fail_closed
steps:
  - category: CPU
    required: true
  - category: MOTHERBOARD
    required: true
    depends_on: [CPU]
  - category: GPU
"#,
        )
        .unwrap();
        assert_eq!(config.compatibility, CompatibilityPolicy::FailClosed);
        assert_eq!(config.steps.len(), 3);
        let board = config.steps.step(ComponentCategory::Motherboard).unwrap();
        assert_eq!(board.depends_on, vec![ComponentCategory::Cpu]);
        assert!(!config.steps.step(ComponentCategory::Gpu).unwrap().required);
    }

    #[test]
    fn rejects_forward_dependency() {
        let err = BuilderConfig::from_yaml(
            r#"
steps:
  - category: RAM
    depends_on: [MOTHERBOARD]
  - category: MOTHERBOARD
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = std::env::temp_dir().join(format!("pcbuilder-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let yaml = dir.join("builder.yml");
        std::fs::write(&yaml, "compatibility: fail_closed\n").unwrap();
        let json = dir.join("builder.json");
        std::fs::write(&json, r#"{"compatibility": "fail_open"}"#).unwrap();

        assert_eq!(
            BuilderConfig::load(&yaml).unwrap().compatibility,
            CompatibilityPolicy::FailClosed
        );
        assert_eq!(
            BuilderConfig::load(&json).unwrap().compatibility,
            CompatibilityPolicy::FailOpen
        );
        assert!(matches!(
            BuilderConfig::load(dir.join("missing.json")),
            Err(ConfigError::Io(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn serves_steps() {
        let server =
            TestServer::new(create_config_router(Arc::new(BuilderConfig::default()))).unwrap();
        let response = server.get("/config/steps").await;
        response.assert_status_ok();
        let steps: StepGraph = response.json();
        assert_eq!(steps, StepGraph::standard());

        let config: BuilderConfig = server.get("/config").await.json();
        assert_eq!(config, BuilderConfig::default());
    }
}
