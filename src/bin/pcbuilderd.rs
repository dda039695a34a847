use std::sync::Arc;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use pcbuilder::{BuilderConfig, InMemoryDataStore, PgDataStore, create_api_router};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Args {
    #[arrrg(optional, "Host to bind the HTTP server")]
    host: Option<String>,
    #[arrrg(optional, "Port to bind the HTTP server")]
    port: Option<u16>,
    #[arrrg(optional, "PostgreSQL database URL; omit to keep everything in memory")]
    database_url: Option<String>,
    #[arrrg(optional, "Path to a YAML or JSON builder configuration")]
    config: Option<String>,
    #[arrrg(flag, "Enable verbose logging")]
    verbose: bool,
}

const HELP_TEXT: &str = r#"pcbuilderd - PC builder daemon

USAGE:
    pcbuilderd [OPTIONS]

OPTIONS:
    --host <HOST>            Host to bind the HTTP server [default: 127.0.0.1]
    --port <PORT>            Port to bind the HTTP server [default: 8080]
    --database-url <URL>     PostgreSQL database URL [default: in-memory store]
    --config <PATH>          Builder configuration (.yaml, .yml or .json)
    --verbose                Enable verbose logging

DESCRIPTION:
    Serves the component catalog, saved builds and the builder configuration
    under /api/v1/.  RUST_LOG overrides the log filter.

    The server supports graceful shutdown via Ctrl+C.

API ENDPOINTS:
    Components:
      GET    /api/v1/component       List components (filters, paging, compatibility)
      POST   /api/v1/component       Create a component
      GET    /api/v1/component/{id}  Get a component
      PUT    /api/v1/component/{id}  Update a component
      DELETE /api/v1/component/{id}  Delete a component

    Builds:
      GET    /api/v1/build           List builds
      POST   /api/v1/build           Create a build
      GET    /api/v1/build/{id}      Get a build
      PUT    /api/v1/build/{id}      Update a build
      DELETE /api/v1/build/{id}      Delete a build

    Configuration:
      GET    /api/v1/config          The builder configuration
      GET    /api/v1/config/steps    The step graph"#;

struct ServerConfig {
    host: String,
    port: u16,
    database_url: Option<String>,
    config_path: Option<String>,
    verbose: bool,
}

impl ServerConfig {
    fn from_args(args: Args) -> Self {
        Self {
            host: args.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: args.port.unwrap_or(8080),
            database_url: args
                .database_url
                .or_else(|| std::env::var("DATABASE_URL").ok()),
            config_path: args.config,
            verbose: args.verbose,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "pcbuilder=debug,pcbuilderd=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, free) = Args::from_command_line("USAGE: pcbuilderd [OPTIONS]");

    if !free.is_empty() && free[0] == "help" {
        println!("{}", HELP_TEXT);
        return Ok(());
    }

    let server = ServerConfig::from_args(args);
    init_tracing(server.verbose);

    let config = match &server.config_path {
        Some(path) => BuilderConfig::load(path)?,
        None => BuilderConfig::default(),
    };
    tracing::info!(
        steps = config.steps.len(),
        compatibility = ?config.compatibility,
        "loaded builder configuration"
    );
    let policy = config.compatibility;
    let config = Arc::new(config);

    let app: Router = match &server.database_url {
        Some(url) => {
            let store = PgDataStore::connect(url).await?.with_policy(policy);
            tracing::info!("using PostgreSQL store");
            create_api_router(Arc::new(store), config)
        }
        None => {
            tracing::info!("using in-memory store; data is lost on shutdown");
            create_api_router(Arc::new(InMemoryDataStore::new().with_policy(policy)), config)
        }
    };

    let addr = format!("{}:{}", server.host, server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;
    tracing::info!(%addr, "pcbuilderd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("pcbuilderd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, stopping server gracefully");
}
