use std::sync::Arc;

use axum::Router;

use crate::{
    BuilderConfig, DataStore, create_build_router, create_component_router, create_config_router,
};

/// The full pcbuilder API, mounted under `/api/v1`.
pub fn create_api_router<S: DataStore + 'static>(
    store: Arc<S>,
    config: Arc<BuilderConfig>,
) -> Router {
    let api = Router::new()
        .merge(create_component_router(Arc::clone(&store)))
        .merge(create_build_router(store))
        .merge(create_config_router(config));
    Router::new().nest("/api/v1", api)
}
