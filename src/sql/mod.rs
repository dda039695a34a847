//! PostgreSQL storage for pcbuilder.
//!
//! The functions in [`component`] and [`build`] run inside a caller-provided transaction.
//! [`PgDataStore`] wraps a connection pool and gives each trait call its own transaction.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::compat::CompatibilityPolicy;
use crate::{
    BuildId, BuildPersistence, BuildRecord, Component, ComponentCatalog, ComponentId,
    ComponentPage, CreateBuildRequest, CreateComponentRequest, DataStoreError, ListBuildsQuery,
    ListComponentsQuery, UpdateBuildRequest, UpdateComponentRequest,
};

/// Catalog component operations.
pub mod component;

/// Saved build operations.
pub mod build;

/// A [`crate::DataStore`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgDataStore {
    pool: PgPool,
    policy: CompatibilityPolicy,
}

impl PgDataStore {
    /// Wraps an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            policy: CompatibilityPolicy::default(),
        }
    }

    /// Connects to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, DataStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to connect to database");
                DataStoreError::IoError(e.to_string())
            })?;
        Ok(Self::new(pool))
    }

    /// Sets how listings treat upstream ids that do not resolve.
    pub fn with_policy(mut self, policy: CompatibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl ComponentCatalog for PgDataStore {
    async fn list_components(
        &self,
        query: &ListComponentsQuery,
    ) -> Result<ComponentPage, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let predicate = component::predicate(&mut tx, query, self.policy).await?;
        let page = component::list(&mut tx, query, &predicate).await?;
        tx.commit().await?;
        Ok(page)
    }

    async fn get_component(&self, id: ComponentId) -> Result<Option<Component>, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let found = component::get(&mut tx, id).await?;
        tx.commit().await?;
        Ok(found)
    }

    async fn create_component(
        &self,
        request: &CreateComponentRequest,
    ) -> Result<Component, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let created = component::create(&mut tx, request).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_component(
        &self,
        id: ComponentId,
        request: &UpdateComponentRequest,
    ) -> Result<Component, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = component::update(&mut tx, id, request).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_component(&self, id: ComponentId) -> Result<bool, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let deleted = component::delete(&mut tx, id).await?;
        tx.commit().await?;
        Ok(deleted)
    }
}

impl BuildPersistence for PgDataStore {
    async fn create_build(&self, request: &CreateBuildRequest) -> Result<BuildRecord, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let created = build::create(&mut tx, request).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_build(
        &self,
        id: BuildId,
        request: &UpdateBuildRequest,
    ) -> Result<BuildRecord, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = build::update(&mut tx, id, request).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn get_build(&self, id: BuildId) -> Result<Option<BuildRecord>, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let found = build::get(&mut tx, id).await?;
        tx.commit().await?;
        Ok(found)
    }

    async fn list_builds(&self, query: &ListBuildsQuery) -> Result<Vec<BuildRecord>, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let builds = build::list(&mut tx, query).await?;
        tx.commit().await?;
        Ok(builds)
    }

    async fn delete_build(&self, id: BuildId) -> Result<bool, DataStoreError> {
        let mut tx = self.pool.begin().await?;
        let deleted = build::delete(&mut tx, id).await?;
        tx.commit().await?;
        Ok(deleted)
    }
}
