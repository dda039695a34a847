//! # Data Storage Abstraction
//!
//! This module defines the two storage seams of pcbuilder and an in-memory implementation
//! of both.
//!
//! - [`ComponentCatalog`] reads and writes catalog components.
//! - [`BuildPersistence`] reads and writes saved builds.
//!
//! A backend that implements both is a [`DataStore`].  Three backends exist:
//!
//! - [`InMemoryDataStore`]: `Mutex`-guarded maps, used by tests and by the daemon when no
//!   database is configured.
//! - [`crate::PgDataStore`]: PostgreSQL through sqlx.
//! - [`crate::PcBuilderClient`]: the HTTP API of a running daemon.
//!
//! Methods are asynchronous so that all three share one interface; the in-memory store
//! simply never awaits.
//!
//! ```rust
//! use pcbuilder::{ComponentCatalog, ComponentCategory, CreateComponentRequest, InMemoryDataStore};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = InMemoryDataStore::new();
//! let gpu = store
//!     .create_component(&CreateComponentRequest {
//!         category: ComponentCategory::Gpu,
//!         name: "GeForce RTX 4070".to_string(),
//!         price: 599,
//!         image_url: None,
//!         specifications: Default::default(),
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(store.get_component(gpu.id).await.unwrap(), Some(gpu));
//! # }
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::build::price_selections;
use crate::compat::{self, CompatibilityPolicy, Upstream};
use crate::component::{category_in_use, paginate};
use crate::{
    BuildId, BuildRecord, BuildStatus, Component, ComponentId, ComponentPage,
    CreateBuildRequest, CreateComponentRequest, DataStoreError, ListBuildsQuery,
    ListComponentsQuery, Selections, UpdateBuildRequest, UpdateComponentRequest,
};

/// Read and write access to catalog components.
pub trait ComponentCatalog: Send + Sync {
    /// Lists one page of components.
    ///
    /// # Arguments
    /// * `query` - Filters, ordering, paging and upstream compatibility ids
    ///
    /// # Returns
    /// * `Ok(ComponentPage)` - The matching page
    /// * `Err(DataStoreError::Internal)` - Internal storage error
    fn list_components(
        &self,
        query: &ListComponentsQuery,
    ) -> impl Future<Output = Result<ComponentPage, DataStoreError>> + Send;

    /// Retrieves a component by id.
    ///
    /// # Returns
    /// * `Ok(Some(Component))` - Component found
    /// * `Ok(None)` - No component has this id
    fn get_component(
        &self,
        id: ComponentId,
    ) -> impl Future<Output = Result<Option<Component>, DataStoreError>> + Send;

    /// Creates a component and assigns its id and timestamps.
    fn create_component(
        &self,
        request: &CreateComponentRequest,
    ) -> impl Future<Output = Result<Component, DataStoreError>> + Send;

    /// Applies a partial update.
    ///
    /// # Returns
    /// * `Ok(Component)` - The updated component
    /// * `Err(DataStoreError::NotFound)` - No component has this id
    /// * `Err(DataStoreError::InvalidInput)` - The category would change while saved builds
    ///   select the component
    fn update_component(
        &self,
        id: ComponentId,
        request: &UpdateComponentRequest,
    ) -> impl Future<Output = Result<Component, DataStoreError>> + Send;

    /// Deletes a component.  Builds that selected it lose that selection.
    ///
    /// # Returns
    /// * `Ok(true)` - Component existed and was deleted
    /// * `Ok(false)` - Component did not exist
    fn delete_component(
        &self,
        id: ComponentId,
    ) -> impl Future<Output = Result<bool, DataStoreError>> + Send;
}

/// Read and write access to saved builds.
pub trait BuildPersistence: Send + Sync {
    /// Creates a build.
    ///
    /// # Returns
    /// * `Ok(BuildRecord)` - The saved record with its id and total price
    /// * `Err(DataStoreError::InvalidInput)` - A selection names a missing component or one
    ///   of the wrong category
    fn create_build(
        &self,
        request: &CreateBuildRequest,
    ) -> impl Future<Output = Result<BuildRecord, DataStoreError>> + Send;

    /// Applies a partial update; present `selections` replace the whole map.
    ///
    /// # Returns
    /// * `Ok(BuildRecord)` - The updated record
    /// * `Err(DataStoreError::NotFound)` - No build has this id
    /// * `Err(DataStoreError::InvalidInput)` - A selection is invalid
    fn update_build(
        &self,
        id: BuildId,
        request: &UpdateBuildRequest,
    ) -> impl Future<Output = Result<BuildRecord, DataStoreError>> + Send;

    /// Retrieves a build by id.
    fn get_build(
        &self,
        id: BuildId,
    ) -> impl Future<Output = Result<Option<BuildRecord>, DataStoreError>> + Send;

    /// Lists builds, newest first unless the query says otherwise.
    fn list_builds(
        &self,
        query: &ListBuildsQuery,
    ) -> impl Future<Output = Result<Vec<BuildRecord>, DataStoreError>> + Send;

    /// Deletes a build.
    ///
    /// # Returns
    /// * `Ok(true)` - Build existed and was deleted
    /// * `Ok(false)` - Build did not exist
    fn delete_build(&self, id: BuildId)
    -> impl Future<Output = Result<bool, DataStoreError>> + Send;
}

/// A backend serving both the catalog and saved builds.
pub trait DataStore: ComponentCatalog + BuildPersistence {}

impl<T: ComponentCatalog + BuildPersistence> DataStore for T {}

impl<T: ComponentCatalog> ComponentCatalog for Arc<T> {
    fn list_components(
        &self,
        query: &ListComponentsQuery,
    ) -> impl Future<Output = Result<ComponentPage, DataStoreError>> + Send {
        (**self).list_components(query)
    }

    fn get_component(
        &self,
        id: ComponentId,
    ) -> impl Future<Output = Result<Option<Component>, DataStoreError>> + Send {
        (**self).get_component(id)
    }

    fn create_component(
        &self,
        request: &CreateComponentRequest,
    ) -> impl Future<Output = Result<Component, DataStoreError>> + Send {
        (**self).create_component(request)
    }

    fn update_component(
        &self,
        id: ComponentId,
        request: &UpdateComponentRequest,
    ) -> impl Future<Output = Result<Component, DataStoreError>> + Send {
        (**self).update_component(id, request)
    }

    fn delete_component(
        &self,
        id: ComponentId,
    ) -> impl Future<Output = Result<bool, DataStoreError>> + Send {
        (**self).delete_component(id)
    }
}

impl<T: BuildPersistence> BuildPersistence for Arc<T> {
    fn create_build(
        &self,
        request: &CreateBuildRequest,
    ) -> impl Future<Output = Result<BuildRecord, DataStoreError>> + Send {
        (**self).create_build(request)
    }

    fn update_build(
        &self,
        id: BuildId,
        request: &UpdateBuildRequest,
    ) -> impl Future<Output = Result<BuildRecord, DataStoreError>> + Send {
        (**self).update_build(id, request)
    }

    fn get_build(
        &self,
        id: BuildId,
    ) -> impl Future<Output = Result<Option<BuildRecord>, DataStoreError>> + Send {
        (**self).get_build(id)
    }

    fn list_builds(
        &self,
        query: &ListBuildsQuery,
    ) -> impl Future<Output = Result<Vec<BuildRecord>, DataStoreError>> + Send {
        (**self).list_builds(query)
    }

    fn delete_build(
        &self,
        id: BuildId,
    ) -> impl Future<Output = Result<bool, DataStoreError>> + Send {
        (**self).delete_build(id)
    }
}

////////////////////////////////////////////// InMemoryDataStore //////////////////////////////////////////////

#[derive(Debug, Clone)]
struct StoredBuild {
    name: String,
    status: BuildStatus,
    selections: Selections,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Thread-safe in-memory implementation of [`ComponentCatalog`] and [`BuildPersistence`].
///
/// Locks are always taken components first, then builds.
#[derive(Debug)]
pub struct InMemoryDataStore {
    components: Mutex<BTreeMap<ComponentId, Component>>,
    builds: Mutex<BTreeMap<BuildId, StoredBuild>>,
    next_component_id: AtomicI64,
    next_build_id: AtomicI64,
    policy: CompatibilityPolicy,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, DataStoreError> {
    mutex
        .lock()
        .map_err(|_| DataStoreError::Internal("in-memory store lock poisoned".to_string()))
}

impl InMemoryDataStore {
    /// Creates a new empty in-memory data store.
    pub fn new() -> Self {
        Self {
            components: Mutex::new(BTreeMap::new()),
            builds: Mutex::new(BTreeMap::new()),
            next_component_id: AtomicI64::new(1),
            next_build_id: AtomicI64::new(1),
            policy: CompatibilityPolicy::default(),
        }
    }

    /// Sets how listings treat upstream ids that do not resolve.
    pub fn with_policy(mut self, policy: CompatibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn record(
        id: BuildId,
        build: &StoredBuild,
        components: &BTreeMap<ComponentId, Component>,
    ) -> BuildRecord {
        let total_price = build
            .selections
            .values()
            .filter_map(|id| components.get(id))
            .map(|c| c.price)
            .sum();
        BuildRecord {
            id,
            name: build.name.clone(),
            status: build.status,
            selections: build.selections.clone(),
            total_price,
            created_at: build.created_at,
            updated_at: build.updated_at,
        }
    }

    fn check_selections(
        selections: &Selections,
        components: &BTreeMap<ComponentId, Component>,
    ) -> Result<i64, DataStoreError> {
        price_selections(selections, |id| {
            components.get(&id).map(|c| (c.category, c.price))
        })
    }
}

impl Default for InMemoryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentCatalog for InMemoryDataStore {
    async fn list_components(
        &self,
        query: &ListComponentsQuery,
    ) -> Result<ComponentPage, DataStoreError> {
        let components = lock(&self.components)?;
        let predicate = match query.category {
            Some(category) => {
                let upstream: Vec<Upstream<'_>> = query
                    .upstream_ids()
                    .into_iter()
                    .map(|(expected, id)| match components.get(&id) {
                        Some(component) => Upstream::Resolved(component),
                        None => Upstream::Unresolved(expected, id),
                    })
                    .collect();
                compat::predicate_for(category, &upstream, self.policy)
            }
            None => compat::Predicate::always(),
        };
        let matching: Vec<Component> = components
            .values()
            .filter(|c| query.admits(c) && predicate.admits(c))
            .cloned()
            .collect();
        Ok(paginate(matching, query))
    }

    async fn get_component(&self, id: ComponentId) -> Result<Option<Component>, DataStoreError> {
        Ok(lock(&self.components)?.get(&id).cloned())
    }

    async fn create_component(
        &self,
        request: &CreateComponentRequest,
    ) -> Result<Component, DataStoreError> {
        let mut components = lock(&self.components)?;
        let id = ComponentId(self.next_component_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let component = Component {
            id,
            category: request.category,
            name: request.name.clone(),
            price: request.price,
            image_url: request.image_url.clone(),
            specifications: request.specifications.clone(),
            created_at: now,
            updated_at: now,
        };
        components.insert(id, component.clone());
        Ok(component)
    }

    async fn update_component(
        &self,
        id: ComponentId,
        request: &UpdateComponentRequest,
    ) -> Result<Component, DataStoreError> {
        let mut components = lock(&self.components)?;
        let component = components.get_mut(&id).ok_or(DataStoreError::NotFound)?;
        if let Some(category) = request.recategorizes(component) {
            let builds = lock(&self.builds)?;
            if builds
                .values()
                .any(|build| build.selections.values().any(|selected| *selected == id))
            {
                return Err(category_in_use(id, category));
            }
        }
        request.apply_to(component);
        component.updated_at = Utc::now();
        Ok(component.clone())
    }

    async fn delete_component(&self, id: ComponentId) -> Result<bool, DataStoreError> {
        let mut components = lock(&self.components)?;
        if components.remove(&id).is_none() {
            return Ok(false);
        }
        let mut builds = lock(&self.builds)?;
        for build in builds.values_mut() {
            build.selections.retain(|_, selected| *selected != id);
        }
        Ok(true)
    }
}

impl BuildPersistence for InMemoryDataStore {
    async fn create_build(&self, request: &CreateBuildRequest) -> Result<BuildRecord, DataStoreError> {
        let components = lock(&self.components)?;
        Self::check_selections(&request.selections, &components)?;
        let mut builds = lock(&self.builds)?;
        let id = BuildId(self.next_build_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let build = StoredBuild {
            name: request.name.clone(),
            status: request.status,
            selections: request.selections.clone(),
            created_at: now,
            updated_at: now,
        };
        let record = Self::record(id, &build, &components);
        builds.insert(id, build);
        Ok(record)
    }

    async fn update_build(
        &self,
        id: BuildId,
        request: &UpdateBuildRequest,
    ) -> Result<BuildRecord, DataStoreError> {
        let components = lock(&self.components)?;
        if let Some(selections) = &request.selections {
            Self::check_selections(selections, &components)?;
        }
        let mut builds = lock(&self.builds)?;
        let build = builds.get_mut(&id).ok_or(DataStoreError::NotFound)?;
        if let Some(name) = &request.name {
            build.name = name.clone();
        }
        if let Some(status) = request.status {
            build.status = status;
        }
        if let Some(selections) = &request.selections {
            build.selections = selections.clone();
        }
        build.updated_at = Utc::now();
        Ok(Self::record(id, build, &components))
    }

    async fn get_build(&self, id: BuildId) -> Result<Option<BuildRecord>, DataStoreError> {
        let components = lock(&self.components)?;
        let builds = lock(&self.builds)?;
        Ok(builds
            .get(&id)
            .map(|build| Self::record(id, build, &components)))
    }

    async fn list_builds(&self, query: &ListBuildsQuery) -> Result<Vec<BuildRecord>, DataStoreError> {
        let components = lock(&self.components)?;
        let builds = lock(&self.builds)?;
        let mut records: Vec<BuildRecord> = builds
            .iter()
            .map(|(id, build)| Self::record(*id, build, &components))
            .filter(|record| query.admits(record))
            .collect();
        records.sort_by(|a, b| query.compare(a, b));
        Ok(records)
    }

    async fn delete_build(&self, id: BuildId) -> Result<bool, DataStoreError> {
        Ok(lock(&self.builds)?.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::{MEMORY_TYPE, SOCKET, Specifications, TYPE};
    use crate::{ComponentCategory, ComponentSortBy};

    async fn add(
        store: &InMemoryDataStore,
        category: ComponentCategory,
        name: &str,
        price: i64,
        specs: Specifications,
    ) -> Component {
        store
            .create_component(&CreateComponentRequest {
                category,
                name: name.to_string(),
                price,
                image_url: None,
                specifications: specs,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn component_crud() {
        let store = InMemoryDataStore::new();
        let gpu = add(&store, ComponentCategory::Gpu, "RTX 4070", 599, Specifications::new()).await;
        assert_eq!(gpu.id, ComponentId(1));

        let updated = store
            .update_component(
                gpu.id,
                &UpdateComponentRequest {
                    price: Some(549),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 549);
        assert_eq!(updated.name, "RTX 4070");

        assert!(store.delete_component(gpu.id).await.unwrap());
        assert!(!store.delete_component(gpu.id).await.unwrap());
        assert_eq!(store.get_component(gpu.id).await.unwrap(), None);
        assert_eq!(
            store
                .update_component(gpu.id, &UpdateComponentRequest::default())
                .await,
            Err(DataStoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn listing_filters_by_upstream_compatibility() {
        let store = InMemoryDataStore::new();
        let board = add(
            &store,
            ComponentCategory::Motherboard,
            "X670E",
            300,
            Specifications::new()
                .with(SOCKET, "AM5")
                .with(MEMORY_TYPE, "DDR5"),
        )
        .await;
        let ddr5 = add(
            &store,
            ComponentCategory::Ram,
            "DDR5 kit",
            150,
            Specifications::new().with(TYPE, "DDR5"),
        )
        .await;
        let ddr5_alt = add(
            &store,
            ComponentCategory::Ram,
            "Other DDR5 kit",
            140,
            Specifications::new().with(MEMORY_TYPE, "DDR5"),
        )
        .await;
        add(
            &store,
            ComponentCategory::Ram,
            "DDR4 kit",
            80,
            Specifications::new().with(TYPE, "DDR4"),
        )
        .await;

        let mut query = ListComponentsQuery::for_category(ComponentCategory::Ram);
        assert_eq!(store.list_components(&query).await.unwrap().items.len(), 3);

        query.motherboard_id = Some(board.id);
        let page = store.list_components(&query).await.unwrap();
        let ids: Vec<ComponentId> = page.items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![ddr5_alt.id, ddr5.id]);

        query.motherboard_id = Some(ComponentId(999));
        assert_eq!(store.list_components(&query).await.unwrap().items.len(), 3);

        let closed = InMemoryDataStore::new().with_policy(CompatibilityPolicy::FailClosed);
        add(
            &closed,
            ComponentCategory::Ram,
            "DDR5 kit",
            150,
            Specifications::new().with(TYPE, "DDR5"),
        )
        .await;
        assert!(closed.list_components(&query).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn listing_sorts_and_searches() {
        let store = InMemoryDataStore::new();
        for (name, price) in [("Beta", 20), ("alpha", 30), ("Gamma", 10)] {
            add(&store, ComponentCategory::Psu, name, price, Specifications::new()).await;
        }
        let query = ListComponentsQuery {
            sort_by: Some(ComponentSortBy::Price),
            ..ListComponentsQuery::for_category(ComponentCategory::Psu)
        };
        let names: Vec<String> = store
            .list_components(&query)
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Gamma", "Beta", "alpha"]);

        let query = ListComponentsQuery {
            sort_by: Some(ComponentSortBy::Name),
            ..ListComponentsQuery::for_category(ComponentCategory::Psu)
        };
        let names: Vec<String> = store
            .list_components(&query)
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["alpha", "Beta", "Gamma"]);

        let query = ListComponentsQuery {
            search: Some("ALPHA".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list_components(&query).await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn builds_derive_total_price() {
        let store = InMemoryDataStore::new();
        let cpu = add(&store, ComponentCategory::Cpu, "7800X3D", 449, Specifications::new()).await;
        let gpu = add(&store, ComponentCategory::Gpu, "RTX 4070", 599, Specifications::new()).await;

        let mut request = CreateBuildRequest::named("Gaming");
        request.selections.insert(ComponentCategory::Cpu, cpu.id);
        let build = store.create_build(&request).await.unwrap();
        assert_eq!(build.total_price, 449);
        assert_eq!(build.status, BuildStatus::Draft);

        let mut selections = build.selections.clone();
        selections.insert(ComponentCategory::Gpu, gpu.id);
        let build = store
            .update_build(
                build.id,
                &UpdateBuildRequest {
                    selections: Some(selections),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(build.total_price, 1048);

        store.delete_component(gpu.id).await.unwrap();
        let build = store.get_build(build.id).await.unwrap().unwrap();
        assert_eq!(build.total_price, 449);
        assert!(!build.selections.contains_key(&ComponentCategory::Gpu));
    }

    #[tokio::test]
    async fn selected_components_keep_their_category() {
        let store = InMemoryDataStore::new();
        let cpu = add(&store, ComponentCategory::Cpu, "7800X3D", 449, Specifications::new()).await;
        let spare = add(&store, ComponentCategory::Cpu, "7600", 199, Specifications::new()).await;
        let mut request = CreateBuildRequest::named("Gaming");
        request.selections.insert(ComponentCategory::Cpu, cpu.id);
        let build = store.create_build(&request).await.unwrap();

        let to_gpu = UpdateComponentRequest {
            category: Some(ComponentCategory::Gpu),
            ..Default::default()
        };
        assert!(matches!(
            store.update_component(cpu.id, &to_gpu).await,
            Err(DataStoreError::InvalidInput(_))
        ));
        let stored = store.get_component(cpu.id).await.unwrap().unwrap();
        assert_eq!(stored.category, ComponentCategory::Cpu);

        let same = UpdateComponentRequest {
            category: Some(ComponentCategory::Cpu),
            price: Some(429),
            ..Default::default()
        };
        assert_eq!(store.update_component(cpu.id, &same).await.unwrap().price, 429);

        let resaved = store
            .update_build(
                build.id,
                &UpdateBuildRequest {
                    selections: Some(build.selections.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resaved.total_price, 429);

        let moved = store.update_component(spare.id, &to_gpu).await.unwrap();
        assert_eq!(moved.category, ComponentCategory::Gpu);
    }

    #[tokio::test]
    async fn builds_reject_invalid_selections() {
        let store = InMemoryDataStore::new();
        let gpu = add(&store, ComponentCategory::Gpu, "RTX 4070", 599, Specifications::new()).await;

        let mut request = CreateBuildRequest::named("Broken");
        request.selections.insert(ComponentCategory::Cpu, gpu.id);
        assert!(matches!(
            store.create_build(&request).await,
            Err(DataStoreError::InvalidInput(_))
        ));

        assert_eq!(
            store
                .update_build(BuildId(42), &UpdateBuildRequest::default())
                .await,
            Err(DataStoreError::NotFound)
        );
        assert!(store.list_builds(&ListBuildsQuery::default()).await.unwrap().is_empty());
    }
}
