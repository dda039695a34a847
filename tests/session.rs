use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pcbuilder::compat::CompatibilityPolicy;
use pcbuilder::specs::{MEMORY_TYPE, SOCKET, Specifications, TYPE};
use pcbuilder::{
    BuildId, BuildPersistence, BuildRecord, BuildSession, BuildStatus, BuildStep,
    CandidateRequest, Component, ComponentCatalog, ComponentCategory, ComponentId, ComponentPage,
    CreateBuildRequest, CreateComponentRequest, DataStoreError, InMemoryDataStore,
    ListBuildsQuery, ListComponentsQuery, SessionError, StepGraph, UpdateBuildRequest,
    UpdateComponentRequest, ValidationError,
};

use ComponentCategory::*;

/// An in-memory store whose builds can be made unwritable and whose component lookups can be
/// made to fail.  Its listings ignore the upstream ids, like a catalog without server-side
/// compatibility filtering.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryDataStore,
    reject_writes: AtomicBool,
    hide_components: AtomicBool,
}

impl FlakyStore {
    fn unavailable() -> DataStoreError {
        DataStoreError::IoError("connection refused".to_string())
    }

    fn writes_rejected(&self) -> bool {
        self.reject_writes.load(Ordering::SeqCst)
    }
}

impl ComponentCatalog for FlakyStore {
    async fn list_components(
        &self,
        query: &ListComponentsQuery,
    ) -> Result<ComponentPage, DataStoreError> {
        let unfiltered = ListComponentsQuery {
            cpu_id: None,
            motherboard_id: None,
            ..query.clone()
        };
        self.inner.list_components(&unfiltered).await
    }

    async fn get_component(&self, id: ComponentId) -> Result<Option<Component>, DataStoreError> {
        if self.hide_components.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.get_component(id).await
    }

    async fn create_component(
        &self,
        request: &CreateComponentRequest,
    ) -> Result<Component, DataStoreError> {
        self.inner.create_component(request).await
    }

    async fn update_component(
        &self,
        id: ComponentId,
        request: &UpdateComponentRequest,
    ) -> Result<Component, DataStoreError> {
        self.inner.update_component(id, request).await
    }

    async fn delete_component(&self, id: ComponentId) -> Result<bool, DataStoreError> {
        self.inner.delete_component(id).await
    }
}

impl BuildPersistence for FlakyStore {
    async fn create_build(
        &self,
        request: &CreateBuildRequest,
    ) -> Result<BuildRecord, DataStoreError> {
        if self.writes_rejected() {
            return Err(Self::unavailable());
        }
        self.inner.create_build(request).await
    }

    async fn update_build(
        &self,
        id: BuildId,
        request: &UpdateBuildRequest,
    ) -> Result<BuildRecord, DataStoreError> {
        if self.writes_rejected() {
            return Err(Self::unavailable());
        }
        self.inner.update_build(id, request).await
    }

    async fn get_build(&self, id: BuildId) -> Result<Option<BuildRecord>, DataStoreError> {
        self.inner.get_build(id).await
    }

    async fn list_builds(
        &self,
        query: &ListBuildsQuery,
    ) -> Result<Vec<BuildRecord>, DataStoreError> {
        self.inner.list_builds(query).await
    }

    async fn delete_build(&self, id: BuildId) -> Result<bool, DataStoreError> {
        self.inner.delete_build(id).await
    }
}

fn three_steps() -> StepGraph {
    StepGraph::new(vec![
        BuildStep::new(Cpu, true),
        BuildStep::new(Motherboard, true).depends_on([Cpu]),
        BuildStep::new(Ram, true).depends_on([Motherboard]),
    ])
    .unwrap()
}

async fn add<S: ComponentCatalog>(
    store: &S,
    category: ComponentCategory,
    name: &str,
    price: i64,
    specifications: Specifications,
) -> ComponentId {
    store
        .create_component(&CreateComponentRequest {
            category,
            name: name.to_string(),
            price,
            image_url: None,
            specifications,
        })
        .await
        .unwrap()
        .id
}

struct Catalog {
    am5_cpu: ComponentId,
    am4_cpu: ComponentId,
    am5_board: ComponentId,
    ddr5_by_type: ComponentId,
    ddr5_by_memory_type: ComponentId,
    ddr4: ComponentId,
}

async fn seed<S: ComponentCatalog>(store: &S) -> Catalog {
    Catalog {
        am5_cpu: add(
            store,
            Cpu,
            "Ryzen 7 7700X",
            299,
            Specifications::new().with(SOCKET, "AM5"),
        )
        .await,
        am4_cpu: add(
            store,
            Cpu,
            "Ryzen 5 5600X",
            159,
            Specifications::new().with(SOCKET, "AM4"),
        )
        .await,
        am5_board: add(
            store,
            Motherboard,
            "B650 Tomahawk",
            219,
            Specifications::new()
                .with(SOCKET, "AM5")
                .with(MEMORY_TYPE, "DDR5"),
        )
        .await,
        ddr5_by_type: add(
            store,
            Ram,
            "Vengeance 32GB DDR5",
            119,
            Specifications::new().with(TYPE, "DDR5"),
        )
        .await,
        ddr5_by_memory_type: add(
            store,
            Ram,
            "Trident Z5 32GB",
            139,
            Specifications::new().with(MEMORY_TYPE, "DDR5"),
        )
        .await,
        ddr4: add(
            store,
            Ram,
            "Ripjaws V 16GB",
            49,
            Specifications::new().with(TYPE, "DDR4"),
        )
        .await,
    }
}

fn ids(page: &ComponentPage) -> Vec<ComponentId> {
    let mut ids: Vec<ComponentId> = page.items.iter().map(|c| c.id).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn changing_the_cpu_resets_board_and_memory() {
    let store = Arc::new(InMemoryDataStore::new());
    let catalog = seed(&store).await;
    let mut session = BuildSession::new(three_steps(), Arc::clone(&store), "Gaming");

    assert!(session.is_locked(Motherboard));
    session.select_component(Cpu, catalog.am5_cpu).await.unwrap();
    assert!(!session.is_locked(Motherboard));
    assert!(session.is_locked(Ram));

    session
        .select_component(Motherboard, catalog.am5_board)
        .await
        .unwrap();
    assert!(!session.is_locked(Ram));

    let page = session
        .candidates(Ram, CandidateRequest::default())
        .await
        .unwrap();
    let mut expected = vec![catalog.ddr5_by_type, catalog.ddr5_by_memory_type];
    expected.sort();
    assert_eq!(ids(&page), expected);

    session
        .select_component(Ram, catalog.ddr5_by_memory_type)
        .await
        .unwrap();
    assert_eq!(session.completed_count(), 3);
    assert_eq!(session.total_price(), 299 + 219 + 139);

    let transition = session.select_component(Cpu, catalog.am4_cpu).await.unwrap();
    assert_eq!(transition.cleared, vec![Motherboard, Ram]);
    assert_eq!(session.completed_count(), 1);
    assert_eq!(session.total_price(), 159);
    assert_eq!(session.current_step().category, Cpu);

    let id = session.state().persisted_id().unwrap();
    let saved = store.get_build(id).await.unwrap().unwrap();
    assert_eq!(saved.selections.len(), 1);
    assert_eq!(saved.selections.get(&Cpu), Some(&catalog.am4_cpu));
    assert_eq!(saved.total_price, 159);
}

#[tokio::test]
async fn completion_names_the_missing_required_steps() {
    let store = Arc::new(InMemoryDataStore::new());
    let catalog = seed(&store).await;
    let mut session = BuildSession::new(three_steps(), Arc::clone(&store), "Half done");
    session.select_component(Cpu, catalog.am5_cpu).await.unwrap();
    session
        .select_component(Motherboard, catalog.am5_board)
        .await
        .unwrap();

    let err = session.complete().await.unwrap_err();
    match &err {
        SessionError::Validation(ValidationError::MissingRequired(missing)) => {
            assert_eq!(missing, &vec![Ram]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("RAM"));
    assert_eq!(session.state().status(), BuildStatus::Draft);

    session
        .select_component(Ram, catalog.ddr5_by_type)
        .await
        .unwrap();
    let record = session.complete().await.unwrap();
    assert_eq!(record.status, BuildStatus::Completed);
    assert_eq!(record.total_price, 299 + 219 + 119);
}

#[tokio::test]
async fn locked_and_mismatched_selections_are_rejected() {
    let store = Arc::new(InMemoryDataStore::new());
    let catalog = seed(&store).await;
    let mut session = BuildSession::new(three_steps(), Arc::clone(&store), "Strict");

    let err = session
        .select_component(Motherboard, catalog.am5_board)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Validation(ValidationError::StepLocked { step: Motherboard, .. })
    ));

    let err = session
        .select_component(Cpu, catalog.ddr4)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Validation(ValidationError::CategoryMismatch { actual: Ram, .. })
    ));

    let err = session
        .select_component(Cpu, ComponentId(9999))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Validation(ValidationError::UnknownComponent(ComponentId(9999)))
    ));

    assert!(matches!(
        session.skip(),
        Err(ValidationError::RequiredStep(Cpu))
    ));
    assert!(session.state().persisted_id().is_none());
}

#[tokio::test]
async fn failed_saves_keep_the_selection() {
    let store = Arc::new(FlakyStore::default());
    let catalog = seed(&store).await;
    let mut session = BuildSession::new(three_steps(), Arc::clone(&store), "Offline");

    store.reject_writes.store(true, Ordering::SeqCst);
    let err = session
        .select_component(Cpu, catalog.am5_cpu)
        .await
        .unwrap_err();
    match err {
        SessionError::Persistence { transition, source } => {
            assert!(transition.changed);
            assert!(matches!(source, DataStoreError::IoError(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.state().selection(Cpu), Some(catalog.am5_cpu));
    assert!(session.state().persisted_id().is_none());
    assert!(!session.is_locked(Motherboard));

    store.reject_writes.store(false, Ordering::SeqCst);
    let record = session.save().await.unwrap();
    assert_eq!(record.selections.get(&Cpu), Some(&catalog.am5_cpu));
    assert_eq!(session.state().persisted_id(), Some(record.id));
}

#[tokio::test]
async fn unresolvable_upstream_follows_the_policy() {
    let store = Arc::new(FlakyStore::default());
    let catalog = seed(&store).await;
    let record = store
        .create_build(&CreateBuildRequest {
            name: "Resumed".to_string(),
            status: BuildStatus::Draft,
            selections: [(Cpu, catalog.am5_cpu), (Motherboard, catalog.am5_board)]
                .into_iter()
                .collect(),
        })
        .await
        .unwrap();

    store.hide_components.store(true, Ordering::SeqCst);

    let mut open = BuildSession::resume(three_steps(), Arc::clone(&store), record.id)
        .await
        .unwrap();
    assert_eq!(open.state().selection(Motherboard), Some(catalog.am5_board));
    assert!(open.selected(Motherboard).is_none());
    let page = open
        .candidates(Ram, CandidateRequest::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 3);

    let mut closed = BuildSession::resume(three_steps(), Arc::clone(&store), record.id)
        .await
        .unwrap()
        .with_policy(CompatibilityPolicy::FailClosed);
    let page = closed
        .candidates(Ram, CandidateRequest::default())
        .await
        .unwrap();
    assert!(page.items.is_empty());

    store.hide_components.store(false, Ordering::SeqCst);
    let page = closed
        .candidates(Ram, CandidateRequest::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|c| c.id != catalog.ddr4));
}

#[tokio::test]
async fn resume_picks_up_where_the_build_left_off() {
    let store = Arc::new(InMemoryDataStore::new());
    let catalog = seed(&store).await;
    let mut session = BuildSession::new(three_steps(), Arc::clone(&store), "Later");
    session.select_component(Cpu, catalog.am5_cpu).await.unwrap();
    let id = session.state().persisted_id().unwrap();
    drop(session);

    let resumed = BuildSession::resume(three_steps(), Arc::clone(&store), id)
        .await
        .unwrap();
    assert_eq!(resumed.state().name(), "Later");
    assert_eq!(resumed.current_step().category, Motherboard);
    assert_eq!(resumed.total_price(), 299);

    let err = BuildSession::resume(three_steps(), Arc::clone(&store), BuildId(404))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SessionError::BuildNotFound(BuildId(404))));
}

#[tokio::test]
async fn deleting_a_component_drops_it_from_saved_builds() {
    let store = Arc::new(InMemoryDataStore::new());
    let catalog = seed(&store).await;
    let mut session = BuildSession::new(three_steps(), Arc::clone(&store), "Pruned");
    session.select_component(Cpu, catalog.am5_cpu).await.unwrap();
    session
        .select_component(Motherboard, catalog.am5_board)
        .await
        .unwrap();
    let id = session.state().persisted_id().unwrap();

    assert!(store.delete_component(catalog.am5_board).await.unwrap());
    let saved = store.get_build(id).await.unwrap().unwrap();
    assert_eq!(saved.selections.get(&Motherboard), None);
    assert_eq!(saved.total_price, 299);

    store
        .update_component(
            catalog.am5_cpu,
            &UpdateComponentRequest {
                price: Some(279),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let saved = store.get_build(id).await.unwrap().unwrap();
    assert_eq!(saved.total_price, 279);
}
