//! # Build Sessions
//!
//! A build session walks one user through the step graph.  It is split in two layers:
//!
//! - [`BuildState`] is a plain value holding the name, the selections, the current step and
//!   the persisted id.  Its transition methods are synchronous and enforce every invariant of
//!   the flow: only unlocked steps are selected, the current step is never locked, and
//!   changing an upstream selection clears every transitive dependent that had one.
//! - [`BuildSession`] owns a `BuildState` together with a catalog and a persistence backend.
//!   It resolves component ids before selecting them, saves after every change to the
//!   selections, and narrows candidate listings with the compatibility rules.
//!
//! Persistence is optimistic.  A transition is applied in memory first; if the save then
//! fails the caller receives [`SessionError::Persistence`] carrying the transition that was
//! applied, and may call [`BuildSession::save`] to retry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compat::{self, CompatibilityPolicy, Predicate, Upstream};
use crate::component::{ComponentSortBy, SortOrder};
use crate::{
    BuildId, BuildPersistence, BuildRecord, BuildStatus, BuildStep, Component, ComponentCatalog,
    ComponentCategory, ComponentId, ComponentPage, CreateBuildRequest, DataStoreError,
    ListComponentsQuery, Selections, StepGraph, UpdateBuildRequest,
};

fn join(categories: &[ComponentCategory]) -> String {
    categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Caller-input errors raised by session transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The category is not a step of this build.
    #[error("{0} is not a step of this build")]
    UnknownStep(ComponentCategory),
    /// A step index past the end of the graph.
    #[error("step {index} is out of range; the build has {len} steps")]
    StepOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of steps.
        len: usize,
    },
    /// The step has unselected direct dependencies.
    #[error("{step} is locked until {} is selected", join(.missing))]
    StepLocked {
        /// The locked step.
        step: ComponentCategory,
        /// Its unselected direct dependencies.
        missing: Vec<ComponentCategory>,
    },
    /// A required step cannot be skipped.
    #[error("{0} is required and cannot be skipped")]
    RequiredStep(ComponentCategory),
    /// Completion was attempted with required steps unfilled.
    #[error("missing required components: {}", join(.0))]
    MissingRequired(Vec<ComponentCategory>),
    /// The component id does not exist in the catalog.
    #[error("component {0} does not exist")]
    UnknownComponent(ComponentId),
    /// The component belongs to a different category than the step.
    #[error("component {id} is a {actual} and cannot be selected for {step}")]
    CategoryMismatch {
        /// The step being filled.
        step: ComponentCategory,
        /// The offered component.
        id: ComponentId,
        /// The component's actual category.
        actual: ComponentCategory,
    },
    /// Builds must have a name.
    #[error("build name must not be empty")]
    EmptyName,
}

/// Errors returned by [`BuildSession`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The request was rejected before any state changed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The build to resume does not exist.
    #[error("build {0} not found")]
    BuildNotFound(BuildId),
    /// Reading from the catalog or the build store failed.
    #[error("catalog unavailable: {0}")]
    Catalog(#[source] DataStoreError),
    /// The transition was applied in memory but could not be saved.
    #[error("build changed but was not saved: {source}")]
    Persistence {
        /// What was applied.
        transition: Transition,
        /// Why the save failed.
        #[source]
        source: DataStoreError,
    },
}

/// Outcome of a selection change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Whether the selections changed.
    pub changed: bool,
    /// Steps whose selections were cleared because an upstream selection changed.
    pub cleared: Vec<ComponentCategory>,
}

/// The in-progress build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    name: String,
    selections: Selections,
    current_step_index: usize,
    persisted_id: Option<BuildId>,
    status: BuildStatus,
}

impl BuildState {
    /// An empty draft positioned on the first step.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selections: Selections::new(),
            current_step_index: 0,
            persisted_id: None,
            status: BuildStatus::Draft,
        }
    }

    /// Rebuilds a session state from a saved record.
    ///
    /// Selections for categories that are not steps, or whose dependencies are unfilled, are
    /// dropped.  The current step is the first unlocked step without a selection.
    pub fn from_record(record: &BuildRecord, graph: &StepGraph) -> Self {
        let mut selections = Selections::new();
        for step in graph.steps() {
            if let Some(id) = record.selections.get(&step.category) {
                if !graph.is_locked(&selections, step.category) {
                    selections.insert(step.category, *id);
                }
            }
        }
        let current_step_index = graph
            .steps()
            .iter()
            .position(|s| {
                !selections.contains_key(&s.category) && !graph.is_locked(&selections, s.category)
            })
            .unwrap_or(0);
        Self {
            name: record.name.clone(),
            selections,
            current_step_index,
            persisted_id: Some(record.id),
            status: record.status,
        }
    }

    /// The build's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current selections.
    pub fn selections(&self) -> &Selections {
        &self.selections
    }

    /// The component selected for `category`.
    pub fn selection(&self, category: ComponentCategory) -> Option<ComponentId> {
        self.selections.get(&category).copied()
    }

    /// Index of the current step.
    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    /// The current step.
    pub fn current_step<'g>(&self, graph: &'g StepGraph) -> &'g BuildStep {
        let index = self.current_step_index.min(graph.len().saturating_sub(1));
        &graph.steps()[index]
    }

    /// Id of the saved record, once the build has been saved.
    pub fn persisted_id(&self) -> Option<BuildId> {
        self.persisted_id
    }

    /// Lifecycle status.
    pub fn status(&self) -> BuildStatus {
        self.status
    }

    /// Number of steps with a selection.
    pub fn completed_count(&self, graph: &StepGraph) -> usize {
        graph
            .steps()
            .iter()
            .filter(|s| self.selections.contains_key(&s.category))
            .count()
    }

    /// Required steps without a selection, in definition order.
    pub fn missing_required(&self, graph: &StepGraph) -> Vec<ComponentCategory> {
        graph
            .required_steps()
            .map(|s| s.category)
            .filter(|c| !self.selections.contains_key(c))
            .collect()
    }

    /// Renames the build.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        self.name = name;
        Ok(())
    }

    /// Selects `id` for `category` and clears every transitive dependent that had a selection.
    ///
    /// Selecting the already-selected id changes nothing.
    pub fn select(
        &mut self,
        graph: &StepGraph,
        category: ComponentCategory,
        id: ComponentId,
    ) -> Result<Transition, ValidationError> {
        self.check_unlocked(graph, category)?;
        if self.selection(category) == Some(id) {
            return Ok(Transition::default());
        }
        let cleared = self.cascade(graph, category);
        self.selections.insert(category, id);
        self.apply_change(graph, &cleared);
        Ok(Transition {
            changed: true,
            cleared,
        })
    }

    /// Clears `category` and every transitive dependent that had a selection.
    pub fn deselect(
        &mut self,
        graph: &StepGraph,
        category: ComponentCategory,
    ) -> Result<Transition, ValidationError> {
        if graph.step(category).is_none() {
            return Err(ValidationError::UnknownStep(category));
        }
        if self.selections.remove(&category).is_none() {
            return Ok(Transition::default());
        }
        let cleared = self.cascade(graph, category);
        self.apply_change(graph, &cleared);
        Ok(Transition {
            changed: true,
            cleared,
        })
    }

    /// Moves to the step at `index`, which must be unlocked.
    pub fn navigate_to(&mut self, graph: &StepGraph, index: usize) -> Result<(), ValidationError> {
        let step = graph.get(index).ok_or(ValidationError::StepOutOfRange {
            index,
            len: graph.len(),
        })?;
        self.check_unlocked(graph, step.category)?;
        self.current_step_index = index;
        Ok(())
    }

    /// Moves to the next unlocked step.  Stays put when there is none.
    pub fn advance(&mut self, graph: &StepGraph) -> usize {
        if let Some(index) = (self.current_step_index + 1..graph.len())
            .find(|i| !graph.is_locked(&self.selections, graph.steps()[*i].category))
        {
            self.current_step_index = index;
        }
        self.current_step_index
    }

    /// Moves to the nearest previous unlocked step.  Stays put on the first step.
    pub fn retreat(&mut self, graph: &StepGraph) -> usize {
        if let Some(index) = (0..self.current_step_index)
            .rev()
            .find(|i| !graph.is_locked(&self.selections, graph.steps()[*i].category))
        {
            self.current_step_index = index;
        }
        self.current_step_index
    }

    /// Advances past an optional step.
    pub fn skip(&mut self, graph: &StepGraph) -> Result<usize, ValidationError> {
        let step = self.current_step(graph);
        if step.required {
            return Err(ValidationError::RequiredStep(step.category));
        }
        Ok(self.advance(graph))
    }

    /// Marks the build completed if every required step has a selection.
    pub fn complete(&mut self, graph: &StepGraph) -> Result<(), ValidationError> {
        let missing = self.missing_required(graph);
        if !missing.is_empty() {
            return Err(ValidationError::MissingRequired(missing));
        }
        self.status = BuildStatus::Completed;
        Ok(())
    }

    fn check_unlocked(
        &self,
        graph: &StepGraph,
        category: ComponentCategory,
    ) -> Result<(), ValidationError> {
        if graph.step(category).is_none() {
            return Err(ValidationError::UnknownStep(category));
        }
        let missing = graph.missing_dependencies(&self.selections, category);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::StepLocked {
                step: category,
                missing,
            })
        }
    }

    // Computed against the selections as they were before the change.
    fn cascade(&self, graph: &StepGraph, category: ComponentCategory) -> Vec<ComponentCategory> {
        graph
            .dependents_of(category)
            .into_iter()
            .filter(|dep| self.selections.contains_key(dep))
            .collect()
    }

    fn apply_change(&mut self, graph: &StepGraph, cleared: &[ComponentCategory]) {
        for category in cleared {
            self.selections.remove(category);
        }
        if self.status == BuildStatus::Completed {
            self.status = BuildStatus::Draft;
        }
        // The first step has no dependencies, so this always lands somewhere.
        while self.current_step_index > 0
            && graph.is_locked(&self.selections, self.current_step(graph).category)
        {
            self.current_step_index -= 1;
        }
    }
}

/// Paging and ordering for a candidate listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRequest {
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
    /// Primary sort field.
    pub sort_by: Option<ComponentSortBy>,
    /// Direction of the primary sort field.
    pub sort_order: Option<SortOrder>,
    /// Page size.
    pub limit: Option<u32>,
    /// Id of the last item of the previous page.
    pub cursor: Option<ComponentId>,
}

/// A build session bound to a catalog and a persistence backend.
pub struct BuildSession<B> {
    graph: StepGraph,
    backend: B,
    policy: CompatibilityPolicy,
    state: BuildState,
    components: HashMap<ComponentId, Component>,
}

impl<B: ComponentCatalog + BuildPersistence> BuildSession<B> {
    /// Starts a new, unsaved build.
    pub fn new(graph: StepGraph, backend: B, name: impl Into<String>) -> Self {
        Self {
            graph,
            backend,
            policy: CompatibilityPolicy::default(),
            state: BuildState::new(name),
            components: HashMap::new(),
        }
    }

    /// Loads a saved build and resolves its selected components.
    pub async fn resume(graph: StepGraph, backend: B, id: BuildId) -> Result<Self, SessionError> {
        let record = backend
            .get_build(id)
            .await
            .map_err(SessionError::Catalog)?
            .ok_or(SessionError::BuildNotFound(id))?;
        let state = BuildState::from_record(&record, &graph);
        let mut session = Self {
            graph,
            backend,
            policy: CompatibilityPolicy::default(),
            state,
            components: HashMap::new(),
        };
        let selected: Vec<ComponentId> = session.state.selections.values().copied().collect();
        for component_id in selected {
            if let Err(e) = session.resolve(component_id).await {
                tracing::warn!(component = %component_id, error = %e, "could not resolve selected component");
            }
        }
        tracing::info!(build = %id, selected = session.state.selections.len(), "resumed build");
        Ok(session)
    }

    /// Sets what candidate listings do when an upstream component cannot be resolved.
    pub fn with_policy(mut self, policy: CompatibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The step graph this session follows.
    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    /// The in-memory build state.
    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// The backend this session reads from and saves to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The current step.
    pub fn current_step(&self) -> &BuildStep {
        self.state.current_step(&self.graph)
    }

    /// True iff some direct dependency of `category` has no selection.
    pub fn is_locked(&self, category: ComponentCategory) -> bool {
        self.graph.is_locked(&self.state.selections, category)
    }

    /// The component selected for `category`, if it has been resolved.
    pub fn selected(&self, category: ComponentCategory) -> Option<&Component> {
        self.state
            .selection(category)
            .and_then(|id| self.components.get(&id))
    }

    /// Sum of the prices of the selected components.
    pub fn total_price(&self) -> i64 {
        self.state
            .selections
            .values()
            .filter_map(|id| self.components.get(id))
            .map(|c| c.price)
            .sum()
    }

    /// Number of steps with a selection.
    pub fn completed_count(&self) -> usize {
        self.state.completed_count(&self.graph)
    }

    /// Selects component `id` for `category` and saves.
    pub async fn select_component(
        &mut self,
        category: ComponentCategory,
        id: ComponentId,
    ) -> Result<Transition, SessionError> {
        self.state.check_unlocked(&self.graph, category)?;
        if self.state.selection(category) == Some(id) {
            return Ok(Transition::default());
        }
        let component = self
            .resolve(id)
            .await
            .map_err(SessionError::Catalog)?
            .ok_or(ValidationError::UnknownComponent(id))?;
        if component.category != category {
            return Err(ValidationError::CategoryMismatch {
                step: category,
                id,
                actual: component.category,
            }
            .into());
        }
        let transition = self.state.select(&self.graph, category, id)?;
        tracing::info!(
            step = %category,
            component = %id,
            cleared = ?transition.cleared,
            "selected component"
        );
        self.persist(transition).await
    }

    /// Clears `category` and its dependents, then saves.
    pub async fn deselect_component(
        &mut self,
        category: ComponentCategory,
    ) -> Result<Transition, SessionError> {
        let transition = self.state.deselect(&self.graph, category)?;
        if !transition.changed {
            return Ok(transition);
        }
        tracing::info!(step = %category, cleared = ?transition.cleared, "deselected component");
        self.persist(transition).await
    }

    /// Moves to the step at `index`.
    pub fn navigate_to(&mut self, index: usize) -> Result<&BuildStep, ValidationError> {
        self.state.navigate_to(&self.graph, index)?;
        Ok(self.current_step())
    }

    /// Moves to the next unlocked step.
    pub fn advance(&mut self) -> &BuildStep {
        self.state.advance(&self.graph);
        self.current_step()
    }

    /// Moves to the previous unlocked step.
    pub fn retreat(&mut self) -> &BuildStep {
        self.state.retreat(&self.graph);
        self.current_step()
    }

    /// Advances past the current step, which must be optional.
    pub fn skip(&mut self) -> Result<&BuildStep, ValidationError> {
        self.state.skip(&self.graph)?;
        Ok(self.current_step())
    }

    /// Marks the build completed and saves it.
    pub async fn complete(&mut self) -> Result<BuildRecord, SessionError> {
        self.state.complete(&self.graph)?;
        tracing::info!(name = %self.state.name, "completed build");
        self.save().await
    }

    /// Renames the build, saving if it has been saved before.
    pub async fn rename(&mut self, name: impl Into<String>) -> Result<(), SessionError> {
        self.state.rename(name)?;
        if self.state.persisted_id.is_some() {
            self.save().await?;
        }
        Ok(())
    }

    /// Saves the current state, creating the record on first save.
    pub async fn save(&mut self) -> Result<BuildRecord, SessionError> {
        self.save_record()
            .await
            .map_err(|source| SessionError::Persistence {
                transition: Transition::default(),
                source,
            })
    }

    /// The compatibility predicate for `category` given the current upstream selections.
    pub async fn predicate_for(&mut self, category: ComponentCategory) -> Predicate {
        let depends_on = self
            .graph
            .step(category)
            .map(|s| s.depends_on.clone())
            .unwrap_or_default();
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for dep in depends_on {
            let Some(id) = self.state.selection(dep) else {
                continue;
            };
            match self.resolve(id).await {
                Ok(Some(component)) => resolved.push(component),
                Ok(None) => unresolved.push((dep, id)),
                Err(e) => {
                    tracing::warn!(component = %id, error = %e, "could not fetch upstream component");
                    unresolved.push((dep, id));
                }
            }
        }
        let upstream: Vec<Upstream<'_>> = resolved
            .iter()
            .map(Upstream::Resolved)
            .chain(unresolved.iter().map(|(c, id)| Upstream::Unresolved(*c, *id)))
            .collect();
        compat::predicate_for(category, &upstream, self.policy)
    }

    /// Lists components that can be selected for `category`.
    ///
    /// The catalog is asked to narrow by the upstream selections, and the page is filtered
    /// again locally with [`Self::predicate_for`].
    pub async fn candidates(
        &mut self,
        category: ComponentCategory,
        request: CandidateRequest,
    ) -> Result<ComponentPage, SessionError> {
        self.state.check_unlocked(&self.graph, category)?;
        let mut query = ListComponentsQuery {
            category: Some(category),
            search: request.search,
            sort_by: request.sort_by,
            sort_order: request.sort_order,
            limit: request.limit,
            cursor: request.cursor,
            cpu_id: None,
            motherboard_id: None,
        };
        if let Some(step) = self.graph.step(category) {
            for dep in &step.depends_on {
                match dep {
                    ComponentCategory::Cpu => query.cpu_id = self.state.selection(*dep),
                    ComponentCategory::Motherboard => {
                        query.motherboard_id = self.state.selection(*dep)
                    }
                    _ => {}
                }
            }
        }
        let predicate = self.predicate_for(category).await;
        let mut page = self
            .backend
            .list_components(&query)
            .await
            .map_err(SessionError::Catalog)?;
        page.items.retain(|c| predicate.admits(c));
        for component in &page.items {
            self.components.insert(component.id, component.clone());
        }
        Ok(page)
    }

    async fn resolve(&mut self, id: ComponentId) -> Result<Option<Component>, DataStoreError> {
        if let Some(component) = self.components.get(&id) {
            return Ok(Some(component.clone()));
        }
        let fetched = self.backend.get_component(id).await?;
        if let Some(component) = &fetched {
            self.components.insert(id, component.clone());
        }
        Ok(fetched)
    }

    async fn persist(&mut self, transition: Transition) -> Result<Transition, SessionError> {
        match self.save_record().await {
            Ok(_) => Ok(transition),
            Err(source) => {
                tracing::warn!(error = %source, "build changed but could not be saved");
                Err(SessionError::Persistence { transition, source })
            }
        }
    }

    async fn save_record(&mut self) -> Result<BuildRecord, DataStoreError> {
        match self.state.persisted_id {
            None => {
                let request = CreateBuildRequest {
                    name: self.state.name.clone(),
                    status: self.state.status,
                    selections: self.state.selections.clone(),
                };
                let record = self.backend.create_build(&request).await?;
                tracing::debug!(build = %record.id, "created build record");
                self.state.persisted_id = Some(record.id);
                Ok(record)
            }
            Some(id) => {
                let request = UpdateBuildRequest {
                    name: Some(self.state.name.clone()),
                    status: Some(self.state.status),
                    selections: Some(self.state.selections.clone()),
                };
                self.backend.update_build(id, &request).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuildStep;
    use crate::ComponentCategory::*;

    fn chain() -> StepGraph {
        StepGraph::new(vec![
            BuildStep::new(Cpu, true),
            BuildStep::new(Motherboard, true).depends_on([Cpu]),
            BuildStep::new(Ram, true).depends_on([Motherboard]),
            BuildStep::new(Gpu, false),
            BuildStep::new(Psu, true),
        ])
        .unwrap()
    }

    fn filled(graph: &StepGraph) -> BuildState {
        let mut state = BuildState::new("test");
        state.select(graph, Cpu, ComponentId(1)).unwrap();
        state.select(graph, Motherboard, ComponentId(10)).unwrap();
        state.select(graph, Ram, ComponentId(20)).unwrap();
        state
    }

    #[test]
    fn select_on_locked_step_fails() {
        let graph = chain();
        let mut state = BuildState::new("test");
        assert_eq!(
            state.select(&graph, Ram, ComponentId(20)),
            Err(ValidationError::StepLocked {
                step: Ram,
                missing: vec![Motherboard]
            })
        );
        assert!(state.selections().is_empty());
        assert_eq!(
            state.select(&graph, Case, ComponentId(1)),
            Err(ValidationError::UnknownStep(Case))
        );
    }

    #[test]
    fn reselecting_upstream_cascades_transitively() {
        let graph = chain();
        let mut state = filled(&graph);
        state.select(&graph, Gpu, ComponentId(30)).unwrap();
        assert_eq!(state.completed_count(&graph), 4);

        let transition = state.select(&graph, Cpu, ComponentId(2)).unwrap();
        assert!(transition.changed);
        assert_eq!(transition.cleared, vec![Motherboard, Ram]);
        assert_eq!(state.selection(Cpu), Some(ComponentId(2)));
        assert_eq!(state.selection(Gpu), Some(ComponentId(30)));
        assert_eq!(state.completed_count(&graph), 2);
    }

    #[test]
    fn selecting_same_id_is_a_no_op() {
        let graph = chain();
        let mut state = filled(&graph);
        let before = state.clone();
        let transition = state.select(&graph, Cpu, ComponentId(1)).unwrap();
        assert_eq!(transition, Transition::default());
        assert_eq!(state, before);
    }

    #[test]
    fn deselect_cascades_and_moves_off_locked_step() {
        let graph = chain();
        let mut state = filled(&graph);
        state.navigate_to(&graph, 2).unwrap();
        let transition = state.deselect(&graph, Cpu).unwrap();
        assert_eq!(transition.cleared, vec![Motherboard, Ram]);
        assert!(state.selections().is_empty());
        assert_eq!(state.current_step_index(), 0);

        let transition = state.deselect(&graph, Cpu).unwrap();
        assert!(!transition.changed);
    }

    #[test]
    fn advance_skips_locked_steps() {
        let graph = chain();
        let mut state = BuildState::new("test");
        assert_eq!(state.advance(&graph), 3);
        assert_eq!(state.advance(&graph), 4);
        assert_eq!(state.advance(&graph), 4);
        assert_eq!(state.retreat(&graph), 3);
        assert_eq!(state.retreat(&graph), 0);
        assert_eq!(state.retreat(&graph), 0);
    }

    #[test]
    fn navigate_checks_locks_and_range() {
        let graph = chain();
        let mut state = BuildState::new("test");
        assert!(matches!(
            state.navigate_to(&graph, 1),
            Err(ValidationError::StepLocked { step: Motherboard, .. })
        ));
        assert_eq!(
            state.navigate_to(&graph, 9),
            Err(ValidationError::StepOutOfRange { index: 9, len: 5 })
        );
        state.navigate_to(&graph, 3).unwrap();
        assert_eq!(state.current_step(&graph).category, Gpu);
    }

    #[test]
    fn skip_only_optional_steps() {
        let graph = chain();
        let mut state = BuildState::new("test");
        assert_eq!(state.skip(&graph), Err(ValidationError::RequiredStep(Cpu)));
        state.navigate_to(&graph, 3).unwrap();
        assert_eq!(state.skip(&graph), Ok(4));
    }

    #[test]
    fn complete_names_missing_required_steps() {
        let graph = chain();
        let mut state = BuildState::new("test");
        state.select(&graph, Cpu, ComponentId(1)).unwrap();
        state.select(&graph, Motherboard, ComponentId(10)).unwrap();
        let err = state.complete(&graph).unwrap_err();
        assert_eq!(err, ValidationError::MissingRequired(vec![Ram, Psu]));
        assert!(err.to_string().contains("RAM"));
        assert_eq!(state.status(), BuildStatus::Draft);

        state.select(&graph, Ram, ComponentId(20)).unwrap();
        state.select(&graph, Psu, ComponentId(40)).unwrap();
        state.complete(&graph).unwrap();
        assert_eq!(state.status(), BuildStatus::Completed);

        state.deselect(&graph, Psu).unwrap();
        assert_eq!(state.status(), BuildStatus::Draft);
    }

    #[test]
    fn from_record_prunes_orphaned_selections() {
        let graph = chain();
        let mut selections = Selections::new();
        selections.insert(Ram, ComponentId(20));
        selections.insert(Gpu, ComponentId(30));
        selections.insert(Case, ComponentId(50));
        let now = chrono::Utc::now();
        let record = BuildRecord {
            id: BuildId(7),
            name: "saved".to_string(),
            status: BuildStatus::Saved,
            selections,
            total_price: 0,
            created_at: now,
            updated_at: now,
        };
        let state = BuildState::from_record(&record, &graph);
        assert_eq!(state.persisted_id(), Some(BuildId(7)));
        assert_eq!(state.selections().len(), 1);
        assert_eq!(state.selection(Gpu), Some(ComponentId(30)));
        assert_eq!(state.current_step_index(), 0);
    }

    #[test]
    fn rename_rejects_blank_names() {
        let mut state = BuildState::new("test");
        assert_eq!(state.rename("  "), Err(ValidationError::EmptyName));
        state.rename("Gaming rig").unwrap();
        assert_eq!(state.name(), "Gaming rig");
    }
}
