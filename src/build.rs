//! # Saved Builds
//!
//! A build record is the persisted form of a build session: a name, a status and the
//! component selected for each step.  Its total price is derived from the current prices of
//! the selected components whenever the record is read.
//!
//! ## Routes
//!
//! - `GET /build` list with [`ListBuildsQuery`]
//! - `POST /build` create from [`CreateBuildRequest`]
//! - `GET /build/:id`
//! - `PUT /build/:id` partial update from [`UpdateBuildRequest`]; `selections` replaces the whole map
//! - `DELETE /build/:id`

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::component::{SortOrder, compare_names};
use crate::errors::http_error;
use crate::{BuildPersistence, ComponentCategory, ComponentId, DataStoreError};

/// The component chosen for each step.  A step without an entry has no selection.
pub type Selections = BTreeMap<ComponentCategory, ComponentId>;

/// Identifier of a saved build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(pub i64);

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BuildId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(BuildId)
    }
}

/// Lifecycle status of a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildStatus {
    /// Still being edited.
    #[default]
    Draft,
    /// Every required step has a selection.
    Completed,
    /// Bookmarked by the user.
    Saved,
}

impl BuildStatus {
    /// The upper-case wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Draft => "DRAFT",
            BuildStatus::Completed => "COMPLETED",
            BuildStatus::Saved => "SAVED",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(BuildStatus::Draft),
            "COMPLETED" => Ok(BuildStatus::Completed),
            "SAVED" => Ok(BuildStatus::Saved),
            _ => Err(format!("unknown build status: {s:?}")),
        }
    }
}

/// A persisted build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Build identifier.
    pub id: BuildId,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: BuildStatus,
    /// The component selected for each step.
    #[serde(default)]
    pub selections: Selections,
    /// Sum of the prices of the selected components.
    pub total_price: i64,
    /// When the build was created.
    pub created_at: DateTime<Utc>,
    /// When the build was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBuildRequest {
    /// Display name.
    pub name: String,
    /// Initial status.
    #[serde(default)]
    pub status: BuildStatus,
    /// Initial selections.
    #[serde(default)]
    pub selections: Selections,
}

impl CreateBuildRequest {
    /// A draft with no selections.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: BuildStatus::Draft,
            selections: Selections::new(),
        }
    }
}

/// Request body for updating a build.  Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBuildRequest {
    /// New name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BuildStatus>,
    /// Replacement selections.  The whole map is replaced, so omitted steps are cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selections: Option<Selections>,
}

/// Sort field of a build listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSortBy {
    /// Alphabetical by name.
    Name,
    /// By total price.
    TotalPrice,
    /// By creation time.
    CreatedAt,
}

/// Query parameters of `GET /build`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListBuildsQuery {
    /// Case-insensitive substring of the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Only builds with this status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BuildStatus>,
    /// Sort field, `created_at` by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<BuildSortBy>,
    /// Sort direction, descending by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl ListBuildsQuery {
    /// True when `build` passes the search and status filters.
    pub fn admits(&self, build: &BuildRecord) -> bool {
        if let Some(status) = self.status {
            if build.status != status {
                return false;
            }
        }
        match &self.search {
            Some(search) if !search.is_empty() => {
                build.name.to_lowercase().contains(&search.to_lowercase())
            }
            _ => true,
        }
    }

    /// Orders two builds the way this query's listing does.
    pub fn compare(&self, a: &BuildRecord, b: &BuildRecord) -> Ordering {
        let primary = match self.sort_by.unwrap_or(BuildSortBy::CreatedAt) {
            BuildSortBy::Name => compare_names(&a.name, &b.name),
            BuildSortBy::TotalPrice => a.total_price.cmp(&b.total_price),
            BuildSortBy::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let primary = match self.sort_order.unwrap_or(SortOrder::Desc) {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }
}

/// Checks that every selection names an existing component of the step's category and
/// returns the summed price.
///
/// `lookup` returns the category and price of a component, or `None` if it does not exist.
pub fn price_selections(
    selections: &Selections,
    mut lookup: impl FnMut(ComponentId) -> Option<(ComponentCategory, i64)>,
) -> Result<i64, DataStoreError> {
    let mut total = 0i64;
    for (category, id) in selections {
        match lookup(*id) {
            Some((actual, price)) if actual == *category => total += price,
            Some((actual, _)) => {
                return Err(DataStoreError::InvalidInput(format!(
                    "component {id} is a {actual} and cannot be selected for {category}"
                )));
            }
            None => {
                return Err(DataStoreError::InvalidInput(format!(
                    "component {id} selected for {category} does not exist"
                )));
            }
        }
    }
    Ok(total)
}

fn validate_name(name: &str) -> Result<(), (StatusCode, String)> {
    if name.trim().is_empty() {
        Err((
            StatusCode::BAD_REQUEST,
            "build name must not be empty".to_string(),
        ))
    } else {
        Ok(())
    }
}

////////////////////////////////////////////// Routes //////////////////////////////////////////////

async fn list_builds<S: BuildPersistence>(
    State(store): State<Arc<S>>,
    Query(query): Query<ListBuildsQuery>,
) -> Result<Json<Vec<BuildRecord>>, (StatusCode, String)> {
    let builds = store.list_builds(&query).await.map_err(http_error)?;
    Ok(Json(builds))
}

async fn create_build<S: BuildPersistence>(
    State(store): State<Arc<S>>,
    Json(request): Json<CreateBuildRequest>,
) -> Result<(StatusCode, Json<BuildRecord>), (StatusCode, String)> {
    validate_name(&request.name)?;
    let build = store.create_build(&request).await.map_err(http_error)?;
    tracing::info!(id = %build.id, name = %build.name, "created build");
    Ok((StatusCode::CREATED, Json(build)))
}

async fn get_build<S: BuildPersistence>(
    State(store): State<Arc<S>>,
    Path(id): Path<i64>,
) -> Result<Json<BuildRecord>, (StatusCode, String)> {
    match store.get_build(BuildId(id)).await {
        Ok(Some(build)) => Ok(Json(build)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "build not found".to_string())),
        Err(e) => Err(http_error(e)),
    }
}

async fn update_build<S: BuildPersistence>(
    State(store): State<Arc<S>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateBuildRequest>,
) -> Result<Json<BuildRecord>, (StatusCode, String)> {
    if let Some(name) = &request.name {
        validate_name(name)?;
    }
    let build = store
        .update_build(BuildId(id), &request)
        .await
        .map_err(http_error)?;
    Ok(Json(build))
}

async fn delete_build<S: BuildPersistence>(
    State(store): State<Arc<S>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    match store.delete_build(BuildId(id)).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((StatusCode::NOT_FOUND, "build not found".to_string())),
        Err(e) => Err(http_error(e)),
    }
}

/// Creates the build router.
pub fn create_build_router<S: BuildPersistence + 'static>(store: Arc<S>) -> Router {
    Router::new()
        .route("/build", get(list_builds::<S>).post(create_build::<S>))
        .route(
            "/build/:id",
            get(get_build::<S>)
                .put(update_build::<S>)
                .delete(delete_build::<S>),
        )
        .with_state(store)
}
