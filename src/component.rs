//! # Catalog Components
//!
//! A component is a purchasable part: a category, a name, a price in whole currency units and
//! an open map of specifications.  This module defines the component record, the request and
//! query types of the catalog API, and the axum router that serves them.
//!
//! ## Listing
//!
//! Listing is cursor paginated.  A page holds at most `limit` items (default 20, clamped to
//! 1..=100); `has_more` tells whether another page exists and `next_cursor` is the id of the
//! last item returned.  The next request passes that id as `cursor` and receives the items
//! that sort strictly after it.
//!
//! Ordering is `id` descending unless `sort_by` is given, in which case the chosen field is
//! the primary key (ascending unless `sort_order=desc`) and `id` descending breaks ties.
//!
//! When `cpu_id` or `motherboard_id` are supplied the listing is narrowed to components that
//! are compatible with that upstream part.  See [`crate::compat`].
//!
//! ## Routes
//!
//! - `GET /component` list with [`ListComponentsQuery`]
//! - `POST /component` create from [`CreateComponentRequest`]
//! - `GET /component/:id`
//! - `PUT /component/:id` partial update from [`UpdateComponentRequest`]
//! - `DELETE /component/:id`

use std::cmp::Ordering;
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

use crate::errors::http_error;
use crate::specs::{Specifications, validate_specifications};
use crate::{ComponentCatalog, ComponentCategory, DataStoreError};

/// Default page size for component listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Largest page size a listing will return.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Identifier of a catalog component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub i64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ComponentId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ComponentId)
    }
}

/// A catalog component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Catalog identifier.
    pub id: ComponentId,
    /// What kind of part this is.
    pub category: ComponentCategory,
    /// Display name.
    pub name: String,
    /// Price in whole currency units.
    pub price: i64,
    /// Product image, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Attribute map read by the compatibility rules.
    #[serde(default)]
    pub specifications: Specifications,
    /// When the component was created.
    pub created_at: DateTime<Utc>,
    /// When the component was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateComponentRequest {
    /// What kind of part this is.
    pub category: ComponentCategory,
    /// Display name.
    pub name: String,
    /// Price in whole currency units.
    pub price: i64,
    /// Product image, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Attribute map.
    #[serde(default)]
    pub specifications: Specifications,
}

impl CreateComponentRequest {
    /// Checks the name, the price and the category's specification sheet.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("component name must not be empty".to_string());
        }
        if self.price < 0 {
            return Err("component price must not be negative".to_string());
        }
        validate_specifications(self.category, &self.specifications).map_err(|e| e.to_string())
    }
}

/// Request body for a partial component update.  Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateComponentRequest {
    /// New category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ComponentCategory>,
    /// New name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    /// New image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Replacement attribute map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<Specifications>,
}

impl UpdateComponentRequest {
    /// Applies the present fields to `component`.  Timestamps are left to the store.
    pub fn apply_to(&self, component: &mut Component) {
        if let Some(category) = self.category {
            component.category = category;
        }
        if let Some(name) = &self.name {
            component.name = name.clone();
        }
        if let Some(price) = self.price {
            component.price = price;
        }
        if let Some(image_url) = &self.image_url {
            component.image_url = Some(image_url.clone());
        }
        if let Some(specifications) = &self.specifications {
            component.specifications = specifications.clone();
        }
    }

    /// The category this update moves `component` to, if it changes at all.
    pub fn recategorizes(&self, component: &Component) -> Option<ComponentCategory> {
        self.category.filter(|category| *category != component.category)
    }
}

/// The error returned when a component still selected by saved builds would change category.
///
/// Builds keep each selection under its step's category, so the move would strand them.
pub fn category_in_use(id: ComponentId, category: ComponentCategory) -> DataStoreError {
    DataStoreError::InvalidInput(format!(
        "component {id} is selected by saved builds and cannot become a {category}"
    ))
}

/// Primary sort field of a component listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentSortBy {
    /// Alphabetical by name.
    Name,
    /// By price.
    Price,
    /// By last update time.
    Date,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

/// Query parameters of `GET /component`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListComponentsQuery {
    /// Only components of this category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ComponentCategory>,
    /// Case-insensitive substring of the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Primary sort field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<ComponentSortBy>,
    /// Direction of the primary sort field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    /// Page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Id of the last item of the previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<ComponentId>,
    /// Narrow to components compatible with this CPU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_id: Option<ComponentId>,
    /// Narrow to components compatible with this motherboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motherboard_id: Option<ComponentId>,
}

impl ListComponentsQuery {
    /// A query for one category with default paging.
    pub fn for_category(category: ComponentCategory) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    /// The page size after applying the default and the clamp.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE) as usize
    }

    /// The upstream parts this query is narrowed by.
    pub fn upstream_ids(&self) -> Vec<(ComponentCategory, ComponentId)> {
        let mut upstream = Vec::new();
        if let Some(id) = self.cpu_id {
            upstream.push((ComponentCategory::Cpu, id));
        }
        if let Some(id) = self.motherboard_id {
            upstream.push((ComponentCategory::Motherboard, id));
        }
        upstream
    }

    /// True when `component` passes the category and search filters.
    pub fn admits(&self, component: &Component) -> bool {
        if let Some(category) = self.category {
            if component.category != category {
                return false;
            }
        }
        match &self.search {
            Some(search) if !search.is_empty() => component
                .name
                .to_lowercase()
                .contains(&search.to_lowercase()),
            _ => true,
        }
    }

    /// Orders two components the way this query's listing does.
    pub fn compare(&self, a: &Component, b: &Component) -> Ordering {
        let primary = match self.sort_by {
            None => Ordering::Equal,
            Some(ComponentSortBy::Name) => compare_names(&a.name, &b.name),
            Some(ComponentSortBy::Price) => a.price.cmp(&b.price),
            Some(ComponentSortBy::Date) => a.updated_at.cmp(&b.updated_at),
        };
        let primary = match self.sort_order.unwrap_or_default() {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }
}

/// Orders names case-insensitively, by the bytes of their lowercase form.
///
/// PostgreSQL listings sort on `lower(name) COLLATE "C"`, which agrees with this.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// One page of a component listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentPage {
    /// Components on this page.
    pub items: Vec<Component>,
    /// Cursor for the following page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<ComponentId>,
    /// Whether another page exists.
    pub has_more: bool,
}

/// Sorts and pages already-filtered components for `query`.
///
/// A cursor that is not among `items` yields an empty page for custom orderings.  Under the
/// default ordering it behaves as "ids below the cursor", so a deleted cursor row still pages.
pub fn paginate(mut items: Vec<Component>, query: &ListComponentsQuery) -> ComponentPage {
    items.sort_by(|a, b| query.compare(a, b));
    let start = match query.cursor {
        None => 0,
        Some(cursor) => match items.iter().position(|c| c.id == cursor) {
            Some(pos) => pos + 1,
            None if query.sort_by.is_none() => items
                .iter()
                .position(|c| c.id < cursor)
                .unwrap_or(items.len()),
            None => items.len(),
        },
    };
    let limit = query.effective_limit();
    let mut items: Vec<Component> = items.into_iter().skip(start).take(limit + 1).collect();
    let has_more = items.len() > limit;
    items.truncate(limit);
    let next_cursor = if has_more {
        items.last().map(|c| c.id)
    } else {
        None
    };
    ComponentPage {
        items,
        next_cursor,
        has_more,
    }
}

////////////////////////////////////////////// Routes //////////////////////////////////////////////

async fn list_components<S: ComponentCatalog>(
    State(store): State<Arc<S>>,
    Query(query): Query<ListComponentsQuery>,
) -> Result<Json<ComponentPage>, (StatusCode, String)> {
    let page = store.list_components(&query).await.map_err(http_error)?;
    Ok(Json(page))
}

async fn create_component<S: ComponentCatalog>(
    State(store): State<Arc<S>>,
    Json(request): Json<CreateComponentRequest>,
) -> Result<(StatusCode, Json<Component>), (StatusCode, String)> {
    request
        .validate()
        .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;
    let component = store
        .create_component(&request)
        .await
        .map_err(http_error)?;
    tracing::info!(id = %component.id, category = %component.category, "created component");
    Ok((StatusCode::CREATED, Json(component)))
}

async fn get_component<S: ComponentCatalog>(
    State(store): State<Arc<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Component>, (StatusCode, String)> {
    match store.get_component(ComponentId(id)).await {
        Ok(Some(component)) => Ok(Json(component)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "component not found".to_string())),
        Err(e) => Err(http_error(e)),
    }
}

async fn update_component<S: ComponentCatalog>(
    State(store): State<Arc<S>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateComponentRequest>,
) -> Result<Json<Component>, (StatusCode, String)> {
    let id = ComponentId(id);
    let mut merged = store
        .get_component(id)
        .await
        .map_err(http_error)?
        .ok_or((StatusCode::NOT_FOUND, "component not found".to_string()))?;
    request.apply_to(&mut merged);
    CreateComponentRequest {
        category: merged.category,
        name: merged.name,
        price: merged.price,
        image_url: merged.image_url,
        specifications: merged.specifications,
    }
    .validate()
    .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;
    let component = store
        .update_component(id, &request)
        .await
        .map_err(http_error)?;
    Ok(Json(component))
}

async fn delete_component<S: ComponentCatalog>(
    State(store): State<Arc<S>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    match store.delete_component(ComponentId(id)).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((StatusCode::NOT_FOUND, "component not found".to_string())),
        Err(e) => Err(http_error(e)),
    }
}

/// Creates the catalog router.
pub fn create_component_router<S: ComponentCatalog + 'static>(store: Arc<S>) -> Router {
    Router::new()
        .route(
            "/component",
            get(list_components::<S>).post(create_component::<S>),
        )
        .route(
            "/component/:id",
            get(get_component::<S>)
                .put(update_component::<S>)
                .delete(delete_component::<S>),
        )
        .with_state(store)
}
