//! Saved build operations for PostgreSQL.
//!
//! Builds live in `builds`; their selections live in `build_selections`, one row per step,
//! with foreign keys to both the build and the component.  The total price is summed from
//! the selected components on every read.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder, Transaction};

use crate::build::price_selections;
use crate::component::SortOrder;
use crate::{
    BuildId, BuildRecord, BuildSortBy, BuildStatus, ComponentCategory, ComponentId,
    CreateBuildRequest, DataStoreError, ListBuildsQuery, Selections, UpdateBuildRequest,
};

use super::component::{SqlResult, escape_like};

const SELECT_BUILDS: &str = r#"
    SELECT b.id, b.name, b.status, b.created_at, b.updated_at,
           COALESCE(SUM(c.price), 0)::BIGINT AS total_price
    FROM builds b
    LEFT JOIN build_selections s ON s.build_id = b.id
    LEFT JOIN components c ON c.id = s.component_id
"#;

#[derive(sqlx::FromRow)]
struct BuildRow {
    id: i64,
    name: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    total_price: i64,
}

impl BuildRow {
    fn into_record(self, selections: Selections) -> SqlResult<BuildRecord> {
        Ok(BuildRecord {
            id: BuildId(self.id),
            name: self.name,
            status: self.status.parse().map_err(DataStoreError::Internal)?,
            selections,
            total_price: self.total_price,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> DataStoreError {
    move |e| {
        tracing::error!(error = %e, "database error {context}");
        DataStoreError::from(e)
    }
}

async fn check_selections(
    tx: &mut Transaction<'_, Postgres>,
    selections: &Selections,
) -> SqlResult<()> {
    let ids: Vec<i64> = selections.values().map(|id| id.0).collect();
    let rows: Vec<(i64, String, i64)> =
        sqlx::query_as("SELECT id, category, price FROM components WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut **tx)
            .await
            .map_err(db_error("checking selections"))?;
    let found: HashMap<ComponentId, (ComponentCategory, i64)> = rows
        .into_iter()
        .filter_map(|(id, category, price)| {
            category
                .parse()
                .ok()
                .map(|category| (ComponentId(id), (category, price)))
        })
        .collect();
    price_selections(selections, |id| found.get(&id).copied()).map(|_| ())
}

async fn replace_selections(
    tx: &mut Transaction<'_, Postgres>,
    id: BuildId,
    selections: &Selections,
) -> SqlResult<()> {
    sqlx::query("DELETE FROM build_selections WHERE build_id = $1")
        .bind(id.0)
        .execute(&mut **tx)
        .await
        .map_err(db_error("clearing selections"))?;
    for (category, component) in selections {
        sqlx::query(
            "INSERT INTO build_selections (build_id, category, component_id) VALUES ($1, $2, $3)",
        )
        .bind(id.0)
        .bind(category.as_str())
        .bind(component.0)
        .execute(&mut **tx)
        .await
        .map_err(db_error("inserting selection"))?;
    }
    Ok(())
}

async fn selections_for(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[i64],
) -> SqlResult<HashMap<BuildId, Selections>> {
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT build_id, category, component_id FROM build_selections WHERE build_id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_error("loading selections"))?;
    let mut by_build: HashMap<BuildId, Selections> = HashMap::new();
    for (build_id, category, component_id) in rows {
        let category: ComponentCategory = category
            .parse()
            .map_err(|e: crate::UnknownCategory| DataStoreError::Internal(e.to_string()))?;
        by_build
            .entry(BuildId(build_id))
            .or_default()
            .insert(category, ComponentId(component_id));
    }
    Ok(by_build)
}

/// Creates a build and its selections.
///
/// # Returns
/// * `Ok(BuildRecord)` - The stored build
/// * `Err(DataStoreError::InvalidInput)` - A selection names a missing component or one of
///   the wrong category
/// * `Err(DataStoreError::Internal)` - Database error
pub async fn create(
    tx: &mut Transaction<'_, Postgres>,
    request: &CreateBuildRequest,
) -> SqlResult<BuildRecord> {
    check_selections(tx, &request.selections).await?;
    let (id,): (i64,) =
        sqlx::query_as("INSERT INTO builds (name, status) VALUES ($1, $2) RETURNING id")
            .bind(&request.name)
            .bind(request.status.as_str())
            .fetch_one(&mut **tx)
            .await
            .map_err(db_error("creating build"))?;
    replace_selections(tx, BuildId(id), &request.selections).await?;
    get(tx, BuildId(id)).await?.ok_or(DataStoreError::NotFound)
}

/// Applies a partial update.  Present selections replace the stored set.
///
/// # Returns
/// * `Ok(BuildRecord)` - The updated build
/// * `Err(DataStoreError::NotFound)` - No build has this id
/// * `Err(DataStoreError::InvalidInput)` - A selection is invalid
pub async fn update(
    tx: &mut Transaction<'_, Postgres>,
    id: BuildId,
    request: &UpdateBuildRequest,
) -> SqlResult<BuildRecord> {
    if let Some(selections) = &request.selections {
        check_selections(tx, selections).await?;
    }
    let result = sqlx::query(
        r#"
        UPDATE builds
        SET name = COALESCE($2, name),
            status = COALESCE($3, status),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        "#,
    )
    .bind(id.0)
    .bind(&request.name)
    .bind(request.status.map(|s| s.as_str()))
    .execute(&mut **tx)
    .await
    .map_err(db_error("updating build"))?;
    if result.rows_affected() == 0 {
        return Err(DataStoreError::NotFound);
    }
    if let Some(selections) = &request.selections {
        replace_selections(tx, id, selections).await?;
    }
    get(tx, id).await?.ok_or(DataStoreError::NotFound)
}

/// Retrieves a build with its selections and total price.
pub async fn get(tx: &mut Transaction<'_, Postgres>, id: BuildId) -> SqlResult<Option<BuildRecord>> {
    let row: Option<BuildRow> =
        sqlx::query_as(&format!("{SELECT_BUILDS} WHERE b.id = $1 GROUP BY b.id"))
            .bind(id.0)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error("getting build"))?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut selections = selections_for(tx, &[row.id]).await?;
    let selections = selections.remove(&id).unwrap_or_default();
    row.into_record(selections).map(Some)
}

/// Lists builds matching `query`.
pub async fn list(
    tx: &mut Transaction<'_, Postgres>,
    query: &ListBuildsQuery,
) -> SqlResult<Vec<BuildRecord>> {
    let mut qb = QueryBuilder::<Postgres>::new(SELECT_BUILDS);
    qb.push(" WHERE TRUE");
    if let Some(status) = query.status {
        qb.push(" AND b.status = ").push_bind(status.as_str());
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND b.name ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)));
    }
    let column = match query.sort_by.unwrap_or(BuildSortBy::CreatedAt) {
        BuildSortBy::Name => "lower(b.name) COLLATE \"C\"",
        BuildSortBy::TotalPrice => "total_price",
        BuildSortBy::CreatedAt => "b.created_at",
    };
    let order = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    qb.push(format!(" GROUP BY b.id ORDER BY {column} {order}, b.id DESC"));

    let rows: Vec<BuildRow> = qb
        .build_query_as()
        .fetch_all(&mut **tx)
        .await
        .map_err(db_error("listing builds"))?;
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut selections = selections_for(tx, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let s = selections.remove(&BuildId(row.id)).unwrap_or_default();
            row.into_record(s)
        })
        .collect()
}

/// Deletes a build and its selections.
pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: BuildId) -> SqlResult<bool> {
    let result = sqlx::query("DELETE FROM builds WHERE id = $1")
        .bind(id.0)
        .execute(&mut **tx)
        .await
        .map_err(db_error("deleting build"))?;
    Ok(result.rows_affected() > 0)
}
