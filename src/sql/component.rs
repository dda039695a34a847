//! Catalog component operations for PostgreSQL.
//!
//! Specifications are stored as JSONB.  Compatibility constraints are pushed into the query
//! as containment of `{"attr": "value"}`, so only string attributes match, as in memory.  The
//! list fallback accepts a `compatibility` array holding the value or a string equal to it.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Transaction};

use crate::compat::{self, CompatibilityPolicy, Predicate, Upstream};
use crate::component::{ComponentSortBy, SortOrder, category_in_use};
use crate::specs::{COMPATIBILITY, Specifications};
use crate::{
    Component, ComponentId, ComponentPage, CreateComponentRequest, DataStoreError,
    ListComponentsQuery, UpdateComponentRequest,
};

/// Result type for database operations.
pub type SqlResult<T> = Result<T, DataStoreError>;

const COLUMNS: &str =
    "id, category, name, price, image_url, specifications, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ComponentRow {
    id: i64,
    category: String,
    name: String,
    price: i64,
    image_url: Option<String>,
    specifications: Json<Specifications>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ComponentRow> for Component {
    type Error = DataStoreError;

    fn try_from(row: ComponentRow) -> Result<Self, Self::Error> {
        Ok(Component {
            id: ComponentId(row.id),
            category: row
                .category
                .parse()
                .map_err(|e: crate::UnknownCategory| DataStoreError::Internal(e.to_string()))?,
            name: row.name,
            price: row.price,
            image_url: row.image_url,
            specifications: row.specifications.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Creates a component.
///
/// # Arguments
/// * `tx` - PostgreSQL transaction
/// * `request` - Category, name, price, image and specifications
///
/// # Returns
/// * `Ok(Component)` - The stored component with its id and timestamps
/// * `Err(DataStoreError::InvalidInput)` - A column constraint rejected the row
/// * `Err(DataStoreError::Internal)` - Database error
pub async fn create(
    tx: &mut Transaction<'_, Postgres>,
    request: &CreateComponentRequest,
) -> SqlResult<Component> {
    let row: ComponentRow = sqlx::query_as(&format!(
        r#"
        INSERT INTO components (category, name, price, image_url, specifications)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(request.category.as_str())
    .bind(&request.name)
    .bind(request.price)
    .bind(&request.image_url)
    .bind(Json(&request.specifications))
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "database error creating component");
        DataStoreError::from(e)
    })?;
    row.try_into()
}

/// Retrieves a component.
///
/// # Returns
/// * `Ok(Some(Component))` - Component found
/// * `Ok(None)` - Component not found
/// * `Err(DataStoreError::Internal)` - Database error
pub async fn get(
    tx: &mut Transaction<'_, Postgres>,
    id: ComponentId,
) -> SqlResult<Option<Component>> {
    let row: Option<ComponentRow> =
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM components WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "database error getting component");
                DataStoreError::from(e)
            })?;
    row.map(Component::try_from).transpose()
}

/// Applies a partial update.
///
/// # Returns
/// * `Ok(Component)` - The updated component
/// * `Err(DataStoreError::NotFound)` - No component has this id
/// * `Err(DataStoreError::InvalidInput)` - The category would change while saved builds
///   select the component
/// * `Err(DataStoreError::Internal)` - Database error
pub async fn update(
    tx: &mut Transaction<'_, Postgres>,
    id: ComponentId,
    request: &UpdateComponentRequest,
) -> SqlResult<Component> {
    if let Some(category) = request.category {
        let (in_use,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM build_selections WHERE component_id = $1 AND category <> $2)",
        )
        .bind(id.0)
        .bind(category.as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "database error checking component selections");
            DataStoreError::from(e)
        })?;
        if in_use {
            return Err(category_in_use(id, category));
        }
    }
    let row: Option<ComponentRow> = sqlx::query_as(&format!(
        r#"
        UPDATE components
        SET category = COALESCE($2, category),
            name = COALESCE($3, name),
            price = COALESCE($4, price),
            image_url = COALESCE($5, image_url),
            specifications = COALESCE($6, specifications),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id.0)
    .bind(request.category.map(|c| c.as_str()))
    .bind(&request.name)
    .bind(request.price)
    .bind(&request.image_url)
    .bind(request.specifications.as_ref().map(Json))
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "database error updating component");
        DataStoreError::from(e)
    })?;
    row.ok_or(DataStoreError::NotFound)?.try_into()
}

/// Deletes a component.  Build selections referencing it are removed by the foreign key.
///
/// # Returns
/// * `Ok(true)` - Component existed and was deleted
/// * `Ok(false)` - Component did not exist
/// * `Err(DataStoreError::Internal)` - Database error
pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: ComponentId) -> SqlResult<bool> {
    let result = sqlx::query("DELETE FROM components WHERE id = $1")
        .bind(id.0)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "database error deleting component");
            DataStoreError::from(e)
        })?;
    Ok(result.rows_affected() > 0)
}

/// Resolves the compatibility predicate for `query` against the stored upstream components.
pub async fn predicate(
    tx: &mut Transaction<'_, Postgres>,
    query: &ListComponentsQuery,
    policy: CompatibilityPolicy,
) -> SqlResult<Predicate> {
    let Some(category) = query.category else {
        return Ok(Predicate::always());
    };
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    for (expected, id) in query.upstream_ids() {
        match get(tx, id).await? {
            Some(component) => resolved.push(component),
            None => unresolved.push((expected, id)),
        }
    }
    let upstream: Vec<Upstream<'_>> = resolved
        .iter()
        .map(Upstream::Resolved)
        .chain(unresolved.iter().map(|(c, id)| Upstream::Unresolved(*c, *id)))
        .collect();
    Ok(compat::predicate_for(category, &upstream, policy))
}

fn sort_column(sort_by: ComponentSortBy) -> &'static str {
    match sort_by {
        ComponentSortBy::Name => "lower(name) COLLATE \"C\"",
        ComponentSortBy::Price => "price",
        ComponentSortBy::Date => "updated_at",
    }
}

pub(super) fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Lists one page of components matching `query` and `predicate`.
pub async fn list(
    tx: &mut Transaction<'_, Postgres>,
    query: &ListComponentsQuery,
    predicate: &Predicate,
) -> SqlResult<ComponentPage> {
    let limit = query.effective_limit();
    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM components WHERE TRUE"));
    if let Some(category) = query.category {
        qb.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND name ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)));
    }
    if predicate.is_blocked() {
        qb.push(" AND FALSE");
    }
    for constraint in predicate.constraints() {
        qb.push(" AND (FALSE");
        for attribute in constraint.attributes {
            // Attribute names are compile-time constants from the rule table.
            qb.push(format!(" OR specifications @> jsonb_build_object('{attribute}', "))
                .push_bind(constraint.expected.clone())
                .push("::text)");
        }
        if constraint.list_fallback {
            qb.push(format!(
                " OR specifications @> jsonb_build_object('{COMPATIBILITY}', jsonb_build_array("
            ))
            .push_bind(constraint.expected.clone())
            .push("::text))");
            qb.push(format!(" OR specifications @> jsonb_build_object('{COMPATIBILITY}', "))
                .push_bind(constraint.expected.clone())
                .push("::text)");
        }
        qb.push(")");
    }
    let order = match query.sort_order.unwrap_or_default() {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    if let Some(cursor) = query.cursor {
        match query.sort_by {
            None => {
                qb.push(" AND id < ").push_bind(cursor.0);
            }
            Some(sort_by) => {
                let column = sort_column(sort_by);
                let cmp = if order == "ASC" { ">" } else { "<" };
                qb.push(format!(
                    " AND ({column} {cmp} (SELECT {column} FROM components WHERE id = "
                ))
                .push_bind(cursor.0)
                .push(format!(
                    ") OR ({column} = (SELECT {column} FROM components WHERE id = "
                ))
                .push_bind(cursor.0)
                .push(") AND id < ")
                .push_bind(cursor.0)
                .push("))");
            }
        }
    }
    match query.sort_by {
        None => qb.push(" ORDER BY id DESC"),
        Some(sort_by) => qb.push(format!(" ORDER BY {} {order}, id DESC", sort_column(sort_by))),
    };
    qb.push(" LIMIT ").push_bind((limit + 1) as i64);

    let rows: Vec<ComponentRow> = qb
        .build_query_as()
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "database error listing components");
            DataStoreError::from(e)
        })?;
    let mut items = rows
        .into_iter()
        .map(Component::try_from)
        .collect::<SqlResult<Vec<_>>>()?;
    let has_more = items.len() > limit;
    items.truncate(limit);
    let next_cursor = if has_more {
        items.last().map(|c| c.id)
    } else {
        None
    };
    Ok(ComponentPage {
        items,
        next_cursor,
        has_more,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::{FORM_FACTOR, MEMORY_TYPE, SOCKET, TYPE};
    use crate::{ComponentCategory, CreateBuildRequest};

    fn request(category: ComponentCategory, name: &str, specs: Specifications) -> CreateComponentRequest {
        CreateComponentRequest {
            category,
            name: name.to_string(),
            price: 100,
            image_url: None,
            specifications: specs,
        }
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[tokio::test]
    async fn create_get_update_delete() {
        let Some(pool) = super::super::tests::setup_test_db().await else {
            return;
        };
        let mut tx = pool.begin().await.unwrap();
        let created = create(
            &mut tx,
            &request(ComponentCategory::Gpu, "RTX 4070", Specifications::new()),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let fetched = get(&mut tx, created.id).await.unwrap();
        assert_eq!(fetched.as_ref().map(|c| c.name.as_str()), Some("RTX 4070"));

        let updated = update(
            &mut tx,
            created.id,
            &UpdateComponentRequest {
                price: Some(549),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.price, 549);
        assert_eq!(updated.name, "RTX 4070");

        assert!(delete(&mut tx, created.id).await.unwrap());
        assert!(!delete(&mut tx, created.id).await.unwrap());
        assert_eq!(
            update(&mut tx, created.id, &UpdateComponentRequest::default())
                .await
                .unwrap_err(),
            DataStoreError::NotFound
        );
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn list_applies_compatibility_in_sql() {
        let Some(pool) = super::super::tests::setup_test_db().await else {
            return;
        };
        let mut tx = pool.begin().await.unwrap();
        let board = create(
            &mut tx,
            &request(
                ComponentCategory::Motherboard,
                "B650",
                Specifications::new()
                    .with(MEMORY_TYPE, "DDR5")
                    .with(FORM_FACTOR, "Micro-ATX"),
            ),
        )
        .await
        .unwrap();
        create(
            &mut tx,
            &request(ComponentCategory::Ram, "kit a", Specifications::new().with(TYPE, "DDR5")),
        )
        .await
        .unwrap();
        create(
            &mut tx,
            &request(
                ComponentCategory::Ram,
                "kit b",
                Specifications::new().with(MEMORY_TYPE, "DDR5"),
            ),
        )
        .await
        .unwrap();
        create(
            &mut tx,
            &request(ComponentCategory::Ram, "kit c", Specifications::new().with(TYPE, "DDR4")),
        )
        .await
        .unwrap();
        create(
            &mut tx,
            &request(
                ComponentCategory::Case,
                "listed case",
                Specifications::new()
                    .with(FORM_FACTOR, "Mid Tower")
                    .with(COMPATIBILITY, &["ATX", "Micro-ATX"][..]),
            ),
        )
        .await
        .unwrap();

        let query = ListComponentsQuery {
            motherboard_id: Some(board.id),
            ..ListComponentsQuery::for_category(ComponentCategory::Ram)
        };
        let p = predicate(&mut tx, &query, CompatibilityPolicy::FailOpen)
            .await
            .unwrap();
        let page = list(&mut tx, &query, &p).await.unwrap();
        let names: Vec<&str> = page.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["kit b", "kit a"]);

        create(
            &mut tx,
            &request(
                ComponentCategory::Case,
                "scalar case",
                Specifications::new()
                    .with(FORM_FACTOR, "Mid Tower")
                    .with(COMPATIBILITY, "Micro-ATX"),
            ),
        )
        .await
        .unwrap();
        create(
            &mut tx,
            &request(
                ComponentCategory::Case,
                "other case",
                Specifications::new()
                    .with(FORM_FACTOR, "Full Tower")
                    .with(COMPATIBILITY, "E-ATX"),
            ),
        )
        .await
        .unwrap();

        let query = ListComponentsQuery {
            motherboard_id: Some(board.id),
            ..ListComponentsQuery::for_category(ComponentCategory::Case)
        };
        let p = predicate(&mut tx, &query, CompatibilityPolicy::FailOpen)
            .await
            .unwrap();
        let page = list(&mut tx, &query, &p).await.unwrap();
        let names: Vec<&str> = page.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["scalar case", "listed case"]);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn list_ignores_numeric_attributes() {
        let Some(pool) = super::super::tests::setup_test_db().await else {
            return;
        };
        let mut tx = pool.begin().await.unwrap();
        let cpu = create(
            &mut tx,
            &request(ComponentCategory::Cpu, "cpu", Specifications::new().with(SOCKET, "1700")),
        )
        .await
        .unwrap();
        create(
            &mut tx,
            &request(
                ComponentCategory::Motherboard,
                "numeric",
                Specifications::new().with(SOCKET, 1700.0),
            ),
        )
        .await
        .unwrap();
        create(
            &mut tx,
            &request(
                ComponentCategory::Motherboard,
                "text",
                Specifications::new().with(SOCKET, "1700"),
            ),
        )
        .await
        .unwrap();

        let query = ListComponentsQuery {
            cpu_id: Some(cpu.id),
            ..ListComponentsQuery::for_category(ComponentCategory::Motherboard)
        };
        let p = predicate(&mut tx, &query, CompatibilityPolicy::FailOpen)
            .await
            .unwrap();
        let page = list(&mut tx, &query, &p).await.unwrap();
        let names: Vec<&str> = page.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["text"]);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn selected_components_keep_their_category() {
        let Some(pool) = super::super::tests::setup_test_db().await else {
            return;
        };
        let mut tx = pool.begin().await.unwrap();
        let cpu = create(
            &mut tx,
            &request(ComponentCategory::Cpu, "7800X3D", Specifications::new()),
        )
        .await
        .unwrap();
        let spare = create(
            &mut tx,
            &request(ComponentCategory::Cpu, "7600", Specifications::new()),
        )
        .await
        .unwrap();
        let mut build = CreateBuildRequest::named("Gaming");
        build.selections.insert(ComponentCategory::Cpu, cpu.id);
        super::super::build::create(&mut tx, &build).await.unwrap();

        let to_gpu = UpdateComponentRequest {
            category: Some(ComponentCategory::Gpu),
            ..Default::default()
        };
        assert!(matches!(
            update(&mut tx, cpu.id, &to_gpu).await,
            Err(DataStoreError::InvalidInput(_))
        ));
        let same = UpdateComponentRequest {
            category: Some(ComponentCategory::Cpu),
            price: Some(429),
            ..Default::default()
        };
        assert_eq!(update(&mut tx, cpu.id, &same).await.unwrap().price, 429);
        assert_eq!(
            update(&mut tx, spare.id, &to_gpu).await.unwrap().category,
            ComponentCategory::Gpu
        );
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn list_sorts_names_case_insensitively() {
        let Some(pool) = super::super::tests::setup_test_db().await else {
            return;
        };
        let mut tx = pool.begin().await.unwrap();
        for name in ["beta", "Alpha", "gamma", "Delta"] {
            create(
                &mut tx,
                &request(ComponentCategory::Storage, name, Specifications::new()),
            )
            .await
            .unwrap();
        }
        let query = ListComponentsQuery {
            sort_by: Some(ComponentSortBy::Name),
            ..ListComponentsQuery::for_category(ComponentCategory::Storage)
        };
        let page = list(&mut tx, &query, &Predicate::always()).await.unwrap();
        let names: Vec<&str> = page.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta", "Delta", "gamma"]);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn list_pages_with_cursor() {
        let Some(pool) = super::super::tests::setup_test_db().await else {
            return;
        };
        let mut tx = pool.begin().await.unwrap();
        for i in 0..5 {
            let mut r = request(ComponentCategory::Psu, &format!("psu {i}"), Specifications::new());
            r.price = 100 - i;
            create(&mut tx, &r).await.unwrap();
        }
        let mut query = ListComponentsQuery {
            sort_by: Some(ComponentSortBy::Price),
            limit: Some(2),
            ..ListComponentsQuery::for_category(ComponentCategory::Psu)
        };
        let mut names = Vec::new();
        loop {
            let page = list(&mut tx, &query, &Predicate::always()).await.unwrap();
            names.extend(page.items.into_iter().map(|c| c.name));
            if !page.has_more {
                break;
            }
            query.cursor = page.next_cursor;
        }
        assert_eq!(names, vec!["psu 4", "psu 3", "psu 2", "psu 1", "psu 0"]);
        tx.commit().await.unwrap();
    }
}
