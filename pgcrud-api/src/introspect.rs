//! Catalog Introspection
//!
//! Builds the [`SchemaModel`] from four read-only queries against the
//! `information_schema` catalog: namespaces, base-table columns, primary
//! keys, and foreign keys. The namespace query runs first; the other three
//! run concurrently and their results are merged.
//!
//! Every selected catalog column is cast to a plain `text`/`int4` in SQL
//! because `information_schema` exposes domain types the driver will not
//! decode directly.
//!
//! Any catalog query failure is fatal at startup. Once assembled, the
//! model never fails and is never rebuilt while the process runs.

use std::collections::{BTreeMap, HashSet};

use pgcrud_core::{
    breaks_route_mapping, Column, ConfigError, Entity, ForeignKey, GatewayConfig, IntrospectError,
    SchemaModel,
};

use crate::db::DbPools;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// CATALOG QUERIES
// ============================================================================

const NAMESPACES_SQL: &str = "\
SELECT schema_name::text FROM information_schema.schemata ORDER BY schema_name";

const COLUMNS_SQL: &str = "\
SELECT c.table_schema::text, c.table_name::text, c.column_name::text, \
       c.udt_name::text, c.data_type::text, c.is_nullable::text, \
       c.column_default::text, c.character_maximum_length::int4, c.ordinal_position::int4 \
FROM information_schema.columns c \
JOIN information_schema.tables t \
  ON t.table_schema = c.table_schema AND t.table_name = c.table_name \
WHERE t.table_type = 'BASE TABLE' AND c.table_schema::text = ANY($1) \
ORDER BY c.table_schema, c.table_name, c.ordinal_position";

const PRIMARY_KEYS_SQL: &str = "\
SELECT tc.table_schema::text, tc.table_name::text, kcu.column_name::text \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
  ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema \
WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema::text = ANY($1) \
ORDER BY tc.table_schema, tc.table_name, kcu.ordinal_position";

const FOREIGN_KEYS_SQL: &str = "\
SELECT tc.table_schema::text, tc.table_name::text, tc.constraint_name::text, \
       kcu.column_name::text, ccu.table_schema::text, ccu.table_name::text, \
       ccu.column_name::text \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
  ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema \
JOIN information_schema.constraint_column_usage ccu \
  ON ccu.constraint_name = tc.constraint_name AND ccu.constraint_schema = tc.constraint_schema \
WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema::text = ANY($1) \
ORDER BY tc.table_schema, tc.table_name, tc.constraint_name";

// ============================================================================
// ROW SHAPES
// ============================================================================

pub(crate) struct ColumnRow {
    pub schema: String,
    pub table: String,
    pub column: Column,
}

pub(crate) struct PkRow {
    pub schema: String,
    pub table: String,
    pub column: String,
}

pub(crate) struct FkRow {
    pub schema: String,
    pub table: String,
    pub foreign_key: ForeignKey,
}

// ============================================================================
// NAMESPACE FILTERING
// ============================================================================

/// System namespaces never exposed: `pg_`-prefixed (which covers
/// `pg_catalog`, `pg_temp*`, `pg_toast_temp*`) and the standard catalog.
fn is_system_namespace(name: &str) -> bool {
    name.starts_with("pg_") || name == "information_schema"
}

/// Apply include/exclude filtering to the catalog's namespace list.
///
/// # Errors
/// An empty result is a configuration error: the gateway would expose
/// nothing.
pub(crate) fn filter_namespaces(
    found: Vec<String>,
    config: &GatewayConfig,
) -> Result<Vec<String>, ConfigError> {
    let include: HashSet<&str> = config.include_schemas.iter().map(|s| s.as_str()).collect();
    let exclude: HashSet<&str> = config.exclude_schemas.iter().map(|s| s.as_str()).collect();

    let kept: Vec<String> = found
        .into_iter()
        .filter(|ns| !is_system_namespace(ns))
        .filter(|ns| include.is_empty() || include.contains(ns.as_str()))
        .filter(|ns| !exclude.contains(ns.as_str()))
        .collect();

    if kept.is_empty() {
        return Err(ConfigError::EmptyNamespaceSet);
    }
    Ok(kept)
}

// ============================================================================
// ASSEMBLY
// ============================================================================

/// Merge the three catalog result sets into entities.
///
/// One entity per distinct (namespace, table) pair in the column rows;
/// excluded tables (by full `namespace.table` identifier) are dropped, as
/// are tables whose names would break route-segment reverse mapping.
pub(crate) fn assemble_entities(
    columns: Vec<ColumnRow>,
    pks: Vec<PkRow>,
    fks: Vec<FkRow>,
    exclude_tables: &[String],
) -> Vec<Entity> {
    let excluded: HashSet<&str> = exclude_tables.iter().map(|s| s.as_str()).collect();

    let mut entities: BTreeMap<(String, String), Entity> = BTreeMap::new();

    for row in columns {
        let full_id = format!("{}.{}", row.schema, row.table);
        if excluded.contains(full_id.as_str()) {
            continue;
        }
        if breaks_route_mapping(&row.schema) || breaks_route_mapping(&row.table) {
            tracing::warn!(
                table = %full_id,
                "Skipping table: name contains the route separator '__'"
            );
            continue;
        }

        entities
            .entry((row.schema.clone(), row.table.clone()))
            .or_insert_with(|| Entity {
                namespace: row.schema,
                name: row.table,
                columns: Vec::new(),
                primary_key_columns: Vec::new(),
                foreign_keys: Vec::new(),
            })
            .columns
            .push(row.column);
    }

    // PK rows arrive in PK-position order and append in that order.
    for row in pks {
        if let Some(entity) = entities.get_mut(&(row.schema, row.table)) {
            entity.primary_key_columns.push(row.column);
        }
    }

    for row in fks {
        if let Some(entity) = entities.get_mut(&(row.schema, row.table)) {
            entity.foreign_keys.push(row.foreign_key);
        }
    }

    entities.into_values().collect()
}

/// Log reduced-capability and dangling-reference warnings. Warnings never
/// fail introspection.
fn warn_on_model(model: &SchemaModel) {
    for entity in model.entities() {
        if !entity.supports_by_key() {
            tracing::warn!(
                table = %entity.qualified_identifier(),
                "Table has no primary key; by-key read/update/delete are unavailable"
            );
        }
        for fk in &entity.foreign_keys {
            if model.entity(&fk.referenced_identifier()).is_none() {
                tracing::warn!(
                    table = %entity.qualified_identifier(),
                    constraint = %fk.constraint_name,
                    references = %fk.referenced_identifier(),
                    "Foreign key references a table outside the model"
                );
            }
        }
    }
}

// ============================================================================
// INTROSPECTION ENTRY POINT
// ============================================================================

/// Read the catalog and build the immutable schema model.
///
/// Runs on the primary pool. The namespace query completes first; the
/// column, PK, and FK queries then run concurrently on separate
/// connections.
pub async fn introspect(pools: &DbPools, config: &GatewayConfig) -> ApiResult<SchemaModel> {
    let conn = pools.write_conn().await?;
    let rows = conn
        .query(NAMESPACES_SQL, &[])
        .await
        .map_err(|e| catalog_error("namespaces", e))?;
    drop(conn);

    let found: Vec<String> = rows.iter().map(|row| row.get(0)).collect();
    let namespaces = filter_namespaces(found, config)?;
    tracing::info!(namespaces = ?namespaces, "Introspecting namespaces");

    let (columns, pks, fks) = tokio::try_join!(
        fetch_columns(pools, &namespaces),
        fetch_primary_keys(pools, &namespaces),
        fetch_foreign_keys(pools, &namespaces),
    )?;

    let entities = assemble_entities(columns, pks, fks, &config.exclude_tables);
    let model = SchemaModel::new(entities, namespaces);
    warn_on_model(&model);

    tracing::info!(
        tables = model.len(),
        digest = %model.digest(),
        "Schema model assembled"
    );
    Ok(model)
}

async fn fetch_columns(pools: &DbPools, namespaces: &[String]) -> ApiResult<Vec<ColumnRow>> {
    let conn = pools.write_conn().await?;
    let rows = conn
        .query(COLUMNS_SQL, &[&namespaces])
        .await
        .map_err(|e| catalog_error("columns", e))?;

    Ok(rows
        .iter()
        .map(|row| {
            let default_text: Option<String> = row.get(6);
            ColumnRow {
                schema: row.get(0),
                table: row.get(1),
                column: Column {
                    name: row.get(2),
                    sql_type_tag: row.get(3),
                    declared_type: row.get(4),
                    nullable: row.get::<_, String>(5) == "YES",
                    has_default: default_text.is_some(),
                    default_text,
                    max_text_length: row.get(7),
                    ordinal_position: row.get(8),
                },
            }
        })
        .collect())
}

async fn fetch_primary_keys(pools: &DbPools, namespaces: &[String]) -> ApiResult<Vec<PkRow>> {
    let conn = pools.write_conn().await?;
    let rows = conn
        .query(PRIMARY_KEYS_SQL, &[&namespaces])
        .await
        .map_err(|e| catalog_error("primary keys", e))?;

    Ok(rows
        .iter()
        .map(|row| PkRow {
            schema: row.get(0),
            table: row.get(1),
            column: row.get(2),
        })
        .collect())
}

async fn fetch_foreign_keys(pools: &DbPools, namespaces: &[String]) -> ApiResult<Vec<FkRow>> {
    let conn = pools.write_conn().await?;
    let rows = conn
        .query(FOREIGN_KEYS_SQL, &[&namespaces])
        .await
        .map_err(|e| catalog_error("foreign keys", e))?;

    Ok(rows
        .iter()
        .map(|row| FkRow {
            schema: row.get(0),
            table: row.get(1),
            foreign_key: ForeignKey {
                constraint_name: row.get(2),
                column: row.get(3),
                referenced_namespace: row.get(4),
                referenced_table: row.get(5),
                referenced_column: row.get(6),
            },
        })
        .collect())
}

fn catalog_error(query: &str, err: tokio_postgres::Error) -> ApiError {
    IntrospectError::CatalogQuery {
        query: query.to_string(),
        reason: err.to_string(),
    }
    .into()
}

// ============================================================================
// TESTS
// ============================================================================
