//! Introspected Schema Model
//!
//! Data structures produced once at startup by catalog introspection and
//! shared immutably with every request handler: columns, foreign keys,
//! entities, and the [`SchemaModel`] that indexes them by qualified
//! identifier and by route segment.
//!
//! A deterministic SHA-256 digest over the canonicalized model is derivable
//! on demand; it changes exactly when the semantic shape of the database
//! changes, and is surfaced by the health endpoint to expose schema drift.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ident;
use crate::portable::{self, PortableType};

// ============================================================================
// COLUMNS AND FOREIGN KEYS
// ============================================================================

/// One table column as read from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Low-level vendor type tag (`udt_name`), e.g. `int4`, `_text`
    pub sql_type_tag: String,
    /// Portable textual type (`data_type`), kept for documentation
    pub declared_type: String,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Whether the column has a default expression
    pub has_default: bool,
    /// The default expression text, when present
    pub default_text: Option<String>,
    /// Maximum character length for bounded text types
    pub max_text_length: Option<i32>,
    /// 1-based declared position
    pub ordinal_position: i32,
}

impl Column {
    /// The portable type derived from the vendor tag.
    pub fn portable_type(&self) -> PortableType {
        portable::map_type_tag(&self.sql_type_tag)
    }

    /// Whether this column participates in search by default.
    pub fn is_searchable(&self) -> bool {
        portable::is_textual_tag(&self.sql_type_tag)
    }

    /// A value must be supplied on insert when the column is non-nullable
    /// and has no default.
    pub fn insert_required(&self) -> bool {
        !self.nullable && !self.has_default
    }
}

/// A foreign-key edge owned by the referencing entity.
///
/// Referenced entities are located by qualified-identifier lookup; dangling
/// references (to excluded or out-of-scope tables) are allowed and warned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub constraint_name: String,
    pub column: String,
    pub referenced_namespace: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

impl ForeignKey {
    /// Qualified identifier of the referenced table.
    pub fn referenced_identifier(&self) -> String {
        ident::qualify(&self.referenced_namespace, &self.referenced_table)
    }

    /// Route segment of the referenced table, by the same derivation rule
    /// as the owning entity's segment.
    pub fn referenced_route_segment(&self) -> String {
        ident::route_segment(&self.referenced_namespace, &self.referenced_table)
    }
}

// ============================================================================
// ENTITY
// ============================================================================

/// Columns that receive automatic timestamp handling when present.
pub const UPDATED_AT_COLUMN: &str = "updated_at";
pub const DELETED_AT_COLUMN: &str = "deleted_at";

/// One relational table with its derived addressing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Catalog namespace (schema) the table belongs to
    pub namespace: String,
    /// Local table name
    pub name: String,
    /// Columns in declared order
    pub columns: Vec<Column>,
    /// Primary-key column names in PK order; possibly empty
    pub primary_key_columns: Vec<String>,
    /// Foreign keys owned by this table
    pub foreign_keys: Vec<ForeignKey>,
}

impl Entity {
    /// The two-part quoted identifier used in generated SQL.
    pub fn qualified_identifier(&self) -> String {
        ident::qualify(&self.namespace, &self.name)
    }

    /// The URL-safe identifier this entity is addressed by.
    pub fn route_segment(&self) -> String {
        ident::route_segment(&self.namespace, &self.name)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// All column names in declared order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns that participate in search by default (textual tags).
    pub fn searchable_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_searchable())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Whether by-key operations (read, update, delete) are available.
    pub fn supports_by_key(&self) -> bool {
        !self.primary_key_columns.is_empty()
    }

    /// Whether inserts and updates auto-fill `updated_at`.
    pub fn has_updated_at(&self) -> bool {
        self.has_column(UPDATED_AT_COLUMN)
    }

    /// Whether deletes are soft (UPDATE setting `deleted_at`).
    pub fn has_deleted_at(&self) -> bool {
        self.has_column(DELETED_AT_COLUMN)
    }

    /// The column the list query sorts by when the caller names none:
    /// first PK column, else first declared column.
    pub fn default_sort_column(&self) -> Option<&str> {
        self.primary_key_columns
            .first()
            .map(|s| s.as_str())
            .or_else(|| self.columns.first().map(|c| c.name.as_str()))
    }
}

// ============================================================================
// SCHEMA MODEL
// ============================================================================

/// The immutable in-memory model of the introspected database.
///
/// Constructed once in the bounded startup phase and then handed by shared
/// reference to every request handler; never rebuilt while the process runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    /// Entities keyed by qualified identifier
    entities: BTreeMap<String, Entity>,
    /// Sorted list of namespaces that were introspected
    namespaces: Vec<String>,
    /// Route segment → qualified identifier
    #[serde(skip)]
    route_index: HashMap<String, String>,
}

impl SchemaModel {
    /// Assemble the model from introspected entities and namespaces.
    ///
    /// Namespaces are sorted; entities are keyed (and therefore iterated)
    /// by qualified identifier. Route segments are guaranteed unique by the
    /// introspector's rejection of separator-bearing names.
    pub fn new(entities: Vec<Entity>, mut namespaces: Vec<String>) -> Self {
        namespaces.sort();
        namespaces.dedup();

        let entities: BTreeMap<String, Entity> = entities
            .into_iter()
            .map(|e| (e.qualified_identifier(), e))
            .collect();

        let route_index = entities
            .iter()
            .map(|(qid, e)| (e.route_segment(), qid.clone()))
            .collect();

        Self { entities, namespaces, route_index }
    }

    /// All introspected namespaces, sorted.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Iterate entities in qualified-identifier order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of entities in the model.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the model holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up an entity by qualified identifier.
    pub fn entity(&self, qualified_identifier: &str) -> Option<&Entity> {
        self.entities.get(qualified_identifier)
    }

    /// Resolve a route segment to its entity.
    pub fn entity_by_segment(&self, segment: &str) -> Option<&Entity> {
        self.route_index
            .get(segment)
            .and_then(|qid| self.entities.get(qid))
    }

    /// Deterministic SHA-256 digest of the canonicalized model, hex-encoded.
    ///
    /// Only semantic fields participate: sorted namespaces; entities sorted
    /// by qualified identifier; per entity, columns sorted by ordinal
    /// position, PK names sorted lexicographically, FKs sorted by constraint
    /// name. Presentation-only fields (declared type text, default
    /// expression text) are excluded so cosmetic catalog differences do not
    /// register as drift.
    pub fn digest(&self) -> String {
        let canonical = self.canonical_value();
        let encoded = serde_json::to_vec(&canonical).expect("canonical model serializes");
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        hex::encode(hasher.finalize())
    }

    fn canonical_value(&self) -> serde_json::Value {
        use serde_json::json;

        let entities: Vec<serde_json::Value> = self
            .entities
            .values()
            .map(|e| {
                let mut columns = e.columns.clone();
                columns.sort_by_key(|c| c.ordinal_position);
                let columns: Vec<serde_json::Value> = columns
                    .iter()
                    .map(|c| {
                        json!({
                            "name": c.name,
                            "type": c.sql_type_tag,
                            "nullable": c.nullable,
                            "has_default": c.has_default,
                            "max_text_length": c.max_text_length,
                            "position": c.ordinal_position,
                        })
                    })
                    .collect();

                let mut pk = e.primary_key_columns.clone();
                pk.sort();

                let mut fks = e.foreign_keys.clone();
                fks.sort_by(|a, b| a.constraint_name.cmp(&b.constraint_name));
                let fks: Vec<serde_json::Value> = fks
                    .iter()
                    .map(|fk| {
                        json!({
                            "constraint": fk.constraint_name,
                            "column": fk.column,
                            "ref_namespace": fk.referenced_namespace,
                            "ref_table": fk.referenced_table,
                            "ref_column": fk.referenced_column,
                        })
                    })
                    .collect();

                json!({
                    "namespace": e.namespace,
                    "name": e.name,
                    "columns": columns,
                    "primary_key": pk,
                    "foreign_keys": fks,
                })
            })
            .collect();

        json!({
            "namespaces": self.namespaces,
            "entities": entities,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn col(name: &str, tag: &str, position: i32) -> Column {
        Column {
            name: name.to_string(),
            sql_type_tag: tag.to_string(),
            declared_type: tag.to_string(),
            nullable: true,
            has_default: false,
            default_text: None,
            max_text_length: None,
            ordinal_position: position,
        }
    }

    fn users_entity() -> Entity {
        Entity {
            namespace: "public".to_string(),
            name: "users".to_string(),
            columns: vec![col("id", "int4", 1), col("name", "text", 2), col("email", "text", 3)],
            primary_key_columns: vec!["id".to_string()],
            foreign_keys: vec![],
        }
    }

    fn metrics_entity() -> Entity {
        Entity {
            namespace: "reporting".to_string(),
            name: "metrics".to_string(),
            columns: vec![col("day", "date", 1), col("value", "numeric", 2)],
            primary_key_columns: vec![],
            foreign_keys: vec![ForeignKey {
                constraint_name: "metrics_user_fk".to_string(),
                column: "value".to_string(),
                referenced_namespace: "public".to_string(),
                referenced_table: "users".to_string(),
                referenced_column: "id".to_string(),
            }],
        }
    }

    #[test]
    fn test_entity_addressing() {
        let users = users_entity();
        assert_eq!(users.qualified_identifier(), "\"public\".\"users\"");
        assert_eq!(users.route_segment(), "users");

        let metrics = metrics_entity();
        assert_eq!(metrics.qualified_identifier(), "\"reporting\".\"metrics\"");
        assert_eq!(metrics.route_segment(), "reporting__metrics");
    }

    #[test]
    fn test_qualified_identifier_round_trip() {
        for entity in [users_entity(), metrics_entity()] {
            let parsed = crate::ident::parse_qualified(&entity.qualified_identifier());
            assert_eq!(parsed, Some((entity.namespace.clone(), entity.name.clone())));
        }
    }

    #[test]
    fn test_default_sort_column() {
        assert_eq!(users_entity().default_sort_column(), Some("id"));
        // No PK: first declared column.
        assert_eq!(metrics_entity().default_sort_column(), Some("day"));
    }

    #[test]
    fn test_searchable_columns() {
        assert_eq!(users_entity().searchable_columns(), vec!["name", "email"]);
        assert!(metrics_entity().searchable_columns().is_empty());
    }

    #[test]
    fn test_model_lookup() {
        let model = SchemaModel::new(
            vec![users_entity(), metrics_entity()],
            vec!["reporting".to_string(), "public".to_string()],
        );
        assert_eq!(model.namespaces(), &["public".to_string(), "reporting".to_string()]);
        assert_eq!(model.len(), 2);
        assert!(model.entity_by_segment("users").is_some());
        assert!(model.entity_by_segment("reporting__metrics").is_some());
        assert!(model.entity_by_segment("nope").is_none());
    }

    #[test]
    fn test_digest_is_64_hex() {
        let model = SchemaModel::new(vec![users_entity()], vec!["public".to_string()]);
        let digest = model.digest();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_digest_ignores_source_column_order() {
        let mut shuffled = users_entity();
        shuffled.columns.reverse();

        let a = SchemaModel::new(vec![users_entity()], vec!["public".to_string()]);
        let b = SchemaModel::new(vec![shuffled], vec!["public".to_string()]);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_ignores_presentation_fields() {
        let mut renamed_default = users_entity();
        renamed_default.columns[0].default_text = Some("nextval('users_id_seq')".to_string());
        renamed_default.columns[0].declared_type = "integer".to_string();

        let a = SchemaModel::new(vec![users_entity()], vec!["public".to_string()]);
        let b = SchemaModel::new(vec![renamed_default], vec!["public".to_string()]);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_tracks_semantic_change() {
        let mut widened = users_entity();
        widened.columns[1].nullable = false;

        let a = SchemaModel::new(vec![users_entity()], vec!["public".to_string()]);
        let b = SchemaModel::new(vec![widened], vec!["public".to_string()]);
        assert_ne!(a.digest(), b.digest());
    }
}
