//! Database metadata model
//!
//! Structural mirror of what the metadata provider returns: a
//! point-in-time tree of databases -> schemas -> {relations, routines,
//! sequences, types}, each carrying kind, owner, permissions,
//! statistics, constraints, and the raw reference identifiers extracted
//! from its definition. The analyzer never talks to a live database;
//! it consumes this tree and nothing else.
//!
//! Maps are `BTreeMap` so that "first connected database" and index
//! discovery order are deterministic.

use crate::error::MetadataError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;

/// All known databases, keyed by database id.
pub type DatabaseMap = BTreeMap<String, DatabaseMetadata>;

/// The external collaborator that enumerates schemas and their objects
/// from a live connection. Each call returns a fresh snapshot.
pub trait MetadataProvider: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<DatabaseMap, MetadataError>> + Send;
}

/// One database in the snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseMetadata {
    /// Whether a live session is currently attached to this database.
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub schemas: BTreeMap<String, SchemaMetadata>,
}

/// One schema and everything it contains.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    /// First entry on the session search path.
    #[serde(default, rename = "default")]
    pub is_default: bool,
    /// System catalog schema (pg_catalog, information_schema, ...).
    #[serde(default)]
    pub catalog: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<UsagePermissions>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationMetadata>,
    /// Routines keyed by name; one name may carry several overloads.
    #[serde(default)]
    pub routines: BTreeMap<String, Vec<RoutineMetadata>>,
    #[serde(default)]
    pub sequences: BTreeMap<String, SequenceMetadata>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeMetadata>,
}

/// Closed discriminator for relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Table,
    View,
}

/// Closed discriminator for routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutineType {
    Function,
    Procedure,
}

impl RoutineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutineType::Function => "function",
            RoutineType::Procedure => "procedure",
        }
    }
}

/// A table or view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationMetadata {
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    /// Storage flavor reported by the provider ("temporary",
    /// "partitioned", ...). Open set, kept as raw text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<RelationPermissions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RelationStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeyRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexRef>,
    /// Raw identifier strings extracted from the object definition by
    /// the provider. The analyzer does not parse SQL itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
}

impl Default for RelationMetadata {
    fn default() -> Self {
        Self {
            relation_type: RelationType::Table,
            kind: None,
            owner: None,
            permissions: None,
            stats: None,
            foreign_keys: Vec::new(),
            constraints: Vec::new(),
            indexes: Vec::new(),
            identifiers: Vec::new(),
        }
    }
}

/// A function or procedure overload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineMetadata {
    #[serde(rename = "type")]
    pub routine_type: RoutineType,
    /// "trigger", "aggregate", "window", ... Open set, kept as raw text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<RoutinePermissions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<RoutineArgument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
}

impl Default for RoutineMetadata {
    fn default() -> Self {
        Self {
            routine_type: RoutineType::Function,
            kind: None,
            owner: None,
            permissions: None,
            arguments: Vec::new(),
            identifiers: Vec::new(),
        }
    }
}

/// A sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<UsagePermissions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
}

/// A user-defined type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMetadata {
    /// "composite", "enum", "domain", ... Open set, kept as raw text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<UsagePermissions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
}

/// Privileges on a relation. `Some(false)` means the provider reported
/// an explicit denial; `None` means the privilege was not probed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationPermissions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<bool>,
}

/// EXECUTE privilege on a routine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutinePermissions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execute: Option<bool>,
}

/// USAGE privilege on a schema, sequence, or type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePermissions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<bool>,
}

/// Planner statistics for a relation, as far as the provider knows them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writes: Option<i64>,
}

/// Outgoing foreign key declared on a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyRef {
    pub name: String,
    pub referenced_schema: String,
    pub referenced_table: String,
}

/// Non-FK constraint declared on a relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintRef {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub constraint_type: Option<String>,
}

/// Index declared on a relation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

/// One argument in a routine signature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineArgument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_schema_metadata_deserializes_sparse_input() {
        let schema: SchemaMetadata = serde_json::from_str(
            r#"{ "default": true, "relations": { "orders": { "type": "table" } } }"#,
        )
        .expect("valid schema json");

        assert!(schema.is_default);
        assert!(!schema.catalog);
        assert_eq!(schema.relations.len(), 1);
        let orders = &schema.relations["orders"];
        assert_eq!(orders.relation_type, RelationType::Table);
        assert!(orders.identifiers.is_empty());
        assert!(schema.routines.is_empty());
    }

    #[test]
    fn test_relation_serializes_camel_case() {
        let relation = RelationMetadata {
            relation_type: RelationType::View,
            foreign_keys: vec![ForeignKeyRef {
                name: "orders_user_fk".to_string(),
                referenced_schema: "public".to_string(),
                referenced_table: "users".to_string(),
            }],
            ..Default::default()
        };

        let value = serde_json::to_value(&relation).expect("serializable");
        assert_eq!(value["type"], "view");
        assert_eq!(value["foreignKeys"][0]["referencedTable"], "users");
        // absent optionals are omitted entirely
        assert!(value.get("owner").is_none());
        assert!(value.get("stats").is_none());
    }
}
