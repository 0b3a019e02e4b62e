//! Identifier index builder
//!
//! Scans one connected database's schema tree and builds a reverse
//! lookup from normalized identifier text to the objects that declare a
//! reference to it. The index is derived data: fully rebuildable from a
//! metadata snapshot, replaced wholesale on rebuild, and never mutated
//! in place while readers hold it.

use crate::metadata::{DatabaseMap, RelationType, RoutineType};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// What kind of object declared a reference. Captured at build time so
/// usage resolution never has to re-consult the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationOrigin {
    Relation {
        relation_type: RelationType,
    },
    Routine {
        routine_type: RoutineType,
        kind: Option<String>,
    },
}

/// One declared reference occurrence. The same object appears once per
/// identifier spelling it declares; buckets are never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub schema: String,
    pub object: String,
    pub origin: DeclarationOrigin,
}

/// Reverse map from normalized reference text to declaring objects.
#[derive(Debug, Clone)]
pub struct IdentifierIndex {
    entries: BTreeMap<String, Vec<IndexEntry>>,
    built_at: DateTime<Utc>,
    database_id: Option<String>,
}

impl Default for IdentifierIndex {
    fn default() -> Self {
        Self::empty()
    }
}

impl IdentifierIndex {
    /// An index with no entries. Lookups against it detect no usage,
    /// which is the documented degraded mode, not an error.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            built_at: Utc::now(),
            database_id: None,
        }
    }

    /// Build the index from the first database flagged connected. With
    /// no connected database the result is simply empty.
    pub fn build(databases: &DatabaseMap) -> Self {
        let Some((database_id, database)) = databases.iter().find(|(_, db)| db.connected) else {
            debug!("no connected database in snapshot; identifier index left empty");
            return Self::empty();
        };

        let mut entries: BTreeMap<String, Vec<IndexEntry>> = BTreeMap::new();
        for (schema_name, schema) in &database.schemas {
            for (relation_name, relation) in &schema.relations {
                for identifier in &relation.identifiers {
                    entries.entry(normalize_key(identifier)).or_default().push(IndexEntry {
                        schema: schema_name.clone(),
                        object: relation_name.clone(),
                        origin: DeclarationOrigin::Relation {
                            relation_type: relation.relation_type,
                        },
                    });
                }
            }
            for (routine_name, overloads) in &schema.routines {
                for routine in overloads {
                    for identifier in &routine.identifiers {
                        entries.entry(normalize_key(identifier)).or_default().push(IndexEntry {
                            schema: schema_name.clone(),
                            object: routine_name.clone(),
                            origin: DeclarationOrigin::Routine {
                                routine_type: routine.routine_type,
                                kind: routine.kind.clone(),
                            },
                        });
                    }
                }
            }
        }

        debug!(
            database = %database_id,
            keys = entries.len(),
            "identifier index built"
        );

        Self {
            entries,
            built_at: Utc::now(),
            database_id: Some(database_id.clone()),
        }
    }

    /// All entries declaring the given identifier. The key is
    /// normalized here with the same rule used at build time.
    pub fn lookup(&self, key: &str) -> &[IndexEntry] {
        self.entries
            .get(&normalize_key(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct normalized keys.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Id of the database the index was built from, if any was
    /// connected at build time.
    pub fn database_id(&self) -> Option<&str> {
        self.database_id.as_deref()
    }
}

/// Key normalization applied identically when indexing and when looking
/// up: trim surrounding whitespace, lowercase the rest.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DatabaseMetadata, RelationMetadata, RoutineMetadata, SchemaMetadata};
    use pretty_assertions::assert_eq;

    fn snapshot_with(identifiers: Vec<&str>) -> DatabaseMap {
        let mut schema = SchemaMetadata::default();
        schema.relations.insert(
            "orders_view".to_string(),
            RelationMetadata {
                relation_type: RelationType::View,
                identifiers: identifiers.into_iter().map(String::from).collect(),
                ..Default::default()
            },
        );
        let mut database = DatabaseMetadata {
            connected: true,
            ..Default::default()
        };
        database.schemas.insert("public".to_string(), schema);

        let mut databases = DatabaseMap::new();
        databases.insert("db1".to_string(), database);
        databases
    }

    #[test]
    fn test_build_normalizes_keys() {
        let index = IdentifierIndex::build(&snapshot_with(vec!["  Orders  "]));

        assert_eq!(index.key_count(), 1);
        let hits = index.lookup("ORDERS");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].object, "orders_view");
        assert_eq!(index.database_id(), Some("db1"));
    }

    #[test]
    fn test_duplicate_spellings_are_not_deduplicated() {
        let index = IdentifierIndex::build(&snapshot_with(vec!["orders", "ORDERS"]));

        // both spellings normalize to the same key; both occurrences stay
        assert_eq!(index.lookup("orders").len(), 2);
    }

    #[test]
    fn test_no_connected_database_yields_empty_index() {
        let mut databases = snapshot_with(vec!["orders"]);
        databases.get_mut("db1").expect("fixture database").connected = false;

        let index = IdentifierIndex::build(&databases);
        assert!(index.is_empty());
        assert_eq!(index.database_id(), None);
    }

    #[test]
    fn test_routine_overloads_are_all_indexed() {
        let mut databases = snapshot_with(vec![]);
        let schema = databases
            .get_mut("db1")
            .and_then(|db| db.schemas.get_mut("public"))
            .expect("fixture schema");
        schema.routines.insert(
            "audit_orders".to_string(),
            vec![
                RoutineMetadata {
                    kind: Some("trigger".to_string()),
                    identifiers: vec!["orders".to_string()],
                    ..Default::default()
                },
                RoutineMetadata {
                    identifiers: vec!["orders".to_string()],
                    ..Default::default()
                },
            ],
        );

        let index = IdentifierIndex::build(&databases);
        let hits = index.lookup("orders");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|entry| entry.object == "audit_orders"));
    }

    #[test]
    fn test_lookup_on_unknown_key_is_empty() {
        let index = IdentifierIndex::build(&snapshot_with(vec!["orders"]));
        assert!(index.lookup("customers").is_empty());
    }
}
