//! Usage resolution
//!
//! Answers "who references this object?" by querying the identifier
//! index under several normalized key spellings. Hits are unioned in
//! key order and deliberately not deduplicated across keys: a declarer
//! that spelled the reference two ways shows up twice, and the risk
//! rules count it twice.

use crate::safety::index::{DeclarationOrigin, IdentifierIndex, IndexEntry};
use crate::safety::types::{UsageKind, UsageReference};
use crate::metadata::RelationType;
use regex::Regex;

/// Find every indexed object referencing `object_name` in
/// `schema_name`.
///
/// Three key spellings are tried in order: the bare object name, the
/// `schema.object` form, and the quoted `"schema"."object"` literal
/// built from the case-preserved inputs (quoted identifiers are
/// case-sensitive at declaration sites; normalization reconciles the
/// lookup).
pub fn find_usage(
    index: &IdentifierIndex,
    object_name: &str,
    schema_name: &str,
) -> Vec<UsageReference> {
    let keys = [
        object_name.to_string(),
        format!("{schema_name}.{object_name}"),
        format!("\"{schema_name}\".\"{object_name}\""),
    ];

    let mut usage = Vec::new();
    for key in &keys {
        for entry in index.lookup(key) {
            if let Some(reference) = usage_reference(entry) {
                usage.push(reference);
            }
        }
    }
    usage
}

/// Map an index hit to a usage reference. Views and routines count as
/// usage; anything else (plain tables carrying FK identifiers, for
/// instance) is silently skipped.
fn usage_reference(entry: &IndexEntry) -> Option<UsageReference> {
    match &entry.origin {
        DeclarationOrigin::Relation {
            relation_type: RelationType::View,
        } => Some(UsageReference {
            ref_kind: UsageKind::Relation,
            name: format!("{}.{}", entry.schema, entry.object),
            location: "view".to_string(),
        }),
        DeclarationOrigin::Relation { .. } => None,
        DeclarationOrigin::Routine { routine_type, kind } => Some(UsageReference {
            ref_kind: UsageKind::Routine,
            name: format!("{}.{}", entry.schema, entry.object),
            location: format!(
                "{}/{}",
                routine_type.as_str(),
                kind.as_deref().unwrap_or("regular")
            ),
        }),
    }
}

/// Fallback matcher for unqualified or partially qualified identifier
/// text.
///
/// Not part of the standard lookup path: `find_usage` only consults the
/// exact key spellings above. Callers that want fuzzy coverage of raw
/// identifier strings invoke this directly. Matches the object name as
/// a whole word, case-insensitively, with optional surrounding quotes.
pub fn matches_identifier(identifier: &str, object_name: &str) -> bool {
    let needle = object_name.trim();
    if needle.is_empty() {
        return false;
    }
    let pattern = format!(r#"(?i)(^|[^\w])"?{}"?($|[^\w])"#, regex::escape(needle));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(identifier),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        DatabaseMap, DatabaseMetadata, RelationMetadata, RoutineMetadata, RoutineType,
        SchemaMetadata,
    };
    use pretty_assertions::assert_eq;

    fn indexed_snapshot() -> IdentifierIndex {
        let mut schema = SchemaMetadata::default();
        // a view referencing `orders` two ways, a table with an FK
        // identifier, and a trigger function
        schema.relations.insert(
            "order_totals".to_string(),
            RelationMetadata {
                relation_type: RelationType::View,
                identifiers: vec!["orders".to_string(), "public.orders".to_string()],
                ..Default::default()
            },
        );
        schema.relations.insert(
            "shipments".to_string(),
            RelationMetadata {
                identifiers: vec!["orders".to_string()],
                ..Default::default()
            },
        );
        schema.routines.insert(
            "audit_orders".to_string(),
            vec![RoutineMetadata {
                routine_type: RoutineType::Function,
                kind: Some("trigger".to_string()),
                identifiers: vec!["\"public\".\"orders\"".to_string()],
                ..Default::default()
            }],
        );

        let mut database = DatabaseMetadata {
            connected: true,
            ..Default::default()
        };
        database.schemas.insert("public".to_string(), schema);
        let mut databases = DatabaseMap::new();
        databases.insert("db1".to_string(), database);
        IdentifierIndex::build(&databases)
    }

    #[test]
    fn test_union_across_key_spellings_without_dedup() {
        let index = indexed_snapshot();
        let usage = find_usage(&index, "orders", "public");

        // bare key: view once (table is skipped), qualified key: view
        // again, quoted key: the trigger function
        assert_eq!(usage.len(), 3);
        assert_eq!(usage[0].name, "public.order_totals");
        assert_eq!(usage[0].location, "view");
        assert_eq!(usage[1].name, "public.order_totals");
        assert_eq!(usage[2].name, "public.audit_orders");
        assert_eq!(usage[2].location, "function/trigger");
        assert_eq!(usage[2].ref_kind, UsageKind::Routine);
    }

    #[test]
    fn test_lookup_tolerates_case_variants() {
        let index = indexed_snapshot();
        let lower = find_usage(&index, "orders", "public");
        let mixed = find_usage(&index, "Orders", "Public");
        let upper = find_usage(&index, "ORDERS", "PUBLIC");

        assert!(!lower.is_empty());
        assert_eq!(lower, mixed);
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_plain_tables_are_not_reported_as_usage() {
        let index = indexed_snapshot();
        let usage = find_usage(&index, "orders", "public");
        assert!(usage.iter().all(|u| u.name != "public.shipments"));
    }

    #[test]
    fn test_routine_without_kind_reports_regular() {
        let mut schema = SchemaMetadata::default();
        schema.routines.insert(
            "order_total".to_string(),
            vec![RoutineMetadata {
                routine_type: RoutineType::Procedure,
                identifiers: vec!["orders".to_string()],
                ..Default::default()
            }],
        );
        let mut database = DatabaseMetadata {
            connected: true,
            ..Default::default()
        };
        database.schemas.insert("public".to_string(), schema);
        let mut databases = DatabaseMap::new();
        databases.insert("db1".to_string(), database);

        let usage = find_usage(&IdentifierIndex::build(&databases), "orders", "public");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].location, "procedure/regular");
    }

    #[test]
    fn test_matches_identifier_whole_word() {
        assert!(matches_identifier("select * from orders o", "orders"));
        assert!(matches_identifier("public.orders", "orders"));
        assert!(matches_identifier("\"Orders\"", "orders"));
        assert!(matches_identifier("orders", "Orders"));
        assert!(!matches_identifier("orders_archive", "orders"));
        assert!(!matches_identifier("reorders", "orders"));
        assert!(!matches_identifier("anything", ""));
    }
}
