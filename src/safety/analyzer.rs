//! Analyzer facade
//!
//! Orchestrates snapshot retrieval, object lookup, usage resolution,
//! and risk assessment into a single result; owns the identifier
//! index's lifecycle. The public surface never returns an error value:
//! every failure mode is encoded in `AnalysisResult`.

use crate::config::AnalyzerOptions;
use crate::metadata::{
    MetadataProvider, RelationMetadata, RoutineMetadata, SchemaMetadata, SequenceMetadata,
    TypeMetadata,
};
use crate::safety::index::IdentifierIndex;
use crate::safety::risk::RiskAssessor;
use crate::safety::types::{AnalysisResult, ObjectSafetyAssessment, ObjectType, UsageReference};
use crate::safety::usage::find_usage;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Index lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerState {
    Uninitialized,
    Indexing,
    Ready,
}

/// A target resolved to its metadata, in lookup priority order:
/// relation, routine, sequence, type, then the schema itself.
enum ResolvedObject<'a> {
    Relation(&'a RelationMetadata),
    Routine(&'a RoutineMetadata),
    Sequence(&'a SequenceMetadata),
    Type(&'a TypeMetadata),
    SchemaSelf(&'a SchemaMetadata),
}

/// The safety analyzer. Holds the metadata provider, the rule engine,
/// and the current identifier index (an immutable snapshot swapped by
/// reference on rebuild, so readers never see a partial index).
pub struct SafetyAnalyzer<P: MetadataProvider> {
    provider: Arc<P>,
    assessor: RiskAssessor,
    index: RwLock<Arc<IdentifierIndex>>,
    state: RwLock<AnalyzerState>,
}

impl<P: MetadataProvider + 'static> SafetyAnalyzer<P> {
    /// Create the analyzer and kick off the initial index build without
    /// awaiting it. Analysis calls made before the build completes see
    /// an empty index and simply detect no usage. Must be called from
    /// within a tokio runtime.
    pub fn new(provider: Arc<P>) -> Arc<Self> {
        Self::with_options(provider, AnalyzerOptions::default())
    }

    pub fn with_options(provider: Arc<P>, options: AnalyzerOptions) -> Arc<Self> {
        let analyzer = Arc::new(Self::from_parts(provider, options));
        let task = Arc::clone(&analyzer);
        tokio::spawn(async move { task.rebuild_index().await });
        analyzer
    }

    fn from_parts(provider: Arc<P>, options: AnalyzerOptions) -> Self {
        Self {
            provider,
            assessor: RiskAssessor::new(options),
            index: RwLock::new(Arc::new(IdentifierIndex::empty())),
            state: RwLock::new(AnalyzerState::Uninitialized),
        }
    }

    /// Rebuild the identifier index from a fresh snapshot and swap it
    /// in. Callers trigger this after schema-altering actions; a fetch
    /// failure leaves the index empty and only reduces usage-detection
    /// coverage, it never surfaces as an analysis error.
    pub async fn rebuild_index(&self) {
        *self.state.write().await = AnalyzerState::Indexing;

        let next = match self.provider.fetch().await {
            Ok(databases) => IdentifierIndex::build(&databases),
            Err(e) => {
                warn!(error = %e, "metadata fetch failed during index build; usage detection disabled");
                IdentifierIndex::empty()
            }
        };
        info!(keys = next.key_count(), "identifier index ready");

        *self.index.write().await = Arc::new(next);
        *self.state.write().await = AnalyzerState::Ready;
    }

    pub async fn state(&self) -> AnalyzerState {
        *self.state.read().await
    }

    /// The index snapshot analysis would use right now. Cheap clone of
    /// the inner `Arc`.
    pub async fn current_index(&self) -> Arc<IdentifierIndex> {
        Arc::clone(&*self.index.read().await)
    }

    /// Analyze how dangerous it would be to delete, move, or re-own the
    /// named object. Never fails: `found = false` plus a descriptive
    /// `error` covers missing metadata, unknown schemas, and unknown
    /// objects alike.
    pub async fn analyze_object_safety(
        &self,
        schema_name: &str,
        object_name: &str,
    ) -> AnalysisResult {
        debug!(schema = schema_name, object = object_name, "analyzing object safety");

        let databases = match self.provider.fetch().await {
            Ok(databases) if !databases.is_empty() => databases,
            Ok(_) => return AnalysisResult::not_found("metadata unavailable"),
            Err(e) => {
                warn!(error = %e, "metadata fetch failed");
                return AnalysisResult::not_found("metadata unavailable");
            }
        };

        let Some(database) = databases.values().find(|db| db.connected) else {
            return AnalysisResult::not_found("database not found");
        };
        let Some(schema) = database.schemas.get(schema_name) else {
            return AnalysisResult::not_found("schema not found");
        };
        let Some((object_type, target)) = resolve(schema, schema_name, object_name) else {
            return AnalysisResult::not_found("object not found in schema");
        };

        // schema-self lookups may come in with an empty object name
        let resolved_name = if object_name.is_empty() {
            schema_name
        } else {
            object_name
        };

        let index = self.current_index().await;
        let usage = find_usage(&index, resolved_name, schema_name);
        let assessment = self.assess(&target, resolved_name, &usage);

        AnalysisResult {
            found: true,
            object_type: Some(object_type),
            object_name: Some(resolved_name.to_string()),
            schema_name: Some(schema_name.to_string()),
            assessment: Some(assessment),
            used_in_identifiers: Some(usage),
            error: None,
            analyzed_at: Utc::now(),
        }
    }

    fn assess(
        &self,
        target: &ResolvedObject<'_>,
        name: &str,
        usage: &[UsageReference],
    ) -> ObjectSafetyAssessment {
        let usage = Some(usage);
        match target {
            ResolvedObject::Relation(meta) => self.assessor.assess_relation(name, meta, usage),
            ResolvedObject::Routine(meta) => self.assessor.assess_routine(name, meta, usage),
            ResolvedObject::Sequence(meta) => self.assessor.assess_sequence(name, meta, usage),
            ResolvedObject::Type(meta) => self.assessor.assess_type(name, meta, usage),
            ResolvedObject::SchemaSelf(meta) => self.assessor.assess_schema(name, meta, usage),
        }
    }
}

/// Fixed-priority resolution. First match wins; the schema itself only
/// matches when the object name is empty or repeats the schema name.
fn resolve<'a>(
    schema: &'a SchemaMetadata,
    schema_name: &str,
    object_name: &str,
) -> Option<(ObjectType, ResolvedObject<'a>)> {
    if let Some(relation) = schema.relations.get(object_name) {
        return Some((ObjectType::Relation, ResolvedObject::Relation(relation)));
    }
    if let Some(first) = schema.routines.get(object_name).and_then(|o| o.first()) {
        // overloads share one safety profile; assess the first only
        return Some((ObjectType::Routine, ResolvedObject::Routine(first)));
    }
    if let Some(sequence) = schema.sequences.get(object_name) {
        return Some((ObjectType::Sequence, ResolvedObject::Sequence(sequence)));
    }
    if let Some(ty) = schema.types.get(object_name) {
        return Some((ObjectType::Type, ResolvedObject::Type(ty)));
    }
    if object_name.is_empty() || object_name == schema_name {
        return Some((ObjectType::Schema, ResolvedObject::SchemaSelf(schema)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;
    use crate::metadata::{
        DatabaseMap, DatabaseMetadata, RelationType, RoutineMetadata, SequenceMetadata,
        TypeMetadata,
    };
    use crate::safety::types::RiskLevel;
    use pretty_assertions::assert_eq;
    use std::future::Future;

    struct FixtureProvider {
        databases: DatabaseMap,
        fail: bool,
    }

    impl FixtureProvider {
        fn ok(databases: DatabaseMap) -> Arc<Self> {
            Arc::new(Self {
                databases,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                databases: DatabaseMap::new(),
                fail: true,
            })
        }
    }

    impl MetadataProvider for FixtureProvider {
        fn fetch(&self) -> impl Future<Output = Result<DatabaseMap, MetadataError>> + Send {
            let result = if self.fail {
                Err(MetadataError::fetch("connection reset"))
            } else {
                Ok(self.databases.clone())
            };
            async move { result }
        }
    }

    fn fixture_databases() -> DatabaseMap {
        let mut schema = SchemaMetadata::default();
        schema.relations.insert(
            "orders".to_string(),
            RelationMetadata {
                identifiers: vec!["users".to_string()],
                ..Default::default()
            },
        );
        schema.relations.insert(
            "order_totals".to_string(),
            RelationMetadata {
                relation_type: RelationType::View,
                identifiers: vec!["orders".to_string()],
                ..Default::default()
            },
        );
        schema
            .routines
            .insert("order_total".to_string(), vec![RoutineMetadata::default()]);
        schema
            .sequences
            .insert("order_seq".to_string(), SequenceMetadata::default());
        schema.types.insert(
            "order_status".to_string(),
            TypeMetadata {
                kind: Some("enum".to_string()),
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

    /// Analyzer without the construction-time background build, so the
    /// tests control exactly when indexing happens.
    fn unindexed(provider: Arc<FixtureProvider>) -> SafetyAnalyzer<FixtureProvider> {
        SafetyAnalyzer::from_parts(provider, AnalyzerOptions::default())
    }

    #[tokio::test]
    async fn test_unknown_schema_reports_not_found() {
        let analyzer = unindexed(FixtureProvider::ok(fixture_databases()));
        let result = analyzer.analyze_object_safety("missing", "orders").await;

        assert!(!result.found);
        assert_eq!(result.error.as_deref(), Some("schema not found"));
        assert!(result.assessment.is_none());
    }

    #[tokio::test]
    async fn test_unknown_object_reports_not_found() {
        let analyzer = unindexed(FixtureProvider::ok(fixture_databases()));
        let result = analyzer.analyze_object_safety("public", "missing").await;

        assert!(!result.found);
        assert_eq!(result.error.as_deref(), Some("object not found in schema"));
    }

    #[tokio::test]
    async fn test_no_connected_database_reports_not_found() {
        let mut databases = fixture_databases();
        databases.get_mut("db1").expect("fixture database").connected = false;
        let analyzer = unindexed(FixtureProvider::ok(databases));

        let result = analyzer.analyze_object_safety("public", "orders").await;
        assert_eq!(result.error.as_deref(), Some("database not found"));
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_metadata_unavailable() {
        let analyzer = unindexed(FixtureProvider::failing());
        let result = analyzer.analyze_object_safety("public", "orders").await;

        assert!(!result.found);
        assert_eq!(result.error.as_deref(), Some("metadata unavailable"));
    }

    #[tokio::test]
    async fn test_empty_snapshot_reports_metadata_unavailable() {
        let analyzer = unindexed(FixtureProvider::ok(DatabaseMap::new()));
        let result = analyzer.analyze_object_safety("public", "orders").await;

        assert_eq!(result.error.as_deref(), Some("metadata unavailable"));
    }

    #[tokio::test]
    async fn test_resolution_order_covers_every_kind() {
        let analyzer = unindexed(FixtureProvider::ok(fixture_databases()));

        for (name, expected) in [
            ("orders", ObjectType::Relation),
            ("order_total", ObjectType::Routine),
            ("order_seq", ObjectType::Sequence),
            ("order_status", ObjectType::Type),
        ] {
            let result = analyzer.analyze_object_safety("public", name).await;
            assert!(result.found, "{name} should resolve");
            assert_eq!(result.object_type, Some(expected), "{name}");
        }
    }

    #[tokio::test]
    async fn test_schema_resolves_by_empty_name_and_own_name() {
        let analyzer = unindexed(FixtureProvider::ok(fixture_databases()));

        let by_empty = analyzer.analyze_object_safety("public", "").await;
        let by_name = analyzer.analyze_object_safety("public", "public").await;

        assert_eq!(by_empty.object_type, Some(ObjectType::Schema));
        assert_eq!(by_name.object_type, Some(ObjectType::Schema));
        assert_eq!(by_empty.object_name.as_deref(), Some("public"));
        // schemas cannot be relocated
        let assessment = by_name.assessment.expect("assessment present");
        assert_eq!(assessment.can_move.level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_usage_round_trip_through_index() {
        let analyzer = unindexed(FixtureProvider::ok(fixture_databases()));
        analyzer.rebuild_index().await;

        // order_totals declares a reference to `orders`
        let result = analyzer.analyze_object_safety("public", "orders").await;
        let usage = result.used_in_identifiers.expect("usage present");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].name, "public.order_totals");

        let assessment = result.assessment.expect("assessment present");
        assert_eq!(assessment.can_delete.level, RiskLevel::Critical);
    }

    #[tokio::test]
    async fn test_analysis_before_indexing_detects_no_usage() {
        let analyzer = unindexed(FixtureProvider::ok(fixture_databases()));

        let result = analyzer.analyze_object_safety("public", "orders").await;
        assert!(result.found);
        assert_eq!(result.used_in_identifiers, Some(Vec::new()));
        assert_eq!(analyzer.state().await, AnalyzerState::Uninitialized);
    }

    #[tokio::test]
    async fn test_rebuild_soft_fails_and_still_reaches_ready() {
        let analyzer = unindexed(FixtureProvider::failing());
        analyzer.rebuild_index().await;

        assert_eq!(analyzer.state().await, AnalyzerState::Ready);
        assert!(analyzer.current_index().await.is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_swaps_index_wholesale() {
        let analyzer = unindexed(FixtureProvider::ok(fixture_databases()));
        let before = analyzer.current_index().await;
        analyzer.rebuild_index().await;
        let after = analyzer.current_index().await;

        assert!(before.is_empty());
        assert!(!after.is_empty());
        // the old snapshot is untouched by the swap
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_constructor_spawns_initial_build() {
        let analyzer = SafetyAnalyzer::new(FixtureProvider::ok(fixture_databases()));

        // the build is fire-and-forget; wait for it to land
        for _ in 0..50 {
            if analyzer.state().await == AnalyzerState::Ready {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(analyzer.state().await, AnalyzerState::Ready);
        assert!(!analyzer.current_index().await.is_empty());
    }
}
