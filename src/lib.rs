//! SchemaDesk Safety - Schema Object Safety Analyzer
//!
//! The analysis core of the SchemaDesk database client. Given a
//! point-in-time metadata snapshot and a target schema object, the
//! analyzer determines how dangerous it would be to delete, relocate,
//! or re-own that object, and explains why:
//! - A cross-reference index over the connected database's schema tree
//! - Deterministic, escalate-only risk rules per object kind and
//!   operation
//! - Graceful degradation when metadata is partial, stale, or missing
//!
//! The crate executes nothing and parses no SQL: it consumes reference
//! lists already extracted by the metadata provider, and its only
//! output is an in-process [`AnalysisResult`].
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use schemadesk_safety::{MetadataProvider, SafetyAnalyzer};
//! # async fn example<P: MetadataProvider + 'static>(provider: Arc<P>) {
//! let analyzer = SafetyAnalyzer::new(provider);
//! let result = analyzer.analyze_object_safety("public", "orders").await;
//! if result.found {
//!     println!("{:#?}", result.assessment);
//! }
//! # }
//! ```

pub mod config;
pub mod error;
pub mod metadata;
pub mod safety;

pub use config::AnalyzerOptions;
pub use error::MetadataError;
pub use metadata::{
    DatabaseMap, DatabaseMetadata, MetadataProvider, RelationMetadata, RoutineMetadata,
    SchemaMetadata, SequenceMetadata, TypeMetadata,
};
pub use safety::{
    AnalysisResult, AnalyzerState, IdentifierIndex, ObjectSafetyAssessment, ObjectType,
    Operation, OperationRisk, RiskAssessor, RiskLevel, SafetyAnalyzer, UsageKind, UsageReference,
};
