//! Schema Object Safety Analyzer
//!
//! The heart of SchemaDesk: given a metadata snapshot and a target
//! schema object, decide how dangerous it would be to delete, relocate,
//! or re-own that object, and explain why. This module provides:
//! - Identifier index (reverse map from reference text to declarers)
//! - Usage resolution (who references this object?)
//! - Risk assessment rules (one per object kind and operation)
//! - The analyzer facade tying it all together

pub mod analyzer;
pub mod index;
pub mod risk;
pub mod types;
pub mod usage;

pub use analyzer::{AnalyzerState, SafetyAnalyzer};
pub use index::{DeclarationOrigin, IdentifierIndex, IndexEntry};
pub use risk::{risk_message, RiskAssessor};
pub use types::{
    AnalysisResult, ObjectSafetyAssessment, ObjectType, Operation, OperationRisk, RiskLevel,
    UsageKind, UsageReference,
};
pub use usage::{find_usage, matches_identifier};
