//! Shared types for safety analysis
//!
//! Everything the host consumes: risk levels, per-operation verdicts,
//! usage evidence, and the top-level analysis result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered severity assigned to a prospective operation.
///
/// Combining two levels always takes the maximum; assessment never
/// lowers a level once raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Escalate-only combination of two levels.
    pub fn combine(self, other: RiskLevel) -> RiskLevel {
        self.max(other)
    }

    /// The level a one-step escalation proposes: `Low` proposes
    /// `Medium`, anything else proposes `High`.
    pub fn stepped(self) -> RiskLevel {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation a risk verdict applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Delete,
    Move,
    ChangeOwner,
}

/// Risk verdict for one operation on one object: a level, a summary
/// message, and the ordered explanation trail that produced the level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRisk {
    pub level: RiskLevel,
    pub message: String,
    pub details: Vec<String>,
}

/// One verdict per supported operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSafetyAssessment {
    pub can_delete: OperationRisk,
    pub can_move: OperationRisk,
    pub can_change_owner: OperationRisk,
}

/// Kind of object a usage reference points back from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    Relation,
    Routine,
}

/// Evidence that another object's definition textually refers to the
/// target object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReference {
    pub ref_kind: UsageKind,
    /// Qualified name of the referencing object.
    pub name: String,
    /// Where the reference lives, e.g. "view" or "function/trigger".
    pub location: String,
}

/// Kind the target object resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Relation,
    Routine,
    Schema,
    Sequence,
    Type,
}

/// Outcome of one `analyze_object_safety` call.
///
/// `found = false` is a normal, non-exceptional outcome; `error` then
/// says why the target could not be analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<ObjectType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<ObjectSafetyAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_in_identifiers: Option<Vec<UsageReference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// A non-exceptional failure: the target (or its metadata) was not
    /// available for analysis.
    pub fn not_found(error: impl Into<String>) -> Self {
        Self {
            found: false,
            object_type: None,
            object_name: None,
            schema_name: None,
            assessment: None,
            used_in_identifiers: None,
            error: Some(error.into()),
            analyzed_at: Utc::now(),
        }
    }
}
