//! Risk assessment rules
//!
//! One pure function per (object kind x operation). Every function
//! starts at `Low` with an empty explanation trail and only ever
//! escalates: the single primitive is `level = max(level, proposed)`.
//! Permission denials are risk information, never errors.

use crate::config::AnalyzerOptions;
use crate::metadata::{
    RelationMetadata, RelationType, RoutineMetadata, SchemaMetadata, SequenceMetadata,
    TypeMetadata,
};
use crate::safety::types::{
    ObjectSafetyAssessment, Operation, OperationRisk, RiskLevel, UsageReference,
};
use once_cell::sync::Lazy;

/// Fixed verdict for relocating a schema; the operation does not exist.
static MOVE_SCHEMA_UNAVAILABLE: Lazy<OperationRisk> = Lazy::new(|| OperationRisk {
    level: RiskLevel::High,
    message: risk_message(Operation::Move, RiskLevel::High).to_string(),
    details: vec!["schemas cannot be relocated; the move operation is not available".to_string()],
});

/// Escalate-only accumulator every rule function writes through.
#[derive(Debug)]
struct RiskTrail {
    level: RiskLevel,
    details: Vec<String>,
}

impl RiskTrail {
    fn new() -> Self {
        Self {
            level: RiskLevel::Low,
            details: Vec::new(),
        }
    }

    fn level(&self) -> RiskLevel {
        self.level
    }

    /// Record a detail line without touching the level.
    fn note(&mut self, line: impl Into<String>) {
        self.details.push(line.into());
    }

    /// Raise the level to at least `proposed`.
    fn raise(&mut self, proposed: RiskLevel) {
        self.level = self.level.combine(proposed);
    }

    /// One-step raise: `Low` proposes `Medium`, anything else `High`.
    fn raise_step(&mut self) {
        let proposed = self.level.stepped();
        self.raise(proposed);
    }

    /// Raise and explain in one move.
    fn escalate(&mut self, proposed: RiskLevel, line: impl Into<String>) {
        self.raise(proposed);
        self.note(line);
    }

    /// One-step raise with an explanation line.
    fn escalate_step(&mut self, line: impl Into<String>) {
        self.raise_step();
        self.note(line);
    }

    fn finish(self, operation: Operation) -> OperationRisk {
        OperationRisk {
            message: risk_message(operation, self.level).to_string(),
            level: self.level,
            details: self.details,
        }
    }
}

/// `Some(false)` is an explicit denial reported by the provider; an
/// absent permission block never escalates.
fn denied(flag: Option<bool>) -> bool {
    flag == Some(false)
}

fn usage_of(usage: Option<&[UsageReference]>) -> &[UsageReference] {
    usage.unwrap_or(&[])
}

/// The rule engine. Holds the options that bound explanation size;
/// every assessment function is otherwise pure and deterministic.
pub struct RiskAssessor {
    options: AnalyzerOptions,
}

impl RiskAssessor {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self { options }
    }

    // ------------------------------------------------------------------
    // Per-kind assessments: one verdict per supported operation
    // ------------------------------------------------------------------

    pub fn assess_relation(
        &self,
        name: &str,
        relation: &RelationMetadata,
        usage: Option<&[UsageReference]>,
    ) -> ObjectSafetyAssessment {
        ObjectSafetyAssessment {
            can_delete: self.delete_relation(name, relation, usage),
            can_move: self.move_relation(name, relation, usage),
            can_change_owner: self.change_owner_relation(name, relation, usage),
        }
    }

    pub fn assess_routine(
        &self,
        name: &str,
        routine: &RoutineMetadata,
        usage: Option<&[UsageReference]>,
    ) -> ObjectSafetyAssessment {
        ObjectSafetyAssessment {
            can_delete: self.delete_routine(name, routine, usage),
            can_move: self.move_routine(name, routine, usage),
            can_change_owner: self.change_owner_routine(name, routine, usage),
        }
    }

    pub fn assess_sequence(
        &self,
        name: &str,
        sequence: &SequenceMetadata,
        usage: Option<&[UsageReference]>,
    ) -> ObjectSafetyAssessment {
        ObjectSafetyAssessment {
            can_delete: self.delete_sequence(name, sequence, usage),
            can_move: self.move_sequence(name, sequence, usage),
            can_change_owner: self.change_owner_sequence(name, sequence, usage),
        }
    }

    pub fn assess_type(
        &self,
        name: &str,
        ty: &TypeMetadata,
        usage: Option<&[UsageReference]>,
    ) -> ObjectSafetyAssessment {
        ObjectSafetyAssessment {
            can_delete: self.delete_type(name, ty, usage),
            can_move: self.move_type(name, ty, usage),
            can_change_owner: self.change_owner_type(name, ty, usage),
        }
    }

    pub fn assess_schema(
        &self,
        name: &str,
        schema: &SchemaMetadata,
        usage: Option<&[UsageReference]>,
    ) -> ObjectSafetyAssessment {
        ObjectSafetyAssessment {
            can_delete: self.delete_schema(name, schema, usage),
            can_move: self.move_schema(name),
            can_change_owner: self.change_owner_schema(name, schema, usage),
        }
    }

    // ------------------------------------------------------------------
    // Delete rules
    // ------------------------------------------------------------------

    pub fn delete_relation(
        &self,
        name: &str,
        relation: &RelationMetadata,
        usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let usage = usage_of(usage);
        let mut trail = RiskTrail::new();

        if relation.relation_type == RelationType::View {
            trail.note(format!(
                "'{name}' is a view; dropping it removes only the definition, not data"
            ));
        }
        if relation.kind.as_deref() == Some("temporary") {
            trail.note(format!(
                "'{name}' is a temporary table scoped to the current session"
            ));
        }
        if relation.kind.as_deref() == Some("partitioned") {
            trail.escalate(
                RiskLevel::High,
                format!("'{name}' is a partitioned table; dropping it drops every partition"),
            );
        }
        if !usage.is_empty() {
            trail.escalate(
                RiskLevel::Critical,
                format!("referenced by {} other object(s)", usage.len()),
            );
            self.push_usage_lines(&mut trail, usage);
        }
        let rows = relation.stats.and_then(|s| s.rows).unwrap_or(0);
        if rows > 100_000 {
            trail.escalate_step(format!("table holds roughly {rows} rows"));
        }
        if !relation.foreign_keys.is_empty() {
            trail.escalate(
                RiskLevel::Critical,
                format!(
                    "{} foreign key constraint(s) will be dropped",
                    relation.foreign_keys.len()
                ),
            );
            for fk in &relation.foreign_keys {
                trail.note(format!(
                    "FK: {} references {}.{}",
                    fk.name, fk.referenced_schema, fk.referenced_table
                ));
            }
        }
        if !relation.constraints.is_empty() {
            trail.note(format!(
                "{} constraint(s) will be dropped with the table",
                relation.constraints.len()
            ));
        }
        let secondary = relation.indexes.iter().filter(|idx| !idx.primary).count();
        if secondary > 0 {
            trail.note(format!(
                "{secondary} secondary index(es) will be dropped with the table"
            ));
        }
        if denied(relation.permissions.as_ref().and_then(|p| p.delete)) {
            trail.escalate(
                RiskLevel::Critical,
                format!("current role lacks DELETE privilege on '{name}'"),
            );
        }

        trail.finish(Operation::Delete)
    }

    pub fn delete_routine(
        &self,
        name: &str,
        routine: &RoutineMetadata,
        usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let usage = usage_of(usage);
        let mut trail = RiskTrail::new();

        trail.note(format!("'{name}' is a {}", routine.routine_type.as_str()));
        if !usage.is_empty() {
            trail.escalate(
                RiskLevel::Critical,
                format!("referenced by {} other object(s)", usage.len()),
            );
        }
        if routine.kind.as_deref() == Some("trigger") {
            trail.escalate(
                RiskLevel::High,
                format!("'{name}' is a trigger function; dependent triggers will fail"),
            );
        }
        if routine.kind.as_deref() == Some("aggregate") {
            trail.escalate_step(format!(
                "'{name}' is an aggregate; queries grouping with it will fail"
            ));
        }
        if denied(routine.permissions.as_ref().and_then(|p| p.execute)) {
            trail.escalate(
                RiskLevel::Critical,
                format!("current role lacks EXECUTE privilege on '{name}'"),
            );
        }

        trail.finish(Operation::Delete)
    }

    pub fn delete_sequence(
        &self,
        name: &str,
        sequence: &SequenceMetadata,
        usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let usage = usage_of(usage);
        let mut trail = RiskTrail::new();

        trail.note(format!("sequence '{name}'"));
        if !usage.is_empty() {
            trail.escalate(
                RiskLevel::High,
                format!("referenced by {} other object(s)", usage.len()),
            );
        }
        if denied(sequence.permissions.as_ref().and_then(|p| p.usage)) {
            trail.escalate(
                RiskLevel::Critical,
                format!("current role lacks USAGE privilege on '{name}'"),
            );
        }
        // fires alongside the permission escalation, not instead of it
        if usage.is_empty() {
            trail.escalate(
                RiskLevel::Medium,
                "no tracked references; check column DEFAULT clauses that may still use the sequence",
            );
        }

        trail.finish(Operation::Delete)
    }

    pub fn delete_type(
        &self,
        name: &str,
        ty: &TypeMetadata,
        usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let usage = usage_of(usage);
        let mut trail = RiskTrail::new();

        trail.note(format!(
            "type '{name}' ({})",
            ty.kind.as_deref().unwrap_or("base")
        ));
        if !usage.is_empty() {
            trail.escalate(
                RiskLevel::High,
                format!("referenced by {} other object(s)", usage.len()),
            );
        }
        match ty.kind.as_deref() {
            Some(kind @ ("composite" | "enum")) => {
                trail.escalate_step(format!(
                    "'{name}' is a {kind} type; dependent columns must be dropped first"
                ));
            }
            Some("domain") => {
                trail.escalate(
                    RiskLevel::High,
                    format!("'{name}' is a domain; dependent columns must be dropped first"),
                );
            }
            _ => {}
        }
        if denied(ty.permissions.as_ref().and_then(|p| p.usage)) {
            trail.escalate(
                RiskLevel::Critical,
                format!("current role lacks USAGE privilege on '{name}'"),
            );
        }

        trail.finish(Operation::Delete)
    }

    pub fn delete_schema(
        &self,
        name: &str,
        schema: &SchemaMetadata,
        _usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let mut trail = RiskTrail::new();

        if schema.catalog {
            trail.escalate(
                RiskLevel::Critical,
                format!("'{name}' is a system catalog schema"),
            );
        }
        if schema.is_default {
            trail.escalate(
                RiskLevel::High,
                format!("'{name}' is the session default schema"),
            );
        }
        if !schema.relations.is_empty() {
            // Low jumps to High, Medium to Critical; High and above are
            // already past what this rule can propose
            let proposed = match trail.level() {
                RiskLevel::Low => RiskLevel::High,
                RiskLevel::Medium => RiskLevel::Critical,
                current => current,
            };
            trail.escalate(
                proposed,
                format!("schema contains {} relation(s)", schema.relations.len()),
            );
        }
        if !schema.routines.is_empty() {
            trail.escalate(
                RiskLevel::Critical,
                format!("schema contains {} routine(s)", schema.routines.len()),
            );
        }
        if !schema.types.is_empty() {
            trail.escalate(
                RiskLevel::Critical,
                format!("schema contains {} type(s)", schema.types.len()),
            );
        }
        if denied(schema.permissions.as_ref().and_then(|p| p.usage)) {
            trail.escalate(
                RiskLevel::Critical,
                format!("current role lacks USAGE privilege on '{name}'"),
            );
        }

        trail.finish(Operation::Delete)
    }

    // ------------------------------------------------------------------
    // Move rules
    // ------------------------------------------------------------------

    pub fn move_relation(
        &self,
        name: &str,
        relation: &RelationMetadata,
        usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let computed = usage;
        let usage = usage_of(usage);
        let mut trail = RiskTrail::new();

        if !usage.is_empty() {
            trail.escalate(
                RiskLevel::Critical,
                format!(
                    "referenced by {} other object(s); qualified references break on relocation",
                    usage.len()
                ),
            );
            self.push_usage_lines(&mut trail, usage);
        }
        if relation.relation_type == RelationType::View {
            trail.note(format!("'{name}' is a view; its definition moves with it"));
        }
        if !relation.identifiers.is_empty() {
            trail.raise_step();
            trail.raise(RiskLevel::High);
            for identifier in &relation.identifiers {
                trail.note(format!("declares a reference to '{identifier}'"));
            }
        }
        if !relation.foreign_keys.is_empty() {
            trail.escalate(
                RiskLevel::High,
                format!(
                    "{} foreign key constraint(s) must be revalidated after the move",
                    relation.foreign_keys.len()
                ),
            );
            for fk in &relation.foreign_keys {
                trail.note(format!(
                    "FK: {} references {}.{}",
                    fk.name, fk.referenced_schema, fk.referenced_table
                ));
            }
        }
        if denied(relation.permissions.as_ref().and_then(|p| p.select)) {
            trail.escalate(
                RiskLevel::Critical,
                format!("current role lacks SELECT privilege on '{name}'"),
            );
        }
        if computed.is_none() {
            trail.note(
                "usage information unavailable; verify all referencing views and functions before moving",
            );
        }

        trail.finish(Operation::Move)
    }

    pub fn move_routine(
        &self,
        name: &str,
        routine: &RoutineMetadata,
        usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let usage = usage_of(usage);
        let mut trail = RiskTrail::new();

        if !usage.is_empty() {
            trail.escalate(
                RiskLevel::Critical,
                format!(
                    "referenced by {} other object(s); callers break on relocation",
                    usage.len()
                ),
            );
        }
        if routine.kind.as_deref() == Some("trigger") {
            trail.escalate(
                RiskLevel::High,
                format!("'{name}' is a trigger function; trigger definitions must be updated"),
            );
        }
        if denied(routine.permissions.as_ref().and_then(|p| p.execute)) {
            trail.escalate(
                RiskLevel::Critical,
                format!("current role lacks EXECUTE privilege on '{name}'"),
            );
        }
        trail.note("objects calling the routine by qualified name may need updating");

        trail.finish(Operation::Move)
    }

    pub fn move_sequence(
        &self,
        name: &str,
        sequence: &SequenceMetadata,
        usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let usage = usage_of(usage);
        let mut trail = RiskTrail::new();

        trail.note(format!("sequence '{name}' can be moved between schemas"));
        if !usage.is_empty() {
            trail.escalate(
                RiskLevel::Medium,
                format!("referenced by {} other object(s)", usage.len()),
            );
        }
        if denied(sequence.permissions.as_ref().and_then(|p| p.usage)) {
            trail.escalate(
                RiskLevel::Critical,
                format!("current role lacks USAGE privilege on '{name}'"),
            );
        }
        trail.note("check column DEFAULT clauses that qualify the sequence by schema");

        trail.finish(Operation::Move)
    }

    pub fn move_type(
        &self,
        name: &str,
        ty: &TypeMetadata,
        usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let usage = usage_of(usage);
        let mut trail = RiskTrail::new();

        trail.note(format!("type '{name}' can be moved between schemas"));
        if !usage.is_empty() {
            trail.escalate(
                RiskLevel::High,
                format!("referenced by {} other object(s)", usage.len()),
            );
        }
        match ty.kind.as_deref() {
            Some(kind @ ("composite" | "enum")) => {
                trail.escalate_step(format!(
                    "'{name}' is a {kind} type; dependent columns follow the move"
                ));
            }
            Some("domain") => {
                trail.escalate(
                    RiskLevel::High,
                    format!("'{name}' is a domain; dependent columns follow the move"),
                );
            }
            _ => {}
        }
        if denied(ty.permissions.as_ref().and_then(|p| p.usage)) {
            trail.escalate(
                RiskLevel::Critical,
                format!("current role lacks USAGE privilege on '{name}'"),
            );
        }

        trail.finish(Operation::Move)
    }

    pub fn move_schema(&self, _name: &str) -> OperationRisk {
        MOVE_SCHEMA_UNAVAILABLE.clone()
    }

    // ------------------------------------------------------------------
    // Change-owner rules
    // ------------------------------------------------------------------

    pub fn change_owner_relation(
        &self,
        _name: &str,
        relation: &RelationMetadata,
        _usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let mut trail = RiskTrail::new();

        if let Some(owner) = &relation.owner {
            trail.note(format!("current owner is '{owner}'"));
        }
        if !relation.indexes.is_empty() {
            trail.note(format!(
                "{} index(es) transfer with the table",
                relation.indexes.len()
            ));
        }
        let stats = relation.stats.unwrap_or_default();
        if stats.rows.unwrap_or(0) > 0 || stats.writes.unwrap_or(0) > 0 {
            trail.escalate_step("table shows live rows or write activity");
        }
        trail.note("the new owner must hold sufficient privileges on the parent schema");

        trail.finish(Operation::ChangeOwner)
    }

    pub fn change_owner_routine(
        &self,
        name: &str,
        routine: &RoutineMetadata,
        _usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let mut trail = RiskTrail::new();

        if let Some(owner) = &routine.owner {
            trail.note(format!("current owner is '{owner}'"));
        }
        if routine.kind.as_deref() == Some("trigger") {
            trail.escalate(
                RiskLevel::High,
                format!("'{name}' is a trigger function; trigger ownership must match"),
            );
        }
        if !routine.arguments.is_empty() {
            trail.note(format!(
                "signature carries {} argument(s)",
                routine.arguments.len()
            ));
        }

        trail.finish(Operation::ChangeOwner)
    }

    pub fn change_owner_sequence(
        &self,
        _name: &str,
        sequence: &SequenceMetadata,
        _usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let mut trail = RiskTrail::new();

        if let Some(owner) = &sequence.owner {
            trail.note(format!("current owner is '{owner}'"));
        }
        trail.note("ownership changes on sequences are usually safe");

        trail.finish(Operation::ChangeOwner)
    }

    pub fn change_owner_type(
        &self,
        name: &str,
        ty: &TypeMetadata,
        _usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let mut trail = RiskTrail::new();

        if let Some(owner) = &ty.owner {
            trail.note(format!("current owner is '{owner}'"));
        }
        if let Some(kind @ ("composite" | "domain")) = ty.kind.as_deref() {
            trail.escalate(
                RiskLevel::Medium,
                format!("'{name}' is a {kind} type; ownership propagates to dependent columns"),
            );
        }

        trail.finish(Operation::ChangeOwner)
    }

    pub fn change_owner_schema(
        &self,
        name: &str,
        schema: &SchemaMetadata,
        _usage: Option<&[UsageReference]>,
    ) -> OperationRisk {
        let mut trail = RiskTrail::new();

        if let Some(owner) = &schema.owner {
            trail.note(format!("current owner is '{owner}'"));
        }
        if schema.is_default {
            trail.escalate(
                RiskLevel::Medium,
                format!("'{name}' is the session default schema"),
            );
        }
        if schema.catalog {
            trail.escalate(
                RiskLevel::Critical,
                format!("'{name}' is a system catalog schema"),
            );
        }

        trail.finish(Operation::ChangeOwner)
    }

    // ------------------------------------------------------------------

    /// Attach one line per usage reference, capped at the configured
    /// limit with a trailing "+N more".
    fn push_usage_lines(&self, trail: &mut RiskTrail, usage: &[UsageReference]) {
        let limit = self.options.usage_detail_limit;
        for reference in usage.iter().take(limit) {
            trail.note(format!("used in {}: {}", reference.location, reference.name));
        }
        if usage.len() > limit {
            trail.note(format!("+{} more", usage.len() - limit));
        }
    }
}

impl Default for RiskAssessor {
    fn default() -> Self {
        Self::new(AnalyzerOptions::default())
    }
}

/// Severity-labeled summary for an (operation, level) pair. Pure lookup.
pub fn risk_message(operation: Operation, level: RiskLevel) -> &'static str {
    match (operation, level) {
        (Operation::Delete, RiskLevel::Low) => "Low risk: the object can be deleted safely",
        (Operation::Delete, RiskLevel::Medium) => {
            "Medium risk: review the listed findings before deleting"
        }
        (Operation::Delete, RiskLevel::High) => {
            "High risk: deletion will likely break dependent objects"
        }
        (Operation::Delete, RiskLevel::Critical) => {
            "Critical risk: deletion is unsafe until the listed findings are resolved"
        }
        (Operation::Move, RiskLevel::Low) => "Low risk: the object can be moved safely",
        (Operation::Move, RiskLevel::Medium) => {
            "Medium risk: review the listed findings before moving"
        }
        (Operation::Move, RiskLevel::High) => {
            "High risk: moving will likely break referencing objects"
        }
        (Operation::Move, RiskLevel::Critical) => {
            "Critical risk: moving is unsafe until the listed findings are resolved"
        }
        (Operation::ChangeOwner, RiskLevel::Low) => {
            "Low risk: ownership can be changed safely"
        }
        (Operation::ChangeOwner, RiskLevel::Medium) => {
            "Medium risk: review the listed findings before changing ownership"
        }
        (Operation::ChangeOwner, RiskLevel::High) => {
            "High risk: the ownership change affects dependent objects"
        }
        (Operation::ChangeOwner, RiskLevel::Critical) => {
            "Critical risk: the ownership change is unsafe until the listed findings are resolved"
        }
    }
}
