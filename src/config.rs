//! Analyzer configuration module
//!
//! Tunables for the safety analyzer, with sensible defaults. The host
//! application owns persistence of settings; this module only defines
//! the values the analyzer consumes.

/// Options consumed by the risk assessor and the analyzer facade.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Maximum number of per-reference detail lines attached to a single
    /// risk explanation before the remainder collapses into a "+N more"
    /// line.
    pub usage_detail_limit: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            usage_detail_limit: 10,
        }
    }
}
