//! Error handling module
//!
//! Typed errors for the metadata boundary. The public analysis surface
//! never returns these: all failure modes are folded into
//! `AnalysisResult::found`/`AnalysisResult::error`, and index-build
//! failures are logged and swallowed. `MetadataError` exists so the
//! metadata provider can report fetch problems in a structured way.

use thiserror::Error;

/// Errors the metadata provider may report when fetching a snapshot.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("metadata fetch failed: {0}")]
    Fetch(String),

    #[error("metadata provider unavailable: {0}")]
    Unavailable(String),
}

impl MetadataError {
    /// Helper to build a fetch error from any displayable cause.
    pub fn fetch(cause: impl Into<String>) -> Self {
        MetadataError::Fetch(cause.into())
    }
}
