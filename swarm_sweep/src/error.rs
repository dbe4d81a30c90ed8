//! Error types shared by the partition, session and lookup layers.

use thiserror::Error;

/// Everything that can go wrong before a scan starts, plus lookup failures.
///
/// A running scan has no error path: stepping is clamped and completion is a
/// conjunction, so nothing here is ever raised from inside the frame loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Degenerate, inverted or non-finite bounds, or a partition into zero strips.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// The requested number of agents lies outside the configured range.
    #[error("agent count {requested} is outside the allowed range {min}..={max}")]
    InvalidAgentCount { requested: u32, min: u32, max: u32 },

    /// The place-lookup service could not be reached or returned garbage.
    #[error("place lookup failed: {0}")]
    LookupFailed(String),
}

impl ScanError {
    pub(crate) fn invalid_region(reason: impl Into<String>) -> Self {
        ScanError::InvalidRegion(reason.into())
    }
}
