//! Error types
//!
//! Only two conditions abort an analysis: an input the engine refuses to touch
//! (oversized) and an input it cannot read at all (empty). Everything else
//! (unrecognized formats, decoder refusals, exhausted strategies, scan
//! timeouts) demotes to the next extraction path and surfaces as a warning on
//! the returned record.

use thiserror::Error;

/// Fatal analysis failures surfaced to the caller
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("input buffer is {actual} bytes, exceeding the {limit}-byte ceiling")]
    InputTooLarge { actual: usize, limit: usize },

    #[error("input buffer is empty")]
    EmptyInput,
}

/// Trusted-decoder failures; both demote to the fallback chain
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The family matched but this file's internal structure deviates from
    /// the layout the decoder understands.
    #[error("decoder does not support this {family} variant: {reason}")]
    Unsupported { family: String, reason: String },

    /// Truncated or structurally invalid payload, distinguishable from an
    /// unsupported variant.
    #[error("corrupt {family} data: {reason}")]
    Corrupt { family: String, reason: String },
}

impl DecodeError {
    pub fn unsupported(family: impl Into<String>, reason: impl Into<String>) -> Self {
        DecodeError::Unsupported {
            family: family.into(),
            reason: reason.into(),
        }
    }

    pub fn corrupt(family: impl Into<String>, reason: impl Into<String>) -> Self {
        DecodeError::Corrupt {
            family: family.into(),
            reason: reason.into(),
        }
    }
}
