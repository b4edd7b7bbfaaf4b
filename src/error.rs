//! Error types for alignment operations.
//!
//! Every failure an aligner can report is a caller error: mismatched inputs,
//! a bad configuration value or a missing reference. Numeric degeneracies
//! (NaN scores, a simplex that refuses to shrink) are never errors.

use thiserror::Error;

/// Main error type for alignment operations.
#[derive(Error, Debug)]
pub enum AlignError {
    /// Reference and input extents differ, or the aligner does not support
    /// the dimensionality of the input.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Non-positive step sizes, out-of-range mode selectors, max shift below
    /// the minimum feasible value, or a value of the wrong type.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An aligner that needs a reference image was called without one.
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Unknown aligner or comparator name.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Image decode or encode failure.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transform or report (de)serialisation failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for alignment operations.
pub type Result<T> = std::result::Result<T, AlignError>;

impl AlignError {
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::MissingInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AlignError::dimension_mismatch("64x64 vs 32x32");
        assert_eq!(err.to_string(), "Dimension mismatch: 64x64 vs 32x32");

        let err = AlignError::not_found("aligner 'phase'");
        assert!(matches!(err, AlignError::NotFound(_)));
    }
}
