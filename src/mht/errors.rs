//! Error types for the tracker core.
//!
//! Configuration errors are fatal to the tracker instance and surface to the
//! caller at construction. Per-report errors are logged and absorbed: the
//! tracker never halts a stream because one observation was malformed.

use std::fmt;

/// Errors raised while validating a tracker configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A covariance matrix is not positive semi-definite, or lacks the
    /// required rank.
    InvalidCovariance {
        /// Name of the offending parameter
        name: &'static str,
    },

    /// A probability parameter is outside its valid interval.
    OutOfRange {
        /// Name of the offending parameter
        name: &'static str,
        /// The rejected value
        value: f64,
    },

    /// A scalar or integer bound is non-positive.
    InvalidBound {
        /// Name of the offending parameter
        name: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCovariance { name } => {
                write!(f, "Covariance {} is not a valid PSD matrix", name)
            }
            ConfigError::OutOfRange { name, value } => {
                write!(f, "Parameter {} = {} is out of range", name, value)
            }
            ConfigError::InvalidBound { name } => {
                write!(f, "Parameter {} must be positive", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Per-report and per-candidate errors absorbed during a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// The innovation covariance became singular during gating; the
    /// candidate branch is discarded.
    NumericalDegeneracy {
        /// Description of where the degeneracy was detected
        context: String,
    },

    /// A corner observation arrived without any source segment; the report
    /// is diverted to the false-alarm log.
    EmptyReferenceSource,
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::NumericalDegeneracy { context } => {
                write!(f, "Numerical degeneracy: {}", context)
            }
            TrackerError::EmptyReferenceSource => {
                write!(f, "Corner observation carries no source segments")
            }
        }
    }
}

impl std::error::Error for TrackerError {}
