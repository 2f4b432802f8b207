//! Error handling primitives shared across the core.
//!
//! Only genuine failures live here. Expected outcomes such as an incomplete
//! sample, insufficient data or a skipped feature are typed values on the
//! corresponding results instead.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Stable error codes that cross the FFI boundary.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DriftCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// Reference statistics missing or malformed.
    Configuration = 1,
    /// History could not be written to durable storage.
    Persistence = 2,
    /// The sample buffer could not grow.
    Storage = 3,
    /// An evaluation pass failed unexpectedly.
    Evaluation = 4,
    /// Input failed validation.
    InvalidInput = 5,
    /// Monitoring was never initialised or is disabled.
    NotConfigured = 6,
}

/// Canonical error type for the core.
#[derive(Debug, Error)]
pub enum DriftError {
    /// Reference file unreadable or not parseable into per-feature stats.
    ///
    /// Fatal for the drift feature only; the host process keeps serving.
    #[error("reference stats unavailable at {path}: {reason}")]
    Configuration {
        /// Location that was read
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// A reference distribution breaks its structural invariants.
    #[error("invalid reference: {0}")]
    Reference(String),

    /// History write failed. The in-memory history stays authoritative.
    #[error("drift history not persisted to {path}: {reason}")]
    Persistence {
        /// Target location of the history file
        path: PathBuf,
        /// Underlying IO or serialisation failure
        reason: String,
    },

    /// The sample buffer could not reserve room for another sample.
    #[error("sample buffer exhausted: {0}")]
    Storage(String),

    /// Unexpected failure inside an evaluation pass.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Caller supplied something unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The monitor has not been (or could not be) configured.
    #[error("drift monitoring is not configured")]
    NotConfigured,
}

/// Result alias used throughout the crate.
pub type DriftResult<T> = Result<T, DriftError>;

impl DriftError {
    /// Configuration helper.
    pub fn configuration(path: &Path, reason: impl Into<String>) -> Self {
        Self::Configuration {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Persistence helper.
    pub fn persistence(path: &Path, reason: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Reference validation helper.
    pub fn reference(reason: impl Into<String>) -> Self {
        Self::Reference(reason.into())
    }

    /// Validation helper.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Machine parsable code for this error.
    pub fn code(&self) -> DriftCode {
        match self {
            Self::Configuration { .. } | Self::Reference(_) => DriftCode::Configuration,
            Self::Persistence { .. } => DriftCode::Persistence,
            Self::Storage(_) => DriftCode::Storage,
            Self::Evaluation(_) => DriftCode::Evaluation,
            Self::InvalidInput(_) => DriftCode::InvalidInput,
            Self::NotConfigured => DriftCode::NotConfigured,
        }
    }

    /// Whether the failure should stop the drift feature from starting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Reference(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(DriftCode::Ok as u32, 0);
        assert_eq!(DriftCode::Configuration as u32, 1);
        assert_eq!(DriftCode::Persistence as u32, 2);
        assert_eq!(DriftCode::Storage as u32, 3);
        assert_eq!(DriftCode::Evaluation as u32, 4);
        assert_eq!(DriftCode::InvalidInput as u32, 5);
        assert_eq!(DriftCode::NotConfigured as u32, 6);
    }

    #[test]
    fn only_configuration_errors_are_fatal() {
        let cfg = DriftError::configuration(Path::new("ref.json"), "missing");
        assert!(cfg.is_fatal());
        assert_eq!(cfg.code(), DriftCode::Configuration);

        let io = DriftError::persistence(Path::new("hist.json"), "read-only");
        assert!(!io.is_fatal());
        assert_eq!(io.code(), DriftCode::Persistence);
    }

    #[test]
    fn reference_errors_share_the_configuration_code() {
        let err = DriftError::reference("histogram is empty");
        assert_eq!(err.code(), DriftCode::Configuration);
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "invalid reference: histogram is empty");
    }

    #[test]
    fn messages_name_the_location() {
        let err = DriftError::configuration(Path::new("/tmp/ref.json"), "bad json");
        assert_eq!(
            err.to_string(),
            "reference stats unavailable at /tmp/ref.json: bad json"
        );
    }
}
