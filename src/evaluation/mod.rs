//! Evaluation domain: PSI per feature, drift classification and the
//! background task that runs passes off the request path.

pub mod domain;
pub mod psi;
pub mod service;
pub mod workers;

pub use domain::{DriftStatus, DriftSummary, EvaluationResult, FeatureDrift, FeatureStatus, Severity};
pub use psi::{PsiCalculator, SkipReason, PROBABILITY_FLOOR};
pub use service::DriftEvaluator;
pub use workers::EvalWorker;
