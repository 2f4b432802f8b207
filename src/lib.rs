// lib.rs - drift monitoring core for the prediction service
pub mod api;
pub mod buffer;
pub mod common;
pub mod evaluation;
pub mod history;
pub mod reference;

pub use api::{DriftMonitor, MonitorHandle, Readiness};
pub use common::{DriftCode, DriftError, DriftResult, EvalMode, MonitorCfg};
pub use evaluation::{DriftStatus, DriftSummary, EvaluationResult, Severity};
pub use history::DriftHistory;
pub use reference::{ReferenceDistribution, ReferenceSet};
