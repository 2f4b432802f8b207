//! Readiness wrapper around a [`DriftMonitor`].
//!
//! Request handlers hold a `MonitorHandle` from process start. Until
//! initialisation succeeds, and forever after it fails, every call answers
//! with a defined `not_configured` outcome instead of touching a monitor.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use tracing::error;

use crate::common::config::MonitorCfg;
use crate::common::error::{DriftError, DriftResult};
use crate::common::time;
use crate::evaluation::{DriftStatus, DriftSummary, EvaluationResult};
use crate::history::DriftHistory;
use crate::reference::FeatureSummary;

use super::monitor::DriftMonitor;

enum MonitorState {
    Ready(DriftMonitor),
    Disabled(String),
}

/// Lifecycle of a handle, as reported to health checks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Readiness {
    Pending,
    Ready,
    Disabled(String),
}

#[derive(Default)]
pub struct MonitorHandle {
    state: OnceLock<MonitorState>,
}

impl MonitorHandle {
    /// A handle that answers `not_configured` until initialised.
    pub fn pending() -> Self {
        Self::default()
    }

    /// Wrap an already built monitor.
    pub fn ready(monitor: DriftMonitor) -> Self {
        let handle = Self::default();
        let _ = handle.state.set(MonitorState::Ready(monitor));
        handle
    }

    /// Build the monitor from `cfg`. A bad reference disables drift
    /// monitoring instead of failing the caller.
    ///
    /// Only the first call has an effect.
    pub fn initialize(&self, cfg: &MonitorCfg) -> Readiness {
        self.state.get_or_init(|| match DriftMonitor::from_cfg(cfg) {
            Ok(monitor) => MonitorState::Ready(monitor),
            Err(err) => {
                error!(%err, "drift monitoring disabled");
                MonitorState::Disabled(err.to_string())
            }
        });
        self.readiness()
    }

    /// Mark the handle disabled without attempting a load.
    pub fn disable(&self, reason: impl Into<String>) -> Readiness {
        let _ = self.state.set(MonitorState::Disabled(reason.into()));
        self.readiness()
    }

    pub fn readiness(&self) -> Readiness {
        match self.state.get() {
            None => Readiness::Pending,
            Some(MonitorState::Ready(_)) => Readiness::Ready,
            Some(MonitorState::Disabled(reason)) => Readiness::Disabled(reason.clone()),
        }
    }

    pub fn monitor(&self) -> DriftResult<&DriftMonitor> {
        match self.state.get() {
            Some(MonitorState::Ready(monitor)) => Ok(monitor),
            _ => Err(DriftError::NotConfigured),
        }
    }

    pub fn add_sample(&self, values: BTreeMap<String, f64>) -> bool {
        self.monitor()
            .map(|monitor| monitor.add_sample(values))
            .unwrap_or(false)
    }

    pub fn evaluate(&self) -> EvaluationResult {
        match self.monitor() {
            Ok(monitor) => monitor.evaluate(),
            Err(_) => EvaluationResult::not_configured(time::iso(&time::now())),
        }
    }

    pub fn summary(&self) -> DriftSummary {
        match self.monitor() {
            Ok(monitor) => monitor.summary(),
            Err(_) => DriftSummary {
                overall_status: DriftStatus::NotConfigured,
                overall_severity: None,
                per_feature_status: BTreeMap::new(),
                sample_count: 0,
                timestamp: time::iso(&time::now()),
            },
        }
    }

    pub fn reference_features(&self) -> BTreeMap<String, FeatureSummary> {
        self.monitor()
            .map(DriftMonitor::reference_features)
            .unwrap_or_default()
    }

    pub fn history(&self) -> Option<DriftHistory> {
        self.monitor().ok().map(DriftMonitor::history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample() -> BTreeMap<String, f64> {
        let mut values = BTreeMap::new();
        values.insert("x".to_string(), 0.5);
        values
    }

    #[test]
    fn pending_handle_answers_not_configured() {
        let handle = MonitorHandle::pending();
        assert_eq!(handle.readiness(), Readiness::Pending);
        assert!(!handle.add_sample(sample()));
        assert_eq!(handle.evaluate().status, DriftStatus::NotConfigured);
        assert_eq!(handle.summary().overall_status, DriftStatus::NotConfigured);
        assert!(handle.reference_features().is_empty());
        assert!(handle.history().is_none());
    }

    #[test]
    fn bad_reference_disables_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference_stats.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let handle = MonitorHandle::pending();
        let readiness = handle.initialize(&MonitorCfg::new(&path));
        assert!(matches!(readiness, Readiness::Disabled(_)));
        assert!(!handle.add_sample(sample()));
        assert!(matches!(handle.monitor(), Err(DriftError::NotConfigured)));
    }

    #[test]
    fn good_reference_makes_handle_ready_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference_stats.json");
        fs::write(
            &path,
            r#"{"x": {"mean": 0.5, "std": 0.3, "histogram": [4, 6], "bins": [0, 0.5, 1]}}"#,
        )
        .unwrap();

        let handle = MonitorHandle::pending();
        assert_eq!(handle.initialize(&MonitorCfg::new(&path)), Readiness::Ready);
        assert!(handle.add_sample(sample()));
        assert_eq!(handle.reference_features()["x"].std, 0.3);

        // Later calls cannot swap the monitor out.
        assert_eq!(handle.disable("late"), Readiness::Ready);
    }
}
