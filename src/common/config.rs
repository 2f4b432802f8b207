//! Runtime configuration loaded from the environment or an embedded JSON object.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::buffer::trigger::TriggerPolicy;
use crate::common::error::{DriftError, DriftResult};

const DEFAULT_REFERENCE: &str = "./data/reference_stats.json";
const HISTORY_FILE: &str = "drift_history.json";

/// How a threshold crossing is turned into an evaluation pass.
///
/// `Background` keeps `add_sample` at append cost; the pass and the history
/// write land shortly after the triggering call returns. `Inline` runs the
/// pass on the appending thread, so the triggering call also pays for PSI
/// and the history write, but its effects are visible as soon as it returns.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMode {
    /// Evaluate on the appending thread once the buffer lock is released.
    Inline,
    /// Hand the trigger to a dedicated evaluation thread.
    #[default]
    Background,
}

/// Snapshot of configuration values consumed by the monitor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorCfg {
    pub reference_path: PathBuf,
    /// Defaults to `drift_history.json` next to the reference file.
    pub history_path: Option<PathBuf>,
    pub threshold: f64,
    pub min_samples: usize,
    pub eval_step: usize,
    /// Ring capacity; `0` keeps every sample.
    pub retention: usize,
    pub eval_mode: EvalMode,
    pub log_filter: String,
}

impl Default for MonitorCfg {
    fn default() -> Self {
        Self {
            reference_path: PathBuf::from(DEFAULT_REFERENCE),
            history_path: None,
            threshold: 0.2,
            min_samples: 100,
            eval_step: 50,
            retention: 10_000,
            eval_mode: EvalMode::Background,
            log_filter: "info".to_string(),
        }
    }
}

impl MonitorCfg {
    /// Defaults pointed at a specific reference file.
    pub fn new(reference_path: impl Into<PathBuf>) -> Self {
        Self {
            reference_path: reference_path.into(),
            ..Self::default()
        }
    }

    /// Create a configuration snapshot from the process environment.
    pub fn load() -> DriftResult<Self> {
        fn var(key: &str) -> Option<String> {
            env::var(key).ok().filter(|v| !v.trim().is_empty())
        }

        fn parsed<T: std::str::FromStr>(key: &str, default: T) -> DriftResult<T> {
            match var(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| DriftError::invalid(format!("{key}={raw} is not a valid value"))),
                None => Ok(default),
            }
        }

        let defaults = Self::default();
        let eval_mode = match var("DRIFTGUARD_EVAL_MODE").as_deref() {
            None | Some("background") => EvalMode::Background,
            Some("inline") => EvalMode::Inline,
            Some(other) => {
                return Err(DriftError::invalid(format!(
                    "DRIFTGUARD_EVAL_MODE={other} is not inline or background"
                )))
            }
        };

        let cfg = Self {
            reference_path: var("DRIFTGUARD_REFERENCE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.reference_path),
            history_path: var("DRIFTGUARD_HISTORY_PATH").map(PathBuf::from),
            threshold: parsed("DRIFTGUARD_THRESHOLD", defaults.threshold)?,
            min_samples: parsed("DRIFTGUARD_MIN_SAMPLES", defaults.min_samples)?,
            eval_step: parsed("DRIFTGUARD_EVAL_STEP", defaults.eval_step)?,
            retention: parsed("DRIFTGUARD_RETENTION", defaults.retention)?,
            eval_mode,
            log_filter: var("DRIFTGUARD_LOG").unwrap_or(defaults.log_filter),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a JSON object; absent keys take their defaults.
    pub fn from_json(raw: &str) -> DriftResult<Self> {
        let cfg: Self = serde_json::from_str(raw)
            .map_err(|err| DriftError::invalid(format!("config json: {err}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_eval_mode(mut self, mode: EvalMode) -> Self {
        self.eval_mode = mode;
        self
    }

    pub fn with_trigger(mut self, min_samples: usize, eval_step: usize) -> Self {
        self.min_samples = min_samples;
        self.eval_step = eval_step;
        self
    }

    /// Resolved history location.
    pub fn history_path(&self) -> PathBuf {
        match &self.history_path {
            Some(path) => path.clone(),
            None => self
                .reference_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(HISTORY_FILE),
        }
    }

    /// Retention as an optional ring capacity.
    pub fn retention_limit(&self) -> Option<usize> {
        (self.retention > 0).then_some(self.retention)
    }

    pub fn trigger_policy(&self) -> TriggerPolicy {
        TriggerPolicy::new(self.min_samples, self.eval_step)
    }

    pub fn validate(&self) -> DriftResult<()> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(DriftError::invalid("threshold must be a positive number"));
        }
        if self.min_samples == 0 {
            return Err(DriftError::invalid("min_samples must be at least 1"));
        }
        if self.eval_step == 0 {
            return Err(DriftError::invalid("eval_step must be at least 1"));
        }
        if let Some(limit) = self.retention_limit() {
            if limit < self.min_samples {
                return Err(DriftError::invalid(format!(
                    "retention {limit} cannot hold min_samples {}",
                    self.min_samples
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_defaults_next_to_reference() {
        let cfg = MonitorCfg::new("/srv/model/reference_stats.json");
        assert_eq!(
            cfg.history_path(),
            PathBuf::from("/srv/model/drift_history.json")
        );

        let cfg = cfg.with_history_path("/var/lib/drift.json");
        assert_eq!(cfg.history_path(), PathBuf::from("/var/lib/drift.json"));
    }

    #[test]
    fn json_fills_missing_keys_with_defaults() {
        let cfg = MonitorCfg::from_json(
            r#"{"reference_path":"ref.json","threshold":0.25,"eval_mode":"background"}"#,
        )
        .unwrap();
        assert_eq!(cfg.reference_path, PathBuf::from("ref.json"));
        assert_eq!(cfg.threshold, 0.25);
        assert_eq!(cfg.eval_mode, EvalMode::Background);
        assert_eq!(cfg.min_samples, 100);
        assert_eq!(cfg.eval_step, 50);
        assert_eq!(cfg.retention_limit(), Some(10_000));
    }

    #[test]
    fn evaluation_leaves_the_write_path_by_default() {
        assert_eq!(MonitorCfg::default().eval_mode, EvalMode::Background);
        assert_eq!(MonitorCfg::new("ref.json").eval_mode, EvalMode::Background);
        let cfg = MonitorCfg::from_json(r#"{"eval_mode":"inline"}"#).unwrap();
        assert_eq!(cfg.eval_mode, EvalMode::Inline);
    }

    #[test]
    fn zero_retention_means_unbounded() {
        let cfg = MonitorCfg::default().with_retention(0);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.retention_limit(), None);
    }

    #[test]
    fn validation_rejects_unusable_values() {
        assert!(MonitorCfg::default().with_threshold(0.0).validate().is_err());
        assert!(MonitorCfg::default().with_threshold(f64::NAN).validate().is_err());
        assert!(MonitorCfg::default().with_trigger(0, 50).validate().is_err());
        assert!(MonitorCfg::default().with_trigger(100, 0).validate().is_err());
        assert!(MonitorCfg::default().with_retention(99).validate().is_err());
        assert!(MonitorCfg::from_json("{\"threshold\": -1}").is_err());
        assert!(MonitorCfg::from_json("not json").is_err());
    }
}
