//! Evaluation outcomes: status, severity and the per-feature results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::psi::SkipReason;

/// PSI at or above this level is a warning.
pub const WARNING_LEVEL: f64 = 0.1;
/// PSI at or above this level is critical.
pub const CRITICAL_LEVEL: f64 = 0.2;

/// Overall outcome of an evaluation request.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    InsufficientData,
    Normal,
    DriftDetected,
    /// The pass failed; the next call starts fresh.
    Error,
    /// Monitoring is disabled or not yet initialised.
    NotConfigured,
}

impl DriftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftStatus::InsufficientData => "insufficient_data",
            DriftStatus::Normal => "normal",
            DriftStatus::DriftDetected => "drift_detected",
            DriftStatus::Error => "error",
            DriftStatus::NotConfigured => "not_configured",
        }
    }
}

/// Three-level reading of a PSI value, ordered from least to most severe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Stable,
    Warning,
    Critical,
}

impl Severity {
    /// `[0, 0.1)` stable, `[0.1, 0.2)` warning, `>= 0.2` critical.
    pub fn classify(psi: f64) -> Self {
        if psi >= CRITICAL_LEVEL {
            Severity::Critical
        } else if psi >= WARNING_LEVEL {
            Severity::Warning
        } else {
            Severity::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Stable => "stable",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// PSI and drift flag for one feature.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub psi: f64,
    pub drifting: bool,
}

/// One evaluation pass. Immutable once returned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub status: DriftStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, FeatureDrift>,
    /// Features left out of this pass and why.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub skipped: BTreeMap<String, SkipReason>,
    /// Older producers wrote this as `count`.
    #[serde(alias = "count")]
    pub sample_count: usize,
    pub timestamp: String,
    /// Whether the history file was rewritten after this pass.
    #[serde(default)]
    pub persisted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationResult {
    pub fn insufficient(sample_count: usize, timestamp: String) -> Self {
        Self::bare(DriftStatus::InsufficientData, sample_count, timestamp)
    }

    pub fn failed(message: impl Into<String>, sample_count: usize, timestamp: String) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::bare(DriftStatus::Error, sample_count, timestamp)
        }
    }

    pub fn not_configured(timestamp: String) -> Self {
        Self::bare(DriftStatus::NotConfigured, 0, timestamp)
    }

    fn bare(status: DriftStatus, sample_count: usize, timestamp: String) -> Self {
        Self {
            status,
            features: BTreeMap::new(),
            skipped: BTreeMap::new(),
            sample_count,
            timestamp,
            persisted: false,
            error: None,
        }
    }

    pub fn is_drifting(&self) -> bool {
        self.status == DriftStatus::DriftDetected
    }

    pub fn drifting_features(&self) -> impl Iterator<Item = &str> {
        self.features
            .iter()
            .filter(|(_, f)| f.drifting)
            .map(|(name, _)| name.as_str())
    }

    /// PSI per computed feature, in the shape the history stores.
    pub fn scores(&self) -> BTreeMap<String, f64> {
        self.features
            .iter()
            .map(|(name, f)| (name.clone(), f.psi))
            .collect()
    }
}

/// Severity view of one feature for summary consumers.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatus {
    pub psi: f64,
    pub drifting: bool,
    pub severity: Severity,
}

/// Condensed monitoring state for dashboards and status endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriftSummary {
    pub overall_status: DriftStatus,
    /// Highest severity across computed features, absent when none were computed.
    pub overall_severity: Option<Severity>,
    pub per_feature_status: BTreeMap<String, FeatureStatus>,
    pub sample_count: usize,
    pub timestamp: String,
}

impl From<&EvaluationResult> for DriftSummary {
    fn from(result: &EvaluationResult) -> Self {
        let per_feature_status: BTreeMap<String, FeatureStatus> = result
            .features
            .iter()
            .map(|(name, f)| {
                let status = FeatureStatus {
                    psi: f.psi,
                    drifting: f.drifting,
                    severity: Severity::classify(f.psi),
                };
                (name.clone(), status)
            })
            .collect();

        Self {
            overall_status: result.status,
            overall_severity: per_feature_status.values().map(|s| s.severity).max(),
            per_feature_status,
            sample_count: result.sample_count,
            timestamp: result.timestamp.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_boundaries() {
        assert_eq!(Severity::classify(0.0), Severity::Stable);
        assert_eq!(Severity::classify(0.05), Severity::Stable);
        assert_eq!(Severity::classify(0.099_999), Severity::Stable);
        assert_eq!(Severity::classify(0.1), Severity::Warning);
        assert_eq!(Severity::classify(0.15), Severity::Warning);
        assert_eq!(Severity::classify(0.199_999), Severity::Warning);
        assert_eq!(Severity::classify(0.2), Severity::Critical);
        assert_eq!(Severity::classify(0.25), Severity::Critical);
    }

    #[test]
    fn severities_order_by_gravity() {
        assert!(Severity::Stable < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn summary_takes_the_worst_feature() {
        let mut result = EvaluationResult::insufficient(150, "t".to_string());
        result.status = DriftStatus::DriftDetected;
        result.features.insert(
            "age".to_string(),
            FeatureDrift {
                psi: 0.05,
                drifting: false,
            },
        );
        result.features.insert(
            "income".to_string(),
            FeatureDrift {
                psi: 0.31,
                drifting: true,
            },
        );

        let summary = DriftSummary::from(&result);
        assert_eq!(summary.overall_severity, Some(Severity::Critical));
        assert_eq!(summary.per_feature_status["age"].severity, Severity::Stable);
        assert_eq!(summary.sample_count, 150);
        assert_eq!(result.drifting_features().collect::<Vec<_>>(), vec!["income"]);
    }

    #[test]
    fn status_serialises_snake_case() {
        let result = EvaluationResult::insufficient(42, "t".to_string());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "insufficient_data");
        assert_eq!(json["sample_count"], 42);
        assert!(json.get("features").is_none());
        assert_eq!(DriftStatus::DriftDetected.as_str(), "drift_detected");
    }

    #[test]
    fn results_written_with_count_still_parse() {
        let result: EvaluationResult = serde_json::from_str(
            r#"{"status": "insufficient_data", "count": 42, "timestamp": "t"}"#,
        )
        .unwrap();
        assert_eq!(result.sample_count, 42);
        assert_eq!(result, EvaluationResult::insufficient(42, "t".to_string()));
    }
}
