//! Time series of PSI scores, one series per feature alongside a shared
//! timestamp series.
//!
//! A feature skipped in some pass gets no entry for that timestamp, so its
//! series may trail the timestamps but is never longer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::time;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftHistory {
    #[serde(default)]
    pub timestamps: Vec<String>,
    #[serde(default)]
    pub drift_scores: BTreeMap<String, Vec<f64>>,
}

/// One row of the feature-by-time matrix used for heatmaps.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeatmapRow {
    pub feature: String,
    pub scores: Vec<Option<f64>>,
}

impl DriftHistory {
    /// Empty history with an empty series for every monitored feature.
    pub fn empty<'a>(features: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            timestamps: Vec::new(),
            drift_scores: features
                .into_iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Make sure every monitored feature has a (possibly empty) series.
    pub fn ensure_features<'a>(&mut self, features: impl IntoIterator<Item = &'a str>) {
        for name in features {
            self.drift_scores.entry(name.to_string()).or_default();
        }
    }

    /// Record one pass: the timestamp plus a score for each computed feature.
    pub fn append(&mut self, timestamp: String, scores: &BTreeMap<String, f64>) {
        self.timestamps.push(timestamp);
        for (name, psi) in scores {
            self.drift_scores.entry(name.clone()).or_default().push(*psi);
        }
    }

    /// No series runs past the timestamp series.
    pub fn is_consistent(&self) -> bool {
        self.drift_scores
            .values()
            .all(|series| series.len() <= self.timestamps.len())
    }

    /// Trim series longer than the timestamps; returns the names that were cut.
    pub fn reconcile(&mut self) -> Vec<String> {
        let limit = self.timestamps.len();
        let mut trimmed = Vec::new();
        for (name, series) in self.drift_scores.iter_mut() {
            if series.len() > limit {
                series.truncate(limit);
                trimmed.push(name.clone());
            }
        }
        trimmed
    }

    /// Timestamp/score pairs for one feature.
    ///
    /// A series only trails the timestamps when early passes skipped the
    /// feature, so scores line up with the most recent timestamps.
    pub fn feature_series(&self, feature: &str) -> Vec<(String, f64)> {
        self.drift_scores
            .get(feature)
            .map(|series| {
                let series = &series[series.len().saturating_sub(self.timestamps.len())..];
                let offset = self.timestamps.len() - series.len();
                self.timestamps[offset..]
                    .iter()
                    .cloned()
                    .zip(series.iter().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Feature-by-time matrix, each row left-padded with `None` up to the timestamp count.
    pub fn heatmap(&self) -> Vec<HeatmapRow> {
        let width = self.timestamps.len();
        self.drift_scores
            .iter()
            .map(|(name, series)| {
                let series = &series[series.len().saturating_sub(width)..];
                let mut scores: Vec<Option<f64>> = vec![None; width - series.len()];
                scores.extend(series.iter().copied().map(Some));
                HeatmapRow {
                    feature: name.clone(),
                    scores,
                }
            })
            .collect()
    }

    /// Axis labels for charts; unparseable stamps become `Point n`.
    pub fn labels(&self) -> Vec<String> {
        self.timestamps
            .iter()
            .enumerate()
            .map(|(i, raw)| time::chart_label(raw).unwrap_or_else(|| format!("Point {}", i + 1)))
            .collect()
    }

    /// Most recent score per feature.
    pub fn latest(&self) -> BTreeMap<String, f64> {
        self.drift_scores
            .iter()
            .filter_map(|(name, series)| series.last().map(|psi| (name.clone(), *psi)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn empty_history_lists_every_feature() {
        let history = DriftHistory::empty(["age", "income"]);
        assert!(history.is_empty());
        assert_eq!(history.drift_scores.len(), 2);
        assert!(history.drift_scores.values().all(Vec::is_empty));
    }

    #[test]
    fn skipped_features_trail_but_never_lead() {
        let mut history = DriftHistory::empty(["age", "income"]);
        history.append("t1".into(), &scores(&[("age", 0.01), ("income", 0.3)]));
        history.append("t2".into(), &scores(&[("age", 0.02)]));

        assert_eq!(history.len(), 2);
        assert_eq!(history.drift_scores["age"].len(), 2);
        assert_eq!(history.drift_scores["income"].len(), 1);
        assert!(history.is_consistent());
        assert_eq!(history.latest(), scores(&[("age", 0.02), ("income", 0.3)]));
    }

    #[test]
    fn reconcile_trims_overlong_series() {
        let mut history: DriftHistory = serde_json::from_str(
            r#"{"timestamps": ["a"], "drift_scores": {"age": [0.1, 0.2], "income": [0.3]}}"#,
        )
        .unwrap();
        assert!(!history.is_consistent());
        assert_eq!(history.reconcile(), vec!["age".to_string()]);
        assert!(history.is_consistent());
        assert_eq!(history.drift_scores["age"], vec![0.1]);
    }

    #[test]
    fn heatmap_and_series_align_late_scores_with_late_timestamps() {
        let mut history = DriftHistory::empty(["age", "income"]);
        history.append("t1".into(), &scores(&[("age", 0.01)]));
        history.append("t2".into(), &scores(&[("age", 0.02), ("income", 0.4)]));

        let rows = history.heatmap();
        assert_eq!(rows[0].scores, vec![Some(0.01), Some(0.02)]);
        assert_eq!(rows[1].scores, vec![None, Some(0.4)]);
        assert_eq!(
            history.feature_series("age"),
            vec![("t1".to_string(), 0.01), ("t2".to_string(), 0.02)]
        );
        assert!(history.feature_series("missing").is_empty());
    }

    #[test]
    fn feature_skipped_early_is_labelled_with_the_pass_that_computed_it() {
        let mut history = DriftHistory::empty(["a", "b"]);
        history.append("2024-01-01T00:00:00Z".into(), &scores(&[("a", 0.05)]));
        history.append(
            "2024-01-02T00:00:00Z".into(),
            &scores(&[("a", 0.06), ("b", 0.9)]),
        );

        assert_eq!(
            history.feature_series("b"),
            vec![("2024-01-02T00:00:00Z".to_string(), 0.9)]
        );
    }

    #[test]
    fn labels_fall_back_to_positions() {
        let mut history = DriftHistory::default();
        history.append("2024-01-02T03:04:05.000000Z".into(), &BTreeMap::new());
        history.append("garbage".into(), &BTreeMap::new());
        assert_eq!(history.labels(), vec!["2024-01-02 03:04", "Point 2"]);
    }
}
