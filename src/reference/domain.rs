//! Training-time reference distributions and their validation rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::error::{DriftError, DriftResult};

/// Histogram and summary statistics captured for one feature at training time.
///
/// `histogram[i]` counts values in `[bins[i], bins[i + 1])`; the last bin is
/// closed on the right.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDistribution {
    pub mean: f64,
    pub std: f64,
    pub histogram: Vec<u64>,
    pub bins: Vec<f64>,
}

/// Mean and standard deviation exposed to callers that only need a summary.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub mean: f64,
    pub std: f64,
}

impl ReferenceDistribution {
    /// Capture a reference from raw training values over fixed bin edges.
    ///
    /// `std` is the population standard deviation over the finite values.
    pub fn from_values(values: &[f64], bins: Vec<f64>) -> DriftResult<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Err(DriftError::reference("no finite values to summarise"));
        }
        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        let mut dist = Self {
            mean,
            std: var.sqrt(),
            histogram: vec![0; bins.len().saturating_sub(1)],
            bins,
        };
        dist.validate_edges()?;
        dist.histogram = dist.rebucket(&finite);
        dist.validate()?;
        Ok(dist)
    }

    /// Check the structural invariants of a loaded distribution.
    pub fn validate(&self) -> DriftResult<()> {
        self.validate_edges()?;
        if self.histogram.len() + 1 != self.bins.len() {
            return Err(DriftError::reference(format!(
                "{} histogram counts need {} bin edges, got {}",
                self.histogram.len(),
                self.histogram.len() + 1,
                self.bins.len()
            )));
        }
        if self.total() == 0 {
            return Err(DriftError::reference("histogram is empty"));
        }
        if !self.mean.is_finite() || !self.std.is_finite() || self.std < 0.0 {
            return Err(DriftError::reference("mean/std must be finite and std non-negative"));
        }
        Ok(())
    }

    fn validate_edges(&self) -> DriftResult<()> {
        if self.bins.len() < 2 {
            return Err(DriftError::reference("at least two bin edges are required"));
        }
        if self.bins.iter().any(|b| !b.is_finite()) {
            return Err(DriftError::reference("bin edges must be finite"));
        }
        if self.bins.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DriftError::reference("bin edges must be strictly increasing"));
        }
        Ok(())
    }

    pub fn bin_count(&self) -> usize {
        self.histogram.len()
    }

    pub fn total(&self) -> u64 {
        self.histogram.iter().sum()
    }

    /// Index of the bin holding `value`, or `None` when it falls outside the
    /// edges or is not a number.
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        let (first, last) = (*self.bins.first()?, *self.bins.last()?);
        if value.is_nan() || value < first || value > last {
            return None;
        }
        if value == last {
            return Some(self.bins.len() - 2);
        }
        Some(self.bins.partition_point(|edge| *edge <= value) - 1)
    }

    /// Count `values` into this distribution's bins. Out-of-range values are dropped.
    pub fn rebucket(&self, values: &[f64]) -> Vec<u64> {
        let mut counts = vec![0u64; self.bin_count()];
        for idx in values.iter().filter_map(|v| self.bin_index(*v)) {
            counts[idx] += 1;
        }
        counts
    }

    pub fn summary(&self) -> FeatureSummary {
        FeatureSummary {
            mean: self.mean,
            std: self.std,
        }
    }
}

/// Every monitored feature and its reference. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceSet {
    features: BTreeMap<String, ReferenceDistribution>,
}

impl ReferenceSet {
    /// Build a set, validating each distribution. The error names the offending feature.
    pub fn new(features: BTreeMap<String, ReferenceDistribution>) -> DriftResult<Self> {
        if features.is_empty() {
            return Err(DriftError::reference("no features defined"));
        }
        for (name, dist) in &features {
            dist.validate().map_err(|err| match err {
                DriftError::Reference(reason) => {
                    DriftError::reference(format!("feature '{name}': {reason}"))
                }
                other => other,
            })?;
        }
        Ok(Self { features })
    }

    pub fn get(&self, feature: &str) -> Option<&ReferenceDistribution> {
        self.features.get(feature)
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.features.contains_key(feature)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReferenceDistribution)> {
        self.features.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Mean/std per feature for the serving surface.
    pub fn summaries(&self) -> BTreeMap<String, FeatureSummary> {
        self.features
            .iter()
            .map(|(name, dist)| (name.clone(), dist.summary()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::DriftCode;

    fn uniform() -> ReferenceDistribution {
        ReferenceDistribution {
            mean: 2.5,
            std: 1.44,
            histogram: vec![20, 20, 20, 20, 20],
            bins: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        }
    }

    #[test]
    fn bins_are_half_open_except_the_last() {
        let dist = uniform();
        assert_eq!(dist.bin_index(0.0), Some(0));
        assert_eq!(dist.bin_index(0.999), Some(0));
        assert_eq!(dist.bin_index(1.0), Some(1));
        assert_eq!(dist.bin_index(4.5), Some(4));
        assert_eq!(dist.bin_index(5.0), Some(4));
        assert_eq!(dist.bin_index(-0.1), None);
        assert_eq!(dist.bin_index(5.1), None);
        assert_eq!(dist.bin_index(f64::NAN), None);
    }

    #[test]
    fn rebucket_drops_out_of_range_values() {
        let counts = uniform().rebucket(&[0.5, 1.5, 1.7, 5.0, 9.0, -3.0]);
        assert_eq!(counts, vec![1, 2, 0, 0, 1]);
    }

    #[test]
    fn validation_catches_malformed_distributions() {
        let mut short = uniform();
        short.bins.pop();
        assert!(short.validate().unwrap_err().to_string().contains("bin edges"));

        let mut unsorted = uniform();
        unsorted.bins[2] = 0.5;
        assert!(unsorted
            .validate()
            .unwrap_err()
            .to_string()
            .contains("strictly increasing"));

        let mut empty = uniform();
        empty.histogram = vec![0; 5];
        assert!(empty.validate().is_err());

        assert!(uniform().validate().is_ok());
    }

    #[test]
    fn set_names_the_bad_feature() {
        let mut features = BTreeMap::new();
        features.insert("age".to_string(), uniform());
        let mut bad = uniform();
        bad.histogram.push(1);
        features.insert("income".to_string(), bad);

        let err = ReferenceSet::new(features).unwrap_err();
        assert!(matches!(&err, DriftError::Reference(reason) if reason.starts_with("feature 'income'")));
        assert_eq!(err.code(), DriftCode::Configuration);
        assert!(ReferenceSet::new(BTreeMap::new()).is_err());
    }

    #[test]
    fn capture_from_values_matches_rebucketing() {
        let values: Vec<f64> = (0..100).map(|i| (i as f64 + 0.5) / 20.0).collect();
        let dist =
            ReferenceDistribution::from_values(&values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
                .unwrap();
        assert_eq!(dist.histogram, vec![20, 20, 20, 20, 20]);
        assert!((dist.mean - 2.5).abs() < 1e-12);
        assert!(dist.std > 1.4 && dist.std < 1.5);
        assert!(ReferenceDistribution::from_values(&[f64::NAN], vec![0.0, 1.0]).is_err());
    }
}
