//! Population Stability Index of observed values against a reference histogram.
//!
//! PSI = sum over bins of `(p_cur - p_ref) * ln(p_cur / p_ref)`, with both
//! probability vectors built over the reference's own bin edges and every bin
//! floored at [`PROBABILITY_FLOOR`] before the ratio is taken. The floor sets
//! the scale of the reported metric and must not change.

use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;
use crate::reference::{ReferenceDistribution, ReferenceSet};

/// Lower bound applied to each bin probability.
pub const PROBABILITY_FLOOR: f64 = 1e-6;

/// Why a feature got no PSI for this pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer samples buffered than the minimum.
    InsufficientData { count: usize, required: usize },
    /// The feature has no reference distribution.
    UnknownFeature,
    /// No buffered sample carries the feature.
    NoObservations,
    /// Observations exist but none fall inside the reference edges.
    OutOfRange { observed: usize },
    /// The arithmetic produced NaN or infinity.
    NonFinite,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData { count, required } => {
                write!(f, "{count} samples buffered, {required} required")
            }
            Self::UnknownFeature => f.write_str("feature has no reference distribution"),
            Self::NoObservations => f.write_str("no sample carries this feature"),
            Self::OutOfRange { observed } => {
                write!(f, "none of {observed} observations fall inside the reference bins")
            }
            Self::NonFinite => f.write_str("psi is not finite"),
        }
    }
}

/// Turn raw bin counts into probabilities floored at [`PROBABILITY_FLOOR`].
///
/// Returns `None` for an all-zero histogram.
pub fn floored_probabilities(counts: &[u64]) -> Option<Vec<f64>> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return None;
    }
    let total = total as f64;
    Some(
        counts
            .iter()
            .map(|c| (*c as f64 / total).max(PROBABILITY_FLOOR))
            .collect(),
    )
}

/// PSI between two probability vectors over the same bins.
///
/// Inputs are floored again here so callers can pass unfloored vectors.
pub fn population_stability_index(current: &[f64], reference: &[f64]) -> f64 {
    current
        .iter()
        .zip(reference)
        .map(|(cur, refp)| {
            let cur = cur.max(PROBABILITY_FLOOR);
            let refp = refp.max(PROBABILITY_FLOOR);
            (cur - refp) * (cur / refp).ln()
        })
        .sum()
}

/// Computes PSI for single features once enough samples are buffered.
#[derive(Copy, Clone, Debug)]
pub struct PsiCalculator {
    min_samples: usize,
}

impl PsiCalculator {
    pub fn new(min_samples: usize) -> Self {
        Self { min_samples }
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// PSI of `feature` over everything currently in `buffer`.
    pub fn psi(
        &self,
        feature: &str,
        buffer: &SampleBuffer,
        reference: &ReferenceSet,
    ) -> Result<f64, SkipReason> {
        let dist = reference.get(feature).ok_or(SkipReason::UnknownFeature)?;
        let snapshot = buffer.snapshot([feature]);
        let values = snapshot.columns.get(feature).map(Vec::as_slice).unwrap_or(&[]);
        self.psi_for_values(snapshot.len, values, dist)
    }

    /// PSI of already extracted `values`, given the buffer length they came from.
    pub fn psi_for_values(
        &self,
        sample_count: usize,
        values: &[f64],
        reference: &ReferenceDistribution,
    ) -> Result<f64, SkipReason> {
        if sample_count < self.min_samples {
            return Err(SkipReason::InsufficientData {
                count: sample_count,
                required: self.min_samples,
            });
        }
        if values.is_empty() {
            return Err(SkipReason::NoObservations);
        }

        let current = floored_probabilities(&reference.rebucket(values)).ok_or(
            SkipReason::OutOfRange {
                observed: values.len(),
            },
        )?;
        // Loaded references are validated non-empty.
        let expected =
            floored_probabilities(&reference.histogram).ok_or(SkipReason::NonFinite)?;

        let psi = population_stability_index(&current, &expected);
        if psi.is_finite() {
            Ok(psi)
        } else {
            Err(SkipReason::NonFinite)
        }
    }
}
