//! Evaluation service: per-feature PSI, classification and history bookkeeping.
//!
//! One evaluation runs at a time. The history mutex doubles as the evaluator
//! lock, so a pass and its persist never interleave with another pass, while
//! appends to the sample buffer only wait for the short snapshot copy.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::buffer::SampleBuffer;
use crate::common::error::{DriftError, DriftResult};
use crate::common::time;
use crate::history::{DriftHistory, HistoryRepo};
use crate::reference::ReferenceSet;

use super::domain::{DriftStatus, DriftSummary, EvaluationResult, FeatureDrift};
use super::psi::PsiCalculator;

pub struct DriftEvaluator {
    reference: Arc<ReferenceSet>,
    buffer: Arc<SampleBuffer>,
    calculator: PsiCalculator,
    threshold: f64,
    store: Box<dyn HistoryRepo>,
    history: Mutex<DriftHistory>,
    last: Mutex<Option<EvaluationResult>>,
}

impl DriftEvaluator {
    /// Build an evaluator, loading prior history from `store`.
    ///
    /// Unreadable history is logged and replaced with an empty one; it will be
    /// overwritten by the next successful pass.
    pub fn new(
        reference: Arc<ReferenceSet>,
        buffer: Arc<SampleBuffer>,
        store: Box<dyn HistoryRepo>,
        threshold: f64,
    ) -> Self {
        let features: Vec<&str> = reference.names().collect();
        let history = store.load(&features).unwrap_or_else(|err| {
            error!(%err, "drift history unreadable, starting a new one");
            DriftHistory::empty(features.iter().copied())
        });

        Self {
            calculator: PsiCalculator::new(buffer.policy().min_samples),
            reference,
            buffer,
            threshold,
            store,
            history: Mutex::new(history),
            last: Mutex::new(None),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn reference(&self) -> &ReferenceSet {
        &self.reference
    }

    /// Copy of the history as of the last completed pass.
    pub fn history(&self) -> DriftHistory {
        self.history.lock().clone()
    }

    /// Most recent pass that got past the sample threshold.
    pub fn last_result(&self) -> Option<EvaluationResult> {
        self.last.lock().clone()
    }

    /// Run a full pass and record it in the history.
    ///
    /// Never panics and never returns an error: failures come back as
    /// status `error` with a message.
    pub fn evaluate(&self) -> EvaluationResult {
        let mut history = self.history.lock();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_pass(Some(&mut *history))));
        drop(history);

        let result = self.settle(outcome);
        if matches!(result.status, DriftStatus::Normal | DriftStatus::DriftDetected) {
            *self.last.lock() = Some(result.clone());
        }
        result
    }

    /// Same computation as [`evaluate`](Self::evaluate) without touching the history.
    pub fn assess(&self) -> EvaluationResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_pass(None)));
        self.settle(outcome)
    }

    /// Summary of the last recorded pass, or of a fresh assessment when none exists.
    pub fn summary(&self) -> DriftSummary {
        match self.last_result() {
            Some(result) => DriftSummary::from(&result),
            None => DriftSummary::from(&self.assess()),
        }
    }

    fn settle(
        &self,
        outcome: std::thread::Result<DriftResult<EvaluationResult>>,
    ) -> EvaluationResult {
        let message = match outcome {
            Ok(Ok(result)) => return result,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => {
                if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic during evaluation".to_string()
                }
            }
        };
        error!(error = %message, "drift evaluation failed");
        EvaluationResult::failed(message, self.buffer.len(), time::iso(&time::now()))
    }

    fn run_pass(&self, history: Option<&mut DriftHistory>) -> DriftResult<EvaluationResult> {
        let started = time::now_ms();
        let snapshot = self.buffer.snapshot(self.reference.names());
        let timestamp = time::iso(&time::now());

        if snapshot.len < self.calculator.min_samples() {
            debug!(count = snapshot.len, "not enough samples for drift evaluation");
            return Ok(EvaluationResult::insufficient(snapshot.len, timestamp));
        }

        let mut features = BTreeMap::new();
        let mut skipped = BTreeMap::new();
        for (name, dist) in self.reference.iter() {
            let values = snapshot
                .columns
                .get(name)
                .ok_or_else(|| DriftError::Evaluation(format!("snapshot lost column '{name}'")))?;
            match self.calculator.psi_for_values(snapshot.len, values, dist) {
                Ok(psi) => {
                    let drifting = psi >= self.threshold;
                    features.insert(name.to_string(), FeatureDrift { psi, drifting });
                }
                Err(reason) => {
                    warn!(feature = %name, %reason, "psi skipped");
                    skipped.insert(name.to_string(), reason);
                }
            }
        }

        let status = if features.values().any(|f| f.drifting) {
            DriftStatus::DriftDetected
        } else {
            DriftStatus::Normal
        };

        let mut result = EvaluationResult {
            status,
            features,
            skipped,
            sample_count: snapshot.len,
            timestamp,
            persisted: false,
            error: None,
        };

        if let Some(history) = history {
            history.append(result.timestamp.clone(), &result.scores());
            result.persisted = match self.store.save(history) {
                Ok(()) => true,
                Err(err) => {
                    warn!(%err, "drift history kept in memory, will retry next pass");
                    false
                }
            };
        }

        let dur_ms = time::now_ms().saturating_sub(started) as u64;
        if result.is_drifting() {
            warn!(
                drifting = ?result.drifting_features().collect::<Vec<_>>(),
                count = result.sample_count,
                dur_ms,
                "drift detected"
            );
        } else {
            info!(
                status = result.status.as_str(),
                count = result.sample_count,
                dur_ms,
                "drift evaluated"
            );
        }
        Ok(result)
    }
}
