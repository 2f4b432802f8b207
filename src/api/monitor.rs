//! In-process facade the serving endpoint talks to.
//!
//! Constructed explicitly and passed to request handlers; there is no global
//! instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::buffer::{AppendReceipt, SampleBuffer};
use crate::common::config::{EvalMode, MonitorCfg};
use crate::common::error::DriftResult;
use crate::evaluation::{DriftEvaluator, DriftSummary, EvalWorker, EvaluationResult};
use crate::history::{DriftHistory, FsHistoryStore, HistoryRepo};
use crate::reference::{repo_fs, FeatureSummary, ReferenceSet};

enum Dispatch {
    Inline,
    Background(EvalWorker),
}

pub struct DriftMonitor {
    buffer: Arc<SampleBuffer>,
    evaluator: Arc<DriftEvaluator>,
    dispatch: Dispatch,
}

impl DriftMonitor {
    /// Load the reference and history named by `cfg`.
    ///
    /// Fails only with a configuration error (bad reference file or invalid
    /// settings); history problems degrade to an empty history.
    pub fn from_cfg(cfg: &MonitorCfg) -> DriftResult<Self> {
        cfg.validate()?;
        let reference = repo_fs::load(&cfg.reference_path)?;
        let store = FsHistoryStore::new(cfg.history_path());
        info!(history = %store.location().display(), "drift monitor configured");
        Ok(Self::new(reference, Box::new(store), cfg))
    }

    /// Assemble a monitor from already loaded parts.
    pub fn new(reference: ReferenceSet, store: Box<dyn HistoryRepo>, cfg: &MonitorCfg) -> Self {
        let reference = Arc::new(reference);
        let buffer = Arc::new(SampleBuffer::new(
            reference.names().map(str::to_string),
            cfg.trigger_policy(),
            cfg.retention_limit(),
        ));
        let evaluator = Arc::new(DriftEvaluator::new(
            Arc::clone(&reference),
            Arc::clone(&buffer),
            store,
            cfg.threshold,
        ));
        let dispatch = match cfg.eval_mode {
            EvalMode::Inline => Dispatch::Inline,
            EvalMode::Background => Dispatch::Background(EvalWorker::spawn(Arc::clone(&evaluator))),
        };

        Self {
            buffer,
            evaluator,
            dispatch,
        }
    }

    /// Record a sample; `false` only when the append itself failed.
    ///
    /// Callers should carry on with their own response either way.
    pub fn add_sample(&self, values: BTreeMap<String, f64>) -> bool {
        self.record(values).is_ok()
    }

    /// Like [`add_sample`](Self::add_sample) but returns the typed receipt.
    pub fn record(&self, values: BTreeMap<String, f64>) -> DriftResult<AppendReceipt> {
        let receipt = self.buffer.push(values).map_err(|err| {
            error!(%err, "sample not recorded");
            err
        })?;

        if let Some(event) = receipt.trigger {
            info!(total = event.total, len = event.len, "evaluation threshold crossed");
            match &self.dispatch {
                Dispatch::Inline => {
                    self.evaluator.evaluate();
                }
                Dispatch::Background(worker) => {
                    if !worker.submit(event) {
                        warn!(total = event.total, "evaluation worker unavailable, trigger dropped");
                    }
                }
            }
        }
        Ok(receipt)
    }

    /// Run and record an evaluation pass now, whatever the sample count.
    pub fn evaluate(&self) -> EvaluationResult {
        self.evaluator.evaluate()
    }

    pub fn summary(&self) -> DriftSummary {
        self.evaluator.summary()
    }

    pub fn reference_features(&self) -> BTreeMap<String, FeatureSummary> {
        self.evaluator.reference().summaries()
    }

    /// Read-only view of the reference for presentation.
    pub fn reference(&self) -> &ReferenceSet {
        self.evaluator.reference()
    }

    /// Snapshot of the history for presentation.
    pub fn history(&self) -> DriftHistory {
        self.evaluator.history()
    }

    pub fn sample_count(&self) -> usize {
        self.buffer.len()
    }
}
