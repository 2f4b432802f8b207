//! Background evaluation task fed by buffer trigger events.
//!
//! Keeps the append path down to a channel send when the monitor runs in
//! background mode. Dropping the worker closes the channel and joins the thread.

use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::buffer::TriggerEvent;

use super::service::DriftEvaluator;

pub struct EvalWorker {
    tx: Option<mpsc::Sender<TriggerEvent>>,
    handle: Option<JoinHandle<()>>,
}

impl EvalWorker {
    pub fn spawn(evaluator: Arc<DriftEvaluator>) -> Self {
        let (tx, rx) = mpsc::channel::<TriggerEvent>();
        let handle = thread::Builder::new()
            .name("driftguard-eval".to_string())
            .spawn(move || {
                for event in rx {
                    let result = evaluator.evaluate();
                    info!(
                        total = event.total,
                        status = result.status.as_str(),
                        "automatic drift evaluation"
                    );
                }
                debug!("evaluation worker stopped");
            });

        match handle {
            Ok(handle) => Self {
                tx: Some(tx),
                handle: Some(handle),
            },
            Err(err) => {
                error!(%err, "could not start evaluation worker, triggers will be dropped");
                Self {
                    tx: None,
                    handle: None,
                }
            }
        }
    }

    /// Queue an evaluation. Returns `false` if the worker is gone.
    pub fn submit(&self, event: TriggerEvent) -> bool {
        match &self.tx {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

impl Drop for EvalWorker {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("evaluation worker panicked");
            }
        }
    }
}
