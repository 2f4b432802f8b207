//! Shared, append-only buffer of observed feature vectors.
//!
//! A single mutex guards both the append and the length read, so concurrent
//! writers never lose a sample and the trigger check always sees the length
//! its own append produced. The lock is never held across an evaluation.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::common::error::{DriftError, DriftResult};
use crate::common::time;

use super::trigger::{TriggerEvent, TriggerPolicy};

/// One observed feature vector. May omit monitored features.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

impl Sample {
    pub fn get(&self, feature: &str) -> Option<f64> {
        self.values.get(feature).copied()
    }
}

/// What a single append did.
#[derive(Clone, Debug, PartialEq)]
pub struct AppendReceipt {
    /// Samples ever appended, this one included.
    pub total: u64,
    /// Samples retained after the append.
    pub len: usize,
    /// Monitored features the caller did not send.
    pub missing: Vec<String>,
    /// Features dropped because their value was NaN or infinite.
    pub rejected: Vec<String>,
    /// Set when this append crossed an evaluation boundary.
    pub trigger: Option<TriggerEvent>,
}

impl AppendReceipt {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.rejected.is_empty()
    }
}

#[derive(Debug, Default)]
struct BufferState {
    samples: VecDeque<Sample>,
    total: u64,
}

/// Per-feature values copied out under one lock acquisition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub len: usize,
    pub columns: BTreeMap<String, Vec<f64>>,
}

/// Ordered sample store shared by every request handler.
///
/// With a retention limit the oldest sample is evicted once the buffer is
/// full; `total` keeps counting so the trigger keeps firing.
#[derive(Debug)]
pub struct SampleBuffer {
    state: Mutex<BufferState>,
    monitored: Vec<String>,
    policy: TriggerPolicy,
    retention: Option<usize>,
}

impl SampleBuffer {
    pub fn new(
        monitored: impl IntoIterator<Item = String>,
        policy: TriggerPolicy,
        retention: Option<usize>,
    ) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            monitored: monitored.into_iter().collect(),
            policy,
            retention,
        }
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    /// Record a sample stamped with the current time.
    pub fn push(&self, values: BTreeMap<String, f64>) -> DriftResult<AppendReceipt> {
        self.push_at(time::now(), values)
    }

    pub fn push_at(
        &self,
        timestamp: DateTime<Utc>,
        mut values: BTreeMap<String, f64>,
    ) -> DriftResult<AppendReceipt> {
        let mut rejected = Vec::new();
        values.retain(|name, value| {
            let keep = value.is_finite();
            if !keep {
                rejected.push(name.clone());
            }
            keep
        });
        let missing: Vec<String> = self
            .monitored
            .iter()
            .filter(|name| !values.contains_key(name.as_str()) && !rejected.contains(*name))
            .cloned()
            .collect();

        if !missing.is_empty() {
            warn!(?missing, "sample is missing monitored features");
        }
        if !rejected.is_empty() {
            warn!(?rejected, "sample carried non-finite values");
        }

        let sample = Sample { timestamp, values };
        let (total, len) = {
            let mut state = self.state.lock();
            if self.retention.is_some_and(|limit| state.samples.len() >= limit) {
                state.samples.pop_front();
            }
            state
                .samples
                .try_reserve(1)
                .map_err(|err| DriftError::Storage(err.to_string()))?;
            state.samples.push_back(sample);
            state.total += 1;
            (state.total, state.samples.len())
        };

        debug!(total, len, "sample recorded");
        let trigger = self
            .policy
            .fires_at(total)
            .then_some(TriggerEvent { total, len });

        Ok(AppendReceipt {
            total,
            len,
            missing,
            rejected,
            trigger,
        })
    }

    /// Samples currently retained.
    pub fn len(&self) -> usize {
        self.state.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples ever appended.
    pub fn total(&self) -> u64 {
        self.state.lock().total
    }

    /// Values of `feature` from every retained sample that carries it, oldest first.
    pub fn values_for(&self, feature: &str) -> Vec<f64> {
        let state = self.state.lock();
        state.samples.iter().filter_map(|s| s.get(feature)).collect()
    }

    /// Consistent copy of the length and the requested columns.
    pub fn snapshot<'a>(&self, features: impl IntoIterator<Item = &'a str>) -> Snapshot {
        let state = self.state.lock();
        let columns = features
            .into_iter()
            .map(|name| {
                let column = state.samples.iter().filter_map(|s| s.get(name)).collect();
                (name.to_string(), column)
            })
            .collect();
        Snapshot {
            len: state.samples.len(),
            columns,
        }
    }
}
