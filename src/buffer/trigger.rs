//! When a growing buffer should ask for an evaluation pass.

use serde::{Deserialize, Serialize};

/// Fire once `min_samples` appends have happened, then every `step` appends after that.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TriggerPolicy {
    pub min_samples: usize,
    pub step: usize,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self::new(100, 50)
    }
}

impl TriggerPolicy {
    pub fn new(min_samples: usize, step: usize) -> Self {
        Self {
            min_samples,
            step: step.max(1),
        }
    }

    /// Whether the append that brought the running total to `total` crosses a boundary.
    pub fn fires_at(&self, total: u64) -> bool {
        let min = self.min_samples as u64;
        total >= min && (total - min) % self.step as u64 == 0
    }

    /// Whether `len` retained samples are enough to compute PSI.
    pub fn is_sufficient(&self, len: usize) -> bool {
        len >= self.min_samples
    }
}

/// Signal emitted by the buffer when a boundary is crossed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TriggerEvent {
    /// Samples ever appended, including evicted ones.
    pub total: u64,
    /// Samples retained at the moment of the crossing.
    pub len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_at_threshold_then_every_step() {
        let policy = TriggerPolicy::default();
        let fired: Vec<u64> = (1..=260).filter(|n| policy.fires_at(*n)).collect();
        assert_eq!(fired, vec![100, 150, 200, 250]);
    }

    #[test]
    fn never_fires_below_threshold() {
        let policy = TriggerPolicy::new(100, 50);
        assert!((0..100).all(|n| !policy.fires_at(n)));
        assert!(!policy.is_sufficient(99));
        assert!(policy.is_sufficient(100));
    }

    #[test]
    fn odd_minimum_uses_offset_from_minimum() {
        let policy = TriggerPolicy::new(10, 4);
        let fired: Vec<u64> = (1..=22).filter(|n| policy.fires_at(*n)).collect();
        assert_eq!(fired, vec![10, 14, 18, 22]);
    }
}
