//! Sample domain: concurrent collection of inference-time feature vectors.

pub mod domain;
pub mod trigger;

pub use domain::{AppendReceipt, Sample, SampleBuffer, Snapshot};
pub use trigger::{TriggerEvent, TriggerPolicy};
