//! Reference domain: the immutable training-time distributions drift is measured against.

pub mod domain;
pub mod repo_fs;

pub use domain::{FeatureSummary, ReferenceDistribution, ReferenceSet};
pub use repo_fs::{FsReferenceStore, ReferenceSource};
