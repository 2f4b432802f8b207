//! Filesystem-backed source for reference statistics.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::common::error::{DriftError, DriftResult};

use super::domain::{ReferenceDistribution, ReferenceSet};

/// Anything that can produce the reference set once at startup.
pub trait ReferenceSource {
    fn load(&self) -> DriftResult<ReferenceSet>;
}

/// Reads a JSON object keyed by feature name.
pub struct FsReferenceStore {
    path: PathBuf,
}

impl FsReferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReferenceSource for FsReferenceStore {
    fn load(&self) -> DriftResult<ReferenceSet> {
        let fail = |reason: String| {
            error!(path = %self.path.display(), %reason, "reference stats rejected");
            DriftError::configuration(&self.path, reason)
        };

        let raw = fs::read_to_string(&self.path).map_err(|err| fail(err.to_string()))?;
        let features: BTreeMap<String, ReferenceDistribution> =
            serde_json::from_str(&raw).map_err(|err| fail(err.to_string()))?;
        let set = ReferenceSet::new(features).map_err(|err| match err {
            DriftError::Reference(reason) => fail(reason),
            other => other,
        })?;

        info!(
            path = %self.path.display(),
            features = ?set.names().collect::<Vec<_>>(),
            "reference stats loaded"
        );
        Ok(set)
    }
}

/// Load the reference set stored at `path`.
pub fn load(path: &Path) -> DriftResult<ReferenceSet> {
    FsReferenceStore::new(path).load()
}
