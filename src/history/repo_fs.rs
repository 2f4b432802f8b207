//! Filesystem repository for the drift history file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::common::error::{DriftError, DriftResult};

use super::domain::DriftHistory;

/// Repository contract for durable history.
pub trait HistoryRepo: Send + Sync {
    /// A missing location yields `Ok` with an empty history; unreadable or
    /// malformed content is an error.
    fn load(&self, features: &[&str]) -> DriftResult<DriftHistory>;
    /// Overwrite the stored history with `history`.
    fn save(&self, history: &DriftHistory) -> DriftResult<()>;
    fn location(&self) -> &Path;
}

/// Stores the history as pretty-printed JSON at a fixed path.
pub struct FsHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FsHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "drift_history.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn ensure_dirs(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }

    fn write_staged(&self, body: &[u8]) -> io::Result<()> {
        self.ensure_dirs()?;
        let staging = self.staging_path();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&staging)?;
        file.write_all(body)?;
        file.sync_all()?;
        fs::rename(&staging, &self.path)
    }
}

impl HistoryRepo for FsHistoryStore {
    fn load(&self, features: &[&str]) -> DriftResult<DriftHistory> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no drift history yet, starting empty");
            return Ok(DriftHistory::empty(features.iter().copied()));
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|err| DriftError::persistence(&self.path, err.to_string()))?;
        let mut history: DriftHistory = serde_json::from_str(&raw)
            .map_err(|err| DriftError::persistence(&self.path, err.to_string()))?;

        let trimmed = history.reconcile();
        if !trimmed.is_empty() {
            warn!(?trimmed, "history series longer than timestamps were truncated");
        }
        history.ensure_features(features.iter().copied());

        info!(
            path = %self.path.display(),
            records = history.len(),
            "drift history loaded"
        );
        Ok(history)
    }

    fn save(&self, history: &DriftHistory) -> DriftResult<()> {
        let body = serde_json::to_vec_pretty(history)
            .map_err(|err| DriftError::persistence(&self.path, err.to_string()))?;

        let _guard = self.write_lock.lock();
        self.write_staged(&body)
            .map_err(|err| DriftError::persistence(&self.path, err.to_string()))?;

        debug!(path = %self.path.display(), records = history.len(), "drift history saved");
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_file_loads_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsHistoryStore::new(dir.path().join("nope.json"));
        let history = store.load(&["age", "income"]).unwrap();
        assert!(history.timestamps.is_empty());
        assert_eq!(history.drift_scores.len(), 2);
        assert!(history.drift_scores.values().all(Vec::is_empty));
    }

    #[test]
    fn save_creates_parents_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("history.json");
        let store = FsHistoryStore::new(&path);

        let mut history = DriftHistory::empty(["age"]);
        let mut scores = BTreeMap::new();
        scores.insert("age".to_string(), 0.12);
        history.append("2024-01-01T00:00:00.000000Z".to_string(), &scores);

        store.save(&history).unwrap();
        assert!(path.exists());
        assert!(!store.staging_path().exists());
        assert_eq!(store.load(&["age"]).unwrap(), history);
    }

    #[test]
    fn load_adds_new_features_and_keeps_the_old_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"{"timestamps": ["2024-01-01T00:00:00"], "drift_scores": {"legacy": [0.4]}}"#,
        )
        .unwrap();

        let history = FsHistoryStore::new(&path).load(&["age"]).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.drift_scores["legacy"], vec![0.4]);
        assert!(history.drift_scores["age"].is_empty());
    }

    #[test]
    fn malformed_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();
        let err = FsHistoryStore::new(&path).load(&["age"]).unwrap_err();
        assert!(matches!(err, DriftError::Persistence { .. }));
    }

    #[test]
    fn unwritable_target_is_reported_not_panicked() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the target path makes the rename fail.
        let path = dir.path().join("history.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let err = FsHistoryStore::new(&path)
            .save(&DriftHistory::default())
            .unwrap_err();
        assert!(matches!(err, DriftError::Persistence { .. }));
    }
}
