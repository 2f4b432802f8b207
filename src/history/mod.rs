//! History domain: durable log of PSI scores across evaluation passes.
//!
//! The dashboard reads these types through the monitor's snapshots and never
//! writes them.

pub mod domain;
pub mod repo_fs;

pub use domain::{DriftHistory, HeatmapRow};
pub use repo_fs::{FsHistoryStore, HistoryRepo};
