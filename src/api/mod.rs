//! Public entry points: the in-process monitor, its readiness handle and the C ABI.

pub mod ffi;
pub mod handle;
pub mod monitor;

pub use handle::{MonitorHandle, Readiness};
pub use monitor::DriftMonitor;
