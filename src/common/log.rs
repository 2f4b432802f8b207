//! Logging setup emitting JSON lines through `tracing`.
//!
//! Library code only uses the `tracing` macros. Hosts that already install a
//! subscriber can skip [`init`] entirely.

use tracing_subscriber::EnvFilter;

/// Install a JSON-lines subscriber filtered by `filter` (e.g. `"info"` or
/// `"driftguard=debug"`).
///
/// Returns `false` when a global subscriber was already installed, which is
/// not an error.
pub fn init(filter: &str) -> bool {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_current_span(false)
        .with_target(true)
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        let _ = init("warn");
        assert!(!init("not a valid [filter"));
    }
}
