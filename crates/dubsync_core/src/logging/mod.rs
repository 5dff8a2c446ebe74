//! Logging setup.
//!
//! The library only emits `tracing` events. Binaries and tests install a
//! subscriber with `init_tracing`.

mod types;

pub use types::LogLevel;

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// - Respects the RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Writes to stderr, tagging events with the probe worker thread name
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_level: LogLevel) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .with(filter)
        .try_init()
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_can_be_called_twice() {
        init_test_tracing();
        init_test_tracing();
        tracing::warn!("still logging");
    }
}
