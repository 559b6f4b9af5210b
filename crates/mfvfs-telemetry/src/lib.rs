//! Tracing setup for mfvfs.
//!
//! The kernel only emits `tracing` events; hosts decide where they go. This
//! crate holds the one subscriber recipe everything shares: an `EnvFilter`
//! read from `RUST_LOG` (falling back to a caller-supplied directive) and a
//! fmt layer on stderr.
//!
//! ```bash
//! # Default: info and up
//! my-host
//!
//! # Trace the auth lock, debug everything else
//! RUST_LOG=debug,mfvfs_kernel::auth=trace my-host
//! ```

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset and the caller passes nothing better.
pub const DEFAULT_FILTER: &str = "info";

/// Build the env filter, preferring `RUST_LOG` over `default_directive`.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the global subscriber for a host process.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(default_directive: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
}

/// Install a test-friendly subscriber (captured by the test harness).
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(env_filter("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_tracing_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
        tracing::debug!("still alive after double init");
    }

    #[test]
    fn test_second_global_init_fails() {
        init_test_tracing();
        assert!(init_tracing(DEFAULT_FILTER).is_err());
    }
}
