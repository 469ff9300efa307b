//! Tracing setup
//!
//! Repositories log through `tracing` macros. Applications that do not install their own
//! subscriber can call [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` (e.g. `Settings::log_directive`)
/// is used. Returns `false` if a global subscriber was already installed, which makes the
/// call safe to repeat from tests.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
