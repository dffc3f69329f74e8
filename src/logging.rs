//! Logging setup
//!
//! Installs the tracing subscriber used by binaries embedding the access layer.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (e.g. `sheets_cache=info`) when it is unset or invalid.
///
/// Returns false if a global subscriber was already installed.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .is_ok()
}

/// Directive for this crate at `level`.
pub fn directive_for(level: &str) -> String {
    format!("{}={}", env!("CARGO_CRATE_NAME"), level)
}
