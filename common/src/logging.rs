//! Structured logging bootstrap shared by the server binary and its subsystems.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global tracing subscriber driven by `RUST_LOG` (default: `info`).
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));

    // `try_init` so a second call in tests doesn't panic.
    let _ = registry.try_init();
}
