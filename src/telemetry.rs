//! Tracing bootstrap for binaries and tests embedding goalgraph.

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber with env-filter and span-trace capture.
///
/// Respects `RUST_LOG`; falls back to `info,goalgraph=info`. Safe to call
/// more than once; subsequent calls are no-ops.
pub fn init() {
    let fmt_layer = fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,goalgraph=info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init();
}
