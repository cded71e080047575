//! Shared `tracing` setup for the `[[bin]]` front-ends.
//!
//! The teacher has no logging crate; this is grounded on
//! `superhawk610-rusty-git`, the only other pack-domain example repo in
//! the pack that instruments itself, which wires up `tracing` +
//! `tracing-subscriber` from `main`.

use tracing_subscriber::EnvFilter;

/// Installs a line-oriented subscriber reading `RUST_LOG`, defaulting to
/// `info` when unset. Call once from each binary's `main`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
