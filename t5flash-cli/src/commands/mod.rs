//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod link_check;
pub(crate) mod platform;
pub(crate) mod ports;
pub(crate) mod reset;
pub(crate) mod signal;
pub(crate) mod strategies;
pub(crate) mod test_strategy;

use {
    anyhow::{Context, Result},
    log::{debug, warn},
    std::{future::Future, time::Duration},
    t5flash::{NativePort, PlatformCategory, SerialConfig},
};

/// Milliseconds as an integer, for JSON output.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Run `future` to completion on a fresh single-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Open `name` at the closest baud rate the platform's drivers handle.
///
/// Must be called inside a runtime.
pub(crate) fn open_port(name: &str, requested: u32, platform: PlatformCategory) -> Result<NativePort> {
    let baud = platform.compatible_baud(requested);
    if baud != requested {
        warn!("{requested} baud is unreliable on {platform}, using {baud}");
    }

    let port = NativePort::open(&SerialConfig::new(name, baud))
        .with_context(|| format!("failed to open {name}"))?;
    debug!("Opened {name} at {baud} baud");
    Ok(port)
}
