//! # t5flash
//!
//! Host-side reset negotiation for T5AI Wi-Fi chips.
//!
//! Pulsing DTR/RTS to put a T5AI board into download mode behaves
//! differently on Windows, Linux and macOS serial drivers. This crate
//! provides:
//!
//! - A catalog of reset strategies described as data
//! - A per-platform fallback policy that remembers what worked
//! - An async executor with precise hold timing
//! - The T5AI link-check exchange that proves the chip is listening
//! - An orchestrator with bounded attempt history and statistics
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via `tokio-serial`
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for ids and platform categories
//!
//! ## Example
//!
//! ```rust,no_run
//! use t5flash::{NativePort, PlatformCategory, ResetOrchestrator, ResetOutcome};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut port = NativePort::open_simple("/dev/ttyUSB0", 115200)?;
//!     let mut orchestrator = ResetOrchestrator::new(PlatformCategory::host());
//!
//!     match orchestrator.reset_and_verify(&mut port, None).await {
//!         ResetOutcome::Succeeded { strategy, duration } => {
//!             println!("In download mode via {strategy} ({duration:?})");
//!         },
//!         ResetOutcome::Exhausted { guidance, .. } => {
//!             eprintln!("{}", guidance.reset_failed);
//!         },
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod device;
pub mod error;
pub mod host;
pub mod platform;
pub mod port;
pub mod protocol;
pub mod reset;

/// Cloneable stop flag checked between strategies and between steps.
///
/// Clones share the same flag, so a Ctrl-C handler can hold one clone while
/// the orchestrator holds another.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create a flag in the "running" state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the current operation to stop.
    pub fn stop(&self) {
        self.0
            .store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0
            .load(Ordering::SeqCst)
    }

    /// Clear a previous stop request.
    pub fn reset(&self) {
        self.0
            .store(false, Ordering::SeqCst);
    }
}

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    device::{DetectedPort, DeviceKind},
    error::{Error, Result},
    host::{auto_detect_port, discover_ports},
    platform::{Guidance, PlatformCategory, PlatformConfig},
    port::{Port, SerialConfig, Signals},
    protocol::link_check::{LINK_CHECK_COMMAND, LINK_CHECK_RESPONSE, LinkCheckError, LinkVerifier},
    reset::{
        AttemptRecord, ResetEvent, ResetOrchestrator, ResetOutcome, Statistics, StrategyCatalog,
        StrategyId,
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_default_running() {
        assert!(!StopSignal::new().is_stopped());
    }

    #[test]
    fn test_stop_signal_shared_between_clones() {
        let signal = StopSignal::new();
        let handler = signal.clone();

        handler.stop();
        assert!(signal.is_stopped());

        signal.reset();
        assert!(!handler.is_stopped());
    }
}
