//! T5AI link-check exchange.
//!
//! The only command the reset engine sends. A chip sitting in its download
//! bootloader answers it with a fixed HCI-style event frame:
//!
//! ```text
//! command:  01 E0 FC 01 00
//! response: 04 0E 05 01 E0 FC 01 00
//! ```
//!
//! Each exchange first drains whatever is still in the input buffer, so a
//! late answer to an earlier exchange can never be mistaken for the answer
//! to this one.

use crate::StopSignal;
use crate::error::Error;
use crate::port::Port;
use log::{debug, trace};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Link-check command frame.
pub const LINK_CHECK_COMMAND: [u8; 5] = [0x01, 0xE0, 0xFC, 0x01, 0x00];

/// Expected link-check response frame.
pub const LINK_CHECK_RESPONSE: [u8; 8] = [0x04, 0x0E, 0x05, 0x01, 0xE0, 0xFC, 0x01, 0x00];

/// Upper bound on time spent draining stale input before a send.
pub const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_millis(50);

/// Input is considered idle after this long without a byte.
const DRAIN_IDLE: Duration = Duration::from_millis(5);

/// Read size while draining.
const DRAIN_CHUNK: usize = 256;

/// Whether `data` starts with the exact link-check response.
pub fn is_link_check_response(data: &[u8]) -> bool {
    data.starts_with(&LINK_CHECK_RESPONSE)
}

/// Why a link-check did not pass.
#[derive(Debug, Error)]
pub enum LinkCheckError {
    /// Fewer than eight bytes arrived before the deadline.
    #[error("link-check timed out ({} of 8 bytes received)", received.len())]
    Timeout {
        /// Bytes that did arrive.
        received: Vec<u8>,
    },

    /// Eight bytes arrived but they are not the expected response.
    #[error("link-check response mismatch: {}", hex(received))]
    Mismatch {
        /// Bytes that arrived.
        received: Vec<u8>,
    },

    /// The port failed during the exchange.
    #[error("link-check port error: {0}")]
    Port(#[source] Error),

    /// A stop was requested between exchanges.
    #[error("link-check cancelled")]
    Cancelled,
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sends link-check commands and matches the response.
#[derive(Debug, Clone)]
pub struct LinkVerifier {
    drain_window: Duration,
    stop: StopSignal,
}

impl Default for LinkVerifier {
    fn default() -> Self {
        Self {
            drain_window: DEFAULT_DRAIN_WINDOW,
            stop: StopSignal::new(),
        }
    }
}

impl LinkVerifier {
    /// Create a verifier with the default drain window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum time spent draining stale input.
    #[must_use]
    pub fn with_drain_window(mut self, window: Duration) -> Self {
        self.drain_window = window;
        self
    }

    /// Share a stop flag, checked before every exchange.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Run up to `max_attempts` exchanges; `true` on the first exact match.
    pub async fn verify<P: Port>(
        &self,
        port: &mut P,
        timeout_per_attempt: Duration,
        max_attempts: u32,
    ) -> bool {
        self.run(port, timeout_per_attempt, max_attempts)
            .await
            .is_ok()
    }

    /// Like [`verify`](Self::verify), reporting the winning attempt number
    /// or the last failure.
    ///
    /// At least one exchange is always made, even for `max_attempts == 0`.
    pub async fn run<P: Port>(
        &self,
        port: &mut P,
        timeout_per_attempt: Duration,
        max_attempts: u32,
    ) -> Result<u32, LinkCheckError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if self.stop.is_stopped() {
                return Err(LinkCheckError::Cancelled);
            }

            match self.check_once(port, timeout_per_attempt).await {
                Ok(()) => {
                    debug!("Link-check passed on attempt {attempt}/{max_attempts}");
                    return Ok(attempt);
                },
                Err(e) if attempt >= max_attempts => {
                    debug!("Link-check failed after {max_attempts} attempts: {e}");
                    return Err(e);
                },
                Err(e) => trace!("Link-check attempt {attempt}/{max_attempts}: {e}"),
            }
            attempt += 1;
        }
    }

    /// A single drain, send, read and compare.
    pub async fn check_once<P: Port>(
        &self,
        port: &mut P,
        timeout: Duration,
    ) -> Result<(), LinkCheckError> {
        self.drain(port).await;

        port.write_bytes(&LINK_CHECK_COMMAND)
            .await
            .map_err(LinkCheckError::Port)?;

        let deadline = Instant::now() + timeout;
        let mut received = Vec::with_capacity(LINK_CHECK_RESPONSE.len());

        while received.len() < LINK_CHECK_RESPONSE.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let chunk = port
                .read_up_to(LINK_CHECK_RESPONSE.len() - received.len(), deadline - now)
                .await
                .map_err(LinkCheckError::Port)?;
            if chunk.is_empty() {
                break;
            }
            received.extend_from_slice(&chunk);
        }

        if is_link_check_response(&received) {
            Ok(())
        } else if received.len() < LINK_CHECK_RESPONSE.len() {
            Err(LinkCheckError::Timeout { received })
        } else {
            Err(LinkCheckError::Mismatch { received })
        }
    }

    /// Discard buffered input until the line goes idle or the drain window
    /// closes. Returns the number of bytes discarded.
    pub async fn drain<P: Port>(&self, port: &mut P) -> usize {
        let start = Instant::now();
        let mut discarded = 0;

        while start.elapsed() < self.drain_window {
            match port
                .read_up_to(DRAIN_CHUNK, DRAIN_IDLE)
                .await
            {
                Ok(bytes) if bytes.is_empty() => break,
                Ok(bytes) => discarded += bytes.len(),
                Err(e) => {
                    debug!("Drain stopped on read error: {e}");
                    break;
                },
            }
        }

        if discarded > 0 {
            trace!("Drained {discarded} stale bytes");
        }
        discarded
    }
}
