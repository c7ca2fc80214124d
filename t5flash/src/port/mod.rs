//! Port abstraction for the reset engine.
//!
//! The reset engine only needs three things from a serial port: change the
//! DTR/RTS control lines, write bytes, and read bytes with a deadline. The
//! [`Port`] trait captures exactly that, so the engine can run against the
//! native `tokio-serial` stream or an in-memory script in tests.
//!
//! ```text
//! +---------------------------+
//! |   Reset Orchestrator      |
//! |  (executor, link-check)   |
//! +-------------+-------------+
//!               |
//!               v
//! +-------------+-------------+
//! |        Port Trait         |
//! +------+-------------+------+
//!        |             |
//!        v             v
//! +------+------+ +----+--------+
//! | NativePort  | |  MockPort   |
//! |(tokio-serial)| |  (tests)   |
//! +-------------+ +-------------+
//! ```
//!
//! ## Cooperative scheduling
//!
//! All operations are `async`. Hold durations and read deadlines are
//! suspension points, so a reset sequence never blocks the executor thread.
//! Implementations of [`Port::read_up_to`] must be cancel-safe: when the
//! deadline wins the race, no byte may be consumed from the transport.

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Requested DTR/RTS levels. `None` leaves the line unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signals {
    /// Data Terminal Ready.
    pub dtr: Option<bool>,
    /// Request To Send.
    pub rts: Option<bool>,
}

impl Signals {
    /// Change both lines at once.
    pub const fn both(dtr: bool, rts: bool) -> Self {
        Self {
            dtr: Some(dtr),
            rts: Some(rts),
        }
    }

    /// Change DTR only.
    pub const fn dtr(level: bool) -> Self {
        Self {
            dtr: Some(level),
            rts: None,
        }
    }

    /// Change RTS only.
    pub const fn rts(level: bool) -> Self {
        Self {
            dtr: None,
            rts: Some(level),
        }
    }

    /// Whether no line is touched.
    pub fn is_empty(&self) -> bool {
        self.dtr.is_none() && self.rts.is_none()
    }
}

impl fmt::Display for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.dtr, self.rts) {
            (Some(dtr), Some(rts)) => write!(f, "DTR={dtr}, RTS={rts}"),
            (Some(dtr), None) => write!(f, "DTR={dtr}"),
            (None, Some(rts)) => write!(f, "RTS={rts}"),
            (None, None) => write!(f, "(no change)"),
        }
    }
}

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Driver-level read/write timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Async serial port interface used by the reset engine.
///
/// Note: `async fn` is used without `Send` bounds so single-threaded
/// transports can implement the trait.
#[allow(async_fn_in_trait)]
pub trait Port {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Apply the requested DTR/RTS levels in a single call.
    async fn set_signals(&mut self, signals: Signals) -> Result<()>;

    /// Write all bytes and flush.
    async fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Read at most `max_len` bytes, waiting no longer than `timeout`.
    ///
    /// Returns an empty vector when the deadline passes with nothing to read.
    async fn read_up_to(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>>;
}

#[cfg(feature = "native")]
pub use native::NativePort;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_constructors() {
        assert_eq!(Signals::both(false, true), Signals { dtr: Some(false), rts: Some(true) });
        assert_eq!(Signals::dtr(true).rts, None);
        assert_eq!(Signals::rts(false).dtr, None);
        assert!(Signals::default().is_empty());
    }

    #[test]
    fn test_signals_display() {
        assert_eq!(Signals::both(false, true).to_string(), "DTR=false, RTS=true");
        assert_eq!(Signals::rts(false).to_string(), "RTS=false");
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyUSB0", 921600).with_timeout(Duration::from_secs(5));

        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 921600);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
