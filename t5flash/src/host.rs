//! Host-side utilities for serial port discovery.

use crate::device::{self, DetectedPort};

/// Discover all available serial ports.
#[must_use]
pub fn discover_ports() -> Vec<DetectedPort> {
    device::detect_ports()
}

/// Discover serial ports behind a recognised USB bridge.
#[must_use]
pub fn discover_t5ai_ports() -> Vec<DetectedPort> {
    device::detect_ports()
        .into_iter()
        .filter(DetectedPort::is_likely_t5ai)
        .collect()
}

/// Auto-detect a single best serial port candidate.
pub fn auto_detect_port() -> crate::Result<DetectedPort> {
    device::select_port(&device::detect_ports())
}
