//! Serial port discovery and USB bridge classification.
//!
//! T5AI development boards expose their UART through a USB bridge chip.
//! Knowing the bridge helps pick the right port when several are present,
//! and it is the first thing worth reporting when a reset goes wrong.

use crate::error::{Error, Result};

#[cfg(feature = "native")]
use log::{debug, trace};
use log::info;

/// USB-UART bridge family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeviceKind {
    /// WCH CH340/CH341/CH343, fitted on most T5AI boards.
    Ch340,
    /// Silicon Labs CP210x.
    Cp210x,
    /// FTDI FT232/FT2232/FT4232.
    Ftdi,
    /// Prolific PL2303.
    Prolific,
    /// Not a USB port, or an unrecognised bridge.
    Unknown,
}

/// Known VID and PIDs per bridge family. An empty PID list matches any PID.
const KNOWN_BRIDGES: &[(u16, &[u16], DeviceKind)] = &[
    (
        0x1A86,
        &[0x7523, 0x7522, 0x5523, 0x55D3, 0x55D4],
        DeviceKind::Ch340,
    ),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71], DeviceKind::Cp210x),
    (0x0403, &[], DeviceKind::Ftdi),
    (0x067B, &[0x2303, 0x23A3, 0x23C3], DeviceKind::Prolific),
];

impl DeviceKind {
    /// Classify a USB VID/PID pair.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        KNOWN_BRIDGES
            .iter()
            .find(|(known_vid, pids, _)| vid == *known_vid && (pids.is_empty() || pids.contains(&pid)))
            .map_or(Self::Unknown, |(_, _, kind)| *kind)
    }

    /// Human-readable bridge name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ch340 => "CH340/CH343",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Prolific => "PL2303",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the bridge is recognised.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Auto-selection rank; lower is tried first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Ch340 => 0,
            Self::Cp210x => 1,
            Self::Ftdi | Self::Prolific => 2,
            Self::Unknown => 3,
        }
    }
}

/// A serial port found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// Bridge family.
    pub device: DeviceKind,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
}

impl DetectedPort {
    /// A port with no USB metadata.
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: DeviceKind::Unknown,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Whether a T5AI board is plausibly behind this port.
    pub fn is_likely_t5ai(&self) -> bool {
        self.device
            .is_known()
    }

    /// One-line summary for listings.
    pub fn describe(&self) -> String {
        let mut line = self.name.clone();
        if self.device.is_known() {
            line.push_str(&format!(" [{}]", self.device.name()));
        } else if let (Some(vid), Some(pid)) = (self.vid, self.pid) {
            line.push_str(&format!(" [VID:{vid:04X} PID:{pid:04X}]"));
        }
        if let Some(product) = &self.product {
            line.push_str(&format!(" - {product}"));
        }
        line
    }
}

/// Enumerate serial ports with bridge classification.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<DetectedPort> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            return Vec::new();
        },
    };

    ports
        .into_iter()
        .map(|info| match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                let device = DeviceKind::from_vid_pid(usb.vid, usb.pid);
                trace!(
                    "Found USB port: {} (VID: {:04X}, PID: {:04X}, {})",
                    info.port_name,
                    usb.vid,
                    usb.pid,
                    device.name()
                );
                DetectedPort {
                    name: info.port_name,
                    device,
                    vid: Some(usb.vid),
                    pid: Some(usb.pid),
                    manufacturer: usb.manufacturer,
                    product: usb.product,
                }
            },
            _ => DetectedPort::plain(info.port_name),
        })
        .collect()
}

/// Enumerate serial ports (no native serial support compiled in).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<DetectedPort> {
    Vec::new()
}

/// Pick the most likely T5AI port from `ports`.
///
/// Recognised bridges win over unknown ones, CH340 first; ties keep the
/// enumeration order. Falls back to the first port when none is recognised.
pub fn select_port(ports: &[DetectedPort]) -> Result<DetectedPort> {
    let best = ports
        .iter()
        .enumerate()
        .min_by_key(|(i, p)| (p.device.rank(), *i))
        .map(|(_, p)| p.clone())
        .ok_or(Error::DeviceNotFound)?;

    if best.device.is_known() {
        info!("Auto-detected {} bridge: {}", best.device.name(), best.name);
    } else {
        info!("Using first available port: {}", best.name);
    }
    Ok(best)
}
