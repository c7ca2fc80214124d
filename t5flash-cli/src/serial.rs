//! Serial port selection.
//!
//! Resolution order: `--port` / `T5FLASH_PORT`, then `[port] serial` from the
//! configuration, then auto-detection. Selection never prompts, so the same
//! command line behaves identically in a terminal and in CI.

use {
    crate::{CliError, config::Config},
    anyhow::Result,
    log::{debug, info, warn},
    t5flash::{DetectedPort, device::select_port, discover_ports},
};

/// Result of port selection.
#[derive(Debug, Clone)]
pub struct SelectedPort {
    /// The selected port info.
    pub port: DetectedPort,
    /// Whether the port sits behind a recognised USB bridge.
    pub is_known: bool,
}

impl SelectedPort {
    fn new(port: DetectedPort) -> Self {
        Self {
            is_known: port
                .device
                .is_known(),
            port,
        }
    }

    /// Port name to open, warning when no USB-UART bridge was recognised.
    pub fn checked_name(self) -> String {
        if !self.is_known {
            warn!(
                "{} is not a recognised USB-UART bridge; DTR/RTS may not reach the chip",
                self.port.name
            );
        }
        self.port.name
    }
}

/// Pick the port to reset.
pub fn select_serial_port(explicit: Option<&str>, config: &Config) -> Result<SelectedPort> {
    choose_port(explicit, config.port.serial.as_deref(), discover_ports())
}

fn choose_port(
    explicit: Option<&str>,
    configured: Option<&str>,
    ports: Vec<DetectedPort>,
) -> Result<SelectedPort> {
    if let Some(name) = explicit {
        return Ok(find_port_by_name(name, &ports));
    }

    if let Some(name) = configured {
        debug!("Using port from config: {name}");
        return Ok(find_port_by_name(name, &ports));
    }

    if ports.is_empty() {
        return Err(CliError::Usage(
            "no serial ports found; connect the board or pass --port".to_string(),
        )
        .into());
    }

    let port = select_port(&ports)?;
    info!("Auto-selected port: {} [{}]", port.name, port.device.name());
    Ok(SelectedPort::new(port))
}

/// Match `name` against the detected ports, keeping USB metadata when found.
fn find_port_by_name(name: &str, ports: &[DetectedPort]) -> SelectedPort {
    let found = ports
        .iter()
        .find(|p| p.name == name)
        .or_else(|| {
            ports
                .iter()
                .find(|p| {
                    p.name
                        .eq_ignore_ascii_case(name)
                })
        });

    match found {
        Some(port) => SelectedPort::new(port.clone()),
        // Explicitly requested but not enumerated (e.g. a pty); use as given.
        None => SelectedPort::new(DetectedPort::plain(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use t5flash::DeviceKind;

    fn ch340(name: &str) -> DetectedPort {
        DetectedPort {
            device: DeviceKind::Ch340,
            vid: Some(0x1A86),
            pid: Some(0x7523),
            ..DetectedPort::plain(name)
        }
    }

    #[test]
    fn test_explicit_port_wins() {
        let selected = choose_port(
            Some("/dev/ttyUSB9"),
            Some("/dev/ttyUSB1"),
            vec![ch340("/dev/ttyUSB0")],
        )
        .unwrap();
        assert_eq!(selected.port.name, "/dev/ttyUSB9");
        assert!(!selected.is_known);
    }

    #[test]
    fn test_configured_port_keeps_metadata() {
        let selected = choose_port(None, Some("COM3"), vec![ch340("com3")]).unwrap();
        assert_eq!(selected.port.name, "com3");
        assert!(selected.is_known);
    }

    #[test]
    fn test_auto_selects_known_bridge() {
        let ports = vec![DetectedPort::plain("/dev/ttyS0"), ch340("/dev/ttyUSB0")];
        let selected = choose_port(None, None, ports).unwrap();
        assert_eq!(selected.port.name, "/dev/ttyUSB0");
    }

    #[test]
    fn test_checked_name_keeps_name() {
        let known = choose_port(None, None, vec![ch340("/dev/ttyUSB0")]).unwrap();
        assert_eq!(known.checked_name(), "/dev/ttyUSB0");

        let unknown = choose_port(Some("/dev/pts/3"), None, Vec::new()).unwrap();
        assert!(!unknown.is_known);
        assert_eq!(unknown.checked_name(), "/dev/pts/3");
    }

    #[test]
    fn test_no_ports_is_usage_error() {
        let err = choose_port(None, None, Vec::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Usage(_))
        ));
    }
}
