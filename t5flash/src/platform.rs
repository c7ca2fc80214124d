//! Host platform classification and per-platform reset tuning.
//!
//! Serial drivers differ in how they propagate DTR/RTS changes: Linux
//! `ftdi_sio`/`ch341` drivers race when both lines change in one call, macOS
//! bridges often only honour DTR, and Windows behaves like the reference
//! tooling. Each [`PlatformCategory`] therefore carries its own
//! [`PlatformConfig`] with reset timings, link-check budget and the strategy
//! to try first.

use crate::error::{Error, Result};
use crate::reset::StrategyId;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Host platform category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PlatformCategory {
    /// Microsoft Windows.
    Windows,
    /// Linux (Ubuntu and friends).
    Linux,
    /// Apple macOS.
    #[cfg_attr(feature = "serde", serde(rename = "macos"))]
    MacOS,
    /// Anything else.
    #[default]
    Unknown,
}

impl PlatformCategory {
    /// All categories, in display order.
    pub const ALL: [Self; 4] = [Self::Windows, Self::Linux, Self::MacOS, Self::Unknown];

    /// Classify a runtime platform string and user agent.
    ///
    /// Windows wins over macOS, which wins over Linux, so an agent string
    /// that mentions several systems resolves the same way every time.
    /// "darwin" is macOS even though it contains "win".
    #[must_use]
    pub fn classify(raw_platform: &str, raw_user_agent: &str) -> Self {
        let platform = raw_platform.to_lowercase();
        let agent = raw_user_agent.to_lowercase();
        let darwin = platform.contains("darwin");

        if agent.contains("windows") || (platform.contains("win") && !darwin) {
            Self::Windows
        } else if agent.contains("mac") || platform.contains("mac") || darwin {
            Self::MacOS
        } else if agent.contains("linux") || platform.contains("linux") {
            Self::Linux
        } else {
            Self::Unknown
        }
    }

    /// Category of the platform this binary was compiled for.
    #[must_use]
    pub fn host() -> Self {
        Self::classify(std::env::consts::OS, "")
    }

    /// Short lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOS => "macos",
            Self::Unknown => "unknown",
        }
    }

    /// Static reset tuning for this platform.
    #[must_use]
    pub fn config(&self) -> PlatformConfig {
        PlatformConfig::for_platform(*self)
    }

    /// Troubleshooting guidance shown when every strategy failed.
    #[must_use]
    pub fn guidance(&self) -> Guidance {
        match self {
            Self::Linux => Guidance {
                reset_failed: "Reset failed on Linux. Check that:\n\
                    1. the USB cable is firmly connected\n\
                    2. your user is in the dialout group (sudo usermod -a -G dialout $USER)\n\
                    3. no other program holds the serial port\n\
                    4. a manual reset of the board brings it into download mode",
                troubleshooting: "If the problem persists:\n\
                    1. check membership with: groups $USER\n\
                    2. check device permissions: ls -l /dev/ttyUSB* /dev/ttyACM*\n\
                    3. inspect the kernel log: dmesg | tail -20\n\
                    4. try another cable or USB port",
            },
            Self::Windows => Guidance {
                reset_failed: "Reset failed on Windows. Check that:\n\
                    1. the USB-serial driver is installed\n\
                    2. Device Manager shows the port without warnings\n\
                    3. no other program holds the serial port\n\
                    4. re-plugging the board helps",
                troubleshooting: "If the problem persists:\n\
                    1. reinstall or update the USB-serial driver\n\
                    2. run the tool as administrator\n\
                    3. try another cable or USB port",
            },
            Self::MacOS => Guidance {
                reset_failed: "Reset failed on macOS. Check that:\n\
                    1. the program is allowed to access the serial port\n\
                    2. the USB cable is firmly connected\n\
                    3. no other program holds the serial port\n\
                    4. security settings do not block the device",
                troubleshooting: "If the problem persists:\n\
                    1. list USB devices: system_profiler SPUSBDataType\n\
                    2. try another cable or USB port\n\
                    3. check Console.app for driver errors",
            },
            Self::Unknown => Guidance {
                reset_failed: "Reset failed. Check that:\n\
                    1. the USB cable is connected\n\
                    2. the USB-serial driver works\n\
                    3. a manual reset brings the board into download mode",
                troubleshooting: "If the problem persists:\n\
                    1. reconnect the device\n\
                    2. check the system log\n\
                    3. try another USB port",
            },
        }
    }

    /// Map a requested baud rate to one the platform's drivers handle.
    ///
    /// Linux serial drivers have poor support for non-standard rates, so
    /// those fall back to 921600 there. Other platforms pass through.
    #[must_use]
    pub fn compatible_baud(&self, requested: u32) -> u32 {
        match self {
            Self::Linux => match requested {
                115_200 | 230_400 | 460_800 | 921_600 => requested,
                _ => 921_600,
            },
            _ => requested,
        }
    }
}

impl fmt::Display for PlatformCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "Windows"),
            Self::Linux => write!(f, "Linux"),
            Self::MacOS => write!(f, "macOS"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for PlatformCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "windows" | "win" => Ok(Self::Windows),
            "linux" | "ubuntu" => Ok(Self::Linux),
            "macos" | "mac" | "darwin" => Ok(Self::MacOS),
            "unknown" => Ok(Self::Unknown),
            other => Err(Error::Config(format!("unknown platform '{other}'"))),
        }
    }
}

/// Platform-specific troubleshooting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guidance {
    /// What to check first after a failed reset.
    pub reset_failed: &'static str,
    /// Further steps if the first checks did not help.
    pub troubleshooting: &'static str,
}

/// Reset tuning for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// How long the chip is held in reset.
    pub reset_hold: Duration,
    /// Settle time after releasing reset.
    pub recovery: Duration,
    /// Read deadline for one link-check exchange.
    pub link_check_timeout: Duration,
    /// Link-check exchanges per strategy.
    pub max_retries: u32,
    /// Strategy tried first when nothing has succeeded yet.
    pub preferred_strategy: StrategyId,
    /// Human-readable description.
    pub description: &'static str,
}

impl PlatformConfig {
    /// Static configuration for `platform`.
    #[must_use]
    pub fn for_platform(platform: PlatformCategory) -> Self {
        match platform {
            PlatformCategory::Windows => Self {
                reset_hold: Duration::from_millis(300),
                recovery: Duration::from_millis(4),
                link_check_timeout: Duration::from_millis(20),
                max_retries: 20,
                preferred_strategy: StrategyId::Standard,
                description: "Windows platform defaults",
            },
            PlatformCategory::Linux => Self {
                reset_hold: Duration::from_millis(500),
                recovery: Duration::from_millis(10),
                link_check_timeout: Duration::from_millis(30),
                max_retries: 30,
                preferred_strategy: StrategyId::Separated,
                description: "Linux defaults, tuned for Ubuntu serial drivers",
            },
            PlatformCategory::MacOS => Self {
                reset_hold: Duration::from_millis(300),
                recovery: Duration::from_millis(4),
                link_check_timeout: Duration::from_millis(20),
                max_retries: 20,
                preferred_strategy: StrategyId::DtrOnly,
                description: "macOS platform defaults",
            },
            PlatformCategory::Unknown => Self {
                reset_hold: Duration::from_millis(400),
                recovery: Duration::from_millis(8),
                link_check_timeout: Duration::from_millis(30),
                max_retries: 30,
                preferred_strategy: StrategyId::ExtendedTiming,
                description: "Conservative defaults for unknown platforms",
            },
        }
    }

    /// Set the reset hold duration.
    #[must_use]
    pub fn with_reset_hold(mut self, hold: Duration) -> Self {
        self.reset_hold = hold;
        self
    }

    /// Set the recovery duration.
    #[must_use]
    pub fn with_recovery(mut self, recovery: Duration) -> Self {
        self.recovery = recovery;
        self
    }

    /// Set the per-exchange link-check timeout.
    #[must_use]
    pub fn with_link_check_timeout(mut self, timeout: Duration) -> Self {
        self.link_check_timeout = timeout;
        self
    }

    /// Set the number of link-check exchanges per strategy.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the strategy tried first.
    #[must_use]
    pub fn with_preferred_strategy(mut self, strategy: StrategyId) -> Self {
        self.preferred_strategy = strategy;
        self
    }

    /// Check the configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if self.reset_hold.is_zero() {
            return Err(Error::Config("reset hold must be greater than zero".into()));
        }
        if self.recovery.is_zero() {
            return Err(Error::Config("recovery must be greater than zero".into()));
        }
        if self.link_check_timeout.is_zero() {
            return Err(Error::Config(
                "link-check timeout must be greater than zero".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(Error::Config("max retries must be greater than zero".into()));
        }
        Ok(())
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::for_platform(PlatformCategory::default())
    }
}
