//! Reset-strategy negotiation.
//!
//! Getting a T5AI chip into download mode means pulsing its reset and boot
//! pins through the DTR/RTS lines of a USB-UART bridge. Which pulse pattern
//! actually reaches the pins depends on the host OS and the bridge driver,
//! so the engine tries a fixed set of strategies in a platform-tuned order
//! and confirms each one with a link-check before calling it a success.
//!
//! ```text
//! selector ──► executor ──► link-check ──► Succeeded
//!    ▲             │              │
//!    └─────────────┴── failure ◄──┘        (list empty ► Exhausted)
//! ```
//!
//! - [`catalog`]: the strategies as data
//! - [`selector`]: fallback order per platform
//! - [`executor`]: runs one strategy against a [`Port`](crate::port::Port)
//! - [`history`]: bounded attempt history and statistics
//! - [`events`]: structured diagnostics sink
//! - [`orchestrator`]: the state machine tying them together

pub mod catalog;
pub mod events;
pub mod executor;
pub mod history;
pub mod orchestrator;
pub mod selector;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub use {
    catalog::{SignalStep, StrategyCatalog, StrategyDefinition},
    events::{EventSink, LogSink, ResetEvent},
    executor::{ExecError, execute},
    history::{AttemptHistory, AttemptOutcome, AttemptRecord, FailureReason, Statistics, StrategyTally},
    orchestrator::{
        Diagnostics, ExhaustReason, ResetOrchestrator, ResetOutcome, ResetState,
    },
    selector::{fallback_order, order},
};

/// Named reset procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StrategyId {
    /// DTR low + RTS high together, then release RTS.
    Standard,
    /// DTR and RTS changed one at a time with settle gaps.
    Separated,
    /// Pulse DTR only.
    DtrOnly,
    /// Pulse RTS only.
    RtsOnly,
    /// Standard shape with longer holds for slow bridges.
    ExtendedTiming,
}

impl StrategyId {
    /// Every strategy in canonical catalog order.
    pub const ALL: [Self; 5] = [
        Self::Standard,
        Self::Separated,
        Self::DtrOnly,
        Self::RtsOnly,
        Self::ExtendedTiming,
    ];

    /// Stable snake_case name, as accepted by [`FromStr`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Separated => "separated",
            Self::DtrOnly => "dtr_only",
            Self::RtsOnly => "rts_only",
            Self::ExtendedTiming => "extended_timing",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "standard" | "original" => Ok(Self::Standard),
            "separated" | "esp32" => Ok(Self::Separated),
            "dtr_only" | "dtr" => Ok(Self::DtrOnly),
            "rts_only" | "rts" => Ok(Self::RtsOnly),
            "extended_timing" | "extended" => Ok(Self::ExtendedTiming),
            other => Err(Error::Config(format!("unknown reset strategy '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names_roundtrip() {
        for id in StrategyId::ALL {
            assert_eq!(id.name().parse::<StrategyId>().unwrap(), id);
        }
    }

    #[test]
    fn test_strategy_aliases() {
        assert_eq!("original".parse::<StrategyId>().unwrap(), StrategyId::Standard);
        assert_eq!("esp32".parse::<StrategyId>().unwrap(), StrategyId::Separated);
        assert_eq!("Extended-Timing".parse::<StrategyId>().unwrap(), StrategyId::ExtendedTiming);
        assert!("bogus".parse::<StrategyId>().is_err());
    }
}
