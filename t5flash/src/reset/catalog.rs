//! The fixed set of reset strategies, described as data.
//!
//! On T5AI boards RTS drives the chip's reset line and DTR the boot
//! strap, both inverted by the bridge. A strategy is a list of
//! [`SignalStep`]s; the executor applies each one and then waits its hold
//! time.
//!
//! | Strategy         | Steps                                                  |
//! |------------------|--------------------------------------------------------|
//! | `standard`       | DTR=0 RTS=1 (hold) → RTS=0 (recovery)                  |
//! | `separated`      | DTR=0 (100ms) → RTS=1 (hold) → RTS=0 (100ms) → DTR=1   |
//! | `dtr_only`       | DTR=0 (hold) → DTR=1 (100ms)                           |
//! | `rts_only`       | RTS=1 (hold) → RTS=0 (100ms)                           |
//! | `extended_timing`| like `standard`, with 2× hold and ≥100ms recovery      |
//!
//! The extended hold never drops below the whole separated sequence, so
//! `extended_timing` stays the slowest strategy even for short overridden
//! holds.

use std::time::Duration;

use crate::platform::PlatformConfig;
use crate::port::Signals;
use crate::reset::StrategyId;

/// Gap used around isolated DTR/RTS changes.
const SETTLE_GAP: Duration = Duration::from_millis(100);

/// Shortest tail hold in the separated sequence.
const MIN_SEPARATED_TAIL: Duration = Duration::from_millis(10);

/// Shortest recovery in the extended sequence.
const MIN_EXTENDED_RECOVERY: Duration = Duration::from_millis(100);

/// One signal change followed by a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalStep {
    /// DTR level, `None` to leave unchanged.
    pub dtr: Option<bool>,
    /// RTS level, `None` to leave unchanged.
    pub rts: Option<bool>,
    /// Wait after applying the change.
    pub hold: Duration,
}

impl SignalStep {
    /// Build a step from signal levels and a hold time.
    pub const fn new(signals: Signals, hold: Duration) -> Self {
        Self {
            dtr: signals.dtr,
            rts: signals.rts,
            hold,
        }
    }

    /// The signal change this step applies.
    pub const fn signals(&self) -> Signals {
        Signals {
            dtr: self.dtr,
            rts: self.rts,
        }
    }
}

/// A named strategy and its steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyDefinition {
    /// Strategy id.
    pub id: StrategyId,
    /// Short human-readable description.
    pub description: &'static str,
    /// Steps, applied in order.
    pub steps: Vec<SignalStep>,
}

impl StrategyDefinition {
    /// Sum of all hold times.
    pub fn total_hold(&self) -> Duration {
        self.steps
            .iter()
            .map(|s| s.hold)
            .sum()
    }
}

/// Strategy lookup, parameterised by the reset and recovery holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyCatalog {
    reset_hold: Duration,
    recovery: Duration,
}

impl StrategyCatalog {
    /// Catalog using explicit reset and recovery holds.
    pub const fn new(reset_hold: Duration, recovery: Duration) -> Self {
        Self {
            reset_hold,
            recovery,
        }
    }

    /// Catalog using a platform's timings.
    pub fn for_config(config: &PlatformConfig) -> Self {
        Self::new(config.reset_hold, config.recovery)
    }

    /// All strategy ids in canonical order.
    pub fn all_ids(&self) -> Vec<StrategyId> {
        StrategyId::ALL.to_vec()
    }

    /// Look up a strategy definition.
    ///
    /// Every [`StrategyId`] is present, so this returns `Some` for all ids;
    /// the `Option` keeps the lookup contract open for narrower catalogs.
    pub fn get(&self, id: StrategyId) -> Option<StrategyDefinition> {
        let hold = self.reset_hold;
        let recovery = self.recovery;

        let (description, steps) = match id {
            StrategyId::Standard => (
                "Combined DTR+RTS control (Windows preferred)",
                vec![
                    SignalStep::new(Signals::both(false, true), hold),
                    SignalStep::new(Signals::rts(false), recovery),
                ],
            ),
            StrategyId::Separated => (
                "Separated DTR/RTS control (Linux compatible)",
                vec![
                    SignalStep::new(Signals::dtr(false), SETTLE_GAP),
                    SignalStep::new(Signals::rts(true), hold),
                    SignalStep::new(Signals::rts(false), SETTLE_GAP),
                    SignalStep::new(Signals::dtr(true), self.separated_tail()),
                ],
            ),
            StrategyId::DtrOnly => (
                "DTR-only control (macOS compatible)",
                vec![
                    SignalStep::new(Signals::dtr(false), hold),
                    SignalStep::new(Signals::dtr(true), SETTLE_GAP),
                ],
            ),
            StrategyId::RtsOnly => (
                "RTS-only control (special hardware)",
                vec![
                    SignalStep::new(Signals::rts(true), hold),
                    SignalStep::new(Signals::rts(false), SETTLE_GAP),
                ],
            ),
            StrategyId::ExtendedTiming => (
                "Extended timing for slow USB-UART bridges",
                vec![
                    SignalStep::new(Signals::both(false, true), self.extended_hold()),
                    SignalStep::new(
                        Signals::rts(false),
                        (recovery * 3).max(MIN_EXTENDED_RECOVERY),
                    ),
                ],
            ),
        };

        Some(StrategyDefinition {
            id,
            description,
            steps,
        })
    }

    fn separated_tail(&self) -> Duration {
        self.recovery
            .max(MIN_SEPARATED_TAIL)
    }

    /// Twice the reset hold, but at least the full separated sequence.
    fn extended_hold(&self) -> Duration {
        let separated = SETTLE_GAP * 2 + self.reset_hold + self.separated_tail();
        (self.reset_hold * 2).max(separated)
    }
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        Self::for_config(&PlatformConfig::default())
    }
}
