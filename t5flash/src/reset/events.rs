//! Structured diagnostics emitted by the orchestrator.

use std::time::Duration;

use log::{debug, info, warn};

use crate::platform::PlatformCategory;
use crate::port::Signals;
use crate::reset::StrategyId;
use crate::reset::history::FailureReason;
use crate::reset::orchestrator::{ExhaustReason, ResetState};

/// Something the orchestrator did or observed.
#[derive(Debug, Clone, PartialEq)]
pub enum ResetEvent {
    /// The state machine moved to a new state.
    StateChanged(ResetState),
    /// A reset sequence started with this fallback order.
    SequenceStarted {
        /// Platform the order was derived for.
        platform: PlatformCategory,
        /// Strategies in the order they will be tried.
        order: Vec<StrategyId>,
    },
    /// A strategy is about to run.
    StrategyStarted {
        /// Strategy id.
        strategy: StrategyId,
        /// One-based position in the fallback order.
        index: usize,
        /// Length of the fallback order.
        total: usize,
    },
    /// A strategy's steps were applied; the link-check comes next.
    SignalsApplied {
        /// Strategy id.
        strategy: StrategyId,
        /// Final signal change of the sequence.
        last: Signals,
        /// Time spent applying the steps.
        elapsed: Duration,
    },
    /// A strategy attempt failed.
    StrategyFailed {
        /// Strategy id.
        strategy: StrategyId,
        /// What went wrong.
        reason: FailureReason,
    },
    /// The chip answered the link-check.
    Succeeded {
        /// Winning strategy.
        strategy: StrategyId,
        /// Time from the start of the attempt to the passing link-check.
        duration: Duration,
    },
    /// Every strategy was tried, or the sequence was stopped.
    Exhausted {
        /// Why the sequence ended.
        reason: ExhaustReason,
        /// Attempts made in this sequence.
        attempts: usize,
    },
    /// An outer retry round failed and the next one is scheduled.
    RoundFailed {
        /// One-based round number.
        round: u32,
        /// Total rounds allowed.
        rounds: u32,
        /// Pause before the next round.
        backoff: Duration,
    },
    /// History and last-success memory were cleared.
    HistoryCleared,
}

/// Receives [`ResetEvent`]s.
pub trait EventSink {
    /// Handle one event.
    fn emit(&mut self, event: &ResetEvent);
}

impl<F: FnMut(&ResetEvent)> EventSink for F {
    fn emit(&mut self, event: &ResetEvent) {
        self(event)
    }
}

/// Sink that forwards every event to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: &ResetEvent) {
        match event {
            ResetEvent::StateChanged(state) => debug!("Reset state: {state}"),
            ResetEvent::SequenceStarted { platform, order } => {
                let names: Vec<&str> = order
                    .iter()
                    .map(StrategyId::name)
                    .collect();
                info!("Resetting for {platform}, order: {}", names.join(" → "));
            },
            ResetEvent::StrategyStarted {
                strategy,
                index,
                total,
            } => info!("Trying {strategy} ({index}/{total})"),
            ResetEvent::SignalsApplied {
                strategy,
                last,
                elapsed,
            } => debug!("{strategy}: signals applied in {elapsed:?}, final {last}"),
            ResetEvent::StrategyFailed { strategy, reason } => warn!("{strategy} failed: {reason}"),
            ResetEvent::Succeeded { strategy, duration } => {
                info!("Download mode entered via {strategy} in {duration:?}");
            },
            ResetEvent::Exhausted { reason, attempts } => {
                warn!("Reset sequence ended after {attempts} attempts: {reason}");
            },
            ResetEvent::RoundFailed {
                round,
                rounds,
                backoff,
            } => warn!("Round {round}/{rounds} failed, retrying in {backoff:?}"),
            ResetEvent::HistoryCleared => debug!("Reset history cleared"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |event: &ResetEvent| seen.push(event.clone());
            sink.emit(&ResetEvent::HistoryCleared);
            sink.emit(&ResetEvent::StateChanged(ResetState::Selecting));
        }
        assert_eq!(
            seen,
            vec![
                ResetEvent::HistoryCleared,
                ResetEvent::StateChanged(ResetState::Selecting)
            ]
        );
    }

    #[test]
    fn test_log_sink_accepts_every_event() {
        let mut sink = LogSink;
        sink.emit(&ResetEvent::SequenceStarted {
            platform: PlatformCategory::Linux,
            order: StrategyId::ALL.to_vec(),
        });
        sink.emit(&ResetEvent::StrategyFailed {
            strategy: StrategyId::Standard,
            reason: FailureReason::LinkCheckTimeout,
        });
        sink.emit(&ResetEvent::Exhausted {
            reason: ExhaustReason::Cancelled,
            attempts: 0,
        });
    }
}
