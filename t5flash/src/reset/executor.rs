//! Runs one strategy against a port.

use std::time::Duration;

use log::trace;
use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::StopSignal;
use crate::error::Error;
use crate::port::{Port, Signals};
use crate::reset::StrategyDefinition;

/// Why a strategy could not be run to completion.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The port rejected a signal change.
    #[error("step {step} ({signals}) failed: {source}")]
    SignalFailed {
        /// Zero-based index of the failing step.
        step: usize,
        /// The change that was rejected.
        signals: Signals,
        /// Port error.
        #[source]
        source: Error,
    },

    /// A stop was requested between steps.
    #[error("cancelled before step {step}")]
    Cancelled {
        /// Zero-based index of the step that was not started.
        step: usize,
    },
}

/// Apply every step of `strategy` in order and return the elapsed time.
///
/// Each step issues exactly one `set_signals` call. A rejected call ends the
/// strategy immediately; there is no retry at this level.
pub async fn execute<P: Port>(
    port: &mut P,
    strategy: &StrategyDefinition,
    stop: &StopSignal,
) -> Result<Duration, ExecError> {
    let start = Instant::now();

    for (step, action) in strategy
        .steps
        .iter()
        .enumerate()
    {
        if stop.is_stopped() {
            return Err(ExecError::Cancelled { step });
        }

        let signals = action.signals();
        trace!("{}: step {step} {signals}, hold {:?}", strategy.id, action.hold);

        port.set_signals(signals)
            .await
            .map_err(|source| ExecError::SignalFailed {
                step,
                signals,
                source,
            })?;

        sleep(action.hold).await;
    }

    Ok(start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformCategory;
    use crate::port::mock::MockPort;
    use crate::reset::{StrategyCatalog, StrategyId};

    fn definition(id: StrategyId) -> StrategyDefinition {
        StrategyCatalog::for_config(&PlatformCategory::Linux.config())
            .get(id)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_applies_steps_in_order() {
        let mut port = MockPort::new();
        let def = definition(StrategyId::Separated);

        execute(&mut port, &def, &StopSignal::new())
            .await
            .unwrap();

        let expected: Vec<Signals> = def
            .steps
            .iter()
            .map(|s| s.signals())
            .collect();
        assert_eq!(port.signal_calls, expected);
        assert!(port.writes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_covers_total_hold() {
        let mut port = MockPort::new();
        let def = definition(StrategyId::ExtendedTiming);

        let elapsed = execute(&mut port, &def, &StopSignal::new())
            .await
            .unwrap();
        assert!(elapsed >= def.total_hold());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_failure_is_not_retried() {
        let mut port = MockPort::new();
        port.fail_signal_call(1);

        let err = execute(&mut port, &definition(StrategyId::Standard), &StopSignal::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::SignalFailed { step: 0, .. }));
        assert_eq!(port.signal_calls.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_on_later_step_reports_index() {
        let mut port = MockPort::new();
        port.fail_signal_call(3);

        let err = execute(&mut port, &definition(StrategyId::Separated), &StopSignal::new())
            .await
            .unwrap_err();

        match err {
            ExecError::SignalFailed { step, signals, .. } => {
                assert_eq!(step, 2);
                assert_eq!(signals, Signals::rts(false));
            },
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(port.signal_calls.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_step() {
        let stop = StopSignal::new();
        stop.stop();
        let mut port = MockPort::new();

        let err = execute(&mut port, &definition(StrategyId::DtrOnly), &stop)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Cancelled { step: 0 }));
        assert!(port.signal_calls.is_empty());
    }
}
