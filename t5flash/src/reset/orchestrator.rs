//! Reset state machine.
//!
//! ```text
//! Idle → Selecting → Executing(s) → Verifying(s) → Succeeded(s)
//!           ▲            │               │
//!           └── failure ◄┴───────────────┘   (none left → Exhausted)
//! ```

use std::fmt;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::{Instant, sleep};

use crate::StopSignal;
use crate::platform::{Guidance, PlatformCategory, PlatformConfig};
use crate::port::{Port, Signals};
use crate::protocol::link_check::LinkVerifier;
use crate::reset::events::{EventSink, LogSink, ResetEvent};
use crate::reset::history::{
    AttemptHistory, AttemptOutcome, AttemptRecord, FailureReason, Statistics,
};
use crate::reset::{StrategyCatalog, StrategyDefinition, StrategyId, executor, selector};

/// Cap on the pause between outer retry rounds.
const MAX_ROUND_BACKOFF: Duration = Duration::from_millis(500);

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetState {
    /// No sequence has run yet, or history was cleared.
    #[default]
    Idle,
    /// Computing the fallback order.
    Selecting,
    /// Applying a strategy's signal steps.
    Executing(StrategyId),
    /// Waiting for the link-check after a strategy.
    Verifying(StrategyId),
    /// The last sequence ended in download mode.
    Succeeded(StrategyId),
    /// The last sequence ran out of strategies or was stopped.
    Exhausted,
}

impl fmt::Display for ResetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Selecting => write!(f, "selecting"),
            Self::Executing(id) => write!(f, "executing {id}"),
            Self::Verifying(id) => write!(f, "verifying {id}"),
            Self::Succeeded(id) => write!(f, "succeeded with {id}"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Why a sequence ended without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExhaustReason {
    /// Every strategy was tried and failed.
    AllStrategiesFailed,
    /// The stop signal was raised.
    Cancelled,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllStrategiesFailed => write!(f, "all reset strategies failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of [`ResetOrchestrator::reset_and_verify`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResetOutcome {
    /// The chip answered the link-check.
    Succeeded {
        /// Winning strategy.
        strategy: StrategyId,
        /// Duration of the winning attempt.
        duration: Duration,
    },
    /// No strategy got the chip into download mode.
    Exhausted {
        /// Attempts of this sequence, in the order they were made.
        attempts: Vec<AttemptRecord>,
        /// Why the sequence ended.
        reason: ExhaustReason,
        /// Platform the sequence ran for.
        platform: PlatformCategory,
        /// What the user should check next.
        guidance: Guidance,
    },
}

impl ResetOutcome {
    /// Whether the chip is in download mode.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// The winning strategy, if any.
    pub fn strategy(&self) -> Option<StrategyId> {
        match self {
            Self::Succeeded { strategy, .. } => Some(*strategy),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Snapshot of everything the orchestrator knows.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Platform category.
    pub platform: PlatformCategory,
    /// Tuning in effect.
    pub config: PlatformConfig,
    /// Current state.
    pub state: ResetState,
    /// Strategy that last got the chip into download mode.
    pub last_successful: Option<StrategyId>,
    /// Aggregate figures.
    pub statistics: Statistics,
    /// Retained attempts, oldest first.
    pub history: Vec<AttemptRecord>,
}

/// Pause after failed outer round `round` (one-based).
pub fn round_backoff(round: u32) -> Duration {
    Duration::from_millis(100 + 10 * u64::from(round)).min(MAX_ROUND_BACKOFF)
}

/// Drives the reset negotiation for one device connection.
///
/// The orchestrator owns the platform tuning, the attempt history and the
/// last-success memory. The port is lent to it per call.
pub struct ResetOrchestrator {
    platform: PlatformCategory,
    config: PlatformConfig,
    catalog: StrategyCatalog,
    verifier: LinkVerifier,
    history: AttemptHistory,
    last_successful: Option<StrategyId>,
    state: ResetState,
    invocations: u64,
    successful_invocations: u64,
    stop: StopSignal,
    sink: Box<dyn EventSink + Send>,
}

impl fmt::Debug for ResetOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetOrchestrator")
            .field("platform", &self.platform)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("last_successful", &self.last_successful)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl ResetOrchestrator {
    /// Orchestrator using the built-in tuning for `platform`.
    pub fn new(platform: PlatformCategory) -> Self {
        let config = platform.config();
        Self {
            platform,
            catalog: StrategyCatalog::for_config(&config),
            config,
            verifier: LinkVerifier::new(),
            history: AttemptHistory::new(),
            last_successful: None,
            state: ResetState::Idle,
            invocations: 0,
            successful_invocations: 0,
            stop: StopSignal::new(),
            sink: Box::new(LogSink),
        }
    }

    /// Replace the tuning.
    ///
    /// A `max_retries` of zero still gets one link-check per strategy.
    #[must_use]
    pub fn with_config(mut self, config: PlatformConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!("Reset tuning out of range: {e}");
        }
        self.catalog = StrategyCatalog::for_config(&config);
        self.config = config;
        self
    }

    /// Send events to `sink` instead of the log.
    #[must_use]
    pub fn with_sink(mut self, sink: impl EventSink + Send + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Share a stop flag, checked between strategies, steps and exchanges.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.verifier = self
            .verifier
            .with_stop_signal(stop.clone());
        self.stop = stop;
        self
    }

    /// Platform category.
    pub fn platform(&self) -> PlatformCategory {
        self.platform
    }

    /// Tuning in effect.
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Strategy catalog built from the tuning.
    pub fn catalog(&self) -> &StrategyCatalog {
        &self.catalog
    }

    /// Current state.
    pub fn state(&self) -> ResetState {
        self.state
    }

    /// Strategy that last got the chip into download mode.
    pub fn last_successful(&self) -> Option<StrategyId> {
        self.last_successful
    }

    /// Retained attempts.
    pub fn history(&self) -> &AttemptHistory {
        &self.history
    }

    /// Aggregate figures over the history plus session counters.
    pub fn statistics(&self) -> Statistics {
        Statistics {
            invocations: self.invocations,
            successful_invocations: self.successful_invocations,
            ..self
                .history
                .statistics()
        }
    }

    /// Forget attempts, counters and the last successful strategy.
    ///
    /// Call this when a different board is connected.
    pub fn clear_history(&mut self) {
        self.history
            .clear();
        self.last_successful = None;
        self.invocations = 0;
        self.successful_invocations = 0;
        self.state = ResetState::Idle;
        self.sink
            .emit(&ResetEvent::HistoryCleared);
    }

    /// Snapshot for troubleshooting output.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            platform: self.platform,
            config: self.config.clone(),
            state: self.state,
            last_successful: self.last_successful,
            statistics: self.statistics(),
            history: self
                .history
                .iter()
                .cloned()
                .collect(),
        }
    }

    /// Order the next sequence will use.
    pub fn planned_order(&self, prior_success: Option<StrategyId>) -> Vec<StrategyId> {
        selector::fallback_order(
            self.config.preferred_strategy,
            prior_success.or(self.last_successful),
        )
    }

    /// Try each strategy once until the chip answers the link-check.
    ///
    /// `prior_success` takes precedence over the strategy remembered from
    /// earlier calls. Intermediate failures are recorded and reported to the
    /// event sink; only the final outcome is returned.
    pub async fn reset_and_verify<P: Port>(
        &mut self,
        port: &mut P,
        prior_success: Option<StrategyId>,
    ) -> ResetOutcome {
        let order = self.planned_order(prior_success);
        self.run_sequence(port, order).await
    }

    /// Run a single strategy and its link-check, without falling back.
    ///
    /// The attempt is recorded and counted like any other sequence, so
    /// repeated calls build up [`statistics`](Self::statistics) for one
    /// strategy in isolation.
    pub async fn test_strategy<P: Port>(&mut self, port: &mut P, id: StrategyId) -> ResetOutcome {
        self.run_sequence(port, vec![id]).await
    }

    async fn run_sequence<P: Port>(&mut self, port: &mut P, order: Vec<StrategyId>) -> ResetOutcome {
        self.invocations += 1;
        self.set_state(ResetState::Selecting);
        self.sink
            .emit(&ResetEvent::SequenceStarted {
                platform: self.platform,
                order: order.clone(),
            });

        let total = order.len();
        let mut attempts = Vec::with_capacity(total);

        for (index, id) in order
            .into_iter()
            .enumerate()
        {
            if self.stop.is_stopped() {
                return self.exhaust(attempts, ExhaustReason::Cancelled);
            }

            let Some(definition) = self.catalog.get(id) else {
                debug!("{id} missing from catalog, skipping");
                continue;
            };

            self.sink
                .emit(&ResetEvent::StrategyStarted {
                    strategy: id,
                    index: index + 1,
                    total,
                });

            let record = self.attempt(port, &definition).await;
            if record
                .outcome
                .is_success()
            {
                self.successful_invocations += 1;
                return ResetOutcome::Succeeded {
                    strategy: id,
                    duration: record.duration,
                };
            }

            let cancelled = record.outcome == AttemptOutcome::Failure(FailureReason::Cancelled);
            attempts.push(record);
            if cancelled {
                return self.exhaust(attempts, ExhaustReason::Cancelled);
            }
            self.set_state(ResetState::Selecting);
        }

        self.exhaust(attempts, ExhaustReason::AllStrategiesFailed)
    }

    /// Execute one strategy, verify the link and record the result.
    async fn attempt<P: Port>(
        &mut self,
        port: &mut P,
        definition: &StrategyDefinition,
    ) -> AttemptRecord {
        let id = definition.id;
        self.set_state(ResetState::Executing(id));

        let timestamp = Instant::now();
        let result = match executor::execute(port, definition, &self.stop).await {
            Err(e) => Err(FailureReason::from(&e)),
            Ok(elapsed) => {
                self.sink
                    .emit(&ResetEvent::SignalsApplied {
                        strategy: id,
                        last: definition
                            .steps
                            .last()
                            .map(|s| s.signals())
                            .unwrap_or_else(Signals::default),
                        elapsed,
                    });
                self.set_state(ResetState::Verifying(id));

                self.verifier
                    .run(port, self.config.link_check_timeout, self.config.max_retries)
                    .await
                    .map(|_| ())
                    .map_err(|e| FailureReason::from(&e))
            },
        };
        let duration = timestamp.elapsed();

        let outcome = match result {
            Ok(()) => {
                self.last_successful = Some(id);
                self.set_state(ResetState::Succeeded(id));
                self.sink
                    .emit(&ResetEvent::Succeeded {
                        strategy: id,
                        duration,
                    });
                AttemptOutcome::Success
            },
            Err(reason) => {
                self.sink
                    .emit(&ResetEvent::StrategyFailed {
                        strategy: id,
                        reason: reason.clone(),
                    });
                AttemptOutcome::Failure(reason)
            },
        };

        let record = AttemptRecord {
            strategy: id,
            outcome,
            timestamp,
            duration,
        };
        self.history
            .push(record.clone());
        record
    }

    /// Run up to `rounds` full sequences with an increasing pause between
    /// them. The first round honours `prior_success`.
    pub async fn reset_with_retries<P: Port>(
        &mut self,
        port: &mut P,
        prior_success: Option<StrategyId>,
        rounds: u32,
    ) -> ResetOutcome {
        let rounds = rounds.max(1);
        let mut prior = prior_success;
        let mut round = 1;

        loop {
            let outcome = self
                .reset_and_verify(port, prior.take())
                .await;

            let retry = round < rounds
                && matches!(
                    outcome,
                    ResetOutcome::Exhausted {
                        reason: ExhaustReason::AllStrategiesFailed,
                        ..
                    }
                );
            if !retry {
                return outcome;
            }

            let backoff = round_backoff(round);
            self.sink
                .emit(&ResetEvent::RoundFailed {
                    round,
                    rounds,
                    backoff,
                });
            sleep(backoff).await;
            round += 1;
        }
    }

    fn set_state(&mut self, state: ResetState) {
        self.state = state;
        self.sink
            .emit(&ResetEvent::StateChanged(state));
    }

    fn exhaust(&mut self, attempts: Vec<AttemptRecord>, reason: ExhaustReason) -> ResetOutcome {
        self.set_state(ResetState::Exhausted);
        self.sink
            .emit(&ResetEvent::Exhausted {
                reason,
                attempts: attempts.len(),
            });
        ResetOutcome::Exhausted {
            attempts,
            reason,
            platform: self.platform,
            guidance: self.platform.guidance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use crate::protocol::link_check::LINK_CHECK_RESPONSE;
    use std::sync::{Arc, Mutex};

    fn init_logger() {
        let _ = env_logger::builder()
            .is_test(true)
            .try_init();
    }

    fn recording(platform: PlatformCategory) -> (ResetOrchestrator, Arc<Mutex<Vec<ResetEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let orchestrator = ResetOrchestrator::new(platform).with_sink(move |e: &ResetEvent| {
            sink.lock()
                .unwrap()
                .push(e.clone())
        });
        (orchestrator, events)
    }

    fn started(events: &Mutex<Vec<ResetEvent>>) -> Vec<StrategyId> {
        events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ResetEvent::StrategyStarted { strategy, .. } => Some(*strategy),
                _ => None,
            })
            .collect()
    }

    fn steps(platform: PlatformCategory, id: StrategyId) -> Vec<Signals> {
        StrategyCatalog::for_config(&platform.config())
            .get(id)
            .unwrap()
            .steps
            .iter()
            .map(|s| s.signals())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_linux_succeeds_with_preferred_strategy() {
        let (mut orchestrator, events) = recording(PlatformCategory::Linux);
        let mut port = MockPort::replying(&LINK_CHECK_RESPONSE);

        let outcome = orchestrator
            .reset_and_verify(&mut port, None)
            .await;

        assert_eq!(outcome.strategy(), Some(StrategyId::Separated));
        assert_eq!(
            port.signal_calls,
            steps(PlatformCategory::Linux, StrategyId::Separated)
        );
        assert_eq!(started(&events), vec![StrategyId::Separated]);
        assert_eq!(orchestrator.history().len(), 1);
        assert!(orchestrator.history().last().unwrap().outcome.is_success());
        assert_eq!(orchestrator.last_successful(), Some(StrategyId::Separated));
        assert_eq!(orchestrator.state(), ResetState::Succeeded(StrategyId::Separated));
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_falls_back_after_signal_failure() {
        let (mut orchestrator, events) = recording(PlatformCategory::Windows);
        let mut port = MockPort::replying(&LINK_CHECK_RESPONSE);
        port.fail_signal_call(2);

        let outcome = orchestrator
            .reset_and_verify(&mut port, None)
            .await;

        assert_eq!(outcome.strategy(), Some(StrategyId::Separated));
        assert_eq!(started(&events), vec![StrategyId::Standard, StrategyId::Separated]);
        // Two calls for the failed standard run, four for separated.
        assert_eq!(port.signal_calls.len(), 6);
        // No link-check after the failed strategy.
        assert_eq!(port.writes.len(), 1);

        let first = orchestrator.history().iter().next().unwrap();
        assert_eq!(first.strategy, StrategyId::Standard);
        assert!(matches!(
            first.outcome,
            AttemptOutcome::Failure(FailureReason::SignalFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_strategies_fail() {
        init_logger();
        let config = PlatformCategory::Unknown
            .config()
            .with_max_retries(2);
        let mut orchestrator = ResetOrchestrator::new(PlatformCategory::Unknown).with_config(config);
        let mut port = MockPort::new();

        let outcome = orchestrator
            .reset_and_verify(&mut port, None)
            .await;

        let ResetOutcome::Exhausted {
            attempts,
            reason,
            platform,
            guidance,
        } = outcome
        else {
            panic!("expected exhaustion");
        };
        assert_eq!(reason, ExhaustReason::AllStrategiesFailed);
        assert_eq!(platform, PlatformCategory::Unknown);
        assert_eq!(guidance, PlatformCategory::Unknown.guidance());

        let tried: Vec<StrategyId> = attempts
            .iter()
            .map(|a| a.strategy)
            .collect();
        assert_eq!(tried, selector::order(PlatformCategory::Unknown, None));
        assert!(attempts.iter().all(|a| a.outcome
            == AttemptOutcome::Failure(FailureReason::LinkCheckTimeout)));
        assert_eq!(port.writes.len(), StrategyId::ALL.len() * 2);
        assert_eq!(orchestrator.state(), ResetState::Exhausted);
        assert_eq!(orchestrator.last_successful(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remembers_last_success() {
        let (mut orchestrator, events) = recording(PlatformCategory::Linux);
        let mut port = MockPort::replying(&LINK_CHECK_RESPONSE);

        orchestrator
            .reset_and_verify(&mut port, Some(StrategyId::RtsOnly))
            .await;
        orchestrator
            .reset_and_verify(&mut port, None)
            .await;

        assert_eq!(started(&events), vec![StrategyId::RtsOnly, StrategyId::RtsOnly]);
        assert_eq!(orchestrator.last_successful(), Some(StrategyId::RtsOnly));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prior_success_overrides_memory() {
        let (mut orchestrator, events) = recording(PlatformCategory::MacOS);
        let mut port = MockPort::replying(&LINK_CHECK_RESPONSE);

        orchestrator
            .reset_and_verify(&mut port, None)
            .await;
        orchestrator
            .reset_and_verify(&mut port, Some(StrategyId::Standard))
            .await;

        assert_eq!(started(&events), vec![StrategyId::DtrOnly, StrategyId::Standard]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_start_is_cancelled() {
        let stop = StopSignal::new();
        stop.stop();
        let mut orchestrator =
            ResetOrchestrator::new(PlatformCategory::Linux).with_stop_signal(stop);
        let mut port = MockPort::replying(&LINK_CHECK_RESPONSE);

        let outcome = orchestrator
            .reset_and_verify(&mut port, None)
            .await;

        assert!(matches!(
            outcome,
            ResetOutcome::Exhausted {
                reason: ExhaustReason::Cancelled,
                ref attempts,
                ..
            } if attempts.is_empty()
        ));
        assert!(port.signal_calls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_between_strategies() {
        let stop = StopSignal::new();
        let handler = stop.clone();
        let config = PlatformCategory::Linux
            .config()
            .with_max_retries(1);
        let mut orchestrator = ResetOrchestrator::new(PlatformCategory::Linux)
            .with_config(config)
            .with_stop_signal(stop)
            .with_sink(move |e: &ResetEvent| {
                if matches!(e, ResetEvent::StrategyFailed { .. }) {
                    handler.stop();
                }
            });
        let mut port = MockPort::new();

        let outcome = orchestrator
            .reset_and_verify(&mut port, None)
            .await;

        match outcome {
            ResetOutcome::Exhausted {
                attempts, reason, ..
            } => {
                assert_eq!(reason, ExhaustReason::Cancelled);
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].strategy, StrategyId::Separated);
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_statistics_and_clear() {
        init_logger();
        let mut orchestrator = ResetOrchestrator::new(PlatformCategory::Windows);
        let mut port = MockPort::replying(&LINK_CHECK_RESPONSE);
        port.fail_signal_call(1);

        orchestrator
            .reset_and_verify(&mut port, None)
            .await;

        let stats = orchestrator.statistics();
        assert_eq!(stats.total_attempts, 2);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.invocations, 1);
        assert_eq!(stats.successful_invocations, 1);
        assert_eq!(stats.per_strategy[&StrategyId::Standard].failure, 1);
        assert_eq!(stats.per_strategy[&StrategyId::Separated].success, 1);

        let diagnostics = orchestrator.diagnostics();
        assert_eq!(diagnostics.history.len(), 2);
        assert_eq!(diagnostics.last_successful, Some(StrategyId::Separated));

        orchestrator.clear_history();
        assert_eq!(orchestrator.statistics(), Statistics::default());
        assert_eq!(orchestrator.last_successful(), None);
        assert_eq!(orchestrator.state(), ResetState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_stays_bounded_across_rounds() {
        let config = PlatformCategory::Windows
            .config()
            .with_max_retries(1);
        let (orchestrator, events) = recording(PlatformCategory::Windows);
        let mut orchestrator = orchestrator.with_config(config);
        let mut port = MockPort::new();

        let outcome = orchestrator
            .reset_with_retries(&mut port, None, 3)
            .await;

        assert!(!outcome.is_success());
        assert_eq!(orchestrator.history().len(), 10);
        assert_eq!(orchestrator.statistics().invocations, 3);

        let backoffs: Vec<Duration> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ResetEvent::RoundFailed { backoff, .. } => Some(*backoff),
                _ => None,
            })
            .collect();
        assert_eq!(
            backoffs,
            vec![Duration::from_millis(110), Duration::from_millis(120)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_on_success() {
        let mut orchestrator = ResetOrchestrator::new(PlatformCategory::MacOS);
        let mut port = MockPort::replying(&LINK_CHECK_RESPONSE);

        let outcome = orchestrator
            .reset_with_retries(&mut port, Some(StrategyId::ExtendedTiming), 5)
            .await;

        assert_eq!(outcome.strategy(), Some(StrategyId::ExtendedTiming));
        assert_eq!(orchestrator.statistics().invocations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_retries_still_verifies() {
        let config = PlatformCategory::Linux
            .config()
            .with_max_retries(0);
        let mut orchestrator = ResetOrchestrator::new(PlatformCategory::Linux).with_config(config);
        let mut port = MockPort::replying(&LINK_CHECK_RESPONSE);

        let outcome = orchestrator
            .reset_and_verify(&mut port, None)
            .await;

        assert_eq!(outcome.strategy(), Some(StrategyId::Separated));
        assert_eq!(port.writes.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_returns_to_selecting() {
        let (mut orchestrator, events) = recording(PlatformCategory::Windows);
        let mut port = MockPort::replying(&LINK_CHECK_RESPONSE);
        port.fail_signal_call(1);

        orchestrator
            .reset_and_verify(&mut port, None)
            .await;

        let states: Vec<ResetState> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ResetEvent::StateChanged(state) => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                ResetState::Selecting,
                ResetState::Executing(StrategyId::Standard),
                ResetState::Selecting,
                ResetState::Executing(StrategyId::Separated),
                ResetState::Verifying(StrategyId::Separated),
                ResetState::Succeeded(StrategyId::Separated),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_strategy_runs_only_that_strategy() {
        let (mut orchestrator, events) = recording(PlatformCategory::Linux);
        let mut port = MockPort::replying(&LINK_CHECK_RESPONSE);

        let outcome = orchestrator
            .test_strategy(&mut port, StrategyId::RtsOnly)
            .await;

        assert_eq!(outcome.strategy(), Some(StrategyId::RtsOnly));
        assert_eq!(started(&events), vec![StrategyId::RtsOnly]);
        assert_eq!(
            port.signal_calls,
            steps(PlatformCategory::Linux, StrategyId::RtsOnly)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_strategy_does_not_fall_back() {
        let config = PlatformCategory::MacOS
            .config()
            .with_max_retries(1);
        let (orchestrator, events) = recording(PlatformCategory::MacOS);
        let mut orchestrator = orchestrator.with_config(config);
        let mut port = MockPort::new();

        for _ in 0..3 {
            let outcome = orchestrator
                .test_strategy(&mut port, StrategyId::Standard)
                .await;
            match outcome {
                ResetOutcome::Exhausted {
                    attempts, reason, ..
                } => {
                    assert_eq!(reason, ExhaustReason::AllStrategiesFailed);
                    assert_eq!(attempts.len(), 1);
                },
                other => panic!("unexpected {other:?}"),
            }
        }

        assert_eq!(started(&events), vec![StrategyId::Standard; 3]);
        assert_eq!(port.writes.len(), 3);

        let stats = orchestrator.statistics();
        assert_eq!(stats.invocations, 3);
        assert_eq!(stats.successful_invocations, 0);
        assert_eq!(stats.per_strategy[&StrategyId::Standard].failure, 3);
        assert_eq!(stats.per_strategy.len(), 1);
    }

    #[test]
    fn test_round_backoff_is_capped() {
        assert_eq!(round_backoff(1), Duration::from_millis(110));
        assert_eq!(round_backoff(10), Duration::from_millis(200));
        assert_eq!(round_backoff(100), MAX_ROUND_BACKOFF);
    }
}
