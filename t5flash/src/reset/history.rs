//! Bounded attempt history and the statistics derived from it.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::protocol::link_check::LinkCheckError;
use crate::reset::StrategyId;
use crate::reset::executor::ExecError;

/// Number of attempts kept; older ones are evicted first.
pub const HISTORY_CAPACITY: usize = 10;

/// Why a strategy attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The port rejected a DTR/RTS change.
    #[error("signal change failed: {0}")]
    SignalFailed(String),
    /// Eight bytes came back but did not match.
    #[error("link-check failed: response mismatch")]
    LinkCheckMismatch,
    /// The chip never answered in time.
    #[error("link-check failed: no response")]
    LinkCheckTimeout,
    /// The port failed while sending or reading the link-check.
    #[error("link-check failed: {0}")]
    LinkCheckPort(String),
    /// A stop was requested during the attempt.
    #[error("cancelled")]
    Cancelled,
}

impl From<&ExecError> for FailureReason {
    fn from(err: &ExecError) -> Self {
        match err {
            ExecError::SignalFailed { .. } => Self::SignalFailed(err.to_string()),
            ExecError::Cancelled { .. } => Self::Cancelled,
        }
    }
}

impl From<&LinkCheckError> for FailureReason {
    fn from(err: &LinkCheckError) -> Self {
        match err {
            LinkCheckError::Timeout { .. } => Self::LinkCheckTimeout,
            LinkCheckError::Mismatch { .. } => Self::LinkCheckMismatch,
            LinkCheckError::Port(e) => Self::LinkCheckPort(e.to_string()),
            LinkCheckError::Cancelled => Self::Cancelled,
        }
    }
}

/// Result of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The strategy ran and the link-check passed.
    Success,
    /// The strategy failed.
    Failure(FailureReason),
}

impl AttemptOutcome {
    /// Whether this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Strategy that was tried.
    pub strategy: StrategyId,
    /// What happened.
    pub outcome: AttemptOutcome,
    /// When the attempt started (monotonic).
    pub timestamp: Instant,
    /// Time spent on the attempt, reset sequence and link-check included.
    pub duration: Duration,
}

/// Successes and failures of one strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StrategyTally {
    /// Successful attempts.
    pub success: usize,
    /// Failed attempts.
    pub failure: usize,
}

/// Aggregate figures over the retained history plus session counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Statistics {
    /// Attempts currently in the history.
    pub total_attempts: usize,
    /// Successful attempts in the history.
    pub success_count: usize,
    /// Failed attempts in the history.
    pub failure_count: usize,
    /// Per-strategy breakdown of the history.
    pub per_strategy: BTreeMap<StrategyId, StrategyTally>,
    /// Sequences run since the last clear, single-strategy tests included.
    pub invocations: u64,
    /// Sequences that ended in success since the last clear.
    pub successful_invocations: u64,
}

#[allow(clippy::cast_precision_loss)] // Counts stay far below 2^52
impl Statistics {
    /// Share of successful attempts in the history, `0.0` when empty.
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_attempts as f64
    }

    /// Share of sequences that ended in success, `0.0` before the first.
    ///
    /// Unlike [`success_rate`](Self::success_rate) this is not limited to
    /// the retained history.
    pub fn invocation_success_rate(&self) -> f64 {
        if self.invocations == 0 {
            return 0.0;
        }
        self.successful_invocations as f64 / self.invocations as f64
    }
}

/// FIFO ring of the most recent [`AttemptRecord`]s.
#[derive(Debug, Clone)]
pub struct AttemptHistory {
    records: VecDeque<AttemptRecord>,
    capacity: usize,
}

impl Default for AttemptHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl AttemptHistory {
    /// History holding [`HISTORY_CAPACITY`] records.
    pub fn new() -> Self {
        Self::default()
    }

    /// History holding at most `capacity` records (minimum one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn push(&mut self, record: AttemptRecord) {
        while self.records.len() >= self.capacity {
            self.records
                .pop_front();
        }
        self.records
            .push_back(record);
    }

    /// Records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.records
            .iter()
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&AttemptRecord> {
        self.records
            .back()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records
            .len()
    }

    /// Whether no record is retained.
    pub fn is_empty(&self) -> bool {
        self.records
            .is_empty()
    }

    /// Maximum number of retained records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records
            .clear();
    }

    /// Figures over the retained records. Session counters are left at zero.
    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics {
            total_attempts: self.records.len(),
            ..Statistics::default()
        };

        for record in &self.records {
            let tally = stats
                .per_strategy
                .entry(record.strategy)
                .or_default();
            if record
                .outcome
                .is_success()
            {
                stats.success_count += 1;
                tally.success += 1;
            } else {
                stats.failure_count += 1;
                tally.failure += 1;
            }
        }

        stats
    }
}
