//! Scripted in-memory port for tests.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::port::{Port, Signals};

/// A port that records every call and answers writes from a script.
#[derive(Debug, Default)]
pub(crate) struct MockPort {
    /// Every `set_signals` call, including failed ones.
    pub signal_calls: Vec<Signals>,
    /// Every successful write.
    pub writes: Vec<Vec<u8>>,
    /// Bytes still unread in the input buffer at the moment of each write.
    pub pending_at_write: Vec<usize>,
    input: VecDeque<u8>,
    failing_signal_calls: HashSet<usize>,
    replies: VecDeque<Option<Vec<u8>>>,
    default_reply: Option<Vec<u8>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every write with `reply` once the script is used up.
    pub fn replying(reply: &[u8]) -> Self {
        Self {
            default_reply: Some(reply.to_vec()),
            ..Self::default()
        }
    }

    /// Queue a scripted answer for the next unanswered write.
    pub fn push_reply(&mut self, reply: Option<&[u8]>) {
        self.replies
            .push_back(reply.map(<[u8]>::to_vec));
    }

    /// Make the `n`-th `set_signals` call (1-based) fail.
    pub fn fail_signal_call(&mut self, n: usize) {
        self.failing_signal_calls
            .insert(n);
    }

    /// Put bytes into the input buffer as if the device had sent them.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.input
            .extend(bytes);
    }
}

impl Port for MockPort {
    fn name(&self) -> &str {
        "mock"
    }

    async fn set_signals(&mut self, signals: Signals) -> Result<()> {
        self.signal_calls
            .push(signals);
        if self
            .failing_signal_calls
            .contains(&self.signal_calls.len())
        {
            return Err(Error::SignalFailed(format!("{signals}: not supported")));
        }
        Ok(())
    }

    async fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.pending_at_write
            .push(self.input.len());
        self.writes
            .push(data.to_vec());

        let reply = match self
            .replies
            .pop_front()
        {
            Some(scripted) => scripted,
            None => self
                .default_reply
                .clone(),
        };
        if let Some(reply) = reply {
            self.input
                .extend(reply);
        }
        Ok(())
    }

    async fn read_up_to(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>> {
        if self.input.is_empty() {
            tokio::time::sleep(timeout).await;
            return Ok(Vec::new());
        }
        let n = max_len.min(self.input.len());
        Ok(self
            .input
            .drain(..n)
            .collect())
    }
}
