//! Write scheduling: unbounded producer writes, bounded processing chunks.
//!
//! Incoming buffers queue here untouched; the controller pulls chunks of at
//! most [`MAX_CHUNK_BYTES`] and stops after [`TIME_BUDGET`] per batch,
//! yielding back to the host's event loop through the [`Scheduler`]. Chunk
//! boundaries are safe anywhere because the parser is byte-incremental.

use std::collections::VecDeque;
use std::time::Duration;

/// Upper bound on bytes handed to the parser per chunk.
pub const MAX_CHUNK_BYTES: usize = 4096;

/// Wall-clock budget for one processing batch.
pub const TIME_BUDGET: Duration = Duration::from_millis(16);

/// Host scheduling hook. The engine never owns a timer or event loop; it
/// asks the host to call `pump()` again, now or after a delay.
pub trait Scheduler {
    /// Request a `pump()` call as soon as the host loop allows.
    fn schedule_now(&mut self);
    /// Request a `pump()` call after roughly `delay_ms` milliseconds.
    fn schedule_after(&mut self, delay_ms: u64);
}

/// Scheduler for hosts that drain synchronously (and for tests): requests
/// are intentionally dropped; such hosts call `flush()` themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScheduler;

impl Scheduler for NullScheduler {
    fn schedule_now(&mut self) {}
    fn schedule_after(&mut self, _delay_ms: u64) {}
}

/// Outcome of one `pump()` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// The queue is empty.
    Drained,
    /// The budget expired with bytes still queued; a follow-up was scheduled.
    Yielded,
}

/// FIFO of pending write buffers with an offset into the front buffer.
///
/// Every byte is handed out exactly once; `take_chunk` never splits or
/// reorders within a buffer.
#[derive(Debug, Default)]
pub struct WriteQueue {
    chunks: VecDeque<Vec<u8>>,
    offset: usize,
    scheduled: bool,
}

impl WriteQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a producer buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.chunks.push_back(bytes.to_vec());
        }
    }

    /// Pull the next chunk of at most `max` bytes, or `None` when empty.
    pub fn take_chunk(&mut self, max: usize) -> Option<Vec<u8>> {
        let front = self.chunks.front_mut()?;
        let remaining = front.len() - self.offset;
        if self.offset == 0 && remaining <= max {
            return self.chunks.pop_front();
        }
        let take = remaining.min(max);
        let out = front[self.offset..self.offset + take].to_vec();
        self.offset += take;
        if self.offset == front.len() {
            self.chunks.pop_front();
            self.offset = 0;
        }
        Some(out)
    }

    /// Whether any bytes are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total bytes still queued.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum::<usize>() - self.offset
    }

    /// Discard everything pending.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.offset = 0;
    }

    /// Whether a pump is already scheduled with the host.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn set_scheduled(&mut self, scheduled: bool) {
        self.scheduled = scheduled;
    }
}
