//! Progress channel / reporter. The orchestrator is
//! single-logic-threaded; a worker thread runs the long fetch/push operation
//! and forwards events through a bounded channel to a reporter, so rate
//! estimation keeps ticking through a stall. Grounded on the producer/
//! consumer shape used for CLI progress bars elsewhere in the stack
//! (`cli/commands` + `indicatif`), generalized here to a plain
//! `crossbeam::channel` instead of a terminal widget, since the core must
//! not assume a TTY front-end.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Bounded so a stalled reporter can't let a fetch/push buffer unbounded memory.
pub const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A file transfer started.
    Started { path: String, total_bytes: u64 },
    /// Bytes have moved for a file already reported as `Started`.
    Bytes { path: String, bytes: u64 },
    /// A file was skipped because the remote already had a matching copy.
    Skipped { path: String },
    /// A file could not be found on the remote.
    NotFound { path: String },
    /// A file transfer completed.
    Completed { path: String },
    /// A non-fatal per-file error occurred; the batch continues (§7).
    Error { path: String, message: String },
    /// The whole operation finished.
    Done,
}

/// A callback invoked for each event; returns `true` to request the
/// transfer abort early.
pub type ProgressCallback<'a> = Box<dyn FnMut(&ProgressEvent) -> bool + Send + 'a>;

pub fn channel_pair() -> (Sender<ProgressEvent>, Receiver<ProgressEvent>) {
    channel::bounded(CHANNEL_CAPACITY)
}

/// Rate estimator fed by a progress receiver. Keeps ticking on a timeout
/// even when no event arrives, so a UI watching `rate_bytes_per_sec` can
/// show "stalled" rather than freezing mid-number.
pub struct RateReporter {
    window: Duration,
    bytes_in_window: u64,
    last_tick_bytes: u64,
}

impl RateReporter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            bytes_in_window: 0,
            last_tick_bytes: 0,
        }
    }

    pub fn record_bytes(&mut self, bytes: u64) {
        self.bytes_in_window = self.bytes_in_window.saturating_add(bytes);
    }

    /// Call once per tick interval; returns the instantaneous rate for the
    /// interval that just elapsed.
    pub fn tick(&mut self) -> f64 {
        let delta = self.bytes_in_window.saturating_sub(self.last_tick_bytes);
        self.last_tick_bytes = self.bytes_in_window;
        delta as f64 / self.window.as_secs_f64().max(f64::EPSILON)
    }

    /// Drains events from `rx` until `Done`/disconnect or an abort is
    /// requested, calling `on_event` for each and ticking on stalls.
    pub fn run(
        mut self,
        rx: &Receiver<ProgressEvent>,
        tick_interval: Duration,
        mut on_event: impl FnMut(&ProgressEvent, f64),
    ) {
        loop {
            match rx.recv_timeout(tick_interval) {
                Ok(ProgressEvent::Bytes { bytes,.. }) => {
                    self.record_bytes(bytes);
                    let rate = self.tick();
                    on_event(&ProgressEvent::Bytes { path: String::new(), bytes }, rate);
                }
                Ok(ProgressEvent::Done) => {
                    on_event(&ProgressEvent::Done, self.tick());
                    break;
                }
                Ok(event) => {
                    let rate = self.tick();
                    on_event(&event, rate);
                }
                Err(RecvTimeoutError::Timeout) => {
                    let rate = self.tick();
                    on_event(&ProgressEvent::Bytes { path: String::new(), bytes: 0 }, rate);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}
