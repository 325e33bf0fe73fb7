//! A frame scheduler driven by hand instead of by a display.

use fieldglow_core::{FrameHandle, FrameScheduler};
use std::collections::VecDeque;

/// Queues frame requests until the caller fires them.
///
/// Used for headless rendering and tests: the caller decides when "the next
/// repaint" happens and which timestamp it carries.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: u64,
    pending: VecDeque<FrameHandle>,
    requested: u64,
    cancelled: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the oldest pending request. Returns false if nothing was scheduled.
    pub fn fire(&mut self) -> bool {
        self.pending.pop_front().is_some()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Total requests ever made.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Requests cancelled while still pending.
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        self.requested += 1;
        let handle = FrameHandle(self.next);
        self.pending.push_back(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if let Some(pos) = self.pending.iter().position(|h| *h == handle) {
            self.pending.remove(pos);
            self.cancelled += 1;
        }
    }
}
