//! Trailing-edge debouncing for bursty host events.

/// Holds the latest value of a burst and releases it once no new value has
/// arrived for `quiet_ms`.
///
/// Time is supplied by the caller in milliseconds, so the debouncer is
/// deterministic and needs no timer of its own.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    quiet_ms: f64,
    pending: Option<T>,
    last_event: f64,
}

impl<T> Debouncer<T> {
    /// A negative or non-finite window is treated as 0 (release on next poll).
    pub fn new(quiet_ms: f64) -> Self {
        let quiet_ms = if quiet_ms.is_finite() {
            quiet_ms.max(0.0)
        } else {
            0.0
        };
        Self {
            quiet_ms,
            pending: None,
            last_event: 0.0,
        }
    }

    pub fn quiet_ms(&self) -> f64 {
        self.quiet_ms
    }

    /// Records an event, replacing any pending value and restarting the window.
    pub fn push(&mut self, value: T, now: f64) {
        self.pending = Some(value);
        self.last_event = now;
    }

    /// Releases the pending value if the quiet window has elapsed.
    pub fn poll(&mut self, now: f64) -> Option<T> {
        if self.pending.is_some() && now - self.last_event >= self.quiet_ms {
            self.pending.take()
        } else {
            None
        }
    }

    /// Releases the pending value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops the pending value without releasing it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
