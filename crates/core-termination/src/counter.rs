//! The termination-signal debounce counter (spec §4.10 and the §8
//! "termination debouncing" scenario), kept pure and signal-handler-free so
//! it is trivially unit testable: feed it observation timestamps, read back
//! whether this observation should trigger an immediate `exit(1)`.

use std::time::Duration;

use core_time::TimeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationOutcome {
    /// The running count of signals seen within the current debounce
    /// window (resets to 1 once a gap larger than the window elapses).
    pub count: u32,
    /// `true` once `count` has climbed strictly above the configured
    /// threshold — the caller should `exit(1)` immediately rather than
    /// going through the normal reactor-observed shutdown path.
    pub exit_immediately: bool,
}

/// Debounces repeated termination signals: consecutive signals arriving
/// within `reset_window` of each other accumulate; a gap larger than the
/// window resets the count to 1.
pub struct TerminationCounter {
    reset_window: Duration,
    threshold: u32,
    count: u32,
    last_signal: Option<TimeValue>,
}

impl TerminationCounter {
    pub fn new(reset_window: Duration, threshold: u32) -> Self {
        TerminationCounter { reset_window, threshold, count: 0, last_signal: None }
    }

    /// The current debounce-window count, without recording a new
    /// observation.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Records one termination signal observed at `now`.
    pub fn observe_signal(&mut self, now: TimeValue) -> TerminationOutcome {
        let within_window = self.last_signal.is_some_and(|last| now >= last && (now - last) <= self.reset_window);
        self.count = if within_window { self.count + 1 } else { 1 };
        self.last_signal = Some(now);
        TerminationOutcome { count: self.count, exit_immediately: self.count > self.threshold }
    }
}
