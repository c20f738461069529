//! Driver restart bookkeeping (spec §7 item 2, supplemented from
//! `original_source/Programs/core.c`'s braille driver restart loop): close,
//! re-probe, re-open, reload key tables. Modeled on the teacher's
//! `TerminalGuard` RAII idea, generalized into a retry loop since a driver
//! restart can itself fail and needs to be retried with backoff rather than
//! attempted exactly once.

use std::time::Duration;

use core_time::{MonotonicClock, TimeValue};

use crate::error::DriverError;

/// Anything the supervisor can restart: open it, close it, and report
/// whether it has flagged itself as failed (`BrailleDisplay::has_failed` in
/// spec §6, generalized so the same supervisor shape works for speech and
/// screen drivers too).
pub trait Restartable {
    fn open(&mut self) -> Result<(), DriverError>;
    fn close(&mut self);
    fn has_failed(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    /// Closed, waiting until `retry_at` before attempting re-open.
    Restarting,
    /// Gave up after `max_attempts` consecutive failed re-opens.
    GaveUp,
}

/// Owns one driver instance plus the backoff state for restarting it.
/// Backoff doubles from `initial_backoff` up to `max_backoff` on each
/// failed re-open attempt and resets to `initial_backoff` once a restart
/// succeeds.
pub struct DriverSupervisor<D: Restartable> {
    driver: D,
    state: SupervisorState,
    initial_backoff: Duration,
    max_backoff: Duration,
    current_backoff: Duration,
    max_attempts: u32,
    attempts: u32,
    retry_at: Option<TimeValue>,
}

impl<D: Restartable> DriverSupervisor<D> {
    pub fn new(driver: D, initial_backoff: Duration, max_backoff: Duration, max_attempts: u32) -> Self {
        DriverSupervisor {
            driver,
            state: SupervisorState::Running,
            initial_backoff,
            max_backoff,
            current_backoff: initial_backoff,
            max_attempts,
            attempts: 0,
            retry_at: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Call once per reactor tick (or whenever the main loop's condition
    /// tester runs). Observes `has_failed`, closes and schedules a restart
    /// the first time it sees the flag set, and attempts the re-open once
    /// `retry_at` has passed. Returns `true` if a restart attempt (success
    /// or failure) happened this call.
    pub fn poll(&mut self, clock: &MonotonicClock) -> bool {
        match self.state {
            SupervisorState::Running => {
                if self.driver.has_failed() {
                    tracing::warn!(target: "driver.braille", "driver reported failure, closing for restart");
                    self.driver.close();
                    self.state = SupervisorState::Restarting;
                    self.retry_at = Some(clock.now() + self.current_backoff);
                    true
                } else {
                    false
                }
            }
            SupervisorState::Restarting => {
                let now = clock.now();
                let Some(retry_at) = self.retry_at else { return false };
                if now < retry_at {
                    return false;
                }
                self.attempts += 1;
                match self.driver.open() {
                    Ok(()) => {
                        tracing::info!(target: "driver.braille", attempts = self.attempts, "driver restarted");
                        self.state = SupervisorState::Running;
                        self.attempts = 0;
                        self.current_backoff = self.initial_backoff;
                        self.retry_at = None;
                    }
                    Err(err) => {
                        tracing::warn!(target: "driver.braille", attempts = self.attempts, %err, "restart attempt failed");
                        if self.attempts >= self.max_attempts {
                            self.state = SupervisorState::GaveUp;
                        } else {
                            self.current_backoff = (self.current_backoff * 2).min(self.max_backoff);
                            self.retry_at = Some(now + self.current_backoff);
                        }
                    }
                }
                true
            }
            SupervisorState::GaveUp => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyDriver {
        failed: bool,
        opens_remaining_before_success: u32,
        open_calls: u32,
    }

    impl Restartable for FlakyDriver {
        fn open(&mut self) -> Result<(), DriverError> {
            self.open_calls += 1;
            if self.opens_remaining_before_success == 0 {
                self.failed = false;
                Ok(())
            } else {
                self.opens_remaining_before_success -= 1;
                Err(DriverError::OpenFailed { parameters: String::new(), reason: "probe failed".into() })
            }
        }
        fn close(&mut self) {}
        fn has_failed(&self) -> bool {
            self.failed
        }
    }

    #[test]
    fn running_driver_with_no_failure_is_left_alone() {
        let clock = MonotonicClock::new();
        let driver = FlakyDriver { failed: false, opens_remaining_before_success: 0, open_calls: 0 };
        let mut sup = DriverSupervisor::new(driver, Duration::from_millis(1), Duration::from_millis(10), 3);
        assert!(!sup.poll(&clock));
        assert_eq!(sup.state(), SupervisorState::Running);
    }

    #[test]
    fn failed_driver_restarts_after_backoff_elapses() {
        let clock = MonotonicClock::new();
        let driver = FlakyDriver { failed: true, opens_remaining_before_success: 0, open_calls: 0 };
        let mut sup = DriverSupervisor::new(driver, Duration::from_millis(5), Duration::from_millis(50), 3);

        assert!(sup.poll(&clock));
        assert_eq!(sup.state(), SupervisorState::Restarting);

        std::thread::sleep(Duration::from_millis(10));
        assert!(sup.poll(&clock));
        assert_eq!(sup.state(), SupervisorState::Running);
        assert_eq!(sup.driver().open_calls, 1);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let clock = MonotonicClock::new();
        let driver = FlakyDriver { failed: true, opens_remaining_before_success: 100, open_calls: 0 };
        let mut sup = DriverSupervisor::new(driver, Duration::from_millis(1), Duration::from_millis(4), 2);

        sup.poll(&clock); // close, schedule restart
        for _ in 0..10 {
            std::thread::sleep(Duration::from_millis(6));
            sup.poll(&clock);
            if sup.state() == SupervisorState::GaveUp {
                break;
            }
        }
        assert_eq!(sup.state(), SupervisorState::GaveUp);
        assert!(sup.driver().open_calls >= 2);
    }
}
