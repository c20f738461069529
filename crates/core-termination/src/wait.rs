//! `brlttyWait` (spec §4.10): the core's top-level idle loop. Ticks the
//! reactor until something the caller cares about happens — a termination
//! request, cursor routing finishing, or a driver failure — or `duration`
//! elapses with nothing to report.

use std::time::Duration;

use core_io_monitor::MonitorBackend;
use core_reactor::Reactor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// The wait window elapsed (or the reactor had nothing to do) with none
    /// of the watched conditions becoming true.
    Continue,
    /// A termination request was observed; the caller should shut down.
    Stop,
}

/// The conditions `brltty_wait` polls on every reactor tick. Each is a
/// simple flag the caller flips from elsewhere (a signal callback, a
/// routing-status poll, a driver supervisor) before the next tick runs its
/// predicate.
pub struct WaitConditions<'a> {
    pub terminate_requested: &'a mut bool,
    pub routing_ready: &'a mut bool,
    pub driver_failed: &'a mut bool,
}

/// Runs the reactor until one of `conditions` fires or `duration` elapses.
/// `on_routing_ready` and `on_driver_failed` run as side effects when their
/// flag is observed set; both cases clear the flag and keep waiting (they
/// do not return control to the caller, per spec §4.10), so the only
/// values returned are [`WaitResult::Stop`] (termination requested) or
/// [`WaitResult::Continue`] (the wait window elapsed).
pub fn brltty_wait<B: MonitorBackend>(
    reactor: &mut Reactor<B>,
    duration: Duration,
    conditions: WaitConditions<'_>,
    mut on_routing_ready: impl FnMut(),
    mut on_driver_failed: impl FnMut(),
) -> WaitResult {
    let WaitConditions { terminate_requested, routing_ready, driver_failed } = conditions;

    let mut stop = false;
    reactor.await_condition(duration, |r: &mut Reactor<B>| {
        if *terminate_requested {
            stop = true;
            return true;
        }
        if *routing_ready {
            *routing_ready = false;
            on_routing_ready();
        }
        if *driver_failed {
            *driver_failed = false;
            on_driver_failed();
        }
        let _ = r;
        false
    });

    if stop {
        WaitResult::Stop
    } else {
        WaitResult::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_io_monitor::PollBackend;

    #[test]
    fn times_out_to_continue_when_nothing_fires() {
        let mut reactor = Reactor::new(PollBackend::new()).unwrap();
        let mut terminate = false;
        let mut routing = false;
        let mut failed = false;
        let result = brltty_wait(
            &mut reactor,
            Duration::from_millis(20),
            WaitConditions {
                terminate_requested: &mut terminate,
                routing_ready: &mut routing,
                driver_failed: &mut failed,
            },
            || {},
            || {},
        );
        assert_eq!(result, WaitResult::Continue);
    }

    #[test]
    fn terminate_flag_stops_the_wait() {
        let mut reactor = Reactor::new(PollBackend::new()).unwrap();
        let mut terminate = true;
        let mut routing = false;
        let mut failed = false;
        let result = brltty_wait(
            &mut reactor,
            Duration::from_secs(5),
            WaitConditions {
                terminate_requested: &mut terminate,
                routing_ready: &mut routing,
                driver_failed: &mut failed,
            },
            || {},
            || {},
        );
        assert_eq!(result, WaitResult::Stop);
    }

    #[test]
    fn routing_ready_runs_callback_and_keeps_waiting() {
        let mut reactor = Reactor::new(PollBackend::new()).unwrap();
        let mut terminate = false;
        let mut routing = true;
        let mut failed = false;
        let mut ran = false;
        let result = brltty_wait(
            &mut reactor,
            Duration::from_millis(20),
            WaitConditions {
                terminate_requested: &mut terminate,
                routing_ready: &mut routing,
                driver_failed: &mut failed,
            },
            || ran = true,
            || {},
        );
        assert_eq!(result, WaitResult::Continue);
        assert!(ran);
        assert!(!routing, "flag must be cleared once observed");
    }

    #[test]
    fn driver_failed_runs_callback_and_keeps_waiting() {
        let mut reactor = Reactor::new(PollBackend::new()).unwrap();
        let mut terminate = false;
        let mut routing = false;
        let mut failed = true;
        let mut ran = false;
        let result = brltty_wait(
            &mut reactor,
            Duration::from_millis(20),
            WaitConditions {
                terminate_requested: &mut terminate,
                routing_ready: &mut routing,
                driver_failed: &mut failed,
            },
            || {},
            || ran = true,
        );
        assert_eq!(result, WaitResult::Continue);
        assert!(ran);
        assert!(!failed);
    }
}
