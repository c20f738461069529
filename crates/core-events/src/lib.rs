//! The alert catalog and command-dispatch telemetry shared by `core-commands`
//! and `core-routing`.
//!
//! Every user-visible failure in the core surfaces through one of a small,
//! fixed catalog of [`Alert`] tones (spec §7: "command rejected", "routing
//! failed", "cursor unlinked", etc.) rather than through ad-hoc error
//! messages — drivers and higher layers decide how an alert actually sounds
//! or displays; this crate only names the occasion. Dispatch telemetry
//! (command counts, alert counts) is tracked with the same atomic-counter
//! pattern the teacher editor used for its input telemetry, retargeted from
//! keypress/paste counters to command-dispatch counters.

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

/// The fixed catalog of audible/visual cues the core can request. Kept
/// small and closed (not an open string) so every call site is checked at
/// compile time against the catalog the spec actually names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alert {
    /// No handler in the command stack claimed the command.
    CommandRejected,
    /// A cursor-routing request finished worse than `WRONG_COLUMN` (spec §4.9).
    RoutingFailed,
    /// A cursor-routing request finished at `WRONG_COLUMN` or better.
    RoutingSucceeded,
    /// Speech tracking was following the screen cursor and got disabled
    /// because a command moved the braille window independently (spec §4.8
    /// post-hook).
    CursorUnlinked,
    /// A braille driver reported failure and is being restarted (spec §7.2).
    DriverRestarting,
    /// A termination signal was observed and the reactor is shutting down.
    Terminating,
}

impl Alert {
    /// Stable, lower\_snake\_case name for logging and for driver alert
    /// tables keyed by string.
    pub const fn name(&self) -> &'static str {
        match self {
            Alert::CommandRejected => "command_rejected",
            Alert::RoutingFailed => "routing_failed",
            Alert::RoutingSucceeded => "routing_succeeded",
            Alert::CursorUnlinked => "cursor_unlinked",
            Alert::DriverRestarting => "driver_restarting",
            Alert::Terminating => "terminating",
        }
    }
}

bitflags! {
    /// Flags carried alongside a dispatched command code (spec §4.8's
    /// `MOTION_ROUTE` flag and friends). Kept as bits rather than a struct
    /// of booleans because a command's flag set is fixed per command table
    /// entry and tested with simple `contains` checks at dispatch time.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CommandFlags: u32 {
        /// After a successful motion, route the screen cursor toward the
        /// window if it ended up outside it.
        const MOTION_ROUTE = 0b0001;
        /// This command is a pure motion (used by the post-hook to decide
        /// whether to check for window movement at all).
        const IS_MOTION = 0b0010;
    }
}

/// Observes alerts and dispatch outcomes as they happen. The default
/// no-op lets tests and headless tooling skip wiring a real sink; a real
/// deployment's binary crate installs one that forwards to the speech/
/// braille alert tables.
pub trait EventHooks: Send + Sync + 'static {
    fn on_alert(&self, _alert: Alert) {}
    fn on_command_dispatched(&self, _code: u32, _handled: bool) {}
}

pub struct NoopEventHooks;
impl EventHooks for NoopEventHooks {}

/// Process-wide counters mirroring the teacher's `AtomicU64`
/// fetch\_add(relaxed) telemetry style, retargeted from keypress/paste
/// counters to command-dispatch and alert counters. Read via
/// [`Telemetry::snapshot`] for tests and diagnostics; never reset except by
/// process restart.
pub static COMMANDS_DISPATCHED: AtomicU64 = AtomicU64::new(0);
pub static COMMANDS_REJECTED: AtomicU64 = AtomicU64::new(0);
pub static ALERTS_EMITTED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetrySnapshot {
    pub commands_dispatched: u64,
    pub commands_rejected: u64,
    pub alerts_emitted: u64,
}

pub fn snapshot() -> TelemetrySnapshot {
    TelemetrySnapshot {
        commands_dispatched: COMMANDS_DISPATCHED.load(Ordering::Relaxed),
        commands_rejected: COMMANDS_REJECTED.load(Ordering::Relaxed),
        alerts_emitted: ALERTS_EMITTED.load(Ordering::Relaxed),
    }
}

/// Records one dispatch outcome: increments the telemetry counters and
/// notifies `hooks`. Called by `core-commands` after every
/// `dispatch_command`.
pub fn record_dispatch(hooks: &dyn EventHooks, code: u32, handled: bool) {
    COMMANDS_DISPATCHED.fetch_add(1, Ordering::Relaxed);
    if !handled {
        COMMANDS_REJECTED.fetch_add(1, Ordering::Relaxed);
    }
    hooks.on_command_dispatched(code, handled);
}

/// Records and forwards one alert.
pub fn record_alert(hooks: &dyn EventHooks, alert: Alert) {
    ALERTS_EMITTED.fetch_add(1, Ordering::Relaxed);
    tracing::info!(target: "commands.alert", alert = alert.name(), "alert");
    hooks.on_alert(alert);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingHooks {
        alerts: RefCell<Vec<Alert>>,
        dispatches: RefCell<Vec<(u32, bool)>>,
    }

    impl EventHooks for RecordingHooks {
        fn on_alert(&self, alert: Alert) {
            self.alerts.borrow_mut().push(alert);
        }
        fn on_command_dispatched(&self, code: u32, handled: bool) {
            self.dispatches.borrow_mut().push((code, handled));
        }
    }

    #[test]
    fn alert_names_are_stable_snake_case() {
        assert_eq!(Alert::CommandRejected.name(), "command_rejected");
        assert_eq!(Alert::RoutingFailed.name(), "routing_failed");
    }

    #[test]
    fn record_dispatch_notifies_hooks_and_counts() {
        let hooks = RecordingHooks::default();
        let before = snapshot();
        record_dispatch(&hooks, 7, true);
        record_dispatch(&hooks, 9, false);
        let after = snapshot();
        assert_eq!(after.commands_dispatched - before.commands_dispatched, 2);
        assert_eq!(after.commands_rejected - before.commands_rejected, 1);
        assert_eq!(*hooks.dispatches.borrow(), vec![(7, true), (9, false)]);
    }

    #[test]
    fn record_alert_notifies_hooks_and_counts() {
        let hooks = RecordingHooks::default();
        let before = snapshot();
        record_alert(&hooks, Alert::CursorUnlinked);
        let after = snapshot();
        assert_eq!(after.alerts_emitted - before.alerts_emitted, 1);
        assert_eq!(*hooks.alerts.borrow(), vec![Alert::CursorUnlinked]);
    }

    #[test]
    fn motion_route_flag_is_testable_independently() {
        let flags = CommandFlags::MOTION_ROUTE | CommandFlags::IS_MOTION;
        assert!(flags.contains(CommandFlags::MOTION_ROUTE));
        assert!(flags.contains(CommandFlags::IS_MOTION));
        assert!(!CommandFlags::IS_MOTION.contains(CommandFlags::MOTION_ROUTE));
    }

    #[test]
    fn noop_hooks_accept_everything_without_panicking() {
        record_alert(&NoopEventHooks, Alert::Terminating);
        record_dispatch(&NoopEventHooks, 1, false);
    }
}
