//! The "standard" pre/post hook pair (spec §4.8): snapshots the window
//! before dispatch, and after dispatch notices motion, disables contracted
//! rendering for the next tick, unlinks speech tracking, and initiates
//! cursor routing for `MOTION_ROUTE`-flagged commands. Exposed as plain
//! functions rather than baked into [`crate::CommandStack`] so a caller
//! wires them into a `push_environment` call with whatever ownership
//! pattern (`Rc<RefCell<_>>`, raw borrow splitting, ...) fits its reactor
//! loop.

use core_events::{record_alert, Alert, CommandFlags, EventHooks};
use core_routing::{RoutingBackend, RoutingSupervisor};
use core_session::{Geometry, Session};

/// What the standard pre-hook captures: just the window's current
/// top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub winx: u16,
    pub winy: u16,
}

pub fn standard_pre(session: &Session) -> WindowSnapshot {
    WindowSnapshot { winx: session.winx, winy: session.winy }
}

/// What the standard post-hook decided to do, useful for logging/tests;
/// the binary crate doesn't need to inspect it to get correct behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StandardPostOutcome {
    pub moved: bool,
    pub contracted_rendering_disabled: bool,
    pub speech_tracking_disabled: bool,
    pub routing_started: bool,
}

/// Runs the standard post-hook body. Only acts when `handled` is true — an
/// unclaimed command cannot have moved the window.
#[allow(clippy::too_many_arguments)]
pub fn standard_post<B: RoutingBackend>(
    session: &mut Session,
    before: WindowSnapshot,
    handled: bool,
    flags: CommandFlags,
    speech_tracking_active: &mut bool,
    screen_cursor: (u16, u16),
    screen_number: i32,
    geometry: &Geometry,
    text_count: u16,
    routing: &mut RoutingSupervisor<B>,
    hooks: &dyn EventHooks,
) -> StandardPostOutcome {
    let mut outcome = StandardPostOutcome::default();
    if !handled {
        return outcome;
    }

    let moved = session.winx != before.winx || session.winy != before.winy;
    if moved {
        session.record_motion();
        outcome.moved = true;
        outcome.contracted_rendering_disabled = true;
        if *speech_tracking_active {
            *speech_tracking_active = false;
            outcome.speech_tracking_disabled = true;
            record_alert(hooks, Alert::CursorUnlinked);
        }
    }

    if flags.contains(CommandFlags::MOTION_ROUTE) {
        let text_rows = geometry.text_rows.max(1);
        let in_window = screen_cursor.0 >= session.winx
            && screen_cursor.0 < session.winx.saturating_add(text_count)
            && screen_cursor.1 >= session.winy
            && screen_cursor.1 < session.winy.saturating_add(text_rows);
        if !in_window {
            let target_x =
                screen_cursor.0.clamp(session.winx, session.winx.saturating_add(text_count).saturating_sub(1));
            let target_y =
                screen_cursor.1.clamp(session.winy, session.winy.saturating_add(text_rows).saturating_sub(1));
            outcome.routing_started = routing.route_screen_cursor(target_x, target_y, screen_number);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::NoopEventHooks;
    use core_routing::RoutingStatus;

    struct FakeBackend {
        started: Option<(u16, u16, i32)>,
    }

    impl RoutingBackend for FakeBackend {
        fn start(&mut self, x: u16, y: u16, screen_number: i32) -> bool {
            self.started = Some((x, y, screen_number));
            true
        }
        fn poll(&mut self, _wait: bool) -> RoutingStatus {
            RoutingStatus::Done
        }
    }

    fn geometry() -> Geometry {
        Geometry { cols: 80, rows: 25, text_rows: 25 }
    }

    #[test]
    fn unmoved_window_triggers_nothing() {
        let mut session = Session::new();
        let before = standard_pre(&session);
        let mut speech = true;
        let mut routing = RoutingSupervisor::new(FakeBackend { started: None });
        let outcome = standard_post(
            &mut session,
            before,
            true,
            CommandFlags::empty(),
            &mut speech,
            (0, 0),
            0,
            &geometry(),
            40,
            &mut routing,
            &NoopEventHooks,
        );
        assert_eq!(outcome, StandardPostOutcome::default());
        assert!(speech, "speech tracking must stay on when nothing moved");
    }

    #[test]
    fn moved_window_disables_speech_tracking_and_reports_motion() {
        let mut session = Session::new();
        let before = standard_pre(&session);
        session.winx = 40;
        let mut speech = true;
        let mut routing = RoutingSupervisor::new(FakeBackend { started: None });
        let outcome = standard_post(
            &mut session,
            before,
            true,
            CommandFlags::empty(),
            &mut speech,
            (0, 0),
            0,
            &geometry(),
            40,
            &mut routing,
            &NoopEventHooks,
        );
        assert!(outcome.moved);
        assert!(outcome.contracted_rendering_disabled);
        assert!(outcome.speech_tracking_disabled);
        assert!(!speech);
        assert_eq!((session.motx, session.moty), (40, 0));
    }

    #[test]
    fn motion_route_flag_starts_routing_when_cursor_outside_window() {
        let mut session = Session::new();
        session.winx = 0;
        session.winy = 0;
        let before = standard_pre(&session);
        let mut speech = false;
        let mut routing = RoutingSupervisor::new(FakeBackend { started: None });
        let outcome = standard_post(
            &mut session,
            before,
            true,
            CommandFlags::MOTION_ROUTE,
            &mut speech,
            (90, 0), // outside a 40-wide window and outside 80 columns
            3,
            &geometry(),
            40,
            &mut routing,
            &NoopEventHooks,
        );
        assert!(outcome.routing_started);
    }

    #[test]
    fn motion_route_flag_does_nothing_when_cursor_already_inside_window() {
        let mut session = Session::new();
        let before = standard_pre(&session);
        let mut speech = false;
        let mut routing = RoutingSupervisor::new(FakeBackend { started: None });
        let outcome = standard_post(
            &mut session,
            before,
            true,
            CommandFlags::MOTION_ROUTE,
            &mut speech,
            (5, 0),
            0,
            &geometry(),
            40,
            &mut routing,
            &NoopEventHooks,
        );
        assert!(!outcome.routing_started);
    }

    #[test]
    fn unhandled_command_never_reports_motion() {
        let mut session = Session::new();
        let before = standard_pre(&session);
        session.winx = 40; // pretend something mutated it anyway
        let mut speech = true;
        let mut routing = RoutingSupervisor::new(FakeBackend { started: None });
        let outcome = standard_post(
            &mut session,
            before,
            false,
            CommandFlags::empty(),
            &mut speech,
            (0, 0),
            0,
            &geometry(),
            40,
            &mut routing,
            &NoopEventHooks,
        );
        assert_eq!(outcome, StandardPostOutcome::default());
    }
}
