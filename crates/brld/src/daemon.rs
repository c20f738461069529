//! Wires every `core-*` crate into a running daemon: the reactor drives
//! one `brltty_wait` slice per loop; each slice first drains any pending
//! braille-driver commands through the handler stack, then re-tracks the
//! screen cursor, then waits for the next thing to happen.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use core_commands::{standard_post, standard_pre, CommandStack, WindowSnapshot};
use core_cursor::ScreenCursor;
use core_drivers::{BrailleDisplay, DriverSupervisor, Restartable, ScreenDriver, SpeechDriver};
use core_events::{Alert, EventHooks};
use core_io_monitor::PollBackend;
use core_reactor::{with_poll_backend, Reactor};
use core_routing::RoutingSupervisor;
use core_session::{Geometry, SessionTable};
use core_termination::{brltty_wait, ExitCode, SignalBridge, TerminationCounter, WaitConditions, WaitResult};
use core_time::MonotonicClock;

use crate::commands::{self, command_flags, CONTEXT_DEFAULT};
use crate::drivers::{BrailleUnit, CommandQueue, ImmediateRoutingBackend, NullBrailleDriver, NullSpeechDriver, StaticScreenDriver};

/// Everything the command handler stack and the cursor tracker share.
/// Held behind `Rc<RefCell<_>>` rather than threaded as plain borrows
/// because the handler stack's closures and the main loop both need
/// concurrent (in the single-thread, re-entrant sense) access to it —
/// the spec's own design notes call out exactly this tradeoff ("thread a
/// Context through the command-handler invocations").
struct SharedState {
    sessions: SessionTable,
    routing: RoutingSupervisor<ImmediateRoutingBackend>,
    speech_tracking_active: bool,
    screen_number: i32,
    screen_cursor: (u16, u16),
    geometry: Geometry,
    text_count: u16,
}

#[derive(Clone, Copy)]
struct LoggingHooks;

impl EventHooks for LoggingHooks {
    fn on_alert(&self, alert: Alert) {
        tracing::info!(target: "alert", alert = alert.name(), "alert_fired");
    }

    fn on_command_dispatched(&self, code: u32, handled: bool) {
        tracing::trace!(target: "commands", code, handled, "dispatched");
    }
}

fn termination_handler(
    clock: MonotonicClock,
    counter: Rc<RefCell<TerminationCounter>>,
    terminate_flag: Rc<Cell<bool>>,
) -> impl FnMut() + 'static {
    move || {
        let now = clock.now();
        let outcome = counter.borrow_mut().observe_signal(now);
        if outcome.exit_immediately {
            tracing::error!(target: "termination", count = outcome.count, "repeated termination signal, exiting immediately");
            std::process::exit(ExitCode::Force.code());
        }
        tracing::info!(target: "termination", count = outcome.count, "termination requested");
        terminate_flag.set(true);
    }
}

fn push_motion_handlers(commands: &mut CommandStack, shared: Rc<RefCell<SharedState>>) {
    let fwinlt = shared.clone();
    commands.push_handler("fwinlt", None, move |code| {
        if code != commands::CMD_FWINLT {
            return false;
        }
        let mut s = fwinlt.borrow_mut();
        let SharedState { sessions, screen_number, geometry, text_count, .. } = &mut *s;
        let session = sessions.session_mut(*screen_number);
        session.winx = core_window::shift_by_text_count(session.winx, *text_count, false, geometry);
        true
    });

    let fwinrt = shared.clone();
    commands.push_handler("fwinrt", None, move |code| {
        if code != commands::CMD_FWINRT {
            return false;
        }
        let mut s = fwinrt.borrow_mut();
        let SharedState { sessions, screen_number, geometry, text_count, .. } = &mut *s;
        let session = sessions.session_mut(*screen_number);
        session.winx = core_window::shift_by_text_count(session.winx, *text_count, true, geometry);
        true
    });

    let lnup = shared.clone();
    commands.push_handler("lnup", None, move |code| {
        if code != commands::CMD_LNUP {
            return false;
        }
        let mut s = lnup.borrow_mut();
        let SharedState { sessions, screen_number, geometry, .. } = &mut *s;
        let session = sessions.session_mut(*screen_number);
        session.winy = core_window::move_vertically(session.winy, -1, geometry);
        true
    });

    let lndn = shared.clone();
    commands.push_handler("lndn", None, move |code| {
        if code != commands::CMD_LNDN {
            return false;
        }
        let mut s = lndn.borrow_mut();
        let SharedState { sessions, screen_number, geometry, .. } = &mut *s;
        let session = sessions.session_mut(*screen_number);
        session.winy = core_window::move_vertically(session.winy, 1, geometry);
        true
    });

    let home = shared.clone();
    commands.push_handler("home", None, move |code| {
        if code != commands::CMD_HOME {
            return false;
        }
        let mut s = home.borrow_mut();
        let SharedState { sessions, screen_number, geometry, text_count, screen_cursor, .. } = &mut *s;
        let session = sessions.session_mut(*screen_number);
        session.winx =
            core_window::place_horizontally(screen_cursor.0, *text_count, core_window::HorizontalPolicy::Paging);
        session.winy = core_window::slide_vertically(session.winy, screen_cursor.1, geometry.text_rows);
        session.clamp_to(geometry);
        true
    });
}

/// Owns the reactor and every stateful piece it drives: the command
/// handler stack, the session table, the driver supervisor, and the
/// termination machinery.
pub struct Daemon {
    reactor: Reactor<PollBackend>,
    commands: CommandStack,
    shared: Rc<RefCell<SharedState>>,
    braille: DriverSupervisor<BrailleUnit<NullBrailleDriver>>,
    screen: StaticScreenDriver,
    speech: NullSpeechDriver,
    command_queue: CommandQueue,
    terminate_flag: Rc<Cell<bool>>,
    termination_counter: Rc<RefCell<TerminationCounter>>,
    sig_clock: MonotonicClock,
    _signal_bridge: SignalBridge,
    config: core_config::Config,
    hooks: LoggingHooks,
}

impl Daemon {
    pub fn new(mut config: core_config::Config) -> anyhow::Result<Self> {
        let mut reactor = with_poll_backend()?;
        let mut signal_bridge = SignalBridge::new()?;

        let terminate_flag = Rc::new(Cell::new(false));
        let sig_clock = MonotonicClock::new();
        let termination_counter = Rc::new(RefCell::new(TerminationCounter::new(Duration::from_secs(2), 3)));

        signal_bridge.register_signal(
            libc::SIGTERM,
            termination_handler(sig_clock, termination_counter.clone(), terminate_flag.clone()),
        );
        signal_bridge.register_signal(
            libc::SIGINT,
            termination_handler(sig_clock, termination_counter.clone(), terminate_flag.clone()),
        );
        signal_bridge.install_into(&mut reactor);

        let command_queue: CommandQueue = Rc::new(RefCell::new(VecDeque::new()));
        let text_columns = 40u16;
        let display = BrailleDisplay::new(text_columns, 1, 0, 0);
        let unit = BrailleUnit::new(NullBrailleDriver::new(command_queue.clone()), display, "");
        let mut braille = DriverSupervisor::new(unit, Duration::from_millis(500), Duration::from_secs(30), 5);
        braille.driver_mut().open()?;

        let mut speech = NullSpeechDriver::default();
        speech.construct("")?;

        let screen = StaticScreenDriver::new(
            0,
            80,
            vec![
                "Welcome to brld, a braille/speech relay daemon.",
                "Word-wrap shifting demo: hello world wide web of braille terminals.",
            ],
        );

        config.apply_context(core_config::ConfigContext::new(text_columns, 1));

        let geometry = Geometry { cols: 80, rows: 2, text_rows: 1 };
        let shared = Rc::new(RefCell::new(SharedState {
            sessions: SessionTable::new(),
            routing: RoutingSupervisor::new(ImmediateRoutingBackend),
            speech_tracking_active: config.effective_track_screen_cursor,
            screen_number: 0,
            screen_cursor: (0, 0),
            geometry,
            text_count: text_columns,
        }));

        let mut commands = CommandStack::new();
        let pre_shared = shared.clone();
        let post_shared = shared.clone();
        commands.push_environment(
            "screen",
            move || -> Box<dyn std::any::Any> {
                let mut s = pre_shared.borrow_mut();
                let screen_number = s.screen_number;
                let session = s.sessions.session_mut(screen_number);
                Box::new(standard_pre(session))
            },
            move |state, code, handled| {
                let before = *state.downcast::<WindowSnapshot>().expect("standard pre state");
                let mut s = post_shared.borrow_mut();
                let SharedState {
                    sessions,
                    routing,
                    speech_tracking_active,
                    screen_number,
                    screen_cursor,
                    geometry,
                    text_count,
                } = &mut *s;
                let session = sessions.session_mut(*screen_number);
                let outcome = standard_post(
                    session,
                    before,
                    handled,
                    command_flags(code),
                    speech_tracking_active,
                    *screen_cursor,
                    *screen_number,
                    geometry,
                    *text_count,
                    routing,
                    &LoggingHooks,
                );
                if outcome.moved {
                    tracing::trace!(target: "commands", code, routing_started = outcome.routing_started, "window_moved");
                }
            },
        );
        push_motion_handlers(&mut commands, shared.clone());

        Ok(Daemon {
            reactor,
            commands,
            shared,
            braille,
            screen,
            speech,
            command_queue,
            terminate_flag,
            termination_counter,
            sig_clock,
            _signal_bridge: signal_bridge,
            config,
            hooks: LoggingHooks,
        })
    }

    /// Lets a caller (or a test) inject a command as if a braille display's
    /// key or routing bar had produced it.
    pub fn inject_command(&self, code: u32) {
        self.command_queue.borrow_mut().push_back(code);
    }

    pub fn move_screen_cursor(&mut self, x: u16, y: u16) {
        self.screen.set_cursor(x, y);
    }

    fn poll_commands(&mut self) {
        loop {
            let code = self.braille.driver_mut().driver_mut().read_command(CONTEXT_DEFAULT);
            let Some(code) = code else { break };
            self.commands.dispatch(code, CONTEXT_DEFAULT, &self.hooks);
        }
    }

    fn track_cursor(&mut self) {
        let Ok(desc) = self.screen.describe_screen() else { return };

        let (screen_number, text_count, geometry, should_track) = {
            let mut shared = self.shared.borrow_mut();
            shared.screen_cursor = (desc.posx, desc.posy);
            shared.screen_number = desc.number;
            shared.geometry = Geometry { cols: desc.cols, rows: desc.rows, text_rows: shared.geometry.text_rows };
            (shared.screen_number, shared.text_count, shared.geometry, self.config.effective_track_screen_cursor)
        };

        if !should_track {
            return;
        }

        let cfg = core_cursor::TrackerConfig {
            place: false,
            cursor_tracking_delay: self.config.file.cursor.cursor_tracking_delay,
            contracted_tracking_active: false,
            sliding_braille_window: self.config.file.window.sliding_braille_window,
            eager_sliding_braille_window: self.config.file.window.eager_sliding_braille_window,
            word_wrap_length: None,
            geometry,
            text_count,
        };
        let scr = ScreenCursor { posx: desc.posx, posy: desc.posy, visible: desc.cursor };

        let mut shared = self.shared.borrow_mut();
        let session = shared.sessions.session_mut(screen_number);
        core_cursor::track(session, scr, &cfg, &mut self.reactor, || {});
    }

    fn render(&mut self) {
        let Ok(desc) = self.screen.describe_screen() else { return };
        let (winx, winy, text_count) = {
            let shared = self.shared.borrow();
            let session = shared.sessions.session(desc.number);
            let (winx, winy) = session.map(|s| (s.winx, s.winy)).unwrap_or((0, 0));
            (winx, winy, shared.text_count)
        };
        let Ok(row) = self.screen.read_screen_row(winy, winx.saturating_add(text_count)) else { return };
        let text: Vec<u8> = row.iter().skip(winx as usize).take(text_count as usize).map(|c| c.text as u8).collect();
        if let Err(err) = self.braille.driver_mut().write_window(&text) {
            tracing::warn!(target: "driver.braille", %err, "write_window failed");
        }
    }

    /// The top-level daemon loop: poll pending commands, re-track the
    /// cursor, render the current window, then idle in `brltty_wait` until
    /// the next thing happens. Exits once a termination signal has set the
    /// shared flag.
    ///
    /// Termination is observed with the granularity of one `slice`
    /// (deliberately short) rather than interrupting an in-flight wait,
    /// since the flag a signal sets lives outside the fixed `&mut bool`
    /// `brltty_wait` polls within a single call.
    pub fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!(target: "runtime", "brld daemon starting");
        let slice = Duration::from_millis(150);

        loop {
            self.poll_commands();
            self.track_cursor();
            self.render();

            if self.terminate_flag.get() {
                break;
            }

            let mut terminate = false;
            let mut routing_ready = false;
            let mut driver_failed = self.braille.driver().has_failed();
            let clock = self.sig_clock;

            let reactor = &mut self.reactor;
            let braille = &mut self.braille;
            let result = brltty_wait(
                reactor,
                slice,
                WaitConditions {
                    terminate_requested: &mut terminate,
                    routing_ready: &mut routing_ready,
                    driver_failed: &mut driver_failed,
                },
                || {},
                || {
                    braille.poll(&clock);
                },
            );

            if result == WaitResult::Stop || self.terminate_flag.get() {
                break;
            }
        }

        tracing::info!(target: "runtime", "brld daemon shutting down");
        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.braille.driver_mut().close();
        self.speech.destruct();
    }

    pub fn termination_count(&self) -> u32 {
        self.termination_counter.borrow().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_daemon() -> Daemon {
        Daemon::new(core_config::Config::default()).expect("daemon constructs")
    }

    #[test]
    fn fwinrt_shifts_window_forward() {
        let mut daemon = test_daemon();
        daemon.track_cursor();
        daemon.inject_command(commands::CMD_FWINRT);
        daemon.poll_commands();
        let winx = daemon.shared.borrow().sessions.session(0).unwrap().winx;
        assert!(winx > 0);
    }

    #[test]
    fn unknown_command_is_rejected_without_panicking() {
        let mut daemon = test_daemon();
        daemon.track_cursor();
        daemon.inject_command(999);
        daemon.poll_commands();
        let winx = daemon.shared.borrow().sessions.session(0).unwrap().winx;
        assert_eq!(winx, 0);
    }

    #[test]
    fn home_recentres_on_screen_cursor() {
        let mut daemon = test_daemon();
        daemon.move_screen_cursor(50, 0);
        daemon.track_cursor();
        daemon.inject_command(commands::CMD_FWINRT);
        daemon.poll_commands();
        daemon.inject_command(commands::CMD_HOME);
        daemon.poll_commands();
        let winx = daemon.shared.borrow().sessions.session(0).unwrap().winx;
        assert_eq!(winx, (50 / 40) * 40);
    }

    #[test]
    fn cursor_tracking_moves_window_toward_cursor() {
        let mut daemon = test_daemon();
        daemon.move_screen_cursor(60, 0);
        daemon.track_cursor();
        let winx = daemon.shared.borrow().sessions.session(0).unwrap().winx;
        assert!(winx > 0, "tracking should have shifted the window toward column 60");
    }

    #[test]
    fn render_does_not_panic_with_no_display_attached() {
        let mut daemon = test_daemon();
        daemon.track_cursor();
        daemon.render();
    }
}
