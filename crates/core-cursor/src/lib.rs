//! Cursor tracker: moves the braille window to follow the system cursor,
//! with optional delayed tracking to suppress spurious jitter when the
//! cursor briefly visits somewhere and comes straight back.
//!
//! This crate is decoupled from any concrete reactor type via
//! [`AlarmScheduler`] — the one piece of the algorithm (delayed tracking)
//! that needs to arm a timer. `core-reactor`'s `Reactor<B>` implements it
//! directly, so callers just pass their reactor in.

use std::time::Duration;

use core_session::{Geometry, Session};
use core_window::HorizontalPolicy;

/// The system cursor's current screen position and visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenCursor {
    pub posx: u16,
    pub posy: u16,
    pub visible: bool,
}

/// Everything about the current display and preferences needed to decide
/// where the window should go.
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// `place`: force horizontal placement even if the cursor is within the
    /// window (used for an explicit "go to cursor" command).
    pub place: bool,
    /// `0` disables delayed tracking; otherwise the arm delay is
    /// `250 << (cursor_tracking_delay - 1)` ms.
    pub cursor_tracking_delay: u8,
    pub contracted_tracking_active: bool,
    pub sliding_braille_window: bool,
    pub eager_sliding_braille_window: bool,
    pub word_wrap_length: Option<u16>,
    pub geometry: Geometry,
    pub text_count: u16,
}

/// Supplies the characters of one screen row, used only by the contracted-
/// tracking word-boundary scan in step 4. Absent when the caller has no
/// screen content handy (e.g. unit tests exercising the other steps).
pub trait RowSource {
    fn row(&self, y: u16) -> &[char];
}

/// A handle to an armed delayed-tracking alarm, opaque to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmToken(u64);

/// The one reactor capability the cursor tracker needs: arm a one-shot
/// timer and be able to cancel it again before it fires.
pub trait AlarmScheduler {
    fn schedule(&mut self, delay: Duration, callback: Box<dyn FnMut()>) -> AlarmToken;
    fn cancel(&mut self, token: AlarmToken) -> bool;
}

impl<B: core_io_monitor::MonitorBackend> AlarmScheduler for core_reactor::Reactor<B> {
    fn schedule(&mut self, delay: Duration, mut callback: Box<dyn FnMut()>) -> AlarmToken {
        let handle = self.new_relative_alarm(delay, move || callback());
        AlarmToken(handle.raw())
    }

    fn cancel(&mut self, token: AlarmToken) -> bool {
        self.cancel_alarm(core_reactor::AlarmHandle::from_raw(token.0))
    }
}

fn in_window(x: u16, y: u16, session: &Session, text_count: u16, text_rows: u16) -> bool {
    x >= session.winx
        && x < session.winx.saturating_add(text_count)
        && y >= session.winy
        && y < session.winy.saturating_add(text_rows)
}

/// Runs the full 8-step tracking decision for one cursor observation.
/// Returns `false` only when the system cursor is not visible at all;
/// otherwise the window (and/or a pending delay) has been updated and the
/// function returns `true`.
pub fn track(
    session: &mut Session,
    scr: ScreenCursor,
    config: &TrackerConfig,
    scheduler: &mut impl AlarmScheduler,
    on_delay_resolved: impl FnMut() + 'static,
) -> bool {
    track_with_rows(session, scr, config, scheduler, on_delay_resolved, None::<&NoRows>)
}

struct NoRows;
impl RowSource for NoRows {
    fn row(&self, _y: u16) -> &[char] {
        &[]
    }
}

/// Full form of [`track`] that also accepts a [`RowSource`] for the
/// contracted-tracking word-boundary scan (spec §4.7 step 4). Pass `None`
/// when contracted tracking is never active.
pub fn track_with_rows(
    session: &mut Session,
    scr: ScreenCursor,
    config: &TrackerConfig,
    scheduler: &mut impl AlarmScheduler,
    on_delay_resolved: impl FnMut() + 'static,
    rows: Option<&impl RowSource>,
) -> bool {
    // Step 1.
    if !scr.visible {
        return false;
    }

    let text_rows = config.geometry.rows.min(config.geometry.text_rows.max(1));

    // Step 2.
    if config.place {
        session.clear_delayed_tracking();
    } else if let Some((dctx, dcty)) = session.delayed_tracking_point() {
        if scr.posx == dctx && scr.posy == dcty {
            session.clear_delayed_tracking();
            return true;
        }
        if !in_window(scr.posx, scr.posy, session, config.text_count, text_rows) {
            return true; // keep waiting for the alarm or a return-to-origin
        }
    }

    // Step 3.
    if config.cursor_tracking_delay > 0
        && !session.has_delayed_tracking()
        && !in_window(session.trkx, session.trky, session, config.text_count, text_rows)
    {
        let stored = (session.trkx, session.trky);
        session.arm_delayed_tracking(stored.0, stored.1);
        let delay_ms = 250u64 << (config.cursor_tracking_delay.saturating_sub(1));
        let mut on_delay_resolved = on_delay_resolved;
        schedule_delayed_tracking(scheduler, Duration::from_millis(delay_ms), move || {
            on_delay_resolved();
        });
        return true;
    }

    // Step 4.
    if config.contracted_tracking_active {
        session.winy = scr.posy;
        if scr.posx < session.winx {
            session.winx = match rows {
                Some(source) => {
                    core_window::shift_left_word_wrap(source.row(scr.posy), session.winx, config.text_count, Some(scr.posx))
                }
                None => scr.posx,
            };
        }
        session.trkx = scr.posx;
        session.trky = scr.posy;
        return true;
    }

    // Step 5.
    if config.place && !in_window(scr.posx, scr.posy, session, config.text_count, text_rows) {
        let policy =
            if config.sliding_braille_window { HorizontalPolicy::Sliding } else { HorizontalPolicy::Paging };
        session.winx = core_window::place_horizontally(scr.posx, config.text_count, policy);
    } else if config.sliding_braille_window {
        // Step 6: asymmetric eager/non-eager thresholds.
        let trigger = if config.eager_sliding_braille_window { config.text_count * 3 / 20 } else { 0 };
        let reset = config.text_count * 3 / 10;
        if scr.posx < session.winx.saturating_add(trigger) {
            session.winx = scr.posx.saturating_sub(reset);
        } else if scr.posx >= session.winx.saturating_add(config.text_count).saturating_sub(trigger) {
            let target = (scr.posx.saturating_add(reset).saturating_add(1)).min(config.geometry.cols);
            session.winx = target.saturating_sub(config.text_count);
        }
    } else {
        // Step 7: snap in full-window multiples toward the cursor.
        if !in_window(scr.posx, scr.posy, session, config.text_count, text_rows) {
            session.winx = (scr.posx / config.text_count.max(1)) * config.text_count.max(1);
        }
    }

    // Step 8: word-wrap ratchet.
    if let Some(ww_len) = config.word_wrap_length {
        if scr.posx >= session.winx.saturating_add(ww_len) {
            session.winx = session.winx.saturating_add(ww_len);
        }
    }

    session.clamp_to(&config.geometry);

    // Step 9.
    session.winy = core_window::slide_vertically(session.winy, scr.posy, text_rows);

    session.trkx = scr.posx;
    session.trky = scr.posy;
    true
}

fn schedule_delayed_tracking(scheduler: &mut impl AlarmScheduler, delay: Duration, callback: impl FnMut() + 'static) {
    let mut callback = callback;
    scheduler.schedule(delay, Box::new(move || callback()));
}
