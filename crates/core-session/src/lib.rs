//! Per-virtual-terminal session state: the braille window's top-left
//! corner, the last motion position, the speech/review cursor, the tracked
//! cursor, and any pending delayed-tracking point. One [`Session`] exists
//! per screen number, created lazily and cached forever in a
//! [`SessionTable`].

use std::collections::HashMap;

/// The screen geometry a [`Session`]'s coordinates must stay within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
    pub text_rows: u16,
}

impl Geometry {
    pub fn max_winx(&self) -> u16 {
        self.cols.saturating_sub(1)
    }

    pub fn max_winy(&self) -> u16 {
        self.rows.saturating_sub(self.text_rows)
    }
}

/// One virtual terminal's persisted view state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub winx: u16,
    pub winy: u16,
    pub motx: u16,
    pub moty: u16,
    pub spkx: u16,
    pub spky: u16,
    pub trkx: u16,
    pub trky: u16,
    /// Delayed-tracking coordinates; `-1` means "no delay pending".
    dctx: i32,
    dcty: i32,
    pub track_screen_cursor: bool,
    pub hide_screen_cursor: bool,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            winx: 0,
            winy: 0,
            motx: 0,
            moty: 0,
            spkx: 0,
            spky: 0,
            trkx: 0,
            trky: 0,
            dctx: -1,
            dcty: -1,
            track_screen_cursor: true,
            hide_screen_cursor: false,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_delayed_tracking(&self) -> bool {
        self.dctx >= 0
    }

    pub fn delayed_tracking_point(&self) -> Option<(u16, u16)> {
        self.has_delayed_tracking().then_some((self.dctx as u16, self.dcty as u16))
    }

    pub fn arm_delayed_tracking(&mut self, x: u16, y: u16) {
        self.dctx = x as i32;
        self.dcty = y as i32;
    }

    pub fn clear_delayed_tracking(&mut self) {
        self.dctx = -1;
        self.dcty = -1;
    }

    /// Clamps every stored coordinate into `geometry`, enforcing the
    /// invariant `winx ∈ [0, max(cols-1,0)]`, `winy ∈ [0, max(rows-textRows,0)]`
    /// (and the same bound for `motx/moty`) after any update that might
    /// have moved the window or the screen size changed underneath it.
    pub fn clamp_to(&mut self, geometry: &Geometry) {
        let max_x = geometry.max_winx();
        let max_y = geometry.max_winy();
        self.winx = self.winx.min(max_x);
        self.winy = self.winy.min(max_y);
        self.motx = self.motx.min(max_x);
        self.moty = self.moty.min(max_y);
        debug_assert!(self.winx <= max_x);
        debug_assert!(self.winy <= max_y);
    }

    /// Records the window's current position as the last-known motion
    /// point, used by the command post-hook to detect whether a command
    /// moved the window.
    pub fn record_motion(&mut self) {
        self.motx = self.winx;
        self.moty = self.winy;
    }

    pub fn moved_since_last_motion(&self) -> bool {
        self.winx != self.motx || self.winy != self.moty
    }
}

/// A table of [`Session`]s keyed by screen number, caching indefinitely.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<i32, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `screen_number`, creating a default one on
    /// first encounter.
    pub fn session_mut(&mut self, screen_number: i32) -> &mut Session {
        self.sessions.entry(screen_number).or_insert_with(Session::new)
    }

    pub fn session(&self, screen_number: i32) -> Option<&Session> {
        self.sessions.get(&screen_number)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
