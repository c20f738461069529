//! Screen driver contract (spec §6): read-only access to the screen being
//! tracked. `describe_screen` feeds [`core_cursor`]'s `ScreenCursor` inputs;
//! `read_screen_row` feeds [`core_window`]'s word-boundary scan.

use crate::error::DriverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDescription {
    pub number: i32,
    pub cols: u16,
    pub rows: u16,
    pub posx: u16,
    pub posy: u16,
    pub cursor: bool,
}

/// One character cell: the glyph and its screen attribute byte (BRLTTY's
/// `ScreenCharacter` convention — colour/attribute encoding is driver
/// specific and opaque to the core).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenCharacter {
    pub text: char,
    pub attributes: u8,
}

pub trait ScreenDriver {
    fn describe_screen(&mut self) -> Result<ScreenDescription, DriverError>;

    /// Fills up to `length` character/attribute pairs from row `y`,
    /// returning however many were actually available (may be fewer than
    /// `length` at the right edge of a narrower row).
    fn read_screen_row(&mut self, y: u16, length: u16) -> Result<Vec<ScreenCharacter>, DriverError>;

    /// The virtual terminal number currently active for this screen.
    fn user_virtual_terminal(&mut self) -> Result<i32, DriverError>;
}
