//! Command codes the daemon's handler stack understands. Keeping these as
//! named constants (rather than a closed enum) mirrors BRLTTY's own
//! `CMD_*` numbering scheme, which a real braille driver's key tables
//! target directly.

use core_events::CommandFlags;

pub const CMD_FWINLT: u32 = 1;
pub const CMD_FWINRT: u32 = 2;
pub const CMD_LNUP: u32 = 3;
pub const CMD_LNDN: u32 = 4;
pub const CMD_HOME: u32 = 5;

/// The base keyboard context every handler in this daemon is registered
/// under. A fuller implementation would vary this per input mode (menu,
/// learn mode, ...); this daemon only has one.
pub const CONTEXT_DEFAULT: u32 = 0;

/// Looks up the flag set a command code carries, the way the standard
/// post-hook needs it (spec §4.8). Unknown codes carry no flags.
pub fn command_flags(code: u32) -> CommandFlags {
    match code {
        CMD_FWINLT | CMD_FWINRT | CMD_LNUP | CMD_LNDN => CommandFlags::IS_MOTION,
        CMD_HOME => CommandFlags::IS_MOTION | CommandFlags::MOTION_ROUTE,
        _ => CommandFlags::empty(),
    }
}
