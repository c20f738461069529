//! Braille driver contract (spec §6). The core calls [`BrailleDriver::read_command`]
//! from within a reactor monitor callback and pushes the resulting command code onto
//! the [`core_commands::CommandStack`]; it calls `write_window`/`write_status` once
//! per update cycle to push the current braille window's cells out to the display.

use crate::error::DriverError;

/// The geometry and cell buffer the core hands a driver, mirroring BRLTTY's
/// `BrailleDisplay` struct. A driver mutates `has_failed` to request a restart
/// (spec §7.2) and `is_suspended` when the display is temporarily unavailable
/// (screen locked, power save) without being a failure.
pub struct BrailleDisplay {
    pub text_columns: u16,
    pub text_rows: u16,
    pub status_columns: u16,
    pub status_rows: u16,
    pub cells: Vec<u8>,
    pub has_failed: bool,
    pub is_suspended: bool,
    pub no_display: bool,
}

impl BrailleDisplay {
    pub fn new(text_columns: u16, text_rows: u16, status_columns: u16, status_rows: u16) -> Self {
        let cell_count = (text_columns as usize * text_rows as usize)
            + (status_columns as usize * status_rows as usize);
        BrailleDisplay {
            text_columns,
            text_rows,
            status_columns,
            status_rows,
            cells: vec![0; cell_count],
            has_failed: false,
            is_suspended: false,
            no_display: false,
        }
    }
}

/// A command code read back from the display's own keys/routing bar, pushed
/// onto the command handler stack for dispatch.
pub type CommandCode = u32;

pub trait BrailleDriver {
    fn open(&mut self, parameters: &str) -> Result<(), DriverError>;
    fn close(&mut self);

    /// Polls the driver for one pending command, if any. Called from a
    /// reactor monitor callback; must not block.
    fn read_command(&mut self, context: u32) -> Option<CommandCode>;

    fn write_window(&mut self, brl: &mut BrailleDisplay, text: &[u8]) -> Result<(), DriverError>;
    fn write_status(&mut self, brl: &mut BrailleDisplay, cells: &[u8]) -> Result<(), DriverError>;

    /// Dot firmness, driver-defined scale; a no-op default for displays
    /// without adjustable firmness.
    fn set_firmness(&mut self, _level: u8) -> Result<(), DriverError> {
        Ok(())
    }

    /// Key table name, if the driver ships one for the currently attached
    /// model. Most drivers have none.
    fn key_table_name(&self) -> Option<&str> {
        None
    }
}
