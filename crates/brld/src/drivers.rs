//! Reference driver implementations: not hardware drivers (those are an
//! explicit spec Non-goal), just enough of [`core_drivers`]'s contracts to
//! run and exercise the daemon without real braille/speech/screen hardware
//! attached. A real deployment links a hardware driver crate against the
//! same traits instead of these.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use core_drivers::{
    BrailleDisplay, BrailleDriver, CommandCode, DriverError, Restartable, ScreenCharacter,
    ScreenDescription, ScreenDriver, SpeechDriver, SpeechLocation,
};
use core_routing::{RoutingBackend, RoutingStatus};

/// Injects [`CommandCode`]s as though they came from a display's keys or
/// routing bar. Shared with whatever is producing input (a test, or — on a
/// real deployment — a transport thread feeding a channel drained here).
pub type CommandQueue = Rc<RefCell<VecDeque<CommandCode>>>;

/// A braille driver with no attached hardware: `write_window`/`write_status`
/// just update the in-memory cell buffer the core already owns, and
/// `read_command` drains an injected queue instead of polling a transport.
pub struct NullBrailleDriver {
    commands: CommandQueue,
    opened: bool,
}

impl NullBrailleDriver {
    pub fn new(commands: CommandQueue) -> Self {
        NullBrailleDriver { commands, opened: false }
    }
}

impl BrailleDriver for NullBrailleDriver {
    fn open(&mut self, parameters: &str) -> Result<(), DriverError> {
        tracing::info!(target: "driver.braille", parameters, "opened null braille driver");
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        tracing::info!(target: "driver.braille", "closed null braille driver");
        self.opened = false;
    }

    fn read_command(&mut self, _context: u32) -> Option<CommandCode> {
        self.commands.borrow_mut().pop_front()
    }

    fn write_window(&mut self, brl: &mut BrailleDisplay, text: &[u8]) -> Result<(), DriverError> {
        if !self.opened {
            return Err(DriverError::ProtocolViolation("write_window before open".into()));
        }
        let n = text.len().min(brl.cells.len());
        brl.cells[..n].copy_from_slice(&text[..n]);
        Ok(())
    }

    fn write_status(&mut self, brl: &mut BrailleDisplay, cells: &[u8]) -> Result<(), DriverError> {
        if !self.opened {
            return Err(DriverError::ProtocolViolation("write_status before open".into()));
        }
        let text_cells = brl.text_columns as usize * brl.text_rows as usize;
        let n = cells.len().min(brl.cells.len().saturating_sub(text_cells));
        brl.cells[text_cells..text_cells + n].copy_from_slice(&cells[..n]);
        Ok(())
    }
}

/// Lets [`core_drivers::DriverSupervisor`] own a [`BrailleDriver`] plus the
/// [`BrailleDisplay`] it writes into: the driver reports failure by
/// mutating the display's `has_failed` flag (spec §6), not through its own
/// state, so the supervisor needs both to decide when to restart.
pub struct BrailleUnit<D: BrailleDriver> {
    driver: D,
    display: BrailleDisplay,
    parameters: String,
}

impl<D: BrailleDriver> BrailleUnit<D> {
    pub fn new(driver: D, display: BrailleDisplay, parameters: impl Into<String>) -> Self {
        BrailleUnit { driver, display, parameters: parameters.into() }
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn display(&self) -> &BrailleDisplay {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut BrailleDisplay {
        &mut self.display
    }

    /// Pushes `text` out to the display through the wrapped driver. A thin
    /// wrapper so callers don't need to borrow `driver` and `display`
    /// separately (both live behind the same `&mut self`).
    pub fn write_window(&mut self, text: &[u8]) -> Result<(), DriverError> {
        self.driver.write_window(&mut self.display, text)
    }
}

impl<D: BrailleDriver> Restartable for BrailleUnit<D> {
    fn open(&mut self) -> Result<(), DriverError> {
        self.driver.open(&self.parameters)?;
        self.display.has_failed = false;
        Ok(())
    }

    fn close(&mut self) {
        self.driver.close();
    }

    fn has_failed(&self) -> bool {
        self.display.has_failed
    }
}

/// A speech driver that logs what it would have spoken instead of talking
/// to a synthesizer.
#[derive(Default)]
pub struct NullSpeechDriver {
    volume: u8,
    rate: u8,
}

impl SpeechDriver for NullSpeechDriver {
    fn construct(&mut self, parameters: &str) -> Result<(), DriverError> {
        tracing::info!(target: "driver.speech", parameters, "constructed null speech driver");
        self.volume = 100;
        self.rate = 100;
        Ok(())
    }

    fn destruct(&mut self) {
        tracing::info!(target: "driver.speech", "destructed null speech driver");
    }

    fn say(&mut self, buffer: &[u8], count: usize, _attributes: Option<&[u8]>) -> Result<(), DriverError> {
        let text = String::from_utf8_lossy(&buffer[..count.min(buffer.len())]);
        tracing::debug!(target: "driver.speech", %text, "say");
        Ok(())
    }

    fn mute(&mut self) -> Result<(), DriverError> {
        tracing::debug!(target: "driver.speech", "mute");
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), DriverError> {
        self.volume = volume.min(100);
        Ok(())
    }

    fn set_rate(&mut self, rate: u8) -> Result<(), DriverError> {
        self.rate = rate.min(100);
        Ok(())
    }

    fn track(&mut self) -> Option<SpeechLocation> {
        None
    }
}

/// A screen driver backed by an in-memory grid of characters instead of a
/// real terminal/framebuffer. Rows shorter than the declared column count
/// pad with spaces, matching how a real screen driver reports a narrower
/// row at the right edge.
pub struct StaticScreenDriver {
    number: i32,
    cols: u16,
    rows_text: Vec<Vec<char>>,
    posx: u16,
    posy: u16,
    cursor: bool,
}

impl StaticScreenDriver {
    pub fn new(number: i32, cols: u16, lines: Vec<&str>) -> Self {
        let rows_text = lines.into_iter().map(|l| l.chars().collect()).collect();
        StaticScreenDriver { number, cols, rows_text, posx: 0, posy: 0, cursor: true }
    }

    pub fn set_cursor(&mut self, x: u16, y: u16) {
        self.posx = x;
        self.posy = y;
    }

    pub fn rows(&self) -> usize {
        self.rows_text.len()
    }
}

impl ScreenDriver for StaticScreenDriver {
    fn describe_screen(&mut self) -> Result<ScreenDescription, DriverError> {
        Ok(ScreenDescription {
            number: self.number,
            cols: self.cols,
            rows: self.rows_text.len() as u16,
            posx: self.posx,
            posy: self.posy,
            cursor: self.cursor,
        })
    }

    fn read_screen_row(&mut self, y: u16, length: u16) -> Result<Vec<ScreenCharacter>, DriverError> {
        let row = self.rows_text.get(y as usize).map(|r| r.as_slice()).unwrap_or(&[]);
        let mut out = Vec::with_capacity(length as usize);
        for i in 0..length {
            let ch = row.get(i as usize).copied().unwrap_or(' ');
            out.push(ScreenCharacter { text: ch, attributes: 0 });
        }
        Ok(out)
    }

    fn user_virtual_terminal(&mut self) -> Result<i32, DriverError> {
        Ok(self.number)
    }
}

/// A routing backend that completes every request immediately and
/// successfully. A real deployment synthesizes input events against the
/// attached screen driver's transport; that mechanism is outside this
/// crate's scope (spec §4.9 names only the status bookkeeping).
pub struct ImmediateRoutingBackend;

impl RoutingBackend for ImmediateRoutingBackend {
    fn start(&mut self, x: u16, y: u16, screen_number: i32) -> bool {
        tracing::debug!(target: "routing", x, y, screen_number, "routing started");
        true
    }

    fn poll(&mut self, _wait: bool) -> RoutingStatus {
        RoutingStatus::Done
    }
}
