//! Driver contracts (spec §6): braille, speech, and screen drivers, plus
//! the restart supervisor a braille driver's `has_failed` flag feeds (spec
//! §7 item 2). The core depends only on these traits; concrete drivers for
//! specific hardware are out of scope (spec Non-goals).

mod braille;
mod error;
mod screen;
mod speech;
mod supervisor;

pub use braille::{BrailleDisplay, BrailleDriver, CommandCode};
pub use error::DriverError;
pub use screen::{ScreenCharacter, ScreenDescription, ScreenDriver};
pub use speech::{SpeechDriver, SpeechLocation};
pub use supervisor::{DriverSupervisor, Restartable, SupervisorState};
