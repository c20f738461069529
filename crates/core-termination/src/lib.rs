//! Termination handling (spec §4.10): the debounced signal counter that
//! decides between a graceful shutdown and an immediate forced exit, the
//! self-pipe bridge that gets a signal off the handler's stack and onto the
//! reactor thread, and `brltty_wait`, the core's top-level idle loop.

mod counter;
mod exit_code;
mod signal;
mod wait;

pub use counter::{TerminationCounter, TerminationOutcome};
pub use exit_code::ExitCode;
pub use signal::SignalBridge;
pub use wait::{brltty_wait, WaitConditions, WaitResult};
