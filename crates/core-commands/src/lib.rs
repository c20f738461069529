//! The command handler stack (spec §4.8): environments pushed by name,
//! each holding a stack of context-sensitive handlers, dispatched
//! innermost-first with a pre/post hook pair wrapped around the search.
//! Keystrokes read back from a braille driver become command codes pushed
//! through this stack; the "standard" hook pair (see [`standard_hooks`])
//! is how the core itself tracks window motion and initiates routing.

mod stack;
mod standard_hooks;

pub use stack::CommandStack;
pub use standard_hooks::{standard_post, standard_pre, StandardPostOutcome, WindowSnapshot};

pub use core_events::CommandFlags;
