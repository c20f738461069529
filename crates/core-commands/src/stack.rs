//! The generic environment/handler stack (spec §4.8, mechanism half):
//! environments pushed by name, each holding a pre/post hook pair and its
//! own stack of command handlers. Dispatch walks the whole stack innermost
//! environment first, handlers within an environment in reverse push
//! order, and stops at the first handler that claims the command.

use std::any::Any;

use core_events::{record_alert, record_dispatch, Alert, EventHooks};

type PreHook = Box<dyn FnMut() -> Box<dyn Any>>;
type PostHook = Box<dyn FnMut(Box<dyn Any>, u32, bool)>;

struct HandlerEntry {
    name: &'static str,
    /// `None` means the handler is tried regardless of keyboard context;
    /// `Some(ctx)` restricts it to dispatches made with that context.
    keyboard_context: Option<u32>,
    predicate: Box<dyn FnMut(u32) -> bool>,
}

struct Environment {
    name: &'static str,
    pre: PreHook,
    post: PostHook,
    handlers: Vec<HandlerEntry>,
}

/// The command handler stack itself: a stack of named environments, each
/// owning its own stack of named handlers.
#[derive(Default)]
pub struct CommandStack {
    environments: Vec<Environment>,
}

impl CommandStack {
    pub fn new() -> Self {
        CommandStack { environments: Vec::new() }
    }

    pub fn push_environment(
        &mut self,
        name: &'static str,
        pre: impl FnMut() -> Box<dyn Any> + 'static,
        post: impl FnMut(Box<dyn Any>, u32, bool) + 'static,
    ) {
        self.environments.push(Environment {
            name,
            pre: Box::new(pre),
            post: Box::new(post),
            handlers: Vec::new(),
        });
    }

    /// Pops the innermost environment. Returns `false` if the stack was
    /// empty.
    pub fn pop_environment(&mut self) -> bool {
        self.environments.pop().is_some()
    }

    /// Pushes a handler onto the innermost environment. Returns `false` if
    /// there is no environment to push onto (callers should always push at
    /// least one base environment before any handler).
    pub fn push_handler(
        &mut self,
        name: &'static str,
        keyboard_context: Option<u32>,
        predicate: impl FnMut(u32) -> bool + 'static,
    ) -> bool {
        let Some(env) = self.environments.last_mut() else { return false };
        env.handlers.push(HandlerEntry { name, keyboard_context, predicate: Box::new(predicate) });
        true
    }

    /// Pops the innermost environment's most-recently-pushed handler.
    pub fn pop_handler(&mut self) -> bool {
        self.environments.last_mut().map(|e| e.handlers.pop().is_some()).unwrap_or(false)
    }

    pub fn environment_depth(&self) -> usize {
        self.environments.len()
    }

    pub fn handler_depth(&self) -> usize {
        self.environments.last().map(|e| e.handlers.len()).unwrap_or(0)
    }

    /// Dispatches `command_code` under `keyboard_context`. Runs the
    /// innermost environment's pre-hook, searches for a claiming handler
    /// (innermost environment first, reverse push order within each), then
    /// runs the innermost environment's post-hook with the opaque
    /// pre-state, the command code, and whether it was handled. Fires
    /// [`Alert::CommandRejected`] when nothing claims it.
    pub fn dispatch(&mut self, command_code: u32, keyboard_context: u32, hooks: &dyn EventHooks) -> bool {
        let Some(innermost) = self.environments.len().checked_sub(1) else {
            record_dispatch(hooks, command_code, false);
            record_alert(hooks, Alert::CommandRejected);
            return false;
        };

        let state = (self.environments[innermost].pre)();

        let mut handled = false;
        'search: for env in self.environments.iter_mut().rev() {
            for handler in env.handlers.iter_mut().rev() {
                if let Some(ctx) = handler.keyboard_context {
                    if ctx != keyboard_context {
                        continue;
                    }
                }
                if (handler.predicate)(command_code) {
                    tracing::trace!(target: "commands", env = env.name, handler = handler.name, command_code, "handled");
                    handled = true;
                    break 'search;
                }
            }
        }

        record_dispatch(hooks, command_code, handled);
        if !handled {
            record_alert(hooks, Alert::CommandRejected);
        }

        (self.environments[innermost].post)(state, command_code, handled);
        handled
    }
}
