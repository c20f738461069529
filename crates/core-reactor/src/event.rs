//! Cross-thread event and task posting. Both are non-blocking handoffs from
//! any thread into the reactor thread: an event carries an opaque payload to
//! a previously registered callback; a task carries a plain closure to run
//! once on the reactor thread, optionally with the poster blocking until it
//! has run (`run_core_task`, BRLTTY's `runCoreTask` cooperative-RPC
//! pattern).

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};

/// Reserved event id carrying task closures; user-registered events start
/// numbering at 1.
pub(crate) const TASK_EVENT_ID: u64 = 0;

/// Handle returned by [`crate::Reactor::new_event`], used to address later
/// [`EventPoster::signal`] calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventHandle(pub(crate) u64);

pub(crate) struct PostedEvent {
    pub(crate) event_id: u64,
    pub(crate) payload: Box<dyn Any + Send>,
}

pub(crate) type EventHandlers = Rc<RefCell<HashMap<u64, Box<dyn FnMut(Box<dyn Any>)>>>>;

/// A cloneable, `Send` handle that lets any thread wake the reactor and
/// hand it a payload. This is the only way into the reactor from outside
/// its own thread.
#[derive(Clone)]
pub struct EventPoster {
    pub(crate) tx: Sender<PostedEvent>,
    pub(crate) wake_fd: RawFd,
}

impl EventPoster {
    fn wake(&self) {
        let byte = [1u8];
        unsafe {
            libc::write(self.wake_fd, byte.as_ptr() as *const _, 1);
        }
    }

    /// Delivers `payload` to the callback registered under `handle`.
    /// Non-blocking; wakes the reactor if it is sleeping in `awaitMonitors`.
    pub fn signal(&self, handle: EventHandle, payload: Box<dyn Any + Send>) -> anyhow::Result<()> {
        self.tx.send(PostedEvent { event_id: handle.0, payload })?;
        self.wake();
        Ok(())
    }

    pub(crate) fn post_task(&self, task: Box<dyn FnOnce() + Send>) -> anyhow::Result<()> {
        self.tx.send(PostedEvent { event_id: TASK_EVENT_ID, payload: Box::new(TaskCell::new(task)) })?;
        self.wake();
        Ok(())
    }
}

/// `FnOnce` boxes aren't directly downcastable (they don't implement `Any`
/// in a way that lets us call them after downcasting a trait object), so
/// tasks are wrapped in a cell that can be `take()`n once and is otherwise
/// inert.
pub(crate) struct TaskCell {
    inner: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl TaskCell {
    fn new(f: Box<dyn FnOnce() + Send>) -> Self {
        TaskCell { inner: Mutex::new(Some(f)) }
    }

    pub(crate) fn take(&self) -> Option<Box<dyn FnOnce() + Send>> {
        self.inner.lock().unwrap().take()
    }
}

/// The "done" rendezvous for [`run_core_task`]: the task's wrapper flips
/// this to `true` and notifies once the callback has actually run on the
/// reactor thread.
pub(crate) struct TaskDone {
    pub(crate) done: Mutex<bool>,
    pub(crate) condvar: Condvar,
}

/// Posts `callback` to run on the reactor thread and blocks the calling
/// thread until it has completed. Mirrors the original's `runCoreTask`:
/// a cooperative RPC from outside the reactor thread into it.
pub fn run_core_task<F>(poster: &EventPoster, callback: F) -> anyhow::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    let done = Arc::new(TaskDone { done: Mutex::new(false), condvar: Condvar::new() });
    let done_for_task = done.clone();
    let wrapped: Box<dyn FnOnce() + Send> = Box::new(move || {
        callback();
        let mut flag = done_for_task.done.lock().unwrap();
        *flag = true;
        done_for_task.condvar.notify_all();
    });
    poster.post_task(wrapped)?;

    let mut flag = done.done.lock().unwrap();
    while !*flag {
        flag = done.condvar.wait(flag).unwrap();
    }
    Ok(())
}
