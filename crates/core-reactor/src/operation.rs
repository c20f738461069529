//! Operation entries: one pending async action against a function entry.
//! See spec discussion in the crate root for the dispatch algorithm that
//! drives these through their lifecycle.

use core_io_monitor::Interest;

/// The per-kind payload of an [`Operation`]. Input accumulates bytes into a
/// bounded buffer across reads; output drains a caller-supplied buffer;
/// monitor carries no transfer state at all, just a readiness callback.
pub enum Extension {
    Input(InputState),
    Output(OutputState),
    Monitor(MonitorState),
}

pub struct InputState {
    pub(crate) buffer: Vec<u8>,
    pub(crate) size: usize,
    pub(crate) length: usize,
    pub(crate) end: bool,
    pub(crate) callback: Box<dyn FnMut(&[u8], bool, Option<i32>) -> usize>,
}

impl InputState {
    pub fn new(size: usize, callback: impl FnMut(&[u8], bool, Option<i32>) -> usize + 'static) -> Self {
        InputState { buffer: vec![0u8; size], size, length: 0, end: false, callback: Box::new(callback) }
    }
}

pub struct OutputState {
    pub(crate) buffer: Vec<u8>,
    pub(crate) size: usize,
    pub(crate) length: usize,
    pub(crate) callback: Option<Box<dyn FnOnce(&[u8], Option<i32>)>>,
}

impl OutputState {
    pub fn new(buffer: Vec<u8>, callback: impl FnOnce(&[u8], Option<i32>) + 'static) -> Self {
        let size = buffer.len();
        OutputState { buffer, size, length: 0, callback: Some(Box::new(callback)) }
    }
}

pub struct MonitorState {
    pub(crate) interest: Interest,
    pub(crate) callback: Box<dyn FnMut() -> bool>,
}

impl MonitorState {
    pub fn new(interest: Interest, callback: impl FnMut() -> bool + 'static) -> Self {
        MonitorState { interest, callback: Box::new(callback) }
    }
}

/// One pending async action. `active` is set while its callback is
/// executing; `cancel` marks it for removal at the next safe point;
/// `finished` means the underlying transfer (or the readiness event, for
/// monitors) has completed and the callback is due to run.
pub struct Operation {
    pub(crate) extension: Extension,
    pub(crate) active: bool,
    pub(crate) cancel: bool,
    pub(crate) finished: bool,
    pub(crate) error: Option<i32>,
}

impl Operation {
    pub(crate) fn new(extension: Extension) -> Self {
        Operation { extension, active: false, cancel: false, finished: false, error: None }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn last_error(&self) -> Option<i32> {
        self.error
    }

    /// `0 ≤ length ≤ size` invariant check, exposed for tests and debug
    /// assertions at call sites.
    pub fn length_within_size(&self) -> bool {
        match &self.extension {
            Extension::Input(s) => s.length <= s.size,
            Extension::Output(s) => s.length <= s.size,
            Extension::Monitor(_) => true,
        }
    }
}
