use std::os::unix::io::RawFd;

use core_io_monitor::Interest;
use core_queue::{ElementId, Queue};

use crate::operation::{Extension, Operation};

/// Which end of a function's operation queue is "active": input and output
/// operations are strictly FIFO (head first), but a function that only ever
/// carries monitor operations treats the most recently pushed one as active
/// — "latest registration wins" for pure readiness monitors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    Input,
    Output,
    Monitor,
}

/// Per-descriptor aggregation of pending operations, keyed conceptually by
/// (fd, methods). Created on first operation for a descriptor; the reactor
/// destroys it the tick its operation queue empties.
pub struct FunctionEntry {
    pub(crate) fd: RawFd,
    pub(crate) kind: FunctionKind,
    pub(crate) operations: Queue<Operation>,
}

impl FunctionEntry {
    pub(crate) fn new(fd: RawFd, kind: FunctionKind) -> Self {
        FunctionEntry { fd, kind, operations: Queue::new() }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// The operation the next reactor tick will consider: head of queue for
    /// input/output, tail for monitors.
    pub(crate) fn active_operation(&self) -> Option<ElementId> {
        match self.kind {
            FunctionKind::Monitor => self.operations.get_tail(),
            FunctionKind::Input | FunctionKind::Output => self.operations.get_head(),
        }
    }

    pub(crate) fn interest_for(&self, op: &Operation) -> Interest {
        match (&self.kind, &op.extension) {
            (FunctionKind::Input, _) => Interest::READABLE,
            (FunctionKind::Output, _) => Interest::WRITABLE,
            (FunctionKind::Monitor, Extension::Monitor(state)) => state.interest,
            (FunctionKind::Monitor, _) => Interest::READABLE,
        }
    }
}
