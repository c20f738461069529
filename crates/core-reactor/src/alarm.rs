use std::time::Duration;

use core_time::TimeValue;

/// Handle to a registered alarm, usable with
/// [`crate::Reactor::cancel_alarm`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AlarmHandle(pub(crate) u64);

impl AlarmHandle {
    /// The handle's raw id, for callers that need to round-trip it through
    /// an opaque token of their own (see `core_cursor::AlarmToken`).
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Reconstructs a handle from a raw id previously obtained via
    /// [`AlarmHandle::raw`].
    pub fn from_raw(id: u64) -> Self {
        AlarmHandle(id)
    }
}

/// An absolute-time entry in the reactor's timer heap. Relative alarms
/// re-arm themselves with `interval` after firing; one-shot alarms (the
/// common case) carry `interval = None` and are dropped after firing.
pub(crate) struct Alarm {
    pub(crate) id: u64,
    pub(crate) deadline: TimeValue,
    pub(crate) interval: Option<Duration>,
    pub(crate) callback: Box<dyn FnMut()>,
}
