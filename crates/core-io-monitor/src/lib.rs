//! I/O monitor abstraction: a uniform four-call interface
//! (`prepare_monitors`/`initialize_monitor`/`await_monitors`/`test_monitor`)
//! behind which a single backend is picked at build time. The original
//! source picks between event-handle waits, poll vectors, and select
//! bitsets; this workspace targets Unix and ships a `poll(2)`-backed
//! implementation plus a degenerate timer-only fallback for hosted-but-blind
//! platforms, matching the two backends the reactor actually needs.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use bitflags::bitflags;

bitflags! {
    /// Readiness interest/result bits, shared between registration and the
    /// post-wait readiness test.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Interest: u8 {
        const READABLE = 0b001;
        const WRITABLE = 0b010;
        const EXCEPTION = 0b100;
    }
}

/// A handle to one registration made during the current iteration. Only
/// valid between a `prepare_monitors` call and the next one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorSlot(usize);

/// The uniform interface every I/O monitor backend implements.
pub trait MonitorBackend {
    /// Resets per-iteration state. Called once at the top of each reactor
    /// tick before any `initialize_monitor` calls.
    fn prepare_monitors(&mut self);

    /// Registers interest in `fd`'s readiness per `interest`. Returns a slot
    /// usable with [`MonitorBackend::test_monitor`] after the next
    /// `await_monitors` call.
    fn initialize_monitor(&mut self, fd: RawFd, interest: Interest) -> MonitorSlot;

    /// Blocks until one of the registered slots is ready or `timeout` (`None`
    /// means wait indefinitely) elapses. Returns `Ok(true)` if something
    /// became ready, `Ok(false)` on timeout.
    fn await_monitors(&mut self, timeout: Option<Duration>) -> io::Result<bool>;

    /// Tests whether `slot` is among the ready registrations from the most
    /// recent `await_monitors` call. Returns the subset of the original
    /// interest that fired.
    fn test_monitor(&self, slot: MonitorSlot) -> Interest;
}

/// `poll(2)`-backed monitor: one `pollfd` entry per registration, a single
/// `poll()` syscall per iteration. This is the direct analogue of the
/// original's `HAVE_SYS_POLL_H` backend.
#[derive(Default)]
pub struct PollBackend {
    entries: Vec<libc::pollfd>,
}

fn interest_to_events(interest: Interest) -> libc::c_short {
    let mut events: libc::c_short = 0;
    if interest.contains(Interest::READABLE) {
        events |= libc::POLLIN;
    }
    if interest.contains(Interest::WRITABLE) {
        events |= libc::POLLOUT;
    }
    if interest.contains(Interest::EXCEPTION) {
        events |= libc::POLLPRI;
    }
    events
}

fn revents_to_interest(revents: libc::c_short) -> Interest {
    let mut ready = Interest::empty();
    if revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
        ready |= Interest::READABLE;
    }
    if revents & libc::POLLOUT != 0 {
        ready |= Interest::WRITABLE;
    }
    if revents & (libc::POLLPRI | libc::POLLERR) != 0 {
        ready |= Interest::EXCEPTION;
    }
    ready
}

impl PollBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MonitorBackend for PollBackend {
    fn prepare_monitors(&mut self) {
        self.entries.clear();
    }

    fn initialize_monitor(&mut self, fd: RawFd, interest: Interest) -> MonitorSlot {
        let slot = MonitorSlot(self.entries.len());
        self.entries.push(libc::pollfd { fd, events: interest_to_events(interest), revents: 0 });
        slot
    }

    fn await_monitors(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        if self.entries.is_empty() {
            if let Some(d) = timeout {
                std::thread::sleep(d);
            }
            return Ok(false);
        }
        let timeout_ms: libc::c_int = match timeout {
            Some(d) => d.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
            None => -1,
        };
        let rc = unsafe {
            libc::poll(self.entries.as_mut_ptr(), self.entries.len() as libc::nfds_t, timeout_ms)
        };
        match rc {
            -1 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
            0 => Ok(false),
            _ => Ok(true),
        }
    }

    fn test_monitor(&self, slot: MonitorSlot) -> Interest {
        self.entries.get(slot.0).map(|e| revents_to_interest(e.revents)).unwrap_or(Interest::empty())
    }
}

/// Degenerate backend for platforms (or test harnesses) with no readiness
/// primitive at all: every wait simply sleeps for the requested timeout
/// and reports nothing ready, so the reactor falls back to pure timer
/// scheduling.
#[derive(Default)]
pub struct TimerOnlyBackend {
    registered: usize,
}

impl TimerOnlyBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MonitorBackend for TimerOnlyBackend {
    fn prepare_monitors(&mut self) {
        self.registered = 0;
    }

    fn initialize_monitor(&mut self, _fd: RawFd, _interest: Interest) -> MonitorSlot {
        let slot = MonitorSlot(self.registered);
        self.registered += 1;
        slot
    }

    fn await_monitors(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        if let Some(d) = timeout {
            std::thread::sleep(d);
        }
        Ok(false)
    }

    fn test_monitor(&self, _slot: MonitorSlot) -> Interest {
        Interest::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    fn make_pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    #[test]
    fn poll_backend_reports_not_ready_on_timeout() {
        let (read_fd, _write_fd) = make_pipe();
        let mut backend = PollBackend::new();
        backend.prepare_monitors();
        let slot = backend.initialize_monitor(read_fd.as_raw_fd(), Interest::READABLE);
        let ready = backend.await_monitors(Some(Duration::from_millis(20))).unwrap();
        assert!(!ready);
        assert_eq!(backend.test_monitor(slot), Interest::empty());
    }

    #[test]
    fn poll_backend_reports_readable_after_write() {
        let (read_fd, mut write_fd) = make_pipe();
        let mut backend = PollBackend::new();
        backend.prepare_monitors();
        let slot = backend.initialize_monitor(read_fd.as_raw_fd(), Interest::READABLE);

        let mut file = unsafe { std::fs::File::from_raw_fd(write_fd.as_raw_fd()) };
        file.write_all(b"x").unwrap();
        std::mem::forget(file); // fd owned by write_fd, avoid double-close

        let ready = backend.await_monitors(Some(Duration::from_millis(200))).unwrap();
        assert!(ready);
        assert!(backend.test_monitor(slot).contains(Interest::READABLE));
        let _ = write_fd;
    }

    #[test]
    fn empty_poll_backend_sleeps_and_reports_not_ready() {
        let mut backend = PollBackend::new();
        backend.prepare_monitors();
        let start = std::time::Instant::now();
        let ready = backend.await_monitors(Some(Duration::from_millis(20))).unwrap();
        assert!(!ready);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn timer_only_backend_never_ready() {
        let mut backend = TimerOnlyBackend::new();
        backend.prepare_monitors();
        let slot = backend.initialize_monitor(0, Interest::READABLE);
        let ready = backend.await_monitors(Some(Duration::from_millis(5))).unwrap();
        assert!(!ready);
        assert_eq!(backend.test_monitor(slot), Interest::empty());
    }
}
