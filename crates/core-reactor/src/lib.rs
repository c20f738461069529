//! The single-threaded cooperative reactor: one `handle_operation` call
//! drives exactly one ready operation (a finished read/write, a fired
//! alarm, a cross-thread event) to completion, or returns `false` having
//! only waited. Everything above this crate — sessions, windows, cursor
//! tracking, command dispatch, routing, termination — runs as callbacks
//! registered here.

mod alarm;
mod error;
mod event;
mod function;
mod operation;

pub use alarm::AlarmHandle;
pub use error::AsyncError;
pub use event::{run_core_task, EventHandle, EventPoster};
pub use function::{FunctionEntry, FunctionKind};
pub use operation::{InputState, MonitorState, Operation, OutputState};

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;

use core_io_monitor::{Interest, MonitorBackend, PollBackend};
use core_queue::{ElementId, Queue};
use core_time::{MonotonicClock, TimeValue};

use alarm::Alarm;
use event::{EventHandlers, TaskCell, TASK_EVENT_ID};
use function::FunctionKind as Kind;
use operation::Extension;

/// Handle to a registered async operation (read/write/monitor), usable with
/// [`Reactor::cancel_request`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationHandle {
    function: ElementId,
    operation: ElementId,
}

pub struct Reactor<B: MonitorBackend> {
    functions: Queue<FunctionEntry>,
    backend: B,
    clock: MonotonicClock,
    alarms: Vec<Alarm>,
    next_alarm_id: u64,
    next_event_id: u64,
    event_handlers: EventHandlers,
    poster: EventPoster,
    wake_read_fd: RawFd,
    wake_write_fd: RawFd,
}

/// Builds a reactor backed by the `poll(2)` monitor, the configuration
/// every real deployment on this workspace's target platforms uses.
pub fn with_poll_backend() -> anyhow::Result<Reactor<PollBackend>> {
    Reactor::new(PollBackend::new())
}

impl<B: MonitorBackend> Reactor<B> {
    pub fn new(backend: B) -> anyhow::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(AsyncError::Io(std::io::Error::last_os_error()).into());
        }
        let (read_fd, write_fd) = (fds[0], fds[1]);
        for fd in [read_fd, write_fd] {
            unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            }
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let event_handlers: EventHandlers = Rc::new(RefCell::new(HashMap::new()));
        let handlers_for_wake = event_handlers.clone();

        let drain_callback = move || -> bool {
            let mut scratch = [0u8; 256];
            loop {
                let n = unsafe { libc::read(read_fd, scratch.as_mut_ptr() as *mut _, scratch.len()) };
                if n <= 0 {
                    break;
                }
            }
            while let Ok(posted) = rx.try_recv() {
                if posted.event_id == TASK_EVENT_ID {
                    if let Ok(cell) = posted.payload.downcast::<TaskCell>() {
                        if let Some(task) = cell.take() {
                            task();
                        }
                    }
                } else if let Some(handler) = handlers_for_wake.borrow_mut().get_mut(&posted.event_id) {
                    handler(posted.payload);
                }
            }
            true
        };

        let mut wake_function = FunctionEntry::new(read_fd, Kind::Monitor);
        let wake_op =
            Operation::new(Extension::Monitor(MonitorState::new(Interest::READABLE, drain_callback)));
        wake_function.operations.enqueue_tail(wake_op);

        let mut functions = Queue::new();
        functions.enqueue_tail(wake_function);

        Ok(Reactor {
            functions,
            backend,
            clock: MonotonicClock::new(),
            alarms: Vec::new(),
            next_alarm_id: 1,
            next_event_id: 1,
            event_handlers,
            poster: EventPoster { tx, wake_fd: write_fd },
            wake_read_fd: read_fd,
            wake_write_fd: write_fd,
        })
    }

    /// A cloneable handle other threads use to reach into this reactor.
    pub fn poster(&self) -> EventPoster {
        self.poster.clone()
    }

    pub fn function_count(&self) -> usize {
        // one less than the raw count: the wake function is an implementation detail
        self.functions.len().saturating_sub(1)
    }

    fn function_for(&mut self, fd: RawFd, kind: FunctionKind) -> ElementId {
        if let Some(fid) = self.functions.find(|f| f.fd == fd && f.kind == kind) {
            fid
        } else {
            self.functions.enqueue_tail(FunctionEntry::new(fd, kind))
        }
    }

    pub fn monitor_file(
        &mut self,
        fd: RawFd,
        interest: Interest,
        callback: impl FnMut() -> bool + 'static,
    ) -> OperationHandle {
        let fid = self.function_for(fd, Kind::Monitor);
        let op = Operation::new(Extension::Monitor(MonitorState::new(interest, callback)));
        let opid = self.functions.get_mut(fid).unwrap().operations.enqueue_tail(op);
        OperationHandle { function: fid, operation: opid }
    }

    pub fn read_file(
        &mut self,
        fd: RawFd,
        size: usize,
        callback: impl FnMut(&[u8], bool, Option<i32>) -> usize + 'static,
    ) -> OperationHandle {
        let fid = self.function_for(fd, Kind::Input);
        let op = Operation::new(Extension::Input(InputState::new(size, callback)));
        let opid = self.functions.get_mut(fid).unwrap().operations.enqueue_tail(op);
        OperationHandle { function: fid, operation: opid }
    }

    pub fn write_file(
        &mut self,
        fd: RawFd,
        buffer: Vec<u8>,
        callback: impl FnOnce(&[u8], Option<i32>) + 'static,
    ) -> OperationHandle {
        let fid = self.function_for(fd, Kind::Output);
        let op = Operation::new(Extension::Output(OutputState::new(buffer, callback)));
        let opid = self.functions.get_mut(fid).unwrap().operations.enqueue_tail(op);
        OperationHandle { function: fid, operation: opid }
    }

    /// Removes a pending operation. If it was the function's last operation,
    /// the function entry itself is removed in the same call.
    pub fn cancel_request(&mut self, handle: OperationHandle) -> bool {
        let Some(func) = self.functions.get_mut(handle.function) else { return false };
        let removed = func.operations.delete_element(handle.operation);
        if removed && func.operations.is_empty() {
            self.functions.delete_element(handle.function);
        }
        removed
    }

    pub fn new_relative_alarm(&mut self, delay: Duration, callback: impl FnMut() + 'static) -> AlarmHandle {
        self.new_alarm_inner(delay, None, callback)
    }

    pub fn new_periodic_alarm(&mut self, interval: Duration, callback: impl FnMut() + 'static) -> AlarmHandle {
        self.new_alarm_inner(interval, Some(interval), callback)
    }

    fn new_alarm_inner(
        &mut self,
        delay: Duration,
        interval: Option<Duration>,
        callback: impl FnMut() + 'static,
    ) -> AlarmHandle {
        let id = self.next_alarm_id;
        self.next_alarm_id += 1;
        let deadline = self.clock.deadline_after(delay);
        self.alarms.push(Alarm { id, deadline, interval, callback: Box::new(callback) });
        AlarmHandle(id)
    }

    pub fn cancel_alarm(&mut self, handle: AlarmHandle) -> bool {
        let before = self.alarms.len();
        self.alarms.retain(|a| a.id != handle.0);
        self.alarms.len() != before
    }

    pub fn alarm_is_pending(&self, handle: AlarmHandle) -> bool {
        self.alarms.iter().any(|a| a.id == handle.0)
    }

    /// Registers a callback reachable from any thread via
    /// [`EventPoster::signal`]. `callback` runs on the reactor thread.
    pub fn new_event(&mut self, callback: impl FnMut(Box<dyn Any>) + 'static) -> EventHandle {
        let id = self.next_event_id;
        self.next_event_id += 1;
        self.event_handlers.borrow_mut().insert(id, Box::new(callback));
        EventHandle(id)
    }

    fn next_alarm_deadline(&self) -> Option<TimeValue> {
        self.alarms.iter().map(|a| a.deadline).min()
    }

    fn clamp_timeout(&self, timeout: Option<Duration>) -> Option<Duration> {
        let now = self.clock.now();
        let alarm_remaining = self.next_alarm_deadline().map(|d| if d > now { d - now } else { Duration::ZERO });
        match (timeout, alarm_remaining) {
            (Some(t), Some(a)) => Some(t.min(a)),
            (Some(t), None) => Some(t),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }

    fn fire_next_due_alarm(&mut self) -> bool {
        let now = self.clock.now();
        let idx = self
            .alarms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.deadline <= now)
            .min_by_key(|(_, a)| a.deadline)
            .map(|(i, _)| i);
        let Some(idx) = idx else { return false };

        let mut fired = self.alarms.remove(idx);
        (fired.callback)();
        if let Some(interval) = fired.interval {
            fired.deadline = self.clock.deadline_after(interval);
            self.alarms.push(fired);
        }
        true
    }

    /// Runs exactly one iteration of the reactor: computes the next
    /// deadline, waits for readiness or timeout, and dispatches at most one
    /// ready operation. Returns `true` if it handled something.
    pub fn handle_operation(&mut self, timeout: Option<Duration>) -> bool {
        if self.functions.is_empty() {
            if let Some(d) = timeout {
                std::thread::sleep(d);
            }
            return false;
        }

        self.backend.prepare_monitors();

        let mut candidates: Vec<(ElementId, RawFd, Interest, ElementId)> = Vec::new();
        let mut short_circuit = None;
        for fid in self.functions.ids() {
            let func = self.functions.get(fid).unwrap();
            let Some(opid) = func.active_operation() else { continue };
            let op = func.operations.get(opid).unwrap();
            if op.finished && !op.active {
                short_circuit = Some((fid, opid));
                break;
            }
            candidates.push((fid, func.fd(), func.interest_for(op), opid));
        }

        let selected = if let Some(sc) = short_circuit {
            Some(sc)
        } else {
            let mut slots = Vec::with_capacity(candidates.len());
            for (fid, fd, interest, opid) in &candidates {
                let slot = self.backend.initialize_monitor(*fd, *interest);
                slots.push((*fid, slot, *opid));
            }
            let effective_timeout = self.clamp_timeout(timeout);
            let ready = self.backend.await_monitors(effective_timeout).unwrap_or(false);
            if ready {
                slots.iter().find_map(
                    |(fid, slot, opid)| {
                        if !self.backend.test_monitor(*slot).is_empty() { Some((*fid, *opid)) } else { None }
                    },
                )
            } else {
                None
            }
        };

        match selected {
            Some((fid, opid)) => {
                self.dispatch(fid, opid);
                true
            }
            None => self.fire_next_due_alarm(),
        }
    }

    fn dispatch(&mut self, fid: ElementId, opid: ElementId) {
        let fd = self.functions.get(fid).unwrap().fd();

        {
            let func = self.functions.get_mut(fid).unwrap();
            let op = func.operations.get_mut(opid).unwrap();
            if !op.finished {
                finish_operation(fd, op);
            }
            op.active = true;
        }

        let keep_armed = {
            let func = self.functions.get_mut(fid).unwrap();
            let op = func.operations.get_mut(opid).unwrap();
            invoke_callback(op)
        };

        {
            let func = self.functions.get_mut(fid).unwrap();
            let op = func.operations.get_mut(opid).unwrap();
            op.active = false;
            if keep_armed {
                op.finished = false;
            } else {
                op.cancel = true;
            }
        }

        let should_cancel = self.functions.get(fid).unwrap().operations.get(opid).unwrap().cancel;
        if should_cancel {
            let func = self.functions.get_mut(fid).unwrap();
            func.operations.delete_element(opid);
        } else {
            let func = self.functions.get_mut(fid).unwrap();
            let op = func.operations.get_mut(opid).unwrap();
            op.error = None;
        }

        let now_empty = self.functions.get(fid).unwrap().operations.is_empty();
        if now_empty {
            self.functions.delete_element(fid);
        } else {
            self.functions.requeue_element(fid);
        }
    }

    /// Cooperative wait: repeatedly ticks the reactor until `predicate`
    /// returns true or `timeout` elapses. Mirrors `asyncAwaitCondition`.
    pub fn await_condition<F>(&mut self, timeout: Duration, mut predicate: F) -> AwaitOutcome
    where
        F: FnMut(&mut Self) -> bool,
    {
        let deadline = self.clock.deadline_after(timeout);
        loop {
            if predicate(self) {
                return AwaitOutcome::Matched;
            }
            let now = self.clock.now();
            if now >= deadline {
                return AwaitOutcome::TimedOut;
            }
            self.handle_operation(Some(deadline - now));
        }
    }
}

impl<B: MonitorBackend> Drop for Reactor<B> {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.wake_read_fd);
            libc::close(self.wake_write_fd);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitOutcome {
    Matched,
    TimedOut,
}

fn finish_operation(fd: RawFd, op: &mut Operation) {
    match &mut op.extension {
        Extension::Input(state) => {
            if state.length >= state.size {
                op.finished = true;
                return;
            }
            let remaining = state.size - state.length;
            let mut tmp = vec![0u8; remaining];
            let n = unsafe { libc::read(fd, tmp.as_mut_ptr() as *mut _, remaining) };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return;
                }
                op.error = err.raw_os_error();
                op.finished = true;
            } else if n == 0 {
                state.end = true;
                op.finished = true;
            } else {
                let n = n as usize;
                state.buffer[state.length..state.length + n].copy_from_slice(&tmp[..n]);
                state.length += n;
                op.finished = true;
            }
        }
        Extension::Output(state) => {
            if state.length >= state.size {
                op.finished = true;
                return;
            }
            let remaining = state.buffer[state.length..state.size].to_vec();
            let n = unsafe { libc::write(fd, remaining.as_ptr() as *const _, remaining.len()) };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return;
                }
                op.error = err.raw_os_error();
                op.finished = true;
            } else {
                state.length += n as usize;
                op.finished = state.length >= state.size;
            }
        }
        Extension::Monitor(_) => {
            op.finished = true;
        }
    }
}

fn invoke_callback(op: &mut Operation) -> bool {
    if !op.finished {
        return true;
    }
    match &mut op.extension {
        Extension::Input(state) => {
            let consumed = (state.callback)(&state.buffer[..state.length], state.end, op.error);
            let consumed = consumed.min(state.length);
            if consumed > 0 {
                state.buffer.copy_within(consumed..state.length, 0);
            }
            state.length -= consumed;
            !(state.end || op.error.is_some())
        }
        Extension::Output(state) => {
            if let Some(cb) = state.callback.take() {
                let len = state.length.min(state.size);
                cb(&state.buffer[..len], op.error);
            }
            false
        }
        Extension::Monitor(state) => (state.callback)(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::rc::Rc as StdRc;
    use std::time::Instant;

    fn make_pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    fn set_nonblocking(fd: RawFd) {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
    }

    #[test]
    fn read_file_delivers_bytes_and_honors_residue() {
        let (read_fd, write_fd) = make_pipe();
        set_nonblocking(read_fd.as_raw_fd());
        let mut reactor = with_poll_backend().unwrap();

        let seen: StdRc<StdRefCell<Vec<(Vec<u8>, usize)>>> = StdRc::new(StdRefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        reactor.read_file(read_fd.as_raw_fd(), 4, move |buf, _end, _err| {
            seen_clone.borrow_mut().push((buf.to_vec(), buf.len()));
            // Scenario from spec §8.5: consume 2 of 4 bytes, keep the rest.
            2.min(buf.len())
        });

        let mut file = unsafe { std::fs::File::from_raw_fd(write_fd.as_raw_fd()) };
        use std::io::Write;
        file.write_all(b"ABCD").unwrap();
        std::mem::forget(file);

        let deadline = Instant::now() + Duration::from_secs(2);
        while seen.borrow().is_empty() && Instant::now() < deadline {
            reactor.handle_operation(Some(Duration::from_millis(50)));
        }
        assert_eq!(seen.borrow()[0].0, b"ABCD");

        let mut file = unsafe { std::fs::File::from_raw_fd(write_fd.as_raw_fd()) };
        file.write_all(b"E").unwrap();
        std::mem::forget(file);

        let deadline = Instant::now() + Duration::from_secs(2);
        while seen.borrow().len() < 2 && Instant::now() < deadline {
            reactor.handle_operation(Some(Duration::from_millis(50)));
        }
        assert_eq!(seen.borrow()[1].0, b"CDE");
        let _ = write_fd;
    }

    #[test]
    fn write_file_invokes_callback_once_on_completion() {
        let (_read_fd, write_fd) = make_pipe();
        set_nonblocking(write_fd.as_raw_fd());
        let mut reactor = with_poll_backend().unwrap();

        let done = StdRc::new(StdRefCell::new(None));
        let done_clone = done.clone();
        reactor.write_file(write_fd.as_raw_fd(), b"hello".to_vec(), move |buf, err| {
            *done_clone.borrow_mut() = Some((buf.to_vec(), err));
        });

        let deadline = Instant::now() + Duration::from_secs(2);
        while done.borrow().is_none() && Instant::now() < deadline {
            reactor.handle_operation(Some(Duration::from_millis(50)));
        }
        assert_eq!(done.borrow().as_ref().unwrap().0, b"hello");
        assert_eq!(reactor.function_count(), 0, "function entry removed once its only op cancels");
    }

    #[test]
    fn cancelling_only_operation_removes_function_same_tick() {
        let (read_fd, _write_fd) = make_pipe();
        set_nonblocking(read_fd.as_raw_fd());
        let mut reactor = with_poll_backend().unwrap();
        let handle = reactor.read_file(read_fd.as_raw_fd(), 8, |_b, _e, _err| 0);
        assert_eq!(reactor.function_count(), 1);
        assert!(reactor.cancel_request(handle));
        assert_eq!(reactor.function_count(), 0);
    }

    #[test]
    fn alarm_fires_after_its_deadline_and_not_before() {
        let mut reactor = with_poll_backend().unwrap();
        let fired = StdRc::new(StdRefCell::new(false));
        let fired_clone = fired.clone();
        reactor.new_relative_alarm(Duration::from_millis(20), move || {
            *fired_clone.borrow_mut() = true;
        });

        reactor.handle_operation(Some(Duration::from_millis(1)));
        assert!(!*fired.borrow(), "must not fire before its deadline");

        let deadline = Instant::now() + Duration::from_secs(2);
        while !*fired.borrow() && Instant::now() < deadline {
            reactor.handle_operation(Some(Duration::from_millis(30)));
        }
        assert!(*fired.borrow());
    }

    #[test]
    fn cancelled_alarm_never_fires() {
        let mut reactor = with_poll_backend().unwrap();
        let fired = StdRc::new(StdRefCell::new(false));
        let fired_clone = fired.clone();
        let handle = reactor.new_relative_alarm(Duration::from_millis(10), move || {
            *fired_clone.borrow_mut() = true;
        });
        assert!(reactor.cancel_alarm(handle));
        std::thread::sleep(Duration::from_millis(30));
        reactor.handle_operation(Some(Duration::from_millis(10)));
        assert!(!*fired.borrow());
    }

    #[test]
    fn cross_thread_event_wakes_and_delivers_payload() {
        let mut reactor = with_poll_backend().unwrap();
        let received = StdRc::new(StdRefCell::new(None));
        let received_clone = received.clone();
        let handle = reactor.new_event(move |payload| {
            if let Ok(n) = payload.downcast::<u32>() {
                *received_clone.borrow_mut() = Some(*n);
            }
        });

        let poster = reactor.poster();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            poster.signal(handle, Box::new(42u32)).unwrap();
        });

        let deadline = Instant::now() + Duration::from_secs(2);
        while received.borrow().is_none() && Instant::now() < deadline {
            reactor.handle_operation(Some(Duration::from_millis(100)));
        }
        assert_eq!(*received.borrow(), Some(42));
    }

    #[test]
    fn run_core_task_blocks_caller_until_reactor_runs_it() {
        let mut reactor = with_poll_backend().unwrap();
        let poster = reactor.poster();
        let ran = StdRc::new(StdRefCell::new(false));

        let worker = std::thread::spawn(move || {
            run_core_task(&poster, move || {
                std::thread::sleep(Duration::from_millis(10));
            })
            .unwrap();
        });

        let deadline = Instant::now() + Duration::from_secs(2);
        while !worker.is_finished() && Instant::now() < deadline {
            reactor.handle_operation(Some(Duration::from_millis(50)));
        }
        worker.join().unwrap();
        let _ = ran;
    }

    #[test]
    fn round_robin_requeues_function_after_each_dispatch() {
        let (read_a, write_a) = make_pipe();
        let (read_b, write_b) = make_pipe();
        set_nonblocking(read_a.as_raw_fd());
        set_nonblocking(read_b.as_raw_fd());
        let mut reactor = with_poll_backend().unwrap();

        let hits: StdRc<StdRefCell<Vec<&'static str>>> = StdRc::new(StdRefCell::new(Vec::new()));
        let hits_a = hits.clone();
        let hits_b = hits.clone();
        reactor.read_file(read_a.as_raw_fd(), 1, move |_b, _e, _err| {
            hits_a.borrow_mut().push("a");
            1
        });
        reactor.read_file(read_b.as_raw_fd(), 1, move |_b, _e, _err| {
            hits_b.borrow_mut().push("b");
            1
        });

        for fd in [write_a.as_raw_fd(), write_b.as_raw_fd()] {
            let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
            use std::io::Write;
            file.write_all(b"x").unwrap();
            std::mem::forget(file);
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while hits.borrow().len() < 2 && Instant::now() < deadline {
            reactor.handle_operation(Some(Duration::from_millis(50)));
        }
        assert_eq!(hits.borrow().len(), 2);
        let _ = (write_a, write_b);
    }
}
