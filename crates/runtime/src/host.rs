use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use foundation::time::Timestamp;

use crate::frame::Frame;

/// Identifies a callback registered with a [`SchedulerHost`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostHandle(pub u64);

pub type HostCallback = Box<dyn FnOnce()>;

/// Scheduling primitives of the environment that owns the event loop.
///
/// Everything runs on one thread. A host never invokes a callback from inside
/// the call that registered it.
pub trait SchedulerHost {
    /// Runs `callback` at the start of the next animation frame.
    fn request_frame(&self, callback: HostCallback) -> HostHandle;

    /// Runs `callback` when the host reports idle time, or after `timeout`
    /// if no idle period arrives first.
    fn request_idle(&self, callback: HostCallback, timeout: Duration) -> HostHandle;

    fn set_timeout(&self, callback: HostCallback, delay: Duration) -> HostHandle;

    /// Returns `true` if the callback was still pending.
    fn cancel(&self, handle: HostHandle) -> bool;
}

impl<H: SchedulerHost + ?Sized> SchedulerHost for Rc<H> {
    fn request_frame(&self, callback: HostCallback) -> HostHandle {
        (**self).request_frame(callback)
    }

    fn request_idle(&self, callback: HostCallback, timeout: Duration) -> HostHandle {
        (**self).request_idle(callback, timeout)
    }

    fn set_timeout(&self, callback: HostCallback, delay: Duration) -> HostHandle {
        (**self).set_timeout(callback, delay)
    }

    fn cancel(&self, handle: HostHandle) -> bool {
        (**self).cancel(handle)
    }
}

struct Deferred {
    handle: HostHandle,
    due: Timestamp,
    callback: HostCallback,
}

#[derive(Default)]
struct HostState {
    now: Timestamp,
    frame: Frame,
    next_handle: u64,
    frames: Vec<(HostHandle, HostCallback)>,
    idle: Vec<Deferred>,
    timers: Vec<Deferred>,
}

impl HostState {
    fn next_handle(&mut self) -> HostHandle {
        self.next_handle += 1;
        HostHandle(self.next_handle)
    }

    fn take_frame(&mut self, handle: HostHandle) -> Option<HostCallback> {
        let idx = self.frames.iter().position(|(h, _)| *h == handle)?;
        Some(self.frames.remove(idx).1)
    }

    fn take_idle(&mut self, handle: HostHandle) -> Option<HostCallback> {
        let idx = self.idle.iter().position(|d| d.handle == handle)?;
        Some(self.idle.remove(idx).callback)
    }

    /// Earliest timer or idle deadline that is due at `limit`.
    fn take_next_due(&mut self, limit: Timestamp) -> Option<(Timestamp, HostCallback)> {
        let pick = |list: &[Deferred]| {
            list.iter()
                .enumerate()
                .filter(|(_, d)| d.due <= limit)
                .min_by(|(_, a), (_, b)| a.due.cmp(&b.due).then_with(|| a.handle.cmp(&b.handle)))
                .map(|(idx, d)| (idx, d.due, d.handle))
        };

        let timer = pick(&self.timers);
        let idle = pick(&self.idle);
        let from_timers = match (timer, idle) {
            (None, None) => return None,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some((_, td, th)), Some((_, id, ih))) => (td, th) <= (id, ih),
        };

        let d = if from_timers {
            self.timers.remove(timer?.0)
        } else {
            self.idle.remove(idle?.0)
        };
        Some((d.due, d.callback))
    }
}

/// Deterministic host driven explicitly by its owner.
///
/// Frames run on [`ManualHost::tick_frame`], idle periods on
/// [`ManualHost::run_idle`], and time only moves on [`ManualHost::advance`]
/// (which fires timers and idle timeouts in due order).
#[derive(Default)]
pub struct ManualHost {
    state: RefCell<HostState>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        self.state.borrow().now
    }

    /// The most recently started frame.
    pub fn frame(&self) -> Frame {
        self.state.borrow().frame
    }

    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    pub fn pending_idle(&self) -> usize {
        self.state.borrow().idle.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Starts a frame and runs the callbacks registered before it started.
    ///
    /// Callbacks registered while the frame runs wait for the next one.
    pub fn tick_frame(&self) -> usize {
        let handles: Vec<HostHandle> = {
            let mut s = self.state.borrow_mut();
            s.frame = s.frame.next(s.now);
            s.frames.iter().map(|(h, _)| *h).collect()
        };

        let mut ran = 0;
        for handle in handles {
            let callback = self.state.borrow_mut().take_frame(handle);
            if let Some(callback) = callback {
                callback();
                ran += 1;
            }
        }
        ran
    }

    /// Reports an idle period: every pending idle callback runs.
    pub fn run_idle(&self) -> usize {
        let handles: Vec<HostHandle> = self.state.borrow().idle.iter().map(|d| d.handle).collect();

        let mut ran = 0;
        for handle in handles {
            let callback = self.state.borrow_mut().take_idle(handle);
            if let Some(callback) = callback {
                callback();
                ran += 1;
            }
        }
        ran
    }

    /// Moves time forward, firing timers and expired idle callbacks in order.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now().add(by);
        let mut ran = 0;
        loop {
            let next = self.state.borrow_mut().take_next_due(target);
            let Some((due, callback)) = next else {
                break;
            };
            {
                let mut s = self.state.borrow_mut();
                if due > s.now {
                    s.now = due;
                }
            }
            callback();
            ran += 1;
        }
        self.state.borrow_mut().now = target;
        ran
    }
}

impl SchedulerHost for ManualHost {
    fn request_frame(&self, callback: HostCallback) -> HostHandle {
        let mut s = self.state.borrow_mut();
        let handle = s.next_handle();
        s.frames.push((handle, callback));
        handle
    }

    fn request_idle(&self, callback: HostCallback, timeout: Duration) -> HostHandle {
        let mut s = self.state.borrow_mut();
        let handle = s.next_handle();
        let due = s.now.add(timeout);
        s.idle.push(Deferred {
            handle,
            due,
            callback,
        });
        handle
    }

    fn set_timeout(&self, callback: HostCallback, delay: Duration) -> HostHandle {
        let mut s = self.state.borrow_mut();
        let handle = s.next_handle();
        let due = s.now.add(delay);
        s.timers.push(Deferred {
            handle,
            due,
            callback,
        });
        handle
    }

    fn cancel(&self, handle: HostHandle) -> bool {
        let mut s = self.state.borrow_mut();
        let before = s.frames.len() + s.idle.len() + s.timers.len();
        s.frames.retain(|(h, _)| *h != handle);
        s.idle.retain(|d| d.handle != handle);
        s.timers.retain(|d| d.handle != handle);
        before != s.frames.len() + s.idle.len() + s.timers.len()
    }
}
