use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use foundation::device::DeviceProfile;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::host::{HostHandle, SchedulerHost};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPriority {
    High,
    Normal,
    Low,
}

/// Host primitive a priority is scheduled on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Primitive {
    AnimationFrame,
    Idle,
}

impl RenderPriority {
    /// `High` and `Normal` both use the next animation frame; they are not
    /// differentiated here. [`crate::PriorityTaskQueue`] is the place where
    /// high-priority work runs synchronously instead.
    pub fn primitive(self) -> Primitive {
        match self {
            RenderPriority::High | RenderPriority::Normal => Primitive::AnimationFrame,
            RenderPriority::Low => Primitive::Idle,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound on how long idle-priority work may wait for idle time.
    pub idle_timeout: Duration,
    pub batch_delay: Duration,
    pub max_batch_size: usize,
}

impl SchedulerConfig {
    /// Constrained devices flush in smaller batches and tolerate longer idle waits.
    pub fn for_device(device: &DeviceProfile) -> Self {
        if device.is_constrained() {
            Self {
                idle_timeout: Duration::from_millis(2000),
                batch_delay: Duration::from_millis(100),
                max_batch_size: 10,
            }
        } else {
            Self::default()
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(1000),
            batch_delay: Duration::from_millis(100),
            max_batch_size: 50,
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct PendingTask {
    ticket: u64,
    handle: HostHandle,
    priority: RenderPriority,
}

/// Maps render priorities onto host primitives, keeping at most one pending
/// callback per task id.
pub struct RenderScheduler<H: SchedulerHost> {
    host: Rc<H>,
    config: SchedulerConfig,
    next_ticket: Cell<u64>,
    pending: Rc<RefCell<BTreeMap<String, PendingTask>>>,
}

impl<H: SchedulerHost> RenderScheduler<H> {
    pub fn new(host: Rc<H>, config: SchedulerConfig) -> Self {
        Self {
            host,
            config,
            next_ticket: Cell::new(0),
            pending: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    /// Schedules `action` under `id`, replacing anything still pending for it.
    pub fn schedule(
        &self,
        id: impl Into<String>,
        priority: RenderPriority,
        action: impl FnOnce() + 'static,
    ) {
        let id = id.into();
        self.cancel(&id);

        let ticket = self.next_ticket.get() + 1;
        self.next_ticket.set(ticket);

        let pending = Rc::clone(&self.pending);
        let key = id.clone();
        let callback = Box::new(move || {
            let current = pending.borrow().get(&key).map(|p| p.ticket);
            if current == Some(ticket) {
                pending.borrow_mut().remove(&key);
            }
            action();
        });

        let handle = match priority.primitive() {
            Primitive::AnimationFrame => self.host.request_frame(callback),
            Primitive::Idle => self.host.request_idle(callback, self.config.idle_timeout),
        };
        trace!(task = %id, ?priority, "scheduled render task");

        self.pending.borrow_mut().insert(
            id,
            PendingTask {
                ticket,
                handle,
                priority,
            },
        );
    }

    /// Returns `true` if a pending callback was cancelled.
    pub fn cancel(&self, id: &str) -> bool {
        let Some(task) = self.pending.borrow_mut().remove(id) else {
            return false;
        };
        trace!(task = %id, "cancelled render task");
        self.host.cancel(task.handle)
    }

    pub fn cancel_all(&self) -> usize {
        let tasks = std::mem::take(&mut *self.pending.borrow_mut());
        tasks
            .into_values()
            .filter(|t| self.host.cancel(t.handle))
            .count()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.borrow().contains_key(id)
    }

    pub fn pending_priority(&self, id: &str) -> Option<RenderPriority> {
        self.pending.borrow().get(id).map(|t| t.priority)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl<H: SchedulerHost> Drop for RenderScheduler<H> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::{Primitive, RenderPriority, RenderScheduler, SchedulerConfig};
    use crate::host::ManualHost;
    use foundation::device::{ConnectionType, DeviceProfile};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn scheduler() -> (Rc<ManualHost>, RenderScheduler<ManualHost>) {
        let host = Rc::new(ManualHost::new());
        let sched = RenderScheduler::new(Rc::clone(&host), SchedulerConfig::default());
        (host, sched)
    }

    fn push(log: &Rc<RefCell<Vec<String>>>, msg: impl Into<String>) -> impl FnOnce() + 'static {
        let log = Rc::clone(log);
        let msg = msg.into();
        move || log.borrow_mut().push(msg)
    }

    #[test]
    fn high_and_normal_share_the_frame_primitive() {
        assert_eq!(RenderPriority::High.primitive(), Primitive::AnimationFrame);
        assert_eq!(RenderPriority::Normal.primitive(), Primitive::AnimationFrame);
        assert_eq!(RenderPriority::Low.primitive(), Primitive::Idle);

        let (host, sched) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        sched.schedule("a", RenderPriority::High, push(&log, "a"));
        sched.schedule("b", RenderPriority::Normal, push(&log, "b"));
        assert_eq!(host.pending_frames(), 2);

        host.tick_frame();
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn low_priority_waits_for_idle() {
        let (host, sched) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        sched.schedule("bg", RenderPriority::Low, push(&log, "bg"));

        host.tick_frame();
        assert!(log.borrow().is_empty());
        assert_eq!(sched.pending_priority("bg"), Some(RenderPriority::Low));

        host.run_idle();
        assert_eq!(*log.borrow(), vec!["bg"]);
        assert!(!sched.is_pending("bg"));
    }

    #[test]
    fn low_priority_is_not_starved_without_idle_time() {
        let (host, sched) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        sched.schedule("bg", RenderPriority::Low, push(&log, "bg"));

        host.advance(Duration::from_millis(999));
        assert!(log.borrow().is_empty());
        host.advance(Duration::from_millis(1));
        assert_eq!(*log.borrow(), vec!["bg"]);
    }

    #[test]
    fn rescheduling_an_id_replaces_the_pending_callback() {
        let (host, sched) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        sched.schedule("slot", RenderPriority::Normal, push(&log, "first"));
        sched.schedule("slot", RenderPriority::Normal, push(&log, "second"));

        assert_eq!(host.pending_frames(), 1);
        host.tick_frame();
        assert_eq!(*log.borrow(), vec!["second"]);
    }

    #[test]
    fn three_low_updates_to_one_slot_apply_only_the_last() {
        let (host, sched) = scheduler();
        let applied = Rc::new(RefCell::new(Vec::new()));
        for payload in 1..=3 {
            let a = Rc::clone(&applied);
            sched.schedule("markers", RenderPriority::Low, move || {
                a.borrow_mut().push(payload)
            });
            host.advance(Duration::from_millis(20));
        }

        assert_eq!(host.pending_idle(), 1);
        host.run_idle();
        host.advance(Duration::from_secs(5));
        assert_eq!(*applied.borrow(), vec![3]);
    }

    #[test]
    fn priority_change_moves_the_task_between_primitives() {
        let (host, sched) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        sched.schedule("slot", RenderPriority::Low, push(&log, "low"));
        sched.schedule("slot", RenderPriority::High, push(&log, "high"));

        assert_eq!(host.pending_idle(), 0);
        host.tick_frame();
        host.run_idle();
        assert_eq!(*log.borrow(), vec!["high"]);
    }

    #[test]
    fn cancel_and_drop_release_pending_callbacks() {
        let (host, sched) = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        sched.schedule("a", RenderPriority::Normal, push(&log, "a"));
        sched.schedule("b", RenderPriority::Low, push(&log, "b"));

        assert!(sched.cancel("a"));
        assert!(!sched.cancel("a"));
        drop(sched);

        assert_eq!(host.pending_frames(), 0);
        assert_eq!(host.pending_idle(), 0);
        host.tick_frame();
        host.run_idle();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn constrained_devices_get_small_batches_and_long_idle_waits() {
        let slow = DeviceProfile::new(1280).with_connection(ConnectionType::TwoG);
        let cfg = SchedulerConfig::for_device(&slow);
        assert_eq!(cfg.max_batch_size, 10);
        assert_eq!(cfg.idle_timeout, Duration::from_millis(2000));

        let desktop = SchedulerConfig::for_device(&DeviceProfile::new(1920).with_memory_gb(16.0));
        assert_eq!(desktop, SchedulerConfig::default());
    }
}
