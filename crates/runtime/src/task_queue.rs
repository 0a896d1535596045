use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::host::{HostHandle, SchedulerHost};
use crate::scheduler::RenderPriority;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    priority: RenderPriority,
    seq: u64,
}

struct Item {
    key: Key,
    id: String,
    action: Box<dyn FnOnce()>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub ran_high: usize,
    pub deferred_normal: usize,
    pub deferred_low: usize,
}

/// Priority queue for multi-task flushes.
///
/// Key properties:
/// - One task per id; registering an id again before a flush replaces it.
/// - Within one priority, tasks run in registration order.
/// - `High` runs synchronously inside [`PriorityTaskQueue::flush`], `Normal`
///   on the next animation frame and `Low` when the host is idle.
pub struct PriorityTaskQueue<H: SchedulerHost + 'static> {
    host: Rc<H>,
    idle_timeout: Duration,
    next_seq: u64,
    items: Vec<Item>,
    next_ticket: u64,
    deferred: Rc<RefCell<BTreeMap<u64, HostHandle>>>,
}

impl<H: SchedulerHost + 'static> PriorityTaskQueue<H> {
    pub fn new(host: Rc<H>, idle_timeout: Duration) -> Self {
        Self {
            host,
            idle_timeout,
            next_seq: 0,
            items: Vec::new(),
            next_ticket: 0,
            deferred: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of deferred batches still waiting on the host.
    pub fn deferred_batches(&self) -> usize {
        self.deferred.borrow().len()
    }

    pub fn register(
        &mut self,
        id: impl Into<String>,
        priority: RenderPriority,
        action: impl FnOnce() + 'static,
    ) {
        let id = id.into();
        self.cancel(&id);

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.items.push(Item {
            key: Key { priority, seq },
            id,
            action: Box::new(action),
        });
    }

    pub fn cancel(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        before != self.items.len()
    }

    /// Runs or schedules every registered task and empties the queue.
    pub fn flush(&mut self) -> FlushSummary {
        let mut items = std::mem::take(&mut self.items);
        items.sort_by_key(|item| item.key);

        let mut high = Vec::new();
        let mut normal = Vec::new();
        let mut low = Vec::new();
        for item in items {
            match item.key.priority {
                RenderPriority::High => high.push(item.action),
                RenderPriority::Normal => normal.push(item.action),
                RenderPriority::Low => low.push(item.action),
            }
        }

        let summary = FlushSummary {
            ran_high: high.len(),
            deferred_normal: normal.len(),
            deferred_low: low.len(),
        };
        debug!(?summary, "flushing task queue");

        for action in high {
            action();
        }
        if !normal.is_empty() {
            let ticket = self.ticket();
            let callback = self.batch_callback(ticket, normal);
            let handle = self.host.request_frame(callback);
            self.deferred.borrow_mut().insert(ticket, handle);
        }
        if !low.is_empty() {
            let ticket = self.ticket();
            let callback = self.batch_callback(ticket, low);
            let handle = self.host.request_idle(callback, self.idle_timeout);
            self.deferred.borrow_mut().insert(ticket, handle);
        }
        summary
    }

    /// Cancels deferred batches from earlier flushes that have not run yet.
    pub fn cancel_deferred(&mut self) -> usize {
        let pending = std::mem::take(&mut *self.deferred.borrow_mut());
        pending
            .into_values()
            .filter(|handle| self.host.cancel(*handle))
            .count()
    }

    fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn batch_callback(&self, ticket: u64, actions: Vec<Box<dyn FnOnce()>>) -> Box<dyn FnOnce()> {
        let deferred = Rc::clone(&self.deferred);
        Box::new(move || {
            deferred.borrow_mut().remove(&ticket);
            for action in actions {
                action();
            }
        })
    }
}

impl<H: SchedulerHost + 'static> Drop for PriorityTaskQueue<H> {
    fn drop(&mut self) {
        self.cancel_deferred();
    }
}

#[cfg(test)]
mod tests {
    use super::{FlushSummary, PriorityTaskQueue};
    use crate::host::ManualHost;
    use crate::scheduler::RenderPriority;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn setup() -> (Rc<ManualHost>, Log, PriorityTaskQueue<ManualHost>) {
        let host = Rc::new(ManualHost::new());
        let q = PriorityTaskQueue::new(Rc::clone(&host), Duration::from_millis(1000));
        (host, Rc::new(RefCell::new(Vec::new())), q)
    }

    fn note(log: &Log, msg: &'static str) -> impl FnOnce() + 'static {
        let log = Rc::clone(log);
        move || log.borrow_mut().push(msg)
    }

    #[test]
    fn priorities_map_to_sync_frame_and_idle() {
        let (host, log, mut q) = setup();
        q.register("low", RenderPriority::Low, note(&log, "low"));
        q.register("normal", RenderPriority::Normal, note(&log, "normal"));
        q.register("high", RenderPriority::High, note(&log, "high"));

        let summary = q.flush();
        assert_eq!(
            summary,
            FlushSummary {
                ran_high: 1,
                deferred_normal: 1,
                deferred_low: 1,
            }
        );
        assert_eq!(*log.borrow(), vec!["high"]);
        assert!(q.is_empty());

        host.tick_frame();
        assert_eq!(*log.borrow(), vec!["high", "normal"]);
        host.run_idle();
        assert_eq!(*log.borrow(), vec!["high", "normal", "low"]);
        assert_eq!(q.deferred_batches(), 0);
    }

    #[test]
    fn same_priority_runs_in_registration_order() {
        let (host, log, mut q) = setup();
        q.register("a", RenderPriority::Normal, note(&log, "a"));
        q.register("b", RenderPriority::Normal, note(&log, "b"));
        q.register("c", RenderPriority::Normal, note(&log, "c"));
        q.flush();
        assert_eq!(host.pending_frames(), 1);
        host.tick_frame();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn re_registering_before_flush_is_last_write_wins() {
        let (_host, log, mut q) = setup();
        q.register("slot", RenderPriority::High, note(&log, "first"));
        q.register("slot", RenderPriority::High, note(&log, "second"));
        assert_eq!(q.len(), 1);
        q.flush();
        assert_eq!(*log.borrow(), vec!["second"]);
    }

    #[test]
    fn cancel_removes_registered_and_deferred_work() {
        let (host, log, mut q) = setup();
        q.register("a", RenderPriority::High, note(&log, "a"));
        assert!(q.cancel("a"));
        assert!(!q.cancel("a"));

        q.register("b", RenderPriority::Low, note(&log, "b"));
        q.flush();
        assert_eq!(q.cancel_deferred(), 1);
        host.run_idle();
        host.advance(Duration::from_secs(5));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn empty_flush_schedules_nothing() {
        let (host, _log, mut q) = setup();
        assert_eq!(q.flush(), FlushSummary::default());
        assert_eq!(host.pending_frames(), 0);
        assert_eq!(host.pending_idle(), 0);
    }
}
