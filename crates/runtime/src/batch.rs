use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::host::{HostHandle, SchedulerHost};
use crate::scheduler::SchedulerConfig;

type Processor<K, T> = Box<dyn FnMut(Vec<(K, T)>)>;

struct BatchState<K, T> {
    items: Vec<(K, T)>,
    timer: Option<HostHandle>,
    flush: Option<HostHandle>,
}

struct BatchShared<K, T> {
    state: RefCell<BatchState<K, T>>,
    processor: RefCell<Processor<K, T>>,
}

impl<K, T> BatchShared<K, T> {
    /// Hands the pending batch to the processor. Empty batches are skipped.
    fn drain(&self) -> usize {
        let items = {
            let mut s = self.state.borrow_mut();
            s.flush = None;
            std::mem::take(&mut s.items)
        };
        if items.is_empty() {
            return 0;
        }
        let n = items.len();
        let mut processor = self.processor.borrow_mut();
        (*processor)(items);
        n
    }
}

/// Coalesces keyed updates and delivers them in batches on the idle path.
///
/// An update for a key that is already pending replaces its payload in place.
/// A batch is flushed `batch_delay` after its first update or as soon as it
/// holds `max_batch_size` keys, whichever comes first.
pub struct UpdateBatcher<H: SchedulerHost + 'static, K: 'static, T: 'static> {
    host: Rc<H>,
    config: SchedulerConfig,
    shared: Rc<BatchShared<K, T>>,
}

impl<H, K, T> UpdateBatcher<H, K, T>
where
    H: SchedulerHost + 'static,
    K: PartialEq + 'static,
    T: 'static,
{
    pub fn new(
        host: Rc<H>,
        config: SchedulerConfig,
        processor: impl FnMut(Vec<(K, T)>) + 'static,
    ) -> Self {
        Self {
            host,
            config,
            shared: Rc::new(BatchShared {
                state: RefCell::new(BatchState {
                    items: Vec::new(),
                    timer: None,
                    flush: None,
                }),
                processor: RefCell::new(Box::new(processor)),
            }),
        }
    }

    pub fn add(&self, key: K, payload: T) {
        let (len, idle) = {
            let mut s = self.shared.state.borrow_mut();
            match s.items.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => {
                    slot.1 = payload;
                    trace!("coalesced batched update");
                }
                None => s.items.push((key, payload)),
            }
            (s.items.len(), s.timer.is_none() && s.flush.is_none())
        };

        if len >= self.config.max_batch_size {
            debug!(len, "batch full, flushing on idle");
            request_flush(&self.host, &self.shared, self.config);
        } else if idle {
            self.start_timer();
        }
    }

    fn start_timer(&self) {
        let host = Rc::clone(&self.host);
        let weak: Weak<BatchShared<K, T>> = Rc::downgrade(&self.shared);
        let config = self.config;
        let handle = self.host.set_timeout(
            Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                shared.state.borrow_mut().timer = None;
                request_flush(&host, &shared, config);
            }),
            self.config.batch_delay,
        );
        self.shared.state.borrow_mut().timer = Some(handle);
    }

    /// Delivers the pending batch now, cancelling any scheduled flush.
    pub fn flush(&self) -> usize {
        self.cancel_pending();
        self.shared.drain()
    }

    /// Drops pending updates without delivering them.
    pub fn clear(&self) {
        self.cancel_pending();
        self.shared.state.borrow_mut().items.clear();
    }

    pub fn len(&self) -> usize {
        self.shared.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn request_flush<H, K, T>(host: &Rc<H>, shared: &Rc<BatchShared<K, T>>, config: SchedulerConfig)
where
    H: SchedulerHost + 'static,
    K: 'static,
    T: 'static,
{
    let timer = {
        let mut s = shared.state.borrow_mut();
        if s.flush.is_some() {
            return;
        }
        s.timer.take()
    };
    if let Some(timer) = timer {
        host.cancel(timer);
    }

    let weak = Rc::downgrade(shared);
    let handle = host.request_idle(
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.drain();
            }
        }),
        config.idle_timeout,
    );
    shared.state.borrow_mut().flush = Some(handle);
}

impl<H: SchedulerHost + 'static, K: 'static, T: 'static> UpdateBatcher<H, K, T> {
    fn cancel_pending(&self) {
        let (timer, flush) = {
            let mut s = self.shared.state.borrow_mut();
            (s.timer.take(), s.flush.take())
        };
        for handle in timer.into_iter().chain(flush) {
            self.host.cancel(handle);
        }
    }
}

impl<H: SchedulerHost + 'static, K: 'static, T: 'static> Drop for UpdateBatcher<H, K, T> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
