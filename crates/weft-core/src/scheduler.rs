//! Flush scheduling collaborator.
//!
//! Controllers never decide when to run; something outside (an animation
//! frame, an event loop turn) does. [`UpdateQueue`] coalesces enqueued
//! flushes so each controller runs at most once per drain, and pokes the
//! [`FlushScheduler`] exactly once per transition from idle to pending.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use crate::collections::map::HashSet;

pub type ControllerId = usize;

/// Hook asking the host to schedule a flush at its convenience.
///
/// Hosts may call back from another thread, hence the bounds; the queue
/// itself stays on the thread that owns the controllers.
pub trait FlushScheduler: Send + Sync {
    fn schedule_flush(&self);
}

/// Scheduler for hosts that drive draining themselves.
#[derive(Default)]
pub struct NoopScheduler;

impl FlushScheduler for NoopScheduler {
    fn schedule_flush(&self) {}
}

struct QueueInner {
    scheduler: Arc<dyn FlushScheduler>,
    queued: RefCell<HashSet<ControllerId>>,
    pending: RefCell<Vec<(ControllerId, Box<dyn FnOnce()>)>>,
    needs_flush: Cell<bool>,
}

/// Coalescing queue of controller flushes.
#[derive(Clone)]
pub struct UpdateQueue {
    inner: Rc<QueueInner>,
}

impl UpdateQueue {
    pub fn new(scheduler: Arc<dyn FlushScheduler>) -> Self {
        Self {
            inner: Rc::new(QueueInner {
                scheduler,
                queued: RefCell::new(HashSet::new()),
                pending: RefCell::new(Vec::new()),
                needs_flush: Cell::new(false),
            }),
        }
    }

    /// Enqueues a flush for `id`. Repeat enqueues before the next drain
    /// are dropped, so a burst of changes yields one callback.
    pub fn enqueue(&self, id: ControllerId, flush: impl FnOnce() + 'static) {
        if !self.inner.queued.borrow_mut().insert(id) {
            return;
        }
        self.inner.pending.borrow_mut().push((id, Box::new(flush)));
        if !self.inner.needs_flush.replace(true) {
            self.inner.scheduler.schedule_flush();
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.pending.borrow().is_empty()
    }

    /// Runs every pending flush. Enqueues made while draining land in the
    /// next batch.
    pub fn drain(&self) {
        let batch: Vec<(ControllerId, Box<dyn FnOnce()>)> =
            self.inner.pending.borrow_mut().drain(..).collect();
        for (id, _) in &batch {
            self.inner.queued.borrow_mut().remove(id);
        }
        self.inner.needs_flush.set(false);
        for (_, flush) in batch {
            flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingScheduler {
        requests: AtomicUsize,
    }

    impl FlushScheduler for CountingScheduler {
        fn schedule_flush(&self) {
            self.requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn repeat_enqueues_coalesce() {
        let scheduler = Arc::new(CountingScheduler::default());
        let queue = UpdateQueue::new(scheduler.clone());
        let runs = Rc::new(Cell::new(0));

        for _ in 0..3 {
            let runs = Rc::clone(&runs);
            queue.enqueue(7, move || runs.set(runs.get() + 1));
        }
        assert_eq!(scheduler.requests.load(Ordering::Relaxed), 1);
        queue.drain();
        assert_eq!(runs.get(), 1);

        // after a drain the controller can be enqueued again
        let runs_again = Rc::clone(&runs);
        queue.enqueue(7, move || runs_again.set(runs_again.get() + 1));
        assert_eq!(scheduler.requests.load(Ordering::Relaxed), 2);
        queue.drain();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn distinct_controllers_each_run() {
        let queue = UpdateQueue::new(Arc::new(NoopScheduler));
        let log = Rc::new(RefCell::new(Vec::new()));
        for id in [1, 2, 1, 3] {
            let log = Rc::clone(&log);
            queue.enqueue(id, move || log.borrow_mut().push(id));
        }
        queue.drain();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert!(!queue.has_pending());
    }
}
