use std::collections::{BinaryHeap, VecDeque};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{Scheduler, Work};
use crate::clock::VirtualClock;
use crate::disposable::{Disposable, FlagDisposable};

struct DelayedItem {
    deadline: Instant,
    seq: u64,
    active: Arc<AtomicBool>,
    work: Mutex<Option<Work>>,
}

impl PartialEq for DelayedItem {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}
impl Eq for DelayedItem {}

impl Ord for DelayedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the earliest deadline first.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for DelayedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs work on whichever thread calls [`work`](Self::work) or
/// [`advance`](Self::advance) — nothing happens in the background. Paired
/// with a [`VirtualClock`], this is how time operators (`debounce`, `sample`,
/// `timeout`, `interval`, `delay`, windows/buffers) are tested without
/// sleeping real wall-clock time.
pub struct CurrentThreadScheduler {
    clock: Arc<VirtualClock>,
    ready: Mutex<VecDeque<Work>>,
    delayed: Mutex<BinaryHeap<DelayedItem>>,
    seq: AtomicU64,
}

impl CurrentThreadScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(CurrentThreadScheduler {
            clock: Arc::new(VirtualClock::new()),
            ready: Mutex::new(VecDeque::new()),
            delayed: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
        })
    }

    /// The virtual clock backing this scheduler's `schedule_after` deadlines.
    pub fn clock(&self) -> Arc<VirtualClock> {
        self.clock.clone()
    }

    /// Runs the single oldest ready work item, if any. Returns whether
    /// something ran.
    pub fn work(&self) -> bool {
        let next = self.ready.lock().pop_front();
        match next {
            Some(work) => {
                work();
                true
            }
            None => false,
        }
    }

    /// Drains every currently-ready work item (including ones enqueued by
    /// work that itself just ran).
    pub fn work_all(&self) {
        while self.work() {}
    }

    fn promote_due(&self) {
        let now = self.clock.now();
        loop {
            let mut heap = self.delayed.lock();
            let due = matches!(heap.peek(), Some(item) if item.deadline <= now);
            if !due {
                return;
            }
            let item = heap.pop().unwrap();
            drop(heap);
            if let Some(work) = item.work.lock().take() {
                if item.active.load(AtomicOrdering::SeqCst) {
                    self.ready.lock().push_back(work);
                }
            }
        }
    }

    /// Moves virtual time forward by `by`, then runs everything that becomes
    /// ready as a result — including work scheduled by work that itself just
    /// ran, and delayed items whose deadline now falls at or before the new
    /// time.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
        loop {
            self.promote_due();
            if !self.work() {
                break;
            }
        }
    }
}

impl Scheduler for CurrentThreadScheduler {
    fn schedule(&self, work: Work) -> Arc<dyn Disposable> {
        tracing::trace!("current_thread: enqueueing immediate work");
        let active = Arc::new(AtomicBool::new(true));
        let flag = active.clone();
        self.ready.lock().push_back(Box::new(move || {
            if flag.load(AtomicOrdering::SeqCst) {
                work();
            }
        }));
        FlagDisposable::new(active)
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> Arc<dyn Disposable> {
        tracing::trace!(?delay, "current_thread: enqueueing delayed work");
        let active = Arc::new(AtomicBool::new(true));
        let deadline = self.clock.now() + delay;
        let seq = self.seq.fetch_add(1, AtomicOrdering::SeqCst);
        self.delayed.lock().push(DelayedItem {
            deadline,
            seq,
            active: active.clone(),
            work: Mutex::new(Some(work)),
        });
        FlagDisposable::new(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn immediate_work_runs_in_fifo_order_on_work_all() {
        let scheduler = CurrentThreadScheduler::new();
        let order = Arc::new(StdMutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            scheduler.schedule(Box::new(move || order.lock().unwrap().push(i)));
        }
        scheduler.work_all();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn delayed_work_only_runs_once_its_deadline_is_reached() {
        let scheduler = CurrentThreadScheduler::new();
        let fired = Arc::new(StdMutex::new(false));
        let f = fired.clone();
        scheduler.schedule_after(Duration::from_millis(100), Box::new(move || {
            *f.lock().unwrap() = true;
        }));

        scheduler.advance(Duration::from_millis(50));
        assert!(!*fired.lock().unwrap());

        scheduler.advance(Duration::from_millis(50));
        assert!(*fired.lock().unwrap());
    }

    #[test]
    fn disposing_a_delayed_item_before_its_deadline_suppresses_it() {
        let scheduler = CurrentThreadScheduler::new();
        let fired = Arc::new(StdMutex::new(false));
        let f = fired.clone();
        let d = scheduler.schedule_after(Duration::from_millis(10), Box::new(move || {
            *f.lock().unwrap() = true;
        }));
        d.dispose();
        scheduler.advance(Duration::from_millis(20));
        assert!(!*fired.lock().unwrap());
    }

    #[test]
    fn delayed_items_fire_in_deadline_order() {
        let scheduler = CurrentThreadScheduler::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        let o = order.clone();
        scheduler.schedule_after(Duration::from_millis(30), Box::new(move || o.lock().unwrap().push("b")));
        let o = order.clone();
        scheduler.schedule_after(Duration::from_millis(10), Box::new(move || o.lock().unwrap().push("a")));
        let o = order.clone();
        scheduler.schedule_after(Duration::from_millis(20), Box::new(move || o.lock().unwrap().push("ab")));

        scheduler.advance(Duration::from_millis(30));
        assert_eq!(*order.lock().unwrap(), vec!["a", "ab", "b"]);
    }
}
