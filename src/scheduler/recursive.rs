use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::Scheduler;
use crate::disposable::{AssignableDisposable, Disposable};

/// Handle passed to a recursively-scheduled action, letting it schedule its
/// own next run instead of the scheduler doing it automatically. This is the
/// primitive `interval`, `timer`'s repeat, and `repeat`/`retry`'s backoff are
/// built on.
pub struct Recurser {
    scheduler: Arc<dyn Scheduler>,
    action: Arc<dyn Fn(&Recurser) + Send + Sync>,
    pending: Arc<AssignableDisposable>,
    cancelled: Arc<AtomicBool>,
}

impl Recurser {
    /// Schedule the next run as soon as the scheduler's policy allows.
    pub fn schedule(&self) {
        self.schedule_after(Duration::ZERO);
    }

    /// Schedule the next run no earlier than `delay` from now.
    pub fn schedule_after(&self, delay: Duration) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let next = Recurser {
            scheduler: self.scheduler.clone(),
            action: self.action.clone(),
            pending: self.pending.clone(),
            cancelled: self.cancelled.clone(),
        };
        let d = self.scheduler.schedule_after(
            delay,
            Box::new(move || {
                if !next.cancelled.load(Ordering::SeqCst) {
                    let action = next.action.clone();
                    action(&next);
                }
            }),
        );
        // Only the most recently scheduled run needs tracking — earlier
        // runs have already fired by the time a later one is scheduled.
        self.pending.set(d);
    }
}

struct RecursiveHandle {
    pending: Arc<AssignableDisposable>,
    cancelled: Arc<AtomicBool>,
}

impl Disposable for RecursiveHandle {
    fn dispose(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.pending.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs `action` on `scheduler`, handing it a [`Recurser`] it can use to
/// schedule its own next invocation. Nothing reschedules automatically —
/// an `action` that never calls `recurser.schedule()`/`schedule_after()`
/// runs exactly once. Disposing the returned handle prevents any run that
/// hasn't started yet, including ones already scheduled but not due.
pub fn schedule_recursive<F>(scheduler: Arc<dyn Scheduler>, action: F) -> Arc<dyn Disposable>
where
    F: Fn(&Recurser) + Send + Sync + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let pending = AssignableDisposable::new();
    let recurser = Recurser {
        scheduler,
        action: Arc::new(action),
        pending: pending.clone(),
        cancelled: cancelled.clone(),
    };
    recurser.schedule();
    Arc::new(RecursiveHandle { pending, cancelled })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::current_thread::CurrentThreadScheduler;
    use std::sync::Mutex;

    #[test]
    fn reschedules_itself_until_a_count_is_reached() {
        let scheduler = CurrentThreadScheduler::new();
        let runs = Arc::new(Mutex::new(0));
        let r = runs.clone();
        schedule_recursive(scheduler.clone(), move |recurser| {
            let mut count = r.lock().unwrap();
            *count += 1;
            if *count < 3 {
                drop(count);
                recurser.schedule();
            }
        });
        scheduler.work_all();
        assert_eq!(*runs.lock().unwrap(), 3);
    }

    #[test]
    fn disposing_prevents_further_reschedules() {
        let scheduler = CurrentThreadScheduler::new();
        let runs = Arc::new(Mutex::new(0));
        let r = runs.clone();
        let handle = schedule_recursive(scheduler.clone(), move |recurser| {
            *r.lock().unwrap() += 1;
            recurser.schedule_after(Duration::from_millis(10));
        });

        scheduler.work_all();
        assert_eq!(*runs.lock().unwrap(), 1);

        handle.dispose();
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(*runs.lock().unwrap(), 1);
    }
}
