use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use super::{Scheduler, Work};
use crate::disposable::{Disposable, FlagDisposable};

/// Spawns a dedicated OS thread per work unit.
pub struct NewThreadScheduler;

impl Scheduler for NewThreadScheduler {
    fn schedule(&self, work: Work) -> Arc<dyn Disposable> {
        tracing::trace!("new_thread: spawning for immediate work");
        let active = Arc::new(AtomicBool::new(true));
        let flag = active.clone();
        thread::spawn(move || {
            if flag.load(Ordering::SeqCst) {
                work();
            }
        });
        FlagDisposable::new(active)
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> Arc<dyn Disposable> {
        tracing::trace!(?delay, "new_thread: spawning for delayed work");
        let active = Arc::new(AtomicBool::new(true));
        let flag = active.clone();
        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            if flag.load(Ordering::SeqCst) {
                work();
            }
        });
        FlagDisposable::new(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn runs_on_a_different_thread() {
        let (tx, rx) = mpsc::channel();
        let caller = thread::current().id();
        NewThreadScheduler.schedule(Box::new(move || {
            let _ = tx.send(thread::current().id() != caller);
        }));
        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn disposing_before_the_delay_elapses_suppresses_the_work() {
        let (tx, rx) = mpsc::channel::<()>();
        let d = NewThreadScheduler.schedule_after(
            Duration::from_millis(50),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        d.dispose();
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
    }
}
