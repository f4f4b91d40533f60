use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{already_ran, Scheduler, Work};
use crate::disposable::Disposable;

/// Invokes work synchronously on the calling thread. `schedule_after` still
/// has to block the caller for `delay` (there is nowhere else to run it,
/// and the returned disposable can't be cancelled before the caller even
/// gets it back) — reach for [`super::NewThreadScheduler`] or
/// [`super::TaskPoolScheduler`] if that isn't acceptable.
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, work: Work) -> Arc<dyn Disposable> {
        tracing::trace!("immediate: running work synchronously");
        work();
        already_ran()
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> Arc<dyn Disposable> {
        tracing::trace!(?delay, "immediate: blocking before running delayed work");
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        work();
        already_ran()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn runs_synchronously() {
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        ImmediateScheduler.schedule(Box::new(move || r.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }
}
