//! Strategies for dispatching work units, plus `observe_on`/`subscribe_on`.

mod current_thread;
mod immediate;
mod new_thread;
mod observe_on;
mod recursive;
mod subscribe_on;
mod task_pool;

pub use current_thread::CurrentThreadScheduler;
pub use immediate::ImmediateScheduler;
pub use new_thread::NewThreadScheduler;
pub use observe_on::observe_on;
pub use recursive::{schedule_recursive, Recurser};
pub use subscribe_on::subscribe_on;
pub use task_pool::TaskPoolScheduler;

use std::sync::Arc;
use std::time::Duration;

use crate::disposable::{nop, Disposable};

/// A unit of work handed to a scheduler. Always runs to completion once
/// started; cancellation only prevents work that hasn't started yet.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// A policy for where and when work units run.
///
/// Every scheduler in the crate is built from these two primitives;
/// `interval`/`repeat`/recursive timers are layered on top via
/// [`schedule_recursive`] rather than being part of the trait itself.
pub trait Scheduler: Send + Sync + 'static {
    /// Run `work` as soon as the scheduler's policy allows.
    fn schedule(&self, work: Work) -> Arc<dyn Disposable>;

    /// Run `work` no earlier than `delay` from now. The returned disposable
    /// cancels the pending work if it hasn't started yet.
    fn schedule_after(&self, delay: Duration, work: Work) -> Arc<dyn Disposable>;
}

/// Runs work synchronously, immediately, on the calling thread.
pub fn immediate() -> Arc<dyn Scheduler> {
    Arc::new(ImmediateScheduler)
}

/// Returns a no-op disposable; used by schedulers whose work has already
/// run synchronously by the time `schedule` returns.
pub(crate) fn already_ran() -> Arc<dyn Disposable> {
    nop()
}
