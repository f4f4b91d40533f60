//! A composable, push-based reactive streams library: observables,
//! operators, schedulers, and disposables.
//!
//! Every subscription follows the same grammar — `next* (complete |
//! error)?` — enforced by [`observer::gate::SafeObserver`] at the
//! boundary between a source and whatever it's feeding. Everything else
//! in the crate (operators, subjects, schedulers, bridges, join patterns)
//! is built from that one guarantee.

pub mod bridges;
pub mod clock;
pub mod connectable;
pub mod disposable;
pub mod error;
pub mod generators;
pub mod join;
pub mod notification;
pub mod observable;
pub mod observer;
pub mod operators;
pub mod scheduler;
pub mod subject;

pub use bridges::{RxFuture, RxFutureError, ToIterator};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use connectable::{publish, ref_count, replay, ConnectableObservable};
pub use disposable::{nop, AssignableDisposable, BooleanDisposable, CompositeDisposable, Disposable, RefCountDisposable};
pub use error::{AlreadyDisposed, RxError, UserError};
pub use generators::{defer, empty, error, from_iterable, interval, just, never, range, repeat, start_action, timer, unfold};
pub use join::{and, when, Plan, Pattern2, Pattern3};
pub use notification::Notification;
pub use observable::Observable;
pub use observer::{boxed, NullObserver, Observer};
pub use operators::{
    amb, combine_latest2, concat, merge, merge_all, sequence_equal, switch_latest, zip2, GroupedObservable, RetryPolicy,
};
pub use scheduler::{
    immediate, observe_on, subscribe_on, CurrentThreadScheduler, ImmediateScheduler, NewThreadScheduler, Scheduler,
    TaskPoolScheduler,
};
pub use subject::{ReplaySubject, Subject};

/// Initializes a `tracing` subscriber for local debugging of a single test.
/// Safe to call from more than one test in a process; later calls are a
/// no-op once a subscriber is already installed.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .try_init();
}
