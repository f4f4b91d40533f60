//! Source factories: the leaves of every operator graph.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::disposable::nop;
use crate::error::{RxError, UserError};
use crate::observable::Observable;
use crate::scheduler::{schedule_recursive, Scheduler};

/// Emits a single value, then completes.
pub fn just<T, E>(value: T) -> Observable<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    Observable::new(move |observer| {
        observer.on_next(value.clone());
        observer.on_complete();
        nop()
    })
}

/// Completes immediately with no values.
pub fn empty<T, E>() -> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    Observable::new(|observer| {
        observer.on_complete();
        nop()
    })
}

/// Never emits anything and never terminates.
pub fn never<T, E>() -> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    Observable::new(|_observer| nop())
}

/// Immediately errors with `err`.
pub fn error<T, E>(err: E) -> Observable<T, E>
where
    T: Send + 'static,
    E: Clone + Send + Sync + 'static,
{
    Observable::new(move |observer| {
        observer.on_error(err.clone());
        nop()
    })
}

/// `count` values starting at `start`, advancing by `step` each time.
pub fn range<E>(start: i64, count: usize, step: i64) -> Observable<i64, E>
where
    E: Send + 'static,
{
    Observable::new(move |observer| {
        let mut value = start;
        for _ in 0..count {
            observer.on_next(value);
            value += step;
        }
        observer.on_complete();
        nop()
    })
}

/// Emits `select(state)` for as long as `condition(state)` holds, advancing
/// via `iterate`. The seed is tested before the first emission.
pub fn unfold<S, T, E, Cond, Iter, Sel>(
    seed: S,
    condition: Cond,
    iterate: Iter,
    select: Sel,
) -> Observable<T, E>
where
    S: Clone + Send + Sync + 'static,
    T: Send + 'static,
    E: Send + 'static,
    Cond: Fn(&S) -> bool + Send + Sync + 'static,
    Iter: Fn(S) -> S + Send + Sync + 'static,
    Sel: Fn(&S) -> T + Send + Sync + 'static,
{
    Observable::new(move |observer| {
        let mut state = seed.clone();
        while condition(&state) {
            observer.on_next(select(&state));
            state = iterate(state);
        }
        observer.on_complete();
        nop()
    })
}

/// Re-invokes `factory` for every subscription, so each subscriber gets an
/// independently constructed source. A factory that panics or returns an
/// error-carrying observable is not treated specially here — build that
/// behavior into `factory` itself (typically by returning
/// `generators::error(...)`).
pub fn defer<T, E, F>(factory: F) -> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn() -> Observable<T, E> + Send + Sync + 'static,
{
    Observable::new(move |observer| {
        let source = factory();
        source.subscribe_observer(observer)
    })
}

/// Schedules iteration of `items` onto `scheduler`, one item per work unit
/// so disposal between items is prompt. Each subscription clones `items` and
/// iterates independently.
pub fn from_iterable<T, E, I>(items: I, scheduler: Arc<dyn Scheduler>) -> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
    I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
    I::IntoIter: Send + 'static,
{
    Observable::new(move |observer| {
        let iter = Mutex::new(items.clone().into_iter());
        schedule_recursive(scheduler.clone(), move |recurser| {
            let next = iter.lock().next();
            match next {
                Some(value) => {
                    observer.on_next(value);
                    recurser.schedule();
                }
                None => observer.on_complete(),
            }
        })
    })
}

/// Defers `action` to a scheduled work unit, emits its return value (or
/// propagates its error) then completes. Disposal before the action runs
/// suppresses both.
pub fn start_action<T, Ue, F>(action: F, scheduler: Arc<dyn Scheduler>) -> Observable<T, RxError<Ue>>
where
    T: Send + 'static,
    Ue: UserError,
    F: FnOnce() -> Result<T, Ue> + Send + 'static,
{
    Observable::new(move |observer| {
        let action_cell = Mutex::new(Some(action));
        let observer = observer.clone();
        scheduler.schedule(Box::new(move || {
            let action = action_cell.lock().take().expect("scheduled exactly once");
            match action() {
                Ok(value) => {
                    observer.on_next(value);
                    observer.on_complete();
                }
                Err(e) => observer.on_error(RxError::User(e)),
            }
        }))
    })
}

/// Emits an increasing counter every `period`, with the first emission
/// arriving one `period` after subscription.
pub fn interval<E>(period: Duration, scheduler: Arc<dyn Scheduler>) -> Observable<u64, E>
where
    E: Send + 'static,
{
    Observable::new(move |observer| {
        let count = Arc::new(AtomicU64::new(0));
        let first = Arc::new(AtomicBool::new(true));
        schedule_recursive(scheduler.clone(), move |recurser| {
            if first.swap(false, Ordering::SeqCst) {
                recurser.schedule_after(period);
                return;
            }
            let n = count.fetch_add(1, Ordering::SeqCst);
            observer.on_next(n);
            recurser.schedule_after(period);
        })
    })
}

/// Emits once after `delay`, then — if `period` is given — keeps emitting
/// every `period` after that; otherwise completes after the single
/// emission.
pub fn timer<E>(delay: Duration, period: Option<Duration>, scheduler: Arc<dyn Scheduler>) -> Observable<u64, E>
where
    E: Send + 'static,
{
    Observable::new(move |observer| {
        let count = Arc::new(AtomicU64::new(0));
        let first = Arc::new(AtomicBool::new(true));
        schedule_recursive(scheduler.clone(), move |recurser| {
            if first.swap(false, Ordering::SeqCst) {
                recurser.schedule_after(delay);
                return;
            }
            let n = count.fetch_add(1, Ordering::SeqCst);
            observer.on_next(n);
            match period {
                Some(period) => recurser.schedule_after(period),
                None => observer.on_complete(),
            }
        })
    })
}

/// Replays `items` up to `count` times (or forever if `count` is `None`),
/// scheduled one item per work unit.
pub fn repeat<T, E>(items: Vec<T>, count: Option<usize>, scheduler: Arc<dyn Scheduler>) -> Observable<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    Observable::new(move |observer| {
        if items.is_empty() {
            observer.on_complete();
            return nop();
        }
        let items = items.clone();
        let cursor = Arc::new(AtomicUsize::new(0));
        let round = Arc::new(AtomicUsize::new(0));
        schedule_recursive(scheduler.clone(), move |recurser| {
            let i = cursor.fetch_add(1, Ordering::SeqCst);
            if i < items.len() {
                observer.on_next(items[i].clone());
                recurser.schedule();
                return;
            }
            let r = round.fetch_add(1, Ordering::SeqCst) + 1;
            if count.is_some_and(|c| r >= c) {
                observer.on_complete();
                return;
            }
            cursor.store(1, Ordering::SeqCst);
            observer.on_next(items[0].clone());
            recurser.schedule();
        })
    })
}
