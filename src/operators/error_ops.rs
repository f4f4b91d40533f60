//! Error recovery: `catchException`, `retry`, `onErrorContinueWith`,
//! `continueWith`, plus the `RxError`-synthesizing `first`/`last`/`elementAt`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::disposable::{nop, AssignableDisposable, Disposable};
use crate::error::{RxError, UserError};
use crate::observable::Observable;
use crate::observer::Observer;

/// How many times [`Observable::retry`] re-subscribes after the first
/// failure. `times(n)` permits `n` additional attempts beyond the initial
/// one; `forever()` never gives up.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    max_attempts: Option<usize>,
}

impl RetryPolicy {
    /// Re-subscribe up to `n` additional times after the first failure.
    /// `times(0)` forwards the first error immediately with no retry.
    pub fn times(n: usize) -> Self {
        RetryPolicy { max_attempts: Some(n) }
    }

    /// Never stop re-subscribing on failure.
    pub fn forever() -> Self {
        RetryPolicy { max_attempts: None }
    }

    fn allows(&self, attempts_used: usize) -> bool {
        match self.max_attempts {
            Some(max) => attempts_used < max,
            None => true,
        }
    }
}

impl<T, Ue> Observable<T, RxError<Ue>>
where
    T: Send + 'static,
    Ue: UserError,
{
    /// Re-subscribes to `self` on error, per `policy`, forwarding every
    /// value seen along the way. Once the policy is exhausted the last
    /// error is wrapped in [`RxError::RetryExhausted`] and forwarded.
    pub fn retry(self, policy: RetryPolicy) -> Observable<T, RxError<Ue>> {
        Observable::new(move |observer| {
            let upstream = AssignableDisposable::new();
            let state = Arc::new(RetryState {
                source: self.clone(),
                policy,
                attempts_used: AtomicUsize::new(0),
                downstream: observer,
                upstream: upstream.clone(),
            });
            RetryState::subscribe_once(&state);
            upstream
        })
    }

    /// On error matching `matcher`, subscribes to `handler(error)` instead
    /// of propagating it; errors `matcher` rejects propagate untouched.
    pub fn catch_exception<M, H>(self, matcher: M, handler: H) -> Observable<T, RxError<Ue>>
    where
        M: Fn(&RxError<Ue>) -> bool + Send + Sync + 'static,
        H: Fn(RxError<Ue>) -> Observable<T, RxError<Ue>> + Send + Sync + 'static,
    {
        let matcher = Arc::new(matcher);
        let handler = Arc::new(handler);
        Observable::new(move |observer| {
            let upstream = AssignableDisposable::new();
            let inner = Arc::new(CatchObserver {
                downstream: observer,
                matcher: matcher.clone(),
                handler: handler.clone(),
                upstream: upstream.clone(),
            });
            upstream.set(self.subscribe_observer(inner));
            upstream
        })
    }

    /// On any error, switches to `next` without inspecting the error.
    pub fn on_error_continue_with(self, next: Observable<T, RxError<Ue>>) -> Observable<T, RxError<Ue>> {
        self.catch_exception(|_| true, move |_| next.clone())
    }

    /// Emits only the first value, then completes and disposes upstream.
    /// Errors with [`RxError::EmptySequence`] if the source completes
    /// without emitting anything.
    pub fn first(self) -> Observable<T, RxError<Ue>> {
        Observable::new(move |observer| {
            let upstream = AssignableDisposable::new();
            let inner = Arc::new(FirstObserver {
                downstream: observer,
                done: AtomicBool::new(false),
                upstream: upstream.clone(),
            });
            upstream.set(self.subscribe_observer(inner));
            upstream
        })
    }

    /// Emits the last value seen once the source completes. Errors with
    /// [`RxError::EmptySequence`] if none was ever seen.
    pub fn last(self) -> Observable<T, RxError<Ue>>
    where
        T: Clone,
    {
        Observable::new(move |observer| {
            let inner = Arc::new(LastObserver {
                downstream: observer,
                last: Mutex::new(None),
            });
            self.subscribe_observer(inner)
        })
    }

    /// Emits the `index`-th value (0-based), then completes. Errors with
    /// [`RxError::IndexOutOfRange`] if the source completes first.
    pub fn element_at(self, index: usize) -> Observable<T, RxError<Ue>> {
        Observable::new(move |observer| {
            let upstream = AssignableDisposable::new();
            let inner = Arc::new(ElementAtObserver {
                downstream: observer,
                index,
                seen: AtomicUsize::new(0),
                done: AtomicBool::new(false),
                upstream: upstream.clone(),
            });
            upstream.set(self.subscribe_observer(inner));
            upstream
        })
    }

    /// Wraps `self` so a panic unwinding out of a downstream callback
    /// during delivery is caught and reported as
    /// [`RxError::UserPanic`] instead of unwinding the delivering thread.
    pub fn guard_panics(self) -> Observable<T, RxError<Ue>> {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(PanicGuardObserver { downstream: observer }))
        })
    }
}

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// On completion OR error, switches to `next`; the reason is not
    /// passed along.
    pub fn continue_with(self, next: Observable<T, E>) -> Observable<T, E> {
        Observable::new(move |observer| {
            let upstream = AssignableDisposable::new();
            let inner = Arc::new(ContinueWithObserver {
                downstream: observer,
                next: next.clone(),
                upstream: upstream.clone(),
            });
            upstream.set(self.subscribe_observer(inner));
            upstream
        })
    }
}

struct RetryState<T, Ue> {
    source: Observable<T, RxError<Ue>>,
    policy: RetryPolicy,
    attempts_used: AtomicUsize,
    downstream: Arc<dyn Observer<T, RxError<Ue>>>,
    upstream: Arc<AssignableDisposable>,
}

impl<T, Ue> RetryState<T, Ue>
where
    T: Send + 'static,
    Ue: UserError,
{
    fn subscribe_once(self: &Arc<Self>) {
        let observer = Arc::new(RetryObserver { state: self.clone() });
        let d = self.source.clone().subscribe_observer(observer);
        self.upstream.set(d);
    }
}

struct RetryObserver<T, Ue> {
    state: Arc<RetryState<T, Ue>>,
}

impl<T, Ue> Observer<T, RxError<Ue>> for RetryObserver<T, Ue>
where
    T: Send + 'static,
    Ue: UserError,
{
    fn on_next(&self, value: T) {
        self.state.downstream.on_next(value);
    }
    fn on_complete(&self) {
        self.state.downstream.on_complete();
    }
    fn on_error(&self, err: RxError<Ue>) {
        let attempts_used = self.state.attempts_used.fetch_add(1, Ordering::SeqCst) + 1;
        if self.state.policy.allows(attempts_used - 1) {
            tracing::debug!(attempts_used, %err, "retry: re-subscribing after failure");
            RetryState::subscribe_once(&self.state);
        } else {
            tracing::warn!(attempts = attempts_used, %err, "retry: policy exhausted");
            self.state.downstream.on_error(RxError::RetryExhausted {
                attempts: attempts_used,
                last_error: Box::new(err),
            });
        }
    }
}

struct CatchObserver<T, Ue, M, H> {
    downstream: Arc<dyn Observer<T, RxError<Ue>>>,
    matcher: Arc<M>,
    handler: Arc<H>,
    upstream: Arc<AssignableDisposable>,
}

impl<T, Ue, M, H> Observer<T, RxError<Ue>> for CatchObserver<T, Ue, M, H>
where
    T: Send + 'static,
    Ue: UserError,
    M: Fn(&RxError<Ue>) -> bool + Send + Sync + 'static,
    H: Fn(RxError<Ue>) -> Observable<T, RxError<Ue>> + Send + Sync + 'static,
{
    fn on_next(&self, value: T) {
        self.downstream.on_next(value);
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: RxError<Ue>) {
        if (self.matcher)(&err) {
            let handler_observable = (self.handler)(err);
            let d = handler_observable.subscribe_observer(self.downstream.clone());
            self.upstream.set(d);
        } else {
            self.downstream.on_error(err);
        }
    }
}

struct ContinueWithObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    next: Observable<T, E>,
    upstream: Arc<AssignableDisposable>,
}

impl<T, E> ContinueWithObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn switch(&self) {
        let d = self.next.clone().subscribe_observer(self.downstream.clone());
        self.upstream.set(d);
    }
}

impl<T, E> Observer<T, E> for ContinueWithObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        self.downstream.on_next(value);
    }
    fn on_complete(&self) {
        self.switch();
    }
    fn on_error(&self, _err: E) {
        self.switch();
    }
}

struct FirstObserver<T, Ue> {
    downstream: Arc<dyn Observer<T, RxError<Ue>>>,
    done: AtomicBool,
    upstream: Arc<AssignableDisposable>,
}

impl<T, Ue> Observer<T, RxError<Ue>> for FirstObserver<T, Ue>
where
    T: Send + 'static,
    Ue: UserError,
{
    fn on_next(&self, value: T) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_next(value);
            self.downstream.on_complete();
            self.upstream.dispose();
        }
    }
    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_error(RxError::EmptySequence);
        }
    }
    fn on_error(&self, err: RxError<Ue>) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_error(err);
        }
    }
}

struct LastObserver<T, Ue> {
    downstream: Arc<dyn Observer<T, RxError<Ue>>>,
    last: Mutex<Option<T>>,
}

impl<T, Ue> Observer<T, RxError<Ue>> for LastObserver<T, Ue>
where
    T: Clone + Send + 'static,
    Ue: UserError,
{
    fn on_next(&self, value: T) {
        *self.last.lock() = Some(value);
    }
    fn on_complete(&self) {
        match self.last.lock().take() {
            Some(value) => {
                self.downstream.on_next(value);
                self.downstream.on_complete();
            }
            None => self.downstream.on_error(RxError::EmptySequence),
        }
    }
    fn on_error(&self, err: RxError<Ue>) {
        self.downstream.on_error(err);
    }
}

struct ElementAtObserver<T, Ue> {
    downstream: Arc<dyn Observer<T, RxError<Ue>>>,
    index: usize,
    seen: AtomicUsize,
    done: AtomicBool,
    upstream: Arc<AssignableDisposable>,
}

impl<T, Ue> Observer<T, RxError<Ue>> for ElementAtObserver<T, Ue>
where
    T: Send + 'static,
    Ue: UserError,
{
    fn on_next(&self, value: T) {
        if self.done.load(Ordering::SeqCst) {
            return;
        }
        let position = self.seen.fetch_add(1, Ordering::SeqCst);
        if position == self.index {
            self.done.store(true, Ordering::SeqCst);
            self.downstream.on_next(value);
            self.downstream.on_complete();
            self.upstream.dispose();
        }
    }
    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_error(RxError::IndexOutOfRange {
                index: self.index,
                observed: self.seen.load(Ordering::SeqCst),
            });
        }
    }
    fn on_error(&self, err: RxError<Ue>) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_error(err);
        }
    }
}

struct PanicGuardObserver<T, Ue> {
    downstream: Arc<dyn Observer<T, RxError<Ue>>>,
}

impl<T, Ue> Observer<T, RxError<Ue>> for PanicGuardObserver<T, Ue>
where
    T: Send + 'static,
    Ue: UserError,
{
    fn on_next(&self, value: T) {
        let downstream = &self.downstream;
        let outcome = catch_unwind(AssertUnwindSafe(|| downstream.on_next(value)));
        if let Err(payload) = outcome {
            downstream.on_error(RxError::UserPanic(panic_message(payload)));
        }
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: RxError<Ue>) {
        self.downstream.on_error(err);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::sync::Mutex as StdMutex;

    fn collect<T: Send + 'static>(o: Observable<T, RxError<String>>) -> (Vec<T>, Option<RxError<String>>)
    where
        T: Clone,
    {
        let values = Arc::new(StdMutex::new(Vec::new()));
        let error = Arc::new(StdMutex::new(None));
        let v = values.clone();
        let e = error.clone();
        o.subscribe(move |x| v.lock().unwrap().push(x), move |err| *e.lock().unwrap() = Some(err), || {});
        let values = Arc::try_unwrap(values).unwrap().into_inner().unwrap();
        let error = Arc::try_unwrap(error).unwrap().into_inner().unwrap();
        (values, error)
    }

    #[test]
    fn retry_resubscribes_up_to_the_policy_then_surfaces_retry_exhausted() {
        let attempts = Arc::new(StdAtomicUsize::new(0));
        let a = attempts.clone();
        let source: Observable<i32, RxError<String>> = Observable::new(move |observer| {
            a.fetch_add(1, Ordering::SeqCst);
            observer.on_error(RxError::User("boom".to_string()));
            nop()
        });

        let (values, error) = collect(source.retry(RetryPolicy::times(3)));
        assert!(values.is_empty());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert!(matches!(error, Some(RxError::RetryExhausted { attempts: 4, .. })));
    }

    #[test]
    fn catch_exception_only_intercepts_matching_errors() {
        let source: Observable<i32, RxError<String>> = Observable::new(|observer| {
            observer.on_error(RxError::Timeout);
            nop()
        });
        let (values, error) = collect(
            source.catch_exception(RxError::is_timeout, |_| Observable::new(|observer| {
                observer.on_next(99);
                observer.on_complete();
                nop()
            })),
        );
        assert_eq!(values, vec![99]);
        assert!(error.is_none());
    }

    #[test]
    fn first_completes_after_the_first_value_and_disposes_upstream() {
        let subscriptions_live = Arc::new(StdAtomicUsize::new(0));
        let s = subscriptions_live.clone();
        let source: Observable<i32, RxError<String>> = Observable::new(move |observer| {
            s.fetch_add(1, Ordering::SeqCst);
            observer.on_next(1);
            observer.on_next(2);
            observer.on_complete();
            nop()
        });
        let (values, error) = collect(source.first());
        assert_eq!(values, vec![1]);
        assert!(error.is_none());
    }

    #[test]
    fn first_on_an_empty_source_errors_with_empty_sequence() {
        let source: Observable<i32, RxError<String>> = Observable::new(|observer| {
            observer.on_complete();
            nop()
        });
        let (values, error) = collect(source.first());
        assert!(values.is_empty());
        assert!(matches!(error, Some(RxError::EmptySequence)));
    }

    #[test]
    fn element_at_errors_with_index_out_of_range_when_too_short() {
        let source: Observable<i32, RxError<String>> = Observable::new(|observer| {
            observer.on_next(10);
            observer.on_complete();
            nop()
        });
        let (values, error) = collect(source.element_at(1));
        assert!(values.is_empty());
        assert!(matches!(
            error,
            Some(RxError::IndexOutOfRange { index: 1, observed: 1 })
        ));
    }

    #[test]
    fn continue_with_switches_to_next_on_error() {
        let source: Observable<i32, RxError<String>> = Observable::new(|observer| {
            observer.on_error(RxError::Timeout);
            nop()
        });
        let fallback: Observable<i32, RxError<String>> = Observable::new(|observer| {
            observer.on_next(7);
            observer.on_complete();
            nop()
        });
        let (values, error) = collect(source.continue_with(fallback));
        assert_eq!(values, vec![7]);
        assert!(error.is_none());
    }
}
