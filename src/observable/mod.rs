//! The lazy stream type itself.
//!
//! `Observable<T, E>` holds nothing but a type-erased subscribe function.
//! No work happens, and no state is allocated, until [`Observable::subscribe`]
//! (or [`Observable::subscribe_observer`]) is called — this generalizes the
//! teacher's `TeardownLogic` enum (which split a Sync closure from an Async
//! future-returning one) into a single closure shape, with the Sync/Async
//! distinction now expressed through the `Scheduler` abstraction
//! (`subscribe_on`/`observe_on`) instead of being baked into the type.

use std::sync::Arc;

use crate::disposable::Disposable;
use crate::observer::{FnObserver, Observer, SafeObserver};

type SubscribeFn<T, E> = Arc<dyn Fn(Arc<dyn Observer<T, E>>) -> Arc<dyn Disposable> + Send + Sync>;

/// A lazy specification of a zero-or-more-value stream with a terminal
/// success or error. Subscribing is the only thing that allocates state or
/// starts work; two subscriptions to the same `Observable` run
/// independently unless it was built from a [`crate::subject::Subject`].
pub struct Observable<T, E> {
    subscribe_fn: SubscribeFn<T, E>,
}

impl<T, E> Clone for Observable<T, E> {
    fn clone(&self) -> Self {
        Observable {
            subscribe_fn: self.subscribe_fn.clone(),
        }
    }
}

impl<T: 'static, E: 'static> Observable<T, E> {
    /// Build an `Observable` from its subscribe function directly. This is
    /// the primitive every generator and operator in the crate bottoms out
    /// on.
    pub fn new<F>(subscribe: F) -> Self
    where
        F: Fn(Arc<dyn Observer<T, E>>) -> Arc<dyn Disposable> + Send + Sync + 'static,
    {
        Observable {
            subscribe_fn: Arc::new(subscribe),
        }
    }

    /// Subscribe with a trait-object observer, typically one already
    /// wrapped in [`SafeObserver`] by the caller.
    pub fn subscribe_observer(&self, observer: Arc<dyn Observer<T, E>>) -> Arc<dyn Disposable> {
        (self.subscribe_fn)(observer)
    }
}

impl<T, E> Observable<T, E>
where
    T: 'static + Send,
    E: 'static + Send,
{
    /// Subscribe with three plain callbacks. The observer is wrapped in a
    /// [`SafeObserver`] so the grammar holds even if `self` is built from a
    /// misbehaving source. The default `on_error` callback re-raises by
    /// panicking on whichever thread delivers the error — production code
    /// should always pass an explicit handler.
    #[tracing::instrument(skip_all)]
    pub fn subscribe<N, Er, C>(&self, next: N, error: Er, complete: C) -> Arc<dyn Disposable>
    where
        N: Fn(T) + Send + Sync + 'static,
        Er: Fn(E) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        tracing::trace!("subscribing");
        let observer = SafeObserver::new(Arc::new(FnObserver::new(next, error, complete)));
        let subscription = self.subscribe_observer(observer);
        Arc::new(SubscriptionGuard { inner: subscription })
    }

    /// Subscribe with just a `next` callback; errors panic on the
    /// delivering thread and completion is ignored. Mirrors RxJS's
    /// single-argument `subscribe` overload, which the spec explicitly
    /// flags as something "libraries SHOULD require explicit onError in
    /// production code" for — use [`Observable::subscribe`] there.
    pub fn subscribe_next<N>(&self, next: N) -> Arc<dyn Disposable>
    where
        N: Fn(T) + Send + Sync + 'static,
        E: std::fmt::Debug,
    {
        self.subscribe(next, |e| panic!("unhandled Observable error: {e:?}"), || {})
    }
}

/// Wraps the disposable returned by a top-level `subscribe` so disposal
/// logs a lifecycle event, the same way `subscribe` itself does.
struct SubscriptionGuard {
    inner: Arc<dyn Disposable>,
}

impl Disposable for SubscriptionGuard {
    fn dispose(&self) {
        tracing::trace!("disposing subscription");
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn values_observable() -> Observable<i32, ()> {
        Observable::new(|observer| {
            observer.on_next(1);
            observer.on_next(2);
            observer.on_next(3);
            observer.on_complete();
            crate::disposable::nop()
        })
    }

    #[test]
    fn subscribe_delivers_values_then_complete() {
        let results = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(Mutex::new(false));

        let r = results.clone();
        let c = completed.clone();
        values_observable().subscribe(move |v| r.lock().unwrap().push(v), |_| {}, move || {
            *c.lock().unwrap() = true;
        });

        assert_eq!(*results.lock().unwrap(), vec![1, 2, 3]);
        assert!(*completed.lock().unwrap());
    }

    #[test]
    fn no_activity_before_subscribe() {
        let touched = Arc::new(Mutex::new(false));
        let t = touched.clone();
        let observable: Observable<i32, ()> = Observable::new(move |observer| {
            *t.lock().unwrap() = true;
            observer.on_complete();
            crate::disposable::nop()
        });

        assert!(!*touched.lock().unwrap());
        observable.subscribe(|_| {}, |_| {}, || {});
        assert!(*touched.lock().unwrap());
    }
}
