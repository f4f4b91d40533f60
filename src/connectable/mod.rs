//! Connectable sources: `publish`, `replay`, `refCount`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::disposable::{nop, AssignableDisposable, Disposable};
use crate::observable::Observable;
use crate::observer::Observer;
use crate::subject::{ReplaySubject, Subject};

/// A plain `Subject` or a `ReplaySubject`, abstracted so `publish` and
/// `replay` can share one `ConnectableObservable` implementation.
trait Multicast<T, E>: Send + Sync {
    fn as_observable(&self) -> Observable<T, E>;
    fn subscribe_to_source(&self, source: &Observable<T, E>) -> Arc<dyn Disposable>;
}

struct PublishHub<T, E> {
    subject: Subject<T, E>,
}

impl<T, E> Multicast<T, E> for PublishHub<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn as_observable(&self) -> Observable<T, E> {
        self.subject.as_observable()
    }

    fn subscribe_to_source(&self, source: &Observable<T, E>) -> Arc<dyn Disposable> {
        let subject = self.subject.clone();
        source.subscribe_observer(Arc::new(SubjectObserver { subject }))
    }
}

struct ReplayHub<T, E> {
    subject: ReplaySubject<T, E>,
}

impl<T, E> Multicast<T, E> for ReplayHub<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn as_observable(&self) -> Observable<T, E> {
        self.subject.as_observable()
    }

    fn subscribe_to_source(&self, source: &Observable<T, E>) -> Arc<dyn Disposable> {
        let subject = self.subject.clone();
        source.subscribe_observer(Arc::new(ReplayObserver { subject }))
    }
}

struct SubjectObserver<T, E> {
    subject: Subject<T, E>,
}

impl<T, E> Observer<T, E> for SubjectObserver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn on_next(&self, value: T) {
        self.subject.next(value);
    }
    fn on_complete(&self) {
        self.subject.complete();
    }
    fn on_error(&self, err: E) {
        self.subject.error(err);
    }
}

struct ReplayObserver<T, E> {
    subject: ReplaySubject<T, E>,
}

impl<T, E> Observer<T, E> for ReplayObserver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn on_next(&self, value: T) {
        self.subject.next(value);
    }
    fn on_complete(&self) {
        self.subject.complete();
    }
    fn on_error(&self, err: E) {
        self.subject.error(err);
    }
}

/// Wraps `(source, hub, connection)`: subscribers attach to the hub and see
/// nothing until [`ConnectableObservable::connect`] subscribes the hub to
/// the underlying source.
pub struct ConnectableObservable<T, E> {
    source: Observable<T, E>,
    hub: Arc<dyn Multicast<T, E>>,
    connection: Arc<AssignableDisposable>,
    connected: Arc<AtomicBool>,
}

impl<T, E> Clone for ConnectableObservable<T, E> {
    fn clone(&self) -> Self {
        ConnectableObservable {
            source: self.source.clone(),
            hub: self.hub.clone(),
            connection: self.connection.clone(),
            connected: self.connected.clone(),
        }
    }
}

impl<T, E> ConnectableObservable<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn new(source: Observable<T, E>, hub: Arc<dyn Multicast<T, E>>) -> Self {
        ConnectableObservable {
            source,
            hub,
            connection: AssignableDisposable::new(),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the hub; no upstream activity happens until `connect()`.
    pub fn as_observable(&self) -> Observable<T, E> {
        self.hub.as_observable()
    }

    /// Subscribe the hub to the source, if it isn't already connected.
    /// Idempotent: repeated calls without an intervening `disconnect` are a
    /// no-op.
    pub fn connect(&self) -> Arc<dyn Disposable> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            let d = self.hub.subscribe_to_source(&self.source);
            self.connection.set(d);
        }
        self.connection.clone()
    }

    /// Tear down the current connection, if any. A subsequent `connect()`
    /// re-subscribes the hub to the source from scratch.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.connection.dispose();
    }
}

/// Wraps `source` in a plain [`Subject`]: any number of subscribers attach
/// before `connect()` and all see the same production once it starts.
pub fn publish<T, E>(source: Observable<T, E>) -> ConnectableObservable<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    ConnectableObservable::new(
        source,
        Arc::new(PublishHub {
            subject: Subject::new(),
        }),
    )
}

/// Like [`publish`], but subscribers attaching after `connect()` first
/// receive everything buffered so far by a [`ReplaySubject`].
pub fn replay<T, E>(source: Observable<T, E>, subject: ReplaySubject<T, E>) -> ConnectableObservable<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    ConnectableObservable::new(source, Arc::new(ReplayHub { subject }))
}

/// Tracks live subscriber count on `connectable`: connects on the first
/// subscription, disconnects once the last one disposes.
pub fn ref_count<T, E>(connectable: ConnectableObservable<T, E>) -> Observable<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let count = Arc::new(AtomicUsize::new(0));
    Observable::new(move |observer| {
        if count.fetch_add(1, Ordering::SeqCst) == 0 {
            connectable.connect();
        }

        let inner = connectable.as_observable().subscribe_observer(observer);

        Arc::new(RefCountGuard {
            inner,
            count: count.clone(),
            connectable: connectable.clone(),
        })
    })
}

struct RefCountGuard<T, E> {
    inner: Arc<dyn Disposable>,
    count: Arc<AtomicUsize>,
    connectable: ConnectableObservable<T, E>,
}

impl<T, E> Disposable for RefCountGuard<T, E>
where
    T: Send,
    E: Send,
{
    fn dispose(&self) {
        self.inner.dispose();
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.connectable.disconnect();
        }
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn publish_defers_upstream_activity_until_connect() {
        let subscriptions = Arc::new(StdAtomicUsize::new(0));
        let s = subscriptions.clone();
        let source: Observable<i32, ()> = Observable::new(move |observer| {
            s.fetch_add(1, Ordering::SeqCst);
            observer.on_next(1);
            observer.on_complete();
            nop()
        });

        let connectable = publish(source);
        let received = Arc::new(Mutex::new(Vec::new()));
        let r = received.clone();
        connectable
            .as_observable()
            .subscribe(move |v| r.lock().unwrap().push(v), |_: ()| {}, || {});

        assert_eq!(subscriptions.load(Ordering::SeqCst), 0);
        connectable.connect();
        assert_eq!(subscriptions.load(Ordering::SeqCst), 1);
        assert_eq!(*received.lock().unwrap(), vec![1]);
    }

    #[test]
    fn connect_is_idempotent_without_disconnect() {
        let subscriptions = Arc::new(StdAtomicUsize::new(0));
        let s = subscriptions.clone();
        let source: Observable<i32, ()> = Observable::new(move |observer| {
            s.fetch_add(1, Ordering::SeqCst);
            observer.on_complete();
            nop()
        });

        let connectable = publish(source);
        connectable.connect();
        connectable.connect();
        assert_eq!(subscriptions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ref_count_connects_on_first_subscriber_and_disconnects_on_last() {
        let subscriptions = Arc::new(StdAtomicUsize::new(0));
        let s = subscriptions.clone();
        let source: Observable<i32, ()> = Observable::new(move |observer| {
            s.fetch_add(1, Ordering::SeqCst);
            crate::disposable::nop()
        });

        let shared = ref_count(publish(source));
        let d1 = shared.subscribe(|_: i32| {}, |_: ()| {}, || {});
        assert_eq!(subscriptions.load(Ordering::SeqCst), 1);

        let d2 = shared.subscribe(|_: i32| {}, |_: ()| {}, || {});
        assert_eq!(subscriptions.load(Ordering::SeqCst), 1);

        d1.dispose();
        assert_eq!(subscriptions.load(Ordering::SeqCst), 1);
        d2.dispose();

        shared.subscribe(|_: i32| {}, |_: ()| {}, || {});
        assert_eq!(subscriptions.load(Ordering::SeqCst), 2);
    }
}
