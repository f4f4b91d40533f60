use std::sync::Arc;

use super::Scheduler;
use crate::disposable::Disposable;
use crate::observable::Observable;
use crate::observer::Observer;

struct ObserveOnObserver<T, E> {
    inner: Arc<dyn Observer<T, E>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> Observer<T, E> for ObserveOnObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        let inner = self.inner.clone();
        self.scheduler.schedule(Box::new(move || inner.on_next(value)));
    }

    fn on_complete(&self) {
        let inner = self.inner.clone();
        self.scheduler.schedule(Box::new(move || inner.on_complete()));
    }

    fn on_error(&self, err: E) {
        let inner = self.inner.clone();
        self.scheduler.schedule(Box::new(move || inner.on_error(err)));
    }
}

/// Moves delivery of a source's notifications onto `scheduler`, leaving
/// subscription itself on whichever thread calls `subscribe` — the
/// counterpart to [`super::subscribe_on`], which moves the other half.
pub fn observe_on<T, E>(scheduler: Arc<dyn Scheduler>) -> impl Fn(Observable<T, E>) -> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    move |source| {
        let scheduler = scheduler.clone();
        Observable::new(move |observer| {
            let observer: Arc<dyn Observer<T, E>> = Arc::new(ObserveOnObserver {
                inner: observer,
                scheduler: scheduler.clone(),
            });
            source.subscribe_observer(observer)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::current_thread::CurrentThreadScheduler;
    use crate::scheduler::new_thread::NewThreadScheduler;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn defers_delivery_until_the_scheduler_is_driven() {
        let scheduler = CurrentThreadScheduler::new();
        let source: Observable<i32, ()> = Observable::new(|observer| {
            observer.on_next(1);
            observer.on_complete();
            crate::disposable::nop()
        });

        let delivered = Arc::new(Mutex::new(false));
        let d = delivered.clone();
        let observed = observe_on(scheduler.clone())(source);
        observed.subscribe(move |_| *d.lock().unwrap() = true, |_: ()| {}, || {});

        assert!(!*delivered.lock().unwrap());
        scheduler.work_all();
        assert!(*delivered.lock().unwrap());
    }

    #[test]
    fn delivers_on_a_different_thread_than_the_subscriber() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(NewThreadScheduler);
        let source: Observable<i32, ()> = Observable::new(|observer| {
            observer.on_next(1);
            observer.on_complete();
            crate::disposable::nop()
        });

        let (tx, rx) = mpsc::channel();
        let subscribing_thread = thread::current().id();
        let observed = observe_on(scheduler)(source);
        observed.subscribe(
            move |_| {
                let _ = tx.send(thread::current().id());
            },
            |_: ()| {},
            || {},
        );

        let delivering_thread = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        assert_ne!(delivering_thread, subscribing_thread);
    }
}
