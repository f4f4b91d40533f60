use std::sync::Arc;

use super::Scheduler;
use crate::disposable::{AssignableDisposable, CompositeDisposable, Disposable};
use crate::observable::Observable;

/// Moves the act of subscribing (running the source's subscribe function)
/// onto `scheduler`, leaving delivery of notifications on whichever thread
/// the source itself chooses to use — the counterpart to
/// [`super::observe_on`], which moves the other half.
///
/// The returned disposable is available immediately; disposing it before the
/// scheduled subscription has run cancels the subscription attempt, and
/// disposing it afterwards tears down the source as usual.
pub fn subscribe_on<T, E>(scheduler: Arc<dyn Scheduler>) -> impl Fn(Observable<T, E>) -> Observable<T, E>
where
    T: 'static,
    E: 'static,
{
    move |source| {
        let scheduler = scheduler.clone();
        Observable::new(move |observer| {
            let subscription = AssignableDisposable::new();
            let source = source.clone();
            let to_subscribe = subscription.clone();
            let cancel_schedule = scheduler.schedule(Box::new(move || {
                let d = source.subscribe_observer(observer);
                to_subscribe.set(d);
            }));

            let outer = CompositeDisposable::new();
            outer.add(cancel_schedule);
            outer.add(subscription);
            outer
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::new_thread::NewThreadScheduler;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn runs_the_subscription_on_the_scheduler() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(NewThreadScheduler);
        let (tx, rx) = mpsc::channel();
        let subscribing_thread = thread::current().id();
        let source: Observable<i32, ()> = Observable::new(move |observer| {
            let _ = tx.send(thread::current().id());
            observer.on_complete();
            crate::disposable::nop()
        });

        let observed = subscribe_on(scheduler)(source);
        observed.subscribe(|_: i32| {}, |_: ()| {}, || {});

        let subscribed_thread = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        assert_ne!(subscribed_thread, subscribing_thread);
    }
}
