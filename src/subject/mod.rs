//! Multicast hub: simultaneously an [`Observer`] and an [`Observable`].

mod replay;

pub use replay::ReplaySubject;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::disposable::{nop, Disposable};
use crate::observable::Observable;
use crate::observer::Observer;

struct Subscriber<T, E> {
    token: u64,
    observer: Arc<dyn Observer<T, E>>,
}

enum State<T, E> {
    Alive {
        next_token: u64,
        subscribers: Vec<Subscriber<T, E>>,
    },
    Completed,
    Errored(E),
}

struct Shared<T, E> {
    state: Mutex<State<T, E>>,
}

impl<T, E> Shared<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn subscribe(self: &Arc<Self>, observer: Arc<dyn Observer<T, E>>) -> Arc<dyn Disposable> {
        let token = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Alive { next_token, subscribers } => {
                    let token = *next_token;
                    *next_token += 1;
                    subscribers.push(Subscriber {
                        token,
                        observer: observer.clone(),
                    });
                    Some(token)
                }
                State::Completed => None,
                State::Errored(_) => None,
            }
        };

        match token {
            Some(token) => SubjectSubscription {
                shared: self.clone(),
                token,
            }
            .boxed(),
            None => {
                // Already terminated: a late subscriber receives the same
                // terminal event every live subscriber already saw.
                match &*self.state.lock() {
                    State::Errored(err) => observer.on_error(err.clone()),
                    _ => observer.on_complete(),
                }
                nop()
            }
        }
    }

    fn remove(&self, token: u64) {
        let mut state = self.state.lock();
        if let State::Alive { subscribers, .. } = &mut *state {
            subscribers.retain(|s| s.token != token);
        }
    }
}

struct SubjectSubscription<T, E> {
    shared: Arc<Shared<T, E>>,
    token: u64,
}

impl<T, E> SubjectSubscription<T, E>
where
    T: 'static,
    E: 'static,
{
    fn boxed(self) -> Arc<dyn Disposable> {
        Arc::new(self)
    }
}

impl<T, E> Disposable for SubjectSubscription<T, E>
where
    T: Send,
    E: Send,
{
    fn dispose(&self) {
        self.shared.remove(self.token);
    }

    fn is_disposed(&self) -> bool {
        false
    }
}

/// A hub that is both a sink (call `next`/`complete`/`error` to feed it) and
/// a source (`subscribe` to observe what's fed in). Values pushed before any
/// subscriber attaches are lost — pair with [`ReplaySubject`] if latecomers
/// need history.
pub struct Subject<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Subject<T, E> {
    fn clone(&self) -> Self {
        Subject {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> Subject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Subject {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Alive {
                    next_token: 0,
                    subscribers: Vec::new(),
                }),
            }),
        }
    }

    /// Push a value to every subscriber currently attached. Dispatch
    /// iterates a snapshot taken under the lock, so a subscriber that
    /// disposes mid-dispatch doesn't corrupt iteration, and one that
    /// subscribes mid-dispatch is deferred to the next call.
    pub fn next(&self, value: T) {
        let snapshot: Vec<Arc<dyn Observer<T, E>>> = {
            let state = self.shared.state.lock();
            match &*state {
                State::Alive { subscribers, .. } => {
                    subscribers.iter().map(|s| s.observer.clone()).collect()
                }
                _ => return,
            }
        };
        for observer in snapshot {
            observer.on_next(value.clone());
        }
    }

    pub fn complete(&self) {
        let snapshot = self.terminate(State::Completed);
        for observer in snapshot {
            observer.on_complete();
        }
    }

    pub fn error(&self, err: E) {
        let snapshot = self.terminate(State::Errored(err.clone()));
        for observer in snapshot {
            observer.on_error(err.clone());
        }
    }

    fn terminate(&self, to: State<T, E>) -> Vec<Arc<dyn Observer<T, E>>> {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut *state, to) {
            State::Alive { subscribers, .. } => {
                subscribers.into_iter().map(|s| s.observer).collect()
            }
            other => {
                *state = other;
                Vec::new()
            }
        }
    }

    /// View this subject as a plain `Observable` for downstream operators.
    pub fn as_observable(&self) -> Observable<T, E> {
        let shared = self.shared.clone();
        Observable::new(move |observer| shared.subscribe(observer))
    }

    pub fn subscribe_observer(&self, observer: Arc<dyn Observer<T, E>>) -> Arc<dyn Disposable> {
        self.shared.subscribe(observer)
    }
}

impl<T, E> Default for Subject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn subscribers_receive_values_pushed_after_they_attach() {
        let subject = Subject::<i32, ()>::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        let r = received.clone();
        subject
            .as_observable()
            .subscribe(move |v| r.lock().unwrap().push(v), |_| {}, || {});

        subject.next(1);
        subject.next(2);
        assert_eq!(*received.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn values_pushed_before_subscription_are_not_replayed() {
        let subject = Subject::<i32, ()>::new();
        subject.next(1);

        let received = Arc::new(StdMutex::new(Vec::new()));
        let r = received.clone();
        subject
            .as_observable()
            .subscribe(move |v| r.lock().unwrap().push(v), |_| {}, || {});
        subject.next(2);

        assert_eq!(*received.lock().unwrap(), vec![2]);
    }

    #[test]
    fn late_subscriber_after_completion_gets_an_immediate_terminal() {
        let subject = Subject::<i32, ()>::new();
        subject.complete();

        let completed = Arc::new(StdMutex::new(false));
        let c = completed.clone();
        subject
            .as_observable()
            .subscribe(|_| {}, |_| {}, move || *c.lock().unwrap() = true);
        assert!(*completed.lock().unwrap());
    }

    #[test]
    fn disposing_a_subscription_stops_further_delivery() {
        let subject = Subject::<i32, ()>::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        let r = received.clone();
        let d = subject
            .as_observable()
            .subscribe(move |v| r.lock().unwrap().push(v), |_| {}, || {});

        subject.next(1);
        d.dispose();
        subject.next(2);

        assert_eq!(*received.lock().unwrap(), vec![1]);
    }
}
