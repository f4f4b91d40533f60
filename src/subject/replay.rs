use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::clock::{system_clock, Clock};
use crate::disposable::{nop, Disposable};
use crate::observable::Observable;
use crate::observer::Observer;

struct Entry<T> {
    at: Instant,
    value: T,
}

struct Subscriber<T, E> {
    token: u64,
    observer: Arc<dyn Observer<T, E>>,
}

enum Phase<T, E> {
    Alive {
        next_token: u64,
        subscribers: Vec<Subscriber<T, E>>,
    },
    Completed,
    Errored(E),
}

struct State<T, E> {
    buffer: VecDeque<Entry<T>>,
    phase: Phase<T, E>,
}

struct Shared<T, E> {
    clock: Arc<dyn Clock>,
    window: Option<Duration>,
    buffer_size: Option<usize>,
    state: Mutex<State<T, E>>,
}

impl<T, E> Shared<T, E>
where
    T: Clone,
{
    /// Drops entries older than the window. Must be called with `state`
    /// already locked by the caller.
    fn trim(&self, state: &mut State<T, E>) {
        if let Some(window) = self.window {
            let cutoff = self.clock.now().checked_sub(window);
            if let Some(cutoff) = cutoff {
                while matches!(state.buffer.front(), Some(e) if e.at < cutoff) {
                    state.buffer.pop_front();
                }
            }
        }
        if let Some(limit) = self.buffer_size {
            while state.buffer.len() > limit {
                state.buffer.pop_front();
            }
        }
    }
}

struct ReplaySubscription<T, E> {
    shared: Arc<Shared<T, E>>,
    token: u64,
}

impl<T, E> Disposable for ReplaySubscription<T, E>
where
    T: Send,
    E: Send,
{
    fn dispose(&self) {
        let mut state = self.shared.state.lock();
        if let Phase::Alive { subscribers, .. } = &mut state.phase {
            subscribers.retain(|s| s.token != self.token);
        }
    }

    fn is_disposed(&self) -> bool {
        false
    }
}

/// A [`super::Subject`] that additionally records emitted values (bounded by
/// a time window, a buffer size, or both) and replays the currently-eligible
/// ones to every new subscriber before attaching it live.
pub struct ReplaySubject<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for ReplaySubject<T, E> {
    fn clone(&self) -> Self {
        ReplaySubject {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> ReplaySubject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn build(window: Option<Duration>, buffer_size: Option<usize>, clock: Arc<dyn Clock>) -> Self {
        ReplaySubject {
            shared: Arc::new(Shared {
                clock,
                window,
                buffer_size,
                state: Mutex::new(State {
                    buffer: VecDeque::new(),
                    phase: Phase::Alive {
                        next_token: 0,
                        subscribers: Vec::new(),
                    },
                }),
            }),
        }
    }

    /// Replays every value ever emitted (no window, no size cap).
    pub fn unbounded() -> Self {
        Self::build(None, None, system_clock())
    }

    /// Replays at most the last `size` values.
    pub fn with_buffer_size(size: usize) -> Self {
        Self::build(None, Some(size), system_clock())
    }

    /// Replays values emitted within `window` of "now" at subscribe time.
    pub fn with_window(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::build(Some(window), None, clock)
    }

    /// Replays at most `size` values, additionally dropping any older than
    /// `window`.
    pub fn with_window_and_buffer_size(window: Duration, size: usize, clock: Arc<dyn Clock>) -> Self {
        Self::build(Some(window), Some(size), clock)
    }

    pub fn next(&self, value: T) {
        let snapshot: Vec<Arc<dyn Observer<T, E>>> = {
            let mut state = self.shared.state.lock();
            if !matches!(state.phase, Phase::Alive { .. }) {
                return;
            }
            state.buffer.push_back(Entry {
                at: self.shared.clock.now(),
                value: value.clone(),
            });
            self.shared.trim(&mut state);
            match &state.phase {
                Phase::Alive { subscribers, .. } => {
                    subscribers.iter().map(|s| s.observer.clone()).collect()
                }
                _ => unreachable!(),
            }
        };
        for observer in snapshot {
            observer.on_next(value.clone());
        }
    }

    pub fn complete(&self) {
        let snapshot = self.terminate(Phase::Completed);
        for observer in snapshot {
            observer.on_complete();
        }
    }

    pub fn error(&self, err: E) {
        let snapshot = self.terminate(Phase::Errored(err.clone()));
        for observer in snapshot {
            observer.on_error(err.clone());
        }
    }

    fn terminate(&self, to: Phase<T, E>) -> Vec<Arc<dyn Observer<T, E>>> {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut state.phase, to) {
            Phase::Alive { subscribers, .. } => subscribers.into_iter().map(|s| s.observer).collect(),
            other => {
                state.phase = other;
                Vec::new()
            }
        }
    }

    pub fn as_observable(&self) -> Observable<T, E> {
        let shared = self.shared.clone();
        Observable::new(move |observer| {
            let (buffered, token) = {
                let mut state = shared.state.lock();
                shared.trim(&mut state);
                let buffered: Vec<T> = state.buffer.iter().map(|e| e.value.clone()).collect();
                let token = match &mut state.phase {
                    Phase::Alive { next_token, subscribers } => {
                        let token = *next_token;
                        *next_token += 1;
                        subscribers.push(Subscriber {
                            token,
                            observer: observer.clone(),
                        });
                        Some(token)
                    }
                    _ => None,
                };
                (buffered, token)
            };

            for value in buffered {
                observer.on_next(value);
            }

            match token {
                Some(token) => Arc::new(ReplaySubscription {
                    shared: shared.clone(),
                    token,
                }),
                None => {
                    match &*shared.state.lock() {
                        State { phase: Phase::Errored(err), .. } => observer.on_error(err.clone()),
                        _ => observer.on_complete(),
                    }
                    nop()
                }
            }
        })
    }

    pub fn subscribe_observer(&self, observer: Arc<dyn Observer<T, E>>) -> Arc<dyn Disposable> {
        self.as_observable().subscribe_observer(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn replays_buffered_values_to_a_late_subscriber() {
        let subject = ReplaySubject::<i32, ()>::unbounded();
        subject.next(1);
        subject.next(2);

        let received = Arc::new(StdMutex::new(Vec::new()));
        let r = received.clone();
        subject
            .as_observable()
            .subscribe(move |v| r.lock().unwrap().push(v), |_| {}, || {});

        assert_eq!(*received.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn buffer_size_caps_what_is_replayed() {
        let subject = ReplaySubject::<i32, ()>::with_buffer_size(2);
        subject.next(1);
        subject.next(2);
        subject.next(3);

        let received = Arc::new(StdMutex::new(Vec::new()));
        let r = received.clone();
        subject
            .as_observable()
            .subscribe(move |v| r.lock().unwrap().push(v), |_| {}, || {});

        assert_eq!(*received.lock().unwrap(), vec![2, 3]);
    }

    #[test]
    fn window_drops_values_older_than_the_window() {
        let clock = VirtualClock::new();
        let subject = ReplaySubject::<i32, ()>::with_window(Duration::from_millis(100), clock.clone());
        subject.next(1);
        clock.advance(Duration::from_millis(150));
        subject.next(2);

        let received = Arc::new(StdMutex::new(Vec::new()));
        let r = received.clone();
        subject
            .as_observable()
            .subscribe(move |v| r.lock().unwrap().push(v), |_| {}, || {});

        assert_eq!(*received.lock().unwrap(), vec![2]);
    }

    #[test]
    fn late_subscriber_after_error_receives_it_immediately() {
        let subject = ReplaySubject::<i32, String>::unbounded();
        subject.next(1);
        subject.error("boom".to_string());

        let seen_error = Arc::new(StdMutex::new(None));
        let e = seen_error.clone();
        subject
            .as_observable()
            .subscribe(|_| {}, move |err| *e.lock().unwrap() = Some(err), || {});

        assert_eq!(*seen_error.lock().unwrap(), Some("boom".to_string()));
    }
}
