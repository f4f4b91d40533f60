use std::sync::Arc;

use parking_lot::Mutex;

use super::Observer;

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Terminated,
}

/// Wraps an observer so the grammar `next* (complete|error)?` holds no
/// matter how badly the source behaves: at most one terminal event ever
/// reaches `inner`, and nothing is delivered once a terminal has fired.
///
/// `on_next` holds the gate's mutex for the duration of the call to
/// `inner.on_next` — deliberately: this is what makes concurrent `next`
/// calls from distinct threads (two `merge`d sources racing, for example)
/// land one at a time instead of interleaving mid-value. This is narrower
/// than the "don't hold locks across downstream calls" rule that applies to
/// an operator's own bookkeeping state (zip queues, subject subscriber
/// lists) — this lock exists specifically to serialize delivery, which is
/// the gate's whole purpose.
pub struct SafeObserver<T, E> {
    inner: Arc<dyn Observer<T, E>>,
    state: Mutex<State>,
}

impl<T, E> SafeObserver<T, E> {
    pub fn new(inner: Arc<dyn Observer<T, E>>) -> Arc<Self> {
        Arc::new(SafeObserver {
            inner,
            state: Mutex::new(State::Active),
        })
    }
}

impl<T, E> Observer<T, E> for SafeObserver<T, E> {
    fn on_next(&self, value: T) {
        let guard = self.state.lock();
        if *guard == State::Active {
            self.inner.on_next(value);
        }
    }

    fn on_complete(&self) {
        let mut guard = self.state.lock();
        if *guard == State::Active {
            *guard = State::Terminated;
            drop(guard);
            self.inner.on_complete();
        }
    }

    fn on_error(&self, err: E) {
        let mut guard = self.state.lock();
        if *guard == State::Active {
            *guard = State::Terminated;
            drop(guard);
            self.inner.on_error(err);
        }
    }
}
