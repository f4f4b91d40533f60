//! Aggregate operators: fold an entire sequence down to one value, or
//! short-circuit as soon as the answer is known.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::disposable::{AssignableDisposable, Disposable};
use crate::observable::Observable;
use crate::observer::Observer;

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Folds the whole sequence into one value, emitted on completion.
    pub fn reduce<A, F>(self, seed: A, f: F) -> Observable<A, E>
    where
        A: Clone + Send + 'static,
        F: Fn(A, T) -> A + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(ReduceObserver {
                downstream: observer,
                acc: Mutex::new(seed.clone()),
                f: f.clone(),
                _marker: std::marker::PhantomData,
            }))
        })
    }

    /// Emits a running fold on every value, rather than just the final one.
    pub fn scan<A, F>(self, seed: A, f: F) -> Observable<A, E>
    where
        A: Clone + Send + 'static,
        F: Fn(A, T) -> A + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(ScanObserver {
                downstream: observer,
                acc: Mutex::new(seed.clone()),
                f: f.clone(),
                _marker: std::marker::PhantomData,
            }))
        })
    }

    /// Emits the number of values seen, on completion.
    pub fn length(self) -> Observable<usize, E> {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(LengthObserver {
                downstream: observer,
                count: Mutex::new(0),
                _marker: std::marker::PhantomData,
            }))
        })
    }

    /// Short-circuits once `predicate` matches any value: emits `true` and
    /// completes, disposing the upstream. Emits `false` if the source
    /// completes with nothing matching.
    pub fn any<F>(self, predicate: F) -> Observable<bool, E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Observable::new(move |observer| {
            let upstream = AssignableDisposable::new();
            let inner = Arc::new(AnyObserver {
                downstream: observer,
                predicate: predicate.clone(),
                done: AtomicBool::new(false),
                upstream: upstream.clone(),
                _marker: std::marker::PhantomData,
            });
            let d = self.subscribe_observer(inner);
            upstream.set(d);
            upstream
        })
    }

    /// Short-circuits as soon as `predicate` fails on any value, emitting
    /// `false`. Emits `true` if the source completes with every value
    /// matching.
    pub fn all<F>(self, predicate: F) -> Observable<bool, E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Observable::new(move |observer| {
            let upstream = AssignableDisposable::new();
            let inner = Arc::new(AllObserver {
                downstream: observer,
                predicate: predicate.clone(),
                done: AtomicBool::new(false),
                upstream: upstream.clone(),
                _marker: std::marker::PhantomData,
            });
            let d = self.subscribe_observer(inner);
            upstream.set(d);
            upstream
        })
    }

    /// `any`, specialized to equality against a fixed target.
    pub fn contains(self, target: T) -> Observable<bool, E>
    where
        T: PartialEq + Clone + Send + Sync + 'static,
    {
        self.any(move |v| *v == target)
    }
}

impl<T, E> Observable<T, E>
where
    T: Clone + Send + PartialOrd + 'static,
    E: Send + 'static,
{
    /// The smallest value seen, emitted on completion. Lazily initialized
    /// on first value; a source with no values completes with no value.
    pub fn min(self) -> Observable<T, E> {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(ExtremumObserver {
                downstream: observer,
                best: Mutex::new(None),
                keep_left_if: |left: &T, right: &T| left <= right,
            }))
        })
    }

    /// The largest value seen, emitted on completion.
    pub fn max(self) -> Observable<T, E> {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(ExtremumObserver {
                downstream: observer,
                best: Mutex::new(None),
                keep_left_if: |left: &T, right: &T| left >= right,
            }))
        })
    }

    /// Emits `default` if the source completes with no values, otherwise
    /// forwards the source unchanged.
    pub fn default_if_empty(self, default: T) -> Observable<T, E>
    where
        T: Sync,
    {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(DefaultIfEmptyObserver {
                downstream: observer,
                saw_value: AtomicBool::new(false),
                default: default.clone(),
            }))
        })
    }
}

/// Pairwise-compares two sequences: `false` on any mismatch (value or
/// length), `true` if both complete having matched every element.
pub fn sequence_equal<T, E>(a: Observable<T, E>, b: Observable<T, E>) -> Observable<bool, E>
where
    T: PartialEq + Send + 'static,
    E: Send + 'static,
{
    Observable::new(move |observer| {
        let state = Arc::new(Mutex::new(SequenceEqualState {
            left: std::collections::VecDeque::new(),
            right: std::collections::VecDeque::new(),
            left_done: false,
            right_done: false,
            settled: false,
        }));
        let upstream = AssignableDisposable::new();

        let left_observer = Arc::new(SequenceEqualObserver {
            downstream: observer.clone(),
            state: state.clone(),
            upstream: upstream.clone(),
            this_is_left: true,
        });
        let right_observer = Arc::new(SequenceEqualObserver {
            downstream: observer,
            state,
            upstream: upstream.clone(),
            this_is_left: false,
        });

        let da = a.subscribe_observer(left_observer);
        let db = b.subscribe_observer(right_observer);
        let composite = crate::disposable::CompositeDisposable::new();
        composite.add(da);
        composite.add(db);
        upstream.set(composite.clone());
        composite
    })
}

struct ReduceObserver<T, A, E, F> {
    downstream: Arc<dyn Observer<A, E>>,
    acc: Mutex<A>,
    f: Arc<F>,
    _marker: std::marker::PhantomData<T>,
}

impl<T, A, E, F> Observer<T, E> for ReduceObserver<T, A, E, F>
where
    T: Send,
    A: Clone + Send,
    E: Send,
    F: Fn(A, T) -> A + Send + Sync,
{
    fn on_next(&self, value: T) {
        let mut acc = self.acc.lock();
        *acc = (self.f)(acc.clone(), value);
    }
    fn on_complete(&self) {
        self.downstream.on_next(self.acc.lock().clone());
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct ScanObserver<T, A, E, F> {
    downstream: Arc<dyn Observer<A, E>>,
    acc: Mutex<A>,
    f: Arc<F>,
    #[allow(dead_code)]
    _marker: std::marker::PhantomData<T>,
}

impl<T, A, E, F> Observer<T, E> for ScanObserver<T, A, E, F>
where
    T: Send,
    A: Clone + Send,
    E: Send,
    F: Fn(A, T) -> A + Send + Sync,
{
    fn on_next(&self, value: T) {
        let mut acc = self.acc.lock();
        *acc = (self.f)(acc.clone(), value);
        self.downstream.on_next(acc.clone());
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct LengthObserver<T, E> {
    downstream: Arc<dyn Observer<usize, E>>,
    count: Mutex<usize>,
    #[allow(dead_code)]
    _marker: std::marker::PhantomData<T>,
}

impl<T, E> Observer<T, E> for LengthObserver<T, E>
where
    T: Send,
    E: Send,
{
    fn on_next(&self, _value: T) {
        *self.count.lock() += 1;
    }
    fn on_complete(&self) {
        self.downstream.on_next(*self.count.lock());
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct AnyObserver<T, E, F> {
    downstream: Arc<dyn Observer<bool, E>>,
    predicate: Arc<F>,
    done: AtomicBool,
    upstream: Arc<AssignableDisposable>,
    #[allow(dead_code)]
    _marker: std::marker::PhantomData<T>,
}

impl<T, E, F> Observer<T, E> for AnyObserver<T, E, F>
where
    T: Send,
    E: Send,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn on_next(&self, value: T) {
        if self.done.load(Ordering::SeqCst) {
            return;
        }
        if (self.predicate)(&value) && !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_next(true);
            self.downstream.on_complete();
            self.upstream.dispose();
        }
    }
    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_next(false);
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_error(err);
        }
    }
}

struct AllObserver<T, E, F> {
    downstream: Arc<dyn Observer<bool, E>>,
    predicate: Arc<F>,
    done: AtomicBool,
    upstream: Arc<AssignableDisposable>,
    #[allow(dead_code)]
    _marker: std::marker::PhantomData<T>,
}

impl<T, E, F> Observer<T, E> for AllObserver<T, E, F>
where
    T: Send,
    E: Send,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn on_next(&self, value: T) {
        if self.done.load(Ordering::SeqCst) {
            return;
        }
        if !(self.predicate)(&value) && !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_next(false);
            self.downstream.on_complete();
            self.upstream.dispose();
        }
    }
    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_next(true);
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_error(err);
        }
    }
}

struct ExtremumObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    best: Mutex<Option<T>>,
    keep_left_if: fn(&T, &T) -> bool,
}

impl<T, E> Observer<T, E> for ExtremumObserver<T, E>
where
    T: Clone + Send,
    E: Send,
{
    fn on_next(&self, value: T) {
        let mut best = self.best.lock();
        *best = Some(match best.take() {
            Some(current) if (self.keep_left_if)(&current, &value) => current,
            _ => value,
        });
    }
    fn on_complete(&self) {
        if let Some(value) = self.best.lock().clone() {
            self.downstream.on_next(value);
        }
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct DefaultIfEmptyObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    saw_value: AtomicBool,
    default: T,
}

impl<T, E> Observer<T, E> for DefaultIfEmptyObserver<T, E>
where
    T: Clone + Send,
    E: Send,
{
    fn on_next(&self, value: T) {
        self.saw_value.store(true, Ordering::SeqCst);
        self.downstream.on_next(value);
    }
    fn on_complete(&self) {
        if !self.saw_value.load(Ordering::SeqCst) {
            self.downstream.on_next(self.default.clone());
        }
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct SequenceEqualState<T> {
    left: std::collections::VecDeque<T>,
    right: std::collections::VecDeque<T>,
    left_done: bool,
    right_done: bool,
    settled: bool,
}

struct SequenceEqualObserver<T, E> {
    downstream: Arc<dyn Observer<bool, E>>,
    state: Arc<Mutex<SequenceEqualState<T>>>,
    upstream: Arc<AssignableDisposable>,
    this_is_left: bool,
}

impl<T, E> SequenceEqualObserver<T, E>
where
    T: PartialEq + Send,
    E: Send,
{
    fn settle(&self, state: &mut SequenceEqualState<T>, result: bool) {
        if !state.settled {
            state.settled = true;
            self.downstream.on_next(result);
            self.downstream.on_complete();
            self.upstream.dispose();
        }
    }

    fn drain(&self, state: &mut SequenceEqualState<T>) {
        loop {
            if state.settled {
                return;
            }
            match (state.left.front(), state.right.front()) {
                (Some(l), Some(r)) => {
                    if l != r {
                        self.settle(state, false);
                        return;
                    }
                    state.left.pop_front();
                    state.right.pop_front();
                }
                (None, None) if state.left_done && state.right_done => {
                    self.settle(state, true);
                    return;
                }
                (None, Some(_)) if state.left_done => {
                    self.settle(state, false);
                    return;
                }
                (Some(_), None) if state.right_done => {
                    self.settle(state, false);
                    return;
                }
                _ => return,
            }
        }
    }
}

impl<T, E> Observer<T, E> for SequenceEqualObserver<T, E>
where
    T: PartialEq + Send,
    E: Send,
{
    fn on_next(&self, value: T) {
        let mut state = self.state.lock();
        if state.settled {
            return;
        }
        if self.this_is_left {
            state.left.push_back(value);
        } else {
            state.right.push_back(value);
        }
        self.drain(&mut state);
    }
    fn on_complete(&self) {
        let mut state = self.state.lock();
        if self.this_is_left {
            state.left_done = true;
        } else {
            state.right_done = true;
        }
        self.drain(&mut state);
    }
    fn on_error(&self, err: E) {
        let mut state = self.state.lock();
        if !state.settled {
            state.settled = true;
            self.downstream.on_error(err);
            self.upstream.dispose();
        }
    }
}
