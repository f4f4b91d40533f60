//! N-ary combinators: merge, concat, zip, combineLatest, switchLatest, amb,
//! flatMap, groupBy. These don't have a natural single receiver, so most are
//! free functions rather than inherent methods.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::disposable::{nop, AssignableDisposable, CompositeDisposable, Disposable};
use crate::observable::Observable;
use crate::observer::Observer;
use crate::subject::Subject;

/// Flattens an observable-of-observables: subscribes to every inner source
/// as soon as it arrives and interleaves their values. Completes once the
/// outer source and every inner source it produced have completed.
pub fn merge_all<T, E>(source: Observable<Observable<T, E>, E>) -> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    Observable::new(move |observer| {
        let composite = CompositeDisposable::new();
        let state = Arc::new(Mutex::new(MergeState {
            outer_done: false,
            active_inner: 0,
            settled: false,
        }));

        let outer_observer = Arc::new(MergeOuterObserver {
            downstream: observer,
            state,
            composite: composite.clone(),
        });
        let outer_sub = source.subscribe_observer(outer_observer);
        composite.add(outer_sub);
        composite
    })
}

/// Subscribes to every source concurrently and interleaves their values.
pub fn merge<T, E>(sources: Vec<Observable<T, E>>) -> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    merge_all(observable_of_observables(sources))
}

fn observable_of_observables<T, E>(sources: Vec<Observable<T, E>>) -> Observable<Observable<T, E>, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    Observable::new(move |observer| {
        for source in sources.clone() {
            observer.on_next(source);
        }
        observer.on_complete();
        nop()
    })
}

struct MergeState {
    outer_done: bool,
    active_inner: usize,
    settled: bool,
}

struct MergeOuterObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    state: Arc<Mutex<MergeState>>,
    composite: Arc<CompositeDisposable>,
}

impl<T, E> Observer<Observable<T, E>, E> for MergeOuterObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, inner: Observable<T, E>) {
        self.state.lock().active_inner += 1;
        let inner_observer = Arc::new(MergeInnerObserver {
            downstream: self.downstream.clone(),
            state: self.state.clone(),
        });
        let d = inner.subscribe_observer(inner_observer);
        self.composite.add(d);
    }
    fn on_complete(&self) {
        let mut state = self.state.lock();
        state.outer_done = true;
        if state.active_inner == 0 && !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        let mut state = self.state.lock();
        if !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_error(err);
            self.composite.dispose();
        }
    }
}

struct MergeInnerObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    state: Arc<Mutex<MergeState>>,
}

impl<T, E> Observer<T, E> for MergeInnerObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        if !self.state.lock().settled {
            self.downstream.on_next(value);
        }
    }
    fn on_complete(&self) {
        let mut state = self.state.lock();
        state.active_inner -= 1;
        if state.active_inner == 0 && state.outer_done && !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        let mut state = self.state.lock();
        if !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_error(err);
        }
    }
}

/// Subscribes to `sources` one at a time, in order — the next one only
/// after the previous has completed.
pub fn concat<T, E>(sources: Vec<Observable<T, E>>) -> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    Observable::new(move |observer| {
        let current = AssignableDisposable::new();
        let state = Arc::new(ConcatState {
            sources: sources.clone(),
            index: AtomicUsize::new(0),
            downstream: observer,
            current: current.clone(),
        });
        ConcatState::advance(&state);
        current
    })
}

struct ConcatState<T, E> {
    sources: Vec<Observable<T, E>>,
    index: AtomicUsize,
    downstream: Arc<dyn Observer<T, E>>,
    current: Arc<AssignableDisposable>,
}

impl<T, E> ConcatState<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn advance(self: &Arc<Self>) {
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        match self.sources.get(i) {
            Some(source) => {
                let observer = Arc::new(ConcatObserver {
                    downstream: self.downstream.clone(),
                    state: self.clone(),
                });
                let d = source.subscribe_observer(observer);
                self.current.set(d);
            }
            None => self.downstream.on_complete(),
        }
    }
}

struct ConcatObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    state: Arc<ConcatState<T, E>>,
}

impl<T, E> Observer<T, E> for ConcatObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        self.downstream.on_next(value);
    }
    fn on_complete(&self) {
        ConcatState::advance(&self.state);
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

/// Pairs up values by arrival position: the nth value from `a` with the nth
/// from `b`. Completes once either side is exhausted with its queue empty.
pub fn zip2<A, B, R, E, F>(a: Observable<A, E>, b: Observable<B, E>, selector: F) -> Observable<R, E>
where
    A: Send + 'static,
    B: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(A, B) -> R + Send + Sync + 'static,
{
    let selector = Arc::new(selector);
    Observable::new(move |observer| {
        let state = Arc::new(Mutex::new(ZipState {
            left: VecDeque::new(),
            right: VecDeque::new(),
            left_done: false,
            right_done: false,
            settled: false,
        }));
        let composite = CompositeDisposable::new();

        let left_observer = Arc::new(ZipLeftObserver {
            downstream: observer.clone(),
            state: state.clone(),
            selector: selector.clone(),
        });
        let right_observer = Arc::new(ZipRightObserver {
            downstream: observer,
            state,
            selector,
        });

        composite.add(a.subscribe_observer(left_observer));
        composite.add(b.subscribe_observer(right_observer));
        composite
    })
}

struct ZipState<A, B> {
    left: VecDeque<A>,
    right: VecDeque<B>,
    left_done: bool,
    right_done: bool,
    settled: bool,
}

fn zip_drain<A, B, R, E, F>(
    downstream: &Arc<dyn Observer<R, E>>,
    selector: &F,
    mut state: parking_lot::MutexGuard<'_, ZipState<A, B>>,
) where
    A: Send,
    B: Send,
    F: Fn(A, B) -> R + Send + Sync,
{
    while !state.left.is_empty() && !state.right.is_empty() {
        let left = state.left.pop_front().unwrap();
        let right = state.right.pop_front().unwrap();
        downstream.on_next(selector(left, right));
    }
    let exhausted =
        (state.left.is_empty() && state.left_done) || (state.right.is_empty() && state.right_done);
    if exhausted && !state.settled {
        state.settled = true;
        drop(state);
        downstream.on_complete();
    }
}

struct ZipLeftObserver<A, B, R, E, F> {
    downstream: Arc<dyn Observer<R, E>>,
    state: Arc<Mutex<ZipState<A, B>>>,
    selector: Arc<F>,
}

impl<A, B, R, E, F> Observer<A, E> for ZipLeftObserver<A, B, R, E, F>
where
    A: Send + 'static,
    B: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(A, B) -> R + Send + Sync + 'static,
{
    fn on_next(&self, value: A) {
        let mut state = self.state.lock();
        if state.settled {
            return;
        }
        state.left.push_back(value);
        zip_drain(&self.downstream, self.selector.as_ref(), state);
    }
    fn on_complete(&self) {
        let mut state = self.state.lock();
        state.left_done = true;
        if state.settled {
            return;
        }
        zip_drain(&self.downstream, self.selector.as_ref(), state);
    }
    fn on_error(&self, err: E) {
        let mut state = self.state.lock();
        if !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_error(err);
        }
    }
}

struct ZipRightObserver<A, B, R, E, F> {
    downstream: Arc<dyn Observer<R, E>>,
    state: Arc<Mutex<ZipState<A, B>>>,
    selector: Arc<F>,
}

impl<A, B, R, E, F> Observer<B, E> for ZipRightObserver<A, B, R, E, F>
where
    A: Send + 'static,
    B: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(A, B) -> R + Send + Sync + 'static,
{
    fn on_next(&self, value: B) {
        let mut state = self.state.lock();
        if state.settled {
            return;
        }
        state.right.push_back(value);
        zip_drain(&self.downstream, self.selector.as_ref(), state);
    }
    fn on_complete(&self) {
        let mut state = self.state.lock();
        state.right_done = true;
        if state.settled {
            return;
        }
        zip_drain(&self.downstream, self.selector.as_ref(), state);
    }
    fn on_error(&self, err: E) {
        let mut state = self.state.lock();
        if !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_error(err);
        }
    }
}

/// Emits `selector(latest_a, latest_b)` every time either side produces a
/// value, once both sides have produced at least one. Completes once both
/// sides have completed.
pub fn combine_latest2<A, B, R, E, F>(
    a: Observable<A, E>,
    b: Observable<B, E>,
    selector: F,
) -> Observable<R, E>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(A, B) -> R + Send + Sync + 'static,
{
    let selector = Arc::new(selector);
    Observable::new(move |observer| {
        let state = Arc::new(Mutex::new(CombineLatestState {
            left: None,
            right: None,
            left_done: false,
            right_done: false,
            settled: false,
        }));
        let composite = CompositeDisposable::new();

        composite.add(a.subscribe_observer(Arc::new(CombineLeftObserver {
            downstream: observer.clone(),
            state: state.clone(),
            selector: selector.clone(),
        })));
        composite.add(b.subscribe_observer(Arc::new(CombineRightObserver {
            downstream: observer,
            state,
            selector,
        })));
        composite
    })
}

struct CombineLatestState<A, B> {
    left: Option<A>,
    right: Option<B>,
    left_done: bool,
    right_done: bool,
    settled: bool,
}

struct CombineLeftObserver<A, B, R, E, F> {
    downstream: Arc<dyn Observer<R, E>>,
    state: Arc<Mutex<CombineLatestState<A, B>>>,
    selector: Arc<F>,
}

impl<A, B, R, E, F> Observer<A, E> for CombineLeftObserver<A, B, R, E, F>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(A, B) -> R + Send + Sync + 'static,
{
    fn on_next(&self, value: A) {
        let mut state = self.state.lock();
        if state.settled {
            return;
        }
        state.left = Some(value);
        if let (Some(l), Some(r)) = (state.left.clone(), state.right.clone()) {
            self.downstream.on_next((self.selector)(l, r));
        }
    }
    fn on_complete(&self) {
        let mut state = self.state.lock();
        state.left_done = true;
        if state.right_done && !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        let mut state = self.state.lock();
        if !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_error(err);
        }
    }
}

struct CombineRightObserver<A, B, R, E, F> {
    downstream: Arc<dyn Observer<R, E>>,
    state: Arc<Mutex<CombineLatestState<A, B>>>,
    selector: Arc<F>,
}

impl<A, B, R, E, F> Observer<B, E> for CombineRightObserver<A, B, R, E, F>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(A, B) -> R + Send + Sync + 'static,
{
    fn on_next(&self, value: B) {
        let mut state = self.state.lock();
        if state.settled {
            return;
        }
        state.right = Some(value);
        if let (Some(l), Some(r)) = (state.left.clone(), state.right.clone()) {
            self.downstream.on_next((self.selector)(l, r));
        }
    }
    fn on_complete(&self) {
        let mut state = self.state.lock();
        state.right_done = true;
        if state.left_done && !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        let mut state = self.state.lock();
        if !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_error(err);
        }
    }
}

/// Flattens an observable-of-observables by always forwarding the most
/// recently arrived inner source, unsubscribing whichever inner was
/// "current" the moment a new one arrives.
pub fn switch_latest<T, E>(source: Observable<Observable<T, E>, E>) -> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    Observable::new(move |observer| {
        let current = AssignableDisposable::new();
        let state = Arc::new(Mutex::new(SwitchState {
            outer_done: false,
            inner_active: false,
            settled: false,
            generation: 0,
        }));
        let composite = CompositeDisposable::new();

        let outer_observer = Arc::new(SwitchOuterObserver {
            downstream: observer,
            state,
            current: current.clone(),
        });
        composite.add(source.subscribe_observer(outer_observer));
        composite.add(current);
        composite
    })
}

struct SwitchState {
    outer_done: bool,
    inner_active: bool,
    settled: bool,
    generation: u64,
}

struct SwitchOuterObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    state: Arc<Mutex<SwitchState>>,
    current: Arc<AssignableDisposable>,
}

impl<T, E> Observer<Observable<T, E>, E> for SwitchOuterObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, inner: Observable<T, E>) {
        let generation = {
            let mut state = self.state.lock();
            state.inner_active = true;
            state.generation += 1;
            state.generation
        };
        let inner_observer = Arc::new(SwitchInnerObserver {
            downstream: self.downstream.clone(),
            state: self.state.clone(),
            generation,
        });
        let d = inner.subscribe_observer(inner_observer);
        self.current.set(d);
    }
    fn on_complete(&self) {
        let mut state = self.state.lock();
        state.outer_done = true;
        if !state.inner_active && !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        let mut state = self.state.lock();
        if !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_error(err);
        }
    }
}

struct SwitchInnerObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    state: Arc<Mutex<SwitchState>>,
    generation: u64,
}

impl<T, E> SwitchInnerObserver<T, E> {
    fn is_current(&self, state: &SwitchState) -> bool {
        state.generation == self.generation
    }
}

impl<T, E> Observer<T, E> for SwitchInnerObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        let state = self.state.lock();
        if self.is_current(&state) && !state.settled {
            self.downstream.on_next(value);
        }
    }
    fn on_complete(&self) {
        let mut state = self.state.lock();
        if !self.is_current(&state) {
            return;
        }
        state.inner_active = false;
        if state.outer_done && !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        let mut state = self.state.lock();
        if self.is_current(&state) && !state.settled {
            state.settled = true;
            drop(state);
            self.downstream.on_error(err);
        }
    }
}

/// Subscribes to every source at once; the first to produce any notification
/// (next, complete, or error) wins, and every other source is disposed.
pub fn amb<T, E>(sources: Vec<Observable<T, E>>) -> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    Observable::new(move |observer| {
        let winner = Arc::new(AtomicUsize::new(usize::MAX));
        let slots: Arc<Mutex<Vec<Arc<AssignableDisposable>>>> = Arc::new(Mutex::new(Vec::new()));

        for (i, source) in sources.iter().cloned().enumerate() {
            let slot = AssignableDisposable::new();
            slots.lock().push(slot.clone());

            let amb_observer = Arc::new(AmbObserver {
                downstream: observer.clone(),
                winner: winner.clone(),
                index: i,
                slots: slots.clone(),
            });
            let d = source.subscribe_observer(amb_observer);
            slot.set(d);
        }

        dispose_losers(&slots, winner.load(Ordering::SeqCst));

        let composite = CompositeDisposable::new();
        for slot in slots.lock().iter() {
            composite.add(slot.clone());
        }
        composite
    })
}

fn dispose_losers(slots: &Arc<Mutex<Vec<Arc<AssignableDisposable>>>>, winner: usize) {
    if winner == usize::MAX {
        return;
    }
    for (j, slot) in slots.lock().iter().enumerate() {
        if j != winner {
            slot.dispose();
        }
    }
}

struct AmbObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    winner: Arc<AtomicUsize>,
    index: usize,
    slots: Arc<Mutex<Vec<Arc<AssignableDisposable>>>>,
}

impl<T, E> AmbObserver<T, E> {
    /// Returns whether this source is (or just became) the winner. The
    /// first source to call this disposes every other source's slot,
    /// including ones not yet subscribed when this fired.
    fn claim_or_check(&self) -> bool {
        let won_now = self
            .winner
            .compare_exchange(usize::MAX, self.index, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if won_now {
            dispose_losers(&self.slots, self.index);
            true
        } else {
            self.winner.load(Ordering::SeqCst) == self.index
        }
    }
}

impl<T, E> Observer<T, E> for AmbObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        if self.claim_or_check() {
            self.downstream.on_next(value);
        }
    }
    fn on_complete(&self) {
        if self.claim_or_check() {
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        if self.claim_or_check() {
            self.downstream.on_error(err);
        }
    }
}

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Emits every value in `values` first, then the source's own values.
    pub fn start_with(self, values: Vec<T>) -> Observable<T, E>
    where
        T: Clone,
    {
        Observable::new(move |observer| {
            for v in values.clone() {
                observer.on_next(v);
            }
            self.subscribe_observer(observer)
        })
    }

    /// Emits the source's own values, then every value in `values` once the
    /// source completes without erroring.
    pub fn end_with(self, values: Vec<T>) -> Observable<T, E>
    where
        T: Clone,
    {
        Observable::new(move |observer| {
            let values = values.clone();
            let downstream = observer.clone();
            self.subscribe_observer(Arc::new(EndWithObserver { downstream, values }))
        })
    }

    /// Projects each value into an inner observable and merges them all.
    pub fn flat_map<U, F>(self, f: F) -> Observable<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> Observable<U, E> + Send + Sync + 'static,
    {
        merge_all(self.map(f))
    }

    /// Buckets values by `key_fn`, emitting a new [`GroupedObservable`] the
    /// first time each key is seen. Source completion or error propagates to
    /// every group's observable as well as the outer one.
    pub fn group_by<K, F>(self, key_fn: F) -> Observable<GroupedObservable<K, T, E>, E>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let key_fn = Arc::new(key_fn);
        Observable::new(move |observer| {
            let groups: Arc<Mutex<HashMap<K, Subject<T, E>>>> = Arc::new(Mutex::new(HashMap::new()));
            let group_observer = Arc::new(GroupByObserver {
                downstream: observer,
                groups,
                key_fn: key_fn.clone(),
            });
            self.subscribe_observer(group_observer)
        })
    }
}

struct EndWithObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    values: Vec<T>,
}

impl<T, E> Observer<T, E> for EndWithObserver<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        self.downstream.on_next(value);
    }
    fn on_complete(&self) {
        for v in self.values.clone() {
            self.downstream.on_next(v);
        }
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

/// A per-key sub-stream produced by [`Observable::group_by`].
pub struct GroupedObservable<K, T, E> {
    key: K,
    observable: Observable<T, E>,
}

impl<K, T, E> Clone for GroupedObservable<K, T, E>
where
    K: Clone,
{
    fn clone(&self) -> Self {
        GroupedObservable {
            key: self.key.clone(),
            observable: self.observable.clone(),
        }
    }
}

impl<K, T, E> GroupedObservable<K, T, E>
where
    K: Clone,
{
    /// The key all values on this group's observable share.
    pub fn key(&self) -> K {
        self.key.clone()
    }

    /// The underlying per-key observable.
    pub fn as_observable(&self) -> Observable<T, E> {
        self.observable.clone()
    }
}

struct GroupByObserver<K, T, E, F> {
    downstream: Arc<dyn Observer<GroupedObservable<K, T, E>, E>>,
    groups: Arc<Mutex<HashMap<K, Subject<T, E>>>>,
    key_fn: Arc<F>,
}

impl<K, T, E, F> Observer<T, E> for GroupByObserver<K, T, E, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    fn on_next(&self, value: T) {
        let key = (self.key_fn)(&value);
        let mut groups = self.groups.lock();
        let is_new = !groups.contains_key(&key);
        let subject = groups.entry(key.clone()).or_insert_with(Subject::new).clone();
        if is_new {
            drop(groups);
            self.downstream.on_next(GroupedObservable {
                key,
                observable: subject.as_observable(),
            });
        }
        subject.next(value);
    }
    fn on_complete(&self) {
        let groups = self.groups.lock();
        for subject in groups.values() {
            subject.complete();
        }
        drop(groups);
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        let groups = self.groups.lock();
        for subject in groups.values() {
            subject.error(err.clone());
        }
        drop(groups);
        self.downstream.on_error(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn source<T: Send + 'static + Clone>(values: Vec<T>) -> Observable<T, ()> {
        Observable::new(move |observer| {
            for v in values.clone() {
                observer.on_next(v);
            }
            observer.on_complete();
            nop()
        })
    }

    fn collect<T: Send + 'static + Clone>(o: Observable<T, ()>) -> Vec<T> {
        let out = Arc::new(StdMutex::new(Vec::new()));
        let r = out.clone();
        o.subscribe(move |v| r.lock().unwrap().push(v), |_: ()| {}, || {});
        Arc::try_unwrap(out).unwrap().into_inner().unwrap()
    }

    #[test]
    fn concat_subscribes_to_sources_serially() {
        let result = collect(concat(vec![source(vec![1, 2]), source(vec![3, 4])]));
        assert_eq!(result, vec![1, 2, 3, 4]);
    }

    #[test]
    fn merge_interleaves_all_sources() {
        let mut result = collect(merge(vec![source(vec![1, 2]), source(vec![3])]));
        result.sort();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[test]
    fn zip2_pairs_by_arrival_position_and_stops_at_the_shorter_side() {
        let result = collect(zip2(
            source(vec![1, 2, 3]),
            source(vec!["a", "b"]),
            |n, s| format!("{n}{s}"),
        ));
        assert_eq!(result, vec!["1a".to_string(), "2b".to_string()]);
    }

    #[test]
    fn combine_latest2_emits_once_both_sides_have_a_value() {
        let result = collect(combine_latest2(
            source(vec![1, 2]),
            source(vec![10]),
            |a, b| a + b,
        ));
        assert_eq!(result, vec![11, 12]);
    }

    #[test]
    fn amb_forwards_only_the_first_source_to_emit() {
        let result = collect(amb(vec![source(vec![1, 2]), source(vec![100])]));
        assert_eq!(result, vec![1, 2]);
    }

    #[test]
    fn flat_map_merges_projected_inner_observables() {
        let mut result = collect(source(vec![1, 2]).flat_map(|n| source(vec![n, n * 10])));
        result.sort();
        assert_eq!(result, vec![1, 2, 10, 20]);
    }

    #[test]
    fn start_with_prepends_values_before_the_source_runs() {
        let result = collect(source(vec![3, 4]).start_with(vec![1, 2]));
        assert_eq!(result, vec![1, 2, 3, 4]);
    }

    #[test]
    fn end_with_appends_values_after_the_source_completes() {
        let result = collect(source(vec![1, 2]).end_with(vec![3, 4]));
        assert_eq!(result, vec![1, 2, 3, 4]);
    }

    #[test]
    fn group_by_routes_values_to_their_keys_subject() {
        let groups = Arc::new(StdMutex::new(HashMap::<bool, Vec<i32>>::new()));
        let g = groups.clone();
        source(vec![1, 2, 3, 4, 5]).group_by(|n| n % 2 == 0).subscribe(
            move |group: GroupedObservable<bool, i32, ()>| {
                let key = group.key();
                let bucket = g.clone();
                group.as_observable().subscribe(
                    move |v| bucket.lock().unwrap().entry(key).or_default().push(v),
                    |_: ()| {},
                    || {},
                );
            },
            |_: ()| {},
            || {},
        );
        let groups = groups.lock().unwrap();
        assert_eq!(groups.get(&true), Some(&vec![2, 4]));
        assert_eq!(groups.get(&false), Some(&vec![1, 3, 5]));
    }

    #[test]
    fn switch_latest_drops_the_previous_inner_once_a_new_one_arrives() {
        let outer: Observable<Observable<i32, ()>, ()> = Observable::new(|observer| {
            observer.on_next(source(vec![1, 2]));
            observer.on_next(source(vec![10, 20]));
            observer.on_complete();
            nop()
        });
        let result = collect(switch_latest(outer));
        assert_eq!(result, vec![1, 2, 10, 20]);
    }
}
