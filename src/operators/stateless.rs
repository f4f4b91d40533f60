use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::disposable::{nop, AssignableDisposable, Disposable};
use crate::observable::Observable;
use crate::observer::Observer;

/// Bookkeeping assumes upstream serializes its calls (the grammar's own
/// invariant), so operator state below uses plain atomics/mutexes rather
/// than compare-and-swap retry loops.
impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn map<U, F>(self, f: F) -> Observable<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(MapObserver {
                downstream: observer,
                f: f.clone(),
                _marker: std::marker::PhantomData,
            }))
        })
    }

    pub fn filter<F>(self, predicate: F) -> Observable<T, E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(FilterObserver {
                downstream: observer,
                predicate: predicate.clone(),
            }))
        })
    }

    pub fn take(self, n: usize) -> Observable<T, E> {
        Observable::new(move |observer| {
            if n == 0 {
                observer.on_complete();
                return nop();
            }
            let upstream = AssignableDisposable::new();
            let inner = Arc::new(TakeObserver {
                downstream: observer,
                remaining: AtomicUsize::new(n),
                done: AtomicBool::new(false),
                upstream: upstream.clone(),
            });
            let d = self.subscribe_observer(inner);
            upstream.set(d);
            upstream
        })
    }

    pub fn skip(self, n: usize) -> Observable<T, E> {
        Observable::new(move |observer| {
            let inner = Arc::new(SkipObserver {
                downstream: observer,
                remaining: AtomicUsize::new(n),
            });
            self.subscribe_observer(inner)
        })
    }

    pub fn take_while<F>(self, predicate: F) -> Observable<T, E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Observable::new(move |observer| {
            let upstream = AssignableDisposable::new();
            let inner = Arc::new(TakeWhileObserver {
                downstream: observer,
                predicate: predicate.clone(),
                done: AtomicBool::new(false),
                upstream: upstream.clone(),
            });
            let d = self.subscribe_observer(inner);
            upstream.set(d);
            upstream
        })
    }

    pub fn skip_while<F>(self, predicate: F) -> Observable<T, E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Observable::new(move |observer| {
            let inner = Arc::new(SkipWhileObserver {
                downstream: observer,
                predicate: predicate.clone(),
                skipping: AtomicBool::new(true),
            });
            self.subscribe_observer(inner)
        })
    }

    pub fn ignore_elements(self) -> Observable<T, E> {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(IgnoreElementsObserver { downstream: observer }))
        })
    }

}

impl<E> Observable<Box<dyn Any + Send>, E>
where
    E: Send + 'static,
{
    /// Emits only values whose concrete boxed type is `U`, for streams whose
    /// element type is already a type-erased `Box<dyn Any + Send>`.
    pub fn of_type<U>(self) -> Observable<U, E>
    where
        U: Clone + Send + 'static,
    {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(OfTypeObserver::<U, E> { downstream: observer }))
        })
    }
}

impl<T, E> Observable<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    pub fn skip_last(self, n: usize) -> Observable<T, E> {
        Observable::new(move |observer| {
            let inner = Arc::new(SkipLastObserver {
                downstream: observer,
                buffer: Mutex::new(VecDeque::with_capacity(n)),
                n,
            });
            self.subscribe_observer(inner)
        })
    }

    pub fn take_last(self, n: usize) -> Observable<T, E> {
        Observable::new(move |observer| {
            let inner = Arc::new(TakeLastObserver {
                downstream: observer,
                buffer: Mutex::new(VecDeque::with_capacity(n)),
                n,
            });
            self.subscribe_observer(inner)
        })
    }

    pub fn distinct_until_changed(self) -> Observable<T, E>
    where
        T: PartialEq,
    {
        Observable::new(move |observer| {
            let inner = Arc::new(DistinctUntilChangedObserver {
                downstream: observer,
                previous: Mutex::new(None),
            });
            self.subscribe_observer(inner)
        })
    }

    pub fn distinct(self) -> Observable<T, E>
    where
        T: Eq + Hash,
    {
        Observable::new(move |observer| {
            let inner = Arc::new(DistinctObserver {
                downstream: observer,
                seen: Mutex::new(HashSet::new()),
            });
            self.subscribe_observer(inner)
        })
    }
}

struct MapObserver<T, U, E, F> {
    downstream: Arc<dyn Observer<U, E>>,
    f: Arc<F>,
    _marker: std::marker::PhantomData<T>,
}
impl<T, U, E, F> Observer<T, E> for MapObserver<T, U, E, F>
where
    T: Send,
    U: Send,
    E: Send,
    F: Fn(T) -> U + Send + Sync,
{
    fn on_next(&self, value: T) {
        self.downstream.on_next((self.f)(value));
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct FilterObserver<T, E, F> {
    downstream: Arc<dyn Observer<T, E>>,
    predicate: Arc<F>,
}
impl<T, E, F> Observer<T, E> for FilterObserver<T, E, F>
where
    T: Send,
    E: Send,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn on_next(&self, value: T) {
        if (self.predicate)(&value) {
            self.downstream.on_next(value);
        }
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct TakeObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    remaining: AtomicUsize,
    done: AtomicBool,
    upstream: Arc<AssignableDisposable>,
}
impl<T, E> Observer<T, E> for TakeObserver<T, E>
where
    T: Send,
    E: Send,
{
    fn on_next(&self, value: T) {
        if self.done.load(Ordering::SeqCst) {
            return;
        }
        let previous = self.remaining.fetch_sub(1, Ordering::SeqCst);
        self.downstream.on_next(value);
        if previous == 1 && !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_complete();
            self.upstream.dispose();
        }
    }
    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_error(err);
        }
    }
}

struct SkipObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    remaining: AtomicUsize,
}
impl<T, E> Observer<T, E> for SkipObserver<T, E>
where
    T: Send,
    E: Send,
{
    fn on_next(&self, value: T) {
        if self.remaining.load(Ordering::SeqCst) > 0 {
            self.remaining.fetch_sub(1, Ordering::SeqCst);
        } else {
            self.downstream.on_next(value);
        }
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct TakeWhileObserver<T, E, F> {
    downstream: Arc<dyn Observer<T, E>>,
    predicate: Arc<F>,
    done: AtomicBool,
    upstream: Arc<AssignableDisposable>,
}
impl<T, E, F> Observer<T, E> for TakeWhileObserver<T, E, F>
where
    T: Send,
    E: Send,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn on_next(&self, value: T) {
        if self.done.load(Ordering::SeqCst) {
            return;
        }
        if (self.predicate)(&value) {
            self.downstream.on_next(value);
        } else if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_complete();
            self.upstream.dispose();
        }
    }
    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_complete();
        }
    }
    fn on_error(&self, err: E) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.downstream.on_error(err);
        }
    }
}

struct SkipWhileObserver<T, E, F> {
    downstream: Arc<dyn Observer<T, E>>,
    predicate: Arc<F>,
    skipping: AtomicBool,
}
impl<T, E, F> Observer<T, E> for SkipWhileObserver<T, E, F>
where
    T: Send,
    E: Send,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn on_next(&self, value: T) {
        if self.skipping.load(Ordering::SeqCst) {
            if (self.predicate)(&value) {
                return;
            }
            self.skipping.store(false, Ordering::SeqCst);
        }
        self.downstream.on_next(value);
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct SkipLastObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    buffer: Mutex<VecDeque<T>>,
    n: usize,
}
impl<T, E> Observer<T, E> for SkipLastObserver<T, E>
where
    T: Send,
    E: Send,
{
    fn on_next(&self, value: T) {
        let overflow = {
            let mut buffer = self.buffer.lock();
            buffer.push_back(value);
            if buffer.len() > self.n {
                buffer.pop_front()
            } else {
                None
            }
        };
        if let Some(value) = overflow {
            self.downstream.on_next(value);
        }
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct TakeLastObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    buffer: Mutex<VecDeque<T>>,
    n: usize,
}
impl<T, E> Observer<T, E> for TakeLastObserver<T, E>
where
    T: Send,
    E: Send,
{
    fn on_next(&self, value: T) {
        let mut buffer = self.buffer.lock();
        buffer.push_back(value);
        if buffer.len() > self.n {
            buffer.pop_front();
        }
    }
    fn on_complete(&self) {
        let buffered = std::mem::take(&mut *self.buffer.lock());
        for value in buffered {
            self.downstream.on_next(value);
        }
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct DistinctUntilChangedObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    previous: Mutex<Option<T>>,
}
impl<T, E> Observer<T, E> for DistinctUntilChangedObserver<T, E>
where
    T: Clone + PartialEq + Send,
    E: Send,
{
    fn on_next(&self, value: T) {
        let changed = {
            let mut previous = self.previous.lock();
            let changed = previous.as_ref() != Some(&value);
            if changed {
                *previous = Some(value.clone());
            }
            changed
        };
        if changed {
            self.downstream.on_next(value);
        }
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct DistinctObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    seen: Mutex<HashSet<T>>,
}
impl<T, E> Observer<T, E> for DistinctObserver<T, E>
where
    T: Clone + Eq + Hash + Send,
    E: Send,
{
    fn on_next(&self, value: T) {
        let is_new = self.seen.lock().insert(value.clone());
        if is_new {
            self.downstream.on_next(value);
        }
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct IgnoreElementsObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
}
impl<T, E> Observer<T, E> for IgnoreElementsObserver<T, E>
where
    T: Send,
    E: Send,
{
    fn on_next(&self, _value: T) {}
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct OfTypeObserver<U, E> {
    downstream: Arc<dyn Observer<U, E>>,
}
impl<U, E> Observer<Box<dyn Any + Send>, E> for OfTypeObserver<U, E>
where
    U: Clone + Send + 'static,
    E: Send,
{
    fn on_next(&self, value: Box<dyn Any + Send>) {
        if let Some(matched) = value.downcast_ref::<U>() {
            self.downstream.on_next(matched.clone());
        }
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::Observable;
    use std::sync::Mutex as StdMutex;

    fn source(values: Vec<i32>) -> Observable<i32, ()> {
        Observable::new(move |observer| {
            for v in &values {
                observer.on_next(*v);
            }
            observer.on_complete();
            nop()
        })
    }

    fn collect(o: Observable<i32, ()>) -> (Vec<i32>, bool) {
        let values = Arc::new(StdMutex::new(Vec::new()));
        let completed = Arc::new(StdMutex::new(false));
        let v = values.clone();
        let c = completed.clone();
        o.subscribe(move |x| v.lock().unwrap().push(x), |_| {}, move || *c.lock().unwrap() = true);
        (values.lock().unwrap().clone(), *completed.lock().unwrap())
    }

    #[test]
    fn map_transforms_each_value() {
        let (values, completed) = collect(source(vec![1, 2, 3]).map(|x| x * 10));
        assert_eq!(values, vec![10, 20, 30]);
        assert!(completed);
    }

    #[test]
    fn map_composition_matches_a_single_composed_map() {
        let a = collect(source(vec![1, 2, 3]).map(|x| x + 1).map(|x| x * 2)).0;
        let b = collect(source(vec![1, 2, 3]).map(|x| (x + 1) * 2)).0;
        assert_eq!(a, b);
    }

    #[test]
    fn filter_keeps_only_matching_values() {
        let (values, _) = collect(source(vec![1, 2, 3, 4]).filter(|x| x % 2 == 0));
        assert_eq!(values, vec![2, 4]);
    }

    #[test]
    fn take_stops_after_n_values() {
        let (values, completed) = collect(source(vec![1, 2, 3, 4, 5]).take(2));
        assert_eq!(values, vec![1, 2]);
        assert!(completed);
    }

    #[test]
    fn take_zero_completes_immediately() {
        let (values, completed) = collect(source(vec![1, 2]).take(0));
        assert!(values.is_empty());
        assert!(completed);
    }

    #[test]
    fn skip_drops_the_first_n_values() {
        let (values, _) = collect(source(vec![1, 2, 3, 4]).skip(2));
        assert_eq!(values, vec![3, 4]);
    }

    #[test]
    fn take_while_stops_at_first_failing_predicate() {
        let (values, completed) = collect(source(vec![1, 2, 3, 1]).take_while(|x| *x < 3));
        assert_eq!(values, vec![1, 2]);
        assert!(completed);
    }

    #[test]
    fn skip_while_resumes_forwarding_after_first_failure() {
        let (values, _) = collect(source(vec![1, 2, 3, 1]).skip_while(|x| *x < 3));
        assert_eq!(values, vec![3, 1]);
    }

    #[test]
    fn skip_last_buffers_the_trailing_n_values() {
        let (values, completed) = collect(source(vec![1, 2, 3, 4, 5]).skip_last(2));
        assert_eq!(values, vec![1, 2, 3]);
        assert!(completed);
    }

    #[test]
    fn take_last_flushes_on_completion_in_arrival_order() {
        let (values, completed) = collect(source(vec![1, 2, 3, 4, 5]).take_last(2));
        assert_eq!(values, vec![4, 5]);
        assert!(completed);
    }

    #[test]
    fn distinct_until_changed_collapses_adjacent_duplicates() {
        let (values, _) = collect(source(vec![1, 1, 2, 2, 1]).distinct_until_changed());
        assert_eq!(values, vec![1, 2, 1]);
    }

    #[test]
    fn distinct_drops_every_repeat_regardless_of_position() {
        let (values, _) = collect(source(vec![1, 2, 1, 3, 2]).distinct());
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn ignore_elements_drops_values_but_keeps_completion() {
        let (values, completed) = collect(source(vec![1, 2, 3]).ignore_elements());
        assert!(values.is_empty());
        assert!(completed);
    }

    #[test]
    fn of_type_keeps_only_the_requested_concrete_type() {
        let boxed: Observable<Box<dyn Any + Send>, ()> = Observable::new(|observer| {
            observer.on_next(Box::new(1i32));
            observer.on_next(Box::new("skip me".to_string()));
            observer.on_next(Box::new(2i32));
            observer.on_complete();
            nop()
        });

        let values = Arc::new(StdMutex::new(Vec::new()));
        let v = values.clone();
        boxed.of_type::<i32>().subscribe(move |x| v.lock().unwrap().push(x), |_| {}, || {});
        assert_eq!(*values.lock().unwrap(), vec![1, 2]);
    }
}
