//! Time-based operators: `debounce`, `sample`, `buffer`, `window`, `delay`,
//! `timeout`, `timestamp`, `timeInterval`. All sample a monotonic
//! [`crate::clock::Clock`] rather than wall time, and dispatch through a
//! [`Scheduler`], so tests can drive them with a `VirtualClock` +
//! `CurrentThreadScheduler` instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::disposable::{AssignableDisposable, CompositeDisposable, Disposable};
use crate::error::{RxError, UserError};
use crate::observable::Observable;
use crate::observer::Observer;
use crate::scheduler::Scheduler;
use crate::subject::Subject;

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// On each value, cancels any pending emission and schedules this one
    /// after `d`. A burst of values emits only the last one once it goes
    /// quiet for `d`. On completion, flushes a still-pending value first.
    pub fn debounce(self, d: Duration, scheduler: Arc<dyn Scheduler>) -> Observable<T, E>
    where
        T: Clone,
    {
        Observable::new(move |observer| {
            let state = Arc::new(DebounceState {
                downstream: observer,
                scheduler: scheduler.clone(),
                delay: d,
                pending: AssignableDisposable::new(),
                latest: Mutex::new(None),
                generation: AtomicU64::new(0),
            });
            self.subscribe_observer(Arc::new(DebounceObserver { state }))
        })
    }

    /// Remembers the latest value and emits it every `d`, skipping a tick
    /// if nothing new arrived. Emits one last time on completion if a
    /// value arrived since the previous tick.
    pub fn sample(self, d: Duration, scheduler: Arc<dyn Scheduler>) -> Observable<T, E>
    where
        T: Clone,
    {
        Observable::new(move |observer| {
            let state = Arc::new(SampleState {
                downstream: observer,
                latest: Mutex::new(None),
                fresh: Mutex::new(false),
                done: Mutex::new(false),
            });
            let composite = CompositeDisposable::new();
            composite.add(self.subscribe_observer(Arc::new(SampleObserver { state: state.clone() })));
            composite.add(crate::scheduler::schedule_recursive(scheduler.clone(), move |recurser| {
                recurser.schedule_after(d);
                state.tick();
            }));
            composite
        })
    }

    /// Accumulates values, flushing whichever comes first: `window`
    /// elapses, or `max_count` values have accumulated. A non-empty
    /// partial buffer flushes once more on completion.
    pub fn buffer(self, window: Duration, max_count: usize, scheduler: Arc<dyn Scheduler>) -> Observable<Vec<T>, E>
    where
        T: Clone,
    {
        Observable::new(move |observer| {
            let state = Arc::new(BufferState {
                downstream: observer,
                max_count,
                buf: Mutex::new(Vec::new()),
            });
            let composite = CompositeDisposable::new();
            let s = state.clone();
            composite.add(crate::scheduler::schedule_recursive(scheduler.clone(), move |recurser| {
                recurser.schedule_after(window);
                s.flush();
            }));
            composite.add(self.subscribe_observer(Arc::new(BufferObserver { state })));
            composite
        })
    }

    /// Splits the source into a stream of windows, each a [`Subject`]
    /// lasting `window` time before completing and being replaced by the
    /// next one.
    pub fn window(self, window: Duration, scheduler: Arc<dyn Scheduler>) -> Observable<Observable<T, E>, E>
    where
        T: Clone,
        E: Clone,
    {
        Observable::new(move |observer| {
            let state = Arc::new(WindowState {
                downstream: observer,
                current: Mutex::new(Subject::new()),
            });
            state.open_new_window();
            let composite = CompositeDisposable::new();
            let s = state.clone();
            composite.add(crate::scheduler::schedule_recursive(scheduler.clone(), move |recurser| {
                recurser.schedule_after(window);
                s.rotate();
            }));
            composite.add(self.subscribe_observer(Arc::new(WindowObserver { state })));
            composite
        })
    }

    /// Schedules each emission after its own delay, computed by `delay_fn`
    /// from the value. If `delay_fn` returns non-monotonic delays, values
    /// can arrive downstream out of the order they arrived upstream.
    pub fn delay_with<F>(self, delay_fn: F, scheduler: Arc<dyn Scheduler>) -> Observable<T, E>
    where
        F: Fn(&T) -> Duration + Send + Sync + 'static,
    {
        let delay_fn = Arc::new(delay_fn);
        Observable::new(move |observer| {
            let composite = CompositeDisposable::new();
            composite.add(self.subscribe_observer(Arc::new(DelayObserver {
                downstream: observer,
                delay_fn: delay_fn.clone(),
                scheduler: scheduler.clone(),
                pending: composite.clone(),
            })));
            composite
        })
    }

    /// Schedules every emission after the same fixed `d`.
    pub fn delay(self, d: Duration, scheduler: Arc<dyn Scheduler>) -> Observable<T, E> {
        self.delay_with(move |_| d, scheduler)
    }

    /// Wraps each value with the absolute time it was observed, per
    /// `clock`.
    pub fn timestamp(self, clock: Arc<dyn Clock>) -> Observable<(T, Instant), E> {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(TimestampObserver {
                downstream: observer,
                clock: clock.clone(),
            }))
        })
    }

    /// Wraps each value with the elapsed time since the previous emission
    /// (or since subscription, for the first).
    pub fn time_interval(self, clock: Arc<dyn Clock>) -> Observable<(T, Duration), E> {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(TimeIntervalObserver {
                downstream: observer,
                clock: clock.clone(),
                last: Mutex::new(None),
            }))
        })
    }
}

impl<T, Ue> Observable<T, RxError<Ue>>
where
    T: Send + 'static,
    Ue: UserError,
{
    /// Starts a timer on subscribe and restarts it on every value. If it
    /// ever fires, forwards [`RxError::Timeout`] and cancels upstream.
    pub fn timeout(self, d: Duration, scheduler: Arc<dyn Scheduler>) -> Observable<T, RxError<Ue>> {
        Observable::new(move |observer| {
            let upstream = AssignableDisposable::new();
            let state = Arc::new(TimeoutState {
                downstream: observer,
                scheduler: scheduler.clone(),
                timer: AssignableDisposable::new(),
                upstream: upstream.clone(),
                generation: AtomicU64::new(0),
                done: Mutex::new(false),
            });
            state.arm(d);
            upstream.set(self.subscribe_observer(Arc::new(TimeoutObserver { state })));
            upstream
        })
    }
}

struct DebounceState<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    scheduler: Arc<dyn Scheduler>,
    delay: Duration,
    pending: Arc<AssignableDisposable>,
    latest: Mutex<Option<T>>,
    generation: AtomicU64,
}

struct DebounceObserver<T, E> {
    state: Arc<DebounceState<T, E>>,
}

impl<T, E> Observer<T, E> for DebounceObserver<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        let state = self.state.clone();
        *state.latest.lock() = Some(value);
        let generation = state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let emit_state = state.clone();
        let work: crate::scheduler::Work = Box::new(move || {
            if emit_state.generation.load(Ordering::SeqCst) == generation {
                if let Some(v) = emit_state.latest.lock().take() {
                    emit_state.downstream.on_next(v);
                }
            }
        });
        let handle = state.scheduler.schedule_after(state.delay, work);
        state.pending.set(handle);
    }

    fn on_complete(&self) {
        if let Some(v) = self.state.latest.lock().take() {
            self.state.downstream.on_next(v);
        }
        self.state.downstream.on_complete();
    }

    fn on_error(&self, err: E) {
        self.state.pending.dispose();
        self.state.downstream.on_error(err);
    }
}

struct SampleState<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
    latest: Mutex<Option<T>>,
    fresh: Mutex<bool>,
    done: Mutex<bool>,
}

impl<T, E> SampleState<T, E>
where
    T: Clone,
{
    fn tick(&self) {
        if *self.done.lock() {
            return;
        }
        let mut fresh = self.fresh.lock();
        if *fresh {
            *fresh = false;
            if let Some(v) = self.latest.lock().clone() {
                self.downstream.on_next(v);
            }
        }
    }
}

struct SampleObserver<T, E> {
    state: Arc<SampleState<T, E>>,
}

impl<T, E> Observer<T, E> for SampleObserver<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        *self.state.latest.lock() = Some(value);
        *self.state.fresh.lock() = true;
    }

    fn on_complete(&self) {
        *self.state.done.lock() = true;
        self.state.tick();
        self.state.downstream.on_complete();
    }

    fn on_error(&self, err: E) {
        *self.state.done.lock() = true;
        self.state.downstream.on_error(err);
    }
}

struct BufferState<T, E> {
    downstream: Arc<dyn Observer<Vec<T>, E>>,
    max_count: usize,
    buf: Mutex<Vec<T>>,
}

impl<T, E> BufferState<T, E> {
    fn flush(&self) {
        let mut buf = self.buf.lock();
        if !buf.is_empty() {
            let batch = std::mem::take(&mut *buf);
            drop(buf);
            self.downstream.on_next(batch);
        }
    }
}

struct BufferObserver<T, E> {
    state: Arc<BufferState<T, E>>,
}

impl<T, E> Observer<T, E> for BufferObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        let should_flush = {
            let mut buf = self.state.buf.lock();
            buf.push(value);
            buf.len() >= self.state.max_count
        };
        if should_flush {
            self.state.flush();
        }
    }

    fn on_complete(&self) {
        self.state.flush();
        self.state.downstream.on_complete();
    }

    fn on_error(&self, err: E) {
        self.state.downstream.on_error(err);
    }
}

struct WindowState<T, E> {
    downstream: Arc<dyn Observer<Observable<T, E>, E>>,
    current: Mutex<Subject<T, E>>,
}

impl<T, E> WindowState<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn open_new_window(&self) {
        let subject = Subject::new();
        self.downstream.on_next(subject.as_observable());
        *self.current.lock() = subject;
    }

    fn rotate(&self) {
        let old = self.current.lock().clone();
        old.complete();
        self.open_new_window();
    }
}

struct WindowObserver<T, E> {
    state: Arc<WindowState<T, E>>,
}

impl<T, E> Observer<T, E> for WindowObserver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn on_next(&self, value: T) {
        self.state.current.lock().next(value);
    }

    fn on_complete(&self) {
        self.state.current.lock().complete();
        self.state.downstream.on_complete();
    }

    fn on_error(&self, err: E) {
        self.state.current.lock().error(err.clone());
        self.state.downstream.on_error(err);
    }
}

struct DelayObserver<T, E, F> {
    downstream: Arc<dyn Observer<T, E>>,
    delay_fn: Arc<F>,
    scheduler: Arc<dyn Scheduler>,
    pending: Arc<CompositeDisposable>,
}

impl<T, E, F> Observer<T, E> for DelayObserver<T, E, F>
where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(&T) -> Duration + Send + Sync + 'static,
{
    fn on_next(&self, value: T) {
        let delay = (self.delay_fn)(&value);
        let downstream = self.downstream.clone();
        let handle = self.scheduler.schedule_after(delay, Box::new(move || downstream.on_next(value)));
        self.pending.add(handle);
    }

    fn on_complete(&self) {
        let downstream = self.downstream.clone();
        let handle = self.scheduler.schedule(Box::new(move || downstream.on_complete()));
        self.pending.add(handle);
    }

    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct TimestampObserver<T, E> {
    downstream: Arc<dyn Observer<(T, Instant), E>>,
    clock: Arc<dyn Clock>,
}

impl<T, E> Observer<T, E> for TimestampObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        self.downstream.on_next((value, self.clock.now()));
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct TimeIntervalObserver<T, E> {
    downstream: Arc<dyn Observer<(T, Duration), E>>,
    clock: Arc<dyn Clock>,
    last: Mutex<Option<Instant>>,
}

impl<T, E> Observer<T, E> for TimeIntervalObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        let now = self.clock.now();
        let mut last = self.last.lock();
        let delta = match *last {
            Some(prev) => now.saturating_duration_since(prev),
            None => Duration::ZERO,
        };
        *last = Some(now);
        drop(last);
        self.downstream.on_next((value, delta));
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

struct TimeoutState<T, Ue> {
    downstream: Arc<dyn Observer<T, RxError<Ue>>>,
    scheduler: Arc<dyn Scheduler>,
    timer: Arc<AssignableDisposable>,
    upstream: Arc<AssignableDisposable>,
    generation: AtomicU64,
    done: Mutex<bool>,
}

impl<T, Ue> TimeoutState<T, Ue>
where
    T: Send + 'static,
    Ue: UserError,
{
    fn arm(self: &Arc<Self>, d: Duration) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let state = self.clone();
        let handle = self.scheduler.schedule_after(
            d,
            Box::new(move || {
                if state.generation.load(Ordering::SeqCst) == generation {
                    let mut done = state.done.lock();
                    if !*done {
                        *done = true;
                        drop(done);
                        tracing::warn!(?d, "timeout: no value within deadline, erroring downstream");
                        state.upstream.dispose();
                        state.downstream.on_error(RxError::Timeout);
                    }
                }
            }),
        );
        self.timer.set(handle);
    }
}

struct TimeoutObserver<T, Ue> {
    state: Arc<TimeoutState<T, Ue>>,
}

impl<T, Ue> Observer<T, RxError<Ue>> for TimeoutObserver<T, Ue>
where
    T: Send + 'static,
    Ue: UserError,
{
    fn on_next(&self, value: T) {
        if *self.state.done.lock() {
            return;
        }
        self.state.downstream.on_next(value);
    }
    fn on_complete(&self) {
        let mut done = self.state.done.lock();
        if !*done {
            *done = true;
            drop(done);
            self.state.timer.dispose();
            self.state.downstream.on_complete();
        }
    }
    fn on_error(&self, err: RxError<Ue>) {
        let mut done = self.state.done.lock();
        if !*done {
            *done = true;
            drop(done);
            self.state.timer.dispose();
            self.state.downstream.on_error(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::current_thread::CurrentThreadScheduler;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn debounce_on_a_burst_emits_only_the_final_value() {
        let scheduler = CurrentThreadScheduler::new();
        let source: Observable<i32, ()> = Observable::new(|observer| {
            observer.on_next(1);
            observer.on_next(2);
            observer.on_next(3);
            observer.on_complete();
            crate::disposable::nop()
        });

        let values = Arc::new(StdMutex::new(Vec::new()));
        let v = values.clone();
        let debounced = source.debounce(Duration::from_millis(50), scheduler.clone());
        debounced.subscribe(move |x| v.lock().unwrap().push(x), |_: ()| {}, || {});

        scheduler.work_all();
        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*values.lock().unwrap(), vec![3]);
    }

    #[test]
    fn timeout_fires_when_no_value_arrives_in_time() {
        crate::init_test_tracing();
        let scheduler = CurrentThreadScheduler::new();
        let source: Observable<i32, RxError<String>> = Observable::new(|_observer| crate::disposable::nop());

        let error = Arc::new(StdMutex::new(None));
        let e = error.clone();
        let timed_out = source.timeout(Duration::from_millis(10), scheduler.clone());
        timed_out.subscribe(|_: i32| {}, move |err| *e.lock().unwrap() = Some(err), || {});

        scheduler.advance(Duration::from_millis(20));
        assert!(matches!(*error.lock().unwrap(), Some(RxError::Timeout)));
    }

    #[test]
    fn buffer_flushes_on_count_threshold() {
        let scheduler = CurrentThreadScheduler::new();
        let source: Observable<i32, ()> = Observable::new(|observer| {
            observer.on_next(1);
            observer.on_next(2);
            observer.on_next(3);
            observer.on_complete();
            crate::disposable::nop()
        });

        let batches = Arc::new(StdMutex::new(Vec::new()));
        let b = batches.clone();
        let buffered = source.buffer(Duration::from_secs(60), 2, scheduler.clone());
        buffered.subscribe(move |batch| b.lock().unwrap().push(batch), |_: ()| {}, || {});

        scheduler.work_all();
        assert_eq!(*batches.lock().unwrap(), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn timestamp_wraps_each_value_with_the_clock_reading() {
        let clock = crate::clock::VirtualClock::new();
        let source: Observable<i32, ()> = Observable::new(|observer| {
            observer.on_next(1);
            observer.on_complete();
            crate::disposable::nop()
        });
        let stamped = source.timestamp(clock.clone());
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let s = seen.clone();
        stamped.subscribe(move |(v, t)| s.lock().unwrap().push((v, t)), |_: ()| {}, || {});
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
