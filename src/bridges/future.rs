use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::scheduler::Scheduler;

/// Why an [`RxFuture::get`] failed to resolve to a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RxFutureError<E> {
    /// The source reported this error before ever completing normally.
    #[error("{0}")]
    Source(E),

    /// The source completed without emitting a single value.
    #[error("completed with no values")]
    Empty,
}

enum Msg<T, E> {
    Value(T),
    Empty,
    Error(E),
}

/// A one-shot blocking handle on the last value a source produces.
/// Latches every value as it arrives; resolves once the source reaches a
/// terminal state.
pub struct RxFuture<T, E> {
    rx: mpsc::Receiver<Msg<T, E>>,
}

impl<T, E> RxFuture<T, E> {
    /// Blocks the calling thread until the source terminates.
    pub fn get(self) -> Result<T, RxFutureError<E>> {
        match self.rx.recv() {
            Ok(Msg::Value(v)) => Ok(v),
            Ok(Msg::Empty) => Err(RxFutureError::Empty),
            Ok(Msg::Error(e)) => Err(RxFutureError::Source(e)),
            Err(_) => Err(RxFutureError::Empty),
        }
    }
}

struct FutureObserver<T, E> {
    latest: Arc<Mutex<Option<T>>>,
    tx: mpsc::Sender<Msg<T, E>>,
}

impl<T, E> Observer<T, E> for FutureObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        *self.latest.lock() = Some(value);
    }
    fn on_complete(&self) {
        let msg = match self.latest.lock().take() {
            Some(v) => Msg::Value(v),
            None => Msg::Empty,
        };
        let _ = self.tx.send(msg);
    }
    fn on_error(&self, err: E) {
        let _ = self.tx.send(Msg::Error(err));
    }
}

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Subscribes on `scheduler`, latching the last value until the
    /// source terminates.
    pub fn to_future(self, scheduler: Arc<dyn Scheduler>) -> RxFuture<T, E> {
        let (tx, rx) = mpsc::channel();
        let latest = Arc::new(Mutex::new(None));
        scheduler.schedule(Box::new(move || {
            self.subscribe_observer(Arc::new(FutureObserver { latest, tx }));
        }));
        RxFuture { rx }
    }

    /// Sugar for `to_future(scheduler).get()`.
    pub fn wait(self, scheduler: Arc<dyn Scheduler>) -> Result<T, RxFutureError<E>> {
        self.to_future(scheduler).get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TaskPoolScheduler;

    #[test]
    fn wait_resolves_to_the_last_value_on_complete() {
        let scheduler = TaskPoolScheduler::new(1);
        let source: Observable<i32, ()> = Observable::new(|observer| {
            observer.on_next(1);
            observer.on_next(2);
            observer.on_complete();
            crate::disposable::nop()
        });

        assert_eq!(source.wait(scheduler), Ok(2));
    }

    #[test]
    fn wait_rejects_with_the_source_error() {
        let scheduler = TaskPoolScheduler::new(1);
        let source: Observable<i32, &'static str> = Observable::new(|observer| {
            observer.on_error("boom");
            crate::disposable::nop()
        });

        assert_eq!(source.wait(scheduler), Err(RxFutureError::Source("boom")));
    }

    #[test]
    fn wait_on_an_empty_source_reports_empty() {
        let scheduler = TaskPoolScheduler::new(1);
        let source: Observable<i32, ()> = Observable::new(|observer| {
            observer.on_complete();
            crate::disposable::nop()
        });

        assert_eq!(source.wait(scheduler), Err(RxFutureError::Empty));
    }
}
