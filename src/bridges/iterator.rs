use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

use crate::disposable::Disposable;
use crate::observable::Observable;
use crate::observer::Observer;

enum Msg<T, E> {
    Next(T),
    Complete,
    Error(E),
}

/// A blocking pull-based view over a push-based source. `next()` blocks
/// the calling thread until a value arrives or the source terminates.
/// Dropping the iterator disposes the underlying subscription.
pub struct ToIterator<T, E> {
    rx: mpsc::Receiver<Msg<T, E>>,
    subscription: Arc<dyn Disposable>,
    done: bool,
}

impl<T, E> ToIterator<T, E> {
    /// Cancels the underlying subscription. Idempotent; also runs on
    /// `Drop`.
    pub fn dispose(&self) {
        self.subscription.dispose();
    }
}

impl<T, E> Iterator for ToIterator<T, E> {
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rx.recv() {
            Ok(Msg::Next(v)) => Some(Ok(v)),
            Ok(Msg::Complete) => {
                self.done = true;
                None
            }
            Ok(Msg::Error(e)) => {
                self.done = true;
                Some(Err(e))
            }
            Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

impl<T, E> Drop for ToIterator<T, E> {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}

struct IteratorObserver<T, E> {
    tx: Sender<Msg<T, E>>,
}

impl<T, E> Observer<T, E> for IteratorObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        let _ = self.tx.send(Msg::Next(value));
    }
    fn on_complete(&self) {
        let _ = self.tx.send(Msg::Complete);
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
    /// Subscribes internally and hands back a blocking [`ToIterator`].
    pub fn to_iterator(self) -> ToIterator<T, E> {
        let (tx, rx) = mpsc::channel();
        let subscription = self.subscribe_observer(Arc::new(IteratorObserver { tx }));
        ToIterator {
            rx,
            subscription,
            done: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_every_value_then_stops() {
        let source: Observable<i32, ()> = Observable::new(|observer| {
            observer.on_next(1);
            observer.on_next(2);
            observer.on_complete();
            crate::disposable::nop()
        });

        let values: Vec<_> = source.to_iterator().collect();
        assert_eq!(values, vec![Ok(1), Ok(2)]);
    }

    #[test]
    fn surfaces_the_terminal_error_then_stops() {
        let source: Observable<i32, &'static str> = Observable::new(|observer| {
            observer.on_next(1);
            observer.on_error("boom");
            crate::disposable::nop()
        });

        let values: Vec<_> = source.to_iterator().collect();
        assert_eq!(values, vec![Ok(1), Err("boom")]);
    }
}
