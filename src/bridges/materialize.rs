use std::sync::Arc;

use crate::notification::Notification;
use crate::observable::Observable;
use crate::observer::Observer;

struct MaterializeObserver<T, E> {
    downstream: Arc<dyn Observer<Notification<T, E>, E>>,
}

impl<T, E> Observer<T, E> for MaterializeObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: T) {
        self.downstream.on_next(Notification::Next(value));
    }
    fn on_complete(&self) {
        self.downstream.on_next(Notification::Complete);
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_next(Notification::Error(err));
        self.downstream.on_complete();
    }
}

struct DematerializeObserver<T, E> {
    downstream: Arc<dyn Observer<T, E>>,
}

impl<T, E> Observer<Notification<T, E>, E> for DematerializeObserver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_next(&self, value: Notification<T, E>) {
        match value {
            Notification::Next(v) => self.downstream.on_next(v),
            Notification::Complete => self.downstream.on_complete(),
            Notification::Error(e) => self.downstream.on_error(e),
        }
    }
    fn on_complete(&self) {
        self.downstream.on_complete();
    }
    fn on_error(&self, err: E) {
        self.downstream.on_error(err);
    }
}

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Reifies every `next`/`complete`/`error` event as a value. The
    /// resulting stream never errors on its own account: a source error
    /// surfaces as a final `Notification::Error` value, followed by
    /// `complete`.
    pub fn materialize(self) -> Observable<Notification<T, E>, E> {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(MaterializeObserver { downstream: observer }))
        })
    }
}

impl<T, E> Observable<Notification<T, E>, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Inverse of [`Observable::materialize`]: replays reified events as
    /// the observer calls they stand for.
    pub fn dematerialize(self) -> Observable<T, E> {
        Observable::new(move |observer| {
            self.subscribe_observer(Arc::new(DematerializeObserver { downstream: observer }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn materialize_then_dematerialize_is_the_identity() {
        let source: Observable<i32, ()> = Observable::new(|observer| {
            observer.on_next(1);
            observer.on_next(2);
            observer.on_complete();
            crate::disposable::nop()
        });

        let values = Arc::new(Mutex::new(Vec::new()));
        let v = values.clone();
        source.materialize().dematerialize().subscribe(
            move |x| v.lock().unwrap().push(x),
            |_: ()| {},
            || {},
        );
        assert_eq!(*values.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn materialize_turns_a_source_error_into_a_final_value() {
        let source: Observable<i32, &'static str> = Observable::new(|observer| {
            observer.on_next(1);
            observer.on_error("boom");
            crate::disposable::nop()
        });

        let notifications = Arc::new(Mutex::new(Vec::new()));
        let n = notifications.clone();
        let completed = Arc::new(Mutex::new(false));
        let c = completed.clone();
        source.materialize().subscribe(
            move |note| n.lock().unwrap().push(note),
            |_: &'static str| {},
            move || *c.lock().unwrap() = true,
        );
        assert_eq!(
            *notifications.lock().unwrap(),
            vec![Notification::Next(1), Notification::Error("boom")]
        );
        assert!(*completed.lock().unwrap());
    }
}
