//! The observer protocol: a sink accepting `next* (complete|error)?`.

mod fn_observer;
mod gate;

pub use fn_observer::FnObserver;
pub use gate::SafeObserver;

use std::sync::Arc;

/// A consumer of observable events.
///
/// Implementations are expected to be cheap to invoke repeatedly; the
/// source calls `on_next` once per emitted value and at most one of
/// `on_complete`/`on_error`, per the grammar `next* (complete|error)?`.
/// Nothing in this trait *enforces* the grammar on its own — wrap an
/// observer in [`SafeObserver`] at the boundary that needs the guarantee
/// (typically `subscribe`, and any operator that fans in from more than one
/// untrusted source).
pub trait Observer<T, E>: Send + Sync {
    fn on_next(&self, value: T);
    fn on_complete(&self);
    fn on_error(&self, err: E);
}

/// A no-op sink, useful for operators (`ignoreElements`, `any`/`all` once
/// they've short-circuited) that want to keep subscribing to a source's
/// terminal event without forwarding its values.
pub struct NullObserver;

impl<T, E> Observer<T, E> for NullObserver {
    fn on_next(&self, _value: T) {}
    fn on_complete(&self) {}
    fn on_error(&self, _err: E) {}
}

pub fn boxed<T, E>(observer: impl Observer<T, E> + 'static) -> Arc<dyn Observer<T, E>> {
    Arc::new(observer)
}
