use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::Disposable;

/// Owns a single, replaceable inner disposable behind an `is_disposed` flag.
///
/// Matches the teacher's own `Unsubscribable`: a single-fire flag guarding
/// whatever cleanup is underneath, except the inner disposable can be
/// supplied after construction (useful when the cleanup isn't known until
/// the source has started producing).
pub struct BooleanDisposable {
    disposed: AtomicBool,
    inner: Mutex<Option<Arc<dyn Disposable>>>,
}

impl BooleanDisposable {
    pub fn new() -> Arc<Self> {
        Arc::new(BooleanDisposable {
            disposed: AtomicBool::new(false),
            inner: Mutex::new(None),
        })
    }

    pub fn from_inner(inner: Arc<dyn Disposable>) -> Arc<Self> {
        let this = Self::new();
        this.set_inner(inner);
        this
    }

    /// Attach (or replace) the inner disposable. If this handle has already
    /// been disposed, `inner` is disposed immediately instead of stored.
    pub fn set_inner(&self, inner: Arc<dyn Disposable>) {
        if self.is_disposed() {
            inner.dispose();
            return;
        }
        *self.inner.lock() = Some(inner);
    }
}

impl Disposable for BooleanDisposable {
    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            if let Some(inner) = self.inner.lock().take() {
                inner.dispose();
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// A disposable backed directly by a shared `AtomicBool`, for the common
/// case where "disposed" already has a natural home as a cancellation flag
/// (scheduler recursion, observer `active` flags).
pub struct FlagDisposable {
    active: Arc<AtomicBool>,
}

impl FlagDisposable {
    pub fn new(active: Arc<AtomicBool>) -> Arc<Self> {
        Arc::new(FlagDisposable { active })
    }
}

impl Disposable for FlagDisposable {
    fn dispose(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_disposed(&self) -> bool {
        !self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_dispose_is_a_noop() {
        let d = BooleanDisposable::new();
        d.dispose();
        d.dispose();
        assert!(d.is_disposed());
    }

    #[test]
    fn inner_set_after_dispose_is_disposed_immediately() {
        let d = BooleanDisposable::new();
        d.dispose();

        let inner = BooleanDisposable::new();
        d.set_inner(inner.clone());
        assert!(inner.is_disposed());
    }
}
