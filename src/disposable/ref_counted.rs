use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::Disposable;
use crate::error::AlreadyDisposed;

/// Wraps an inner disposable behind a reference count.
///
/// `add_reference` hands out a child disposable; the inner cleanup only
/// fires once the root has been disposed *and* every outstanding child has
/// been released. Disposing the root while children are still outstanding
/// *arms* the disposable: it is recorded as disposed (`is_disposed()` is
/// true) but the inner cleanup is deferred until the last child goes away.
pub struct RefCountDisposable {
    inner: Arc<dyn Disposable>,
    outstanding: AtomicUsize,
    root_disposed: AtomicBool,
    fired: AtomicBool,
}

impl RefCountDisposable {
    pub fn new(inner: Arc<dyn Disposable>) -> Arc<Self> {
        Arc::new(RefCountDisposable {
            inner,
            outstanding: AtomicUsize::new(0),
            root_disposed: AtomicBool::new(false),
            fired: AtomicBool::new(false),
        })
    }

    /// Hand out a new reference. Fails once the root has been disposed.
    pub fn add_reference(self: &Arc<Self>) -> Result<Arc<dyn Disposable>, AlreadyDisposed> {
        if self.root_disposed.load(Ordering::SeqCst) {
            return Err(AlreadyDisposed);
        }
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RefCountChild {
            parent: self.clone(),
            released: AtomicBool::new(false),
        }))
    }

    fn release_one(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.try_fire();
    }

    fn try_fire(&self) {
        if self.root_disposed.load(Ordering::SeqCst) && self.outstanding.load(Ordering::SeqCst) == 0
            && !self.fired.swap(true, Ordering::SeqCst)
        {
            self.inner.dispose();
        }
    }
}

impl Disposable for RefCountDisposable {
    fn dispose(&self) {
        if !self.root_disposed.swap(true, Ordering::SeqCst) {
            self.try_fire();
        }
    }

    fn is_disposed(&self) -> bool {
        self.root_disposed.load(Ordering::SeqCst)
    }
}

struct RefCountChild {
    parent: Arc<RefCountDisposable>,
    released: AtomicBool,
}

impl Disposable for RefCountChild {
    fn dispose(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.parent.release_one();
        }
    }

    fn is_disposed(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposable::BooleanDisposable;

    #[test]
    fn fires_only_after_root_and_all_children_are_done() {
        let cleanup = BooleanDisposable::new();
        let root = RefCountDisposable::new(cleanup.clone());

        let a = root.add_reference().unwrap();
        let b = root.add_reference().unwrap();

        root.dispose();
        assert!(!cleanup.is_disposed(), "armed but not fired yet");

        a.dispose();
        assert!(!cleanup.is_disposed());

        b.dispose();
        assert!(cleanup.is_disposed());
    }

    #[test]
    fn add_reference_after_root_disposed_fails() {
        let cleanup = BooleanDisposable::new();
        let root = RefCountDisposable::new(cleanup);
        root.dispose();
        assert!(root.add_reference().is_err());
    }
}
