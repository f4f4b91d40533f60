use std::sync::Arc;

use parking_lot::Mutex;

use super::Disposable;

/// An ordered collection of disposables that are all torn down together.
///
/// `dispose` visits every member exactly once, in reverse insertion order.
/// A member added after the composite itself has been disposed is disposed
/// immediately instead of being stored; a member added while `dispose` is
/// already iterating (from another thread) is likewise disposed right away
/// rather than raced into the in-progress traversal.
pub struct CompositeDisposable {
    members: Mutex<Option<Vec<Arc<dyn Disposable>>>>,
}

impl CompositeDisposable {
    pub fn new() -> Arc<Self> {
        Arc::new(CompositeDisposable {
            members: Mutex::new(Some(Vec::new())),
        })
    }

    pub fn add(&self, d: Arc<dyn Disposable>) {
        let mut guard = self.members.lock();
        match guard.as_mut() {
            Some(members) => members.push(d),
            None => {
                drop(guard);
                d.dispose();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.members.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) {
        let members = self.members.lock().take();
        let Some(members) = members else { return };
        tracing::trace!(count = members.len(), "disposing composite");

        let mut failures = Vec::new();
        for member in members.into_iter().rev() {
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| member.dispose()));
            if let Err(payload) = outcome {
                failures.push(panic_message(payload));
            }
        }

        if !failures.is_empty() {
            tracing::warn!(
                count = failures.len(),
                "composite member dispose() call(s) panicked"
            );
            panic!(
                "CompositeDisposable: {} inner dispose() call(s) panicked: {}",
                failures.len(),
                failures.join("; ")
            );
        }
    }

    fn is_disposed(&self) -> bool {
        self.members.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposable::BooleanDisposable;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn disposes_members_in_reverse_order_exactly_once() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let composite = CompositeDisposable::new();

        for i in 0..3 {
            let order = order.clone();
            let d: Arc<dyn Disposable> = Arc::new(RecordOnDispose { id: i, order });
            composite.add(d);
        }

        composite.dispose();
        composite.dispose();

        assert_eq!(*order.lock(), vec![2, 1, 0]);
    }

    #[test]
    fn add_after_dispose_disposes_immediately() {
        let composite = CompositeDisposable::new();
        composite.dispose();

        let count = Arc::new(AtomicUsize::new(0));
        let d: Arc<dyn Disposable> = Arc::new(CountOnDispose(count.clone()));
        composite.add(d);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    struct RecordOnDispose {
        id: usize,
        order: Arc<Mutex<Vec<usize>>>,
    }
    impl Disposable for RecordOnDispose {
        fn dispose(&self) {
            self.order.lock().push(self.id);
        }
        fn is_disposed(&self) -> bool {
            false
        }
    }

    struct CountOnDispose(Arc<AtomicUsize>);
    impl Disposable for CountOnDispose {
        fn dispose(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn is_disposed(&self) -> bool {
            self.0.load(Ordering::SeqCst) > 0
        }
    }
}
