use std::sync::Arc;

use parking_lot::Mutex;

use super::Disposable;

enum Slot {
    Active(Option<Arc<dyn Disposable>>),
    Disposed,
}

/// Holds a single replaceable inner disposable.
///
/// Assigning a new value disposes the old one. Disposing the handle itself
/// disposes whatever is currently held and blocks any further assignment
/// (a later `set` disposes its argument immediately instead of storing it).
/// This is the building block `switchLatest` and `amb` use to swap out
/// "the current winner".
pub struct AssignableDisposable {
    slot: Mutex<Slot>,
}

impl AssignableDisposable {
    pub fn new() -> Arc<Self> {
        Arc::new(AssignableDisposable {
            slot: Mutex::new(Slot::Active(None)),
        })
    }

    /// Replace the held disposable, disposing whatever was there before.
    pub fn set(&self, next: Arc<dyn Disposable>) {
        let previous = {
            let mut guard = self.slot.lock();
            match &mut *guard {
                Slot::Active(held) => held.replace(next),
                Slot::Disposed => {
                    drop(guard);
                    next.dispose();
                    return;
                }
            }
        };
        if let Some(previous) = previous {
            previous.dispose();
        }
    }
}

impl Disposable for AssignableDisposable {
    fn dispose(&self) {
        let previous = {
            let mut guard = self.slot.lock();
            match std::mem::replace(&mut *guard, Slot::Disposed) {
                Slot::Active(held) => held,
                Slot::Disposed => None,
            }
        };
        tracing::trace!("disposing assignable");
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        matches!(&*self.slot.lock(), Slot::Disposed)
    }
}
