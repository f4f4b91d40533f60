use std::sync::Arc;

use crate::observable::Observable;
use crate::operators::merge;

/// A pattern bound to a reducer: activating it (via [`when`]) produces the
/// joined observable. Opaque so `Pattern2`/`Pattern3` can share one result
/// type regardless of how many sources they synchronize.
pub struct Plan<R, E> {
    activate: Arc<dyn Fn() -> Observable<R, E> + Send + Sync>,
}

impl<R, E> Plan<R, E>
where
    R: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new<F>(activate: F) -> Self
    where
        F: Fn() -> Observable<R, E> + Send + Sync + 'static,
    {
        Plan {
            activate: Arc::new(activate),
        }
    }
}

/// Activates every plan, merging their matches into one observable. Each
/// plan subscribes to its own sources independently, so a source shared
/// by two plans is subscribed to twice.
pub fn when<R, E>(plans: Vec<Plan<R, E>>) -> Observable<R, E>
where
    R: Send + 'static,
    E: Send + 'static,
{
    tracing::trace!(plans = plans.len(), "join: activating plans");
    merge(plans.iter().map(|p| (p.activate)()).collect())
}
