use super::Observer;

/// Builds an [`Observer`] out of three plain closures, the way `subscribe`'s
/// callback overload wants to. Mirrors the teacher's `Observer { next,
/// error, complete }` triple of `Arc<dyn Fn>` fields, but as a generic
/// struct so the closures don't need to be boxed twice.
pub struct FnObserver<N, Er, C> {
    next: N,
    error: Er,
    complete: C,
}

impl<N, Er, C> FnObserver<N, Er, C> {
    pub fn new(next: N, error: Er, complete: C) -> Self {
        FnObserver {
            next,
            error,
            complete,
        }
    }
}

impl<T, E, N, Er, C> Observer<T, E> for FnObserver<N, Er, C>
where
    N: Fn(T) + Send + Sync,
    Er: Fn(E) + Send + Sync,
    C: Fn() + Send + Sync,
{
    fn on_next(&self, value: T) {
        (self.next)(value)
    }

    fn on_complete(&self) {
        (self.complete)()
    }

    fn on_error(&self, err: E) {
        (self.error)(err)
    }
}
