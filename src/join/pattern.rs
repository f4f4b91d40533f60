use std::sync::Arc;

use crate::observable::Observable;
use crate::operators::zip2;

use super::plan::Plan;

/// A pattern over two sources. Start one with [`and`], extend with
/// [`Pattern2::and`], bind with [`Pattern2::then`].
pub struct Pattern2<A, B, E> {
    a: Observable<A, E>,
    b: Observable<B, E>,
}

/// A pattern over three sources, built by extending a [`Pattern2`].
pub struct Pattern3<A, B, C, E> {
    a: Observable<A, E>,
    b: Observable<B, E>,
    c: Observable<C, E>,
}

/// Starts a pattern over `a` and `b`.
pub fn and<A, B, E>(a: Observable<A, E>, b: Observable<B, E>) -> Pattern2<A, B, E>
where
    A: Send + 'static,
    B: Send + 'static,
    E: Send + 'static,
{
    Pattern2 { a, b }
}

impl<A, B, E> Pattern2<A, B, E>
where
    A: Send + 'static,
    B: Send + 'static,
    E: Send + 'static,
{
    /// Extends this pattern with a third source.
    pub fn and<C>(self, c: Observable<C, E>) -> Pattern3<A, B, C, E>
    where
        C: Send + 'static,
    {
        Pattern3 {
            a: self.a,
            b: self.b,
            c,
        }
    }

    /// Binds this pattern to `selector`, producing a [`Plan`] ready for
    /// [`super::when`]. Every emission dequeues one head from each
    /// source's FIFO queue; the join completes once either source
    /// completes with its queue empty, matching [`zip2`]'s own rule.
    pub fn then<R, F>(self, selector: F) -> Plan<R, E>
    where
        A: Clone,
        B: Clone,
        R: Send + 'static,
        F: Fn(A, B) -> R + Send + Sync + 'static,
    {
        let a = self.a;
        let b = self.b;
        let selector = Arc::new(selector);
        Plan::new(move || {
            let selector = selector.clone();
            zip2(a.clone(), b.clone(), move |x, y| {
                tracing::trace!("join: pattern2 matched a head from each source");
                selector(x, y)
            })
        })
    }
}

impl<A, B, C, E> Pattern3<A, B, C, E>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    E: Send + 'static,
{
    /// Binds this pattern to `selector`. Implemented as two nested
    /// [`zip2`] joins (`a` with `b`, then that pair with `c`) rather than
    /// a bespoke three-way FIFO, so it inherits `zip2`'s well-tested
    /// queue/completion behavior.
    pub fn then<R, F>(self, selector: F) -> Plan<R, E>
    where
        A: Clone,
        B: Clone,
        C: Clone,
        R: Send + 'static,
        F: Fn(A, B, C) -> R + Send + Sync + 'static,
    {
        let a = self.a;
        let b = self.b;
        let c = self.c;
        let selector = Arc::new(selector);
        Plan::new(move || {
            let selector = selector.clone();
            let ab = zip2(a.clone(), b.clone(), |x, y| (x, y));
            zip2(ab, c.clone(), move |(x, y), z| {
                tracing::trace!("join: pattern3 matched a head from each source");
                selector(x, y, z)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::when;
    use std::sync::Mutex;

    fn source<T: Send + 'static + Clone>(values: Vec<T>) -> Observable<T, ()> {
        Observable::new(move |observer| {
            for v in values.clone() {
                observer.on_next(v);
            }
            observer.on_complete();
            crate::disposable::nop()
        })
    }

    #[test]
    fn then_pairs_heads_across_both_sources() {
        let plan = and(source(vec![1, 2, 3]), source(vec!["a", "b"])).then(|n, s| format!("{n}{s}"));
        let results = Arc::new(Mutex::new(Vec::new()));
        let r = results.clone();
        when(vec![plan]).subscribe(move |x| r.lock().unwrap().push(x), |_: ()| {}, || {});
        assert_eq!(*results.lock().unwrap(), vec!["1a".to_string(), "2b".to_string()]);
    }

    #[test]
    fn three_way_pattern_pairs_heads_across_all_sources() {
        let plan = and(source(vec![1, 2]), source(vec![10, 20]))
            .and(source(vec![100, 200]))
            .then(|a, b, c| a + b + c);
        let results = Arc::new(Mutex::new(Vec::new()));
        let r = results.clone();
        when(vec![plan]).subscribe(move |x| r.lock().unwrap().push(x), |_: ()| {}, || {});
        assert_eq!(*results.lock().unwrap(), vec![111, 222]);
    }

    #[test]
    fn when_merges_the_matches_of_multiple_plans() {
        let plan_a = and(source(vec![1]), source(vec![2])).then(|a, b| a + b);
        let plan_b = and(source(vec![10]), source(vec![20])).then(|a, b| a + b);
        let results = Arc::new(Mutex::new(Vec::new()));
        let r = results.clone();
        when(vec![plan_a, plan_b]).subscribe(move |x| r.lock().unwrap().push(x), |_: ()| {}, || {});
        let mut sorted = results.lock().unwrap().clone();
        sorted.sort();
        assert_eq!(sorted, vec![3, 30]);
    }
}
