//! Crossings between an [`crate::observable::Observable`] and the pull-based
//! world: blocking iterators, blocking waits, and reified notifications.

mod future;
mod iterator;
mod materialize;

pub use future::{RxFuture, RxFutureError};
pub use iterator::ToIterator;
