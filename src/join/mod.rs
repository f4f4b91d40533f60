//! `and`/`then`/`when` join patterns: synchronize several sources into a
//! single result, FIFO-per-source, only emitting once every source in the
//! pattern has a head value queued.
//!
//! Arities are concrete (`Pattern2`, `Pattern3`) rather than a dynamic
//! `Vec<Box<dyn Any>>` runtime, so a `then` selector stays as strongly
//! typed as every other operator in the crate. `Pattern3::then` composes
//! two [`crate::operators::zip2`] joins under the hood rather than
//! reimplementing the FIFO bookkeeping a third time.

mod pattern;
mod plan;

pub use pattern::{and, Pattern2, Pattern3};
pub use plan::{when, Plan};
