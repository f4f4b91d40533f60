//! Crate-wide error taxonomy.
//!
//! Every operator that can synthesize its own failure (`elementAt` out of
//! range, `timeout`, an exhausted `retry`, a misused disposed handle) reports
//! it through [`RxError`]. Operators that merely forward values (`map`,
//! `filter`, `take`, ...) stay generic over whatever error type the source
//! already carries and never need this type at all.

use std::fmt;

/// Bound satisfied by any type a caller might plug in as their own stream
/// error (`Ue` throughout this crate, for "user error").
pub trait UserError: fmt::Debug + fmt::Display + Send + Sync + 'static {}
impl<T: fmt::Debug + fmt::Display + Send + Sync + 'static> UserError for T {}

/// The error channel used by every operator that can fail on its own
/// account, parameterized over the caller's own error type `Ue`.
#[derive(thiserror::Error, Debug)]
pub enum RxError<Ue>
where
    Ue: UserError,
{
    /// `elementAt`/`first`/`last` observed fewer values than required.
    #[error("value at index {index} out of range (observed {observed} value(s))")]
    IndexOutOfRange { index: usize, observed: usize },

    /// A `timeout` operator's timer fired before the next value arrived.
    #[error("timed out waiting for a value")]
    Timeout,

    /// `retry` re-subscribed the allotted number of times and still failed.
    #[error("retry exhausted after {attempts} attempt(s): {last_error}")]
    RetryExhausted {
        attempts: usize,
        last_error: Box<RxError<Ue>>,
    },

    /// `first`/`reduce`/... over a source that completed with no elements.
    #[error("sequence completed with no elements")]
    EmptySequence,

    /// A source violated the observer grammar (e.g. emitted after a
    /// terminal event). Surfaced instead of silently swallowed so the bug
    /// is visible.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// A disposed `Disposable`/`Subject`/scheduler handle was used again.
    #[error("operation attempted on a disposed handle")]
    Disposed,

    /// The caller's own error, passed through untouched.
    #[error("{0}")]
    User(Ue),

    /// A user-supplied closure (`map`, `filter`, a join selector, ...)
    /// unwound instead of returning. Only surfaces through operators that
    /// explicitly guard against it; most operators let a panic keep
    /// unwinding the calling thread.
    #[error("a user callback panicked: {0}")]
    UserPanic(String),
}

impl<Ue: UserError> RxError<Ue> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RxError::Timeout)
    }

    pub fn is_user(&self) -> bool {
        matches!(self, RxError::User(_))
    }

    /// Borrow the wrapped user error, if this is that variant.
    pub fn as_user(&self) -> Option<&Ue> {
        match self {
            RxError::User(e) => Some(e),
            _ => None,
        }
    }
}

impl<Ue: UserError> From<Ue> for RxError<Ue> {
    fn from(e: Ue) -> Self {
        RxError::User(e)
    }
}

/// Returned by [`crate::disposable::RefCountDisposable::add_reference`] when
/// the root has already been disposed. Kept separate from `RxError` since
/// disposables are not parameterized over a user error type.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation attempted on a disposed handle")]
pub struct AlreadyDisposed;
