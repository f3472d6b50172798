//! Single-assignment deferred values.
//!
//! A [`Deferred`] starts pending and is settled exactly once, either fulfilled
//! with a value or rejected with a reason. Continuations attached with
//! [`Deferred::then`] and friends always run on a later turn of an
//! [`EventLoop`], whether they were attached before or after settlement.
//! A continuation may return another deferred value, or any foreign
//! [`Thenable`], and the derived value adopts its outcome.
//!
//! # Examples
//!
//! ```
//! use deferred_value::{fulfilled, Deferred, Error, EventLoop, Resolution};
//!
//! let mut event_loop = EventLoop::new();
//! let handle = event_loop.handle();
//! let (later, resolve) = {
//!     let deferral = deferred_value::pair::new::<i32, Error>(&handle);
//!     (deferral.value, deferral.resolve)
//! };
//! let inputs = vec![Resolution::Deferred(later), Resolution::Value(2)];
//! let sum = Deferred::<i32, Error>::all(&handle, inputs)
//!     .and_then(|values| fulfilled(values.iter().sum::<i32>()));
//! resolve.resolve(40);
//! assert_eq!(event_loop.block_on(sum), Ok(42));
//! ```
mod combinators;
pub mod deferred;
pub mod pair;
pub mod resolution;
pub mod scheduler;

pub use deferred::{Deferred, Reject, Resolve, Status};
pub use resolution::{
    fulfilled, Continuation, OnReject, OnResolve, Resolution, ThenFn, ThenMember, Thenable,
};
pub use scheduler::{EventLoop, Handle};

/// Reasons synthesized by this crate. Callers' reason types opt in with
/// `From<Error>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A continuation resolved its own derived value with itself.
    #[error("chaining cycle detected for deferred value")]
    ChainingCycle,
    /// User code panicked inside an initializer or continuation.
    #[error("panicked: {0}")]
    Panicked(String),
    /// A free-form rejection reason supplied by the caller.
    #[error("{0}")]
    Reason(String),
}

impl Error {
    /// Builds an [`Error::Reason`].
    pub fn reason(reason: impl Into<String>) -> Self {
        Error::Reason(reason.into())
    }
}
