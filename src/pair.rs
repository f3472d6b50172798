use crate::{Deferred, Handle, Reject, Resolve};
use std::fmt;

/// A pending [`Deferred`] together with the handles that settle it, for
/// producers that settle from outside an initializer.
///
/// # Examples
///
/// ```
/// use deferred_value::{pair, Error, EventLoop};
/// let mut event_loop = EventLoop::new();
/// let deferral = pair::new::<String, Error>(&event_loop.handle());
/// let resolve = deferral.resolve.clone();
/// event_loop.handle().defer(move || resolve.resolve("🍓".into()));
/// assert_eq!(event_loop.block_on(deferral.value), Ok("🍓".to_string()));
/// ```
pub struct Deferral<T, E> {
    pub value: Deferred<T, E>,
    pub resolve: Resolve<T, E>,
    pub reject: Reject<T, E>,
}

/// Creates a pending value and exposes the settle handles its initializer
/// receives.
pub fn new<T, E>(handle: &Handle) -> Deferral<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let value = Deferred::empty(handle);
    let (resolve, reject) = value.settle_handles();
    Deferral {
        value,
        resolve,
        reject,
    }
}

impl<T, E> Deferral<T, E> {
    pub fn into_parts(self) -> (Deferred<T, E>, Resolve<T, E>, Reject<T, E>) {
        (self.value, self.resolve, self.reject)
    }
}

impl<T, E> fmt::Debug for Deferral<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferral")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}
