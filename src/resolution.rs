//! The resolution procedure: what a continuation's return value means for the
//! derived value it feeds.
//!
//! A plain value fulfills the target. A native [`Deferred`] is adopted, its
//! outcome becomes the target's outcome. A foreign [`Thenable`] is asked for
//! its `then` member once; if that member is callable the target adopts
//! whatever the member reports first, recursively.
use crate::{Deferred, Error};
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// What a continuation returns: `Err` is the thrown reason, `Ok` goes through
/// the resolution procedure.
pub type Continuation<T, E> = Result<Resolution<T, E>, E>;

/// Callback handed to a foreign `then` member for its success path.
pub type OnResolve<T, E> = Rc<dyn Fn(Resolution<T, E>)>;
/// Callback handed to a foreign `then` member for its failure path.
pub type OnReject<E> = Rc<dyn Fn(E)>;
/// A callable `then` member, already bound to its receiver.
pub type ThenFn<T, E> = Box<dyn FnOnce(OnResolve<T, E>, OnReject<E>) -> Result<(), E>>;

pub enum Resolution<T, E> {
    Value(T),
    Deferred(Deferred<T, E>),
    Thenable(Box<dyn Thenable<T, E>>),
}

/// The result of looking up a foreign object's `then` member.
pub enum ThenMember<T, E> {
    Callable(ThenFn<T, E>),
    /// The object has no callable member and stands for itself as a value.
    NotCallable(T),
}

/// An object from outside this crate that can be adopted.
///
/// The lookup consumes the object, so the member is read exactly once per
/// resolution even when the lookup is computed.
///
/// # Examples
///
/// ```
/// use deferred_value::{
///     Deferred, Error, EventLoop, OnReject, OnResolve, Resolution, ThenMember, Thenable,
/// };
///
/// struct Ready(i32);
///
/// impl Thenable<i32, Error> for Ready {
///     fn then_member(self: Box<Self>) -> Result<ThenMember<i32, Error>, Error> {
///         Ok(ThenMember::Callable(Box::new(
///             move |on_resolve: OnResolve<i32, Error>, _on_reject: OnReject<Error>| {
///                 on_resolve(Resolution::Value(self.0));
///                 Ok(())
///             },
///         )))
///     }
/// }
///
/// let mut event_loop = EventLoop::new();
/// let handle = event_loop.handle();
/// let ready = Resolution::Thenable(Box::new(Ready(7)));
/// let adopted = Deferred::<i32, Error>::from_resolution(&handle, ready);
/// assert_eq!(event_loop.block_on(adopted), Ok(7));
/// ```
pub trait Thenable<T, E> {
    fn then_member(self: Box<Self>) -> Result<ThenMember<T, E>, E>;
}

impl<T, E> From<Deferred<T, E>> for Resolution<T, E> {
    fn from(value: Deferred<T, E>) -> Self {
        Resolution::Deferred(value)
    }
}

impl<T, E> std::fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Value(_) => f.write_str("Value(..)"),
            Resolution::Deferred(_) => f.write_str("Deferred(..)"),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// Shorthand for a continuation that fulfills with a plain value.
pub fn fulfilled<T, E>(value: T) -> Continuation<T, E> {
    Ok(Resolution::Value(value))
}

/// Settles `target` according to `x`.
pub(crate) fn resolve<T, E>(target: &Deferred<T, E>, x: Resolution<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    match x {
        Resolution::Value(value) => target.fulfill(value),
        Resolution::Deferred(source) => {
            if source.ptr_eq(target) {
                tracing::debug!("deferred value resolved with itself");
                target.reject(Error::ChainingCycle.into());
                return;
            }
            let target = target.clone();
            source.observe(move |outcome| target.settle(outcome));
        }
        Resolution::Thenable(candidate) => adopt(target, candidate),
    }
}

fn adopt<T, E>(target: &Deferred<T, E>, candidate: Box<dyn Thenable<T, E>>)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    let then = match guard(move || candidate.then_member()) {
        Ok(ThenMember::Callable(then)) => then,
        Ok(ThenMember::NotCallable(value)) => {
            target.fulfill(value);
            return;
        }
        Err(reason) => {
            target.reject(reason);
            return;
        }
    };

    // Only the first report from the adopted source counts.
    let called = Rc::new(Cell::new(false));
    let on_resolve: OnResolve<T, E> = {
        let (called, target) = (called.clone(), target.clone());
        Rc::new(move |y: Resolution<T, E>| {
            if !called.replace(true) {
                resolve(&target, y);
            }
        })
    };
    let on_reject: OnReject<E> = {
        let (called, target) = (called.clone(), target.clone());
        Rc::new(move |reason: E| {
            if !called.replace(true) {
                target.reject(reason);
            }
        })
    };
    if let Err(reason) = guard(move || then(on_resolve, on_reject)) {
        if !called.replace(true) {
            target.reject(reason);
        }
    }
}

/// Runs user code, turning a panic into an [`Error::Panicked`] reason.
pub(crate) fn guard<R, E>(f: impl FnOnce() -> Result<R, E>) -> Result<R, E>
where
    E: From<Error>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::debug!(%message, "captured panic from user code");
            Err(Error::Panicked(message).into())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
