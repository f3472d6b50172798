//! The settle-once state machine and continuation attachment.
//!
use crate::resolution::{self, fulfilled, Continuation, Resolution};
use crate::{Error, Handle};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => f.write_str("pending"),
            Status::Fulfilled => f.write_str("fulfilled"),
            Status::Rejected => f.write_str("rejected"),
        }
    }
}

enum State<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T: Clone, E: Clone> State<T, E> {
    fn status(&self) -> Status {
        match self {
            State::Pending => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }

    fn outcome(&self) -> Option<Result<T, E>> {
        match self {
            State::Pending => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }
}

type Reaction<T, E> = Box<dyn FnOnce(Result<T, E>)>;

struct Inner<T, E> {
    state: State<T, E>,
    // Populated only while pending, drained once on settlement.
    reactions: Vec<Reaction<T, E>>,
    wakers: Vec<Waker>,
}

/// A single-assignment value that is fulfilled or rejected at most once.
///
/// Clones share the same state. Awaiting a `Deferred` yields a clone of its
/// outcome once it settles.
///
/// # Examples
///
/// ```
/// use deferred_value::{fulfilled, Deferred, Error, EventLoop};
/// let mut event_loop = EventLoop::new();
/// let handle = event_loop.handle();
/// let value = Deferred::<i32, Error>::new(&handle, |resolve, _reject| {
///     resolve.resolve(1);
///     Ok(())
/// });
/// let next = value.then(|v| fulfilled(v + 1), |_reason| fulfilled(0));
/// assert_eq!(event_loop.block_on(next), Ok(2));
/// ```
pub struct Deferred<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
    handle: Handle,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            handle: self.handle.clone(),
        }
    }
}

/// Fulfills the deferred value it was created for. Ignored once settled.
pub struct Resolve<T, E> {
    target: Deferred<T, E>,
}

/// Rejects the deferred value it was created for. Ignored once settled.
pub struct Reject<T, E> {
    target: Deferred<T, E>,
}

impl<T, E> Clone for Resolve<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T, E> Clone for Reject<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Resolve<T, E> {
    pub fn resolve(&self, value: T) {
        self.target.fulfill(value)
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Reject<T, E> {
    pub fn reject(&self, reason: E) {
        self.target.reject(reason)
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Deferred<T, E> {
    pub(crate) fn empty(handle: &Handle) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending,
                reactions: vec![],
                wakers: vec![],
            })),
            handle: handle.clone(),
        }
    }

    pub(crate) fn settle_handles(&self) -> (Resolve<T, E>, Reject<T, E>) {
        (
            Resolve {
                target: self.clone(),
            },
            Reject {
                target: self.clone(),
            },
        )
    }

    pub fn status(&self) -> Status {
        self.inner.borrow().state.status()
    }

    /// `None` while pending.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        self.inner.borrow().state.outcome()
    }

    /// Whether both handles refer to the same deferred value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn fulfill(&self, value: T) {
        self.settle(Ok(value))
    }

    pub(crate) fn reject(&self, reason: E) {
        self.settle(Err(reason))
    }

    /// Moves a pending value to its final state and drains its reactions in
    /// registration order. Settling a settled value does nothing.
    pub(crate) fn settle(&self, outcome: Result<T, E>) {
        let (reactions, wakers) = {
            let mut inner = self.inner.borrow_mut();
            if let State::Fulfilled(_) | State::Rejected(_) = inner.state {
                tracing::trace!(
                    status = %inner.state.status(),
                    "ignoring settlement of a settled value"
                );
                return;
            }
            inner.state = match &outcome {
                Ok(value) => State::Fulfilled(value.clone()),
                Err(reason) => State::Rejected(reason.clone()),
            };
            (
                std::mem::take(&mut inner.reactions),
                std::mem::take(&mut inner.wakers),
            )
        };
        tracing::trace!(
            fulfilled = outcome.is_ok(),
            reactions = reactions.len(),
            "settled"
        );
        for reaction in reactions {
            reaction(outcome.clone());
        }
        for waker in wakers {
            waker.wake()
        }
    }

    /// Runs `reaction` with the outcome on a turn after settlement, or on the
    /// next turn if already settled. Never runs it synchronously.
    pub(crate) fn observe(&self, reaction: impl FnOnce(Result<T, E>) + 'static) {
        let handle = self.handle.clone();
        self.on_settle(move |outcome| handle.defer(move || reaction(outcome)));
    }

    /// Runs `reaction` inside the settle call, or right away if already
    /// settled. Only for internal plumbing; continuations go through
    /// [`observe`](Self::observe).
    pub(crate) fn on_settle(&self, reaction: impl FnOnce(Result<T, E>) + 'static) {
        let settled = {
            let mut inner = self.inner.borrow_mut();
            match inner.state.outcome() {
                Some(outcome) => outcome,
                None => {
                    inner.reactions.push(Box::new(reaction));
                    return;
                }
            }
        };
        reaction(settled);
    }
}

impl<T: Clone + 'static, E: Clone + From<Error> + 'static> Deferred<T, E> {
    /// Creates a value and runs `initializer` synchronously with its settle
    /// handles. An `Err` or a panic from the initializer rejects the value.
    pub fn new<F>(handle: &Handle, initializer: F) -> Self
    where
        F: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E>,
    {
        let value = Self::empty(handle);
        let (resolve, reject) = value.settle_handles();
        if let Err(reason) = resolution::guard(move || initializer(resolve, reject)) {
            value.reject(reason);
        }
        value
    }

    pub fn resolved(handle: &Handle, value: T) -> Self {
        Self::new(handle, move |resolve, _reject| {
            resolve.resolve(value);
            Ok(())
        })
    }

    pub fn rejected(handle: &Handle, reason: E) -> Self {
        Self::new(handle, move |_resolve, reject| {
            reject.reject(reason);
            Ok(())
        })
    }

    /// A fresh value settled by the resolution procedure, adopting `x` if it
    /// is a deferred value or a thenable.
    pub fn from_resolution(handle: &Handle, x: Resolution<T, E>) -> Self {
        let value = Self::empty(handle);
        resolution::resolve(&value, x);
        value
    }

    /// Attaches a continuation pair and returns the value derived from
    /// whichever of them runs.
    ///
    /// The chosen continuation runs on a later turn, never inside this call.
    /// Its `Err` or panic rejects the derived value; its `Ok` goes through the
    /// resolution procedure.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Continuation<U, E> + 'static,
        R: FnOnce(E) -> Continuation<U, E> + 'static,
    {
        let derived = Deferred::empty(&self.handle);
        let target = derived.clone();
        self.observe(move |outcome| {
            let x = resolution::guard(move || match outcome {
                Ok(value) => on_fulfilled(value),
                Err(reason) => on_rejected(reason),
            });
            match x {
                Ok(x) => resolution::resolve(&target, x),
                Err(reason) => target.reject(reason),
            }
        });
        derived
    }

    /// [`then`](Self::then) with the rejection passed through unchanged.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Continuation<U, E> + 'static,
    {
        self.then(on_fulfilled, Err)
    }

    /// [`then`](Self::then) with the fulfillment passed through unchanged.
    pub fn catch<R>(&self, on_rejected: R) -> Deferred<T, E>
    where
        R: FnOnce(E) -> Continuation<T, E> + 'static,
    {
        self.then(fulfilled, on_rejected)
    }

    /// [`then`](Self::then) with no continuations: the derived value mirrors
    /// this one.
    pub fn pass_through(&self) -> Deferred<T, E> {
        self.then(fulfilled, Err)
    }

    /// Runs `callback` after settlement whatever the outcome. The outcome
    /// passes through unless the callback fails or yields a rejected value,
    /// in which case that failure replaces it.
    pub fn finally<C, F>(&self, callback: F) -> Deferred<T, E>
    where
        C: Clone + 'static,
        F: FnOnce() -> Continuation<C, E> + 'static,
    {
        let derived = Deferred::empty(&self.handle);
        let target = derived.clone();
        let handle = self.handle.clone();
        self.observe(move |outcome| match resolution::guard(callback) {
            Err(reason) => target.reject(reason),
            Ok(x) => {
                let side = Deferred::<C, E>::from_resolution(&handle, x);
                side.observe(move |side_outcome| match side_outcome {
                    Ok(_) => target.settle(outcome),
                    Err(reason) => target.reject(reason),
                });
            }
        });
        derived
    }
}

impl<T: Clone, E: Clone> Future for Deferred<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        match inner.state.outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                if !inner.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.inner.try_borrow().map(|inner| match inner.state {
            State::Pending => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        });
        let mut debug = f.debug_struct("Deferred");
        match status {
            Ok(status) => debug.field("status", &status),
            Err(_) => debug.field("status", &"<borrowed>"),
        };
        debug.finish()
    }
}
