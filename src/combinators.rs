//! `all` and `race`, built from observation and the resolution procedure.
//!
//! Native deferred inputs are observed on a later turn. Thenable inputs are
//! adopted on the spot, so one that reports synchronously settles its slot
//! inside the combinator call.
//!
use crate::resolution::Resolution;
use crate::{Deferred, Error, Handle};
use std::cell::RefCell;
use std::rc::Rc;

struct Join<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

impl<T: Clone + 'static, E: Clone + From<Error> + 'static> Deferred<T, E> {
    /// Fulfills with every input's value, in input order, once all of them
    /// have fulfilled. Rejects with the first rejection.
    ///
    /// Plain values count as already fulfilled. An empty input fulfills
    /// immediately with an empty vector.
    pub fn all(handle: &Handle, inputs: Vec<Resolution<T, E>>) -> Deferred<Vec<T>, E> {
        Deferred::new(handle, move |resolve, reject| {
            if inputs.is_empty() {
                resolve.resolve(Vec::new());
                return Ok(());
            }
            let join = Rc::new(RefCell::new(Join {
                values: vec![None; inputs.len()],
                remaining: inputs.len(),
            }));
            for (index, input) in inputs.into_iter().enumerate() {
                let record = {
                    let (join, resolve) = (join.clone(), resolve.clone());
                    move |value: T| {
                        let mut join = join.borrow_mut();
                        join.values[index] = Some(value);
                        join.remaining -= 1;
                        if join.remaining > 0 {
                            return;
                        }
                        let values: Option<Vec<T>> =
                            join.values.iter_mut().map(Option::take).collect();
                        drop(join);
                        if let Some(values) = values {
                            resolve.resolve(values);
                        }
                    }
                };
                match input {
                    Resolution::Value(value) => record(value),
                    pending => {
                        let reject = reject.clone();
                        watch_input(handle, pending, move |outcome| match outcome {
                            Ok(value) => record(value),
                            Err(reason) => reject.reject(reason),
                        });
                    }
                }
            }
            Ok(())
        })
    }

    /// Settles like whichever input settles first. A plain value wins
    /// immediately; an empty input never settles.
    pub fn race(handle: &Handle, inputs: Vec<Resolution<T, E>>) -> Deferred<T, E> {
        Deferred::new(handle, move |resolve, reject| {
            for input in inputs {
                match input {
                    Resolution::Value(value) => resolve.resolve(value),
                    pending => {
                        let (resolve, reject) = (resolve.clone(), reject.clone());
                        watch_input(handle, pending, move |outcome| match outcome {
                            Ok(value) => resolve.resolve(value),
                            Err(reason) => reject.reject(reason),
                        });
                    }
                }
            }
            Ok(())
        })
    }
}

/// Hands a combinator input's outcome to `reaction`. Deferred inputs report
/// on a later turn; thenables go through the resolution procedure and report
/// as soon as they settle.
fn watch_input<T, E>(
    handle: &Handle,
    input: Resolution<T, E>,
    reaction: impl FnOnce(Result<T, E>) + 'static,
) where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    match input {
        Resolution::Deferred(value) => value.observe(reaction),
        other => Deferred::from_resolution(handle, other).on_settle(reaction),
    }
}
