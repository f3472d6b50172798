#[cfg(test)]
mod tests {
    use deferred_value::{
        fulfilled, pair, Deferred, Error, EventLoop, OnReject, OnResolve, Resolution, Status,
        ThenMember, Thenable,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    /// A foreign value that reports on a later turn of the loop it was built on.
    struct Deferring {
        handle: deferred_value::Handle,
        outcome: Result<i32, Error>,
    }

    impl Thenable<i32, Error> for Deferring {
        fn then_member(self: Box<Self>) -> Result<ThenMember<i32, Error>, Error> {
            Ok(ThenMember::Callable(Box::new(
                move |on_resolve: OnResolve<i32, Error>, on_reject: OnReject<Error>| {
                    let Deferring { handle, outcome } = *self;
                    handle.defer(move || match outcome {
                        Ok(value) => on_resolve(Resolution::Value(value)),
                        Err(reason) => on_reject(reason),
                    });
                    Ok(())
                },
            )))
        }
    }

    #[test]
    fn test_settle_once_across_mixed_calls() {
        let mut event_loop = EventLoop::new();
        let deferral = pair::new::<i32, Error>(&event_loop.handle());
        deferral.reject.reject(Error::reason("first"));
        for n in 0..5 {
            deferral.resolve.resolve(n);
            deferral.reject.reject(Error::reason("again"));
        }
        event_loop.run_until_stalled();
        assert_eq!(deferral.value.status(), Status::Rejected);
        assert_eq!(deferral.value.outcome(), Some(Err(Error::reason("first"))));
    }

    #[test]
    fn test_chain_through_many_turns() {
        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let mut value = Deferred::<u64, Error>::resolved(&handle, 1);
        for _ in 0..10 {
            value = value.and_then(|v| fulfilled(v * 2));
        }
        assert_eq!(event_loop.block_on(value), Ok(1024));
    }

    #[test]
    fn test_deferred_thenable_chain() {
        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let inner = handle.clone();
        let source = Deferred::<i32, Error>::resolved(&handle, 1);
        let derived: Deferred<i32, Error> = source.and_then(move |v| {
            Ok(Resolution::Thenable(Box::new(Deferring {
                handle: inner,
                outcome: Ok(v + 10),
            })))
        });
        assert_eq!(event_loop.block_on(derived), Ok(11));
    }

    #[test]
    fn test_thenable_rejection_propagates() {
        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let adopted = Deferred::<i32, Error>::from_resolution(
            &handle,
            Resolution::Thenable(Box::new(Deferring {
                handle: handle.clone(),
                outcome: Err(Error::reason("foreign failure")),
            })),
        );
        let recovered = adopted.catch(|reason| match reason {
            Error::Reason(text) => fulfilled(text.len() as i32),
            other => Err(other),
        });
        assert_eq!(event_loop.block_on(recovered), Ok(15));
    }

    #[test]
    fn test_all_success_keeps_order() {
        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let joined = Deferred::<i32, Error>::all(
            &handle,
            vec![
                Resolution::Value(1),
                Resolution::Deferred(Deferred::resolved(&handle, 2)),
                Resolution::Value(3),
            ],
        );
        assert_eq!(event_loop.block_on(joined), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn test_all_fail_fast_never_fulfills() {
        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let joined = Deferred::<i32, Error>::all(
            &handle,
            vec![
                Resolution::Deferred(Deferred::resolved(&handle, 1)),
                Resolution::Deferred(Deferred::rejected(&handle, Error::reason("x"))),
                Resolution::Deferred(Deferred::resolved(&handle, 2)),
            ],
        );
        assert_eq!(event_loop.block_on(joined), Err(Error::reason("x")));
    }

    #[test]
    fn test_race_plain_value_beats_later_input() {
        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let later = Deferred::<i32, Error>::from_resolution(
            &handle,
            Resolution::Thenable(Box::new(Deferring {
                handle: handle.clone(),
                outcome: Ok(1),
            })),
        );
        let raced = Deferred::<i32, Error>::race(
            &handle,
            vec![Resolution::Deferred(later.clone()), Resolution::Value(42)],
        );
        assert_eq!(event_loop.block_on(raced), Ok(42));
        event_loop.run_until_stalled();
        assert_eq!(later.outcome(), Some(Ok(1)));
    }

    #[test]
    fn test_finally_runs_side_effect_once_per_value() {
        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let effects = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (effects.clone(), effects.clone());
        let ok = Deferred::<i32, Error>::resolved(&handle, 7).finally(move || {
            a.borrow_mut().push("ok");
            fulfilled(())
        });
        let err = Deferred::<i32, Error>::rejected(&handle, Error::reason("e")).finally(move || {
            b.borrow_mut().push("err");
            fulfilled(())
        });
        assert_eq!(event_loop.block_on(ok), Ok(7));
        assert_eq!(event_loop.block_on(err), Err(Error::reason("e")));
        assert_eq!(*effects.borrow(), vec!["ok", "err"]);
    }

    #[test]
    fn test_ordering_across_sources() {
        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let first = pair::new::<&'static str, Error>(&handle);
        let second = pair::new::<&'static str, Error>(&handle);
        for (label, source) in [("a", &first.value), ("b", &first.value), ("c", &second.value)] {
            let seen = seen.clone();
            source.and_then(move |v| {
                seen.borrow_mut().push(format!("{label}:{v}"));
                fulfilled(())
            });
        }
        second.resolve.resolve("two");
        first.resolve.resolve("one");
        event_loop.run_until_stalled();
        assert_eq!(*seen.borrow(), vec!["c:two", "a:one", "b:one"]);
    }

    #[test]
    fn test_custom_reason_type() {
        #[derive(Debug, Clone, PartialEq)]
        enum Reason {
            Lib(Error),
            NotFound,
        }

        impl From<Error> for Reason {
            fn from(err: Error) -> Self {
                Reason::Lib(err)
            }
        }

        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let missing = Deferred::<i32, Reason>::rejected(&handle, Reason::NotFound)
            .and_then(|v| fulfilled(v + 1));
        let panicked = Deferred::<i32, Reason>::resolved(&handle, 1)
            .and_then(|_| -> deferred_value::Continuation<i32, Reason> { panic!("oops") });
        assert_eq!(event_loop.block_on(missing), Err(Reason::NotFound));
        assert_eq!(
            event_loop.block_on(panicked),
            Err(Reason::Lib(Error::Panicked("oops".into())))
        );
    }
}
