//! Cancellation of suspended processes.

use crate::monitor::Wake;
use smallvec::SmallVec;
use std::{
    cell::RefCell,
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering::SeqCst},
        Arc,
        Mutex,
    },
};


thread_local! {
    // token of the process running on this thread, if any.
    static CURRENT: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
}

/// Handle for cancelling a process while it is suspended
///
/// A process (thread) becomes cancellable by [`enter`](Self::enter)ing a token. After
/// [`cancel`](Self::cancel) is called on any clone of that token, every blocking operation of the
/// process that is suspended, or that would need to suspend, returns
/// [`CancelledError`](crate::error::CancelledError) instead. Operations that can complete without
/// suspending still complete.
///
/// Cancellation is sticky: a cancelled token stays cancelled. The crate never retries an operation
/// that was cancelled; whether and how to retry is up to the caller.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<Inner>);

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    hooks: Mutex<Hooks>,
}

// monitors that processes carrying the token are currently suspended on.
#[derive(Default)]
struct Hooks {
    next_id: u64,
    list: SmallVec<[(u64, Arc<dyn Wake>); 2]>,
}

impl CancelToken {
    /// Construct a token which is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token, waking any process suspended while carrying it
    pub fn cancel(&self) {
        if self.0.cancelled.swap(true, SeqCst) {
            return;
        }
        // snapshot, so that no monitor is entered while the hook list is locked
        let hooks = self.0.hooks.lock().unwrap().list.iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect::<SmallVec<[_; 2]>>();
        debug!(suspended = hooks.len(), "cancelling process");
        for hook in hooks {
            hook.wake_all();
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(SeqCst)
    }

    /// Make this the token of the current thread until the returned guard is dropped
    ///
    /// The previously entered token, if any, is restored when the guard drops.
    pub fn enter(&self) -> Entered {
        let prev = CURRENT.with(|current| current.replace(Some(self.clone())));
        Entered { prev, _not_send: PhantomData }
    }

    /// The token entered on the current thread, if any
    pub fn current() -> Option<CancelToken> {
        CURRENT.with(|current| current.borrow().clone())
    }

    // register a monitor to be woken on cancellation until the returned guard drops.
    pub(crate) fn register(&self, hook: Arc<dyn Wake>) -> Registration<'_> {
        let mut hooks = self.0.hooks.lock().unwrap();
        let id = hooks.next_id;
        hooks.next_id += 1;
        hooks.list.push((id, hook));
        Registration { token: self, id }
    }
}

impl Debug for CancelToken {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Guard returned by [`CancelToken::enter`]
#[must_use = "the token is only entered while the guard is alive"]
pub struct Entered {
    prev: Option<CancelToken>,
    // the guard restores thread-local state, so it must drop on the thread that made it
    _not_send: PhantomData<*const ()>,
}

impl Drop for Entered {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|current| *current.borrow_mut() = prev);
    }
}

// removes a hook when dropped.
pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut hooks = self.token.0.hooks.lock().unwrap();
        hooks.list.retain(|(id, _)| *id != self.id);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_and_restore() {
        assert!(CancelToken::current().is_none());
        let outer = CancelToken::new();
        let inner = CancelToken::new();
        {
            let _outer = outer.enter();
            {
                let _inner = inner.enter();
                inner.cancel();
                assert!(CancelToken::current().unwrap().is_cancelled());
            }
            assert!(!CancelToken::current().unwrap().is_cancelled());
        }
        assert!(CancelToken::current().is_none());
    }

    #[test]
    fn cancel_is_sticky_and_shared_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn registration_is_removed_on_drop() {
        struct Nop;
        impl Wake for Nop {
            fn wake_all(&self) {}
        }

        let token = CancelToken::new();
        {
            let _a = token.register(Arc::new(Nop));
            let _b = token.register(Arc::new(Nop));
            assert_eq!(token.0.hooks.lock().unwrap().list.len(), 2);
        }
        assert!(token.0.hooks.lock().unwrap().list.is_empty());
    }
}
