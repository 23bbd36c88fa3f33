// monitor: a mutex-guarded state plus one condition variable.
//
// every suspension in the crate goes through `Monitor::wait_while`, which:
//
// - re-tests its predicate after every wakeup. condvar wakeups may be spurious, and a notify
//   only says that the state *may* have changed.
// - optionally gives up at a deadline.
// - registers the monitor with the calling process's cancel token for the duration of the wait,
//   so that cancelling the token wakes the wait up, at which point it returns `CancelledError`.

use crate::{
    cancel::CancelToken,
    channel::error::CancelledError,
};
use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard},
    time::Instant,
};


// timeout for a wait.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Timeout {
    // never time out.
    Never,
    // time out at the given deadline.
    At(Instant),
}

impl From<Option<Instant>> for Timeout {
    fn from(deadline: Option<Instant>) -> Self {
        deadline.map(Timeout::At).unwrap_or(Timeout::Never)
    }
}

// how a wait that was not cancelled ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Woken {
    // the predicate stopped holding.
    Ready,
    // the deadline passed while the predicate still held.
    TimedOut,
}

// something a cancel token can wake up.
pub(crate) trait Wake: Send + Sync {
    // wake every thread suspended on this.
    fn wake_all(&self);
}

// mutex + condvar pair.
pub(crate) struct Monitor<S> {
    // name used in trace events.
    label: Arc<str>,
    state: Mutex<S>,
    cond: Condvar,
}

impl<S> Monitor<S> {
    pub(crate) fn new(label: Arc<str>, state: S) -> Self {
        Monitor {
            label,
            state: Mutex::new(state),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn label(&self) -> &Arc<str> {
        &self.label
    }

    // enter the monitor.
    pub(crate) fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap()
    }

    // wake one thread suspended in `wait_while`.
    pub(crate) fn notify_one(&self) {
        self.cond.notify_one();
    }
}

impl<S: Send + 'static> Monitor<S> {
    // suspend while `blocked` holds, releasing the monitor while suspended.
    //
    // always hands the lock back, including on cancellation, so callers can restore their own
    // invariants before leaving the monitor. if `blocked` does not hold on entry this returns
    // `Ready` without suspending and without looking at the cancel token.
    pub(crate) fn wait_while<'a, F>(
        self: &'a Arc<Self>,
        mut lock: MutexGuard<'a, S>,
        timeout: Timeout,
        mut blocked: F,
    ) -> (MutexGuard<'a, S>, Result<Woken, CancelledError>)
    where
        F: FnMut(&mut S) -> bool,
    {
        if !blocked(&mut lock) {
            return (lock, Ok(Woken::Ready));
        }

        // the hook is registered while we hold the monitor. cancel sets its flag before it
        // snapshots hooks and then enters each hooked monitor to notify, so either we see the flag
        // below or the notify reaches us inside `cond.wait`.
        let token = CancelToken::current();
        let _hook = token.as_ref().map(|token| token.register(Arc::clone(self) as Arc<dyn Wake>));

        loop {
            if token.as_ref().is_some_and(CancelToken::is_cancelled) {
                return (lock, Err(CancelledError));
            }

            let mut timed_out = false;
            match timeout {
                Timeout::Never => {
                    lock = self.cond.wait(lock).unwrap();
                }
                Timeout::At(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return (lock, Ok(Woken::TimedOut));
                    }
                    let (lock2, result) = self.cond.wait_timeout(lock, deadline - now).unwrap();
                    lock = lock2;
                    timed_out = result.timed_out();
                }
            }

            if !blocked(&mut lock) {
                return (lock, Ok(Woken::Ready));
            }
            if !timed_out && !token.as_ref().is_some_and(CancelToken::is_cancelled) {
                trace!(monitor = %self.label, "spurious wakeup");
            }
        }
    }
}

impl<S: Send> Wake for Monitor<S> {
    fn wake_all(&self) {
        // entering the monitor orders this notify after any waiter's flag check.
        drop(self.lock());
        self.cond.notify_all();
    }
}
