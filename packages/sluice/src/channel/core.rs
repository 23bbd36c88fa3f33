// core channel: one monitor around one store, for exactly one reader and one writer at a time.
//
// the exposed channel ends are wrappers around this which make the one-reader-one-writer rule
// hold, either statically (exclusive ends) or with claims (shared ends).

use super::error::{CancelledError, ProtocolViolation};
use crate::{
    alt::AltHandle,
    monitor::{Monitor, Timeout},
    store::{BufferState, DataStore, Overwrite},
};
use std::sync::{Arc, MutexGuard};


// handle to a channel.
pub(crate) struct Channel<T>(Arc<Monitor<Lockable<T>>>);

// channel lockable state.
struct Lockable<T> {
    // storage for elements. never replaced after construction.
    store: Box<dyn DataStore<T>>,
    // registration of the alternative currently selecting over this channel, if any.
    alt: AltSlot,
}

// the pending alt slot.
//
// an alternative that enables this channel while it is empty is `Pending`: the next write must
// schedule it. one that enables while the channel is already readable is only recorded as `Ready`,
// so that its disable can be matched against the enable.
enum AltSlot {
    Vacant,
    Ready(AltHandle),
    Pending(AltHandle),
}

impl<T: Send + 'static> Channel<T> {
    // construct around a store which no one else has access to.
    pub(crate) fn new(store: Box<dyn DataStore<T>>, label: Arc<str>) -> Self {
        Channel(Arc::new(Monitor::new(label, Lockable { store, alt: AltSlot::Vacant })))
    }

    // clone another handle to the channel.
    pub(crate) fn clone(&self) -> Self {
        Channel(Arc::clone(&self.0))
    }

    pub(crate) fn label(&self) -> &Arc<str> {
        self.0.label()
    }

    // block until a value is available, then take it.
    //
    // must not be called concurrently with another read.
    pub(crate) fn read(&self) -> Result<T, CancelledError> {
        let mut lock = self.suspend_while(self.0.lock(), "read", BufferState::Empty)?;
        // the writer may be waiting for space, or for its rendezvous to complete
        self.0.notify_one();
        Ok(lock.store.get())
    }

    // deposit a value, blocking first until there is space for it and, for a zero-capacity store,
    // afterwards until the reader has taken it.
    //
    // must not be called concurrently with another write.
    pub(crate) fn write(&self, value: T) -> Result<(), CancelledError> {
        let mut lock = self.0.lock();
        if lock.store.overwrite() == Overwrite::None {
            lock = self.suspend_while(lock, "write", BufferState::Full)?;
        }

        lock.store.put(value);
        match &lock.alt {
            AltSlot::Pending(alt) => {
                trace!(channel = %self.label(), "scheduling alternative");
                alt.schedule();
            }
            _ => self.0.notify_one(),
        }

        if lock.store.capacity() == Some(0) {
            // once deposited, a value is never retracted. if this wait is cancelled the reader
            // still receives the value exactly once.
            drop(self.suspend_while(lock, "write", BufferState::Full)?);
        }
        Ok(())
    }

    // suspend while the store is in `state`.
    fn suspend_while<'a>(
        &'a self,
        lock: MutexGuard<'a, Lockable<T>>,
        op: &'static str,
        state: BufferState,
    ) -> Result<MutexGuard<'a, Lockable<T>>, CancelledError> {
        if lock.store.state() != state {
            return Ok(lock);
        }
        trace!(channel = %self.label(), op, "suspending");
        let (lock, woken) = self.0.wait_while(lock, Timeout::Never, |l| l.store.state() == state);
        match woken {
            Ok(_) => {
                trace!(channel = %self.label(), op, "resumed");
                Ok(lock)
            }
            Err(e) => {
                debug!(channel = %self.label(), op, "cancelled while suspended");
                Err(e)
            }
        }
    }

    // begin selecting over this channel on behalf of `alt`.
    //
    // returns whether the channel is readable already.
    pub(crate) fn enable(&self, alt: &AltHandle) -> Result<bool, ProtocolViolation> {
        let mut lock = self.0.lock();
        if !matches!(lock.alt, AltSlot::Vacant) {
            return Err(ProtocolViolation::AlreadyEnabled);
        }
        if lock.store.state() == BufferState::Empty {
            lock.alt = AltSlot::Pending(alt.clone());
            Ok(false)
        } else {
            lock.alt = AltSlot::Ready(alt.clone());
            Ok(true)
        }
    }

    // stop selecting over this channel on behalf of `alt`.
    //
    // returns whether the channel is readable now, which may differ from what enable returned.
    pub(crate) fn disable(&self, alt: &AltHandle) -> Result<bool, ProtocolViolation> {
        let mut lock = self.0.lock();
        match &lock.alt {
            AltSlot::Vacant => return Err(ProtocolViolation::DisableWithoutEnable),
            AltSlot::Ready(registered) | AltSlot::Pending(registered) => {
                if !registered.ptr_eq(alt) {
                    return Err(ProtocolViolation::ForeignDisable);
                }
            }
        }
        lock.alt = AltSlot::Vacant;
        Ok(lock.store.state() != BufferState::Empty)
    }

    // whether a value is available. stale as soon as it returns.
    pub(crate) fn pending(&self) -> bool {
        self.state() != BufferState::Empty
    }

    pub(crate) fn state(&self) -> BufferState {
        self.0.lock().store.state()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.lock().store.len()
    }

    pub(crate) fn capacity(&self) -> Option<usize> {
        self.0.lock().store.capacity()
    }
}
