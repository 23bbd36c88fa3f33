//! Waiting on the first of several guards to become ready
//!
//! An [`Alternative`] holds an ordered list of [`Guard`]s. Each call to
//! [`select`](Alternative::select) runs one round of a two-phase protocol:
//!
//! 1. **Enabling.** Guards are enabled one by one in scan order. Channel guards that are not yet
//!    readable register the alternative, so that the next write on them schedules it. The scan
//!    stops early at the first guard that is ready already.
//! 2. **Waiting.** If nothing was ready, the selecting process suspends until a registered channel
//!    schedules it, the earliest timer alarm passes, or the process is cancelled.
//! 3. **Disabling.** Every enabled guard is disabled again, in reverse scan order, which both
//!    removes every registration and re-checks every guard.
//!
//! The earliest ready guard in scan order is then chosen and its index returned. Selection only
//! decides *which* guard is ready; reading from the chosen channel is left to the caller.
//!
//! Scan order depends on the [`Fairness`] of the call. [`Fairness::Priority`] always scans from
//! index 0, so lower indices win. [`Fairness::Fair`] scans from just after the previously chosen
//! guard, so that under repeated selection no ready guard is passed over more than `len - 1`
//! times in a row.

mod timer;

pub use self::timer::Timer;

use crate::{
    channel::error::{CancelledError, ProtocolViolation},
    monitor::{Monitor, Timeout},
};
use smallvec::SmallVec;
use std::{
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicU64, Ordering::Relaxed},
        Arc,
    },
};


/// Policy for choosing between several ready guards
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Fairness {
    /// Choose the ready guard with the lowest index
    #[default]
    Priority,
    /// Choose the first ready guard after the one chosen last time, wrapping around
    Fair,
}

/// Condition an [`Alternative`] can wait on
///
/// Guards borrow what they watch. Any channel input usable as a guard, and [`Timer`], convert
/// into a `Guard` with `From`.
#[derive(Copy, Clone)]
pub enum Guard<'a> {
    /// A channel input, ready when it has a value to read
    Input(&'a dyn InputGuard),
    /// A timer, ready once its alarm has passed
    Timer(&'a Timer),
    /// Always ready
    Skip,
}

impl<'a, G: InputGuard> From<&'a G> for Guard<'a> {
    fn from(input: &'a G) -> Self {
        Guard::Input(input)
    }
}

impl<'a> From<&'a Timer> for Guard<'a> {
    fn from(timer: &'a Timer) -> Self {
        Guard::Timer(timer)
    }
}

impl Debug for Guard<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Guard::Input(_) => f.write_str("Input"),
            Guard::Timer(timer) => f.debug_tuple("Timer").field(timer).finish(),
            Guard::Skip => f.write_str("Skip"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

pub(crate) use self::sealed::Sealed;

/// Channel input end which an [`Alternative`] can select over
///
/// This trait is sealed. It is implemented by [`AltingChannelInput`](crate::AltingChannelInput)
/// and by [`SharedInputClaim`](crate::SharedInputClaim). The methods are the low-level halves of
/// the selection protocol; `Alternative` is their intended caller.
pub trait InputGuard: Sealed {
    /// Register `alt` with the channel, returning whether the channel is readable already
    ///
    /// Fails, without changing anything, if an alternative is already registered.
    fn enable(&self, alt: &AltHandle) -> Result<bool, ProtocolViolation>;

    /// Remove `alt`'s registration, returning whether the channel is readable now
    ///
    /// Fails, without changing anything, unless `alt` is the registered alternative.
    fn disable(&self, alt: &AltHandle) -> Result<bool, ProtocolViolation>;
}


// progress of an alternative through one select call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum AltState {
    Idle,
    Enabling,
    Waiting,
    // a guard fired during enabling or waiting.
    Scheduled,
    Disabling,
}

/// Handle by which channels wake an [`Alternative`]
#[derive(Clone)]
pub struct AltHandle(Arc<Monitor<AltState>>);

impl AltHandle {
    fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        let label = format!("alt-{}", NEXT_ID.fetch_add(1, Relaxed));
        AltHandle(Arc::new(Monitor::new(label.into(), AltState::Idle)))
    }

    // tell the alternative that a guard fired.
    //
    // idempotent, and harmless once the alternative has stopped waiting.
    pub(crate) fn schedule(&self) {
        let mut state = self.0.lock();
        match *state {
            AltState::Enabling => *state = AltState::Scheduled,
            AltState::Waiting => {
                *state = AltState::Scheduled;
                self.0.notify_one();
            }
            AltState::Idle | AltState::Scheduled | AltState::Disabling => (),
        }
    }

    // whether both handles belong to the same alternative.
    pub(crate) fn ptr_eq(&self, other: &AltHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn label(&self) -> &Arc<str> {
        self.0.label()
    }

    fn set_state(&self, state: AltState) {
        *self.0.lock() = state;
    }
}

impl Debug for AltHandle {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("AltHandle").field(self.label()).finish()
    }
}


/// Fair or prioritized choice among guards, owned by one selecting process
///
/// See the [module docs](self). An alternative can be reused for any number of selections; the
/// fairness cursor carries over between them.
pub struct Alternative<'a> {
    guards: SmallVec<[Guard<'a>; 4]>,
    // index just after the guard most recently chosen by a fair selection.
    favourite: usize,
    handle: AltHandle,
}

impl<'a> Alternative<'a> {
    /// Construct over guards, in index order
    pub fn new<I>(guards: I) -> Self
    where
        I: IntoIterator<Item = Guard<'a>>,
    {
        Alternative {
            guards: guards.into_iter().collect(),
            favourite: 0,
            handle: AltHandle::new(),
        }
    }

    /// The guards, in index order
    pub fn guards(&self) -> &[Guard<'a>] {
        &self.guards
    }

    /// Number of guards
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Whether there are no guards
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Handle by which channels schedule this alternative
    ///
    /// Only needed for calling [`InputGuard`] methods directly.
    pub fn handle(&self) -> &AltHandle {
        &self.handle
    }

    /// Block until a guard is ready, then return the index of the one chosen by `fairness`
    ///
    /// # Panics
    ///
    /// Panics if there are no guards, or if a guard is already being selected over by another
    /// alternative.
    pub fn select(&mut self, fairness: Fairness) -> Result<usize, CancelledError> {
        self.select_inner(fairness, None)
    }

    /// Shorthand for [`select`](Self::select) with [`Fairness::Priority`]
    pub fn pri_select(&mut self) -> Result<usize, CancelledError> {
        self.select(Fairness::Priority)
    }

    /// Shorthand for [`select`](Self::select) with [`Fairness::Fair`]
    pub fn fair_select(&mut self) -> Result<usize, CancelledError> {
        self.select(Fairness::Fair)
    }

    /// Like [`select`](Self::select), but only over the guards whose precondition is true
    ///
    /// # Panics
    ///
    /// Panics if `preconditions` is not the same length as the guards, or if no precondition is
    /// true, in addition to the reasons `select` panics.
    pub fn select_with(
        &mut self,
        fairness: Fairness,
        preconditions: &[bool],
    ) -> Result<usize, CancelledError> {
        self.select_inner(fairness, Some(preconditions))
    }

    /// Shorthand for [`select_with`](Self::select_with) with [`Fairness::Priority`]
    pub fn pri_select_with(&mut self, preconditions: &[bool]) -> Result<usize, CancelledError> {
        self.select_with(Fairness::Priority, preconditions)
    }

    /// Shorthand for [`select_with`](Self::select_with) with [`Fairness::Fair`]
    pub fn fair_select_with(&mut self, preconditions: &[bool]) -> Result<usize, CancelledError> {
        self.select_with(Fairness::Fair, preconditions)
    }

    fn select_inner(
        &mut self,
        fairness: Fairness,
        preconditions: Option<&[bool]>,
    ) -> Result<usize, CancelledError> {
        let n = self.guards.len();
        if let Some(preconditions) = preconditions {
            assert_eq!(preconditions.len(), n, "need exactly one precondition per guard");
        }
        let enabled = |i: usize| preconditions.map_or(true, |preconditions| preconditions[i]);
        if !(0..n).any(enabled) {
            self.violation(ProtocolViolation::NoEnabledGuards);
        }
        let start = match fairness {
            Fairness::Priority => 0,
            Fairness::Fair => self.favourite % n,
        };

        loop {
            // enable, stopping at the first ready guard
            self.handle.set_state(AltState::Enabling);
            let mut deadline = None;
            // number of scan positions enabled (or skipped by precondition)
            let mut scanned = 0;
            let mut fired = None;
            let mut violation = None;
            for k in 0..n {
                let i = (start + k) % n;
                if !enabled(i) {
                    scanned = k + 1;
                    continue;
                }
                let ready = match self.guards[i] {
                    Guard::Input(input) => match input.enable(&self.handle) {
                        Ok(ready) => ready,
                        Err(e) => {
                            violation = Some(e);
                            break;
                        }
                    },
                    Guard::Timer(timer) => timer.enable(&mut deadline),
                    Guard::Skip => true,
                };
                scanned = k + 1;
                if ready {
                    fired = Some(i);
                    break;
                }
            }

            // wait, unless something is ready or got scheduled while enabling
            let mut outcome = Ok(());
            {
                let mut state = self.handle.0.lock();
                if fired.is_none() && violation.is_none() && *state == AltState::Enabling {
                    *state = AltState::Waiting;
                    trace!(alt = %self.handle.label(), ?deadline, "waiting");
                    let (state2, woken) = self.handle.0.wait_while(
                        state,
                        Timeout::from(deadline),
                        |state| *state == AltState::Waiting,
                    );
                    state = state2;
                    outcome = woken.map(drop);
                }
                *state = AltState::Disabling;
            }

            // disable in reverse, so that the earliest ready guard in scan order is chosen
            let mut selected = fired;
            for k in (0..scanned).rev() {
                let i = (start + k) % n;
                if !enabled(i) {
                    continue;
                }
                let ready = match self.guards[i] {
                    Guard::Input(input) => input.disable(&self.handle).unwrap_or_else(|e| {
                        violation.get_or_insert(e);
                        false
                    }),
                    Guard::Timer(timer) => timer.disable(),
                    Guard::Skip => true,
                };
                if ready {
                    selected = Some(i);
                }
            }
            self.handle.set_state(AltState::Idle);

            if let Some(e) = violation {
                self.violation(e);
            }
            if let Err(e) = outcome {
                debug!(alt = %self.handle.label(), "select cancelled");
                return Err(e);
            }
            if let Some(i) = selected {
                if fairness == Fairness::Fair {
                    self.favourite = (i + 1) % n;
                }
                trace!(alt = %self.handle.label(), index = i, "selected");
                return Ok(i);
            }
            // not reached with the guards in this crate: a timeout means an alarm has passed, and a
            // scheduled channel stays readable until this process reads it. a wakeup that leaves
            // nothing ready starts another round rather than returning an index.
            debug!(alt = %self.handle.label(), "woken with no ready guard, selecting again");
        }
    }

    fn violation(&self, e: ProtocolViolation) -> ! {
        error!(alt = %self.handle.label(), %e, "guard protocol violation");
        panic!("guard protocol violation: {}", e);
    }
}

impl Debug for Alternative<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Alternative")
            .field("handle", &self.handle)
            .field("guards", &self.guards)
            .field("favourite", &self.favourite)
            .finish()
    }
}
