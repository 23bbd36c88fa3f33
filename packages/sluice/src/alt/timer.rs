// timer guard and cancellable sleeps.

use crate::{
    channel::error::CancelledError,
    monitor::{Monitor, Timeout},
};
use std::{
    cell::Cell,
    sync::Arc,
    time::{Duration, Instant},
};


/// Clock with an alarm, usable as a [`Guard`](super::Guard)
///
/// As a guard, a timer is ready once its alarm time has passed. A timer with no alarm set never
/// becomes ready. Timers belong to the process that selects over them.
///
/// Timers can also put the calling process to sleep. Unlike [`std::thread::sleep`], these sleeps
/// return [`CancelledError`] early if the process is cancelled.
#[derive(Debug, Default)]
pub struct Timer {
    alarm: Cell<Option<Instant>>,
}

impl Timer {
    /// Construct with no alarm set
    pub fn new() -> Self {
        Self::default()
    }

    /// The current time
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Set the alarm to go off at `at`
    pub fn set_alarm(&self, at: Instant) {
        self.alarm.set(Some(at));
    }

    /// Set the alarm to go off `after` from now
    ///
    /// If `after` is too large to represent as an instant, the alarm is cleared instead, so it
    /// never goes off.
    pub fn set_alarm_after(&self, after: Duration) {
        self.alarm.set(Instant::now().checked_add(after));
    }

    /// The time the alarm is set for, if set
    pub fn alarm(&self) -> Option<Instant> {
        self.alarm.get()
    }

    /// Unset the alarm
    pub fn clear_alarm(&self) {
        self.alarm.set(None);
    }

    /// Sleep for `duration`
    ///
    /// A duration too large to represent as an instant sleeps until cancelled.
    pub fn sleep(&self, duration: Duration) -> Result<(), CancelledError> {
        Self::suspend(Instant::now().checked_add(duration).into())
    }

    /// Sleep until `deadline`
    ///
    /// Does not touch the alarm.
    pub fn after(&self, deadline: Instant) -> Result<(), CancelledError> {
        Self::suspend(Timeout::At(deadline))
    }

    fn suspend(timeout: Timeout) -> Result<(), CancelledError> {
        let monitor = Arc::new(Monitor::new("timer".into(), ()));
        let (_lock, woken) = monitor.wait_while(monitor.lock(), timeout, |_| true);
        woken.map(drop)
    }

    // enable as a guard. if not yet ready, fold the alarm into the alternative's wait deadline.
    pub(crate) fn enable(&self, deadline: &mut Option<Instant>) -> bool {
        match self.alarm.get() {
            None => false,
            Some(alarm) if Instant::now() >= alarm => true,
            Some(alarm) => {
                *deadline = Some(deadline.map_or(alarm, |d| d.min(alarm)));
                false
            }
        }
    }

    // disable as a guard, returning whether ready.
    pub(crate) fn disable(&self) -> bool {
        self.alarm.get().is_some_and(|alarm| Instant::now() >= alarm)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::CancelToken;
    use std::thread;

    #[test]
    fn sleep_lasts_at_least_duration() {
        let timer = Timer::new();
        let start = timer.now();
        timer.sleep(Duration::from_millis(40)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn sleep_is_cancellable() {
        let token = CancelToken::new();
        let token2 = token.clone();
        let start = Instant::now();
        let join = thread::spawn(move || {
            let _entered = token2.enter();
            Timer::new().sleep(Duration::from_secs(60))
        });
        thread::sleep(Duration::from_millis(30));
        token.cancel();
        assert_eq!(join.join().unwrap(), Err(CancelledError));
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn unrepresentable_durations_do_not_panic() {
        let timer = Timer::new();
        timer.set_alarm_after(Duration::from_secs(1));
        assert!(timer.alarm().is_some());
        timer.set_alarm_after(Duration::MAX);
        assert_eq!(timer.alarm(), None);
        let mut deadline = None;
        assert!(!timer.enable(&mut deadline));
        assert!(deadline.is_none());

        // an endless sleep still ends on cancellation
        let token = CancelToken::new();
        let token2 = token.clone();
        let join = thread::spawn(move || {
            let _entered = token2.enter();
            Timer::new().sleep(Duration::MAX)
        });
        thread::sleep(Duration::from_millis(30));
        token.cancel();
        assert_eq!(join.join().unwrap(), Err(CancelledError));
    }

    #[test]
    fn guard_readiness_follows_alarm() {
        let timer = Timer::new();
        let mut deadline = None;
        assert!(!timer.enable(&mut deadline));
        assert!(deadline.is_none());
        assert!(!timer.disable());

        let alarm = Instant::now() + Duration::from_secs(60);
        timer.set_alarm(alarm);
        assert!(!timer.enable(&mut deadline));
        assert_eq!(deadline, Some(alarm));
        assert!(!timer.disable());

        timer.set_alarm(Instant::now() - Duration::from_millis(1));
        assert!(timer.enable(&mut deadline));
        assert!(timer.disable());

        timer.clear_alarm();
        assert_eq!(timer.alarm(), None);
    }

    #[test]
    fn earliest_alarm_wins_deadline() {
        let now = Instant::now();
        let early = Timer::new();
        let late = Timer::new();
        early.set_alarm(now + Duration::from_secs(10));
        late.set_alarm(now + Duration::from_secs(20));
        let mut deadline = None;
        late.enable(&mut deadline);
        early.enable(&mut deadline);
        assert_eq!(deadline, Some(now + Duration::from_secs(10)));
    }
}
