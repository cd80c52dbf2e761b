// Cooperative timer list owned by the event loop.
//
// Timers carry absolute deadlines; the loop sleeps until the earliest one
// and feeds expirations back into the engine. A timer is cancelled when
// its triggering condition resolves first.

use std::time::Instant;

use crate::Key;

/// What a deadline means when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// A multipurpose key's tap/hold decision window elapsed.
    Multipurpose(Key),
    /// A withheld modifier press must commit.
    SuspendCommit(Key),
    /// The active submap's inactivity window elapsed.
    SubmapExpiry,
}

/// Deadline-ordered timer list. Sizes stay tiny (one entry per held key
/// at most), so a sorted vector is all this needs.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: Vec<(Instant, Timer)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, at: Instant, timer: Timer) {
        let pos = self.timers.partition_point(|(t, _)| *t <= at);
        self.timers.insert(pos, (at, timer));
    }

    pub fn cancel(&mut self, timer: Timer) {
        self.timers.retain(|(_, t)| *t != timer);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.first().map(|(at, _)| *at)
    }

    /// Pop the earliest timer that is due at `now`, if any.
    pub fn pop_due(&mut self, now: Instant) -> Option<Timer> {
        match self.timers.first() {
            Some((at, _)) if *at <= now => Some(self.timers.remove(0).1),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fires_in_deadline_order() {
        let base = Instant::now();
        let mut sched = Scheduler::new();
        sched.arm(base + Duration::from_millis(200), Timer::SubmapExpiry);
        sched.arm(base + Duration::from_millis(100), Timer::Multipurpose(Key(28)));

        assert_eq!(sched.next_deadline(), Some(base + Duration::from_millis(100)));
        assert_eq!(
            sched.pop_due(base + Duration::from_millis(150)),
            Some(Timer::Multipurpose(Key(28)))
        );
        assert_eq!(sched.pop_due(base + Duration::from_millis(150)), None);
        assert_eq!(
            sched.pop_due(base + Duration::from_millis(250)),
            Some(Timer::SubmapExpiry)
        );
        assert!(sched.is_empty());
    }

    #[test]
    fn deadline_boundary_is_inclusive() {
        let base = Instant::now();
        let mut sched = Scheduler::new();
        sched.arm(base + Duration::from_millis(100), Timer::SuspendCommit(Key(29)));

        assert_eq!(sched.pop_due(base + Duration::from_millis(99)), None);
        assert_eq!(
            sched.pop_due(base + Duration::from_millis(100)),
            Some(Timer::SuspendCommit(Key(29)))
        );
    }

    #[test]
    fn cancel_removes_matching_timer() {
        let base = Instant::now();
        let mut sched = Scheduler::new();
        sched.arm(base, Timer::SuspendCommit(Key(29)));
        sched.arm(base, Timer::SuspendCommit(Key(42)));

        sched.cancel(Timer::SuspendCommit(Key(29)));
        assert_eq!(
            sched.pop_due(base + Duration::from_millis(1)),
            Some(Timer::SuspendCommit(Key(42)))
        );
        assert!(sched.is_empty());
    }

    #[test]
    fn equal_deadlines_fire_in_arm_order() {
        let base = Instant::now();
        let mut sched = Scheduler::new();
        sched.arm(base, Timer::SuspendCommit(Key(42)));
        sched.arm(base, Timer::SuspendCommit(Key(29)));

        assert_eq!(sched.pop_due(base), Some(Timer::SuspendCommit(Key(42))));
        assert_eq!(sched.pop_due(base), Some(Timer::SuspendCommit(Key(29))));
    }

    #[test]
    fn clear_disarms_everything() {
        let base = Instant::now();
        let mut sched = Scheduler::new();
        sched.arm(base, Timer::SubmapExpiry);
        sched.clear();
        assert!(sched.is_empty());
        assert_eq!(sched.next_deadline(), None);
    }
}
