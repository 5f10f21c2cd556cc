//! Delayed-callback service.

use crate::timer::{Timer, saturating_nanos};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use stimkit_core::HostError;
use tracing::trace;

/// Handle for a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

pub type TimerCallback = Box<dyn FnOnce() -> Result<(), HostError>>;

pub trait Scheduler {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Returns `false` if the callback already fired or was cancelled.
    fn cancel(&self, id: TimerId) -> bool;
}

/// Single-threaded timer queue over a [`Timer`].
///
/// Callbacks fire in due order; callbacks due at the same instant fire in the
/// order they were scheduled. No borrow is held while a callback runs, so it
/// may schedule or cancel freely.
pub struct TimerQueue<T: Timer<Timestamp = u64>> {
    timer: T,
    entries: RefCell<BTreeMap<(u64, u64), TimerCallback>>,
    due_by_id: RefCell<HashMap<TimerId, u64>>,
    next_seq: Cell<u64>,
}

impl<T: Timer<Timestamp = u64>> TimerQueue<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            entries: RefCell::new(BTreeMap::new()),
            due_by_id: RefCell::new(HashMap::new()),
            next_seq: Cell::new(0),
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn now(&self) -> u64 {
        self.timer.now()
    }

    pub fn pending(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.entries.borrow().keys().next().map(|(due, _)| *due)
    }

    /// Waits for the earliest callback and runs it. Returns `None` when the
    /// queue is empty.
    pub fn fire_next(&self) -> Result<Option<TimerId>, HostError> {
        let Some(((due, seq), callback)) = self.pop_first() else {
            return Ok(None);
        };
        let now = self.timer.now();
        if due > now {
            self.timer.sleep(Duration::from_nanos(due - now));
        }
        trace!(timer = seq, due_ns = due, "firing timer");
        callback()?;
        Ok(Some(TimerId(seq)))
    }

    /// Fires callbacks until none are left, returning how many ran.
    pub fn run_until_idle(&self) -> Result<usize, HostError> {
        let mut fired = 0;
        while self.fire_next()?.is_some() {
            fired += 1;
        }
        Ok(fired)
    }

    /// Fires every callback due within `d` from now and leaves the clock at
    /// that point.
    pub fn run_for(&self, d: Duration) -> Result<usize, HostError> {
        let target = self.timer.now().saturating_add(saturating_nanos(d));
        let mut fired = 0;
        while self.next_due().is_some_and(|due| due <= target) {
            if self.fire_next()?.is_some() {
                fired += 1;
            }
        }
        let now = self.timer.now();
        if target > now {
            self.timer.sleep(Duration::from_nanos(target - now));
        }
        Ok(fired)
    }

    fn pop_first(&self) -> Option<((u64, u64), TimerCallback)> {
        let entry = self.entries.borrow_mut().pop_first()?;
        self.due_by_id.borrow_mut().remove(&TimerId(entry.0.1));
        Some(entry)
    }
}

impl<T: Timer<Timestamp = u64>> Scheduler for TimerQueue<T> {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        let due = self.timer.now().saturating_add(saturating_nanos(delay));
        self.entries.borrow_mut().insert((due, seq), callback);
        self.due_by_id.borrow_mut().insert(TimerId(seq), due);
        trace!(timer = seq, due_ns = due, "scheduled timer");
        TimerId(seq)
    }

    fn cancel(&self, id: TimerId) -> bool {
        let Some(due) = self.due_by_id.borrow_mut().remove(&id) else {
            return false;
        };
        self.entries.borrow_mut().remove(&(due, id.0));
        trace!(timer = id.0, "cancelled timer");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::VirtualTimer;
    use std::rc::Rc;

    fn queue() -> Rc<TimerQueue<VirtualTimer>> {
        Rc::new(TimerQueue::new(VirtualTimer::new()))
    }

    fn push_label(log: &Rc<RefCell<Vec<&'static str>>>, label: &'static str) -> TimerCallback {
        let log = Rc::clone(log);
        Box::new(move || {
            log.borrow_mut().push(label);
            Ok(())
        })
    }

    #[test]
    fn fires_in_due_order_with_fifo_ties() {
        let q = queue();
        let log = Rc::new(RefCell::new(Vec::new()));
        q.schedule(Duration::from_millis(300), push_label(&log, "late"));
        q.schedule(Duration::from_millis(100), push_label(&log, "first"));
        q.schedule(Duration::from_millis(100), push_label(&log, "second"));

        assert_eq!(q.run_until_idle().unwrap(), 3);
        assert_eq!(*log.borrow(), vec!["first", "second", "late"]);
        assert_eq!(q.now(), 300_000_000);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let q = queue();
        let log = Rc::new(RefCell::new(Vec::new()));
        let id = q.schedule(Duration::from_millis(10), push_label(&log, "cancelled"));
        q.schedule(Duration::from_millis(20), push_label(&log, "kept"));

        assert!(q.cancel(id));
        assert!(!q.cancel(id));
        assert_eq!(q.pending(), 1);
        q.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["kept"]);
    }

    #[test]
    fn callbacks_may_cancel_and_schedule() {
        let q = queue();
        let log = Rc::new(RefCell::new(Vec::new()));
        let doomed = q.schedule(Duration::from_millis(50), push_label(&log, "doomed"));
        let inner = Rc::clone(&q);
        let inner_log = Rc::clone(&log);
        q.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                inner.cancel(doomed);
                inner.schedule(Duration::from_millis(5), push_label(&inner_log, "rescheduled"));
                Ok(())
            }),
        );

        q.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["rescheduled"]);
        assert_eq!(q.now(), 15_000_000);
    }

    #[test]
    fn run_for_stops_at_horizon() {
        let q = queue();
        let log = Rc::new(RefCell::new(Vec::new()));
        q.schedule(Duration::from_millis(100), push_label(&log, "in"));
        q.schedule(Duration::from_millis(500), push_label(&log, "out"));

        assert_eq!(q.run_for(Duration::from_millis(200)).unwrap(), 1);
        assert_eq!(q.now(), 200_000_000);
        assert_eq!(q.pending(), 1);
        assert_eq!(*log.borrow(), vec!["in"]);
    }

    #[test]
    fn huge_delays_stay_last() {
        let q = queue();
        let log = Rc::new(RefCell::new(Vec::new()));
        q.schedule(Duration::from_millis(18_446_744_073_710), push_label(&log, "far"));
        q.schedule(Duration::MAX, push_label(&log, "never"));
        q.schedule(Duration::from_millis(500), push_label(&log, "near"));

        assert_eq!(q.next_due(), Some(500_000_000));
        assert_eq!(q.run_for(Duration::from_secs(1)).unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["near"]);
        assert_eq!(q.pending(), 2);

        assert_eq!(q.run_for(Duration::MAX).unwrap(), 2);
        assert_eq!(*log.borrow(), vec!["near", "far", "never"]);
        assert_eq!(q.now(), u64::MAX);
    }

    #[test]
    fn callback_errors_propagate() {
        let q = queue();
        q.schedule(
            Duration::from_millis(1),
            Box::new(|| Err(HostError::Display("detached".into()))),
        );
        let err = q.fire_next().unwrap_err();
        assert!(matches!(err, HostError::Display(_)));
        assert_eq!(q.pending(), 0);
    }
}
