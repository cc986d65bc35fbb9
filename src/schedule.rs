use std::collections::HashMap;
use std::time::Duration;

/// Handle for a one-shot timer armed through a [`Scheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Timer primitive the controllers are driven by.
///
/// Implementations report expiry to the owner of the timer out of band (the
/// browser adapter posts back from a `setTimeout` callback, tests advance a
/// manual clock). Expiry must never be reported from inside `schedule`.
pub trait Scheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId;

    /// Disarms `id`. Cancelling a timer that already fired is a no-op.
    fn cancel(&mut self, id: TimerId);
}

/// Monotonic session counter. Every asynchronous continuation captures the
/// epoch it was issued under and is discarded once the counter has moved on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Epoch(u64);

impl Epoch {
    pub fn advance(&mut self) -> Epoch {
        self.0 = self.0.wrapping_add(1);
        *self
    }
}

/// Armed timers tagged with what they are for.
#[derive(Debug)]
pub struct TimerSet<P> {
    armed: HashMap<TimerId, P>,
}

impl<P> Default for TimerSet<P> {
    fn default() -> Self {
        Self {
            armed: HashMap::new(),
        }
    }
}

impl<P: Copy + PartialEq> TimerSet<P> {
    pub fn arm<S: Scheduler>(&mut self, scheduler: &mut S, delay: Duration, purpose: P) -> TimerId {
        let id = scheduler.schedule(delay);
        self.armed.insert(id, purpose);
        id
    }

    /// Claims a fired timer. Returns `None` for ids that were cancelled or
    /// never belonged to this set.
    pub fn fired<S: Scheduler>(&mut self, scheduler: &mut S, id: TimerId) -> Option<P> {
        let purpose = self.armed.remove(&id)?;
        scheduler.cancel(id);
        Some(purpose)
    }

    pub fn cancel_purpose<S: Scheduler>(&mut self, scheduler: &mut S, purpose: P) {
        self.armed.retain(|id, armed| {
            if *armed == purpose {
                scheduler.cancel(*id);
                false
            } else {
                true
            }
        });
    }

    pub fn cancel_all<S: Scheduler>(&mut self, scheduler: &mut S) {
        for (id, _) in self.armed.drain() {
            scheduler.cancel(id);
        }
    }

    pub fn is_armed(&self, purpose: P) -> bool {
        self.armed.values().any(|armed| *armed == purpose)
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}
