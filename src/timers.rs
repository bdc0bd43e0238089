//! Per-instance timers. The replica is a single-threaded event loop with no
//! real clock of its own here: a timer is armed with a deadline computed
//! from whatever monotonic clock the host binary drives the loop with, and
//! `poll` is called by that loop to find out what has fired. This keeps the
//! core independent of any particular async runtime or timer wheel.
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::instance::Instance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerKind {
    ResendPreAccept,
    ResendAccept,
    ResendPrepare,
    DefaultToSlowPath,
}

/// A single-instance, single-kind timer entry. Re-arming goes through
/// `cancel` then `arm` so a stale timer can never double-fire.
#[derive(Default)]
pub struct TimerWheel {
    deadlines: BTreeMap<(Instant, Instance, TimerKind), ()>,
    by_key: std::collections::HashMap<(Instance, TimerKind), Instant>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, instance: Instance, kind: TimerKind, now: Instant, after: Duration) {
        self.cancel(instance, kind);
        let deadline = now + after;
        self.deadlines.insert((deadline, instance, kind), ());
        self.by_key.insert((instance, kind), deadline);
    }

    pub fn cancel(&mut self, instance: Instance, kind: TimerKind) {
        if let Some(deadline) = self.by_key.remove(&(instance, kind)) {
            self.deadlines.remove(&(deadline, instance, kind));
        }
    }

    pub fn cancel_all_for(&mut self, instance: Instance) {
        for kind in [
            TimerKind::ResendPreAccept,
            TimerKind::ResendAccept,
            TimerKind::ResendPrepare,
            TimerKind::DefaultToSlowPath,
        ] {
            self.cancel(instance, kind);
        }
    }

    /// Pops every timer whose deadline is at or before `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<(Instance, TimerKind)> {
        let mut fired = Vec::new();
        while let Some((&(deadline, instance, kind), _)) = self.deadlines.iter().next() {
            if deadline > now {
                break;
            }
            self.deadlines.remove(&(deadline, instance, kind));
            self.by_key.remove(&(instance, kind));
            fired.push((instance, kind));
        }
        fired
    }
}
