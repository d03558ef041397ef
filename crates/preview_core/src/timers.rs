//! Single-shot timers keyed by kind. A kind that is already pending cannot be rescheduled;
//! callers check [`Timers::is_pending`] or look at the return value of [`Timers::schedule`].

use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Startup delay and reconnect backoff of the control channel.
    Reconnect,
    /// Deferred viewport re-derivation after the preview view becomes visible.
    Resize,
    /// Second auto-fit pass after a model load.
    AutoFitSettle,
}

#[derive(Debug, Default)]
pub struct Timers {
    pending: HashMap<TimerKind, Instant>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (and leaves the existing deadline alone) when `kind` is already pending.
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) -> bool {
        if self.pending.contains_key(&kind) {
            debug!(?kind, "timer already pending; not rescheduling");
            return false;
        }
        self.pending.insert(kind, Instant::now() + delay);
        true
    }

    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.pending.remove(&kind).is_some()
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.pending.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.pending.get(&kind).copied()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Removes and returns every timer due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due: Vec<(Instant, TimerKind)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(kind, deadline)| (*deadline, *kind))
            .collect();
        due.sort_by_key(|(deadline, _)| *deadline);
        for (_, kind) in &due {
            self.pending.remove(kind);
        }
        due.into_iter().map(|(_, kind)| kind).collect()
    }
}
