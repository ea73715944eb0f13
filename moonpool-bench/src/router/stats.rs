//! Shared router counters.

use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;

#[derive(Default)]
struct Counters {
    routed: Cell<u64>,
    forwarded: Cell<u64>,
    workers_created: Cell<u64>,
    dropped: Cell<u64>,
}

/// Counters shared by every router of a topology. Clones share the counts.
#[derive(Clone, Default)]
pub struct RouterStats {
    counters: Rc<Counters>,
}

/// Point-in-time copy of [`RouterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterSnapshot {
    /// Messages handed to an entity worker. Counted once per message, on
    /// the host that owns the entity.
    pub routed: u64,
    /// Messages sent on to the router of another cluster member.
    pub forwarded: u64,
    /// Entity workers created.
    pub workers_created: u64,
    /// Unroutable messages dropped.
    pub dropped: u64,
}

impl RouterStats {
    /// Fresh counters, all zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages handed to an entity worker.
    pub fn routed(&self) -> u64 {
        self.counters.routed.get()
    }

    /// Messages sent on to another cluster member's router.
    pub fn forwarded(&self) -> u64 {
        self.counters.forwarded.get()
    }

    /// Entity workers created.
    pub fn workers_created(&self) -> u64 {
        self.counters.workers_created.get()
    }

    /// Unroutable messages dropped.
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.get()
    }

    /// Copy the current counts.
    pub fn snapshot(&self) -> RouterSnapshot {
        RouterSnapshot {
            routed: self.routed(),
            forwarded: self.forwarded(),
            workers_created: self.workers_created(),
            dropped: self.dropped(),
        }
    }

    pub(crate) fn record_routed(&self) {
        bump(&self.counters.routed);
    }

    pub(crate) fn record_forwarded(&self) {
        bump(&self.counters.forwarded);
    }

    pub(crate) fn record_worker_created(&self) {
        bump(&self.counters.workers_created);
    }

    pub(crate) fn record_dropped(&self) {
        bump(&self.counters.dropped);
    }
}

impl std::fmt::Debug for RouterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}

fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}
