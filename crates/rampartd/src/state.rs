//! Per-subsystem status table guarded by completion stamps.
//!
//! Producers stamp each completion from a per-subsystem counter at the moment
//! it completes. The board applies an update only when its stamp is newer than
//! the last one applied for that subsystem, so a late delivery of an older
//! completion can never overwrite a newer one.

use rampart_shared::{StatusValue, Subsystem};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Completion sequence number, unique and increasing per subsystem
pub type Stamp = u64;

/// Hands out completion stamps. Shared by every producer.
#[derive(Debug, Default)]
pub struct Sequencer {
    counters: [AtomicU64; 4],
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next stamp for `subsystem`. Call when the work completes.
    pub fn stamp(&self, subsystem: Subsystem) -> Stamp {
        self.counters[subsystem.index()].fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Result of offering an update to the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Value replaced and differs from the previous one
    Changed,
    /// Stamp accepted but the value was already displayed
    Unchanged,
    /// An update with a newer stamp was already applied
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    values: [StatusValue; 4],
    applied: [Stamp; 4],
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, subsystem: Subsystem, stamp: Stamp, value: StatusValue) -> Applied {
        let idx = subsystem.index();
        if stamp <= self.applied[idx] {
            return Applied::Stale;
        }
        self.applied[idx] = stamp;
        if self.values[idx] == value {
            return Applied::Unchanged;
        }
        self.values[idx] = value;
        Applied::Changed
    }

    pub fn get(&self, subsystem: Subsystem) -> &StatusValue {
        &self.values[subsystem.index()]
    }

    /// Stamp of the last applied update, 0 if none
    pub fn last_stamp(&self, subsystem: Subsystem) -> Stamp {
        self.applied[subsystem.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Subsystem, &StatusValue)> {
        Subsystem::ALL.iter().map(move |s| (*s, self.get(*s)))
    }

    pub fn to_map(&self) -> BTreeMap<Subsystem, StatusValue> {
        self.iter().map(|(s, v)| (s, v.clone())).collect()
    }
}
