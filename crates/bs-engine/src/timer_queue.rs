//! Deterministic timer facility.
//!
//! Timers are keyed by `slotmap` keys, so a cancelled or fired key never
//! aliases a newer timer. Due order is kept in a vector sorted latest-first
//! so the next timer pops off the end.

use alloc::vec::Vec;
use core::cmp::Ordering;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a scheduled timer.
    pub struct TimerKey;
}

#[derive(Clone, Debug)]
struct Timer<T> {
    due: f64,
    payload: T,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    due: f64,
    seq: u64,
    key: TimerKey,
}

impl Slot {
    fn cmp_due(&self, other: &Slot) -> Ordering {
        self.due.total_cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Timers that fire against an externally supplied clock in seconds.
#[derive(Clone, Debug)]
pub struct TimerQueue<T> {
    timers: SlotMap<TimerKey, Timer<T>>,
    /// Sorted latest-first; may hold keys of cancelled timers.
    order: Vec<Slot>,
    seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            timers: SlotMap::with_key(),
            order: Vec::new(),
            seq: 0,
        }
    }

    /// Schedule `payload` to fire `delay` seconds after `now`.
    ///
    /// Non-finite or negative delays fire at `now`. Timers due at the same
    /// instant fire in scheduling order.
    pub fn schedule(&mut self, now: f64, delay: f64, payload: T) -> TimerKey {
        let delay = if delay.is_finite() && delay > 0.0 { delay } else { 0.0 };
        let due = now + delay;
        let key = self.timers.insert(Timer { due, payload });

        let slot = Slot { due, seq: self.seq, key };
        self.seq += 1;
        let pos = self
            .order
            .partition_point(|s| s.cmp_due(&slot) == Ordering::Greater);
        self.order.insert(pos, slot);
        key
    }

    /// Cancel a timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, key: TimerKey) -> bool {
        let removed = self.timers.remove(key).is_some();
        if removed && self.order.len() > 2 * self.timers.len() + 64 {
            let timers = &self.timers;
            self.order.retain(|s| timers.contains_key(s.key));
        }
        removed
    }

    /// Pop the earliest timer due at or before `now`, with its due time.
    pub fn pop_due(&mut self, now: f64) -> Option<(f64, T)> {
        while let Some(slot) = self.order.last().copied() {
            if !self.timers.contains_key(slot.key) {
                self.order.pop();
                continue;
            }
            if slot.due > now {
                return None;
            }
            self.order.pop();
            return self.timers.remove(slot.key).map(|t| (t.due, t.payload));
        }
        None
    }

    /// Due time of the earliest live timer.
    pub fn next_due(&self) -> Option<f64> {
        self.order
            .iter()
            .rev()
            .find(|s| self.timers.contains_key(s.key))
            .map(|s| s.due)
    }

    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.timers.contains_key(key)
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
