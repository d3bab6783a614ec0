//! Debouncing
//!
//! A per-key state machine that coalesces rapid requests into one:
//!
//! ```text
//! idle ──schedule──▶ pending(value, deadline) ──take_due──▶ in-flight ──complete──▶ idle
//!                      ▲        │ schedule: replace value, restart window      │
//!                      │        ▼                                              │
//!                      └──────────── complete with a queued value ◀────────────┘
//! ```
//!
//! Time is passed in explicitly, so the state machine never touches a timer.

use std::{collections::hash_map::Entry, hash::Hash};

use jiff::{SignedDuration, Timestamp};
use rustc_hash::FxHashMap;

use crate::clock::offset;

/// What happened to a scheduled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    /// The key was idle; a new window opened.
    Opened,

    /// The key was pending; its value was replaced and its window restarted.
    Coalesced,

    /// The key is in flight; the value will be scheduled once it completes.
    Queued,
}

#[derive(Debug, Clone)]
enum Slot<V> {
    Pending {
        value: V,
        deadline: Timestamp,
    },
    InFlight {
        sent: V,
        queued: Option<(V, Timestamp)>,
    },
}

/// Coalesces values per key within a fixed window.
#[derive(Debug, Clone)]
pub struct Debouncer<K, V> {
    window: SignedDuration,
    slots: FxHashMap<K, Slot<V>>,
}

impl<K, V> Debouncer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// A debouncer with no pending keys.
    #[must_use]
    pub fn new(window: SignedDuration) -> Self {
        Self {
            window,
            slots: FxHashMap::default(),
        }
    }

    /// The coalescing window.
    pub fn window(&self) -> SignedDuration {
        self.window
    }

    /// Record the latest value for `key`, (re)starting its window at `now`.
    pub fn schedule(&mut self, key: K, value: V, now: Timestamp) -> Scheduled {
        let deadline = offset(now, self.window);

        match self.slots.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(Slot::Pending { value, deadline });

                Scheduled::Opened
            }
            Entry::Occupied(mut entry) => match entry.get_mut() {
                Slot::Pending {
                    value: pending,
                    deadline: pending_deadline,
                } => {
                    *pending = value;
                    *pending_deadline = deadline;

                    Scheduled::Coalesced
                }
                Slot::InFlight { queued, .. } => {
                    *queued = Some((value, deadline));

                    Scheduled::Queued
                }
            },
        }
    }

    /// Move every pending key whose window has closed into flight, earliest first.
    pub fn take_due(&mut self, now: Timestamp) -> Vec<(K, V)> {
        let mut due: Vec<(Timestamp, K)> = self
            .slots
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Pending { deadline, .. } if *deadline <= now => Some((*deadline, key.clone())),
                Slot::Pending { .. } | Slot::InFlight { .. } => None,
            })
            .collect();

        due.sort_by_key(|(deadline, _)| *deadline);

        due.into_iter()
            .filter_map(|(_, key)| self.launch(key))
            .collect()
    }

    /// Move every pending key into flight regardless of its deadline.
    pub fn take_all(&mut self) -> Vec<(K, V)> {
        self.take_due(Timestamp::MAX)
    }

    fn launch(&mut self, key: K) -> Option<(K, V)> {
        let value = match self.slots.get(&key)? {
            Slot::Pending { value, .. } => value.clone(),
            Slot::InFlight { .. } => return None,
        };

        self.slots.insert(
            key.clone(),
            Slot::InFlight {
                sent: value.clone(),
                queued: None,
            },
        );

        Some((key, value))
    }

    /// Mark the in-flight request for `key` as finished.
    ///
    /// Returns `true` when a value queued during the flight is now pending.
    pub fn complete(&mut self, key: &K) -> bool {
        let queued = match self.slots.get_mut(key) {
            None => return false,
            Some(Slot::Pending { .. }) => return true,
            Some(Slot::InFlight { queued, .. }) => queued.take(),
        };

        if let Some((value, deadline)) = queued {
            self.slots.insert(key.clone(), Slot::Pending { value, deadline });

            true
        } else {
            self.slots.remove(key);

            false
        }
    }

    /// Put an in-flight `key` back to pending with a fresh window, as if it
    /// had never been sent. A value queued during the flight takes precedence.
    ///
    /// Returns `false` when `key` is not in flight.
    pub fn retry_later(&mut self, key: &K, now: Timestamp) -> bool {
        let deadline = offset(now, self.window);

        let Some(slot) = self.slots.get_mut(key) else {
            return false;
        };

        let (value, deadline) = match slot {
            Slot::InFlight { sent, queued } => queued.take().unwrap_or_else(|| (sent.clone(), deadline)),
            Slot::Pending { .. } => return false,
        };

        *slot = Slot::Pending { value, deadline };

        true
    }

    /// Drop whatever is waiting for `key`, returning the value that would have been sent.
    ///
    /// A request already in flight cannot be recalled; only its queued follow-up is dropped.
    pub fn cancel(&mut self, key: &K) -> Option<V> {
        if let Some(Slot::InFlight { queued, .. }) = self.slots.get_mut(key) {
            return queued.take().map(|(value, _)| value);
        }

        match self.slots.remove(key)? {
            Slot::Pending { value, .. } => Some(value),
            Slot::InFlight { .. } => None,
        }
    }

    /// Forget every key, including in-flight bookkeeping.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// The most recent value requested for `key`, whether pending, queued or in flight.
    pub fn intended(&self, key: &K) -> Option<&V> {
        self.slots.get(key).map(Self::latest)
    }

    /// The most recent value requested for every key.
    pub fn intended_values(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().map(|(key, slot)| (key, Self::latest(slot)))
    }

    fn latest(slot: &Slot<V>) -> &V {
        match slot {
            Slot::Pending { value, .. }
            | Slot::InFlight {
                queued: Some((value, _)),
                ..
            }
            | Slot::InFlight {
                sent: value,
                queued: None,
            } => value,
        }
    }

    /// Whether `key` has anything pending or in flight.
    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// The earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Pending { deadline, .. } => Some(*deadline),
                Slot::InFlight { .. } => None,
            })
            .min()
    }

    /// Whether nothing is pending or in flight.
    pub fn is_idle(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> Timestamp {
        Timestamp::UNIX_EPOCH
    }

    fn at(millis: i64) -> Timestamp {
        offset(start(), SignedDuration::from_millis(millis))
    }

    fn debouncer() -> Debouncer<&'static str, u32> {
        Debouncer::new(SignedDuration::from_millis(800))
    }

    #[test]
    fn repeated_schedules_coalesce_to_last_value() {
        let mut debouncer = debouncer();

        assert_eq!(debouncer.schedule("v1", 2, at(0)), Scheduled::Opened);
        assert_eq!(debouncer.schedule("v1", 3, at(100)), Scheduled::Coalesced);
        assert_eq!(debouncer.schedule("v1", 5, at(200)), Scheduled::Coalesced);

        assert!(debouncer.take_due(at(900)).is_empty(), "window restarts on every schedule");
        assert_eq!(debouncer.take_due(at(1_000)), vec![("v1", 5)]);
    }

    #[test]
    fn keys_are_independent() {
        let mut debouncer = debouncer();

        debouncer.schedule("v1", 1, at(0));
        debouncer.schedule("v2", 2, at(500));

        assert_eq!(debouncer.take_due(at(800)), vec![("v1", 1)]);
        assert_eq!(debouncer.next_deadline(), Some(at(1_300)));
        assert_eq!(debouncer.take_due(at(1_300)), vec![("v2", 2)]);
    }

    #[test]
    fn due_keys_fire_earliest_first() {
        let mut debouncer = debouncer();

        debouncer.schedule("late", 1, at(300));
        debouncer.schedule("early", 2, at(0));

        assert_eq!(debouncer.take_all(), vec![("early", 2), ("late", 1)]);
    }

    #[test]
    fn schedule_during_flight_is_queued_until_complete() {
        let mut debouncer = debouncer();

        debouncer.schedule("v1", 1, at(0));
        debouncer.take_due(at(800));

        assert_eq!(debouncer.schedule("v1", 4, at(850)), Scheduled::Queued);
        assert!(debouncer.take_due(at(5_000)).is_empty(), "in-flight keys never fire twice");
        assert_eq!(debouncer.intended(&"v1"), Some(&4));

        assert!(debouncer.complete(&"v1"));
        assert_eq!(debouncer.take_due(at(1_650)), vec![("v1", 4)]);

        assert!(!debouncer.complete(&"v1"));
        assert!(debouncer.is_idle());
    }

    #[test]
    fn retry_later_reopens_the_window() {
        let mut debouncer = debouncer();

        debouncer.schedule("v1", 3, at(0));
        debouncer.take_due(at(800));

        assert!(debouncer.retry_later(&"v1", at(800)));
        assert!(debouncer.take_due(at(1_599)).is_empty());
        assert_eq!(debouncer.take_due(at(1_600)), vec![("v1", 3)]);
    }

    #[test]
    fn retry_later_prefers_the_queued_value() {
        let mut debouncer = debouncer();

        debouncer.schedule("v1", 3, at(0));
        debouncer.take_due(at(800));
        debouncer.schedule("v1", 6, at(900));

        assert!(debouncer.retry_later(&"v1", at(1_000)));
        assert_eq!(debouncer.take_all(), vec![("v1", 6)]);
        assert!(!debouncer.retry_later(&"ghost", at(1_000)));
    }

    #[test]
    fn cancel_pending_returns_value() {
        let mut debouncer = debouncer();

        debouncer.schedule("v1", 3, at(0));

        assert_eq!(debouncer.cancel(&"v1"), Some(3));
        assert!(debouncer.is_idle());
        assert!(debouncer.take_all().is_empty());
    }

    #[test]
    fn cancel_in_flight_only_drops_queued_value() {
        let mut debouncer = debouncer();

        debouncer.schedule("v1", 3, at(0));
        debouncer.take_all();

        assert_eq!(debouncer.cancel(&"v1"), None);

        debouncer.schedule("v1", 7, at(10));

        assert_eq!(debouncer.cancel(&"v1"), Some(7));
        assert!(debouncer.contains(&"v1"), "the in-flight request is still tracked");
        assert_eq!(debouncer.intended(&"v1"), Some(&3));
    }

    #[test]
    fn complete_unknown_key_is_a_no_op() {
        let mut debouncer = debouncer();

        assert!(!debouncer.complete(&"ghost"));
    }
}
