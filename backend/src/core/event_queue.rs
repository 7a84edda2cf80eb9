//! Global event queue with deterministic ordering.
//!
//! Every clock domain feeds this single queue; popping it yields the merged
//! causal timeline. Events are ordered by:
//! 1. Time (earlier first)
//! 2. Insertion sequence (FIFO for simultaneous events)

use crate::core::time::SimTime;
use crate::models::event::{Event, EventKind};
use crate::models::packet::NodeId;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Key for ordering events in the queue.
#[derive(Debug, Clone, Copy)]
pub struct EventKey {
    /// When this event should be dispatched.
    pub time: SimTime,
    /// Insertion sequence number, unique per queue.
    pub sequence: u64,
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.total_cmp(&other.time) {
            Ordering::Equal => self.sequence.cmp(&other.sequence),
            ord => ord,
        }
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending events of one run, keyed by `(time, sequence)`.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: BTreeMap<EventKey, Event>,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event; returns its ordering key.
    pub fn push(&mut self, time: SimTime, actor: NodeId, kind: EventKind) -> EventKey {
        let key = EventKey {
            time,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.events.insert(key, Event::new(time, key.sequence, actor, kind));
        key
    }

    /// Earliest pending event, without removing it.
    pub fn peek(&self) -> Option<&Event> {
        self.events.first_key_value().map(|(_, event)| event)
    }

    /// Time of the earliest pending event.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.events.first_key_value().map(|(key, _)| key.time)
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_first().map(|(_, event)| event)
    }

    /// Remove the earliest event only if it is due at or before `limit`.
    pub fn pop_due(&mut self, limit: Option<SimTime>) -> Option<Event> {
        match (self.peek_time(), limit) {
            (Some(time), Some(limit)) if time > limit => None,
            (Some(_), _) => self.pop(),
            (None, _) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total number of events ever pushed
    pub fn pushed(&self) -> u64 {
        self.next_sequence
    }

    /// Remove every pending event in dispatch order.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_key_ordering() {
        let earlier = EventKey {
            time: 1.0,
            sequence: 7,
        };
        let later = EventKey {
            time: 2.0,
            sequence: 1,
        };
        assert!(earlier < later);
    }

    #[test]
    fn test_sequence_breaks_ties() {
        let first = EventKey {
            time: 1.0,
            sequence: 1,
        };
        let second = EventKey {
            time: 1.0,
            sequence: 2,
        };
        assert!(first < second, "Lower sequence should dispatch first");
    }

    #[test]
    fn test_pop_in_time_then_insertion_order() {
        let mut queue = EventQueue::new();
        queue.push(5.0, 0, EventKind::Arrival);
        queue.push(1.0, 1, EventKind::TransmitStart);
        queue.push(1.0, 2, EventKind::TransmitEnd);

        let order: Vec<(SimTime, NodeId)> = std::iter::from_fn(|| queue.pop())
            .map(|e| (e.time(), e.actor()))
            .collect();
        assert_eq!(order, vec![(1.0, 1), (1.0, 2), (5.0, 0)]);
    }

    #[test]
    fn test_pop_due_respects_limit() {
        let mut queue = EventQueue::new();
        queue.push(10.0, 0, EventKind::Arrival);

        assert!(queue.pop_due(Some(9.0)).is_none());
        assert_eq!(queue.len(), 1);
        assert!(queue.pop_due(Some(10.0)).is_some());
        assert!(queue.pop_due(None).is_none());
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = EventQueue::new();
        queue.push(2.0, 0, EventKind::Arrival);
        queue.push(1.0, 1, EventKind::Arrival);

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].actor(), 1);
        assert!(queue.is_empty());
        assert_eq!(queue.pushed(), 2);
    }
}
