/// Deterministic timer queue.
///
/// A `BinaryHeap` with reversed `Ord` on `TimerEvent` acts as a min-heap
/// keyed by `(at, id)`. Timer IDs are strictly increasing, so two runs
/// that schedule the same timers pop them in the same order.

use std::collections::BinaryHeap;

use crate::event::{EventId, EventIdGen, TimerEvent, TimerKind};
use crate::time::SimTime;

/// Owns the pending timers and their ID generator.
#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    queue: BinaryHeap<TimerEvent>,
    id_gen: EventIdGen,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer at an absolute date.
    pub fn schedule(&mut self, at: SimTime, kind: TimerKind) -> EventId {
        let id = self.id_gen.next_id();
        self.queue.push(TimerEvent::new(id, at, kind));
        id
    }

    /// Date of the earliest pending timer.
    pub fn next_date(&self) -> Option<SimTime> {
        self.queue.peek().map(|e| e.at)
    }

    /// Pop the earliest timer if it is due at `now` (within `precision`).
    pub fn pop_due(&mut self, now: SimTime, precision: f64) -> Option<TimerEvent> {
        let due = self
            .queue
            .peek()
            .is_some_and(|e| e.at.secs() <= now.secs() + precision);
        if due {
            self.queue.pop()
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Withdraw a pending timer. Returns `false` if it already fired.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|e| e.id != id);
        before != self.queue.len()
    }
}
