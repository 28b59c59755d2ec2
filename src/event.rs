/// Timed kernel events.
///
/// Besides model completions, the clock can be driven by a handful of
/// kernel timers: `wait_for` deadlines, actor kill dates, and resource
/// state changes scheduled from outside the actors. Each is an immutable
/// `TimerEvent` placed on the [`TimerQueue`](crate::scheduler::TimerQueue)
/// and fired in deterministic `(at, id)` order.

use std::cmp::Ordering;

use crate::actor::ActorId;
use crate::platform::ResourceId;
use crate::time::SimTime;

// ── Event ID ──────────────────────────────────────────────────────────

/// A strictly-increasing timer identifier.
///
/// Breaks ties between timers due at the same date: creation order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

/// Deterministic event-ID generator, one per timer queue.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }
}

// ── Timer kinds ───────────────────────────────────────────────────────

/// What happens when a timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TimerKind {
    /// Deadline of a `wait_for`. Ignored unless the actor is still parked
    /// on the blocking call numbered `seq`.
    WaitTimeout { actor: ActorId, seq: u64 },

    /// Kill date set with `set_kill_time`.
    KillActor { actor: ActorId },

    /// Scheduled resource failure.
    ResourceOff { resource: ResourceId },

    /// Scheduled resource recovery.
    ResourceOn { resource: ResourceId },
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerKind::WaitTimeout { actor, seq } => write!(f, "Timeout({}, #{})", actor, seq),
            TimerKind::KillActor { actor } => write!(f, "Kill({})", actor),
            TimerKind::ResourceOff { resource } => write!(f, "Off({})", resource),
            TimerKind::ResourceOn { resource } => write!(f, "On({})", resource),
        }
    }
}

// ── TimerEvent ────────────────────────────────────────────────────────

/// A single timer on the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent {
    pub id: EventId,
    pub at: SimTime,
    pub kind: TimerKind,
}

impl TimerEvent {
    pub fn new(id: EventId, at: SimTime, kind: TimerKind) -> Self {
        TimerEvent { id, at, kind }
    }
}

/// Ordering: smallest `(at, id)` first.
///
/// `BinaryHeap` is a max-heap, so the natural ordering is reversed here.
impl Ord for TimerEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
