//! TraceEntry — append-only record of kernel transitions.
//!
//! Every actor and activity state change, and resource flip is
//! appended here (when `RuntimeConfig::record_trace` is on). Two runs of the
//! same scenario must produce the same trace; [`trace_hash`] folds it into
//! a single value so that is cheap to check.

use crate::activity::{ActivityId, ActivityState, ActivityType};
use crate::actor::ActorId;
use crate::platform::ResourceId;
use crate::time::SimTime;

/// Combine two hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// Hash a byte slice deterministically (FNV-1a variant).
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// What happened.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TraceEvent {
    ActorCreated { actor: ActorId, name: String, host: String },
    ActorSuspended { actor: ActorId },
    ActorResumed { actor: ActorId },
    ActorKilled { actor: ActorId, by: Option<ActorId> },
    ActorMigrated { actor: ActorId, host: String },
    ActorTerminated { actor: ActorId, failed: bool },
    ActivityStarted { activity: ActivityId, kind: ActivityType },
    ActivityEnded { activity: ActivityId, kind: ActivityType, state: ActivityState },
    ResourceOff { resource: ResourceId },
    ResourceOn { resource: ResourceId },
}

impl std::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceEvent::ActorCreated { actor, name, host } => {
                write!(f, "create {} '{}' on {}", actor, name, host)
            }
            TraceEvent::ActorSuspended { actor } => write!(f, "suspend {}", actor),
            TraceEvent::ActorResumed { actor } => write!(f, "resume {}", actor),
            TraceEvent::ActorKilled { actor, by: Some(by) } => write!(f, "kill {} by {}", actor, by),
            TraceEvent::ActorKilled { actor, by: None } => write!(f, "kill {}", actor),
            TraceEvent::ActorMigrated { actor, host } => write!(f, "migrate {} to {}", actor, host),
            TraceEvent::ActorTerminated { actor, failed } => {
                write!(f, "terminate {} (failed={})", actor, failed)
            }
            TraceEvent::ActivityStarted { activity, kind } => write!(f, "start {} {}", kind, activity),
            TraceEvent::ActivityEnded { activity, kind, state } => {
                write!(f, "end {} {} {}", kind, activity, state)
            }
            TraceEvent::ResourceOff { resource } => write!(f, "off {}", resource),
            TraceEvent::ResourceOn { resource } => write!(f, "on {}", resource),
        }
    }
}

/// A single trace record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry {
    /// Simulated date of the transition.
    pub time: SimTime,
    /// Scheduling round in which it happened.
    pub round: u64,
    pub event: TraceEvent,
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} R={}] {}", self.time, self.round, self.event)
    }
}

/// Fold a trace into one deterministic hash.
pub fn trace_hash(entries: &[TraceEntry]) -> u64 {
    entries
        .iter()
        .fold(0u64, |h, e| hash_combine(h, hash_bytes(e.to_string().as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(t: f64, actor: u64) -> TraceEntry {
        TraceEntry {
            time: SimTime::new(t),
            round: 0,
            event: TraceEvent::ActorSuspended {
                actor: ActorId::new(actor),
            },
        }
    }

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
        assert_ne!(hash_combine(1, 2), hash_combine(2, 1));
    }

    #[test]
    fn test_trace_hash_is_order_sensitive() {
        let a = vec![entry(0.0, 1), entry(1.0, 2)];
        let b = vec![entry(1.0, 2), entry(0.0, 1)];
        assert_eq!(trace_hash(&a), trace_hash(&a.clone()));
        assert_ne!(trace_hash(&a), trace_hash(&b));
    }

    #[test]
    fn test_display() {
        let e = TraceEntry {
            time: SimTime::new(2.0),
            round: 3,
            event: TraceEvent::ActorKilled {
                actor: ActorId::new(4),
                by: Some(ActorId::new(1)),
            },
        };
        assert_eq!(e.to_string(), "[T=2 R=3] kill A4 by A1");
    }

    #[test]
    fn test_display_migration() {
        let e = TraceEvent::ActorMigrated {
            actor: ActorId::new(1),
            host: "bob".into(),
        };
        assert_eq!(e.to_string(), "migrate A1 to bob");
    }
}
