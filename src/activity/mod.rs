//! Activities — the units of simulated work actors wait on.
//!
//! Exec, Comm, Io and Sleep share one state machine:
//!
//! ```text
//!            start()             model completion
//!  Inited ───────────► Started ─────────────────► Finished
//!    │                   │  │
//!    │ cancel()          │  └─ resource off / peer killed ─► Failed
//!    └───────────────────┴─ cancel() / issuer killed ─────► Canceled
//! ```
//!
//! Terminal states are absorbing. The kernel owns the transitions; user
//! code holds [`Activity`] handles and observes them through `test()`,
//! `wait()` and friends.

mod handle;
mod set;

use std::cell::RefCell;
use std::rc::Rc;

use crate::actor::ActorId;
use crate::error::SimError;
use crate::payload::MessagePayload;
use crate::platform::{DiskId, HostId, ResourceId, ResourceKind};
use crate::time::SimTime;

pub use handle::Activity;
pub use set::ActivitySet;

pub(crate) type ActivityRef = Rc<RefCell<ActivityImpl>>;

// ── Identifiers & public enums ────────────────────────────────────────

/// A unique activity identifier, allocated in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ActivityId(u64);

impl ActivityId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        ActivityId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivityState {
    Inited,
    Started,
    Finished,
    Failed,
    Canceled,
}

impl ActivityState {
    /// Finished, Failed and Canceled never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActivityState::Finished | ActivityState::Failed | ActivityState::Canceled
        )
    }
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityState::Inited => "inited",
            ActivityState::Started => "started",
            ActivityState::Finished => "finished",
            ActivityState::Failed => "failed",
            ActivityState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Which flavor of activity a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivityType {
    Exec,
    Comm,
    Io,
    Sleep,
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityType::Exec => "exec",
            ActivityType::Comm => "comm",
            ActivityType::Io => "io",
            ActivityType::Sleep => "sleep",
        };
        f.write_str(s)
    }
}

/// Direction of a disk I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum IoOp {
    Read,
    Write,
}

// ── Kind-specific data ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct ExecSpec {
    pub host: HostId,
    pub flops: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct SleepSpec {
    pub host: HostId,
    pub duration: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct IoSpec {
    pub disk: DiskId,
    pub op: IoOp,
    pub size: f64,
}

/// One side of a communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CommEnd {
    pub actor: ActorId,
    pub host: HostId,
}

#[derive(Debug, Clone)]
pub(crate) struct CommSpec {
    pub mailbox: String,
    /// Declared size in bytes; set by the sender.
    pub size: f64,
    pub src: Option<CommEnd>,
    pub dst: Option<CommEnd>,
    pub payload: Option<MessagePayload>,
}

impl CommSpec {
    /// Both ends are known: the transfer can run.
    pub fn is_matched(&self) -> bool {
        self.src.is_some() && self.dst.is_some()
    }
}

/// Role of an unmatched communication in its mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommRole {
    Send,
    Recv,
}

impl CommRole {
    pub fn opposite(self) -> CommRole {
        match self {
            CommRole::Send => CommRole::Recv,
            CommRole::Recv => CommRole::Send,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ActivityKind {
    Exec(ExecSpec),
    Sleep(SleepSpec),
    Io(IoSpec),
    Comm(CommSpec),
}

/// Why an activity ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FailureCause {
    /// A bound resource went off.
    ResourceOff { resource: ResourceId, name: String },
    /// The other party of a matched communication was killed.
    PeerKilled(ActorId),
    /// The resource model declared the action failed.
    Model(ResourceKind),
    /// No route joins the two ends of a communication.
    NoRoute { from: String, to: String },
}

// ── ActivityImpl ──────────────────────────────────────────────────────

/// Kernel-side state of one activity.
#[derive(Debug)]
pub(crate) struct ActivityImpl {
    pub id: ActivityId,
    pub name: String,
    pub kind: ActivityKind,
    pub state: ActivityState,
    /// Actor that created the activity, if any.
    pub issuer: Option<ActorId>,
    /// Resources the running action is bound to.
    pub resources: Vec<ResourceId>,
    /// Actors blocked on this activity, in registration order.
    pub waiters: Vec<ActorId>,
    pub failure: Option<FailureCause>,
    pub suspended: bool,
    /// An action exists for this activity in the resource model.
    pub in_model: bool,
    /// Started by `put_detached`: nobody holds a handle on the sender side.
    pub detached: bool,
    pub start_time: Option<SimTime>,
    pub finish_time: Option<SimTime>,
    /// A communication that matched an earlier counterpart forwards to the
    /// shared object.
    pub merged_into: Option<ActivityRef>,
}

impl ActivityImpl {
    pub fn new(id: ActivityId, name: String, kind: ActivityKind, issuer: Option<ActorId>) -> Self {
        ActivityImpl {
            id,
            name,
            kind,
            state: ActivityState::Inited,
            issuer,
            resources: Vec::new(),
            waiters: Vec::new(),
            failure: None,
            suspended: false,
            in_model: false,
            detached: false,
            start_time: None,
            finish_time: None,
            merged_into: None,
        }
    }

    pub fn activity_type(&self) -> ActivityType {
        match self.kind {
            ActivityKind::Exec(_) => ActivityType::Exec,
            ActivityKind::Sleep(_) => ActivityType::Sleep,
            ActivityKind::Io(_) => ActivityType::Io,
            ActivityKind::Comm(_) => ActivityType::Comm,
        }
    }

    pub fn comm(&self) -> Option<&CommSpec> {
        match &self.kind {
            ActivityKind::Comm(c) => Some(c),
            _ => None,
        }
    }

    pub fn comm_mut(&mut self) -> Option<&mut CommSpec> {
        match &mut self.kind {
            ActivityKind::Comm(c) => Some(c),
            _ => None,
        }
    }

    /// Role of a communication still waiting in its mailbox.
    pub fn comm_role(&self) -> Option<CommRole> {
        let comm = self.comm()?;
        match (comm.src, comm.dst) {
            (Some(_), None) => Some(CommRole::Send),
            (None, Some(_)) => Some(CommRole::Recv),
            _ => None,
        }
    }

    /// Actors whose lifetime is tied to this activity.
    pub fn parties(&self) -> Vec<ActorId> {
        let mut out: Vec<ActorId> = self.issuer.into_iter().collect();
        if let Some(comm) = self.comm() {
            for end in [comm.src, comm.dst].into_iter().flatten() {
                if !out.contains(&end.actor) {
                    out.push(end.actor);
                }
            }
        }
        out
    }

    /// The error `actor` observes when it was waiting on this activity.
    /// `None` unless the activity is Failed or Canceled.
    pub fn error_for(&self, actor: ActorId) -> Option<SimError> {
        match self.state {
            ActivityState::Inited | ActivityState::Started | ActivityState::Finished => None,
            ActivityState::Canceled => {
                let msg = match self.comm() {
                    Some(comm) if comm.dst.is_some_and(|d| d.actor == actor) => {
                        "communication canceled by the sender".to_string()
                    }
                    Some(comm) if comm.src.is_some_and(|s| s.actor == actor) => {
                        "communication canceled by the receiver".to_string()
                    }
                    _ => format!("{} '{}' canceled", self.activity_type(), self.name),
                };
                Some(SimError::Cancel(msg))
            }
            ActivityState::Failed => Some(self.failure_error()),
        }
    }

    fn failure_error(&self) -> SimError {
        let kind = self.activity_type();
        match (&self.failure, kind) {
            (Some(FailureCause::ResourceOff { resource, name }), ActivityType::Comm) => {
                match resource.kind() {
                    ResourceKind::Link => SimError::NetworkFailure(format!("link {} is off", name)),
                    _ => SimError::NetworkFailure(format!("remote host {} failed", name)),
                }
            }
            (Some(FailureCause::NoRoute { from, to }), _) => {
                SimError::NetworkFailure(format!("no route from {} to {}", from, to))
            }
            (Some(FailureCause::PeerKilled(peer)), _) => {
                SimError::NetworkFailure(format!("remote peer {} was killed", peer))
            }
            (Some(FailureCause::ResourceOff { resource, name }), _) => match resource.kind() {
                ResourceKind::Host => SimError::HostFailure(format!("host {} failed", name)),
                ResourceKind::Link => SimError::NetworkFailure(format!("link {} failed", name)),
                ResourceKind::Disk => SimError::StorageFailure(format!("disk {} failed", name)),
            },
            (Some(FailureCause::Model(_)), ActivityType::Comm) | (None, ActivityType::Comm) => {
                SimError::NetworkFailure(format!("communication '{}' failed", self.name))
            }
            (Some(FailureCause::Model(ResourceKind::Disk)), _) | (None, ActivityType::Io) => {
                SimError::StorageFailure(format!("{} '{}' failed", kind, self.name))
            }
            (Some(FailureCause::Model(ResourceKind::Link)), _) => {
                SimError::NetworkFailure(format!("{} '{}' failed", kind, self.name))
            }
            _ => SimError::HostFailure(format!("{} '{}' failed", kind, self.name)),
        }
    }
}

/// Follow the forwarding chain of a merged communication.
pub(crate) fn resolve(act: &ActivityRef) -> ActivityRef {
    let mut cur = Rc::clone(act);
    loop {
        let next = cur.borrow().merged_into.clone();
        match next {
            Some(n) => cur = n,
            None => return cur,
        }
    }
}
