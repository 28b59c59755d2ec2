//! Actors — simulated processes.
//!
//! An actor is user code (an async closure taking an [`ActorContext`])
//! bound to a host. The kernel keeps one [`ActorImpl`] per actor: its
//! lifecycle state, what it is blocked on, its error slot and the
//! bookkeeping needed to kill, restart or join it.

mod context;
mod id;

use std::collections::BTreeSet;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use crate::activity::{ActivityId, ActivityRef};
use crate::error::{SimError, SimResult};
use crate::event::EventId;
use crate::platform::HostId;
use crate::time::SimTime;

pub use context::ActorContext;
pub use id::ActorId;

/// The future an actor body evaluates to.
pub type ActorFuture = LocalBoxFuture<'static, SimResult<()>>;

/// Type-erased actor body. Called once per (re)start.
pub(crate) type ActorCode = Rc<dyn Fn(ActorContext) -> ActorFuture>;

/// Callback run when an actor terminates; the flag tells whether it failed
/// (was killed or returned an error).
pub(crate) type ExitHook = Box<dyn FnOnce(bool)>;

pub(crate) fn boxed_code<F, Fut>(code: F) -> ActorCode
where
    F: Fn(ActorContext) -> Fut + 'static,
    Fut: Future<Output = SimResult<()>> + 'static,
{
    Rc::new(move |ctx| code(ctx).boxed_local())
}

/// Lifecycle state of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ActorState {
    /// Running, runnable or blocked on an activity.
    Runnable,
    /// Suspended by `suspend`; not scheduled until resumed.
    Suspended,
    /// Killed; exit hooks and cleanup run when the scheduler reaches it.
    Dying,
    /// Terminated; dropped from the table at the end of the round.
    Dead,
}

impl std::fmt::Display for ActorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActorState::Runnable => "runnable",
            ActorState::Suspended => "suspended",
            ActorState::Dying => "dying",
            ActorState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Everything needed to (re)create an actor.
#[derive(Clone)]
pub(crate) struct ActorArgs {
    pub name: String,
    pub host: HostId,
    pub code: ActorCode,
    pub daemon: bool,
    pub auto_restart: bool,
    pub kill_time: Option<SimTime>,
}

impl ActorArgs {
    pub fn new(name: &str, host: HostId, code: ActorCode) -> Self {
        ActorArgs {
            name: name.to_string(),
            host,
            code,
            daemon: false,
            auto_restart: false,
            kill_time: None,
        }
    }
}

/// Kernel-side record of one actor.
pub(crate) struct ActorImpl {
    pub id: ActorId,
    pub name: String,
    pub host: HostId,
    pub parent: Option<ActorId>,
    pub state: ActorState,
    /// The actor's future is suspended at a kernel await point and must not
    /// be polled until something wakes it.
    pub parked: bool,
    /// Activities the actor is currently blocked on.
    pub blocking: Vec<ActivityRef>,
    /// Number of blocking calls made so far; stale timeouts carry an older
    /// value.
    pub seq: u64,
    /// Deadline timer of the current `wait_for`, if any.
    pub timeout_timer: Option<EventId>,
    /// Error to raise at the next (or current) await point.
    pub pending_error: Option<SimError>,
    /// The activity whose termination woke the actor.
    pub woken_by: Option<ActivityId>,
    /// Started, non-terminal activities this actor issued or takes part in.
    pub activities: BTreeSet<ActivityId>,
    pub daemon: bool,
    pub auto_restart: bool,
    pub kill_time: Option<SimTime>,
    pub kill_timer: Option<EventId>,
    pub on_exit: Vec<ExitHook>,
    /// Sleep activities of actors joining this one.
    pub joiners: Vec<ActivityRef>,
    pub code: ActorCode,
    pub future: Option<ActorFuture>,
}

impl ActorImpl {
    pub fn new(id: ActorId, args: ActorArgs, parent: Option<ActorId>) -> Self {
        ActorImpl {
            id,
            name: args.name,
            host: args.host,
            parent,
            state: ActorState::Runnable,
            parked: false,
            blocking: Vec::new(),
            seq: 0,
            timeout_timer: None,
            pending_error: None,
            woken_by: None,
            activities: BTreeSet::new(),
            daemon: args.daemon,
            auto_restart: args.auto_restart,
            kill_time: args.kill_time,
            kill_timer: None,
            on_exit: Vec::new(),
            joiners: Vec::new(),
            code: args.code,
            future: None,
        }
    }

    /// Neither dying nor dead.
    pub fn is_alive(&self) -> bool {
        matches!(self.state, ActorState::Runnable | ActorState::Suspended)
    }

    pub fn args(&self) -> ActorArgs {
        ActorArgs {
            name: self.name.clone(),
            host: self.host,
            code: Rc::clone(&self.code),
            daemon: self.daemon,
            auto_restart: self.auto_restart,
            kill_time: self.kill_time,
        }
    }
}

impl std::fmt::Debug for ActorImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorImpl")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("state", &self.state)
            .field("parked", &self.parked)
            .field("blocking", &self.blocking.len())
            .field("daemon", &self.daemon)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformBuilder;

    fn args() -> ActorArgs {
        let host = PlatformBuilder::new()
            .host("h", 1.0)
            .build()
            .unwrap()
            .host_by_name("h")
            .unwrap();
        ActorArgs::new("worker", host, boxed_code(|_ctx| async { Ok(()) }))
    }

    #[test]
    fn test_new_actor_is_runnable() {
        let a = ActorImpl::new(ActorId::new(0), args(), None);
        assert_eq!(a.state, ActorState::Runnable);
        assert!(a.is_alive());
        assert!(!a.parked);
        assert!(a.future.is_none());
    }

    #[test]
    fn test_args_round_trip_flags() {
        let mut base = args();
        base.daemon = true;
        base.kill_time = Some(SimTime::new(3.0));
        let mut a = ActorImpl::new(ActorId::new(1), base, Some(ActorId::new(0)));
        a.auto_restart = true;
        let again = a.args();
        assert_eq!(again.name, "worker");
        assert!(again.daemon);
        assert!(again.auto_restart);
        assert_eq!(again.kill_time, Some(SimTime::new(3.0)));
    }

    #[test]
    fn test_dying_is_not_alive() {
        let mut a = ActorImpl::new(ActorId::new(0), args(), None);
        a.state = ActorState::Dying;
        assert!(!a.is_alive());
        assert_eq!(a.state.to_string(), "dying");
    }
}
