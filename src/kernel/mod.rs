//! The execution kernel: the single owner of actors, activities, the
//! clock and the resource model.
//!
//! Everything here is synchronous. Actor futures reach the kernel through
//! their [`ActorContext`](crate::actor::ActorContext), mutate it inside a
//! short `RefCell` borrow, and park; the [`Runtime`](crate::runtime::Runtime)
//! drives the rounds and the clock.

mod activities;
mod actors;
mod resources;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::activity::{ActivityId, ActivityRef};
use crate::actor::{ActorArgs, ActorFuture, ActorId, ActorImpl, ExitHook};
use crate::config::RuntimeConfig;
use crate::error::KernelError;
use crate::event::{TimerEvent, TimerKind};
use crate::mailbox::Mailbox;
use crate::model::ResourceModel;
use crate::platform::{HostId, Platform};
use crate::scheduler::TimerQueue;
use crate::time::SimTime;
use crate::trace::{TraceEntry, TraceEvent};

pub(crate) use activities::BlockOutcome;

pub(crate) type KernelRef = Rc<RefCell<Kernel>>;

/// What the runtime needs to finish off a terminated actor outside the
/// kernel borrow.
pub(crate) struct Reaped {
    pub future: Option<ActorFuture>,
    /// Exit hooks, already in execution order (last registered first).
    pub hooks: Vec<ExitHook>,
    pub failed: bool,
}

pub(crate) struct Kernel {
    pub config: RuntimeConfig,
    pub now: SimTime,
    /// Number of scheduling rounds completed.
    pub round: u64,
    pub platform: Platform,
    pub model: Box<dyn ResourceModel>,
    pub timers: TimerQueue,
    pub actors: BTreeMap<ActorId, ActorImpl>,
    next_actor: u64,
    next_activity: u64,
    /// Actors to run in the next sub-round.
    pub to_run: Vec<ActorId>,
    /// Actors reaped in this round, removed from the table when it ends.
    pub to_destroy: Vec<ActorId>,
    /// Every started, non-terminal activity.
    pub registry: BTreeMap<ActivityId, ActivityRef>,
    pub mailboxes: BTreeMap<String, Mailbox>,
    /// Auto-restart actors waiting for their host to come back on.
    pub boot_list: BTreeMap<HostId, Vec<ActorArgs>>,
    pub trace: Vec<TraceEntry>,
}

impl Kernel {
    pub fn new(platform: Platform, model: Box<dyn ResourceModel>, config: RuntimeConfig) -> Self {
        Kernel {
            config,
            now: SimTime::ZERO,
            round: 0,
            platform,
            model,
            timers: TimerQueue::new(),
            actors: BTreeMap::new(),
            next_actor: 0,
            next_activity: 0,
            to_run: Vec::new(),
            to_destroy: Vec::new(),
            registry: BTreeMap::new(),
            mailboxes: BTreeMap::new(),
            boot_list: BTreeMap::new(),
            trace: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, event: TraceEvent) {
        if self.config.record_trace {
            self.trace.push(TraceEntry {
                time: self.now,
                round: self.round,
                event,
            });
        }
    }

    pub(crate) fn actor(&self, id: ActorId) -> Result<&ActorImpl, KernelError> {
        self.actors.get(&id).ok_or(KernelError::UnknownActor(id))
    }

    pub(crate) fn actor_mut(&mut self, id: ActorId) -> Result<&mut ActorImpl, KernelError> {
        self.actors.get_mut(&id).ok_or(KernelError::UnknownActor(id))
    }

    pub(crate) fn is_alive(&self, id: ActorId) -> bool {
        self.actors.get(&id).is_some_and(ActorImpl::is_alive)
    }

    /// Unpark `id` so it runs in the next sub-round.
    pub(crate) fn wake(&mut self, id: ActorId) {
        if let Some(actor) = self.actors.get_mut(&id) {
            if actor.parked {
                actor.parked = false;
                self.to_run.push(id);
            }
        }
    }

    /// Park the calling actor without blocking on any activity.
    pub(crate) fn park(&mut self, id: ActorId) {
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.parked = true;
            actor.seq += 1;
        }
    }

    /// Withdraw the pending `wait_for` deadline of `id`, if any.
    pub(crate) fn disarm_timeout(&mut self, id: ActorId) {
        if let Some(timer) = self.actors.get_mut(&id).and_then(|a| a.timeout_timer.take()) {
            self.timers.cancel(timer);
        }
    }

    /// Withdraw the kill date of `id`, if any.
    pub(crate) fn disarm_kill_time(&mut self, id: ActorId) {
        if let Some(timer) = self.actors.get_mut(&id).and_then(|a| a.kill_timer.take()) {
            self.timers.cancel(timer);
        }
    }

    /// Earliest date at which something happens on its own. Withdrawn
    /// timers are not counted.
    pub(crate) fn next_date(&self) -> Option<SimTime> {
        let model = self.model.next_completion().filter(|t| t.is_finite());
        let timer = self.timers.next_date().filter(|t| t.is_finite());
        match (model, timer) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Jump to `date` and apply every model completion, then every timer,
    /// due at that date.
    pub(crate) fn advance_to(&mut self, date: SimTime) {
        if date > self.now {
            self.now = date;
        }
        let now = self.now;
        let precision = self.config.precision;
        trace!(time = %now, "clock advanced");

        for (id, outcome) in self.model.advance_to(now, precision) {
            self.on_model_outcome(id, outcome);
        }
        while let Some(ev) = self.timers.pop_due(now, precision) {
            self.fire_timer(ev);
        }
    }

    fn fire_timer(&mut self, ev: TimerEvent) {
        trace!(event = %ev.id, kind = %ev.kind, time = %self.now, "timer fired");
        match ev.kind {
            TimerKind::WaitTimeout { actor, seq } => self.expire_wait(actor, seq),
            TimerKind::KillActor { actor } => {
                let precision = self.config.precision;
                let due = match self.actors.get_mut(&actor) {
                    Some(a) if a.kill_timer == Some(ev.id) => {
                        a.kill_timer = None;
                        a.kill_time.is_some_and(|t| t.approx_eq(ev.at, precision))
                    }
                    _ => false,
                };
                if due {
                    self.kill_actor(actor, None);
                }
            }
            TimerKind::ResourceOff { resource } => {
                if let Err(err) = self.turn_off(resource) {
                    warn!(resource = %resource, error = %err, "scheduled turn-off failed");
                }
            }
            TimerKind::ResourceOn { resource } => {
                if let Err(err) = self.turn_on(resource) {
                    warn!(resource = %resource, error = %err, "scheduled turn-on failed");
                }
            }
        }
    }

    /// Remove the actors reaped during this round from the table.
    pub(crate) fn flush_destroyed(&mut self) {
        for id in std::mem::take(&mut self.to_destroy) {
            self.actors.remove(&id);
            trace!(actor = %id, "actor destroyed");
        }
        self.round += 1;
    }
}
