//! Activity transitions: start, match, finish, block and wake.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::activity::{
    ActivityId, ActivityImpl, ActivityKind, ActivityRef, ActivityState, CommRole, FailureCause,
    IoOp,
};
use crate::actor::{ActorId, ActorState};
use crate::error::{KernelError, SimError, SimResult};
use crate::event::TimerKind;
use crate::model::{Demand, Outcome};
use crate::platform::ResourceId;
use crate::trace::TraceEvent;

use super::Kernel;

/// Result of trying to block an actor on a set of activities.
pub(crate) enum BlockOutcome {
    /// No need to block. Carries the activity that is already terminal, if
    /// any, and the outcome to return.
    Ready(Option<ActivityId>, SimResult<()>),
    /// The actor is parked; the answer is collected with
    /// [`Kernel::take_resumption`] once it runs again.
    Parked,
}

impl Kernel {
    pub(crate) fn new_activity(
        &mut self,
        name: &str,
        kind: ActivityKind,
        issuer: Option<ActorId>,
    ) -> ActivityRef {
        let id = ActivityId::new(self.next_activity);
        self.next_activity += 1;
        Rc::new(RefCell::new(ActivityImpl::new(id, name.to_string(), kind, issuer)))
    }

    fn unknown(resource: ResourceId) -> KernelError {
        KernelError::UnknownResource(resource.to_string())
    }

    /// Start an `Inited` activity.
    ///
    /// Returns the object to track from now on: a communication that
    /// matches a pending counterpart resolves to the shared one.
    pub(crate) fn start_activity(&mut self, act: &ActivityRef) -> SimResult<ActivityRef> {
        let (id, state) = {
            let a = act.borrow();
            (a.id, a.state)
        };
        if state != ActivityState::Inited {
            return Err(KernelError::AlreadyStarted(id).into());
        }

        if act.borrow().comm().is_some() {
            return self.start_comm(act);
        }

        let (resource, demand) = {
            let a = act.borrow();
            match &a.kind {
                ActivityKind::Exec(e) => {
                    let r = ResourceId::Host(e.host);
                    let host = self.platform.host(e.host).ok_or_else(|| Self::unknown(r))?;
                    (r, Demand::work(e.flops, host.speed))
                }
                // A sleep is `duration` units of work at one unit per second.
                ActivityKind::Sleep(s) => (ResourceId::Host(s.host), Demand::work(s.duration, 1.0)),
                ActivityKind::Comm(_) => return Err(KernelError::AlreadyStarted(id).into()),
                ActivityKind::Io(io) => {
                    let r = ResourceId::Disk(io.disk);
                    let disk = self.platform.disk(io.disk).ok_or_else(|| Self::unknown(r))?;
                    let rate = match io.op {
                        IoOp::Read => disk.read_bandwidth,
                        IoOp::Write => disk.write_bandwidth,
                    };
                    (r, Demand::work(io.size, rate))
                }
            }
        };

        self.register(act, vec![resource]);
        if !self.platform.is_on(resource) {
            self.fail_on(act, resource);
            return Ok(Rc::clone(act));
        }
        self.model.start_action(self.now, id, demand);
        let suspended = {
            let mut a = act.borrow_mut();
            a.in_model = true;
            a.suspended
        };
        if suspended {
            self.model.suspend_action(self.now, id);
        }
        Ok(Rc::clone(act))
    }

    /// Mark `act` Started and track it in the registry and in its
    /// issuer's activity set.
    fn register(&mut self, act: &ActivityRef, resources: Vec<ResourceId>) {
        let (id, kind, issuer, detached) = {
            let mut a = act.borrow_mut();
            a.state = ActivityState::Started;
            a.resources = resources;
            a.start_time = Some(self.now);
            (a.id, a.activity_type(), a.issuer, a.detached)
        };
        self.registry.insert(id, Rc::clone(act));
        if let Some(issuer) = issuer.filter(|_| !detached) {
            if let Some(actor) = self.actors.get_mut(&issuer) {
                actor.activities.insert(id);
            }
        }
        debug!(activity = %id, kind = %kind, time = %self.now, "activity started");
        self.record(TraceEvent::ActivityStarted { activity: id, kind });
    }

    /// Forget a mailbox once nothing is pending on it.
    fn prune_mailbox(&mut self, name: &str) {
        if self.mailboxes.get(name).is_some_and(|mb| mb.is_empty()) {
            self.mailboxes.remove(name);
        }
    }

    fn start_comm(&mut self, act: &ActivityRef) -> SimResult<ActivityRef> {
        let (id, role, mailbox, issuer, detached) = {
            let a = act.borrow();
            let role = a
                .comm_role()
                .ok_or_else(|| KernelError::AlreadyStarted(a.id))?;
            let mailbox = a.comm().map(|c| c.mailbox.clone()).unwrap_or_default();
            (a.id, role, mailbox, a.issuer, a.detached)
        };
        self.register(act, Vec::new());

        let peer = self
            .mailboxes
            .get_mut(&mailbox)
            .and_then(|mb| mb.take_match(role.opposite()));
        self.prune_mailbox(&mailbox);
        let Some(peer) = peer else {
            self.mailboxes.entry(mailbox.clone()).or_default().push(Rc::clone(act));
            trace!(activity = %id, mailbox = %mailbox, "comm queued");
            return Ok(Rc::clone(act));
        };

        // Fold this side into the pending counterpart and forward to it.
        let peer_id = {
            let mut mine = act.borrow_mut();
            let mut theirs = peer.borrow_mut();
            theirs.detached |= mine.detached;
            theirs.suspended |= mine.suspended;
            if let (Some(m), Some(t)) = (mine.comm_mut(), theirs.comm_mut()) {
                match role {
                    CommRole::Send => {
                        t.src = m.src;
                        t.size = m.size;
                        t.payload = m.payload.take();
                    }
                    CommRole::Recv => t.dst = m.dst,
                }
            }
            mine.merged_into = Some(Rc::clone(&peer));
            theirs.id
        };
        self.registry.remove(&id);
        if let Some(actor) = issuer.and_then(|i| self.actors.get_mut(&i)) {
            actor.activities.remove(&id);
            if !detached {
                actor.activities.insert(peer_id);
            }
        }
        debug!(activity = %peer_id, mailbox = %mailbox, time = %self.now, "comm matched");
        self.begin_transfer(&peer);
        Ok(peer)
    }

    /// Start the model action of a matched communication.
    fn begin_transfer(&mut self, comm: &ActivityRef) {
        let (id, src, dst, size, suspended) = {
            let a = comm.borrow();
            let Some(c) = a.comm() else { return };
            let (Some(src), Some(dst)) = (c.src, c.dst) else {
                return;
            };
            (a.id, src, dst, c.size, a.suspended)
        };

        let Some(links) = self.platform.route(src.host, dst.host).map(<[_]>::to_vec) else {
            let from = self.platform.name_of(ResourceId::Host(src.host)).to_string();
            let to = self.platform.name_of(ResourceId::Host(dst.host)).to_string();
            warn!(activity = %id, from = %from, to = %to, "no route between the comm ends");
            self.finish_activity(
                comm,
                ActivityState::Failed,
                Some(FailureCause::NoRoute { from, to }),
            );
            return;
        };
        let mut resources = vec![ResourceId::Host(src.host)];
        if dst.host != src.host {
            resources.push(ResourceId::Host(dst.host));
        }
        resources.extend(links.iter().map(|l| ResourceId::Link(*l)));
        let latency: f64 = links
            .iter()
            .filter_map(|l| self.platform.link(*l))
            .map(|l| l.latency)
            .sum();
        let rate = links
            .iter()
            .filter_map(|l| self.platform.link(*l))
            .map(|l| l.bandwidth)
            .fold(f64::INFINITY, f64::min);
        comm.borrow_mut().resources = resources.clone();

        if let Some(off) = resources.iter().copied().find(|r| !self.platform.is_on(*r)) {
            self.fail_on(comm, off);
            return;
        }
        self.model
            .start_action(self.now, id, Demand::work(size, rate).with_latency(latency));
        let party_suspended = [src.actor, dst.actor].iter().any(|p| {
            self.actors
                .get(p)
                .is_some_and(|a| a.state == ActorState::Suspended)
        });
        let mut a = comm.borrow_mut();
        a.in_model = true;
        if suspended || party_suspended {
            a.suspended = true;
            self.model.suspend_action(self.now, id);
        }
    }

    /// Fail `act` because `resource` is off.
    pub(crate) fn fail_on(&mut self, act: &ActivityRef, resource: ResourceId) {
        let name = self.platform.name_of(resource).to_string();
        self.finish_activity(
            act,
            ActivityState::Failed,
            Some(FailureCause::ResourceOff { resource, name }),
        );
    }

    /// Move `act` to a terminal state and answer every waiter once.
    /// No-op if it already is terminal.
    pub(crate) fn finish_activity(
        &mut self,
        act: &ActivityRef,
        state: ActivityState,
        cause: Option<FailureCause>,
    ) {
        let (id, kind, waiters, parties, mailbox) = {
            let mut a = act.borrow_mut();
            if a.state.is_terminal() {
                return;
            }
            a.state = state;
            a.failure = cause;
            a.finish_time = Some(self.now);
            a.in_model = false;
            let mailbox = a
                .comm()
                .filter(|c| !c.is_matched())
                .map(|c| c.mailbox.clone());
            (
                a.id,
                a.activity_type(),
                std::mem::take(&mut a.waiters),
                a.parties(),
                mailbox,
            )
        };

        self.model.cancel_action(id);
        self.registry.remove(&id);
        for party in parties {
            if let Some(actor) = self.actors.get_mut(&party) {
                actor.activities.remove(&id);
            }
        }
        if let Some(m) = mailbox {
            if let Some(mb) = self.mailboxes.get_mut(&m) {
                mb.remove(id);
            }
            self.prune_mailbox(&m);
        }

        debug!(activity = %id, kind = %kind, state = %state, time = %self.now, "activity terminated");
        self.record(TraceEvent::ActivityEnded {
            activity: id,
            kind,
            state,
        });
        for waiter in waiters {
            self.answer(waiter, act);
        }
    }

    /// Deliver the outcome of `act` to one waiting actor and wake it.
    fn answer(&mut self, waiter: ActorId, act: &ActivityRef) {
        let (id, err) = {
            let a = act.borrow();
            (a.id, a.error_for(waiter))
        };
        let blocking = match self.actors.get_mut(&waiter) {
            Some(actor) if actor.is_alive() => std::mem::take(&mut actor.blocking),
            _ => return,
        };
        // A wait-any is answered once: leave the other activities.
        for other in blocking.iter().filter(|o| !Rc::ptr_eq(o, act)) {
            other.borrow_mut().waiters.retain(|w| *w != waiter);
        }
        if let Some(actor) = self.actors.get_mut(&waiter) {
            actor.pending_error = err;
            actor.woken_by = Some(id);
        }
        self.disarm_timeout(waiter);
        trace!(actor = %waiter, activity = %id, "waiter answered");
        self.wake(waiter);
    }

    pub(crate) fn cancel_activity(&mut self, act: &ActivityRef) {
        self.finish_activity(act, ActivityState::Canceled, None);
    }

    pub(crate) fn suspend_activity(&mut self, act: &ActivityRef) {
        let mut a = act.borrow_mut();
        if a.state.is_terminal() || a.suspended {
            return;
        }
        a.suspended = true;
        if a.in_model {
            self.model.suspend_action(self.now, a.id);
        }
    }

    pub(crate) fn resume_activity(&mut self, act: &ActivityRef) {
        let mut a = act.borrow_mut();
        if a.state.is_terminal() || !a.suspended {
            return;
        }
        a.suspended = false;
        if a.in_model {
            self.model.resume_action(self.now, a.id);
        }
    }

    /// Remaining amount of work: flops, bytes or seconds depending on the
    /// kind.
    pub(crate) fn remaining(&self, act: &ActivityRef) -> Option<f64> {
        let a = act.borrow();
        let initial = match &a.kind {
            ActivityKind::Exec(e) => e.flops,
            ActivityKind::Sleep(s) => s.duration,
            ActivityKind::Io(io) => io.size,
            ActivityKind::Comm(c) => c.size,
        };
        match a.state {
            ActivityState::Inited => Some(initial),
            ActivityState::Started if a.in_model => self.model.remaining(self.now, a.id),
            ActivityState::Started => Some(initial),
            ActivityState::Finished => Some(0.0),
            ActivityState::Failed | ActivityState::Canceled => None,
        }
    }

    /// Block `me` until one of `acts` terminates (or `timeout` elapses).
    pub(crate) fn block_on(
        &mut self,
        me: ActorId,
        acts: &[ActivityRef],
        timeout: Option<f64>,
    ) -> BlockOutcome {
        let pending = match self.actors.get_mut(&me) {
            Some(actor) => actor.pending_error.take(),
            None => return BlockOutcome::Ready(None, Err(KernelError::UnknownActor(me).into())),
        };
        if let Some(err) = pending {
            return BlockOutcome::Ready(None, Err(err));
        }
        for act in acts {
            let a = act.borrow();
            if a.state.is_terminal() {
                let result = a.error_for(me).map_or(Ok(()), Err);
                return BlockOutcome::Ready(Some(a.id), result);
            }
        }
        if acts.is_empty() {
            return BlockOutcome::Ready(None, Ok(()));
        }
        if timeout.is_some_and(|t| t <= 0.0) {
            return BlockOutcome::Ready(None, Err(SimError::Timeout));
        }

        for act in acts {
            act.borrow_mut().waiters.push(me);
        }
        let seq = match self.actors.get_mut(&me) {
            Some(actor) => {
                actor.blocking = acts.to_vec();
                actor.parked = true;
                actor.seq += 1;
                actor.seq
            }
            None => return BlockOutcome::Parked,
        };
        if let Some(t) = timeout.filter(|t| t.is_finite()) {
            let timer = self
                .timers
                .schedule(self.now.plus(t), TimerKind::WaitTimeout { actor: me, seq });
            if let Some(actor) = self.actors.get_mut(&me) {
                actor.timeout_timer = Some(timer);
            }
        }
        trace!(actor = %me, count = acts.len(), time = %self.now, "actor blocked");
        BlockOutcome::Parked
    }

    /// Collect what woke `me` up: the activity, and the error to raise.
    pub(crate) fn take_resumption(&mut self, me: ActorId) -> (Option<ActivityId>, SimResult<()>) {
        self.disarm_timeout(me);
        match self.actors.get_mut(&me) {
            Some(actor) => {
                let woken_by = actor.woken_by.take();
                match actor.pending_error.take() {
                    Some(err) => (woken_by, Err(err)),
                    None => (woken_by, Ok(())),
                }
            }
            None => (None, Err(KernelError::UnknownActor(me).into())),
        }
    }

    /// A `wait_for` deadline was reached.
    pub(crate) fn expire_wait(&mut self, me: ActorId, seq: u64) {
        let blocking = match self.actors.get_mut(&me) {
            Some(a) if a.is_alive() && a.parked && a.seq == seq && !a.blocking.is_empty() => {
                a.pending_error = Some(SimError::Timeout);
                a.woken_by = None;
                a.timeout_timer = None;
                std::mem::take(&mut a.blocking)
            }
            _ => return,
        };
        for act in blocking {
            act.borrow_mut().waiters.retain(|w| *w != me);
        }
        debug!(actor = %me, time = %self.now, "wait timed out");
        self.wake(me);
    }

    pub(crate) fn on_model_outcome(&mut self, id: ActivityId, outcome: Outcome) {
        let Some(act) = self.registry.get(&id).cloned() else {
            return;
        };
        match outcome {
            Outcome::Finished => self.finish_activity(&act, ActivityState::Finished, None),
            Outcome::Failed(kind) => {
                self.finish_activity(&act, ActivityState::Failed, Some(FailureCause::Model(kind)))
            }
        }
    }

    /// Abort the outstanding activities of an actor that is going away.
    /// A matched communication fails towards the peer; anything else is
    /// canceled.
    pub(crate) fn abort_activities(&mut self, victim: ActorId, ids: Vec<ActivityId>) {
        let doomed: BTreeMap<ActivityId, ActivityRef> = ids
            .into_iter()
            .filter_map(|id| self.registry.get(&id).map(|a| (id, Rc::clone(a))))
            .collect();
        for act in doomed.into_values() {
            let matched = act.borrow().comm().is_some_and(|c| c.is_matched());
            if matched {
                self.finish_activity(
                    &act,
                    ActivityState::Failed,
                    Some(FailureCause::PeerKilled(victim)),
                );
            } else {
                self.cancel_activity(&act);
            }
        }
    }
}
