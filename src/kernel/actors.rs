//! Actor lifecycle operations.

use tracing::{debug, info, trace};

use crate::activity::{ActivityKind, ActivityRef, ActivityState, SleepSpec};
use crate::actor::{ActorArgs, ActorId, ActorImpl, ActorState, ExitHook};
use crate::error::{KernelError, SimError, SimResult};
use crate::event::TimerKind;
use crate::platform::{HostId, ResourceId};
use crate::time::SimTime;
use crate::trace::TraceEvent;

use super::{Kernel, Reaped};

impl Kernel {
    /// Register a new actor and queue it for the next sub-round. Its code
    /// does not run before that.
    pub(crate) fn spawn(&mut self, args: ActorArgs, parent: Option<ActorId>) -> SimResult<ActorId> {
        let host = self
            .platform
            .host(args.host)
            .ok_or_else(|| KernelError::UnknownResource(ResourceId::Host(args.host).to_string()))?;
        if !host.on {
            return Err(SimError::HostFailure(format!(
                "cannot create actor '{}': host {} is off",
                args.name, host.name
            )));
        }
        let host_name = host.name.clone();

        let id = ActorId::new(self.next_actor);
        self.next_actor += 1;
        let kill_time = args.kill_time;
        let name = args.name.clone();
        self.actors.insert(id, ActorImpl::new(id, args, parent));
        self.to_run.push(id);

        debug!(actor = %id, name = %name, host = %host_name, time = %self.now, "actor created");
        self.record(TraceEvent::ActorCreated {
            actor: id,
            name,
            host: host_name,
        });
        if let Some(t) = kill_time {
            self.set_kill_time(id, t)?;
        }
        Ok(id)
    }

    /// Kill `target`. Idempotent; the killer keeps running.
    ///
    /// The target never resumes: its error slot is cleared, the activities
    /// it issued or was blocked on are aborted, and it is queued so the
    /// runtime reaps it in the next sub-round.
    pub(crate) fn kill_actor(&mut self, target: ActorId, by: Option<ActorId>) {
        let (blocking, issued) = match self.actors.get_mut(&target) {
            Some(actor) if actor.is_alive() => {
                actor.state = ActorState::Dying;
                actor.pending_error = None;
                actor.woken_by = None;
                actor.parked = false;
                (
                    std::mem::take(&mut actor.blocking),
                    std::mem::take(&mut actor.activities),
                )
            }
            Some(_) => {
                trace!(actor = %target, "already dying");
                return;
            }
            None => {
                trace!(actor = %target, "kill of an unknown actor ignored");
                return;
            }
        };

        self.disarm_timeout(target);
        match by {
            Some(killer) => debug!(actor = %target, killer = %killer, time = %self.now, "actor killed"),
            None => debug!(actor = %target, time = %self.now, "actor killed by the kernel"),
        }
        self.record(TraceEvent::ActorKilled { actor: target, by });

        // What it was blocked on goes down with it, even if another actor
        // issued it.
        let mut doomed: Vec<_> = issued.into_iter().collect();
        for act in &blocking {
            let mut a = act.borrow_mut();
            a.waiters.retain(|w| *w != target);
            doomed.push(a.id);
        }
        self.abort_activities(target, doomed);
        self.to_run.push(target);
    }

    /// Kill every live actor except `keep`.
    pub(crate) fn kill_all(&mut self, keep: Option<ActorId>) {
        let victims: Vec<ActorId> = self
            .actors
            .values()
            .filter(|a| a.is_alive() && Some(a.id) != keep)
            .map(|a| a.id)
            .collect();
        for id in victims {
            self.kill_actor(id, keep);
        }
    }

    /// First half of termination: mark the actor dead and hand its future
    /// and exit hooks to the runtime.
    pub(crate) fn begin_reap(&mut self, id: ActorId, failed: bool) -> Option<Reaped> {
        let actor = self.actors.get_mut(&id)?;
        if actor.state == ActorState::Dead {
            return None;
        }
        let failed = failed || actor.state == ActorState::Dying;
        actor.state = ActorState::Dead;
        actor.parked = false;
        let future = actor.future.take();
        let mut hooks = std::mem::take(&mut actor.on_exit);
        hooks.reverse();
        let blocking = std::mem::take(&mut actor.blocking);
        let issued: Vec<_> = std::mem::take(&mut actor.activities).into_iter().collect();

        for act in &blocking {
            act.borrow_mut().waiters.retain(|w| *w != id);
        }
        self.abort_activities(id, issued);
        self.disarm_timeout(id);
        self.disarm_kill_time(id);
        self.to_destroy.push(id);
        debug!(actor = %id, failed, time = %self.now, "actor terminated");
        self.record(TraceEvent::ActorTerminated { actor: id, failed });
        Some(Reaped {
            future,
            hooks,
            failed,
        })
    }

    /// Second half of termination, after the exit hooks ran: release the
    /// joiners, and kill the daemons if no regular actor is left.
    pub(crate) fn end_reap(&mut self, id: ActorId) {
        let joiners = match self.actors.get_mut(&id) {
            Some(actor) => {
                actor.daemon = false;
                std::mem::take(&mut actor.joiners)
            }
            None => Vec::new(),
        };
        for join in joiners {
            self.finish_activity(&join, ActivityState::Finished, None);
        }

        let regular_left = self.actors.values().any(|a| a.is_alive() && !a.daemon);
        if !regular_left {
            let daemons: Vec<ActorId> = self
                .actors
                .values()
                .filter(|a| a.is_alive() && a.daemon)
                .map(|a| a.id)
                .collect();
            for daemon in daemons {
                debug!(actor = %daemon, "last regular actor gone, killing daemon");
                self.kill_actor(daemon, None);
            }
        }
    }

    /// Suspend `target`. Its started activities are paused in the model;
    /// if it is not blocked, it is parked the next time the scheduler would
    /// run it.
    pub(crate) fn suspend_actor(&mut self, target: ActorId) -> Result<(), KernelError> {
        let actor = self.actor_mut(target)?;
        if actor.state != ActorState::Runnable {
            return Ok(());
        }
        actor.state = ActorState::Suspended;
        let mut acts: Vec<ActivityRef> = actor.blocking.clone();
        let ids: Vec<_> = actor.activities.iter().copied().collect();
        acts.extend(ids.iter().filter_map(|id| self.registry.get(id).cloned()));
        for act in &acts {
            self.suspend_activity(act);
        }
        debug!(actor = %target, time = %self.now, "actor suspended");
        self.record(TraceEvent::ActorSuspended { actor: target });
        Ok(())
    }

    /// Resume a suspended actor. No-op if it is not suspended.
    pub(crate) fn resume_actor(&mut self, target: ActorId) -> Result<(), KernelError> {
        let actor = self.actor_mut(target)?;
        if actor.state != ActorState::Suspended {
            return Ok(());
        }
        actor.state = ActorState::Runnable;
        let idle = actor.parked && actor.blocking.is_empty();
        let mut acts: Vec<ActivityRef> = actor.blocking.clone();
        let ids: Vec<_> = actor.activities.iter().copied().collect();
        acts.extend(ids.iter().filter_map(|id| self.registry.get(id).cloned()));
        for act in &acts {
            self.resume_activity(act);
        }
        debug!(actor = %target, time = %self.now, "actor resumed");
        self.record(TraceEvent::ActorResumed { actor: target });
        if idle {
            self.wake(target);
        }
        Ok(())
    }

    /// Make `target` observe `error` at its await point.
    pub(crate) fn throw_to(&mut self, target: ActorId, error: SimError) -> Result<(), KernelError> {
        let actor = self.actor_mut(target)?;
        if !actor.is_alive() {
            return Ok(());
        }
        debug!(actor = %target, error = %error, "exception thrown to actor");
        let timer = actor.timeout_timer.take();
        actor.pending_error = Some(error);
        actor.woken_by = None;
        let suspended = actor.state == ActorState::Suspended;
        let blocking = std::mem::take(&mut actor.blocking);
        for act in &blocking {
            act.borrow_mut().waiters.retain(|w| *w != target);
        }
        if let Some(timer) = timer {
            self.timers.cancel(timer);
        }
        if suspended {
            self.resume_actor(target)?;
        }
        for act in &blocking {
            self.cancel_activity(act);
        }
        self.wake(target);
        Ok(())
    }

    /// Create the activity `issuer` waits on to join `target`. It finishes
    /// when the target terminates or after `timeout` seconds.
    pub(crate) fn join_actor(
        &mut self,
        issuer: ActorId,
        target: ActorId,
        timeout: Option<f64>,
    ) -> SimResult<ActivityRef> {
        let host = self.actor(issuer)?.host;
        let duration = timeout.unwrap_or(f64::INFINITY).max(0.0);
        let act = self.new_activity(
            "join",
            ActivityKind::Sleep(SleepSpec { host, duration }),
            Some(issuer),
        );
        let act = self.start_activity(&act)?;
        match self.actors.get_mut(&target) {
            Some(t) if t.state != ActorState::Dead => t.joiners.push(act.clone()),
            _ => self.finish_activity(&act, ActivityState::Finished, None),
        }
        Ok(act)
    }

    /// Kill `target` and create a fresh actor from the same arguments.
    pub(crate) fn restart_actor(&mut self, target: ActorId, by: Option<ActorId>) -> SimResult<ActorId> {
        let (args, parent) = {
            let actor = self.actor(target)?;
            (actor.args(), actor.parent)
        };
        info!(actor = %target, name = %args.name, time = %self.now, "restarting actor");
        self.kill_actor(target, by);
        self.spawn(args, parent)
    }

    pub(crate) fn daemonize(&mut self, target: ActorId) -> Result<(), KernelError> {
        self.actor_mut(target)?.daemon = true;
        Ok(())
    }

    /// Turn a daemon back into a regular actor.
    pub(crate) fn undaemonize(&mut self, target: ActorId) -> Result<(), KernelError> {
        self.actor_mut(target)?.daemon = false;
        Ok(())
    }

    /// Move `target` to `host`. Activities it already started stay where
    /// they are; the ones it creates from now on run on the new host, and
    /// it dies with that host.
    pub(crate) fn migrate(&mut self, target: ActorId, host: HostId) -> SimResult<()> {
        let dest = self
            .platform
            .host(host)
            .ok_or_else(|| KernelError::UnknownResource(ResourceId::Host(host).to_string()))?;
        if !dest.on {
            return Err(SimError::HostFailure(format!(
                "cannot migrate {}: host {} is off",
                target, dest.name
            )));
        }
        let name = dest.name.clone();
        let actor = self.actor_mut(target)?;
        if !actor.is_alive() || actor.host == host {
            return Ok(());
        }
        actor.host = host;
        debug!(actor = %target, host = %name, time = %self.now, "actor migrated");
        self.record(TraceEvent::ActorMigrated { actor: target, host: name });
        Ok(())
    }

    pub(crate) fn set_auto_restart(&mut self, target: ActorId, auto: bool) -> Result<(), KernelError> {
        self.actor_mut(target)?.auto_restart = auto;
        Ok(())
    }

    /// Kill `target` at date `at`, replacing any earlier kill date. Dates
    /// not after now are ignored.
    pub(crate) fn set_kill_time(&mut self, target: ActorId, at: SimTime) -> Result<(), KernelError> {
        let now = self.now;
        let actor = self.actor_mut(target)?;
        if at <= now {
            debug!(actor = %target, at = %at, "kill time in the past ignored");
            return Ok(());
        }
        actor.kill_time = Some(at);
        self.disarm_kill_time(target);
        let timer = self.timers.schedule(at, TimerKind::KillActor { actor: target });
        if let Some(actor) = self.actors.get_mut(&target) {
            actor.kill_timer = Some(timer);
        }
        Ok(())
    }

    pub(crate) fn add_exit_hook(&mut self, target: ActorId, hook: ExitHook) -> Result<(), KernelError> {
        let actor = self.actor_mut(target)?;
        if actor.state == ActorState::Dead {
            debug!(actor = %target, "exit hook on a terminated actor dropped");
            return Ok(());
        }
        actor.on_exit.push(hook);
        Ok(())
    }
}
