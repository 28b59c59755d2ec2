//! Runtime — drives actors, the clock and the resource model.
//!
//! One `Runtime` owns one kernel. There are no globals: several runtimes
//! can coexist in the same thread, each fully deterministic.
//!
//! ## Scheduling
//!
//! A round takes the list of runnable actors, sorts it by [`ActorId`],
//! and polls each actor until its next kernel await point (or reaps it if
//! it was killed). Actors woken meanwhile go to the next list. Actors
//! reaped during the round are dropped from the table when it ends.
//! Once nobody is runnable, the clock jumps to the next model completion
//! or timer, whichever comes first.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::task::noop_waker;
use tracing::{debug, info, warn};

use crate::actor::{
    boxed_code, ActorArgs, ActorCode, ActorContext, ActorFuture, ActorId, ActorState,
};
use crate::config::RuntimeConfig;
use crate::error::{KernelError, SimError, SimResult};
use crate::kernel::{Kernel, KernelRef};
use crate::model::{FixedRateModel, ResourceModel};
use crate::platform::{DiskId, HostId, LinkId, Platform, ResourceId};
use crate::time::SimTime;
use crate::trace::{self, TraceEntry};


/// Owns and runs a simulation.
///
/// # Example
/// ```rust
/// use actorsim::platform::PlatformBuilder;
/// use actorsim::runtime::Runtime;
///
/// let platform = PlatformBuilder::new()
///     .host("alice", 1e9)
///     .host("bob", 1e9)
///     .link("l", 1e6, 0.5)
///     .route("alice", "bob", &["l"])
///     .build()
///     .unwrap();
/// let (alice, bob) = (
///     platform.host_by_name("alice").unwrap(),
///     platform.host_by_name("bob").unwrap(),
/// );
///
/// let mut rt = Runtime::new(platform);
/// rt.create("sender", alice, |ctx| async move {
///     ctx.put("mb", "hello", 1e6).await
/// })
/// .unwrap();
/// rt.create("receiver", bob, |ctx| async move {
///     let msg = ctx.get("mb").await?;
///     assert_eq!(msg.as_text(), Some("hello"));
///     Ok(())
/// })
/// .unwrap();
/// rt.run().unwrap();
/// assert_eq!(rt.now().secs(), 1.5);
/// ```
pub struct Runtime {
    kernel: KernelRef,
}

impl Runtime {
    /// A runtime with the default configuration and the fixed-rate model.
    pub fn new(platform: Platform) -> Self {
        Self::with_config(platform, RuntimeConfig::default())
    }

    pub fn with_config(platform: Platform, config: RuntimeConfig) -> Self {
        Self::with_model(platform, Box::new(FixedRateModel::new()), config)
    }

    /// A runtime driving a custom resource model.
    pub fn with_model(
        platform: Platform,
        model: Box<dyn ResourceModel>,
        config: RuntimeConfig,
    ) -> Self {
        Runtime {
            kernel: Rc::new(RefCell::new(Kernel::new(platform, model, config))),
        }
    }

    // ── Platform lookups ──────────────────────────────────────────────

    pub fn host(&self, name: &str) -> SimResult<HostId> {
        self.kernel
            .borrow()
            .platform
            .host_by_name(name)
            .ok_or_else(|| KernelError::UnknownResource(name.to_string()).into())
    }

    pub fn link(&self, name: &str) -> SimResult<LinkId> {
        self.kernel
            .borrow()
            .platform
            .link_by_name(name)
            .ok_or_else(|| KernelError::UnknownResource(name.to_string()).into())
    }

    pub fn disk(&self, name: &str) -> SimResult<DiskId> {
        self.kernel
            .borrow()
            .platform
            .disk_by_name(name)
            .ok_or_else(|| KernelError::UnknownResource(name.to_string()).into())
    }

    // ── Actor control ─────────────────────────────────────────────────

    /// Create an actor on `host`. It first runs at the next round.
    pub fn create<F, Fut>(&self, name: &str, host: HostId, code: F) -> SimResult<ActorId>
    where
        F: Fn(ActorContext) -> Fut + 'static,
        Fut: Future<Output = SimResult<()>> + 'static,
    {
        let args = ActorArgs::new(name, host, boxed_code(code));
        self.kernel.borrow_mut().spawn(args, None)
    }

    /// Kill `target`. Idempotent.
    pub fn kill(&self, target: ActorId) {
        self.kernel.borrow_mut().kill_actor(target, None);
    }

    pub fn kill_all(&self) {
        self.kernel.borrow_mut().kill_all(None);
    }

    pub fn suspend(&self, target: ActorId) -> SimResult<()> {
        self.kernel.borrow_mut().suspend_actor(target)?;
        Ok(())
    }

    pub fn resume(&self, target: ActorId) -> SimResult<()> {
        self.kernel.borrow_mut().resume_actor(target)?;
        Ok(())
    }

    pub fn daemonize(&self, target: ActorId) -> SimResult<()> {
        self.kernel.borrow_mut().daemonize(target)?;
        Ok(())
    }

    pub fn undaemonize(&self, target: ActorId) -> SimResult<()> {
        self.kernel.borrow_mut().undaemonize(target)?;
        Ok(())
    }

    pub fn migrate(&self, target: ActorId, host: HostId) -> SimResult<()> {
        self.kernel.borrow_mut().migrate(target, host)
    }

    pub fn on_exit(&self, target: ActorId, hook: impl FnOnce(bool) + 'static) -> SimResult<()> {
        self.kernel
            .borrow_mut()
            .add_exit_hook(target, Box::new(hook))?;
        Ok(())
    }

    pub fn throw_exception(&self, target: ActorId, error: SimError) -> SimResult<()> {
        self.kernel.borrow_mut().throw_to(target, error)?;
        Ok(())
    }

    pub fn restart(&self, target: ActorId) -> SimResult<ActorId> {
        self.kernel.borrow_mut().restart_actor(target, None)
    }

    pub fn set_kill_time(&self, target: ActorId, at: f64) -> SimResult<()> {
        self.kernel
            .borrow_mut()
            .set_kill_time(target, SimTime::new(at))?;
        Ok(())
    }

    pub fn set_auto_restart(&self, target: ActorId, auto: bool) -> SimResult<()> {
        self.kernel.borrow_mut().set_auto_restart(target, auto)?;
        Ok(())
    }

    // ── Resources ─────────────────────────────────────────────────────

    pub fn turn_off(&self, resource: impl Into<ResourceId>) -> SimResult<()> {
        self.kernel.borrow_mut().turn_off(resource.into())?;
        Ok(())
    }

    pub fn turn_on(&self, resource: impl Into<ResourceId>) -> SimResult<()> {
        self.kernel.borrow_mut().turn_on(resource.into())
    }

    pub fn is_on(&self, resource: impl Into<ResourceId>) -> bool {
        self.kernel.borrow().platform.is_on(resource.into())
    }

    /// Turn `resource` off at date `at`.
    pub fn schedule_turn_off(&self, resource: impl Into<ResourceId>, at: f64) -> SimResult<()> {
        self.kernel
            .borrow_mut()
            .schedule_state(resource.into(), SimTime::new(at), false)?;
        Ok(())
    }

    /// Turn `resource` back on at date `at`.
    pub fn schedule_turn_on(&self, resource: impl Into<ResourceId>, at: f64) -> SimResult<()> {
        self.kernel
            .borrow_mut()
            .schedule_state(resource.into(), SimTime::new(at), true)?;
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────

    pub fn now(&self) -> SimTime {
        self.kernel.borrow().now
    }

    pub fn is_alive(&self, target: ActorId) -> bool {
        self.kernel.borrow().is_alive(target)
    }

    /// State of `target`, or `None` once it has been destroyed.
    pub fn actor_state(&self, target: ActorId) -> Option<ActorState> {
        self.kernel.borrow().actors.get(&target).map(|a| a.state)
    }

    /// Number of actors still in the table.
    pub fn actor_count(&self) -> usize {
        self.kernel.borrow().actors.len()
    }

    /// Started activities that have not reached a terminal state.
    pub fn pending_activities(&self) -> usize {
        self.kernel.borrow().registry.len()
    }

    /// Unmatched communications waiting in `mailbox`.
    pub fn mailbox_len(&self, mailbox: &str) -> usize {
        self.kernel
            .borrow()
            .mailboxes
            .get(mailbox)
            .map_or(0, |m| m.len())
    }

    pub fn trace(&self) -> Vec<TraceEntry> {
        self.kernel.borrow().trace.clone()
    }

    /// Deterministic digest of the trace; equal across identical runs.
    pub fn trace_hash(&self) -> u64 {
        trace::trace_hash(&self.kernel.borrow().trace)
    }

    /// Export the trace as a JSON array string.
    #[cfg(feature = "serialize")]
    pub fn trace_json(&self) -> String {
        serde_json::to_string_pretty(&self.kernel.borrow().trace).unwrap_or_else(|_| "[]".into())
    }

    // ── Execution ─────────────────────────────────────────────────────

    /// Run until quiescence.
    ///
    /// Non-daemon actors still blocked at that point are killed and
    /// reported as a deadlock (an error when `strict_deadlock` is set).
    pub fn run(&mut self) -> SimResult<()> {
        info!(time = %self.now(), "simulation started");
        loop {
            self.run_rounds();
            let next = self.kernel.borrow().next_date();
            match next {
                Some(date) => self.kernel.borrow_mut().advance_to(date),
                None => break,
            }
        }
        self.finish()
    }

    /// Run until date `until`, then stop without any quiescence check.
    pub fn run_until(&mut self, until: f64) {
        let until = SimTime::new(until);
        loop {
            self.run_rounds();
            let (next, precision) = {
                let k = self.kernel.borrow();
                (k.next_date(), k.config.precision)
            };
            match next {
                Some(date) if date.secs() <= until.secs() + precision => {
                    self.kernel.borrow_mut().advance_to(date);
                }
                _ => break,
            }
        }
        let mut k = self.kernel.borrow_mut();
        if k.now < until {
            k.now = until;
        }
    }

    /// Kill every remaining actor and reap it.
    pub fn shutdown(&mut self) {
        self.kill_all();
        self.run_rounds();
    }

    fn finish(&mut self) -> SimResult<()> {
        let (blocked, strict) = {
            let k = self.kernel.borrow();
            let blocked: Vec<ActorId> = k
                .actors
                .values()
                .filter(|a| a.is_alive() && !a.daemon)
                .map(|a| a.id)
                .collect();
            (blocked, k.config.strict_deadlock)
        };
        self.shutdown();
        let now = self.now();
        if blocked.is_empty() {
            info!(time = %now, "simulation finished");
            return Ok(());
        }
        warn!(time = %now, count = blocked.len(), "deadlock: actors still blocked at quiescence");
        if strict {
            Err(KernelError::Deadlock { blocked }.into())
        } else {
            Ok(())
        }
    }

    /// Run rounds until nobody is runnable.
    fn run_rounds(&mut self) {
        while self.run_round() {}
    }

    /// One scheduling round. Returns `false` if nobody was runnable.
    fn run_round(&mut self) -> bool {
        let batch = {
            let mut k = self.kernel.borrow_mut();
            let mut batch = std::mem::take(&mut k.to_run);
            batch.sort();
            batch.dedup();
            batch
        };
        if batch.is_empty() {
            return false;
        }
        for id in batch {
            self.run_actor(id);
        }
        self.kernel.borrow_mut().flush_destroyed();
        true
    }

    fn run_actor(&self, id: ActorId) {
        enum Step {
            Skip,
            Reap,
            Poll(Option<ActorFuture>, ActorCode, HostId),
        }

        let step = {
            let mut k = self.kernel.borrow_mut();
            match k.actors.get_mut(&id) {
                None => Step::Skip,
                Some(actor) => match actor.state {
                    ActorState::Dead => Step::Skip,
                    ActorState::Dying => Step::Reap,
                    ActorState::Suspended => {
                        actor.parked = true;
                        Step::Skip
                    }
                    ActorState::Runnable if actor.parked => Step::Skip,
                    ActorState::Runnable => Step::Poll(
                        actor.future.take(),
                        Rc::clone(&actor.code),
                        actor.host,
                    ),
                },
            }
        };

        let (future, code, host) = match step {
            Step::Skip => return,
            Step::Reap => return self.reap(id, true),
            Step::Poll(future, code, host) => (future, code, host),
        };
        let mut future =
            future.unwrap_or_else(|| code(ActorContext::new(id, host, Rc::clone(&self.kernel))));
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        match future.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(())) => {
                drop(future);
                self.reap(id, false);
            }
            Poll::Ready(Err(err)) => {
                warn!(actor = %id, error = %err, "actor terminated with an error");
                drop(future);
                self.reap(id, true);
            }
            Poll::Pending => {
                let mut k = self.kernel.borrow_mut();
                let queued = k.to_run.contains(&id);
                if let Some(actor) = k.actors.get_mut(&id) {
                    if actor.is_alive() && !actor.parked && !queued {
                        warn!(actor = %id, "actor awaited a future the kernel does not drive");
                        actor.parked = true;
                    }
                    actor.future = Some(future);
                }
            }
        }
    }

    /// Terminate `id`: drop its future, run its exit hooks, release the
    /// actors joining it.
    fn reap(&self, id: ActorId, failed: bool) {
        let reaped = self.kernel.borrow_mut().begin_reap(id, failed);
        let Some(reaped) = reaped else { return };
        drop(reaped.future);
        for hook in reaped.hooks {
            hook(reaped.failed);
        }
        self.kernel.borrow_mut().end_reap(id);
        debug!(actor = %id, "actor reaped");
    }
}

impl Drop for Runtime {
    /// Actor futures hold contexts that point back at the kernel; drop
    /// them so the kernel itself can be freed.
    fn drop(&mut self) {
        let actors = match self.kernel.try_borrow_mut() {
            Ok(mut k) => std::mem::take(&mut k.actors),
            Err(_) => return,
        };
        drop(actors);
    }
}
