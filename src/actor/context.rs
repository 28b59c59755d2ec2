//! ActorContext — the handle actor code uses to talk to the kernel.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::activity::{
    resolve, Activity, ActivityId, ActivityKind, ActivityRef, ActivityState, CommEnd, CommSpec,
    ExecSpec, IoOp, IoSpec, SleepSpec,
};
use crate::error::{KernelError, SimError, SimResult};
use crate::kernel::{BlockOutcome, KernelRef};
use crate::payload::MessagePayload;
use crate::platform::{DiskId, HostId, LinkId, ResourceId};
use crate::time::SimTime;

use super::{boxed_code, ActorArgs, ActorId, ActorState};

/// Yields to the kernel exactly once.
///
/// The runtime only polls a parked actor again after the kernel woke it,
/// so the second poll is always the resumption.
struct Park {
    yielded: bool,
}

impl Future for Park {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            Poll::Pending
        }
    }
}

fn park() -> Park {
    Park { yielded: false }
}

/// Per-actor view of the simulation.
///
/// Handed to the actor body when it starts. Cloning is cheap; every clone
/// acts on behalf of the same actor.
///
/// # Example
/// ```rust
/// use actorsim::platform::PlatformBuilder;
/// use actorsim::runtime::Runtime;
///
/// let platform = PlatformBuilder::new().host("alice", 1e9).build().unwrap();
/// let alice = platform.host_by_name("alice").unwrap();
/// let mut rt = Runtime::new(platform);
/// rt.create("worker", alice, |ctx| async move {
///     ctx.exec(2e9).await?;
///     ctx.sleep_for(1.0).await?;
///     Ok(())
/// })
/// .unwrap();
/// rt.run().unwrap();
/// assert_eq!(rt.now().secs(), 3.0);
/// ```
#[derive(Clone)]
pub struct ActorContext {
    id: ActorId,
    host: HostId,
    kernel: KernelRef,
}

impl std::fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorContext")
            .field("id", &self.id)
            .field("host", &self.host)
            .finish()
    }
}

impl ActorContext {
    pub(crate) fn new(id: ActorId, host: HostId, kernel: KernelRef) -> Self {
        ActorContext { id, host, kernel }
    }

    // ── Queries ───────────────────────────────────────────────────────

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// The host this actor runs on. Follows migrations.
    pub fn host(&self) -> HostId {
        self.kernel
            .borrow()
            .actors
            .get(&self.id)
            .map_or(self.host, |a| a.host)
    }

    pub fn now(&self) -> SimTime {
        self.kernel.borrow().now
    }

    pub fn name(&self) -> String {
        self.kernel
            .borrow()
            .actors
            .get(&self.id)
            .map(|a| a.name.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self) -> Option<ActorId> {
        self.kernel.borrow().actors.get(&self.id).and_then(|a| a.parent)
    }

    pub fn host_by_name(&self, name: &str) -> SimResult<HostId> {
        self.kernel
            .borrow()
            .platform
            .host_by_name(name)
            .ok_or_else(|| KernelError::UnknownResource(name.to_string()).into())
    }

    pub fn link_by_name(&self, name: &str) -> SimResult<LinkId> {
        self.kernel
            .borrow()
            .platform
            .link_by_name(name)
            .ok_or_else(|| KernelError::UnknownResource(name.to_string()).into())
    }

    pub fn disk_by_name(&self, name: &str) -> SimResult<DiskId> {
        self.kernel
            .borrow()
            .platform
            .disk_by_name(name)
            .ok_or_else(|| KernelError::UnknownResource(name.to_string()).into())
    }

    pub fn is_on(&self, resource: impl Into<ResourceId>) -> bool {
        self.kernel.borrow().platform.is_on(resource.into())
    }

    pub fn is_alive(&self, target: ActorId) -> bool {
        self.kernel.borrow().is_alive(target)
    }

    pub fn actor_state(&self, target: ActorId) -> Option<ActorState> {
        self.kernel.borrow().actors.get(&target).map(|a| a.state)
    }

    // ── Activity construction ─────────────────────────────────────────

    fn handle(&self, inner: ActivityRef) -> Activity {
        Activity::new(inner, &self.kernel)
    }

    fn init(&self, name: &str, kind: ActivityKind) -> Activity {
        let act = self.kernel.borrow_mut().new_activity(name, kind, Some(self.id));
        self.handle(act)
    }

    fn started(&self, name: &str, kind: ActivityKind) -> SimResult<Activity> {
        let mut kernel = self.kernel.borrow_mut();
        let act = kernel.new_activity(name, kind, Some(self.id));
        let act = kernel.start_activity(&act)?;
        drop(kernel);
        Ok(self.handle(act))
    }

    /// An unstarted computation of `flops` on this actor's host.
    pub fn exec_init(&self, flops: f64) -> Activity {
        let spec = ExecSpec {
            host: self.host(),
            flops,
        };
        self.init("exec", ActivityKind::Exec(spec))
    }

    /// Start a computation without waiting for it.
    pub fn exec_async(&self, flops: f64) -> SimResult<Activity> {
        let spec = ExecSpec {
            host: self.host(),
            flops,
        };
        self.started("exec", ActivityKind::Exec(spec))
    }

    /// Compute `flops` and wait for completion.
    pub async fn exec(&self, flops: f64) -> SimResult<()> {
        let act = self.exec_async(flops)?;
        self.wait(&act).await
    }

    /// Start a sleep without waiting for it.
    pub fn sleep_async(&self, duration: f64) -> SimResult<Activity> {
        let spec = SleepSpec {
            host: self.host(),
            duration: duration.max(0.0),
        };
        self.started("sleep", ActivityKind::Sleep(spec))
    }

    pub async fn sleep_for(&self, duration: f64) -> SimResult<()> {
        let act = self.sleep_async(duration)?;
        self.wait(&act).await
    }

    /// Sleep until the given date (returns at once if it has passed).
    pub async fn sleep_until(&self, date: f64) -> SimResult<()> {
        let duration = date - self.now().secs();
        self.sleep_for(duration.max(0.0)).await
    }

    fn put_spec(&self, mailbox: &str, payload: MessagePayload, size: f64) -> ActivityKind {
        ActivityKind::Comm(CommSpec {
            mailbox: mailbox.to_string(),
            size: size.max(0.0),
            src: Some(CommEnd {
                actor: self.id,
                host: self.host(),
            }),
            dst: None,
            payload: Some(payload),
        })
    }

    fn get_spec(&self, mailbox: &str) -> ActivityKind {
        ActivityKind::Comm(CommSpec {
            mailbox: mailbox.to_string(),
            size: 0.0,
            src: None,
            dst: Some(CommEnd {
                actor: self.id,
                host: self.host(),
            }),
            payload: None,
        })
    }

    /// An unstarted send of `size` bytes carrying `payload`.
    pub fn put_init(&self, mailbox: &str, payload: impl Into<MessagePayload>, size: f64) -> Activity {
        let kind = self.put_spec(mailbox, payload.into(), size);
        self.init("put", kind)
    }

    pub fn put_async(
        &self,
        mailbox: &str,
        payload: impl Into<MessagePayload>,
        size: f64,
    ) -> SimResult<Activity> {
        let kind = self.put_spec(mailbox, payload.into(), size);
        self.started("put", kind)
    }

    pub async fn put(&self, mailbox: &str, payload: impl Into<MessagePayload>, size: f64) -> SimResult<()> {
        let act = self.put_async(mailbox, payload, size)?;
        self.wait(&act).await
    }

    /// Fire-and-forget send. Nobody can wait on the sender side; the
    /// communication cleans itself up once terminal and survives the
    /// sender's death.
    pub fn put_detached(
        &self,
        mailbox: &str,
        payload: impl Into<MessagePayload>,
        size: f64,
    ) -> SimResult<()> {
        let kind = self.put_spec(mailbox, payload.into(), size);
        let mut kernel = self.kernel.borrow_mut();
        let act = kernel.new_activity("put", kind, Some(self.id));
        act.borrow_mut().detached = true;
        kernel.start_activity(&act)?;
        Ok(())
    }

    pub fn get_init(&self, mailbox: &str) -> Activity {
        let kind = self.get_spec(mailbox);
        self.init("get", kind)
    }

    pub fn get_async(&self, mailbox: &str) -> SimResult<Activity> {
        let kind = self.get_spec(mailbox);
        self.started("get", kind)
    }

    /// Receive the next message of `mailbox`.
    pub async fn get(&self, mailbox: &str) -> SimResult<MessagePayload> {
        let act = self.get_async(mailbox)?;
        self.wait(&act).await?;
        Ok(act.take_payload().unwrap_or_default())
    }

    fn io_spec(&self, disk: DiskId, op: IoOp, size: f64) -> ActivityKind {
        ActivityKind::Io(IoSpec {
            disk,
            op,
            size: size.max(0.0),
        })
    }

    pub fn read_init(&self, disk: DiskId, size: f64) -> Activity {
        self.init("read", self.io_spec(disk, IoOp::Read, size))
    }

    pub fn read_async(&self, disk: DiskId, size: f64) -> SimResult<Activity> {
        self.started("read", self.io_spec(disk, IoOp::Read, size))
    }

    /// Read `size` bytes from `disk`.
    pub async fn read(&self, disk: DiskId, size: f64) -> SimResult<()> {
        let act = self.read_async(disk, size)?;
        self.wait(&act).await
    }

    pub fn write_init(&self, disk: DiskId, size: f64) -> Activity {
        self.init("write", self.io_spec(disk, IoOp::Write, size))
    }

    pub fn write_async(&self, disk: DiskId, size: f64) -> SimResult<Activity> {
        self.started("write", self.io_spec(disk, IoOp::Write, size))
    }

    /// Write `size` bytes to `disk`.
    pub async fn write(&self, disk: DiskId, size: f64) -> SimResult<()> {
        let act = self.write_async(disk, size)?;
        self.wait(&act).await
    }

    // ── Blocking ──────────────────────────────────────────────────────

    /// Block until one of `acts` is terminal. Inited activities are
    /// started first. Returns the activity that woke the actor, if any,
    /// along with the outcome.
    pub(crate) async fn block(
        &self,
        acts: &[ActivityRef],
        timeout: Option<f64>,
    ) -> (Option<ActivityId>, SimResult<()>) {
        let outcome = {
            let mut kernel = self.kernel.borrow_mut();
            let mut resolved = Vec::with_capacity(acts.len());
            for act in acts {
                let act = resolve(act);
                let inited = act.borrow().state == ActivityState::Inited;
                if inited {
                    match kernel.start_activity(&act) {
                        Ok(started) => resolved.push(started),
                        Err(err) => return (None, Err(err)),
                    }
                } else {
                    resolved.push(act);
                }
            }
            kernel.block_on(self.id, &resolved, timeout)
        };
        match outcome {
            BlockOutcome::Ready(id, result) => (id, result),
            BlockOutcome::Parked => {
                park().await;
                self.kernel.borrow_mut().take_resumption(self.id)
            }
        }
    }

    /// Wait for `act` to terminate.
    pub async fn wait(&self, act: &Activity) -> SimResult<()> {
        self.block(&[act.inner()], None).await.1
    }

    /// Wait for `act` at most `timeout` seconds. On `Timeout` the activity
    /// is left as it was.
    pub async fn wait_for(&self, act: &Activity, timeout: f64) -> SimResult<()> {
        self.block(&[act.inner()], Some(timeout)).await.1
    }

    /// Give the other runnable actors a chance to run at the current date.
    pub async fn yield_now(&self) -> SimResult<()> {
        {
            let mut kernel = self.kernel.borrow_mut();
            kernel.park(self.id);
            kernel.wake(self.id);
        }
        park().await;
        self.take_thrown()
    }

    fn take_thrown(&self) -> SimResult<()> {
        let mut kernel = self.kernel.borrow_mut();
        match kernel.actors.get_mut(&self.id) {
            Some(actor) => actor.pending_error.take().map_or(Ok(()), Err),
            None => Ok(()),
        }
    }

    /// Never returns once this actor is dying; the runtime reaps it at its
    /// next turn.
    async fn settle(&self) -> SimResult<()> {
        if self.kernel.borrow().is_alive(self.id) {
            return Ok(());
        }
        futures::future::pending::<SimResult<()>>().await
    }

    // ── Control surface ───────────────────────────────────────────────

    /// Create an actor on `host`. It first runs in the next sub-round.
    pub fn create<F, Fut>(&self, name: &str, host: HostId, code: F) -> SimResult<ActorId>
    where
        F: Fn(ActorContext) -> Fut + 'static,
        Fut: Future<Output = SimResult<()>> + 'static,
    {
        let args = ActorArgs::new(name, host, boxed_code(code));
        self.kernel.borrow_mut().spawn(args, Some(self.id))
    }

    /// Suspend `target`. Suspending oneself parks until someone resumes.
    pub async fn suspend(&self, target: ActorId) -> SimResult<()> {
        self.kernel.borrow_mut().suspend_actor(target)?;
        if target != self.id {
            return Ok(());
        }
        self.kernel.borrow_mut().park(self.id);
        park().await;
        self.take_thrown()
    }

    pub fn resume(&self, target: ActorId) -> SimResult<()> {
        self.kernel.borrow_mut().resume_actor(target)?;
        Ok(())
    }

    /// Kill `target`. Killing oneself never returns.
    pub async fn kill(&self, target: ActorId) -> SimResult<()> {
        self.kernel.borrow_mut().kill_actor(target, Some(self.id));
        self.settle().await
    }

    /// Kill every other actor.
    pub fn kill_all(&self) {
        self.kernel.borrow_mut().kill_all(Some(self.id));
    }

    /// Terminate this actor. Exit hooks run with `failed = true`.
    pub async fn exit(&self) -> SimResult<()> {
        self.kill(self.id).await
    }

    /// Wait until `target` terminates, or `timeout` seconds elapse.
    /// Returns `Ok` in both cases.
    pub async fn join(&self, target: ActorId, timeout: Option<f64>) -> SimResult<()> {
        let act = self.kernel.borrow_mut().join_actor(self.id, target, timeout)?;
        self.block(&[act], None).await.1
    }

    pub fn daemonize(&self, target: ActorId) -> SimResult<()> {
        self.kernel.borrow_mut().daemonize(target)?;
        Ok(())
    }

    pub fn undaemonize(&self, target: ActorId) -> SimResult<()> {
        self.kernel.borrow_mut().undaemonize(target)?;
        Ok(())
    }

    /// Move `target` to `host`. Fails if the host is off.
    pub fn migrate(&self, target: ActorId, host: HostId) -> SimResult<()> {
        self.kernel.borrow_mut().migrate(target, host)
    }

    /// Register a hook run when this actor terminates. Hooks run in reverse
    /// registration order.
    pub fn on_exit(&self, hook: impl FnOnce(bool) + 'static) -> SimResult<()> {
        self.kernel.borrow_mut().add_exit_hook(self.id, Box::new(hook))?;
        Ok(())
    }

    /// Kill `target` and start a fresh copy of it. Restarting oneself never
    /// returns; the copy takes over.
    pub async fn restart(&self, target: ActorId) -> SimResult<ActorId> {
        let id = self.kernel.borrow_mut().restart_actor(target, Some(self.id))?;
        self.settle().await?;
        Ok(id)
    }

    /// Make `target` fail at its current (or next) await point with `error`.
    pub fn throw_exception(&self, target: ActorId, error: SimError) -> SimResult<()> {
        self.kernel.borrow_mut().throw_to(target, error)?;
        Ok(())
    }

    /// Kill `target` at simulated date `at`.
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

    /// Turn a resource off. Turning off one's own host never returns.
    pub async fn turn_off(&self, resource: impl Into<ResourceId>) -> SimResult<()> {
        self.kernel.borrow_mut().turn_off(resource.into())?;
        self.settle().await
    }

    pub fn turn_on(&self, resource: impl Into<ResourceId>) -> SimResult<()> {
        self.kernel.borrow_mut().turn_on(resource.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use futures::task::noop_waker;

    #[test]
    fn test_park_yields_once() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut p = park();
        assert_eq!(Pin::new(&mut p).poll(&mut cx), Poll::Pending);
        assert_eq!(Pin::new(&mut p).poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn test_debug_does_not_hold_kernel() {
        let k: KernelRef = Rc::new(std::cell::RefCell::new(crate::kernel::Kernel::new(
            crate::platform::PlatformBuilder::new().host("h", 1.0).build().unwrap(),
            Box::new(crate::model::FixedRateModel::new()),
            crate::config::RuntimeConfig::default(),
        )));
        let host = k.borrow().platform.host_by_name("h").unwrap();
        let ctx = ActorContext::new(ActorId::new(0), host, Rc::clone(&k));
        assert!(format!("{:?}", ctx).contains("A0"));
        drop(ctx);
        assert_eq!(Rc::strong_count(&k), 1);
    }
}
