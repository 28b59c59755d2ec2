//! User-facing activity handle.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::actor::ActorContext;
use crate::error::{KernelError, SimResult};
use crate::kernel::{Kernel, KernelRef};
use crate::payload::MessagePayload;
use crate::time::SimTime;

use super::{resolve, ActivityId, ActivityRef, ActivityState, ActivityType};

/// A shared handle on an activity.
///
/// Clones refer to the same activity. The kernel keeps its own reference
/// while the activity runs, so dropping every handle never cancels it.
#[derive(Clone)]
pub struct Activity {
    inner: ActivityRef,
    kernel: Weak<RefCell<Kernel>>,
}

impl Activity {
    pub(crate) fn new(inner: ActivityRef, kernel: &KernelRef) -> Self {
        Activity {
            inner,
            kernel: Rc::downgrade(kernel),
        }
    }

    /// The underlying object, following a communication match.
    pub(crate) fn inner(&self) -> ActivityRef {
        resolve(&self.inner)
    }

    fn kernel(&self) -> SimResult<KernelRef> {
        self.kernel
            .upgrade()
            .ok_or_else(|| KernelError::RuntimeGone.into())
    }

    pub fn id(&self) -> ActivityId {
        self.inner().borrow().id
    }

    pub fn name(&self) -> String {
        self.inner().borrow().name.clone()
    }

    pub fn activity_type(&self) -> ActivityType {
        self.inner().borrow().activity_type()
    }

    pub fn state(&self) -> ActivityState {
        self.inner().borrow().state
    }

    /// Non-blocking: whether the activity reached a terminal state.
    /// Once true, stays true.
    pub fn test(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_suspended(&self) -> bool {
        self.inner().borrow().suspended
    }

    pub fn start_time(&self) -> Option<SimTime> {
        self.inner().borrow().start_time
    }

    pub fn finish_time(&self) -> Option<SimTime> {
        self.inner().borrow().finish_time
    }

    /// Bind an `Inited` activity to its resources.
    pub fn start(&self) -> SimResult<()> {
        let kernel = self.kernel()?;
        kernel.borrow_mut().start_activity(&self.inner())?;
        Ok(())
    }

    /// Cancel the activity. Its waiters observe `Cancel`; no-op once
    /// terminal.
    pub fn cancel(&self) -> SimResult<()> {
        let kernel = self.kernel()?;
        kernel.borrow_mut().cancel_activity(&self.inner());
        Ok(())
    }

    pub fn suspend(&self) -> SimResult<()> {
        let kernel = self.kernel()?;
        kernel.borrow_mut().suspend_activity(&self.inner());
        Ok(())
    }

    pub fn resume(&self) -> SimResult<()> {
        let kernel = self.kernel()?;
        kernel.borrow_mut().resume_activity(&self.inner());
        Ok(())
    }

    /// Work left: flops for an exec, bytes for a comm or I/O, seconds for
    /// a sleep. `None` once failed or canceled.
    pub fn remaining(&self) -> Option<f64> {
        let kernel = self.kernel.upgrade()?;
        let remaining = kernel.borrow().remaining(&self.inner());
        remaining
    }

    /// Take the payload of a finished communication.
    pub fn take_payload(&self) -> Option<MessagePayload> {
        let inner = self.inner();
        let mut a = inner.borrow_mut();
        if a.state != ActivityState::Finished {
            return None;
        }
        a.comm_mut()?.payload.take()
    }

    pub async fn wait(&self, ctx: &ActorContext) -> SimResult<()> {
        ctx.wait(self).await
    }

    pub async fn wait_for(&self, ctx: &ActorContext, timeout: f64) -> SimResult<()> {
        ctx.wait_for(self, timeout).await
    }
}

impl std::fmt::Debug for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner();
        let a = inner.borrow();
        f.debug_struct("Activity")
            .field("id", &a.id)
            .field("kind", &a.activity_type())
            .field("state", &a.state)
            .finish()
    }
}
