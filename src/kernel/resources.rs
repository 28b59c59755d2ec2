//! Resource on/off transitions.

use tracing::info;

use crate::activity::{ActivityRef, ActivityState};
use crate::actor::ActorId;
use crate::error::{KernelError, SimResult};
use crate::event::TimerKind;
use crate::platform::ResourceId;
use crate::time::SimTime;
use crate::trace::TraceEvent;

use super::Kernel;

impl Kernel {
    /// Turn a resource off.
    ///
    /// Every started activity bound to it fails (each waiter is answered
    /// once), then, for a host, every actor running there is killed.
    /// No-op if the resource already is off.
    pub(crate) fn turn_off(&mut self, resource: ResourceId) -> Result<(), KernelError> {
        if !self.platform.contains(resource) {
            return Err(KernelError::UnknownResource(resource.to_string()));
        }
        if !self.platform.set_on(resource, false) {
            return Ok(());
        }
        info!(
            resource = %self.platform.name_of(resource),
            time = %self.now,
            "resource turned off"
        );
        self.record(TraceEvent::ResourceOff { resource });

        let victims: Vec<ActivityRef> = self
            .registry
            .values()
            .filter(|a| {
                let a = a.borrow();
                a.state == ActivityState::Started && a.resources.contains(&resource)
            })
            .cloned()
            .collect();
        for act in &victims {
            self.fail_on(act, resource);
        }

        if let ResourceId::Host(host) = resource {
            let residents: Vec<ActorId> = self
                .actors
                .values()
                .filter(|a| a.host == host && a.is_alive())
                .map(|a| a.id)
                .collect();
            for id in residents {
                if let Some(actor) = self.actors.get(&id).filter(|a| a.auto_restart) {
                    let args = actor.args();
                    self.boot_list.entry(host).or_default().push(args);
                }
                self.kill_actor(id, None);
            }
        }
        Ok(())
    }

    /// Turn a resource back on. Nothing that failed is resurrected; for a
    /// host, the auto-restart actors it lost are created again.
    pub(crate) fn turn_on(&mut self, resource: ResourceId) -> SimResult<()> {
        if !self.platform.contains(resource) {
            return Err(KernelError::UnknownResource(resource.to_string()).into());
        }
        if !self.platform.set_on(resource, true) {
            return Ok(());
        }
        info!(
            resource = %self.platform.name_of(resource),
            time = %self.now,
            "resource turned on"
        );
        self.record(TraceEvent::ResourceOn { resource });

        if let ResourceId::Host(host) = resource {
            for args in self.boot_list.remove(&host).unwrap_or_default() {
                self.spawn(args, None)?;
            }
        }
        Ok(())
    }

    /// Flip a resource at a future date, from outside any actor.
    pub(crate) fn schedule_state(
        &mut self,
        resource: ResourceId,
        at: SimTime,
        on: bool,
    ) -> Result<(), KernelError> {
        if !self.platform.contains(resource) {
            return Err(KernelError::UnknownResource(resource.to_string()));
        }
        let at = at.max(self.now);
        let kind = if on {
            TimerKind::ResourceOn { resource }
        } else {
            TimerKind::ResourceOff { resource }
        };
        self.timers.schedule(at, kind);
        Ok(())
    }
}
