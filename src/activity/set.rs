//! Waiting on several activities at once.

use crate::actor::ActorContext;
use crate::error::SimResult;

use super::{Activity, ActivityRef};

/// A bag of activities to wait on together.
#[derive(Debug, Clone, Default)]
pub struct ActivitySet {
    items: Vec<Activity>,
}

impl ActivitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, activity: Activity) {
        self.items.push(activity);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.items.iter()
    }

    /// Remove and return the first terminal activity, without blocking.
    pub fn test_any(&mut self) -> Option<Activity> {
        let pos = self.items.iter().position(Activity::test)?;
        Some(self.items.remove(pos))
    }

    /// Block until any activity of the set terminates and remove it from
    /// the set. If it failed, it is removed as well and its error is
    /// returned. `Ok(None)` on an empty set.
    pub async fn wait_any(&mut self, ctx: &ActorContext) -> SimResult<Option<Activity>> {
        self.wait_any_inner(ctx, None).await
    }

    /// Like [`wait_any`](Self::wait_any) with a deadline; on `Timeout` the
    /// set is unchanged.
    pub async fn wait_any_for(
        &mut self,
        ctx: &ActorContext,
        timeout: f64,
    ) -> SimResult<Option<Activity>> {
        self.wait_any_inner(ctx, Some(timeout)).await
    }

    async fn wait_any_inner(
        &mut self,
        ctx: &ActorContext,
        timeout: Option<f64>,
    ) -> SimResult<Option<Activity>> {
        if self.items.is_empty() {
            return Ok(None);
        }
        let refs: Vec<ActivityRef> = self.items.iter().map(Activity::inner).collect();
        let (woken_by, result) = ctx.block(&refs, timeout).await;
        let done = woken_by.and_then(|id| {
            let pos = self.items.iter().position(|a| a.id() == id)?;
            Some(self.items.remove(pos))
        });
        result.map(|()| done)
    }

    /// Wait for every activity in order, stopping at the first error.
    /// Activities that terminated are removed from the set.
    pub async fn wait_all(&mut self, ctx: &ActorContext) -> SimResult<()> {
        while !self.items.is_empty() {
            let act = self.items.remove(0);
            ctx.wait(&act).await?;
        }
        Ok(())
    }
}
