/// Resource model: the solver that decides when activities complete.
///
/// The kernel treats the model as a black box. It hands over an action
/// demand when an activity starts and later asks for the date of the next
/// completion; when the clock reaches that date the model reports which
/// actions are done. Contention (sharing CPU or bandwidth between
/// concurrent actions) is entirely the model's business.
///
/// [`FixedRateModel`] is the reference implementation: every action
/// progresses at its own fixed rate with no sharing at all, which is
/// enough to make completion dates exact and easy to reason about in
/// tests.

use std::collections::BTreeMap;

use crate::activity::ActivityId;
use crate::platform::ResourceKind;
use crate::time::SimTime;

// ── Demand & Outcome ──────────────────────────────────────────────────

/// What an action needs from the model.
///
/// The action first waits `latency` seconds, then consumes `work` units at
/// `rate` units per second. An infinite `work` never completes on its own
/// (used for joins without timeout); an infinite `rate` makes the work
/// phase instantaneous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Demand {
    pub latency: f64,
    pub work: f64,
    pub rate: f64,
}

impl Demand {
    /// `work` units at `rate` units per second.
    pub fn work(work: f64, rate: f64) -> Self {
        Demand {
            latency: 0.0,
            work: work.max(0.0),
            rate,
        }
    }

    /// Add a latency phase in front of the work.
    pub fn with_latency(mut self, latency: f64) -> Self {
        self.latency = latency.max(0.0);
        self
    }
}

/// How an action ended, as reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    /// The model itself decided the action failed on a resource of this kind.
    Failed(ResourceKind),
}

// ── ResourceModel ─────────────────────────────────────────────────────

/// The contract between the kernel and an external solver.
///
/// Every method is keyed by the [`ActivityId`] of the activity the action
/// belongs to; the kernel never starts two actions for the same activity.
pub trait ResourceModel {
    /// Begin simulating an action at date `now`.
    fn start_action(&mut self, now: SimTime, id: ActivityId, demand: Demand);

    /// Pause an action; its progress is frozen until resumed.
    fn suspend_action(&mut self, now: SimTime, id: ActivityId);

    /// Continue a paused action.
    fn resume_action(&mut self, now: SimTime, id: ActivityId);

    /// Forget an action (canceled, failed, or finished through other means).
    fn cancel_action(&mut self, id: ActivityId);

    /// Remaining work of an action at date `now`, if the model tracks it.
    fn remaining(&self, now: SimTime, id: ActivityId) -> Option<f64>;

    /// The earliest date at which some running action completes.
    fn next_completion(&self) -> Option<SimTime>;

    /// Report every action that is done by `now` (within `precision`), in
    /// ascending activity id order, and forget them.
    fn advance_to(&mut self, now: SimTime, precision: f64) -> Vec<(ActivityId, Outcome)>;
}

// ── FixedRateModel ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Action {
    latency_left: f64,
    work_left: f64,
    rate: f64,
    /// Date from which `latency_left` / `work_left` are accounted.
    since: SimTime,
    suspended: bool,
}

impl Action {
    /// Completion date if the action keeps running from `since`.
    fn completion(&self) -> Option<SimTime> {
        if self.suspended || !self.work_left.is_finite() || !self.latency_left.is_finite() {
            return None;
        }
        let work_time = if self.work_left <= 0.0 {
            0.0
        } else if self.rate.is_infinite() {
            0.0
        } else if self.rate <= 0.0 {
            return None;
        } else {
            self.work_left / self.rate
        };
        Some(self.since.plus(self.latency_left + work_time))
    }

    /// Account for the progress made between `since` and `now`.
    fn progress_to(&mut self, now: SimTime) {
        if self.suspended {
            self.since = now;
            return;
        }
        let mut elapsed = now.duration_since(self.since).unwrap_or(0.0);
        let in_latency = elapsed.min(self.latency_left);
        self.latency_left -= in_latency;
        elapsed -= in_latency;
        if elapsed > 0.0 && self.work_left.is_finite() {
            if self.rate.is_infinite() {
                self.work_left = 0.0;
            } else {
                self.work_left = (self.work_left - elapsed * self.rate).max(0.0);
            }
        }
        self.since = now;
    }
}

/// A model without contention: each action runs at its own fixed rate.
#[derive(Debug, Clone, Default)]
pub struct FixedRateModel {
    actions: BTreeMap<ActivityId, Action>,
}

impl FixedRateModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceModel for FixedRateModel {
    fn start_action(&mut self, now: SimTime, id: ActivityId, demand: Demand) {
        self.actions.insert(
            id,
            Action {
                latency_left: demand.latency,
                work_left: demand.work,
                rate: demand.rate,
                since: now,
                suspended: false,
            },
        );
    }

    fn suspend_action(&mut self, now: SimTime, id: ActivityId) {
        if let Some(action) = self.actions.get_mut(&id) {
            if !action.suspended {
                action.progress_to(now);
                action.suspended = true;
            }
        }
    }

    fn resume_action(&mut self, now: SimTime, id: ActivityId) {
        if let Some(action) = self.actions.get_mut(&id) {
            if action.suspended {
                action.suspended = false;
                action.since = now;
            }
        }
    }

    fn cancel_action(&mut self, id: ActivityId) {
        self.actions.remove(&id);
    }

    fn remaining(&self, now: SimTime, id: ActivityId) -> Option<f64> {
        let mut action = self.actions.get(&id)?.clone();
        action.progress_to(now);
        Some(action.work_left)
    }

    fn next_completion(&self) -> Option<SimTime> {
        self.actions.values().filter_map(Action::completion).min()
    }

    fn advance_to(&mut self, now: SimTime, precision: f64) -> Vec<(ActivityId, Outcome)> {
        let done: Vec<ActivityId> = self
            .actions
            .iter()
            .filter(|(_, a)| a.completion().is_some_and(|at| at.secs() <= now.secs() + precision))
            .map(|(id, _)| *id)
            .collect();
        for id in &done {
            self.actions.remove(id);
        }
        done.into_iter().map(|id| (id, Outcome::Finished)).collect()
    }
}
