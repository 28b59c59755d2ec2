//! Mailboxes — named rendezvous points for communications.

use std::collections::VecDeque;

use crate::activity::{ActivityId, ActivityRef, CommRole};

/// Pending, unmatched communications of one mailbox, oldest first.
///
/// A mailbox only ever holds one role at a time in practice: an arriving
/// put matches the oldest pending get and vice versa, so the opposite
/// role never accumulates.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    pending: VecDeque<ActivityRef>,
}

impl Mailbox {
    /// Remove and return the oldest pending communication playing `role`.
    pub fn take_match(&mut self, role: CommRole) -> Option<ActivityRef> {
        let pos = self
            .pending
            .iter()
            .position(|c| c.borrow().comm_role() == Some(role))?;
        self.pending.remove(pos)
    }

    pub fn push(&mut self, comm: ActivityRef) {
        self.pending.push_back(comm);
    }

    /// Drop a pending communication (canceled before being matched).
    pub fn remove(&mut self, id: ActivityId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|c| c.borrow().id != id);
        before != self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
