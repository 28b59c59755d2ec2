//! Actor ID — a lightweight, ordered, copyable actor identifier.

/// A unique identifier for a simulated actor.
///
/// Allocated from a per-runtime monotonic counter and never reused, even
/// after the actor is destroyed. The derived `Ord` is the tie-break used
/// when several actors become runnable at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ActorId(u64);

impl ActorId {
    #[inline]
    pub fn new(id: u64) -> Self {
        ActorId(id)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "A{}", self.0)
    }
}
