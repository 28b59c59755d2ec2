//! Structured error types for the execution kernel.
//!
//! Two layers, both `thiserror` enums:
//!
//! - [`SimError`] is what actor code observes at an await point: the
//!   failure taxonomy of activities (cancel, timeout, host / network /
//!   storage failure).
//! - [`KernelError`] covers programming errors against the kernel API
//!   (starting an activity twice, naming an unknown actor) and the
//!   end-of-run deadlock report. It is wrapped into `SimError::Kernel`
//!   so actor code can propagate everything with a single `?`.
//!
//! A killed actor never observes any of these: it simply stops running.

use thiserror::Error;

use crate::activity::ActivityId;
use crate::actor::ActorId;

/// The error an actor observes when a blocking call does not complete
/// normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum SimError {
    /// The awaited activity was canceled.
    #[error("canceled: {0}")]
    Cancel(String),

    /// `wait_for` reached its deadline before the activity terminated.
    /// The activity itself is left untouched.
    #[error("timeout reached")]
    Timeout,

    /// The host running the activity went off.
    #[error("host failure: {0}")]
    HostFailure(String),

    /// A link on the path, or the peer of a communication, failed.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The disk serving an I/O went off.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Misuse of the kernel API.
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

impl SimError {
    /// Whether this is a `Cancel`.
    pub fn is_cancel(&self) -> bool {
        matches!(self, SimError::Cancel(_))
    }

    /// Whether this is a `Timeout`.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SimError::Timeout)
    }

    /// Whether this is a `HostFailure`.
    pub fn is_host_failure(&self) -> bool {
        matches!(self, SimError::HostFailure(_))
    }

    /// Whether this is a `NetworkFailure`.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, SimError::NetworkFailure(_))
    }

    /// Whether this is a `StorageFailure`.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, SimError::StorageFailure(_))
    }
}

/// Programming errors and global run failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum KernelError {
    /// `start()` was called on an activity that is no longer `Inited`.
    #[error("activity {0} was already started")]
    AlreadyStarted(ActivityId),

    /// An actor id was referenced but is not in the actor table.
    #[error("actor {0} not found")]
    UnknownActor(ActorId),

    /// A platform element name or id could not be resolved.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// The same resource name was declared twice in a platform.
    #[error("resource {0} is declared twice")]
    DuplicateResource(String),

    /// A platform element was declared with an unusable rate.
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// A handle outlived the runtime that created it.
    #[error("the runtime owning this object is gone")]
    RuntimeGone,

    /// The simulation became quiescent while these actors were still blocked.
    #[error("deadlock: {} actor(s) still blocked: {}", .blocked.len(), join_ids(.blocked))]
    Deadlock { blocked: Vec<ActorId> },
}

fn join_ids(ids: &[ActorId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_failures() {
        assert_eq!(
            SimError::HostFailure("host bob is off".into()).to_string(),
            "host failure: host bob is off"
        );
        assert_eq!(SimError::Timeout.to_string(), "timeout reached");
    }

    #[test]
    fn test_error_display_invalid_resource() {
        let e = KernelError::InvalidResource("host h: speed must be positive, got 0".into());
        assert_eq!(e.to_string(), "invalid resource: host h: speed must be positive, got 0");
    }

    #[test]
    fn test_kernel_error_is_transparent() {
        let e: SimError = KernelError::UnknownActor(ActorId::new(5)).into();
        assert_eq!(e.to_string(), "actor A5 not found");
    }

    #[test]
    fn test_error_display_deadlock() {
        let e = KernelError::Deadlock {
            blocked: vec![ActorId::new(1), ActorId::new(3)],
        };
        let s = e.to_string();
        assert!(s.contains("2 actor(s)"));
        assert!(s.contains("A1"));
    }

    #[test]
    fn test_predicates() {
        assert!(SimError::Cancel("x".into()).is_cancel());
        assert!(SimError::NetworkFailure("x".into()).is_network_failure());
        assert!(SimError::StorageFailure("x".into()).is_storage_failure());
        assert!(!SimError::Timeout.is_host_failure());
    }

    #[test]
    fn test_error_is_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(SimError::Timeout);
        assert!(!e.to_string().is_empty());
    }
}
