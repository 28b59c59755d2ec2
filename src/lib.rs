//! # actorsim — Deterministic Actor Execution Kernel
//!
//! The core of a discrete-event simulator of distributed systems. User
//! code runs as *actors* (async closures) on simulated hosts and performs
//! *activities*: computations, communications through mailboxes, disk
//! I/O and sleeps. A pluggable resource model decides when activities
//! complete; the kernel owns everything else: actor lifecycle, the
//! activity state machine, the scheduling loop, and the translation of
//! resource failures into errors at the actors' await points.
//!
//! Single-threaded and fully deterministic: same inputs, same trace.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │          Runtime           │ ← rounds, clock, reaping
//! │  ┌──────────────────────┐  │
//! │  │        Kernel         │  │ ← actors, activities, mailboxes
//! │  │  ┌────────────────┐  │  │
//! │  │  │  ResourceModel │  │  │ ← completion dates
//! │  │  └────────────────┘  │  │
//! │  │  ┌────────────────┐  │  │
//! │  │  │   TimerQueue   │  │  │ ← timeouts, kill dates, failures
//! │  │  └────────────────┘  │  │
//! │  │  ┌────────────────┐  │  │
//! │  │  │    Platform    │  │  │ ← hosts, links, disks (on/off)
//! │  │  └────────────────┘  │  │
//! │  └──────────────────────┘  │
//! └───────────────────────────┘
//!          ▲           ▲
//!   ActorContext    Activity     ← what actor code holds
//! ```

pub mod activity;
pub mod actor;
pub mod config;
pub mod error;
pub mod event;
mod kernel;
mod mailbox;
pub mod model;
pub mod payload;
pub mod platform;
pub mod runtime;
pub mod scheduler;
pub mod time;
pub mod trace;

// Re-exports for convenience.
pub use activity::{Activity, ActivityId, ActivitySet, ActivityState, ActivityType, IoOp};
pub use actor::{ActorContext, ActorId, ActorState};
pub use config::RuntimeConfig;
pub use error::{KernelError, SimError, SimResult};
pub use model::{Demand, FixedRateModel, Outcome, ResourceModel};
pub use payload::MessagePayload;
pub use platform::{DiskId, HostId, LinkId, Platform, PlatformBuilder, ResourceId, ResourceKind};
pub use runtime::Runtime;
pub use time::SimTime;
pub use trace::{TraceEntry, TraceEvent};
