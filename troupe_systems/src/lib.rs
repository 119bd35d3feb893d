//! Scheduling layer of the `troupe` ECS runtime: systems with declared
//! access, the stagehand's conflict-free stage packing, execution
//! strategies, and world-attached schedules.

pub mod executor;
pub mod schedule;
pub mod stagehand;
pub mod system;

pub use crate::executor::{Executor, SerialExecutor, TickLedger};
#[cfg(feature = "par-schedule")]
pub use crate::executor::{ParallelExecutor, UncheckedParallelExecutor};
pub use crate::schedule::{Schedule, WorldSchedules};
pub use crate::stagehand::{build_stages, stage_cache_key, StagehandError};
pub use crate::system::{
    Access, EventAccess, EventMode, FnSystem, System, SystemBuilder, SystemContext, SystemId,
    SystemMeta,
};
