//! `troupe`: a sparse-set entity component system runtime.
//!
//! The facade crate re-exports the storage/query core and the scheduling
//! layer. Most hosts only need the [`prelude`].

pub use troupe_core::*;
pub use troupe_systems as systems;
pub use troupe_systems::{
    Executor, Schedule, SerialExecutor, System, SystemBuilder, SystemContext, SystemId,
    SystemMeta, WorldSchedules,
};

#[cfg(feature = "par-schedule")]
pub use troupe_systems::{ParallelExecutor, UncheckedParallelExecutor};

pub mod prelude {
    pub use troupe_core::{
        added, changed, with, without, Added, Changed, CommandBuffer, ComponentTag, EntityId,
        EntityIdProbe, EventReader, GroupKey, Mut, Query, Read, TickWindow, TryRead, TryWrite,
        With, Without, World, Write, MAIN_SCHEDULE,
    };
    pub use troupe_systems::{
        Executor, Schedule, SerialExecutor, SystemBuilder, SystemContext, SystemId,
        WorldSchedules,
    };

    #[cfg(feature = "par-schedule")]
    pub use troupe_systems::{ParallelExecutor, UncheckedParallelExecutor};
}
