//! Core storage and query engine of the `troupe` ECS runtime.
//!
//! Entities are rows across sparse-set component columns; queries walk the
//! smallest required column (or a group's packed prefix) and resolve typed
//! views per match. Scheduling lives in the companion `troupe-systems`
//! crate; the world here only knows how to own and run attached schedules.

pub mod borrow;
pub mod command;
pub mod entity;
pub mod event;
pub mod group;
pub mod paging;
pub mod query;
pub mod resource;
pub mod signature;
pub mod storage;
pub mod tick;
pub mod world;

pub use crate::command::CommandBuffer;
pub use crate::entity::{EntityId, Generation, SlotIndex};
pub use crate::event::{Event, EventChannel, EventManager, EventReader, EventsRef};
pub use crate::group::GroupKey;
pub use crate::query::{
    added, changed, with, without, Added, And, Changed, EntityFilter, EntityIdProbe, Matches, Mut,
    Passthrough, Query, QueryMeta, Read, ReadOnly, TryRead, TryWrite, View, With, Without, Write,
};
pub use crate::resource::{Res, ResMut, Resource, ResourceKey, Resources};
pub use crate::signature::{component_tag_of, Component, ComponentTag, Signature};
pub use crate::storage::Column;
pub use crate::tick::{is_newer, CellTicks, Tick, TickWindow, MAX_TICK_DELTA};
pub use crate::world::{ComponentSet, ScheduleRunner, World, MAIN_SCHEDULE};
