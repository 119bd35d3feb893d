//! View parts: the tuple elements a query resolves for each match.

use crate::entity::{EntityId, SlotIndex};
use crate::query::QueryMeta;
use crate::signature::{component_tag_of, Component};
use crate::tick::{CellTicks, Tick, TickWindow};
use crate::world::World;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// One resolvable part of a query view.
///
/// `describe` contributes the part's tags to the query's signatures;
/// `resolve` produces the part's output for a slot that already passed the
/// membership test.
pub trait View<'w>: Send + Sync + Sized + 'static {
    type Item;

    fn describe(meta: &mut QueryMeta);

    /// Safety: the caller must uphold the stage access discipline for this
    /// view's writes, and `slot` must satisfy the view's required tags.
    unsafe fn resolve(world: &'w World, slot: SlotIndex, window: TickWindow) -> Self::Item;
}

/// Marker for views that never hand out write references. Read-only views
/// may be built from a shared world borrow.
pub trait ReadOnly {}

/// A write reference to one component cell. Stamps the cell's changed tick
/// when dropped.
pub struct Mut<'w, T> {
    value: &'w mut T,
    cell: &'w mut CellTicks,
    tick: Tick,
}

impl<'w, T> Deref for Mut<'w, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
    }
}

impl<'w, T> DerefMut for Mut<'w, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
    }
}

impl<'w, T> Drop for Mut<'w, T> {
    fn drop(&mut self) {
        self.cell.changed = self.tick;
    }
}

/// Resolves `&T`.
#[derive(Debug)]
pub struct Read<T: Component>(PhantomData<T>);

impl<T: Component> ReadOnly for Read<T> {}

impl<'w, T: Component> View<'w> for Read<T> {
    type Item = &'w T;

    fn describe(meta: &mut QueryMeta) {
        let tag = component_tag_of::<T>();
        meta.add_read(tag);
        meta.signature.insert(tag);
    }

    unsafe fn resolve(world: &'w World, slot: SlotIndex, _: TickWindow) -> Self::Item {
        world
            .column::<T>()
            .and_then(|column| column.get(slot))
            .expect("query slot lost its required component")
    }
}

/// Resolves a write reference to `T`.
#[derive(Debug)]
pub struct Write<T: Component>(PhantomData<T>);

impl<'w, T: Component> View<'w> for Write<T> {
    type Item = Mut<'w, T>;

    fn describe(meta: &mut QueryMeta) {
        let tag = component_tag_of::<T>();
        meta.add_write(tag);
        meta.signature.insert(tag);
    }

    unsafe fn resolve(world: &'w World, slot: SlotIndex, window: TickWindow) -> Self::Item {
        let column = world
            .column_mut_unchecked::<T>()
            .expect("query slot lost its required column");
        let dense = column
            .dense_index_of(slot)
            .expect("query slot lost its required component");
        let (value, cell) = column
            .write_cell(dense)
            .expect("dense row missing its tick cell");
        Mut {
            value,
            cell,
            tick: window.this_run,
        }
    }
}

/// Resolves `Option<&T>`; absence does not reject the entity.
#[derive(Debug)]
pub struct TryRead<T: Component>(PhantomData<T>);

impl<T: Component> ReadOnly for TryRead<T> {}

impl<'w, T: Component> View<'w> for TryRead<T> {
    type Item = Option<&'w T>;

    fn describe(meta: &mut QueryMeta) {
        // access is tracked for scheduling, but the tag stays out of the
        // signature so absent cells still match
        meta.add_read(component_tag_of::<T>());
    }

    unsafe fn resolve(world: &'w World, slot: SlotIndex, _: TickWindow) -> Self::Item {
        world.column::<T>().and_then(|column| column.get(slot))
    }
}

/// Resolves `Option<Mut<T>>`; absence does not reject the entity.
#[derive(Debug)]
pub struct TryWrite<T: Component>(PhantomData<T>);

impl<'w, T: Component> View<'w> for TryWrite<T> {
    type Item = Option<Mut<'w, T>>;

    fn describe(meta: &mut QueryMeta) {
        meta.add_write(component_tag_of::<T>());
    }

    unsafe fn resolve(world: &'w World, slot: SlotIndex, window: TickWindow) -> Self::Item {
        let column = world.column_mut_unchecked::<T>()?;
        let dense = column.dense_index_of(slot)?;
        let (value, cell) = column.write_cell(dense)?;
        Some(Mut {
            value,
            cell,
            tick: window.this_run,
        })
    }
}

/// Resolves the entity's own id.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityIdProbe;

impl ReadOnly for EntityIdProbe {}

impl<'w> View<'w> for EntityIdProbe {
    type Item = EntityId;

    fn describe(meta: &mut QueryMeta) {
        meta.needs_entity_id = true;
    }

    unsafe fn resolve(world: &'w World, slot: SlotIndex, _: TickWindow) -> Self::Item {
        world.id_at(slot).expect("query produced a dead slot")
    }
}

macro_rules! impl_view_tuple {
    ( $( $ty:ident ),* ) => {
        impl<'w, $( $ty: View<'w> ),*> View<'w> for ($( $ty, )*) {
            type Item = ($( $ty::Item, )*);

            fn describe(meta: &mut QueryMeta) {
                $( $ty::describe(meta); )*
            }

            unsafe fn resolve(world: &'w World, slot: SlotIndex, window: TickWindow) -> Self::Item {
                ($( $ty::resolve(world, slot, window), )*)
            }
        }

        impl<$( $ty: ReadOnly ),*> ReadOnly for ($( $ty, )*) {}
    };
}

impl_view_tuple!(A);
impl_view_tuple!(A, B);
impl_view_tuple!(A, B, C);
impl_view_tuple!(A, B, C, D);
impl_view_tuple!(A, B, C, D, E);
impl_view_tuple!(A, B, C, D, E, F);
impl_view_tuple!(A, B, C, D, E, F, G);
impl_view_tuple!(A, B, C, D, E, F, G, H);
