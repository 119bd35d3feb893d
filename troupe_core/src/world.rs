//! The world: entity registry, component columns, groups, resources,
//! events, change ticks and the schedule registry.

use crate::entity::{EntityId, IndexRegistry, SlotIndex};
use crate::event::{Event, EventManager};
use crate::group::{Group, GroupKey, GroupRegistry};
use crate::query::{meta_for, EntityFilter, Query, QueryMeta, ReadOnly, View};
use crate::resource::{missing_resource, Res, ResMut, Resource, ResourceKey, Resources};
use crate::signature::{component_tag_of, Component, ComponentTag, Signature};
use crate::storage::{AnyColumn, Column};
use crate::tick::{Tick, TickWindow};
use downcast_rs::{impl_downcast, Downcast};
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::cell::UnsafeCell;
use std::sync::Arc;
use tracing::{debug, trace};

/// Label of the schedule executed by [`World::run`].
pub const MAIN_SCHEDULE: &str = "main";

/// A set of components inserted together at spawn time.
pub trait ComponentSet {
    fn insert_into(self, world: &mut World, id: EntityId);
}

impl ComponentSet for () {
    fn insert_into(self, _: &mut World, _: EntityId) {}
}

macro_rules! impl_component_set {
    ( $( $ty:ident => $id:ident ),* ) => {
        impl<$( $ty: Component ),*> ComponentSet for ($( $ty, )*) {
            fn insert_into(self, world: &mut World, id: EntityId) {
                #![allow(non_snake_case)]
                let ($( $id, )*) = self;
                $( world.add(id, $id); )*
            }
        }
    };
}

impl_component_set!(A => a);
impl_component_set!(A => a, B => b);
impl_component_set!(A => a, B => b, C => c);
impl_component_set!(A => a, B => b, C => c, D => d);
impl_component_set!(A => a, B => b, C => c, D => d, E => e);
impl_component_set!(A => a, B => b, C => c, D => d, E => e, F => f);
impl_component_set!(A => a, B => b, C => c, D => d, E => e, F => f, G => g);
impl_component_set!(A => a, B => b, C => c, D => d, E => e, F => f, G => g, H => h);

/// A schedule attached to the world. Defined as a trait so the scheduling
/// crate can supply the concrete type; the world only needs to run it.
pub trait ScheduleRunner: Downcast + Send + Sync {
    fn label(&self) -> &str;
    fn run_once(&mut self, world: &mut World);
}
impl_downcast!(ScheduleRunner);

/// Interior-mutable slot for one type-erased column.
///
/// Queries resolve write references through a shared world borrow; the
/// aliasing guarantee is the stage access discipline (at most one writer or
/// any number of readers per column within a stage), the same contract the
/// executors schedule against.
pub(crate) struct ColumnCell(UnsafeCell<Box<dyn AnyColumn>>);

unsafe impl Sync for ColumnCell {}

impl ColumnCell {
    fn new(column: Box<dyn AnyColumn>) -> Self {
        ColumnCell(UnsafeCell::new(column))
    }

    fn get(&self) -> &dyn AnyColumn {
        unsafe { &**self.0.get() }
    }

    fn get_mut(&mut self) -> &mut dyn AnyColumn {
        &mut **self.0.get_mut()
    }

    /// Safety: caller must guarantee no concurrent access to this column.
    unsafe fn get_mut_unchecked(&self) -> &mut dyn AnyColumn {
        &mut **self.0.get()
    }
}

struct FilteredEntry {
    generation: u64,
    slots: Arc<Vec<SlotIndex>>,
}

/// Packed slots provided by a registered group covering a query predicate.
pub(crate) struct GroupHit<'a> {
    pub slots: &'a [SlotIndex],
    pub exact: bool,
}

pub struct World {
    registry: IndexRegistry,
    columns: Vec<Option<ColumnCell>>,
    signatures: Vec<Signature>,
    groups: GroupRegistry,
    resources: Resources,
    events: EventManager,
    schedules: FxHashMap<String, Box<dyn ScheduleRunner>>,
    current_tick: Tick,
    structural_generation: u64,
    filtered: Mutex<FxHashMap<u64, FilteredEntry>>,
}

impl Default for World {
    fn default() -> Self {
        World {
            registry: IndexRegistry::new(),
            columns: Vec::new(),
            signatures: Vec::new(),
            groups: GroupRegistry::default(),
            resources: Resources::default(),
            events: EventManager::default(),
            schedules: FxHashMap::default(),
            // tick 0 means "never"; the world starts at 1
            current_tick: 1,
            structural_generation: 0,
            filtered: Mutex::new(FxHashMap::default()),
        }
    }
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- entities -------------------------------------------------------

    pub fn spawn<S: ComponentSet>(&mut self, set: S) -> EntityId {
        let id = self.spawn_empty();
        set.insert_into(self, id);
        id
    }

    pub fn spawn_empty(&mut self) -> EntityId {
        let id = self.registry.allocate();
        let index = id.slot() as usize;
        if index >= self.signatures.len() {
            self.signatures.resize_with(index + 1, Signature::new);
        }
        trace!(entity = %id, "spawned entity");
        id
    }

    /// Removes the entity from every column it appears in, then frees the
    /// slot. Stale ids are ignored.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.registry.is_alive(id) {
            return false;
        }
        let slot = id.slot();
        let tags = self.signatures[slot as usize].tags().collect_vec();
        for tag in tags {
            self.remove_erased(slot, tag);
        }
        self.registry.free(id);
        trace!(entity = %id, "despawned entity");
        true
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.registry.is_alive(id)
    }

    pub fn live_count(&self) -> usize {
        self.registry.live_count()
    }

    pub(crate) fn id_at(&self, slot: SlotIndex) -> Option<EntityId> {
        self.registry.id_at(slot)
    }

    pub(crate) fn live_slots(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        self.registry.live_slots()
    }

    pub fn entity_signature(&self, id: EntityId) -> Option<&Signature> {
        if !self.is_alive(id) {
            return None;
        }
        self.signatures.get(id.slot() as usize)
    }

    pub(crate) fn slot_signature(&self, slot: SlotIndex) -> Option<&Signature> {
        self.signatures.get(slot as usize)
    }

    // ---- components -----------------------------------------------------

    /// Adds or overwrites a component. A stale id is a silent no-op,
    /// matching command-buffer semantics.
    pub fn add<C: Component>(&mut self, id: EntityId, component: C) {
        if !self.is_alive(id) {
            trace!(entity = %id, "add against a stale id skipped");
            return;
        }
        let tag = component_tag_of::<C>();
        let tick = self.current_tick;
        let slot = id.slot();
        let newly_added = self.ensure_column::<C>().insert(slot, component, tick);
        if newly_added {
            self.signatures[slot as usize].insert(tag);
            self.bump_structural();
            self.refresh_group_membership(slot, tag);
        }
    }

    /// Removes a component, returning its value. Stale ids and absent
    /// components return `None`.
    pub fn remove<C: Component>(&mut self, id: EntityId) -> Option<C> {
        if !self.is_alive(id) {
            return None;
        }
        let tag = component_tag_of::<C>();
        let slot = id.slot();
        if !self.signatures[slot as usize].contains(tag) {
            return None;
        }
        self.evict_from_groups_requiring(slot, tag);
        let value = self.column_mut::<C>()?.remove(slot);
        if value.is_some() {
            self.signatures[slot as usize].remove(tag);
            self.bump_structural();
            self.refresh_group_membership(slot, tag);
        }
        value
    }

    fn remove_erased(&mut self, slot: SlotIndex, tag: ComponentTag) {
        self.evict_from_groups_requiring(slot, tag);
        let removed = match self.any_column_mut(tag) {
            Some(column) => column.remove_erased(slot),
            None => false,
        };
        if removed {
            self.signatures[slot as usize].remove(tag);
            self.bump_structural();
            self.refresh_group_membership(slot, tag);
        }
    }

    pub fn get<C: Component>(&self, id: EntityId) -> Option<&C> {
        if !self.is_alive(id) {
            return None;
        }
        self.column::<C>()?.get(id.slot())
    }

    /// Exclusive access to one component; taking it stamps the changed tick.
    pub fn get_mut<C: Component>(&mut self, id: EntityId) -> Option<&mut C> {
        if !self.is_alive(id) {
            return None;
        }
        let tick = self.current_tick;
        let slot = id.slot();
        let column = self.column_mut::<C>()?;
        column.mark_changed(slot, tick);
        column.get_mut(slot)
    }

    pub fn has<C: Component>(&self, id: EntityId) -> bool {
        self.get::<C>(id).is_some()
    }

    pub fn column_len<C: Component>(&self) -> usize {
        self.column::<C>().map_or(0, Column::len)
    }

    /// Dense-order slots of a column; the first `group_size` entries of an
    /// owned column are the group's packed prefix.
    pub fn column_keys<C: Component>(&self) -> &[SlotIndex] {
        self.column::<C>().map_or(&[], Column::keys)
    }

    fn ensure_column<C: Component>(&mut self) -> &mut Column<C> {
        let index = component_tag_of::<C>().index();
        if index >= self.columns.len() {
            self.columns.resize_with(index + 1, || None);
        }
        self.columns[index]
            .get_or_insert_with(|| ColumnCell::new(Box::new(Column::<C>::new())))
            .get_mut()
            .downcast_mut::<Column<C>>()
            .expect("column table holds a foreign column type")
    }

    pub(crate) fn column<C: Component>(&self) -> Option<&Column<C>> {
        self.any_column(component_tag_of::<C>())?
            .downcast_ref::<Column<C>>()
    }

    fn column_mut<C: Component>(&mut self) -> Option<&mut Column<C>> {
        self.any_column_mut(component_tag_of::<C>())?
            .downcast_mut::<Column<C>>()
    }

    pub(crate) fn any_column(&self, tag: ComponentTag) -> Option<&dyn AnyColumn> {
        self.columns
            .get(tag.index())?
            .as_ref()
            .map(|cell| cell.get())
    }

    fn any_column_mut(&mut self, tag: ComponentTag) -> Option<&mut dyn AnyColumn> {
        self.columns
            .get_mut(tag.index())?
            .as_mut()
            .map(|cell| cell.get_mut())
    }

    /// Safety: the caller must uphold the stage access discipline: at most
    /// one writer or any number of readers per column while the borrow is
    /// used, and no structural world mutation in flight.
    pub(crate) unsafe fn column_mut_unchecked<C: Component>(&self) -> Option<&mut Column<C>> {
        let cell = self.columns.get(component_tag_of::<C>().index())?.as_ref()?;
        cell.get_mut_unchecked().downcast_mut::<Column<C>>()
    }

    // ---- groups ---------------------------------------------------------

    /// Registers an owning group over the view's required resolve tags.
    /// Panics if one of those columns is already owned by another group.
    pub fn add_group<V, F>(&mut self) -> GroupKey
    where
        V: for<'v> View<'v>,
        F: EntityFilter + Default,
    {
        let meta = meta_for::<V, F>();
        let owned: SmallVec<[ComponentTag; 4]> =
            meta.signature.difference(&meta.backstage).tags().collect();
        self.register_group(&meta, owned)
    }

    /// Registers a group that tracks membership without reordering columns.
    pub fn add_group_non_owning<V, F>(&mut self) -> GroupKey
    where
        V: for<'v> View<'v>,
        F: EntityFilter + Default,
    {
        let meta = meta_for::<V, F>();
        self.register_group(&meta, SmallVec::new())
    }

    fn register_group(&mut self, meta: &QueryMeta, owned: SmallVec<[ComponentTag; 4]>) -> GroupKey {
        let key = GroupKey {
            signature: meta.signature.clone(),
            excluded: meta.excluded.clone(),
        };
        if self.groups.find(&key).is_some() {
            return key;
        }
        for tag in &owned {
            assert!(
                !self.groups.owners.contains_key(tag),
                "component column is already owned by another group"
            );
        }

        let index = self.groups.groups.len();
        for tag in &owned {
            self.groups.owners.insert(*tag, index);
        }
        self.groups.groups.push(Group::new(key.clone(), owned));
        debug!(signature = ?key.signature, excluded = ?key.excluded, "registered group");

        // the only full rebuild: walk the smallest required column
        for slot in self.group_rebuild_candidates(&key) {
            if self.groups.groups[index].admits(&self.signatures[slot as usize]) {
                self.group_swap_in(index, slot);
            }
        }
        key
    }

    fn group_rebuild_candidates(&self, key: &GroupKey) -> Vec<SlotIndex> {
        if key.signature.is_empty() {
            return self.live_slots().collect();
        }
        let mut driver: Option<&dyn AnyColumn> = None;
        for tag in key.signature.tags() {
            match self.any_column(tag) {
                Some(column) => {
                    if driver.map_or(true, |best| column.len() < best.len()) {
                        driver = Some(column);
                    }
                }
                // a required column that was never written: no members
                None => return Vec::new(),
            }
        }
        driver.map_or_else(Vec::new, |column| column.keys().to_vec())
    }

    pub fn remove_group(&mut self, key: &GroupKey) -> bool {
        match self.groups.find(key) {
            Some(index) => {
                self.groups.groups.remove(index);
                self.groups.owners.clear();
                for (index, group) in self.groups.groups.iter().enumerate() {
                    for tag in &group.owned {
                        self.groups.owners.insert(*tag, index);
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Packed prefix length of a registered group.
    pub fn group_size(&self, key: &GroupKey) -> Option<usize> {
        self.groups
            .find(key)
            .map(|index| self.groups.groups[index].size)
    }

    pub(crate) fn best_group_slots(
        &self,
        signature: &Signature,
        excluded: &Signature,
    ) -> Option<GroupHit<'_>> {
        let (index, exact) = self.groups.best_cover(signature, excluded)?;
        let group = &self.groups.groups[index];
        let slots: &[SlotIndex] = if group.is_owning() {
            match self.any_column(group.owned[0]) {
                Some(column) => &column.keys()[..group.size],
                None => &[],
            }
        } else {
            &group.slots[..group.size]
        };
        Some(GroupHit { slots, exact })
    }

    fn group_contains(&self, group_index: usize, slot: SlotIndex) -> bool {
        let group = &self.groups.groups[group_index];
        if group.is_owning() {
            match self
                .any_column(group.owned[0])
                .and_then(|column| column.dense_index_of(slot))
            {
                Some(dense) => dense < group.size,
                None => false,
            }
        } else {
            group.positions.contains_key(&slot)
        }
    }

    /// Re-evaluates membership for every group watching `tag` after the
    /// entity's signature changed.
    fn refresh_group_membership(&mut self, slot: SlotIndex, tag: ComponentTag) {
        for group_index in 0..self.groups.groups.len() {
            if !self.groups.groups[group_index].watches(tag) {
                continue;
            }
            let admitted =
                self.groups.groups[group_index].admits(&self.signatures[slot as usize]);
            let member = self.group_contains(group_index, slot);
            if admitted && !member {
                self.group_swap_in(group_index, slot);
            } else if !admitted && member {
                self.group_swap_out(group_index, slot);
            }
        }
    }

    /// Swaps the entity out of groups that require `tag`, while its rows are
    /// still present in every owned column.
    fn evict_from_groups_requiring(&mut self, slot: SlotIndex, tag: ComponentTag) {
        for group_index in 0..self.groups.groups.len() {
            if self.groups.groups[group_index].key.signature.contains(tag)
                && self.group_contains(group_index, slot)
            {
                self.group_swap_out(group_index, slot);
            }
        }
    }

    fn group_swap_in(&mut self, group_index: usize, slot: SlotIndex) {
        let (owned, size) = {
            let group = &self.groups.groups[group_index];
            (group.owned.clone(), group.size)
        };
        if owned.is_empty() {
            let group = &mut self.groups.groups[group_index];
            group.positions.insert(slot, group.slots.len());
            group.slots.push(slot);
            group.size += 1;
            return;
        }
        // moving the entity to position `size` in every owned column keeps
        // the prefixes aligned: members already occupy the same positions
        for tag in &owned {
            let column = self
                .any_column_mut(*tag)
                .expect("owned column missing during group maintenance");
            let dense = column
                .dense_index_of(slot)
                .expect("group member missing from an owned column");
            column.swap_dense_rows(dense, size);
        }
        self.groups.groups[group_index].size = size + 1;
    }

    fn group_swap_out(&mut self, group_index: usize, slot: SlotIndex) {
        let (owned, size) = {
            let group = &self.groups.groups[group_index];
            (group.owned.clone(), group.size)
        };
        let last = size - 1;
        if owned.is_empty() {
            let group = &mut self.groups.groups[group_index];
            if let Some(position) = group.positions.remove(&slot) {
                group.slots.swap_remove(position);
                if position < group.slots.len() {
                    group.positions.insert(group.slots[position], position);
                }
                group.size = last;
            }
            return;
        }
        for tag in &owned {
            let column = self
                .any_column_mut(*tag)
                .expect("owned column missing during group maintenance");
            let dense = column
                .dense_index_of(slot)
                .expect("group member missing from an owned column");
            column.swap_dense_rows(dense, last);
        }
        self.groups.groups[group_index].size = last;
    }

    // ---- queries --------------------------------------------------------

    pub fn query<V>(&mut self) -> Query<'_, V>
    where
        V: for<'v> View<'v>,
    {
        let window = TickWindow::new(0, self.current_tick);
        unsafe { Query::unchecked(self, window) }
    }

    /// Read-only queries may be built from a shared world borrow.
    pub fn query_read<V>(&self) -> Query<'_, V>
    where
        V: for<'v> View<'v> + ReadOnly,
    {
        let window = TickWindow::new(0, self.current_tick);
        unsafe { Query::unchecked(self, window) }
    }

    pub(crate) fn filtered_slots(
        &self,
        hash: u64,
        compute: impl FnOnce() -> Vec<SlotIndex>,
    ) -> Arc<Vec<SlotIndex>> {
        let mut cache = self.filtered.lock();
        if let Some(entry) = cache.get(&hash) {
            if entry.generation == self.structural_generation {
                return entry.slots.clone();
            }
        }
        let slots = Arc::new(compute());
        cache.insert(
            hash,
            FilteredEntry {
                generation: self.structural_generation,
                slots: slots.clone(),
            },
        );
        slots
    }

    // ---- resources ------------------------------------------------------

    pub fn insert_resource<R: Resource>(&mut self, value: R) {
        self.resources.insert(value);
    }

    /// Reads a resource. Reading one that was never inserted is fatal.
    pub fn resource<R: Resource>(&self) -> Res<'_, R> {
        match self.resources.get::<R>() {
            Some(resource) => resource,
            None => missing_resource::<R>(),
        }
    }

    /// Writes a resource, bumping its version. Fatal if never inserted.
    pub fn resource_mut<R: Resource>(&self) -> ResMut<'_, R> {
        match self.resources.get_mut::<R>() {
            Some(resource) => resource,
            None => missing_resource::<R>(),
        }
    }

    pub fn try_resource<R: Resource>(&self) -> Option<Res<'_, R>> {
        self.resources.get::<R>()
    }

    pub fn try_resource_mut<R: Resource>(&self) -> Option<ResMut<'_, R>> {
        self.resources.get_mut::<R>()
    }

    pub fn make_resource_version_snapshot(&self) -> u64 {
        self.resources.version_snapshot()
    }

    pub fn updated_resources_since(&self, snapshot: u64) -> FxHashSet<ResourceKey> {
        self.resources.updated_since(snapshot)
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    // ---- events ---------------------------------------------------------

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventManager {
        &mut self.events
    }

    pub fn register_event<E: Event>(&mut self) {
        self.events.register::<E>();
    }

    // ---- ticks ----------------------------------------------------------

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// Advances the change tick. Tick 0 is reserved for "never", so the
    /// counter skips it on wraparound.
    pub fn advance_change_tick(&mut self) {
        self.current_tick = self.current_tick.wrapping_add(1);
        if self.current_tick == 0 {
            self.current_tick = 1;
        }
    }

    pub fn structural_generation(&self) -> u64 {
        self.structural_generation
    }

    fn bump_structural(&mut self) {
        self.structural_generation = self.structural_generation.wrapping_add(1);
    }

    // ---- schedules ------------------------------------------------------

    pub fn attach_schedule(&mut self, runner: Box<dyn ScheduleRunner>) {
        debug!(label = runner.label(), "attached schedule");
        self.schedules.insert(runner.label().to_string(), runner);
    }

    pub fn detach_schedule(&mut self, label: &str) -> Option<Box<dyn ScheduleRunner>> {
        self.schedules.remove(label)
    }

    pub fn schedule_runner_mut(&mut self, label: &str) -> Option<&mut dyn ScheduleRunner> {
        match self.schedules.get_mut(label) {
            Some(runner) => Some(runner.as_mut()),
            None => None,
        }
    }

    /// Runs the named schedule once. Unknown labels are fatal.
    pub fn run_schedule(&mut self, label: &str) {
        let mut runner = match self.schedules.remove(label) {
            Some(runner) => runner,
            None => panic!("unknown schedule `{}`", label),
        };
        runner.run_once(self);
        self.schedules.insert(runner.label().to_string(), runner);
    }

    /// Runs the `main` schedule.
    pub fn run(&mut self) {
        self.run_schedule(MAIN_SCHEDULE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Mass(f32);
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Charge(i32);

    #[test]
    fn spawn_inserts_components() {
        let mut world = World::new();
        let id = world.spawn((Mass(1.0), Charge(-1)));

        assert!(world.is_alive(id));
        assert_eq!(world.get::<Mass>(id), Some(&Mass(1.0)));
        assert_eq!(world.get::<Charge>(id), Some(&Charge(-1)));
        assert_eq!(world.column_len::<Mass>(), 1);
    }

    #[test]
    fn despawn_clears_columns_and_signature() {
        let mut world = World::new();
        let id = world.spawn((Mass(1.0), Charge(-1)));
        let other = world.spawn((Mass(2.0),));

        assert!(world.despawn(id));
        assert!(!world.is_alive(id));
        assert_eq!(world.column_len::<Mass>(), 1);
        assert_eq!(world.column_len::<Charge>(), 0);
        assert_eq!(world.get::<Mass>(other), Some(&Mass(2.0)));
    }

    #[test]
    fn stale_id_mutations_are_noops() {
        let mut world = World::new();
        let stale = world.spawn((Mass(1.0),));
        world.despawn(stale);
        let fresh = world.spawn((Mass(2.0),));

        // slot reuse with a newer generation
        assert_eq!(stale.slot(), fresh.slot());
        assert_ne!(stale.generation(), fresh.generation());

        world.add(stale, Charge(5));
        assert_eq!(world.remove::<Mass>(stale), None);
        assert!(!world.despawn(stale));
        assert_eq!(world.get::<Mass>(fresh), Some(&Mass(2.0)));
    }

    #[test]
    fn remove_returns_the_value() {
        let mut world = World::new();
        let id = world.spawn((Mass(3.5),));
        assert_eq!(world.remove::<Mass>(id), Some(Mass(3.5)));
        assert_eq!(world.remove::<Mass>(id), None);
        assert!(world.is_alive(id));
        assert!(world.entity_signature(id).unwrap().is_empty());
    }

    #[test]
    fn get_mut_stamps_the_changed_tick() {
        let mut world = World::new();
        let id = world.spawn((Mass(1.0),));
        world.advance_change_tick();
        world.advance_change_tick();

        world.get_mut::<Mass>(id).unwrap().0 = 9.0;
        let ticks = world.column::<Mass>().unwrap().cell_ticks(id.slot()).unwrap();
        assert_eq!(ticks.added, 1);
        assert_eq!(ticks.changed, 3);
    }

    #[test]
    fn structural_generation_tracks_shape_changes() {
        let mut world = World::new();
        let id = world.spawn_empty();
        let before = world.structural_generation();

        world.add(id, Mass(1.0));
        assert_ne!(world.structural_generation(), before);

        let overwrite_point = world.structural_generation();
        world.add(id, Mass(2.0));
        // overwriting a component is not a structural change
        assert_eq!(world.structural_generation(), overwrite_point);
    }

    #[test]
    #[should_panic(expected = "never inserted")]
    fn missing_resource_is_fatal() {
        let world = World::new();
        let _ = world.resource::<Mass>();
    }

    #[test]
    #[should_panic(expected = "unknown schedule")]
    fn unknown_schedule_is_fatal() {
        let mut world = World::new();
        world.run_schedule("nowhere");
    }
}
