//! Typed queries over the world's columns.
//!
//! A query is a tuple of view parts plus an optional filter. Construction
//! derives the signatures once; execution picks the smallest required
//! column (or a registered group's packed prefix) as the driver, walks its
//! dense keys, and runs the membership and tick-window tests per candidate
//! before resolving the view.

mod filter;
mod view;

pub use filter::{added, changed, with, without};
pub use filter::{Added, And, Changed, EntityFilter, Passthrough, With, Without};
pub use view::{EntityIdProbe, Mut, Read, ReadOnly, TryRead, TryWrite, View, Write};

use crate::entity::SlotIndex;
use crate::signature::{query_hash, ComponentTag, Signature};
use crate::storage::AnyColumn;
use crate::tick::{CellTicks, TickWindow};
use crate::world::World;
use smallvec::SmallVec;
use std::marker::PhantomData;
use std::sync::Arc;

/// The signatures and filters a query derives from its parts.
#[derive(Clone, Debug, Default)]
pub struct QueryMeta {
    pub signature: Signature,
    pub excluded: Signature,
    pub read: Signature,
    pub write: Signature,
    pub backstage: Signature,
    pub added_filters: SmallVec<[ComponentTag; 2]>,
    pub changed_filters: SmallVec<[ComponentTag; 2]>,
    pub needs_entity_id: bool,
}

impl QueryMeta {
    /// Records a read resolve. Repeating a tag across resolves is fatal.
    pub fn add_read(&mut self, tag: ComponentTag) {
        assert!(
            !self.read.contains(tag) && !self.write.contains(tag),
            "query resolves the same component twice"
        );
        self.read.insert(tag);
    }

    /// Records a write resolve. Repeating a tag across resolves is fatal.
    pub fn add_write(&mut self, tag: ComponentTag) {
        assert!(
            !self.read.contains(tag) && !self.write.contains(tag),
            "query resolves the same component twice"
        );
        self.write.insert(tag);
    }

    pub fn query_hash(&self) -> u64 {
        query_hash(&self.signature, &self.excluded)
    }
}

/// Derives the combined metadata of a view tuple and a filter type.
pub fn meta_for<V, F>() -> QueryMeta
where
    V: for<'v> View<'v>,
    F: EntityFilter + Default,
{
    let mut meta = QueryMeta::default();
    <V as View<'static>>::describe(&mut meta);
    F::default().describe(&mut meta);
    meta
}

enum Driver<'w> {
    /// A required column was never created; nothing can match.
    Nothing,
    /// A registered group's packed prefix. `exact` skips the membership test.
    Packed { slots: &'w [SlotIndex], exact: bool },
    /// Dense keys of the smallest required column.
    Keys(&'w [SlotIndex]),
    /// Every live slot; used when the signature is empty.
    Live(Vec<SlotIndex>),
}

pub struct Query<'w, V>
where
    V: for<'v> View<'v>,
{
    world: &'w World,
    meta: QueryMeta,
    window: TickWindow,
    _view: PhantomData<V>,
}

impl<'w, V> Query<'w, V>
where
    V: for<'v> View<'v>,
{
    /// Builds a query over a shared world borrow.
    ///
    /// Safety: the caller must guarantee the stage access discipline for the
    /// view's writes (within a stage, at most one writer or any number of
    /// readers per column) and that no structural world mutation happens
    /// while the query (or anything it resolved) is alive. `World::query`
    /// provides this through `&mut World`; executors provide it through the
    /// stagehand's conflict rules.
    pub unsafe fn unchecked(world: &'w World, window: TickWindow) -> Self {
        let mut meta = QueryMeta::default();
        <V as View<'static>>::describe(&mut meta);
        Query {
            world,
            meta,
            window,
            _view: PhantomData,
        }
    }

    /// Narrows the query with a filter.
    pub fn filter<F: EntityFilter>(mut self, filter: F) -> Self {
        filter.describe(&mut self.meta);
        self
    }

    /// Replaces the tick snapshot the query evaluates Added/Changed against.
    pub fn with_window(mut self, window: TickWindow) -> Self {
        self.window = TickWindow::new(window.last_run, window.this_run);
        self
    }

    pub fn meta(&self) -> &QueryMeta {
        &self.meta
    }

    pub fn window(&self) -> TickWindow {
        self.window
    }

    fn driver(&self) -> Driver<'w> {
        if let Some(hit) = self
            .world
            .best_group_slots(&self.meta.signature, &self.meta.excluded)
        {
            return Driver::Packed {
                slots: hit.slots,
                exact: hit.exact,
            };
        }
        if self.meta.signature.is_empty() {
            return Driver::Live(self.world.live_slots().collect());
        }
        for tag in self.meta.signature.tags() {
            if self.world.any_column(tag).is_none() {
                return Driver::Nothing;
            }
        }
        // prefer delivered tags; backstage requirements only drive when
        // nothing else can
        let delivered = self.meta.signature.difference(&self.meta.backstage);
        let pool = if delivered.is_empty() {
            &self.meta.signature
        } else {
            &delivered
        };
        let mut best: Option<&'w dyn AnyColumn> = None;
        for tag in pool.tags() {
            if let Some(column) = self.world.any_column(tag) {
                if best.map_or(true, |current| column.len() < current.len()) {
                    best = Some(column);
                }
            }
        }
        match best {
            Some(column) => Driver::Keys(column.keys()),
            None => Driver::Nothing,
        }
    }

    fn matches_structural(&self, slot: SlotIndex) -> bool {
        match self.world.slot_signature(slot) {
            Some(signature) => {
                signature.is_superset_of(&self.meta.signature)
                    && signature.is_disjoint_with(&self.meta.excluded)
            }
            None => false,
        }
    }

    fn cell_ticks(&self, tag: ComponentTag, slot: SlotIndex) -> Option<CellTicks> {
        let column = self.world.any_column(tag)?;
        let dense = column.dense_index_of(slot)?;
        Some(column.cell_ticks_at(dense))
    }

    fn matches_ticks(&self, slot: SlotIndex) -> bool {
        self.meta.added_filters.iter().all(|tag| {
            self.cell_ticks(*tag, slot)
                .map_or(false, |ticks| self.window.accepts_added(ticks))
        }) && self.meta.changed_filters.iter().all(|tag| {
            self.cell_ticks(*tag, slot)
                .map_or(false, |ticks| self.window.accepts_changed(ticks))
        })
    }

    fn matches(&self, slot: SlotIndex, skip_structural: bool) -> bool {
        (skip_structural || self.matches_structural(slot)) && self.matches_ticks(slot)
    }

    fn run_over<H>(&self, slots: &[SlotIndex], exact: bool, handler: &mut H)
    where
        H: FnMut(<V as View<'w>>::Item),
    {
        for &slot in slots {
            if self.matches(slot, exact) {
                handler(unsafe { V::resolve(self.world, slot, self.window) });
            }
        }
    }

    /// Calls `handler` once per matching entity, single-threaded.
    pub fn for_each<H>(&self, mut handler: H)
    where
        H: FnMut(<V as View<'w>>::Item),
    {
        match self.driver() {
            Driver::Nothing => {}
            Driver::Packed { slots, exact } => self.run_over(slots, exact, &mut handler),
            Driver::Keys(keys) => self.run_over(keys, false, &mut handler),
            Driver::Live(slots) => self.run_over(&slots, false, &mut handler),
        }
    }

    fn structural_matches(&self) -> Vec<SlotIndex> {
        let mut matches = Vec::new();
        let mut collect = |slots: &[SlotIndex], exact: bool| {
            for &slot in slots {
                if exact || self.matches_structural(slot) {
                    matches.push(slot);
                }
            }
        };
        match self.driver() {
            Driver::Nothing => {}
            Driver::Packed { slots, exact } => collect(slots, exact),
            Driver::Keys(keys) => collect(keys, false),
            Driver::Live(slots) => collect(&slots, false),
        }
        matches
    }

    fn preloaded(&self) -> Arc<Vec<SlotIndex>> {
        self.world
            .filtered_slots(self.meta.query_hash(), || self.structural_matches())
    }

    /// Like [`for_each`](Self::for_each), but drives from an exact group or
    /// the cached membership snapshot instead of re-running the membership
    /// test. The cache is invalidated by any structural world change.
    pub fn for_each_preloaded<H>(&self, mut handler: H)
    where
        H: FnMut(<V as View<'w>>::Item),
    {
        if let Some(hit) = self
            .world
            .best_group_slots(&self.meta.signature, &self.meta.excluded)
        {
            if hit.exact {
                self.run_over(hit.slots, true, &mut handler);
                return;
            }
        }
        let slots = self.preloaded();
        for &slot in slots.iter() {
            if self.matches_ticks(slot) {
                handler(unsafe { V::resolve(self.world, slot, self.window) });
            }
        }
    }

    /// First read-only match, scanning in driver order.
    pub fn fetch_one(&self) -> Option<<V as View<'w>>::Item>
    where
        V: ReadOnly,
    {
        let slot = self.first_match()?;
        Some(unsafe { V::resolve(self.world, slot, self.window) })
    }

    fn first_match(&self) -> Option<SlotIndex> {
        let find = |slots: &[SlotIndex], exact: bool| {
            slots.iter().copied().find(|slot| self.matches(*slot, exact))
        };
        match self.driver() {
            Driver::Nothing => None,
            Driver::Packed { slots, exact } => find(slots, exact),
            Driver::Keys(keys) => find(keys, false),
            Driver::Live(slots) => find(&slots, false),
        }
    }

    /// Number of matching entities, without resolving any of them.
    pub fn count(&self) -> usize {
        let mut count = 0;
        let mut tally = |slots: &[SlotIndex], exact: bool| {
            count += slots
                .iter()
                .filter(|slot| self.matches(**slot, exact))
                .count();
        };
        match self.driver() {
            Driver::Nothing => {}
            Driver::Packed { slots, exact } => tally(slots, exact),
            Driver::Keys(keys) => tally(keys, false),
            Driver::Live(slots) => tally(&slots, false),
        }
        count
    }

    fn snapshot_matches(&self) -> Matches<'w, V> {
        let mut slots = Vec::new();
        let mut collect = |candidates: &[SlotIndex], exact: bool| {
            for &slot in candidates {
                if self.matches(slot, exact) {
                    slots.push(slot);
                }
            }
        };
        match self.driver() {
            Driver::Nothing => {}
            Driver::Packed { slots, exact } => collect(slots, exact),
            Driver::Keys(keys) => collect(keys, false),
            Driver::Live(candidates) => collect(&candidates, false),
        }
        Matches {
            world: self.world,
            slots,
            cursor: 0,
            window: self.window,
            _view: PhantomData,
        }
    }

    /// Lazily resolves every match from a slot snapshot taken now.
    pub fn fetch_all(&self) -> Matches<'w, V>
    where
        V: ReadOnly,
    {
        self.snapshot_matches()
    }

    /// Writable variant of [`fetch_all`](Self::fetch_all).
    ///
    /// Safety: the caller asserts that no two items of the sequence alias a
    /// cell and that the world outlives every resolved reference without
    /// structural mutation in between.
    pub unsafe fn fetch_all_writable(&self) -> Matches<'w, V> {
        self.snapshot_matches()
    }

    /// Resolves all matches, then invokes `handler` for every ordered pair
    /// `(i, j)` with `i < j`.
    pub fn combinations<H>(&self, mut handler: H)
    where
        H: FnMut(&mut <V as View<'w>>::Item, &mut <V as View<'w>>::Item),
    {
        let mut items = Vec::new();
        let mut collect = |slots: &[SlotIndex], exact: bool| {
            for &slot in slots {
                if self.matches(slot, exact) {
                    items.push(unsafe { V::resolve(self.world, slot, self.window) });
                }
            }
        };
        match self.driver() {
            Driver::Nothing => {}
            Driver::Packed { slots, exact } => collect(slots, exact),
            Driver::Keys(keys) => collect(keys, false),
            Driver::Live(slots) => collect(&slots, false),
        }
        for first in 0..items.len() {
            let (head, tail) = items.split_at_mut(first + 1);
            let a = &mut head[first];
            for b in tail.iter_mut() {
                handler(a, b);
            }
        }
    }
}

#[cfg(feature = "par-iter")]
impl<'w, V> Query<'w, V>
where
    V: for<'v> View<'v>,
{
    fn par_run_over<H>(&self, slots: &[SlotIndex], exact: bool, handler: &H)
    where
        H: Fn(<V as View<'w>>::Item) + Send + Sync,
    {
        use rayon::prelude::*;

        if slots.is_empty() {
            return;
        }
        let workers = rayon::current_num_threads().max(1);
        let chunk = (slots.len() + workers - 1) / workers;
        slots.par_chunks(chunk).for_each(|candidates| {
            for &slot in candidates {
                if self.matches(slot, exact) {
                    handler(unsafe { V::resolve(self.world, slot, self.window) });
                }
            }
        });
    }

    /// Parallel [`for_each`](Self::for_each): candidates are split into
    /// `ceil(N / cores)` chunks. No visit order is guaranteed. Every chunk
    /// still runs the full membership and tick tests.
    pub fn par_for_each<H>(&self, handler: H)
    where
        H: Fn(<V as View<'w>>::Item) + Send + Sync,
    {
        match self.driver() {
            Driver::Nothing => {}
            Driver::Packed { slots, exact } => self.par_run_over(slots, exact, &handler),
            Driver::Keys(keys) => self.par_run_over(keys, false, &handler),
            Driver::Live(slots) => self.par_run_over(&slots, false, &handler),
        }
    }

    /// Parallel [`for_each_preloaded`](Self::for_each_preloaded).
    pub fn par_for_each_preloaded<H>(&self, handler: H)
    where
        H: Fn(<V as View<'w>>::Item) + Send + Sync,
    {
        use rayon::prelude::*;

        if let Some(hit) = self
            .world
            .best_group_slots(&self.meta.signature, &self.meta.excluded)
        {
            if hit.exact {
                self.par_run_over(hit.slots, true, &handler);
                return;
            }
        }
        let slots = self.preloaded();
        if slots.is_empty() {
            return;
        }
        let workers = rayon::current_num_threads().max(1);
        let chunk = (slots.len() + workers - 1) / workers;
        slots.par_chunks(chunk).for_each(|candidates| {
            for &slot in candidates {
                if self.matches_ticks(slot) {
                    handler(unsafe { V::resolve(self.world, slot, self.window) });
                }
            }
        });
    }
}

/// Lazy sequence over a snapshot of matching slots.
pub struct Matches<'w, V>
where
    V: for<'v> View<'v>,
{
    world: &'w World,
    slots: Vec<SlotIndex>,
    cursor: usize,
    window: TickWindow,
    _view: PhantomData<V>,
}

impl<'w, V> Iterator for Matches<'w, V>
where
    V: for<'v> View<'v>,
{
    type Item = <V as View<'w>>::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = *self.slots.get(self.cursor)?;
        self.cursor += 1;
        Some(unsafe { V::resolve(self.world, slot, self.window) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.slots.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl<'w, V> ExactSizeIterator for Matches<'w, V> where V: for<'v> View<'v> {}
