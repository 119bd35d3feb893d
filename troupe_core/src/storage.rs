//! Per-component-type sparse-set columns.
//!
//! A column packs values densely, keeps the owning slot of every dense row
//! in `keys`, and maps slots back to dense rows through a paged sparse map.
//! A parallel buffer of change ticks mirrors the dense values row for row.

use crate::entity::SlotIndex;
use crate::paging::{PagedBuffer, PagedSlotMap, NOT_FOUND};
use crate::signature::Component;
use crate::tick::{CellTicks, Tick};
use downcast_rs::{impl_downcast, Downcast};

pub struct Column<T> {
    dense: PagedBuffer<T>,
    keys: Vec<SlotIndex>,
    slot_to_dense: PagedSlotMap,
    ticks: PagedBuffer<CellTicks>,
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Column {
            dense: PagedBuffer::new(),
            keys: Vec::new(),
            slot_to_dense: PagedSlotMap::new(),
            ticks: PagedBuffer::new(),
        }
    }
}

impl<T: Component> Column<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    pub fn contains(&self, slot: SlotIndex) -> bool {
        self.slot_to_dense.contains(slot)
    }

    pub fn dense_index_of(&self, slot: SlotIndex) -> Option<usize> {
        match self.slot_to_dense.get(slot) {
            NOT_FOUND => None,
            index => Some(index as usize),
        }
    }

    /// Inserts or overwrites the value for `slot`. Returns `true` when the
    /// slot was newly added to the column.
    pub fn insert(&mut self, slot: SlotIndex, value: T, tick: Tick) -> bool {
        match self.dense_index_of(slot) {
            Some(dense) => {
                *self
                    .dense
                    .get_mut(dense)
                    .expect("slot map points past dense length") = value;
                self.ticks
                    .get_mut(dense)
                    .expect("tick row missing for dense row")
                    .changed = tick;
                false
            }
            None => {
                let dense = self.dense.append(value);
                self.keys.push(slot);
                self.ticks.append(CellTicks::stamped(tick));
                self.slot_to_dense.set(slot, dense as i32);
                true
            }
        }
    }

    /// Removes `slot`'s value by swapping the last dense row into its place.
    pub fn remove(&mut self, slot: SlotIndex) -> Option<T> {
        let dense = self.dense_index_of(slot)?;
        let last = self.dense.len() - 1;
        if dense != last {
            self.dense.swap(dense, last);
            self.ticks.swap(dense, last);
            self.keys.swap(dense, last);
            let moved = self.keys[dense];
            self.slot_to_dense.set(moved, dense as i32);
        }
        self.keys.pop();
        self.ticks.remove_last();
        self.slot_to_dense.set(slot, NOT_FOUND);
        self.dense.remove_last()
    }

    pub fn get(&self, slot: SlotIndex) -> Option<&T> {
        self.dense.get(self.dense_index_of(slot)?)
    }

    pub fn get_mut(&mut self, slot: SlotIndex) -> Option<&mut T> {
        let dense = self.dense_index_of(slot)?;
        self.dense.get_mut(dense)
    }

    pub fn get_dense(&self, dense: usize) -> Option<&T> {
        self.dense.get(dense)
    }

    pub fn mark_changed(&mut self, slot: SlotIndex, tick: Tick) {
        if let Some(dense) = self.dense_index_of(slot) {
            if let Some(ticks) = self.ticks.get_mut(dense) {
                ticks.changed = tick;
            }
        }
    }

    pub fn cell_ticks(&self, slot: SlotIndex) -> Option<CellTicks> {
        self.ticks.get(self.dense_index_of(slot)?).copied()
    }

    /// Dense-order slots; `keys()[i]` owns the value at dense row `i`.
    pub fn keys(&self) -> &[SlotIndex] {
        &self.keys
    }

    /// Mutable access to a dense row's value and tick cell together,
    /// used by write-capable query resolvers.
    pub(crate) fn write_cell(&mut self, dense: usize) -> Option<(&mut T, &mut CellTicks)> {
        let value = self.dense.get_mut(dense)?;
        let ticks = self.ticks.get_mut(dense)?;
        Some((value, ticks))
    }

    /// Swaps two dense rows across values, keys and ticks, fixing up the
    /// sparse map for both. Owning groups use this to maintain their packed
    /// prefixes.
    pub fn swap_dense(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.dense.swap(a, b);
        self.ticks.swap(a, b);
        self.keys.swap(a, b);
        self.slot_to_dense.set(self.keys[a], a as i32);
        self.slot_to_dense.set(self.keys[b], b as i32);
    }

    /// Asserts the column's structural invariants. Test support.
    #[doc(hidden)]
    pub fn validate(&self) {
        assert_eq!(self.keys.len(), self.dense.len());
        assert_eq!(self.ticks.len(), self.dense.len());
        for (dense, slot) in self.keys.iter().enumerate() {
            assert_eq!(
                self.slot_to_dense.get(*slot),
                dense as i32,
                "slot {} does not map back to dense row {}",
                slot,
                dense
            );
        }
    }
}

/// Type-erased column surface used for despawn sweeps and group maintenance.
pub trait AnyColumn: Downcast + Send + Sync {
    fn len(&self) -> usize;
    fn contains(&self, slot: SlotIndex) -> bool;
    fn dense_index_of(&self, slot: SlotIndex) -> Option<usize>;
    fn keys(&self) -> &[SlotIndex];
    fn cell_ticks_at(&self, dense: usize) -> CellTicks;
    fn remove_erased(&mut self, slot: SlotIndex) -> bool;
    fn swap_dense_rows(&mut self, a: usize, b: usize);
}
impl_downcast!(AnyColumn);

impl<T: Component> AnyColumn for Column<T> {
    fn len(&self) -> usize {
        Column::len(self)
    }

    fn contains(&self, slot: SlotIndex) -> bool {
        Column::contains(self, slot)
    }

    fn dense_index_of(&self, slot: SlotIndex) -> Option<usize> {
        Column::dense_index_of(self, slot)
    }

    fn keys(&self) -> &[SlotIndex] {
        Column::keys(self)
    }

    fn cell_ticks_at(&self, dense: usize) -> CellTicks {
        self.ticks
            .get(dense)
            .copied()
            .expect("tick row missing for dense row")
    }

    fn remove_erased(&mut self, slot: SlotIndex) -> bool {
        Column::remove(self, slot).is_some()
    }

    fn swap_dense_rows(&mut self, a: usize, b: usize) {
        Column::swap_dense(self, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::DENSE_PAGE_SIZE;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Weight(u32);

    #[test]
    fn insert_then_lookup() {
        let mut column = Column::new();
        assert!(column.insert(4, Weight(40), 1));
        assert!(column.insert(9, Weight(90), 1));
        assert_eq!(column.get(4), Some(&Weight(40)));
        assert_eq!(column.get(9), Some(&Weight(90)));
        assert_eq!(column.get(5), None);
        column.validate();
    }

    #[test]
    fn overwrite_updates_changed_tick_only() {
        let mut column = Column::new();
        column.insert(4, Weight(40), 1);
        assert!(!column.insert(4, Weight(41), 3));
        assert_eq!(column.len(), 1);
        let ticks = column.cell_ticks(4).unwrap();
        assert_eq!(ticks.added, 1);
        assert_eq!(ticks.changed, 3);
    }

    #[test]
    fn remove_swaps_last_into_hole() {
        let mut column = Column::new();
        column.insert(1, Weight(10), 1);
        column.insert(2, Weight(20), 1);
        column.insert(3, Weight(30), 1);

        assert_eq!(column.remove(1), Some(Weight(10)));
        assert_eq!(column.len(), 2);
        assert_eq!(column.get(1), None);
        assert_eq!(column.get(3), Some(&Weight(30)));
        assert_eq!(column.keys(), &[3, 2]);
        column.validate();
    }

    #[test]
    fn remove_last_row_pops() {
        let mut column = Column::new();
        column.insert(1, Weight(10), 1);
        column.insert(2, Weight(20), 1);
        assert_eq!(column.remove(2), Some(Weight(20)));
        assert_eq!(column.keys(), &[1]);
        column.validate();
    }

    #[test]
    fn add_then_remove_leaves_column_len_unchanged() {
        let mut column = Column::new();
        column.insert(7, Weight(70), 1);
        let before = column.len();
        column.insert(8, Weight(80), 2);
        column.remove(8);
        assert_eq!(column.len(), before);
        column.validate();
    }

    #[test]
    fn swap_dense_fixes_sparse_map() {
        let mut column = Column::new();
        for slot in 0..5 {
            column.insert(slot, Weight(slot * 10), 1);
        }
        column.swap_dense(0, 4);
        assert_eq!(column.keys(), &[4, 1, 2, 3, 0]);
        for slot in 0..5 {
            assert_eq!(column.get(slot), Some(&Weight(slot * 10)));
        }
        column.validate();
    }

    #[test]
    fn grows_and_shrinks_across_pages() {
        let mut column = Column::new();
        let count = (DENSE_PAGE_SIZE + 3) as u32;
        for slot in 0..count {
            column.insert(slot, Weight(slot), 1);
        }
        for slot in (0..count).rev() {
            assert_eq!(column.remove(slot), Some(Weight(slot)));
        }
        assert!(column.is_empty());
        column.validate();
    }
}
