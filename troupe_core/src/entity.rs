//! Entity identifiers and slot allocation.

use std::fmt::{self, Display};

/// Dense index identifying an entity's position across all sparse maps.
pub type SlotIndex = u32;

/// Disambiguates reuse of a slot. Odd generations are live.
pub type Generation = u32;

/// A handle to an entity. Cheap to copy; stale handles are detected through
/// the generation counter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    slot: SlotIndex,
    generation: Generation,
}

impl EntityId {
    pub fn new(slot: SlotIndex, generation: Generation) -> Self {
        EntityId { slot, generation }
    }

    pub fn slot(self) -> SlotIndex {
        self.slot
    }

    pub fn generation(self) -> Generation {
        self.generation
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.slot, self.generation)
    }
}

/// Allocates entity slots and tracks per-slot generations.
///
/// Freed slots are recycled LIFO. A slot's generation is odd exactly while
/// the slot is live; freeing bumps it to even, reallocating bumps it back to
/// odd, so no stale handle can ever match again.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    generations: Vec<Generation>,
    free: Vec<SlotIndex>,
    live: usize,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> EntityId {
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            let generation = &mut self.generations[slot as usize];
            *generation = generation.wrapping_add(1);
            EntityId::new(slot, *generation)
        } else {
            let slot = self.generations.len() as SlotIndex;
            self.generations.push(1);
            EntityId::new(slot, 1)
        }
    }

    /// Frees a live slot. Stale handles are ignored and return `false`.
    pub fn free(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let generation = &mut self.generations[id.slot as usize];
        *generation = generation.wrapping_add(1);
        self.free.push(id.slot);
        self.live -= 1;
        true
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.generations
            .get(id.slot as usize)
            .map_or(false, |generation| {
                *generation == id.generation && generation & 1 == 1
            })
    }

    /// Reconstructs the live handle stored at `slot`, if any.
    pub fn id_at(&self, slot: SlotIndex) -> Option<EntityId> {
        self.generations
            .get(slot as usize)
            .filter(|generation| *generation & 1 == 1)
            .map(|generation| EntityId::new(slot, *generation))
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn slot_count(&self) -> usize {
        self.generations.len()
    }

    pub fn live_slots(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        self.generations
            .iter()
            .enumerate()
            .filter(|(_, generation)| *generation & 1 == 1)
            .map(|(slot, _)| slot as SlotIndex)
    }
}
