//! Precomputed packed prefixes over query signatures.
//!
//! A group mirrors the membership of a `(signature, excluded)` pair. Owning
//! groups physically reorder their owned columns so the first `size` dense
//! rows of each are exactly the member entities, in one consistent order
//! across all of them. Non-owning groups only track the member slot list.
//!
//! Membership maintenance lives on the world, which has the columns; this
//! module holds the bookkeeping.

use crate::entity::SlotIndex;
use crate::signature::{ComponentTag, Signature};
use fxhash::FxHashMap;
use smallvec::SmallVec;

/// Registration handle for a group: the predicate it mirrors.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub signature: Signature,
    pub excluded: Signature,
}

pub(crate) struct Group {
    pub key: GroupKey,
    /// Tags whose columns this group reorders. Empty for non-owning groups.
    pub owned: SmallVec<[ComponentTag; 4]>,
    /// Length of the packed prefix.
    pub size: usize,
    /// Member slots for non-owning groups; `positions` maps slot to index.
    pub slots: Vec<SlotIndex>,
    pub positions: FxHashMap<SlotIndex, usize>,
}

impl Group {
    pub fn new(key: GroupKey, owned: SmallVec<[ComponentTag; 4]>) -> Self {
        Group {
            key,
            owned,
            size: 0,
            slots: Vec::new(),
            positions: FxHashMap::default(),
        }
    }

    pub fn is_owning(&self) -> bool {
        !self.owned.is_empty()
    }

    /// Does an entity with `signature` belong in this group?
    pub fn admits(&self, signature: &Signature) -> bool {
        signature.is_superset_of(&self.key.signature)
            && signature.is_disjoint_with(&self.key.excluded)
    }

    /// Is `tag` one this group reacts to?
    pub fn watches(&self, tag: ComponentTag) -> bool {
        self.key.signature.contains(tag) || self.key.excluded.contains(tag)
    }
}

#[derive(Default)]
pub(crate) struct GroupRegistry {
    pub groups: Vec<Group>,
    /// Owning-group index per owned tag; at most one owner per column.
    pub owners: FxHashMap<ComponentTag, usize>,
}

impl GroupRegistry {
    pub fn find(&self, key: &GroupKey) -> Option<usize> {
        self.groups.iter().position(|group| group.key == *key)
    }

    /// Best cover for a query predicate: an exact group if one exists,
    /// otherwise the largest group whose signature and exclusions are both
    /// contained in the query's (so its members are a superset of the
    /// query's matches).
    pub fn best_cover(&self, signature: &Signature, excluded: &Signature) -> Option<(usize, bool)> {
        let mut best: Option<(usize, usize)> = None;
        for (index, group) in self.groups.iter().enumerate() {
            if group.key.signature == *signature && group.key.excluded == *excluded {
                return Some((index, true));
            }
            if signature.is_superset_of(&group.key.signature)
                && excluded.is_superset_of(&group.key.excluded)
            {
                let coverage = group.key.signature.len();
                if best.map_or(true, |(_, len)| coverage > len) {
                    best = Some((index, coverage));
                }
            }
        }
        best.map(|(index, _)| (index, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(index: usize) -> ComponentTag {
        ComponentTag::from_index(index)
    }

    #[test]
    fn admits_checks_both_sides() {
        let group = Group::new(
            GroupKey {
                signature: Signature::of(&[tag(0), tag(1)]),
                excluded: Signature::of(&[tag(2)]),
            },
            SmallVec::new(),
        );

        assert!(group.admits(&Signature::of(&[tag(0), tag(1)])));
        assert!(group.admits(&Signature::of(&[tag(0), tag(1), tag(3)])));
        assert!(!group.admits(&Signature::of(&[tag(0)])));
        assert!(!group.admits(&Signature::of(&[tag(0), tag(1), tag(2)])));
    }

    #[test]
    fn best_cover_prefers_exact() {
        let mut registry = GroupRegistry::default();
        registry.groups.push(Group::new(
            GroupKey {
                signature: Signature::of(&[tag(0)]),
                excluded: Signature::new(),
            },
            SmallVec::new(),
        ));
        registry.groups.push(Group::new(
            GroupKey {
                signature: Signature::of(&[tag(0), tag(1)]),
                excluded: Signature::new(),
            },
            SmallVec::new(),
        ));

        let (index, exact) = registry
            .best_cover(&Signature::of(&[tag(0), tag(1)]), &Signature::new())
            .unwrap();
        assert_eq!(index, 1);
        assert!(exact);
    }

    #[test]
    fn best_cover_takes_largest_contained_group() {
        let mut registry = GroupRegistry::default();
        registry.groups.push(Group::new(
            GroupKey {
                signature: Signature::of(&[tag(0)]),
                excluded: Signature::new(),
            },
            SmallVec::new(),
        ));
        registry.groups.push(Group::new(
            GroupKey {
                signature: Signature::of(&[tag(0), tag(1)]),
                excluded: Signature::new(),
            },
            SmallVec::new(),
        ));

        let query_signature = Signature::of(&[tag(0), tag(1), tag(2)]);
        let (index, exact) = registry
            .best_cover(&query_signature, &Signature::new())
            .unwrap();
        assert_eq!(index, 1);
        assert!(!exact);
    }

    #[test]
    fn cover_requires_exclusions_contained() {
        let mut registry = GroupRegistry::default();
        registry.groups.push(Group::new(
            GroupKey {
                signature: Signature::of(&[tag(0)]),
                excluded: Signature::of(&[tag(5)]),
            },
            SmallVec::new(),
        ));

        // query does not exclude tag 5, so group members may miss matches
        assert!(registry
            .best_cover(&Signature::of(&[tag(0), tag(1)]), &Signature::new())
            .is_none());
    }
}
