//! Component tags and signatures.
//!
//! Every component type is assigned a small dense integer tag the first time
//! it is seen; tags index the world's column table and the bits of a
//! [`Signature`].

use bit_set::BitSet;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::OnceLock;

/// Marker for types storable in component columns.
pub trait Component: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Component for T {}

/// A dense integer identifying a registered component type.
///
/// Non-negative tags index columns and signature bits. The two reserved
/// negative tags never correspond to stored columns.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ComponentTag(i32);

impl ComponentTag {
    /// Synthetic tag resolving to the entity's own id.
    pub const ENTITY_ID: ComponentTag = ComponentTag(-1);
    /// Tag that is never stored.
    pub const NEVER: ComponentTag = ComponentTag(-2);

    pub fn from_index(index: usize) -> Self {
        ComponentTag(index as i32)
    }

    pub fn is_reserved(self) -> bool {
        self.0 < 0
    }

    /// The tag's column/bit index. Reserved tags have none.
    pub fn index(self) -> usize {
        debug_assert!(!self.is_reserved(), "reserved tags are not indexable");
        self.0 as usize
    }
}

static NEXT_TAG: AtomicI32 = AtomicI32::new(0);

fn tag_table() -> &'static Mutex<FxHashMap<TypeId, ComponentTag>> {
    static TABLE: OnceLock<Mutex<FxHashMap<TypeId, ComponentTag>>> = OnceLock::new();
    TABLE.get_or_init(Default::default)
}

/// Returns the process-wide tag for `T`, allocating one on first use.
pub fn component_tag_of<T: Component>() -> ComponentTag {
    let mut table = tag_table().lock();
    *table
        .entry(TypeId::of::<T>())
        .or_insert_with(|| ComponentTag(NEXT_TAG.fetch_add(1, Ordering::Relaxed)))
}

/// A set of component tags with fast superset and disjointness tests.
#[derive(Clone, Default)]
pub struct Signature {
    bits: BitSet,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(tags: &[ComponentTag]) -> Self {
        let mut signature = Signature::new();
        for tag in tags {
            signature.insert(*tag);
        }
        signature
    }

    pub fn insert(&mut self, tag: ComponentTag) {
        self.bits.insert(tag.index());
    }

    pub fn remove(&mut self, tag: ComponentTag) {
        self.bits.remove(tag.index());
    }

    pub fn contains(&self, tag: ComponentTag) -> bool {
        !tag.is_reserved() && self.bits.contains(tag.index())
    }

    pub fn union_with(&mut self, other: &Signature) {
        self.bits.union_with(&other.bits);
    }

    pub fn is_superset_of(&self, other: &Signature) -> bool {
        other.bits.is_subset(&self.bits)
    }

    pub fn is_disjoint_with(&self, other: &Signature) -> bool {
        self.bits.is_disjoint(&other.bits)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn tags(&self) -> impl Iterator<Item = ComponentTag> + '_ {
        self.bits.iter().map(ComponentTag::from_index)
    }

    /// Tags present in `self` but not in `other`.
    pub fn difference(&self, other: &Signature) -> Signature {
        let mut bits = self.bits.clone();
        bits.difference_with(&other.bits);
        Signature { bits }
    }
}

// Equality and hashing go through set contents so that two signatures built
// with different bit capacities still compare equal.
impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.bits.is_subset(&other.bits) && other.bits.is_subset(&self.bits)
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.bits.len());
        for index in self.bits.iter() {
            state.write_usize(index);
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.bits.iter()).finish()
    }
}

/// Hash identifying a query's `(signature, excluded)` pair, used as the key
/// of the world's plan caches.
pub fn query_hash(signature: &Signature, excluded: &Signature) -> u64 {
    let mut hasher = fxhash::FxHasher64::default();
    signature.hash(&mut hasher);
    hasher.write_u8(0xfe);
    excluded.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn tags_are_stable_and_distinct() {
        let a = component_tag_of::<Alpha>();
        let b = component_tag_of::<Beta>();
        assert_ne!(a, b);
        assert_eq!(a, component_tag_of::<Alpha>());
        assert!(!a.is_reserved());
    }

    #[test]
    fn reserved_tags_stand_apart() {
        assert!(ComponentTag::ENTITY_ID.is_reserved());
        assert!(ComponentTag::NEVER.is_reserved());
        assert_ne!(ComponentTag::ENTITY_ID, ComponentTag::NEVER);
    }

    #[test]
    fn superset_and_disjoint() {
        let a = ComponentTag::from_index(1);
        let b = ComponentTag::from_index(2);
        let c = ComponentTag::from_index(3);

        let ab = Signature::of(&[a, b]);
        let abc = Signature::of(&[a, b, c]);
        let c_only = Signature::of(&[c]);

        assert!(abc.is_superset_of(&ab));
        assert!(!ab.is_superset_of(&abc));
        assert!(ab.is_disjoint_with(&c_only));
        assert!(!abc.is_disjoint_with(&c_only));
    }

    #[test]
    fn equality_ignores_capacity() {
        let tag = ComponentTag::from_index(3);
        let small = Signature::of(&[tag]);

        let mut grown = Signature::new();
        grown.insert(ComponentTag::from_index(200));
        grown.remove(ComponentTag::from_index(200));
        grown.insert(tag);

        assert_eq!(small, grown);
        assert_eq!(
            query_hash(&small, &Signature::new()),
            query_hash(&grown, &Signature::new())
        );
    }

    #[test]
    fn hash_distinguishes_signature_from_excluded() {
        let tag = ComponentTag::from_index(5);
        let with = Signature::of(&[tag]);
        let empty = Signature::new();
        assert_ne!(query_hash(&with, &empty), query_hash(&empty, &with));
    }
}
