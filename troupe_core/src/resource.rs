//! Singleton resources keyed by type, with per-write version tracking.

use crate::borrow::{AtomicRefCell, Ref, RefMut};
use downcast_rs::{impl_downcast, Downcast};
use fxhash::{FxHashMap, FxHashSet};
use std::any::{type_name, TypeId};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

pub trait Resource: Downcast + Send + Sync {}
impl<T: Send + Sync + 'static> Resource for T {}
impl_downcast!(Resource);

/// Stable identifier for a resource type.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ResourceKey(TypeId);

impl ResourceKey {
    pub fn of<R: Resource>() -> Self {
        ResourceKey(TypeId::of::<R>())
    }
}

struct ResourceSlot {
    cell: AtomicRefCell<Box<dyn Resource>>,
    version: AtomicU64,
}

/// A shared borrow of a resource.
pub struct Res<'a, T> {
    inner: Ref<'a, T>,
}

impl<'a, T> Deref for Res<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

/// An exclusive borrow of a resource. Taking one counts as a write.
pub struct ResMut<'a, T> {
    inner: RefMut<'a, T>,
}

impl<'a, T> Deref for ResMut<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<'a, T> DerefMut for ResMut<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// The world's resource table. Each write bumps the slot's version from a
/// global monotonic counter, so hosts can ask which resources changed since
/// a snapshot.
#[derive(Default)]
pub struct Resources {
    storage: FxHashMap<ResourceKey, ResourceSlot>,
    counter: AtomicU64,
}

impl Resources {
    pub fn insert<R: Resource>(&mut self, value: R) {
        let version = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.storage.insert(
            ResourceKey::of::<R>(),
            ResourceSlot {
                cell: AtomicRefCell::new(Box::new(value)),
                version: AtomicU64::new(version),
            },
        );
    }

    pub fn contains<R: Resource>(&self) -> bool {
        self.storage.contains_key(&ResourceKey::of::<R>())
    }

    pub fn get<R: Resource>(&self) -> Option<Res<'_, R>> {
        let slot = self.storage.get(&ResourceKey::of::<R>())?;
        Some(Res {
            inner: slot.cell.get().map(|boxed| {
                boxed
                    .downcast_ref::<R>()
                    .expect("resource slot holds a foreign type")
            }),
        })
    }

    pub fn get_mut<R: Resource>(&self) -> Option<ResMut<'_, R>> {
        let slot = self.storage.get(&ResourceKey::of::<R>())?;
        let version = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        slot.version.store(version, Ordering::Relaxed);
        Some(ResMut {
            inner: slot.cell.get_mut().map_into(|boxed| {
                boxed
                    .downcast_mut::<R>()
                    .expect("resource slot holds a foreign type")
            }),
        })
    }

    /// Current value of the global write counter.
    pub fn version_snapshot(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Keys of every resource written after `snapshot` was taken.
    pub fn updated_since(&self, snapshot: u64) -> FxHashSet<ResourceKey> {
        self.storage
            .iter()
            .filter(|(_, slot)| slot.version.load(Ordering::Relaxed) > snapshot)
            .map(|(key, _)| *key)
            .collect()
    }
}

/// Fatal lookup used by the world surface: reading a resource that was never
/// inserted is a contract violation.
pub(crate) fn missing_resource<R>() -> ! {
    panic!("resource `{}` was never inserted", type_name::<R>())
}
