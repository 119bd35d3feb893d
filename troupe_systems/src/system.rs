//! Systems: metadata describing access, the trait executors run, and the
//! builder producing closure-backed systems.

use derivative::Derivative;
use smallvec::SmallVec;
use std::any::{type_name, TypeId};
use troupe_core::borrow::AtomicRefCell;
use troupe_core::command::CommandBuffer;
use troupe_core::event::{ChannelRegistrar, Event, EventManager, EventReader, EventsRef};
use troupe_core::query::{meta_for, EntityFilter, Passthrough, Query, View};
use troupe_core::resource::{Res, ResMut, Resource, ResourceKey};
use troupe_core::signature::{component_tag_of, Component, Signature};
use troupe_core::tick::TickWindow;
use troupe_core::world::World;

/// Identifies a system. Derived from the system's name, so `run_after`
/// edges can be declared by name before the target system is built.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SystemId(u64);

impl SystemId {
    pub fn of_name(name: &str) -> Self {
        SystemId(fxhash::hash64(name))
    }
}

/// Read/write access to a keyed collaborator (resources).
#[derive(Derivative, Debug, Clone)]
#[derivative(Default(bound = ""))]
pub struct Access<T> {
    pub reads: Vec<T>,
    pub writes: Vec<T>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventMode {
    Read,
    Write,
    Drain,
}

/// Declared access to one event channel. Carries a registrar so schedules
/// can materialize the channel when the system is added.
#[derive(Clone)]
pub struct EventAccess {
    pub key: TypeId,
    pub mode: EventMode,
    pub registrar: ChannelRegistrar,
}

/// Everything the stagehand needs to know about a system.
#[derive(Clone)]
pub struct SystemMeta {
    pub id: SystemId,
    pub name: String,
    pub reads: Signature,
    pub writes: Signature,
    pub excluded: Signature,
    pub resources: Access<ResourceKey>,
    pub events: Vec<EventAccess>,
    pub run_after: SmallVec<[SystemId; 2]>,
}

impl SystemMeta {
    pub fn new(name: &str) -> Self {
        SystemMeta {
            id: SystemId::of_name(name),
            name: name.to_string(),
            reads: Signature::new(),
            writes: Signature::new(),
            excluded: Signature::new(),
            resources: Access::default(),
            events: Vec::new(),
            run_after: SmallVec::new(),
        }
    }

    pub fn event_mode(&self, key: TypeId) -> Option<EventMode> {
        self.events
            .iter()
            .find(|access| access.key == key)
            .map(|access| access.mode)
    }
}

/// A schedulable unit of work.
pub trait System: Send + Sync {
    fn id(&self) -> SystemId;
    fn metadata(&self) -> &SystemMeta;
    fn run(&self, ctx: &SystemContext<'_>, commands: &mut CommandBuffer);
}

/// The world access a system body receives.
///
/// Every accessor asserts the access was declared in the system's metadata;
/// undeclared access would bypass the stagehand's conflict analysis, so it
/// is fatal.
pub struct SystemContext<'w> {
    world: &'w World,
    meta: &'w SystemMeta,
    window: TickWindow,
}

impl<'w> SystemContext<'w> {
    pub fn new(world: &'w World, meta: &'w SystemMeta, window: TickWindow) -> Self {
        SystemContext {
            world,
            meta,
            window,
        }
    }

    pub fn world(&self) -> &'w World {
        self.world
    }

    pub fn window(&self) -> TickWindow {
        self.window
    }

    /// Builds a query carrying this system's tick snapshot.
    pub fn query<V>(&self) -> Query<'w, V>
    where
        V: for<'v> View<'v>,
    {
        self.query_filtered::<V, Passthrough>()
    }

    /// Builds a filtered query carrying this system's tick snapshot.
    pub fn query_filtered<V, F>(&self) -> Query<'w, V>
    where
        V: for<'v> View<'v>,
        F: EntityFilter + Default,
    {
        let requested = meta_for::<V, F>();
        let mut declared_reads = self.meta.reads.clone();
        declared_reads.union_with(&self.meta.writes);
        assert!(
            declared_reads.is_superset_of(&requested.read)
                && declared_reads.is_superset_of(&requested.backstage),
            "system `{}` queries components it did not declare",
            self.meta.name
        );
        assert!(
            self.meta.writes.is_superset_of(&requested.write),
            "system `{}` writes components it did not declare",
            self.meta.name
        );
        unsafe { Query::unchecked(self.world, self.window).filter(F::default()) }
    }

    pub fn resource<R: Resource>(&self) -> Res<'w, R> {
        let key = ResourceKey::of::<R>();
        assert!(
            self.meta.resources.reads.contains(&key) || self.meta.resources.writes.contains(&key),
            "system `{}` reads resource `{}` without declaring it",
            self.meta.name,
            type_name::<R>()
        );
        self.world.resource::<R>()
    }

    pub fn resource_mut<R: Resource>(&self) -> ResMut<'w, R> {
        let key = ResourceKey::of::<R>();
        assert!(
            self.meta.resources.writes.contains(&key),
            "system `{}` writes resource `{}` without declaring it",
            self.meta.name,
            type_name::<R>()
        );
        self.world.resource_mut::<R>()
    }

    pub fn send<E: Event>(&self, event: E) {
        assert!(
            self.meta.event_mode(TypeId::of::<E>()) == Some(EventMode::Write),
            "system `{}` sends `{}` without declaring write access",
            self.meta.name,
            type_name::<E>()
        );
        self.world.events().send(event);
    }

    pub fn read_events<E: Event>(&self, reader: &mut EventReader<E>) -> EventsRef<'w, E> {
        assert!(
            self.meta.event_mode(TypeId::of::<E>()) == Some(EventMode::Read),
            "system `{}` reads `{}` without declaring read access",
            self.meta.name,
            type_name::<E>()
        );
        self.world.events().read(reader)
    }

    pub fn drain_events<E: Event>(&self) -> Vec<E> {
        assert!(
            self.meta.event_mode(TypeId::of::<E>()) == Some(EventMode::Drain),
            "system `{}` drains `{}` without declaring drain access",
            self.meta.name,
            type_name::<E>()
        );
        self.world.events().drain::<E>()
    }
}

/// A system wrapping a closure. The closure lives in an atomic cell so the
/// system stays `Sync`; systems are never run from two threads at once.
pub struct FnSystem<F> {
    meta: SystemMeta,
    run_fn: AtomicRefCell<F>,
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&SystemContext<'_>, &mut CommandBuffer) + Send + Sync + 'static,
{
    fn id(&self) -> SystemId {
        self.meta.id
    }

    fn metadata(&self) -> &SystemMeta {
        &self.meta
    }

    fn run(&self, ctx: &SystemContext<'_>, commands: &mut CommandBuffer) {
        let mut run_fn = self.run_fn.get_mut();
        (&mut *run_fn)(ctx, commands);
    }
}

/// Accumulates a system's access sets, then wraps the body closure.
pub struct SystemBuilder {
    meta: SystemMeta,
}

impl SystemBuilder {
    pub fn new(name: &str) -> Self {
        SystemBuilder {
            meta: SystemMeta::new(name),
        }
    }

    /// Declares the component access of a view tuple the body will query.
    pub fn with_query<V>(self) -> Self
    where
        V: for<'v> View<'v>,
    {
        self.with_query_filtered::<V, Passthrough>()
    }

    /// Declares the access of a filtered query. Backstage requirements count
    /// as reads (their tick cells are inspected); exclusions are recorded
    /// for completeness but never conflict.
    pub fn with_query_filtered<V, F>(mut self) -> Self
    where
        V: for<'v> View<'v>,
        F: EntityFilter + Default,
    {
        let meta = meta_for::<V, F>();
        self.meta.reads.union_with(&meta.read);
        self.meta.reads.union_with(&meta.backstage);
        self.meta.writes.union_with(&meta.write);
        self.meta.excluded.union_with(&meta.excluded);
        self
    }

    pub fn read_component<T: Component>(mut self) -> Self {
        self.meta.reads.insert(component_tag_of::<T>());
        self
    }

    pub fn write_component<T: Component>(mut self) -> Self {
        self.meta.writes.insert(component_tag_of::<T>());
        self
    }

    pub fn read_resource<R: Resource>(mut self) -> Self {
        self.meta.resources.reads.push(ResourceKey::of::<R>());
        self
    }

    pub fn write_resource<R: Resource>(mut self) -> Self {
        self.meta.resources.writes.push(ResourceKey::of::<R>());
        self
    }

    fn with_event<E: Event>(mut self, mode: EventMode) -> Self {
        self.meta.events.push(EventAccess {
            key: TypeId::of::<E>(),
            mode,
            registrar: EventManager::register::<E>,
        });
        self
    }

    pub fn reads_events<E: Event>(self) -> Self {
        self.with_event::<E>(EventMode::Read)
    }

    pub fn writes_events<E: Event>(self) -> Self {
        self.with_event::<E>(EventMode::Write)
    }

    pub fn drains_events<E: Event>(self) -> Self {
        self.with_event::<E>(EventMode::Drain)
    }

    /// Orders this system after the named one, across stages.
    pub fn after(mut self, name: &str) -> Self {
        self.meta.run_after.push(SystemId::of_name(name));
        self
    }

    pub fn build<F>(self, run_fn: F) -> Box<dyn System>
    where
        F: FnMut(&SystemContext<'_>, &mut CommandBuffer) + Send + Sync + 'static,
    {
        Box::new(FnSystem {
            meta: self.meta,
            run_fn: AtomicRefCell::new(run_fn),
        })
    }
}
