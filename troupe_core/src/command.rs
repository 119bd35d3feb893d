//! Deferred world mutations.
//!
//! Systems running inside a stage may not mutate the world structurally;
//! they record commands instead. The schedule integrates the buffer after
//! its final stage, applying entries in log order. Operations against stale
//! entity ids are skipped silently, matching the world's direct-call
//! behavior.

use crate::entity::EntityId;
use crate::signature::Component;
use crate::world::{ComponentSet, World};

type CommandFn = Box<dyn FnOnce(&mut World) + Send>;

#[derive(Default)]
pub struct CommandBuffer {
    log: Vec<CommandFn>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Defers `world.add(id, component)`.
    pub fn add<C: Component>(&mut self, id: EntityId, component: C) {
        self.log.push(Box::new(move |world| {
            world.add(id, component);
        }));
    }

    /// Defers `world.remove::<C>(id)`.
    pub fn remove<C: Component>(&mut self, id: EntityId) {
        self.log.push(Box::new(move |world| {
            world.remove::<C>(id);
        }));
    }

    /// Defers a spawn. The entity does not exist until integration.
    pub fn spawn<S: ComponentSet + Send + 'static>(&mut self, set: S) {
        self.log.push(Box::new(move |world| {
            world.spawn(set);
        }));
    }

    /// Defers a spawn and hands the new id to `callback` at integration.
    pub fn spawn_with<S, F>(&mut self, set: S, callback: F)
    where
        S: ComponentSet + Send + 'static,
        F: FnOnce(&mut World, EntityId) + Send + 'static,
    {
        self.log.push(Box::new(move |world| {
            let id = world.spawn(set);
            callback(world, id);
        }));
    }

    /// Defers an empty spawn, handing the new id to `callback`.
    pub fn spawn_empty<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut World, EntityId) + Send + 'static,
    {
        self.log.push(Box::new(move |world| {
            let id = world.spawn_empty();
            callback(world, id);
        }));
    }

    /// Defers `world.despawn(id)`.
    pub fn destroy(&mut self, id: EntityId) {
        self.log.push(Box::new(move |world| {
            world.despawn(id);
        }));
    }

    /// Defers an arbitrary closure over the world.
    pub fn run<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        self.log.push(Box::new(f));
    }

    /// Concatenates another buffer's log onto this one.
    pub fn append(&mut self, mut other: CommandBuffer) {
        self.log.append(&mut other.log);
    }

    /// Applies every logged operation against the world, in order.
    pub fn integrate(self, world: &mut World) {
        for op in self.log {
            op(world);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Marker(u32);

    #[test]
    fn integrates_in_log_order() {
        let mut world = World::new();
        let id = world.spawn_empty();

        let mut commands = CommandBuffer::new();
        commands.add(id, Marker(1));
        commands.add(id, Marker(2));
        commands.integrate(&mut world);

        assert_eq!(world.get::<Marker>(id), Some(&Marker(2)));
    }

    #[test]
    fn stale_ids_are_skipped() {
        let mut world = World::new();
        let id = world.spawn_empty();
        world.despawn(id);

        let mut commands = CommandBuffer::new();
        commands.add(id, Marker(1));
        commands.remove::<Marker>(id);
        commands.destroy(id);
        commands.integrate(&mut world);

        assert_eq!(world.live_count(), 0);
    }

    #[test]
    fn spawn_always_creates() {
        let mut world = World::new();

        let mut commands = CommandBuffer::new();
        commands.spawn((Marker(7),));
        commands.spawn_empty(|world, id| {
            world.add(id, Marker(8));
        });
        commands.integrate(&mut world);

        assert_eq!(world.live_count(), 2);
        assert_eq!(world.column_len::<Marker>(), 2);
    }

    #[test]
    fn append_preserves_order() {
        let mut world = World::new();
        let id = world.spawn_empty();

        let mut first = CommandBuffer::new();
        first.add(id, Marker(1));
        let mut second = CommandBuffer::new();
        second.add(id, Marker(2));

        first.append(second);
        assert_eq!(first.len(), 2);
        first.integrate(&mut world);
        assert_eq!(world.get::<Marker>(id), Some(&Marker(2)));
    }
}
