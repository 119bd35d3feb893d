//! Schedules: named system lists bound to an executor, attachable to a
//! world.
//!
//! A run is: fresh command buffer, event buffer flip, execute, integrate,
//! advance the change tick. Buffered mutations therefore land exactly once
//! per run, after the final stage.

use crate::executor::{Executor, TickLedger};
use crate::stagehand::{build_stages, stage_cache_key, StagehandError};
use crate::system::{System, SystemId};
use tracing::{debug, info_span};
use troupe_core::command::CommandBuffer;
use troupe_core::world::{ScheduleRunner, World};

pub struct Schedule {
    label: String,
    executor: Box<dyn Executor>,
    systems: Vec<Box<dyn System>>,
    ledger: TickLedger,
    cache: Option<(u64, Vec<Vec<usize>>)>,
}

impl Schedule {
    pub fn new(label: &str, executor: Box<dyn Executor>) -> Self {
        Schedule {
            label: label.to_string(),
            executor,
            systems: Vec::new(),
            ledger: TickLedger::new(),
            cache: None,
        }
    }

    /// A schedule backed by the serial executor.
    pub fn serial(label: &str) -> Self {
        Schedule::new(label, Box::new(crate::executor::SerialExecutor::new()))
    }

    /// A schedule backed by the staged parallel executor.
    #[cfg(feature = "par-schedule")]
    pub fn parallel(label: &str) -> Self {
        Schedule::new(label, Box::new(crate::executor::ParallelExecutor::new()))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn systems(&self) -> &[Box<dyn System>] {
        &self.systems
    }

    pub fn add_system(&mut self, system: Box<dyn System>) {
        debug!(schedule = %self.label, system = %system.metadata().name, "added system");
        self.systems.push(system);
        self.cache = None;
    }

    pub fn remove_system(&mut self, id: SystemId) -> Option<Box<dyn System>> {
        let position = self.systems.iter().position(|system| system.id() == id)?;
        self.ledger.forget(id);
        self.cache = None;
        Some(self.systems.remove(position))
    }

    /// Builds the stage partition without running anything. Exposed so
    /// hosts and tests can inspect or validate schedules up front.
    pub fn try_build_stages(&self) -> Result<Vec<Vec<usize>>, StagehandError> {
        build_stages(&self.systems)
    }

    fn ensure_stages(&mut self) {
        let key = stage_cache_key(&self.systems);
        let stale = self.cache.as_ref().map(|(cached, _)| *cached) != Some(key);
        if stale {
            match build_stages(&self.systems) {
                Ok(stages) => self.cache = Some((key, stages)),
                // a dependency cycle is a contract violation
                Err(err) => panic!("schedule `{}`: {}", self.label, err),
            }
        }
    }

    pub fn run(&mut self, world: &mut World) {
        let span = info_span!("schedule", label = %self.label);
        let _guard = span.enter();

        self.ensure_stages();
        let this_run = world.current_tick();
        world.events_mut().prepare();

        let mut commands = CommandBuffer::new();
        let Schedule {
            executor,
            systems,
            ledger,
            cache,
            ..
        } = self;
        let stages = &cache.as_ref().expect("stages built above").1;
        executor.run(systems, stages, world, this_run, ledger, &mut commands);

        commands.integrate(world);
        world.advance_change_tick();
    }
}

impl ScheduleRunner for Schedule {
    fn label(&self) -> &str {
        &self.label
    }

    fn run_once(&mut self, world: &mut World) {
        self.run(world);
    }
}

/// Typed schedule management over a world's schedule registry.
pub trait WorldSchedules {
    fn add_schedule(&mut self, label: &str, executor: Box<dyn Executor>);
    fn add_system(&mut self, label: &str, system: Box<dyn System>);
    fn update_schedule<F: FnOnce(&mut Schedule)>(&mut self, label: &str, f: F);
    fn remove_system(&mut self, label: &str, id: SystemId);
}

fn schedule_mut<'w>(world: &'w mut World, label: &str) -> &'w mut Schedule {
    let runner = match world.schedule_runner_mut(label) {
        Some(runner) => runner,
        None => panic!("unknown schedule `{}`", label),
    };
    match runner.downcast_mut::<Schedule>() {
        Some(schedule) => schedule,
        None => panic!("schedule `{}` is not a system schedule", label),
    }
}

impl WorldSchedules for World {
    fn add_schedule(&mut self, label: &str, executor: Box<dyn Executor>) {
        self.attach_schedule(Box::new(Schedule::new(label, executor)));
    }

    fn add_system(&mut self, label: &str, system: Box<dyn System>) {
        // materialize the channels the system's event access declares
        for access in &system.metadata().events {
            (access.registrar)(self.events_mut());
        }
        schedule_mut(self, label).add_system(system);
    }

    fn update_schedule<F: FnOnce(&mut Schedule)>(&mut self, label: &str, f: F) {
        f(schedule_mut(self, label));
    }

    fn remove_system(&mut self, label: &str, id: SystemId) {
        let _ = schedule_mut(self, label).remove_system(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SerialExecutor;
    use crate::system::SystemBuilder;
    use troupe_core::query::{Read, Write};
    use troupe_core::world::MAIN_SCHEDULE;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Pos(f32);
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Vel(f32);

    #[test]
    fn run_applies_commands_and_advances_the_tick() {
        let mut world = World::new();
        world.add_schedule(MAIN_SCHEDULE, Box::new(SerialExecutor::new()));
        world.add_system(
            MAIN_SCHEDULE,
            SystemBuilder::new("spawner").build(|_, commands| {
                commands.spawn((Pos(0.0),));
            }),
        );

        let tick = world.current_tick();
        world.run();

        assert_eq!(world.live_count(), 1);
        assert_eq!(world.current_tick(), tick + 1);
    }

    #[test]
    fn removed_systems_stop_running() {
        let mut world = World::new();
        world.add_schedule(MAIN_SCHEDULE, Box::new(SerialExecutor::new()));
        world.add_system(
            MAIN_SCHEDULE,
            SystemBuilder::new("spawner").build(|_, commands| {
                commands.spawn((Pos(0.0),));
            }),
        );

        world.run();
        world.remove_system(MAIN_SCHEDULE, crate::system::SystemId::of_name("spawner"));
        world.run();

        assert_eq!(world.live_count(), 1);
    }

    #[test]
    fn systems_observe_last_frames_state() {
        let mut world = World::new();
        world.spawn((Pos(0.0), Vel(1.0)));
        world.add_schedule(MAIN_SCHEDULE, Box::new(SerialExecutor::new()));
        world.add_system(
            MAIN_SCHEDULE,
            SystemBuilder::new("integrate")
                .with_query::<(Write<Pos>, Read<Vel>)>()
                .build(|ctx, _| {
                    ctx.query::<(Write<Pos>, Read<Vel>)>()
                        .for_each(|(mut pos, vel)| pos.0 += vel.0);
                }),
        );

        world.run();
        world.run();
        world.run();

        let mut observed = 0.0;
        world
            .query_read::<Read<Pos>>()
            .for_each(|pos| observed = pos.0);
        assert_eq!(observed, 3.0);
    }
}
