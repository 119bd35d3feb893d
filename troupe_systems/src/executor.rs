//! Execution strategies for a schedule's systems.

use crate::system::{System, SystemContext, SystemId};
use fxhash::FxHashMap;
use troupe_core::command::CommandBuffer;
use troupe_core::tick::{Tick, TickWindow};
use troupe_core::world::World;

/// Remembers each system's last successful run tick and produces the
/// clamped window it observes on the next one.
#[derive(Default)]
pub struct TickLedger {
    last_runs: FxHashMap<SystemId, Tick>,
}

impl TickLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window_for(&self, id: SystemId, this_run: Tick) -> TickWindow {
        TickWindow::new(self.last_runs.get(&id).copied().unwrap_or(0), this_run)
    }

    pub fn record_run(&mut self, id: SystemId, this_run: Tick) {
        self.last_runs.insert(id, this_run);
    }

    pub fn forget(&mut self, id: SystemId) {
        self.last_runs.remove(&id);
    }
}

/// Runs a schedule's systems. `stages` is the stagehand's partition of the
/// same system list; strategies that do not stage ignore it.
pub trait Executor: Send + Sync {
    fn run(
        &self,
        systems: &[Box<dyn System>],
        stages: &[Vec<usize>],
        world: &World,
        this_run: Tick,
        ledger: &mut TickLedger,
        commands: &mut CommandBuffer,
    );
}

/// Runs systems one by one, in declaration order, on the calling thread.
#[derive(Default)]
pub struct SerialExecutor;

impl SerialExecutor {
    pub fn new() -> Self {
        SerialExecutor
    }
}

impl Executor for SerialExecutor {
    fn run(
        &self,
        systems: &[Box<dyn System>],
        _stages: &[Vec<usize>],
        world: &World,
        this_run: Tick,
        ledger: &mut TickLedger,
        commands: &mut CommandBuffer,
    ) {
        for system in systems {
            let window = ledger.window_for(system.id(), this_run);
            let ctx = SystemContext::new(world, system.metadata(), window);
            system.run(&ctx, commands);
            ledger.record_run(system.id(), this_run);
        }
    }
}

#[cfg(feature = "par-schedule")]
mod parallel {
    use super::*;
    use rayon::prelude::*;

    fn dispatch(
        pool: &rayon::ThreadPool,
        systems: &[Box<dyn System>],
        work: &[(usize, TickWindow)],
        world: &World,
        commands: &mut CommandBuffer,
    ) {
        if work.is_empty() {
            return;
        }
        let workers = pool.current_num_threads().max(1);
        let chunk = (work.len() + workers - 1) / workers;
        let locals: Vec<CommandBuffer> = pool.install(|| {
            work.par_chunks(chunk)
                .map(|batch| {
                    let mut local = CommandBuffer::new();
                    for (index, window) in batch {
                        let system = &systems[*index];
                        let ctx = SystemContext::new(world, system.metadata(), *window);
                        system.run(&ctx, &mut local);
                    }
                    local
                })
                .collect()
        });
        // merge thread-local buffers in chunk order
        for local in locals {
            commands.append(local);
        }
    }

    /// Runs the stagehand's stages over a worker pool. Within a stage,
    /// systems are dispatched in chunks of `ceil(N / cores)`; every worker
    /// drains into a thread-local command buffer, and the buffers are merged
    /// after the stage barrier. Nothing is integrated between stages.
    pub struct ParallelExecutor {
        pool: rayon::ThreadPool,
    }

    impl ParallelExecutor {
        /// Builds an executor with a pool sized to the host core count.
        pub fn new() -> Self {
            ParallelExecutor {
                pool: rayon::ThreadPoolBuilder::new()
                    .build()
                    .expect("failed to build the worker pool"),
            }
        }
    }

    impl Default for ParallelExecutor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Executor for ParallelExecutor {
        fn run(
            &self,
            systems: &[Box<dyn System>],
            stages: &[Vec<usize>],
            world: &World,
            this_run: Tick,
            ledger: &mut TickLedger,
            commands: &mut CommandBuffer,
        ) {
            for stage in stages {
                let work: Vec<(usize, TickWindow)> = stage
                    .iter()
                    .map(|&index| {
                        (index, ledger.window_for(systems[index].id(), this_run))
                    })
                    .collect();
                dispatch(&self.pool, systems, &work, world, commands);
                for &index in stage {
                    ledger.record_run(systems[index].id(), this_run);
                }
            }
        }
    }

    /// Runs every system concurrently without consulting the stagehand.
    ///
    /// Safety contract: the caller asserts that no two systems in the
    /// schedule conflict on any component, resource or event channel. With a
    /// conflicting pair this executor races; it exists for schedules whose
    /// disjointness is known out of band.
    pub struct UncheckedParallelExecutor {
        pool: rayon::ThreadPool,
    }

    impl UncheckedParallelExecutor {
        pub fn new() -> Self {
            UncheckedParallelExecutor {
                pool: rayon::ThreadPoolBuilder::new()
                    .build()
                    .expect("failed to build the worker pool"),
            }
        }
    }

    impl Default for UncheckedParallelExecutor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Executor for UncheckedParallelExecutor {
        fn run(
            &self,
            systems: &[Box<dyn System>],
            _stages: &[Vec<usize>],
            world: &World,
            this_run: Tick,
            ledger: &mut TickLedger,
            commands: &mut CommandBuffer,
        ) {
            let work: Vec<(usize, TickWindow)> = (0..systems.len())
                .map(|index| (index, ledger.window_for(systems[index].id(), this_run)))
                .collect();
            dispatch(&self.pool, systems, &work, world, commands);
            for (index, _) in work {
                ledger.record_run(systems[index].id(), this_run);
            }
        }
    }
}

#[cfg(feature = "par-schedule")]
pub use parallel::{ParallelExecutor, UncheckedParallelExecutor};
