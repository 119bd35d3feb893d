//! The stagehand: partitions a schedule's systems into conflict-free stages.
//!
//! Stages are packed greedily in declaration order. A system joins the open
//! stage when its `run_after` dependencies are all in earlier stages and its
//! access does not conflict with what the stage has already accumulated.

use crate::system::{EventMode, System, SystemMeta};
use fxhash::{FxHashSet, FxHasher64};
use itertools::Itertools;
use std::any::TypeId;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use troupe_core::resource::ResourceKey;
use troupe_core::signature::Signature;

#[derive(Debug, Error)]
pub enum StagehandError {
    #[error("dependency cycle among systems: {names}")]
    DependencyCycle { names: String },
}

#[derive(Default)]
struct StageAccess {
    component_reads: Signature,
    component_writes: Signature,
    resource_reads: FxHashSet<ResourceKey>,
    resource_writes: FxHashSet<ResourceKey>,
    event_reads: FxHashSet<TypeId>,
    event_writes: FxHashSet<TypeId>,
    event_drains: FxHashSet<TypeId>,
}

impl StageAccess {
    fn admits(&self, meta: &SystemMeta) -> bool {
        // a writer conflicts with existing readers and writers; a reader
        // only with existing writers
        if !meta.writes.is_disjoint_with(&self.component_reads)
            || !meta.writes.is_disjoint_with(&self.component_writes)
            || !meta.reads.is_disjoint_with(&self.component_writes)
        {
            return false;
        }
        for key in &meta.resources.writes {
            if self.resource_reads.contains(key) || self.resource_writes.contains(key) {
                return false;
            }
        }
        for key in &meta.resources.reads {
            if self.resource_writes.contains(key) {
                return false;
            }
        }
        for access in &meta.events {
            let key = &access.key;
            let blocked = match access.mode {
                EventMode::Read => {
                    self.event_writes.contains(key) || self.event_drains.contains(key)
                }
                EventMode::Write => {
                    self.event_reads.contains(key)
                        || self.event_writes.contains(key)
                        || self.event_drains.contains(key)
                }
                EventMode::Drain => {
                    self.event_reads.contains(key)
                        || self.event_writes.contains(key)
                        || self.event_drains.contains(key)
                }
            };
            if blocked {
                return false;
            }
        }
        true
    }

    fn accumulate(&mut self, meta: &SystemMeta) {
        self.component_reads.union_with(&meta.reads);
        self.component_writes.union_with(&meta.writes);
        self.resource_reads.extend(meta.resources.reads.iter().copied());
        self.resource_writes
            .extend(meta.resources.writes.iter().copied());
        for access in &meta.events {
            match access.mode {
                EventMode::Read => self.event_reads.insert(access.key),
                EventMode::Write => self.event_writes.insert(access.key),
                EventMode::Drain => self.event_drains.insert(access.key),
            };
        }
    }
}

/// Cache key for a system list: the ordered hash of system ids.
pub fn stage_cache_key(systems: &[Box<dyn System>]) -> u64 {
    let mut hasher = FxHasher64::default();
    for system in systems {
        system.id().hash(&mut hasher);
    }
    hasher.finish()
}

/// Partitions systems (by index) into stages. Deterministic for a given
/// ordering and metadata. A cycle in `run_after` is an error.
pub fn build_stages(systems: &[Box<dyn System>]) -> Result<Vec<Vec<usize>>, StagehandError> {
    let mut unscheduled: Vec<usize> = (0..systems.len()).collect();
    let mut done = FxHashSet::default();
    let mut stages = Vec::new();

    while !unscheduled.is_empty() {
        let mut stage = Vec::new();
        let mut access = StageAccess::default();

        // fixed point: keep sweeping in declaration order until a full pass
        // admits nobody
        loop {
            let mut progressed = false;
            let mut index = 0;
            while index < unscheduled.len() {
                let candidate = unscheduled[index];
                let meta = systems[candidate].metadata();
                let deps_met = meta.run_after.iter().all(|dep| done.contains(dep));
                if deps_met && access.admits(meta) {
                    access.accumulate(meta);
                    stage.push(candidate);
                    unscheduled.remove(index);
                    progressed = true;
                } else {
                    index += 1;
                }
            }
            if !progressed {
                break;
            }
        }

        if stage.is_empty() {
            // a system whose metadata conflicts with itself still has to
            // run; push the first dependency-clear one through alone
            let forced = unscheduled.iter().position(|&candidate| {
                systems[candidate]
                    .metadata()
                    .run_after
                    .iter()
                    .all(|dep| done.contains(dep))
            });
            match forced {
                Some(position) => stage.push(unscheduled.remove(position)),
                None => {
                    let names = unscheduled
                        .iter()
                        .map(|&candidate| systems[candidate].metadata().name.as_str())
                        .join(", ");
                    return Err(StagehandError::DependencyCycle { names });
                }
            }
        }

        for &index in &stage {
            done.insert(systems[index].id());
        }
        stages.push(stage);
    }

    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SystemBuilder;
    use troupe_core::query::{Read, Write};

    #[derive(Debug, Clone, Copy)]
    struct Alpha;
    #[derive(Debug, Clone, Copy)]
    struct Beta;

    fn reader(name: &str) -> Box<dyn System> {
        SystemBuilder::new(name)
            .with_query::<Read<Alpha>>()
            .build(|_, _| {})
    }

    fn writer(name: &str) -> Box<dyn System> {
        SystemBuilder::new(name)
            .with_query::<Write<Alpha>>()
            .build(|_, _| {})
    }

    #[test]
    fn readers_share_a_stage() {
        let systems = vec![reader("a"), reader("b"), reader("c")];
        let stages = build_stages(&systems).unwrap();
        assert_eq!(stages, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn writers_split_stages() {
        let systems = vec![writer("a"), writer("b")];
        let stages = build_stages(&systems).unwrap();
        assert_eq!(stages, vec![vec![0], vec![1]]);
    }

    #[test]
    fn writer_excludes_reader_but_not_other_columns() {
        let systems = vec![
            writer("a"),
            reader("b"),
            SystemBuilder::new("c")
                .with_query::<Write<Beta>>()
                .build(|_, _| {}),
        ];
        let stages = build_stages(&systems).unwrap();
        assert_eq!(stages, vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn run_after_defers_to_a_later_stage() {
        let systems = vec![
            reader("a"),
            reader("b"),
            SystemBuilder::new("c").after("b").build(|_, _| {}),
        ];
        let stages = build_stages(&systems).unwrap();
        assert_eq!(stages, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn cycle_is_detected() {
        let systems = vec![
            SystemBuilder::new("a").after("b").build(|_, _| {}),
            SystemBuilder::new("b").after("a").build(|_, _| {}),
        ];
        match build_stages(&systems) {
            Err(StagehandError::DependencyCycle { names }) => {
                assert!(names.contains('a') && names.contains('b'));
            }
            other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn output_is_deterministic() {
        let build = || {
            vec![
                writer("a"),
                reader("b"),
                writer("c"),
                SystemBuilder::new("d").after("a").build(|_, _| {}),
            ]
        };
        let first = build_stages(&build()).unwrap();
        let second = build_stages(&build()).unwrap();
        assert_eq!(first, second);
        assert_eq!(stage_cache_key(&build()), stage_cache_key(&build()));
    }
}
