//! Batch evaluation: per-spot stages, summary stages and the worker handle.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rayon::prelude::*;
use spotred_core::errors::{ErrorInfo, ReductionError};
use spotred_core::{Spot, SpotId, SpotKind};
use spotred_expr::{evaluate_named, EvalContext, SpotScratch, Stage, ERROR_VALUE};

use crate::task::Task;

/// Progress shared between a running reduction and its observers.
///
/// The counter only increases; the finished flag is set once.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    completed: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
}

impl Progress {
    /// Fresh progress at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Units of work completed so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Units of work expected in the current pass.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Whether the reduction has returned.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn add_total(&self, units: u64) {
        self.total.fetch_add(units, Ordering::AcqRel);
    }

    fn advance(&self, units: u64) {
        self.completed.fetch_add(units, Ordering::AcqRel);
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

type SpotRows = (SpotId, BTreeMap<String, Vec<f64>>);

impl Task {
    /// Evaluates every expression for every spot kind in execution order.
    pub fn evaluate_all(&mut self, progress: &Progress) -> Result<(), ReductionError> {
        self.results.clear();
        self.summaries.clear();
        self.evaluate_kinds(&[SpotKind::ReferenceMaterial, SpotKind::Unknown], progress)
    }

    /// Evaluates the execution order for spots of the given kinds.
    ///
    /// Evaluation failures are absorbed: the affected row holds
    /// [`ERROR_VALUE`] and a warning is logged.
    pub fn evaluate_kinds(
        &mut self,
        kinds: &[SpotKind],
        progress: &Progress,
    ) -> Result<(), ReductionError> {
        let stages = self.order.stages(&self.registry);
        let selected = self
            .spots
            .iter()
            .filter(|spot| kinds.contains(&spot.kind()))
            .count() as u64;
        let units: u64 = stages
            .iter()
            .map(|stage| match stage {
                Stage::PerSpot(_) => selected,
                Stage::Summary(_) => kinds.len() as u64,
            })
            .sum();
        progress.add_total(units);

        let pool = if self.config.parallel {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.threads)
                    .build()
                    .map_err(|err| {
                        ReductionError::Evaluation(
                            ErrorInfo::new("thread-pool", "failed to build worker pool")
                                .with_context("reason", err.to_string()),
                        )
                    })?,
            )
        } else {
            None
        };

        for stage in stages {
            match stage {
                Stage::PerSpot(names) => {
                    let rows = match &pool {
                        Some(pool) => pool.install(|| self.run_per_spot(&names, kinds, progress, true)),
                        None => self.run_per_spot(&names, kinds, progress, false),
                    };
                    for (spot, by_name) in rows {
                        for (name, row) in by_name {
                            self.results.insert_spot(name, spot.clone(), row);
                        }
                    }
                }
                Stage::Summary(name) => {
                    for kind in kinds {
                        self.reduce_summary(&name, *kind);
                        progress.advance(1);
                    }
                }
            }
        }
        log::debug!(
            "task {}: {} of {} units evaluated",
            self.config.name,
            progress.completed(),
            progress.total()
        );
        Ok(())
    }

    fn run_per_spot(
        &self,
        names: &[String],
        kinds: &[SpotKind],
        progress: &Progress,
        parallel: bool,
    ) -> Vec<SpotRows> {
        let selected: Vec<&Spot> = self
            .spots
            .iter()
            .filter(|spot| kinds.contains(&spot.kind()))
            .collect();
        let evaluate_spot = |spot: &Spot| -> SpotRows {
            let mut scratch = SpotScratch::new(&self.results, spot.id().clone());
            for name in names {
                let applies = self
                    .registry
                    .get(name)
                    .is_some_and(|expression| expression.applies_to(spot.kind()));
                if !applies {
                    continue;
                }
                let row = {
                    let ctx = EvalContext::new(&self.registry, &self.parameters, &scratch);
                    match evaluate_named(name, &[spot], &ctx) {
                        Ok(matrix) => matrix
                            .into_rows()
                            .into_iter()
                            .next()
                            .unwrap_or_else(|| vec![ERROR_VALUE]),
                        Err(err) => {
                            log::warn!("spot {}: {err}", spot.id());
                            vec![ERROR_VALUE]
                        }
                    }
                };
                scratch.insert(name.clone(), row);
            }
            progress.advance(1);
            scratch.into_rows()
        };
        if parallel {
            selected.par_iter().map(|spot| evaluate_spot(spot)).collect()
        } else {
            selected.iter().map(|spot| evaluate_spot(spot)).collect()
        }
    }
}

/// A reduction running on its own worker thread.
#[derive(Debug)]
pub struct ReductionHandle {
    progress: Progress,
    worker: JoinHandle<Result<Task, ReductionError>>,
}

impl ReductionHandle {
    /// Moves `task` onto a worker thread and evaluates it to completion.
    pub fn spawn(mut task: Task) -> Self {
        let progress = Progress::new();
        let observer = progress.clone();
        let worker = thread::spawn(move || {
            let outcome = task.evaluate_all(&observer);
            observer.finish();
            outcome.map(|()| task)
        });
        Self { progress, worker }
    }

    /// Shared progress of the reduction.
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Whether the worker has finished.
    pub fn is_finished(&self) -> bool {
        self.progress.is_finished() || self.worker.is_finished()
    }

    /// Waits for the worker and returns the evaluated task.
    pub fn join(self) -> Result<Task, ReductionError> {
        self.worker.join().map_err(|_| {
            ReductionError::Evaluation(ErrorInfo::new(
                "worker-panicked",
                "reduction worker terminated abnormally",
            ))
        })?
    }
}
