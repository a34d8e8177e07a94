pub mod build;
pub mod select;

#[cfg(test)]
mod runner_test;
#[cfg(test)]
mod select_test;

use crate::{
    connection::Connection,
    executors::{ExecutorError, Executors},
    inputs::SimulationInput,
    materials::MaterialSource,
    progress::ProgressSink,
    study::{SimulationType, Study, StudyError},
    summary::Outcome,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),
    #[error("{0}")]
    Executor(#[from] ExecutorError),
    #[error("{0}")]
    Study(#[from] StudyError),
}

/// Restricts which pending rows are run, all set criteria have to match
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RunFilter {
    pub types: Option<Vec<SimulationType>>,
    pub priority: Option<i64>,
    pub iteration: Option<i64>,
    pub ids: Option<Vec<String>>,
}

impl RunFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn types(mut self, types: &[SimulationType]) -> Self {
        self.types = Some(types.to_vec());
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn iteration(mut self, iteration: i64) -> Self {
        self.iteration = Some(iteration);
        self
    }

    pub fn ids<S: AsRef<str>>(mut self, ids: &[S]) -> Self {
        self.ids = Some(ids.iter().map(|id| id.as_ref().to_owned()).collect());
        self
    }

    pub fn check(&self) -> Result<(), RunError> {
        if matches!(self.types, Some(ref types) if types.is_empty()) {
            return Err(RunError::MalformedFilter(
                "the type list must not be empty".to_owned(),
            ));
        }

        if let Some(ref ids) = self.ids {
            if ids.iter().any(String::is_empty) {
                return Err(RunError::MalformedFilter(
                    "simulation ids must not be empty".to_owned(),
                ));
            }
        }

        Ok(())
    }
}

/// Counts of one run, rows that were skipped stay pending
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub selected: usize,
    pub skipped: usize,
    pub started: usize,
    pub completed: usize,
    pub failed: usize,
    pub unmatched: usize,
}

/// Typed inputs for the rows selected by `filter`, plus the number of rows skipped
pub fn prepare_inputs(
    study: &Study,
    filter: &RunFilter,
    materials: &dyn MaterialSource,
) -> Result<(Vec<SimulationInput>, usize), RunError> {
    let selected = select::select(study.rows(), filter)?;
    let mut inputs = Vec::with_capacity(selected.len());
    let mut skipped = 0;

    for row in selected {
        let material = match materials.material(&row.material) {
            Ok(material) => material,
            Err(error) => {
                warn!(id = %row.id, material = %row.material, "Skipping simulation: {error}");
                skipped += 1;
                continue;
            }
        };

        match build::input_for_row(row, material) {
            Ok(input) => inputs.push(input),
            Err(error) => {
                warn!(id = %row.id, "Skipping simulation with invalid parameters: {error}");
                skipped += 1;
            }
        }
    }

    Ok((inputs, skipped))
}

/// Run the pending rows selected by `filter`, outcomes arrive in completion order
#[instrument(skip_all, level = "info")]
pub fn run<C: Connection>(
    study: &Study,
    executor: &Executors<C>,
    materials: &dyn MaterialSource,
    filter: &RunFilter,
    sink: &dyn ProgressSink,
) -> Result<Vec<Outcome>, RunError> {
    let (inputs, _) = prepare_inputs(study, filter, materials)?;

    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    Ok(executor.execute(inputs, sink)?)
}

impl Study {
    /// Run the selected pending rows and store their outcomes
    #[instrument(skip_all, level = "info", fields(study = ?self.file_name()))]
    pub fn run_simulations<C: Connection>(
        &mut self,
        executor: &Executors<C>,
        materials: &dyn MaterialSource,
        filter: &RunFilter,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, RunError> {
        let (inputs, skipped) = prepare_inputs(self, filter, materials)?;
        let mut summary = RunSummary {
            selected: inputs.len() + skipped,
            skipped,
            ..RunSummary::default()
        };

        if inputs.is_empty() {
            return Ok(summary);
        }

        let outcomes = executor.execute(inputs, sink)?;
        let report = self.apply(&outcomes)?;

        summary.started = outcomes.len();
        summary.completed = outcomes.iter().filter(|outcome| !outcome.is_error()).count();
        summary.failed = outcomes.iter().filter(|outcome| outcome.is_error()).count();
        summary.unmatched = report.unmatched;

        info!(
            selected = summary.selected,
            skipped = summary.skipped,
            started = summary.started,
            completed = summary.completed,
            failed = summary.failed,
            "Finished run"
        );

        Ok(summary)
    }
}
