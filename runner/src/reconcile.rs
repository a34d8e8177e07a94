#[cfg(test)]
mod reconcile_test;

use crate::{
    study::{paths, Results, SimulationStatus, Study, StudyError},
    summary::Outcome,
};
use tracing::{debug, info, warn};

/// What happened to a batch of outcomes when written into a study
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub completed: usize,
    pub failed: usize,
    /// errors for rows that already completed, left untouched
    pub stale: usize,
    /// outcomes without a row of the same id and type
    pub unmatched: usize,
}

impl Study {
    /// Write outcomes into their rows and save the study.
    ///
    /// A row is matched on id and simulation type. Completed rows never go back to an error.
    pub fn apply(&mut self, outcomes: &[Outcome]) -> Result<ReconcileReport, StudyError> {
        let report = self.apply_outcomes(outcomes);
        self.save()?;

        info!(
            completed = report.completed,
            failed = report.failed,
            stale = report.stale,
            unmatched = report.unmatched,
            "Applied outcomes"
        );

        Ok(report)
    }

    pub(crate) fn apply_outcomes(&mut self, outcomes: &[Outcome]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let base = paths::base_dir(self.file_name());

        for outcome in outcomes {
            let row = match self.row_mut(outcome.id()) {
                Some(row) if row.kind() == outcome.kind() => row,
                Some(row) => {
                    warn!(
                        id = %outcome.id(),
                        expected = %row.kind(),
                        found = %outcome.kind(),
                        "Outcome type does not match the stored simulation"
                    );
                    report.unmatched += 1;
                    continue;
                }
                None => {
                    warn!(id = %outcome.id(), "Outcome for a simulation that is not part of the study");
                    report.unmatched += 1;
                    continue;
                }
            };

            match outcome {
                Outcome::Summary(summary) => {
                    row.status = SimulationStatus::Completed;
                    row.results = Some(Results::from_summary(summary));
                    row.output_dir = summary.output_dir().map(|dir| paths::resolve(dir, &base));
                    report.completed += 1;
                }
                Outcome::Error(error) if row.status == SimulationStatus::Completed => {
                    warn!(
                        id = %row.id,
                        message = %error.message,
                        "Ignoring error for a completed simulation"
                    );
                    report.stale += 1;
                }
                Outcome::Error(error) => {
                    debug!(id = %row.id, logs = %error.logs, "Simulation failed");
                    row.status = SimulationStatus::Error;
                    row.error_message = Some(error.message.clone());
                    report.failed += 1;
                }
            }
        }

        report
    }
}
