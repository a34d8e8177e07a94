pub mod columns;
pub mod export;
pub mod ids;
pub mod migration;
pub mod paths;
pub mod row;
pub mod storage;

#[cfg(test)]
mod paths_test;

pub use row::{
    MachineColumns, MeltPoolColumns, MicrostructureColumns, Parameters, Results, SimulationRow,
    SimulationStatus, SimulationType,
};
pub use storage::{StorageError, FORMAT_VERSION};

use crate::{
    inputs::SimulationInput,
    permutations::{
        self, MicrostructurePermutations, PorosityPermutations, SingleBeadPermutations,
        DEFAULT_PRIORITY,
    },
    summary::Summary,
};
use export::CsvError;
use std::{
    collections::HashSet,
    ffi::OsString,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Suffix of study files
pub const STUDY_SUFFIX: &str = "ps";

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Simulations can only be added as Pending or Skip, not {0}")]
    InvalidInitialStatus(SimulationStatus),
    #[error("{0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Csv(#[from] CsvError),
}

/// Append the study suffix unless `path` already carries it
pub fn with_suffix(path: &Path) -> PathBuf {
    if path.extension().map_or(false, |extension| extension == STUDY_SUFFIX) {
        path.to_path_buf()
    } else {
        let mut name = OsString::from(path.as_os_str());
        name.push(".");
        name.push(STUDY_SUFFIX);
        PathBuf::from(name)
    }
}

/// Table of all simulations of a parametric study.
///
/// Every mutating operation writes the whole table to `file_name` before it returns.
#[derive(Debug, Clone)]
pub struct Study {
    file_name: PathBuf,
    format_version: i64,
    rows: Vec<SimulationRow>,
    ids: HashSet<String>,
}

impl PartialEq for Study {
    fn eq(&self, other: &Self) -> bool {
        self.format_version == other.format_version && self.rows == other.rows
    }
}

impl Study {
    fn empty(file_name: PathBuf) -> Self {
        Self {
            file_name,
            format_version: FORMAT_VERSION,
            rows: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Create an empty study and write it to `path` (suffix appended when missing)
    pub fn new(path: &Path) -> Result<Self, StudyError> {
        let study = Self::empty(with_suffix(path));
        study.save()?;

        info!(path = ?study.file_name, "Created study");

        Ok(study)
    }

    /// Load the study at `path` (suffix appended when missing), create it when absent
    pub fn open(path: &Path) -> Result<Self, StudyError> {
        let path = with_suffix(path);

        if path.exists() {
            Self::load(&path)
        } else {
            Self::new(&path)
        }
    }

    /// Load the study stored at exactly `path`
    pub fn load(path: &Path) -> Result<Self, StudyError> {
        let stored = storage::load(path)?;

        if stored.format_version < FORMAT_VERSION {
            info!(
                path = ?path,
                from = stored.format_version,
                to = FORMAT_VERSION,
                "Upgraded study, the file is rewritten on the next change"
            );
        }

        let mut study = Self::empty(path.to_path_buf());
        for mut row in stored.rows {
            if study.ids.contains(&row.id) {
                warn!(id = %row.id, "Study file holds a duplicate id, renaming it");
                row.id = ids::unique_id(&study.ids, None, Some(&row.id));
            }

            study.ids.insert(row.id.clone());
            study.rows.push(row);
        }

        Ok(study)
    }

    pub fn save(&self) -> Result<(), StudyError> {
        storage::save(&self.file_name, &self.rows)?;

        Ok(())
    }

    /// Redirect the study to `path` and write it there
    pub fn save_as(&mut self, path: &Path) -> Result<(), StudyError> {
        self.set_file_name(path);
        self.save()
    }

    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    pub fn set_file_name(&mut self, path: &Path) {
        self.file_name = with_suffix(path);
    }

    pub fn format_version(&self) -> i64 {
        self.format_version
    }

    /// Rows in insertion order
    pub fn rows(&self) -> &[SimulationRow] {
        &self.rows
    }

    pub fn row(&self, id: &str) -> Option<&SimulationRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub(crate) fn row_mut(&mut self, id: &str) -> Option<&mut SimulationRow> {
        self.rows.iter_mut().find(|row| row.id == id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of rows per status
    pub fn status_counts(&self) -> Vec<(SimulationStatus, usize)> {
        [
            SimulationStatus::Pending,
            SimulationStatus::Skip,
            SimulationStatus::Completed,
            SimulationStatus::Error,
        ]
        .into_iter()
        .map(|status| {
            (
                status,
                self.rows.iter().filter(|row| row.status == status).count(),
            )
        })
        .collect()
    }

    /// Store `row` under an id no other row uses, returns that id
    fn insert_row(&mut self, mut row: SimulationRow, prefix: &str) -> String {
        let requested = (!row.id.is_empty()).then(|| row.id.clone());
        row.id = ids::unique_id(&self.ids, Some(prefix), requested.as_deref());

        if let Some(requested) = requested.filter(|requested| *requested != row.id) {
            debug!(requested = %requested, id = %row.id, "Id already taken, renamed simulation");
        }

        self.ids.insert(row.id.clone());
        let id = row.id.clone();
        self.rows.push(row);

        id
    }

    fn insert_generated(
        &mut self,
        inputs: Vec<SimulationInput>,
        iteration: i64,
        priority: i64,
    ) -> Result<usize, StudyError> {
        let count = inputs.len();

        for input in inputs {
            let prefix = format!("{}_{iteration}", input.kind().id_prefix());
            let row = SimulationRow::from_input(&input, SimulationStatus::Pending, iteration, priority);
            self.insert_row(row, &prefix);
        }

        self.save()?;
        info!(count, "Added permutations");

        Ok(count)
    }

    /// Add a pending row for every admitted single bead permutation
    pub fn generate_single_bead_permutations(
        &mut self,
        request: &SingleBeadPermutations,
    ) -> Result<usize, StudyError> {
        let inputs = permutations::single_bead_inputs(request);
        self.insert_generated(inputs, request.iteration, request.priority)
    }

    /// Add a pending row for every admitted porosity permutation
    pub fn generate_porosity_permutations(
        &mut self,
        request: &PorosityPermutations,
    ) -> Result<usize, StudyError> {
        let inputs = permutations::porosity_inputs(request);
        self.insert_generated(inputs, request.iteration, request.priority)
    }

    /// Add a pending row for every admitted microstructure permutation
    pub fn generate_microstructure_permutations(
        &mut self,
        request: &MicrostructurePermutations,
    ) -> Result<usize, StudyError> {
        let inputs = permutations::microstructure_inputs(request);
        self.insert_generated(inputs, request.iteration, request.priority)
    }

    /// Add existing inputs as new rows, taken ids are made unique
    pub fn add_inputs(
        &mut self,
        inputs: &[SimulationInput],
        iteration: i64,
        priority: i64,
        status: SimulationStatus,
    ) -> Result<usize, StudyError> {
        if !matches!(status, SimulationStatus::Pending | SimulationStatus::Skip) {
            return Err(StudyError::InvalidInitialStatus(status));
        }

        for input in inputs {
            let prefix = format!("{}_{iteration}", input.kind().id_prefix());
            let row = SimulationRow::from_input(input, status, iteration, priority);
            self.insert_row(row, &prefix);
        }

        self.save()?;
        info!(count = inputs.len(), status = %status, "Added inputs");

        Ok(inputs.len())
    }

    /// Add finished simulations as completed rows
    pub fn add_summaries(
        &mut self,
        summaries: &[Summary],
        iteration: i64,
    ) -> Result<usize, StudyError> {
        for summary in summaries {
            let input = summary.input();
            let prefix = format!("{}_{iteration}", input.kind().id_prefix());
            let mut row = SimulationRow::from_input(
                &input,
                SimulationStatus::Completed,
                iteration,
                DEFAULT_PRIORITY,
            );
            row.results = Some(Results::from_summary(summary));
            row.output_dir = summary
                .output_dir()
                .map(|dir| paths::resolve(dir, &paths::base_dir(&self.file_name)));

            self.insert_row(row, &prefix);
        }

        self.save()?;
        info!(count = summaries.len(), "Added summaries");

        Ok(summaries.len())
    }

    fn update_rows<F: FnMut(&mut SimulationRow)>(
        &mut self,
        ids: &[String],
        mut update: F,
    ) -> Result<usize, StudyError> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut count = 0;

        for row in self.rows.iter_mut().filter(|row| wanted.contains(row.id.as_str())) {
            update(row);
            count += 1;
        }

        if count < wanted.len() {
            warn!(
                requested = wanted.len(),
                found = count,
                "Some ids are not part of the study"
            );
        }

        self.save()?;

        Ok(count)
    }

    /// Set the status of the given rows.
    ///
    /// Leaving `Error` drops the error message, resetting to `Pending` or `Skip` drops
    /// results. A row marked `Completed` without results gets an unmeasured record.
    pub fn set_status(
        &mut self,
        ids: &[String],
        status: SimulationStatus,
    ) -> Result<usize, StudyError> {
        let count = self.update_rows(ids, |row| {
            if status != SimulationStatus::Error {
                row.error_message = None;
            }
            if matches!(status, SimulationStatus::Pending | SimulationStatus::Skip) {
                row.results = None;
                row.output_dir = None;
            }
            if status == SimulationStatus::Completed && row.results.is_none() {
                row.results = Some(Results::unmeasured(row.kind()));
            }
            row.status = status;
        })?;

        info!(count, status = %status, "Updated status");

        Ok(count)
    }

    pub fn set_priority(&mut self, ids: &[String], priority: i64) -> Result<usize, StudyError> {
        self.update_rows(ids, |row| row.priority = priority)
    }

    pub fn set_iteration(&mut self, ids: &[String], iteration: i64) -> Result<usize, StudyError> {
        self.update_rows(ids, |row| row.iteration = iteration)
    }

    /// Remove the given rows
    pub fn remove(&mut self, ids: &[String]) -> Result<usize, StudyError> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.rows.len();

        self.rows.retain(|row| !wanted.contains(row.id.as_str()));
        self.ids.retain(|id| !wanted.contains(id.as_str()));

        let removed = before - self.rows.len();
        self.save()?;
        info!(removed, "Removed simulations");

        Ok(removed)
    }

    /// Remove every row
    pub fn clear(&mut self) -> Result<(), StudyError> {
        self.rows.clear();
        self.ids.clear();
        self.save()?;
        info!("Cleared study");

        Ok(())
    }

    pub fn export_csv(&self, path: &Path) -> Result<(), StudyError> {
        export::write_csv(path, &self.rows, &paths::base_dir(&self.file_name))?;

        Ok(())
    }

    /// Add the valid lines of a csv export, returns the reasons for rejected lines
    pub fn import_csv(&mut self, path: &Path) -> Result<Vec<String>, StudyError> {
        let import = export::read_csv(path, &paths::base_dir(&self.file_name))?;
        let count = import.rows.len();

        for row in import.rows {
            let prefix = format!("{}_{}", row.kind().id_prefix(), row.iteration);
            self.insert_row(row, &prefix);
        }

        self.save()?;
        info!(count, rejected = import.errors.len(), "Imported csv");

        Ok(import.errors)
    }
}
