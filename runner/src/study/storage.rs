use super::{
    columns::{from_cells, to_cells, ColumnError, COLUMNS},
    migration,
    paths::base_dir,
    row::SimulationRow,
};
use itertools::Itertools;
use rusqlite::{params, params_from_iter, types::Value, Connection, ErrorCode, OpenFlags};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, error, info};

/// Current version of the study file layout
pub const FORMAT_VERSION: i64 = 3;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Study file {0} not found")]
    FileNotFound(PathBuf),
    #[error("{0} is not a parametric study file")]
    NotAStudy(PathBuf),
    #[error("Study format version {0} is newer than the supported version {FORMAT_VERSION}")]
    UnsupportedVersion(i64),
    #[error("Study file holds an invalid row: {0}")]
    InvalidRow(#[from] ColumnError),
    #[error("Database query failed: {0}")]
    SQLite(#[from] rusqlite::Error),
    #[error("Failed to write study file: {0}")]
    Io(#[from] std::io::Error),
}

/// Rows and version read from a study file
#[derive(Debug)]
pub struct StoredStudy {
    /// version the file was written with
    pub format_version: i64,
    pub rows: Vec<SimulationRow>,
}

pub const META_SCHEMA: &str = "create table study_meta (
    key text primary key,
    value integer not null
);";

pub fn simulations_schema() -> String {
    format!(
        "create table simulations ({});",
        COLUMNS
            .iter()
            .map(|column| {
                if column.name == "id" {
                    format!("\"{}\" text not null unique", column.name)
                } else {
                    format!("\"{}\" {}", column.name, column.kind.sql_type())
                }
            })
            .join(", ")
    )
}

fn insert_statement() -> String {
    format!(
        "insert into simulations ({}) values ({})",
        COLUMNS
            .iter()
            .map(|column| format!("\"{}\"", column.name))
            .join(", "),
        COLUMNS.iter().map(|_| "?").join(", ")
    )
}

pub fn select_statement() -> String {
    format!(
        "select {} from simulations order by rowid",
        COLUMNS
            .iter()
            .map(|column| format!("\"{}\"", column.name))
            .join(", ")
    )
}

fn close(mut connection: Connection) -> Result<(), StorageError> {
    let mut counter = 0;

    while let Err((returned, error)) = connection.close() {
        counter += 1;
        connection = returned;
        error!(error = ?error, "Failed to close study file: {error}, trying again {counter}/3");

        if counter == 3 {
            return Err(StorageError::SQLite(error));
        }
    }

    Ok(())
}

/// Write all rows to `path`, replacing the file in one rename
pub fn save(path: &Path, rows: &[SimulationRow]) -> Result<(), StorageError> {
    let base = base_dir(path);
    let mut scratch = OsString::from(path.as_os_str());
    scratch.push(".tmp");
    let scratch = PathBuf::from(scratch);

    if scratch.exists() {
        fs::remove_file(&scratch)?;
    }

    let connection = Connection::open(&scratch)?;
    {
        let tx = connection.unchecked_transaction()?;

        tx.execute(META_SCHEMA, [])?;
        tx.execute(&simulations_schema(), [])?;
        tx.execute(
            "insert into study_meta (key, value) values ('format_version', ?)",
            params![FORMAT_VERSION],
        )?;

        let insert = insert_statement();
        for row in rows {
            tx.prepare_cached(&insert)?
                .execute(params_from_iter(to_cells(row, &base)))?;
        }

        tx.commit()?;
    }
    close(connection)?;

    fs::rename(&scratch, path)?;
    debug!(path = ?path, rows = rows.len(), "Saved study");

    Ok(())
}

fn not_a_study(path: &Path) -> impl Fn(rusqlite::Error) -> StorageError + '_ {
    move |error| match error {
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::NotADatabase => {
            StorageError::NotAStudy(path.to_path_buf())
        }
        other => StorageError::SQLite(other),
    }
}

/// Read a study file, upgrading older layouts in memory
pub fn load(path: &Path) -> Result<StoredStudy, StorageError> {
    if !path.is_file() {
        return Err(StorageError::FileNotFound(path.to_path_buf()));
    }

    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(not_a_study(path))?;

    let tables: i64 = connection
        .query_row(
            "select count(*) from sqlite_master
             where type = 'table' and name in ('study_meta', 'simulations')",
            [],
            |row| row.get(0),
        )
        .map_err(not_a_study(path))?;

    if tables != 2 {
        return Err(StorageError::NotAStudy(path.to_path_buf()));
    }

    let base = base_dir(path);
    let (format_version, rows) = {
        // the upgrade only lives inside this transaction, the file itself is rewritten by the
        // next save
        let mut tx = connection.unchecked_transaction()?;
        tx.set_drop_behavior(rusqlite::DropBehavior::Rollback);

        let format_version = migration::upgrade(&tx)?;

        let rows = tx
            .prepare(&select_statement())?
            .query_map([], |row| {
                (0..COLUMNS.len())
                    .map(|index| row.get::<_, Value>(index))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .map(|cells| Ok(from_cells(&cells?, &base)?))
            .collect::<Result<Vec<_>, StorageError>>()?;

        (format_version, rows)
    };
    close(connection)?;

    info!(path = ?path, rows = rows.len(), format_version, "Loaded study");

    Ok(StoredStudy {
        format_version,
        rows,
    })
}
