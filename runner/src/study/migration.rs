use super::storage::{StorageError, FORMAT_VERSION};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Column only written by the first layout, its files sometimes carry a wrong version tag
pub const LEGACY_MARKER: &str = "heater_temp_degc";

/// Renames from the first layout to the second one
pub const V1_RENAMES: [(&str, &str); 10] = [
    ("heater_temp_degc", "heater_temperature"),
    ("start_angle_deg", "start_angle"),
    ("rotation_angle_deg", "rotation_angle"),
    ("cooling_rate_degk_s", "cooling_rate"),
    ("thermal_gradient_degk_m", "thermal_gradient"),
    ("xy_average_grain_size_um", "xy_average_grain_size"),
    ("xz_average_grain_size_um", "xz_average_grain_size"),
    ("yz_average_grain_size_um", "yz_average_grain_size"),
    ("melt_pool_length_over_width_m", "melt_pool_length_over_width"),
    ("melt_pool_ref_depth_over_width_m", "melt_pool_ref_depth_over_width"),
];

/// Columns added by the third layout
pub const V3_COLUMNS: [(&str, &str); 2] = [("error_message", "text"), ("output_dir", "text")];

pub fn stored_version(connection: &Connection) -> Result<i64, StorageError> {
    Ok(connection
        .query_row(
            "select value from study_meta where key = 'format_version'",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(1))
}

pub fn table_columns(connection: &Connection) -> Result<BTreeSet<String>, StorageError> {
    let mut statement = connection.prepare("pragma table_info(simulations)")?;
    let columns = statement
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<BTreeSet<_>, _>>()?;

    Ok(columns)
}

/// Bring the tables behind `connection` to the current layout.
///
/// Returns the version the file was written with. Nothing is committed, callers run this
/// inside a transaction they roll back.
pub fn upgrade(connection: &Connection) -> Result<i64, StorageError> {
    let mut version = stored_version(connection)?;
    let mut columns = table_columns(connection)?;

    if columns.contains(LEGACY_MARKER) && version != 1 {
        warn!(version, "Study file uses first generation column names, treating it as version 1");
        version = 1;
    }

    if version > FORMAT_VERSION {
        return Err(StorageError::UnsupportedVersion(version));
    }

    if version < 2 {
        for (old, new) in V1_RENAMES {
            if columns.contains(old) && !columns.contains(new) {
                connection.execute(
                    &format!("alter table simulations rename column \"{old}\" to \"{new}\""),
                    [],
                )?;
                columns.remove(old);
                columns.insert(new.to_owned());
            }
        }
        info!("Upgraded study from version 1 to 2");
    }

    if version < 3 {
        for (name, sql_type) in V3_COLUMNS {
            if !columns.contains(name) {
                connection.execute(
                    &format!("alter table simulations add column \"{name}\" {sql_type}"),
                    [],
                )?;
                columns.insert(name.to_owned());
            }
        }
        info!("Upgraded study from version 2 to 3");
    }

    if version < FORMAT_VERSION {
        connection.execute(
            "insert or replace into study_meta (key, value) values ('format_version', ?)",
            params![FORMAT_VERSION],
        )?;
    }

    let unknown: Vec<_> = columns
        .iter()
        .filter(|column| !super::columns::COLUMN_INDEX.contains_key(column.as_str()))
        .collect();
    if !unknown.is_empty() {
        warn!(
            columns = ?unknown,
            "Study file holds columns without a known meaning, they are not loaded and the next save removes them from the file"
        );
    }

    Ok(version)
}
