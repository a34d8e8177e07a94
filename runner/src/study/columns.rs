use super::{
    paths::{from_portable, to_portable},
    row::{
        MachineColumns, MeltPoolColumns, MicrostructureColumns, Parameters, Results,
        SimulationRow, SimulationStatus, SimulationType,
    },
};
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use std::{collections::BTreeMap, path::Path};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
}

impl ColumnKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Column {
    /// name inside the study file
    pub name: &'static str,
    /// header used for exports
    pub display: &'static str,
    pub kind: ColumnKind,
}

const fn column(name: &'static str, display: &'static str, kind: ColumnKind) -> Column {
    Column {
        name,
        display,
        kind,
    }
}

use ColumnKind::{Integer, Real, Text};

pub const COLUMNS: [Column; 46] = [
    column("id", "ID", Text),
    column("type", "Type", Text),
    column("status", "Status", Text),
    column("priority", "Priority", Integer),
    column("iteration", "Iteration", Integer),
    column("material", "Material", Text),
    column("heater_temperature", "Heater Temp (C)", Real),
    column("layer_thickness", "Layer Thickness (m)", Real),
    column("beam_diameter", "Beam Diameter (m)", Real),
    column("laser_power", "Laser Power (W)", Real),
    column("scan_speed", "Scan Speed (m/s)", Real),
    column("start_angle", "Start Angle (degrees)", Real),
    column("rotation_angle", "Rotation Angle (degrees)", Real),
    column("hatch_spacing", "Hatch Spacing (m)", Real),
    column("stripe_width", "Stripe Width (m)", Real),
    column("energy_density", "Energy Density (J/m^3)", Real),
    column("build_rate", "Build Rate (m^3/s)", Real),
    column("single_bead_length", "Single Bead Length (m)", Real),
    column("porosity_size_x", "Porosity Size X (m)", Real),
    column("porosity_size_y", "Porosity Size Y (m)", Real),
    column("porosity_size_z", "Porosity Size Z (m)", Real),
    column("micro_min_x", "Micro Min X (m)", Real),
    column("micro_min_y", "Micro Min Y (m)", Real),
    column("micro_min_z", "Micro Min Z (m)", Real),
    column("micro_size_x", "Micro Size X (m)", Real),
    column("micro_size_y", "Micro Size Y (m)", Real),
    column("micro_size_z", "Micro Size Z (m)", Real),
    column("micro_sensor_dim", "Micro Sensor Dim (m)", Real),
    column("cooling_rate", "Cooling Rate (K/s)", Real),
    column("thermal_gradient", "Thermal Gradient (K/m)", Real),
    column("micro_melt_pool_width", "Micro Melt Pool Width (m)", Real),
    column("micro_melt_pool_depth", "Micro Melt Pool Depth (m)", Real),
    column("random_seed", "Random Seed", Integer),
    column("melt_pool_width", "Melt Pool Width (m)", Real),
    column("melt_pool_depth", "Melt Pool Depth (m)", Real),
    column("melt_pool_length", "Melt Pool Length (m)", Real),
    column("melt_pool_length_over_width", "Melt Pool Length/Width", Real),
    column("melt_pool_ref_width", "Melt Pool Ref Width (m)", Real),
    column("melt_pool_ref_depth", "Melt Pool Ref Depth (m)", Real),
    column("melt_pool_ref_depth_over_width", "Melt Pool Ref Depth/Width", Real),
    column("relative_density", "Relative Density", Real),
    column("xy_average_grain_size", "XY Average Grain Size (microns)", Real),
    column("xz_average_grain_size", "XZ Average Grain Size (microns)", Real),
    column("yz_average_grain_size", "YZ Average Grain Size (microns)", Real),
    column("output_dir", "Output Dir", Text),
    column("error_message", "Error Message", Text),
];

/// column name -> position in `COLUMNS`
pub static COLUMN_INDEX: Lazy<BTreeMap<&'static str, usize>> = Lazy::new(|| {
    COLUMNS
        .iter()
        .enumerate()
        .map(|(index, column)| (column.name, index))
        .collect()
});

#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("Column {column} of simulation {id} must not be empty")]
    Missing { column: &'static str, id: String },
    #[error("Column {column} of simulation {id} holds a value of the wrong type")]
    WrongType { column: &'static str, id: String },
    #[error("Row has {0} values, expected {}", COLUMNS.len())]
    Width(usize),
    #[error("{0}")]
    Invalid(String),
}

/// NaN is stored as null, SQLite has no NaN
fn real(value: f64) -> Value {
    if value.is_nan() {
        Value::Null
    } else {
        Value::Real(value)
    }
}

fn optional_real(value: Option<f64>) -> Value {
    value.map(real).unwrap_or(Value::Null)
}

fn text(value: &str) -> Value {
    Value::Text(value.to_owned())
}

/// Flatten a row into one value per entry of `COLUMNS`
pub fn to_cells(row: &SimulationRow, base: &Path) -> Vec<Value> {
    let mut cells = vec![Value::Null; COLUMNS.len()];
    let mut set = |name: &str, value: Value| cells[COLUMN_INDEX[name]] = value;

    set("id", text(&row.id));
    set("type", text(row.kind().as_str()));
    set("status", text(row.status.as_str()));
    set("priority", Value::Integer(row.priority));
    set("iteration", Value::Integer(row.iteration));
    set("material", text(&row.material));

    let machine = &row.machine;
    set("heater_temperature", real(machine.heater_temperature));
    set("layer_thickness", real(machine.layer_thickness));
    set("beam_diameter", real(machine.beam_diameter));
    set("laser_power", real(machine.laser_power));
    set("scan_speed", real(machine.scan_speed));
    set("start_angle", optional_real(machine.start_angle));
    set("rotation_angle", optional_real(machine.rotation_angle));
    set("hatch_spacing", optional_real(machine.hatch_spacing));
    set("stripe_width", optional_real(machine.stripe_width));

    set("energy_density", real(row.energy_density));
    set("build_rate", real(row.build_rate));

    match &row.parameters {
        Parameters::SingleBead { bead_length } => set("single_bead_length", real(*bead_length)),
        Parameters::Porosity {
            size_x,
            size_y,
            size_z,
        } => {
            set("porosity_size_x", real(*size_x));
            set("porosity_size_y", real(*size_y));
            set("porosity_size_z", real(*size_z));
        }
        Parameters::Microstructure(micro) => {
            set("micro_min_x", real(micro.min_x));
            set("micro_min_y", real(micro.min_y));
            set("micro_min_z", real(micro.min_z));
            set("micro_size_x", real(micro.size_x));
            set("micro_size_y", real(micro.size_y));
            set("micro_size_z", real(micro.size_z));
            set("micro_sensor_dim", real(micro.sensor_dimension));
            set("cooling_rate", optional_real(micro.cooling_rate));
            set("thermal_gradient", optional_real(micro.thermal_gradient));
            set("micro_melt_pool_width", optional_real(micro.melt_pool_width));
            set("micro_melt_pool_depth", optional_real(micro.melt_pool_depth));
            set(
                "random_seed",
                micro
                    .random_seed
                    .map(|seed| Value::Integer(seed as i64))
                    .unwrap_or(Value::Null),
            );
        }
    }

    match &row.results {
        Some(Results::SingleBead(melt_pool)) => {
            set("melt_pool_width", real(melt_pool.width));
            set("melt_pool_depth", real(melt_pool.depth));
            set("melt_pool_length", real(melt_pool.length));
            set(
                "melt_pool_length_over_width",
                optional_real(melt_pool.length_over_width),
            );
            set("melt_pool_ref_width", real(melt_pool.reference_width));
            set("melt_pool_ref_depth", real(melt_pool.reference_depth));
            set(
                "melt_pool_ref_depth_over_width",
                optional_real(melt_pool.reference_depth_over_width),
            );
        }
        Some(Results::Porosity { relative_density }) => {
            set("relative_density", real(*relative_density))
        }
        Some(Results::Microstructure {
            xy_average_grain_size,
            xz_average_grain_size,
            yz_average_grain_size,
        }) => {
            set("xy_average_grain_size", real(*xy_average_grain_size));
            set("xz_average_grain_size", real(*xz_average_grain_size));
            set("yz_average_grain_size", real(*yz_average_grain_size));
        }
        None => {}
    }

    if let Some(ref output_dir) = row.output_dir {
        set("output_dir", Value::Text(to_portable(output_dir, base)));
    }
    if let Some(ref message) = row.error_message {
        set("error_message", text(message));
    }

    cells
}

const MELT_POOL_COLUMNS: [&str; 7] = [
    "melt_pool_width",
    "melt_pool_depth",
    "melt_pool_length",
    "melt_pool_length_over_width",
    "melt_pool_ref_width",
    "melt_pool_ref_depth",
    "melt_pool_ref_depth_over_width",
];

const GRAIN_SIZE_COLUMNS: [&str; 3] = [
    "xy_average_grain_size",
    "xz_average_grain_size",
    "yz_average_grain_size",
];

/// Typed access to a row of cells ordered like `COLUMNS`
struct Cells<'a> {
    cells: &'a [Value],
    id: String,
}

impl<'a> Cells<'a> {
    fn get(&self, name: &'static str) -> &'a Value {
        &self.cells[COLUMN_INDEX[name]]
    }

    fn text(&self, name: &'static str) -> Result<Option<String>, ColumnError> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value.clone())),
            Value::Integer(value) => Ok(Some(value.to_string())),
            Value::Real(value) => Ok(Some(value.to_string())),
            Value::Blob(_) => Err(self.wrong_type(name)),
        }
    }

    fn required_text(&self, name: &'static str) -> Result<String, ColumnError> {
        self.text(name)?.ok_or_else(|| self.missing(name))
    }

    fn integer(&self, name: &'static str) -> Result<Option<i64>, ColumnError> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::Integer(value) => Ok(Some(*value)),
            Value::Real(value) if value.fract() == 0.0 => Ok(Some(*value as i64)),
            _ => Err(self.wrong_type(name)),
        }
    }

    fn required_integer(&self, name: &'static str) -> Result<i64, ColumnError> {
        self.integer(name)?.ok_or_else(|| self.missing(name))
    }

    fn real(&self, name: &'static str) -> Result<Option<f64>, ColumnError> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::Real(value) => Ok(Some(*value)),
            Value::Integer(value) => Ok(Some(*value as f64)),
            _ => Err(self.wrong_type(name)),
        }
    }

    fn required_real(&self, name: &'static str) -> Result<f64, ColumnError> {
        self.real(name)?.ok_or_else(|| self.missing(name))
    }

    /// null reads back as NaN
    fn measured(&self, name: &'static str) -> Result<f64, ColumnError> {
        Ok(self.real(name)?.unwrap_or(f64::NAN))
    }

    /// whether any of the columns holds a value
    fn any(&self, names: &[&'static str]) -> bool {
        names.iter().any(|name| !matches!(self.get(*name), Value::Null))
    }

    fn missing(&self, column: &'static str) -> ColumnError {
        ColumnError::Missing {
            column,
            id: self.id.clone(),
        }
    }

    fn wrong_type(&self, column: &'static str) -> ColumnError {
        ColumnError::WrongType {
            column,
            id: self.id.clone(),
        }
    }
}

/// Rebuild a row from one value per entry of `COLUMNS`
pub fn from_cells(cells: &[Value], base: &Path) -> Result<SimulationRow, ColumnError> {
    if cells.len() != COLUMNS.len() {
        return Err(ColumnError::Width(cells.len()));
    }

    let mut cells = Cells {
        cells,
        id: String::new(),
    };
    cells.id = cells.required_text("id")?;

    let kind: SimulationType = cells
        .required_text("type")?
        .parse()
        .map_err(ColumnError::Invalid)?;
    let status: SimulationStatus = cells
        .required_text("status")?
        .parse()
        .map_err(ColumnError::Invalid)?;

    let machine = MachineColumns {
        heater_temperature: cells.required_real("heater_temperature")?,
        layer_thickness: cells.required_real("layer_thickness")?,
        beam_diameter: cells.required_real("beam_diameter")?,
        laser_power: cells.required_real("laser_power")?,
        scan_speed: cells.required_real("scan_speed")?,
        start_angle: cells.real("start_angle")?,
        rotation_angle: cells.real("rotation_angle")?,
        hatch_spacing: cells.real("hatch_spacing")?,
        stripe_width: cells.real("stripe_width")?,
    };

    let parameters = match kind {
        SimulationType::SingleBead => Parameters::SingleBead {
            bead_length: cells.required_real("single_bead_length")?,
        },
        SimulationType::Porosity => Parameters::Porosity {
            size_x: cells.required_real("porosity_size_x")?,
            size_y: cells.required_real("porosity_size_y")?,
            size_z: cells.required_real("porosity_size_z")?,
        },
        SimulationType::Microstructure => Parameters::Microstructure(MicrostructureColumns {
            min_x: cells.required_real("micro_min_x")?,
            min_y: cells.required_real("micro_min_y")?,
            min_z: cells.required_real("micro_min_z")?,
            size_x: cells.required_real("micro_size_x")?,
            size_y: cells.required_real("micro_size_y")?,
            size_z: cells.required_real("micro_size_z")?,
            sensor_dimension: cells.required_real("micro_sensor_dim")?,
            cooling_rate: cells.real("cooling_rate")?,
            thermal_gradient: cells.real("thermal_gradient")?,
            melt_pool_width: cells.real("micro_melt_pool_width")?,
            melt_pool_depth: cells.real("micro_melt_pool_depth")?,
            random_seed: cells
                .integer("random_seed")?
                .map(|seed| u32::try_from(seed).map_err(|_| cells.wrong_type("random_seed")))
                .transpose()?,
        }),
    };

    // NaN measurements are stored as null, a completed row always has results
    let completed = status == SimulationStatus::Completed;
    let results = match kind {
        SimulationType::SingleBead if completed || cells.any(&MELT_POOL_COLUMNS) => {
            Some(Results::SingleBead(MeltPoolColumns {
                width: cells.measured("melt_pool_width")?,
                depth: cells.measured("melt_pool_depth")?,
                length: cells.measured("melt_pool_length")?,
                length_over_width: cells.real("melt_pool_length_over_width")?,
                reference_width: cells.measured("melt_pool_ref_width")?,
                reference_depth: cells.measured("melt_pool_ref_depth")?,
                reference_depth_over_width: cells.real("melt_pool_ref_depth_over_width")?,
            }))
        }
        SimulationType::Porosity if completed || cells.any(&["relative_density"]) => {
            Some(Results::Porosity {
                relative_density: cells.measured("relative_density")?,
            })
        }
        SimulationType::Microstructure if completed || cells.any(&GRAIN_SIZE_COLUMNS) => {
            Some(Results::Microstructure {
                xy_average_grain_size: cells.measured("xy_average_grain_size")?,
                xz_average_grain_size: cells.measured("xz_average_grain_size")?,
                yz_average_grain_size: cells.measured("yz_average_grain_size")?,
            })
        }
        _ => None,
    };

    Ok(SimulationRow {
        id: cells.id.clone(),
        status,
        priority: cells.required_integer("priority")?,
        iteration: cells.required_integer("iteration")?,
        material: cells.required_text("material")?,
        machine,
        parameters,
        build_rate: cells.measured("build_rate")?,
        energy_density: cells.measured("energy_density")?,
        results,
        output_dir: cells
            .text("output_dir")?
            .map(|value| from_portable(&value, base)),
        error_message: cells.text("error_message")?,
    })
}
