use crate::{
    inputs::{Machine, SimulationInput},
    permutations::derived::{build_rate, energy_density},
    summary::Summary,
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SimulationType {
    SingleBead,
    Porosity,
    Microstructure,
}

impl SimulationType {
    pub const ALL: [SimulationType; 3] = [
        SimulationType::SingleBead,
        SimulationType::Porosity,
        SimulationType::Microstructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleBead => "SingleBead",
            Self::Porosity => "Porosity",
            Self::Microstructure => "Microstructure",
        }
    }

    /// prefix used for generated ids
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::SingleBead => "sb",
            Self::Porosity => "por",
            Self::Microstructure => "micro",
        }
    }
}

impl fmt::Display for SimulationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SingleBead" => Ok(Self::SingleBead),
            "Porosity" => Ok(Self::Porosity),
            "Microstructure" => Ok(Self::Microstructure),
            other => Err(format!("Invalid simulation type: {other}.")),
        }
    }
}

/// Persisted status of a row. There is no running state, a dispatched row stays `Pending`
/// until its outcome is reconciled.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimulationStatus {
    Pending,
    Skip,
    Completed,
    Error,
}

impl SimulationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Skip => "Skip",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Pending" => Ok(Self::Pending),
            "Skip" => Ok(Self::Skip),
            "Completed" => Ok(Self::Completed),
            "Error" => Ok(Self::Error),
            other => Err(format!("Invalid simulation status {other}")),
        }
    }
}

/// Machine settings of a row, the optional ones are only set for types that use them
#[derive(Clone, Debug, PartialEq)]
pub struct MachineColumns {
    pub heater_temperature: f64,
    pub layer_thickness: f64,
    pub beam_diameter: f64,
    pub laser_power: f64,
    pub scan_speed: f64,
    pub start_angle: Option<f64>,
    pub rotation_angle: Option<f64>,
    pub hatch_spacing: Option<f64>,
    pub stripe_width: Option<f64>,
}

impl MachineColumns {
    /// Single bead tracks do not use the hatch related settings
    pub fn from_machine(machine: &Machine, kind: SimulationType) -> Self {
        let hatched = |value: f64| (kind != SimulationType::SingleBead).then_some(value);

        Self {
            heater_temperature: machine.heater_temperature,
            layer_thickness: machine.layer_thickness,
            beam_diameter: machine.beam_diameter,
            laser_power: machine.laser_power,
            scan_speed: machine.scan_speed,
            start_angle: hatched(machine.starting_layer_angle),
            rotation_angle: hatched(machine.layer_rotation_angle),
            hatch_spacing: hatched(machine.hatch_spacing),
            stripe_width: hatched(machine.slicing_stripe_width),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MicrostructureColumns {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
    pub sensor_dimension: f64,
    pub cooling_rate: Option<f64>,
    pub thermal_gradient: Option<f64>,
    pub melt_pool_width: Option<f64>,
    pub melt_pool_depth: Option<f64>,
    pub random_seed: Option<u32>,
}

/// Type specific parameters, the variant fixes the type of the row
#[derive(Clone, Debug, PartialEq)]
pub enum Parameters {
    SingleBead { bead_length: f64 },
    Porosity { size_x: f64, size_y: f64, size_z: f64 },
    Microstructure(MicrostructureColumns),
}

impl Parameters {
    pub fn from_input(input: &SimulationInput) -> Self {
        match input {
            SimulationInput::SingleBead(input) => Self::SingleBead {
                bead_length: input.bead_length,
            },
            SimulationInput::Porosity(input) => Self::Porosity {
                size_x: input.size_x,
                size_y: input.size_y,
                size_z: input.size_z,
            },
            SimulationInput::Microstructure(input) => {
                let thermal = input.thermal.as_ref();

                Self::Microstructure(MicrostructureColumns {
                    min_x: input.sample_min[0],
                    min_y: input.sample_min[1],
                    min_z: input.sample_min[2],
                    size_x: input.sample_size[0],
                    size_y: input.sample_size[1],
                    size_z: input.sample_size[2],
                    sensor_dimension: input.sensor_dimension,
                    cooling_rate: thermal.map(|thermal| thermal.cooling_rate),
                    thermal_gradient: thermal.map(|thermal| thermal.thermal_gradient),
                    melt_pool_width: thermal.map(|thermal| thermal.melt_pool_width),
                    melt_pool_depth: thermal.map(|thermal| thermal.melt_pool_depth),
                    // 0 leaves the seed to the solver
                    random_seed: (input.random_seed > 0).then_some(input.random_seed),
                })
            }
        }
    }

    pub fn kind(&self) -> SimulationType {
        match self {
            Self::SingleBead { .. } => SimulationType::SingleBead,
            Self::Porosity { .. } => SimulationType::Porosity,
            Self::Microstructure(_) => SimulationType::Microstructure,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeltPoolColumns {
    pub width: f64,
    pub depth: f64,
    pub length: f64,
    pub length_over_width: Option<f64>,
    pub reference_width: f64,
    pub reference_depth: f64,
    pub reference_depth_over_width: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Results {
    SingleBead(MeltPoolColumns),
    Porosity {
        relative_density: f64,
    },
    Microstructure {
        xy_average_grain_size: f64,
        xz_average_grain_size: f64,
        yz_average_grain_size: f64,
    },
}

impl Results {
    /// Record of a completed simulation with nothing measured
    pub fn unmeasured(kind: SimulationType) -> Self {
        match kind {
            SimulationType::SingleBead => Self::SingleBead(MeltPoolColumns {
                width: f64::NAN,
                depth: f64::NAN,
                length: f64::NAN,
                length_over_width: None,
                reference_width: f64::NAN,
                reference_depth: f64::NAN,
                reference_depth_over_width: None,
            }),
            SimulationType::Porosity => Self::Porosity {
                relative_density: f64::NAN,
            },
            SimulationType::Microstructure => Self::Microstructure {
                xy_average_grain_size: f64::NAN,
                xz_average_grain_size: f64::NAN,
                yz_average_grain_size: f64::NAN,
            },
        }
    }

    /// Values a summary contributes to its row
    pub fn from_summary(summary: &Summary) -> Self {
        match summary {
            Summary::SingleBead(summary) => {
                let melt_pool = &summary.melt_pool;

                Self::SingleBead(MeltPoolColumns {
                    width: melt_pool.median_width(),
                    depth: melt_pool.median_depth(),
                    length: melt_pool.median_length(),
                    length_over_width: melt_pool.length_over_width(),
                    reference_width: melt_pool.median_reference_width(),
                    reference_depth: melt_pool.median_reference_depth(),
                    reference_depth_over_width: melt_pool.reference_depth_over_width(),
                })
            }
            Summary::Porosity(summary) => Self::Porosity {
                relative_density: summary.relative_density,
            },
            Summary::Microstructure(summary) => Self::Microstructure {
                xy_average_grain_size: summary.xy_average_grain_size(),
                xz_average_grain_size: summary.xz_average_grain_size(),
                yz_average_grain_size: summary.yz_average_grain_size(),
            },
        }
    }

    pub fn kind(&self) -> SimulationType {
        match self {
            Self::SingleBead(_) => SimulationType::SingleBead,
            Self::Porosity { .. } => SimulationType::Porosity,
            Self::Microstructure { .. } => SimulationType::Microstructure,
        }
    }
}

/// One simulation permutation of a study
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationRow {
    pub id: String,
    pub status: SimulationStatus,
    pub priority: i64,
    pub iteration: i64,
    pub material: String,
    pub machine: MachineColumns,
    pub parameters: Parameters,
    pub build_rate: f64,
    pub energy_density: f64,
    pub results: Option<Results>,
    pub output_dir: Option<PathBuf>,
    pub error_message: Option<String>,
}

impl SimulationRow {
    /// New row holding the parameters and derived quantities of `input`
    pub fn from_input(
        input: &SimulationInput,
        status: SimulationStatus,
        iteration: i64,
        priority: i64,
    ) -> Self {
        let kind = input.kind();
        let machine = input.machine();
        let hatch_spacing = (kind != SimulationType::SingleBead).then_some(machine.hatch_spacing);

        Self {
            id: input.id().to_owned(),
            status,
            priority,
            iteration,
            material: input.material().name.clone(),
            machine: MachineColumns::from_machine(machine, kind),
            parameters: Parameters::from_input(input),
            build_rate: build_rate(machine.scan_speed, machine.layer_thickness, hatch_spacing),
            energy_density: energy_density(
                machine.laser_power,
                machine.scan_speed,
                machine.layer_thickness,
                hatch_spacing,
            ),
            results: None,
            output_dir: None,
            error_message: None,
        }
    }

    pub fn kind(&self) -> SimulationType {
        self.parameters.kind()
    }
}
