use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Bounds and defaults of the additive machine parameters
pub mod machine {
    pub const DEFAULT_LASER_POWER: f64 = 195.0;
    pub const MIN_LASER_POWER: f64 = 50.0;
    pub const MAX_LASER_POWER: f64 = 700.0;
    pub const DEFAULT_SCAN_SPEED: f64 = 1.0;
    pub const MIN_SCAN_SPEED: f64 = 0.35;
    pub const MAX_SCAN_SPEED: f64 = 2.5;
    pub const DEFAULT_HEATER_TEMP: f64 = 80.0;
    pub const MIN_HEATER_TEMP: f64 = 20.0;
    pub const MAX_HEATER_TEMP: f64 = 500.0;
    pub const DEFAULT_LAYER_THICKNESS: f64 = 5e-5;
    pub const MIN_LAYER_THICKNESS: f64 = 1e-5;
    pub const MAX_LAYER_THICKNESS: f64 = 1e-4;
    pub const DEFAULT_BEAM_DIAMETER: f64 = 1e-4;
    pub const MIN_BEAM_DIAMETER: f64 = 2e-5;
    pub const MAX_BEAM_DIAMETER: f64 = 1.4e-4;
    pub const DEFAULT_STARTING_LAYER_ANGLE: f64 = 57.0;
    pub const MIN_STARTING_LAYER_ANGLE: f64 = 0.0;
    pub const MAX_STARTING_LAYER_ANGLE: f64 = 180.0;
    pub const DEFAULT_LAYER_ROTATION_ANGLE: f64 = 67.0;
    pub const MIN_LAYER_ROTATION_ANGLE: f64 = 0.0;
    pub const MAX_LAYER_ROTATION_ANGLE: f64 = 180.0;
    pub const DEFAULT_HATCH_SPACING: f64 = 1e-4;
    pub const MIN_HATCH_SPACING: f64 = 6e-5;
    pub const MAX_HATCH_SPACING: f64 = 2e-4;
    pub const DEFAULT_SLICING_STRIPE_WIDTH: f64 = 0.01;
    pub const MIN_SLICING_STRIPE_WIDTH: f64 = 0.001;
    pub const MAX_SLICING_STRIPE_WIDTH: f64 = 0.1;
}

pub mod single_bead {
    pub const DEFAULT_BEAD_LENGTH: f64 = 3e-3;
    pub const MIN_BEAD_LENGTH: f64 = 1e-3;
    pub const MAX_BEAD_LENGTH: f64 = 1e-2;
}

pub mod porosity {
    pub const DEFAULT_SAMPLE_SIZE: f64 = 3e-3;
    pub const MIN_SAMPLE_SIZE: f64 = 1e-3;
    pub const MAX_SAMPLE_SIZE: f64 = 1e-2;
}

pub mod microstructure {
    pub const DEFAULT_POSITION_COORDINATE: f64 = 0.0;
    pub const MIN_POSITION_COORDINATE: f64 = 0.0;
    pub const MAX_POSITION_COORDINATE: f64 = 10.0;
    pub const DEFAULT_SAMPLE_SIZE: f64 = 1.5e-3;
    pub const MIN_SAMPLE_SIZE: f64 = 0.001;
    pub const MAX_SAMPLE_SIZE: f64 = 0.01;
    pub const DEFAULT_SENSOR_DIMENSION: f64 = 5e-4;
    pub const MIN_SENSOR_DIMENSION: f64 = 1e-4;
    pub const MAX_SENSOR_DIMENSION: f64 = 1e-3;
    pub const MIN_XY_SIZE_CUSHION: f64 = 5e-4;
    pub const MIN_Z_SIZE_CUSHION: f64 = 1e-3;
    pub const DEFAULT_COOLING_RATE: f64 = 1e6;
    pub const MIN_COOLING_RATE: f64 = 1e5;
    pub const MAX_COOLING_RATE: f64 = 1e7;
    pub const DEFAULT_THERMAL_GRADIENT: f64 = 1e7;
    pub const MIN_THERMAL_GRADIENT: f64 = 1e5;
    pub const MAX_THERMAL_GRADIENT: f64 = 1e8;
    pub const DEFAULT_MELT_POOL_WIDTH: f64 = 1.5e-4;
    pub const MIN_MELT_POOL_WIDTH: f64 = 7.5e-5;
    pub const MAX_MELT_POOL_WIDTH: f64 = 8e-4;
    pub const DEFAULT_MELT_POOL_DEPTH: f64 = 1e-4;
    pub const MIN_MELT_POOL_DEPTH: f64 = 1.5e-5;
    pub const MAX_MELT_POOL_DEPTH: f64 = 8e-4;
    /// a seed of 0 lets the solver pick one
    pub const DEFAULT_RANDOM_SEED: u32 = 0;
    pub const MIN_RANDOM_SEED: u32 = 1;
    pub const MAX_RANDOM_SEED: u32 = u32::MAX;
}

fn check_range(value: f64, min: f64, max: f64, name: &str) -> Result<(), ValidationError> {
    if value.is_nan() {
        Err(ValidationError(format!("{name} must be a number.")))
    } else if value < min || value > max {
        Err(ValidationError(format!(
            "{name} must be between {min} and {max}."
        )))
    } else {
        Ok(())
    }
}

fn check_cushion(size: f64, sensor: f64, cushion: f64, name: &str) -> Result<(), ValidationError> {
    if size.is_nan() {
        Err(ValidationError(format!("{name} must be a number.")))
    } else if size - sensor < cushion {
        Err(ValidationError(format!(
            "{name} must be at least {cushion} larger than sensor_dimension."
        )))
    } else {
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Machine {
    pub laser_power: f64,
    pub scan_speed: f64,
    pub heater_temperature: f64,
    pub layer_thickness: f64,
    pub beam_diameter: f64,
    pub starting_layer_angle: f64,
    pub layer_rotation_angle: f64,
    pub hatch_spacing: f64,
    pub slicing_stripe_width: f64,
}

impl Default for Machine {
    fn default() -> Self {
        Self {
            laser_power: machine::DEFAULT_LASER_POWER,
            scan_speed: machine::DEFAULT_SCAN_SPEED,
            heater_temperature: machine::DEFAULT_HEATER_TEMP,
            layer_thickness: machine::DEFAULT_LAYER_THICKNESS,
            beam_diameter: machine::DEFAULT_BEAM_DIAMETER,
            starting_layer_angle: machine::DEFAULT_STARTING_LAYER_ANGLE,
            layer_rotation_angle: machine::DEFAULT_LAYER_ROTATION_ANGLE,
            hatch_spacing: machine::DEFAULT_HATCH_SPACING,
            slicing_stripe_width: machine::DEFAULT_SLICING_STRIPE_WIDTH,
        }
    }
}

impl Machine {
    /// check all parameters against the machine limits
    pub fn validate(self) -> Result<Self, ValidationError> {
        use machine::*;

        check_range(self.laser_power, MIN_LASER_POWER, MAX_LASER_POWER, "laser_power")?;
        check_range(self.scan_speed, MIN_SCAN_SPEED, MAX_SCAN_SPEED, "scan_speed")?;
        check_range(
            self.heater_temperature,
            MIN_HEATER_TEMP,
            MAX_HEATER_TEMP,
            "heater_temperature",
        )?;
        check_range(
            self.layer_thickness,
            MIN_LAYER_THICKNESS,
            MAX_LAYER_THICKNESS,
            "layer_thickness",
        )?;
        check_range(
            self.beam_diameter,
            MIN_BEAM_DIAMETER,
            MAX_BEAM_DIAMETER,
            "beam_diameter",
        )?;
        check_range(
            self.starting_layer_angle,
            MIN_STARTING_LAYER_ANGLE,
            MAX_STARTING_LAYER_ANGLE,
            "starting_layer_angle",
        )?;
        check_range(
            self.layer_rotation_angle,
            MIN_LAYER_ROTATION_ANGLE,
            MAX_LAYER_ROTATION_ANGLE,
            "layer_rotation_angle",
        )?;
        check_range(
            self.hatch_spacing,
            MIN_HATCH_SPACING,
            MAX_HATCH_SPACING,
            "hatch_spacing",
        )?;
        check_range(
            self.slicing_stripe_width,
            MIN_SLICING_STRIPE_WIDTH,
            MAX_SLICING_STRIPE_WIDTH,
            "slicing_stripe_width",
        )?;

        Ok(self)
    }
}

/// Material as handed out by a material source, properties are passed through untouched
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct Material {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, f64>,
}

impl Material {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            properties: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SingleBeadInput {
    pub id: String,
    pub material: Material,
    pub machine: Machine,
    pub bead_length: f64,
}

impl SingleBeadInput {
    pub fn new(
        id: impl Into<String>,
        material: Material,
        machine: Machine,
        bead_length: f64,
    ) -> Result<Self, ValidationError> {
        check_range(
            bead_length,
            single_bead::MIN_BEAD_LENGTH,
            single_bead::MAX_BEAD_LENGTH,
            "bead_length",
        )?;

        Ok(Self {
            id: id.into(),
            material,
            machine: machine.validate()?,
            bead_length,
        })
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PorosityInput {
    pub id: String,
    pub material: Material,
    pub machine: Machine,
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
}

impl PorosityInput {
    pub fn new(
        id: impl Into<String>,
        material: Material,
        machine: Machine,
        size: [f64; 3],
    ) -> Result<Self, ValidationError> {
        for (value, name) in size.iter().zip(["size_x", "size_y", "size_z"]) {
            check_range(
                *value,
                porosity::MIN_SAMPLE_SIZE,
                porosity::MAX_SAMPLE_SIZE,
                name,
            )?;
        }

        Ok(Self {
            id: id.into(),
            material,
            machine: machine.validate()?,
            size_x: size[0],
            size_y: size[1],
            size_z: size[2],
        })
    }
}

/// User supplied thermal parameters, replacing the ones the solver would compute
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ThermalParameters {
    pub cooling_rate: f64,
    pub thermal_gradient: f64,
    pub melt_pool_width: f64,
    pub melt_pool_depth: f64,
}

impl Default for ThermalParameters {
    fn default() -> Self {
        Self {
            cooling_rate: microstructure::DEFAULT_COOLING_RATE,
            thermal_gradient: microstructure::DEFAULT_THERMAL_GRADIENT,
            melt_pool_width: microstructure::DEFAULT_MELT_POOL_WIDTH,
            melt_pool_depth: microstructure::DEFAULT_MELT_POOL_DEPTH,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MicrostructureInput {
    pub id: String,
    pub material: Material,
    pub machine: Machine,
    pub sample_min: [f64; 3],
    pub sample_size: [f64; 3],
    pub sensor_dimension: f64,
    pub thermal: Option<ThermalParameters>,
    pub random_seed: u32,
}

impl MicrostructureInput {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        material: Material,
        machine: Machine,
        sample_min: [f64; 3],
        sample_size: [f64; 3],
        sensor_dimension: f64,
        thermal: Option<ThermalParameters>,
        random_seed: u32,
    ) -> Result<Self, ValidationError> {
        use microstructure::*;

        for (value, name) in sample_min
            .iter()
            .zip(["sample_min_x", "sample_min_y", "sample_min_z"])
        {
            check_range(*value, MIN_POSITION_COORDINATE, MAX_POSITION_COORDINATE, name)?;
        }
        check_range(
            sensor_dimension,
            MIN_SENSOR_DIMENSION,
            MAX_SENSOR_DIMENSION,
            "sensor_dimension",
        )?;
        for ((value, name), cushion) in sample_size
            .iter()
            .zip(["sample_size_x", "sample_size_y", "sample_size_z"])
            .zip([MIN_XY_SIZE_CUSHION, MIN_XY_SIZE_CUSHION, MIN_Z_SIZE_CUSHION])
        {
            check_range(*value, MIN_SAMPLE_SIZE, MAX_SAMPLE_SIZE, name)?;
            check_cushion(*value, sensor_dimension, cushion, name)?;
        }
        if let Some(ref thermal) = thermal {
            check_range(
                thermal.cooling_rate,
                MIN_COOLING_RATE,
                MAX_COOLING_RATE,
                "cooling_rate",
            )?;
            check_range(
                thermal.thermal_gradient,
                MIN_THERMAL_GRADIENT,
                MAX_THERMAL_GRADIENT,
                "thermal_gradient",
            )?;
            check_range(
                thermal.melt_pool_width,
                MIN_MELT_POOL_WIDTH,
                MAX_MELT_POOL_WIDTH,
                "melt_pool_width",
            )?;
            check_range(
                thermal.melt_pool_depth,
                MIN_MELT_POOL_DEPTH,
                MAX_MELT_POOL_DEPTH,
                "melt_pool_depth",
            )?;
        }
        if random_seed != DEFAULT_RANDOM_SEED && random_seed < MIN_RANDOM_SEED {
            return Err(ValidationError(format!(
                "random_seed must be between {MIN_RANDOM_SEED} and {MAX_RANDOM_SEED}."
            )));
        }

        Ok(Self {
            id: id.into(),
            material,
            machine: machine.validate()?,
            sample_min,
            sample_size,
            sensor_dimension,
            thermal,
            random_seed,
        })
    }
}

/// Closed set of inputs accepted by a connection
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationInput {
    SingleBead(SingleBeadInput),
    Porosity(PorosityInput),
    Microstructure(MicrostructureInput),
}

impl SimulationInput {
    pub fn id(&self) -> &str {
        match self {
            Self::SingleBead(input) => &input.id,
            Self::Porosity(input) => &input.id,
            Self::Microstructure(input) => &input.id,
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Self::SingleBead(input) => input.id = id,
            Self::Porosity(input) => input.id = id,
            Self::Microstructure(input) => input.id = id,
        }
    }

    pub fn kind(&self) -> crate::study::SimulationType {
        use crate::study::SimulationType;

        match self {
            Self::SingleBead(_) => SimulationType::SingleBead,
            Self::Porosity(_) => SimulationType::Porosity,
            Self::Microstructure(_) => SimulationType::Microstructure,
        }
    }

    pub fn material(&self) -> &Material {
        match self {
            Self::SingleBead(input) => &input.material,
            Self::Porosity(input) => &input.material,
            Self::Microstructure(input) => &input.material,
        }
    }

    pub fn machine(&self) -> &Machine {
        match self {
            Self::SingleBead(input) => &input.machine,
            Self::Porosity(input) => &input.machine,
            Self::Microstructure(input) => &input.machine,
        }
    }
}

impl From<SingleBeadInput> for SimulationInput {
    fn from(input: SingleBeadInput) -> Self {
        Self::SingleBead(input)
    }
}

impl From<PorosityInput> for SimulationInput {
    fn from(input: PorosityInput) -> Self {
        Self::Porosity(input)
    }
}

impl From<MicrostructureInput> for SimulationInput {
    fn from(input: MicrostructureInput) -> Self {
        Self::Microstructure(input)
    }
}
