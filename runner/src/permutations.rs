pub mod derived;

#[cfg(test)]
mod permutations_test;

use crate::inputs::{
    machine, microstructure, porosity, single_bead, Machine, Material, MicrostructureInput,
    PorosityInput, SimulationInput, SingleBeadInput, ThermalParameters, ValidationError,
};
use derived::{build_rate, energy_density, Bounds};
use itertools::iproduct;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_ITERATION: i64 = 0;
pub const DEFAULT_PRIORITY: i64 = 1;

fn default_iteration() -> i64 {
    DEFAULT_ITERATION
}

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

/// Value lists of the machine parameters, an empty list stands for the default value
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MachineRanges {
    pub laser_powers: Vec<f64>,
    pub scan_speeds: Vec<f64>,
    pub layer_thicknesses: Vec<f64>,
    pub heater_temperatures: Vec<f64>,
    pub beam_diameters: Vec<f64>,
    pub start_angles: Vec<f64>,
    pub rotation_angles: Vec<f64>,
    pub hatch_spacings: Vec<f64>,
    pub stripe_widths: Vec<f64>,
}

fn or_default(values: &[f64], default: f64) -> Vec<f64> {
    if values.is_empty() {
        vec![default]
    } else {
        values.to_vec()
    }
}

impl MachineRanges {
    /// All machines spanned by the ranges, hatch related values excluded
    fn track_machines(&self) -> impl Iterator<Item = Machine> {
        iproduct!(
            or_default(&self.laser_powers, machine::DEFAULT_LASER_POWER),
            or_default(&self.scan_speeds, machine::DEFAULT_SCAN_SPEED),
            or_default(&self.layer_thicknesses, machine::DEFAULT_LAYER_THICKNESS),
            or_default(&self.heater_temperatures, machine::DEFAULT_HEATER_TEMP),
            or_default(&self.beam_diameters, machine::DEFAULT_BEAM_DIAMETER)
        )
        .map(
            |(laser_power, scan_speed, layer_thickness, heater_temperature, beam_diameter)| {
                Machine {
                    laser_power,
                    scan_speed,
                    layer_thickness,
                    heater_temperature,
                    beam_diameter,
                    ..Machine::default()
                }
            },
        )
    }

    /// All machines spanned by the ranges
    fn machines(&self) -> impl Iterator<Item = Machine> {
        iproduct!(
            self.track_machines(),
            or_default(&self.hatch_spacings, machine::DEFAULT_HATCH_SPACING),
            or_default(&self.start_angles, machine::DEFAULT_STARTING_LAYER_ANGLE),
            or_default(&self.rotation_angles, machine::DEFAULT_LAYER_ROTATION_ANGLE),
            or_default(&self.stripe_widths, machine::DEFAULT_SLICING_STRIPE_WIDTH)
        )
        .map(
            |(machine, hatch_spacing, starting_layer_angle, layer_rotation_angle, stripe_width)| {
                Machine {
                    hatch_spacing,
                    starting_layer_angle,
                    layer_rotation_angle,
                    slicing_stripe_width: stripe_width,
                    ..machine
                }
            },
        )
    }
}

/// Bounds on the derived quantities of a permutation
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DerivedBounds {
    pub energy_density: Bounds,
    pub build_rate: Bounds,
}

impl DerivedBounds {
    fn admits(&self, machine: &Machine, hatch_spacing: Option<f64>) -> bool {
        let rate = build_rate(machine.scan_speed, machine.layer_thickness, hatch_spacing);
        let density = energy_density(
            machine.laser_power,
            machine.scan_speed,
            machine.layer_thickness,
            hatch_spacing,
        );

        self.build_rate.admits(rate) && self.energy_density.admits(density)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SingleBeadPermutations {
    pub material: String,
    #[serde(default)]
    pub ranges: MachineRanges,
    #[serde(default)]
    pub bead_length: Option<f64>,
    #[serde(default)]
    pub bounds: DerivedBounds,
    #[serde(default = "default_iteration")]
    pub iteration: i64,
    #[serde(default = "default_priority")]
    pub priority: i64,
}

impl SingleBeadPermutations {
    pub fn new(material: &str, ranges: MachineRanges) -> Self {
        Self {
            material: material.to_owned(),
            ranges,
            bead_length: None,
            bounds: DerivedBounds::default(),
            iteration: DEFAULT_ITERATION,
            priority: DEFAULT_PRIORITY,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PorosityPermutations {
    pub material: String,
    #[serde(default)]
    pub ranges: MachineRanges,
    #[serde(default)]
    pub size_x: Option<f64>,
    #[serde(default)]
    pub size_y: Option<f64>,
    #[serde(default)]
    pub size_z: Option<f64>,
    #[serde(default)]
    pub bounds: DerivedBounds,
    #[serde(default = "default_iteration")]
    pub iteration: i64,
    #[serde(default = "default_priority")]
    pub priority: i64,
}

impl PorosityPermutations {
    pub fn new(material: &str, ranges: MachineRanges) -> Self {
        Self {
            material: material.to_owned(),
            ranges,
            size_x: None,
            size_y: None,
            size_z: None,
            bounds: DerivedBounds::default(),
            iteration: DEFAULT_ITERATION,
            priority: DEFAULT_PRIORITY,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MicrostructurePermutations {
    pub material: String,
    #[serde(default)]
    pub ranges: MachineRanges,
    #[serde(default)]
    pub min_x: Option<f64>,
    #[serde(default)]
    pub min_y: Option<f64>,
    #[serde(default)]
    pub min_z: Option<f64>,
    #[serde(default)]
    pub size_x: Option<f64>,
    #[serde(default)]
    pub size_y: Option<f64>,
    #[serde(default)]
    pub size_z: Option<f64>,
    #[serde(default)]
    pub sensor_dimension: Option<f64>,
    #[serde(default)]
    pub cooling_rate: Option<f64>,
    #[serde(default)]
    pub thermal_gradient: Option<f64>,
    #[serde(default)]
    pub melt_pool_width: Option<f64>,
    #[serde(default)]
    pub melt_pool_depth: Option<f64>,
    #[serde(default)]
    pub random_seed: Option<u32>,
    #[serde(default)]
    pub bounds: DerivedBounds,
    #[serde(default = "default_iteration")]
    pub iteration: i64,
    #[serde(default = "default_priority")]
    pub priority: i64,
}

impl MicrostructurePermutations {
    pub fn new(material: &str, ranges: MachineRanges) -> Self {
        Self {
            material: material.to_owned(),
            ranges,
            min_x: None,
            min_y: None,
            min_z: None,
            size_x: None,
            size_y: None,
            size_z: None,
            sensor_dimension: None,
            cooling_rate: None,
            thermal_gradient: None,
            melt_pool_width: None,
            melt_pool_depth: None,
            random_seed: None,
            bounds: DerivedBounds::default(),
            iteration: DEFAULT_ITERATION,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// User thermal parameters, missing ones take defaults as soon as one is given
    pub fn thermal(&self) -> Option<ThermalParameters> {
        let given = [
            self.cooling_rate,
            self.thermal_gradient,
            self.melt_pool_width,
            self.melt_pool_depth,
        ];

        if given.iter().all(Option::is_none) {
            return None;
        }

        let defaults = ThermalParameters::default();

        Some(ThermalParameters {
            cooling_rate: self.cooling_rate.unwrap_or(defaults.cooling_rate),
            thermal_gradient: self.thermal_gradient.unwrap_or(defaults.thermal_gradient),
            melt_pool_width: self.melt_pool_width.unwrap_or(defaults.melt_pool_width),
            melt_pool_depth: self.melt_pool_depth.unwrap_or(defaults.melt_pool_depth),
        })
    }
}

/// Keep the validated candidates, log and drop the others
fn keep_valid(candidate: Result<SimulationInput, ValidationError>) -> Option<SimulationInput> {
    match candidate {
        Ok(input) => Some(input),
        Err(error) => {
            warn!(error = %error, "Invalid parameter combination: {error}");
            None
        }
    }
}

/// Validated single bead inputs for every admitted permutation, ids left empty
pub fn single_bead_inputs(request: &SingleBeadPermutations) -> Vec<SimulationInput> {
    let material = Material::named(&request.material);
    let bead_length = request
        .bead_length
        .unwrap_or(single_bead::DEFAULT_BEAD_LENGTH);

    let inputs: Vec<_> = request
        .ranges
        .track_machines()
        .filter(|machine| request.bounds.admits(machine, None))
        .map(|machine| {
            SingleBeadInput::new("", material.clone(), machine, bead_length).map(Into::into)
        })
        .filter_map(keep_valid)
        .collect();

    debug!(count = inputs.len(), "Generated single bead permutations");
    inputs
}

/// Validated porosity inputs for every admitted permutation, ids left empty
pub fn porosity_inputs(request: &PorosityPermutations) -> Vec<SimulationInput> {
    let material = Material::named(&request.material);
    let size = [
        request.size_x.unwrap_or(porosity::DEFAULT_SAMPLE_SIZE),
        request.size_y.unwrap_or(porosity::DEFAULT_SAMPLE_SIZE),
        request.size_z.unwrap_or(porosity::DEFAULT_SAMPLE_SIZE),
    ];

    let inputs: Vec<_> = request
        .ranges
        .machines()
        .filter(|machine| request.bounds.admits(machine, Some(machine.hatch_spacing)))
        .map(|machine| PorosityInput::new("", material.clone(), machine, size).map(Into::into))
        .filter_map(keep_valid)
        .collect();

    debug!(count = inputs.len(), "Generated porosity permutations");
    inputs
}

/// Validated microstructure inputs for every admitted permutation, ids left empty
pub fn microstructure_inputs(request: &MicrostructurePermutations) -> Vec<SimulationInput> {
    use microstructure::*;

    let material = Material::named(&request.material);
    let sample_min = [
        request.min_x.unwrap_or(DEFAULT_POSITION_COORDINATE),
        request.min_y.unwrap_or(DEFAULT_POSITION_COORDINATE),
        request.min_z.unwrap_or(DEFAULT_POSITION_COORDINATE),
    ];
    let sample_size = [
        request.size_x.unwrap_or(DEFAULT_SAMPLE_SIZE),
        request.size_y.unwrap_or(DEFAULT_SAMPLE_SIZE),
        request.size_z.unwrap_or(DEFAULT_SAMPLE_SIZE),
    ];
    let sensor_dimension = request.sensor_dimension.unwrap_or(DEFAULT_SENSOR_DIMENSION);
    let thermal = request.thermal();
    let random_seed = request.random_seed.unwrap_or(DEFAULT_RANDOM_SEED);

    let inputs: Vec<_> = request
        .ranges
        .machines()
        .filter(|machine| request.bounds.admits(machine, Some(machine.hatch_spacing)))
        .map(|machine| {
            MicrostructureInput::new(
                "",
                material.clone(),
                machine,
                sample_min,
                sample_size,
                sensor_dimension,
                thermal.clone(),
                random_seed,
            )
            .map(Into::into)
        })
        .filter_map(keep_valid)
        .collect();

    debug!(count = inputs.len(), "Generated microstructure permutations");
    inputs
}
