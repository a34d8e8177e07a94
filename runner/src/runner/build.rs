use crate::{
    inputs::{
        machine, microstructure, Machine, Material, MicrostructureInput, PorosityInput,
        SimulationInput, SingleBeadInput, ThermalParameters, ValidationError,
    },
    study::{MachineColumns, Parameters, SimulationRow},
};

fn machine_for(columns: &MachineColumns) -> Machine {
    Machine {
        laser_power: columns.laser_power,
        scan_speed: columns.scan_speed,
        heater_temperature: columns.heater_temperature,
        layer_thickness: columns.layer_thickness,
        beam_diameter: columns.beam_diameter,
        starting_layer_angle: columns
            .start_angle
            .unwrap_or(machine::DEFAULT_STARTING_LAYER_ANGLE),
        layer_rotation_angle: columns
            .rotation_angle
            .unwrap_or(machine::DEFAULT_LAYER_ROTATION_ANGLE),
        hatch_spacing: columns
            .hatch_spacing
            .unwrap_or(machine::DEFAULT_HATCH_SPACING),
        slicing_stripe_width: columns
            .stripe_width
            .unwrap_or(machine::DEFAULT_SLICING_STRIPE_WIDTH),
    }
}

/// Typed simulation input for `row`, empty optional columns take their default values
pub fn input_for_row(
    row: &SimulationRow,
    material: Material,
) -> Result<SimulationInput, ValidationError> {
    let machine = machine_for(&row.machine);

    match &row.parameters {
        Parameters::SingleBead { bead_length } => {
            SingleBeadInput::new(&row.id, material, machine, *bead_length).map(Into::into)
        }
        Parameters::Porosity {
            size_x,
            size_y,
            size_z,
        } => PorosityInput::new(&row.id, material, machine, [*size_x, *size_y, *size_z])
            .map(Into::into),
        Parameters::Microstructure(columns) => {
            let given = [
                columns.cooling_rate,
                columns.thermal_gradient,
                columns.melt_pool_width,
                columns.melt_pool_depth,
            ];
            let thermal = given.iter().any(Option::is_some).then(|| {
                let defaults = ThermalParameters::default();

                ThermalParameters {
                    cooling_rate: columns.cooling_rate.unwrap_or(defaults.cooling_rate),
                    thermal_gradient: columns
                        .thermal_gradient
                        .unwrap_or(defaults.thermal_gradient),
                    melt_pool_width: columns.melt_pool_width.unwrap_or(defaults.melt_pool_width),
                    melt_pool_depth: columns.melt_pool_depth.unwrap_or(defaults.melt_pool_depth),
                }
            });

            MicrostructureInput::new(
                &row.id,
                material,
                machine,
                [columns.min_x, columns.min_y, columns.min_z],
                [columns.size_x, columns.size_y, columns.size_z],
                columns.sensor_dimension,
                thermal,
                columns
                    .random_seed
                    .unwrap_or(microstructure::DEFAULT_RANDOM_SEED),
            )
            .map(Into::into)
        }
    }
}
