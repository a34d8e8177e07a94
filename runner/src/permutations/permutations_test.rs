use super::{
    derived::{build_rate, energy_density, Bounds},
    microstructure_inputs, porosity_inputs, single_bead_inputs, DerivedBounds, MachineRanges,
    MicrostructurePermutations, PorosityPermutations, SingleBeadPermutations, DEFAULT_ITERATION,
    DEFAULT_PRIORITY,
};
use crate::{
    inputs::{machine, microstructure, single_bead, SimulationInput},
    study::{SimulationStatus, SimulationType, Study},
};

fn powers(powers: &[f64]) -> MachineRanges {
    MachineRanges {
        laser_powers: powers.to_vec(),
        ..MachineRanges::default()
    }
}

#[test]
pub fn single_bead_build_rate_has_no_hatch() {
    assert_eq!(build_rate(1.0, 5e-5, None), 5e-5);
    assert_eq!(build_rate(1.0, 5e-5, Some(1e-4)), 5e-9);
    assert_eq!(energy_density(250.0, 1.0, 5e-5, None), 5e6);
    assert!(energy_density(250.0, 0.0, 5e-5, None).is_nan());
}

#[test]
pub fn bounds_filter_inclusive() {
    let bounds = Bounds::new(Some(1.0), Some(2.0));

    assert!(bounds.admits(1.0));
    assert!(bounds.admits(2.0));
    assert!(!bounds.admits(0.5));
    assert!(!bounds.admits(2.5));
}

#[test]
pub fn nan_passes_only_unbounded() {
    assert!(Bounds::default().admits(f64::NAN));
    assert!(!Bounds::new(Some(0.0), None).admits(f64::NAN));
    assert!(!Bounds::new(None, Some(1e9)).admits(f64::NAN));
}

#[test]
pub fn energy_density_window_selects_one_power() {
    let mut request = SingleBeadPermutations::new("IN625", powers(&[50.0, 250.0, 700.0]));
    request.bounds = DerivedBounds {
        energy_density: Bounds::new(Some(4e6), Some(6e6)),
        build_rate: Bounds::default(),
    };

    let inputs = single_bead_inputs(&request);

    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].machine().laser_power, 250.0);
    assert_eq!(inputs[0].id(), "");
}

#[test]
pub fn permutations_span_every_range() {
    let ranges = MachineRanges {
        laser_powers: vec![100.0, 200.0],
        scan_speeds: vec![0.5, 1.0, 1.5],
        hatch_spacings: vec![8e-5, 1e-4],
        ..MachineRanges::default()
    };

    // hatch spacing does not apply to single bead tracks
    assert_eq!(
        single_bead_inputs(&SingleBeadPermutations::new("IN625", ranges.clone())).len(),
        6
    );
    assert_eq!(
        porosity_inputs(&PorosityPermutations::new("IN625", ranges)).len(),
        12
    );
}

#[test]
pub fn empty_ranges_use_defaults() {
    let inputs = microstructure_inputs(&MicrostructurePermutations::new(
        "IN625",
        MachineRanges::default(),
    ));

    assert_eq!(inputs.len(), 1);
    match &inputs[0] {
        SimulationInput::Microstructure(input) => {
            assert_eq!(input.machine.laser_power, machine::DEFAULT_LASER_POWER);
            assert_eq!(input.machine.hatch_spacing, machine::DEFAULT_HATCH_SPACING);
            assert_eq!(input.sensor_dimension, microstructure::DEFAULT_SENSOR_DIMENSION);
            assert_eq!(input.thermal, None);
            assert_eq!(input.random_seed, microstructure::DEFAULT_RANDOM_SEED);
        }
        other => panic!("unexpected input {other:?}"),
    }
}

#[test]
pub fn one_thermal_value_fills_the_rest() {
    let mut request = MicrostructurePermutations::new("IN625", MachineRanges::default());
    request.cooling_rate = Some(2e6);

    let thermal = request.thermal().unwrap();

    assert_eq!(thermal.cooling_rate, 2e6);
    assert_eq!(
        thermal.thermal_gradient,
        microstructure::DEFAULT_THERMAL_GRADIENT
    );
    assert_eq!(thermal.melt_pool_depth, microstructure::DEFAULT_MELT_POOL_DEPTH);
}

#[test]
pub fn invalid_combinations_are_dropped() {
    // 800 W is above the machine limit
    let inputs = single_bead_inputs(&SingleBeadPermutations::new(
        "IN625",
        powers(&[100.0, 800.0]),
    ));

    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].machine().laser_power, 100.0);
}

#[test]
pub fn requests_read_from_yaml() {
    let request: SingleBeadPermutations = serde_yaml::from_str(
        "
material: IN625
ranges:
  laser_powers: [100, 200]
bounds:
  energy_density:
    min: 1.0e6
",
    )
    .unwrap();

    assert_eq!(request.iteration, DEFAULT_ITERATION);
    assert_eq!(request.priority, DEFAULT_PRIORITY);
    assert_eq!(request.bead_length, None);
    assert_eq!(request.bounds.energy_density.min, Some(1e6));
    assert!(!request.bounds.build_rate.is_bounded());
}

#[test]
pub fn generated_rows_are_pending() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = Study::new(&dir.path().join("generated")).unwrap();

    let mut request = SingleBeadPermutations::new("IN625", powers(&[100.0, 200.0]));
    request.iteration = 4;
    request.priority = 2;
    assert_eq!(study.generate_single_bead_permutations(&request).unwrap(), 2);

    for row in study.rows() {
        assert_eq!(row.status, SimulationStatus::Pending);
        assert_eq!(row.kind(), SimulationType::SingleBead);
        assert_eq!(row.iteration, 4);
        assert_eq!(row.priority, 2);
        assert!(row.id.starts_with("sb_4_"));
        assert_eq!(row.machine.hatch_spacing, None);
        assert_eq!(row.build_rate, machine::DEFAULT_SCAN_SPEED * machine::DEFAULT_LAYER_THICKNESS);
    }

    let porosity = PorosityPermutations::new("IN625", powers(&[100.0]));
    assert_eq!(study.generate_porosity_permutations(&porosity).unwrap(), 1);
    let row = &study.rows()[2];
    assert!(row.id.starts_with("por_0_"));
    assert_eq!(row.machine.hatch_spacing, Some(machine::DEFAULT_HATCH_SPACING));
}

#[test]
pub fn default_bead_length() {
    let inputs = single_bead_inputs(&SingleBeadPermutations::new(
        "IN625",
        MachineRanges::default(),
    ));

    match &inputs[0] {
        SimulationInput::SingleBead(input) => {
            assert_eq!(input.bead_length, single_bead::DEFAULT_BEAD_LENGTH)
        }
        other => panic!("unexpected input {other:?}"),
    }
}
