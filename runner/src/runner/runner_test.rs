use super::{prepare_inputs, run, RunError, RunFilter, RunSummary};
use crate::{
    executors::{local::LocalExecutor, local_test::FakeConnection, Assignment, Executors},
    inputs::{Machine, Material, PorosityInput, SimulationInput, SingleBeadInput},
    materials::{MaterialCatalog, NamedMaterials},
    permutations::{derived::Bounds, DerivedBounds, MachineRanges, SingleBeadPermutations},
    progress::NullProgress,
    study::{Results, SimulationStatus, SimulationType, Study},
};
use std::{collections::BTreeMap, time::Duration};

fn executor(connection: FakeConnection) -> Executors<FakeConnection> {
    Executors::Local(LocalExecutor::new(
        vec![connection],
        Assignment::RoundRobin,
        Duration::from_millis(1),
    ))
}

fn submitted(executor: &Executors<FakeConnection>) -> Vec<String> {
    let Executors::Local(local) = executor;
    local.connections()[0].submitted()
}

fn single_bead(id: &str, material: &str) -> SimulationInput {
    SingleBeadInput::new(id, Material::named(material), Machine::default(), 3e-3)
        .unwrap()
        .into()
}

fn porosity(id: &str) -> SimulationInput {
    PorosityInput::new(id, Material::named("IN625"), Machine::default(), [3e-3; 3])
        .unwrap()
        .into()
}

fn catalog() -> MaterialCatalog {
    let mut catalog = MaterialCatalog::new();
    catalog.insert(Material {
        name: "IN625".to_owned(),
        properties: BTreeMap::from([("density".to_owned(), 8440.0)]),
    });
    catalog
}

fn study(dir: &tempfile::TempDir, inputs: &[SimulationInput]) -> Study {
    let mut study = Study::new(&dir.path().join("run")).unwrap();
    study
        .add_inputs(inputs, 0, 1, SimulationStatus::Pending)
        .unwrap();
    study
}

#[test]
pub fn generated_study_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = Study::new(&dir.path().join("study")).unwrap();

    let mut request = SingleBeadPermutations::new(
        "IN625",
        MachineRanges {
            laser_powers: vec![50.0, 250.0, 700.0],
            ..MachineRanges::default()
        },
    );
    request.bounds = DerivedBounds {
        energy_density: Bounds::new(Some(4e6), Some(6e6)),
        build_rate: Bounds::default(),
    };
    assert_eq!(study.generate_single_bead_permutations(&request).unwrap(), 1);

    let executor = executor(FakeConnection::new("local", 2));
    let summary = study
        .run_simulations(&executor, &catalog(), &RunFilter::all(), &NullProgress)
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            selected: 1,
            skipped: 0,
            started: 1,
            completed: 1,
            failed: 0,
            unmatched: 0,
        }
    );

    let reloaded = Study::load(study.file_name()).unwrap();
    let row = &reloaded.rows()[0];
    assert_eq!(row.status, SimulationStatus::Completed);
    assert_eq!(row.machine.laser_power, 250.0);
    assert!(matches!(row.results, Some(Results::SingleBead(_))));
    assert_eq!(reloaded, study);
}

#[test]
pub fn missing_material_skips_only_its_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(
        &dir,
        &[
            single_bead("x", "IN625"),
            single_bead("y", "Unobtainium"),
            single_bead("z", "IN625"),
        ],
    );

    let executor = executor(FakeConnection::new("local", 1));
    let summary = study
        .run_simulations(&executor, &catalog(), &RunFilter::all(), &NullProgress)
        .unwrap();

    assert_eq!(summary.selected, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.completed, 2);
    assert_eq!(submitted(&executor), vec!["x", "z"]);
    assert_eq!(study.row("x").unwrap().status, SimulationStatus::Completed);
    assert_eq!(study.row("y").unwrap().status, SimulationStatus::Pending);
    assert_eq!(study.row("z").unwrap().status, SimulationStatus::Completed);
}

#[test]
pub fn invalid_parameters_skip_the_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir, &[porosity("ok"), porosity("broken")]);
    study.row_mut("broken").unwrap().machine.scan_speed = 10.0;

    let (inputs, skipped) = prepare_inputs(&study, &RunFilter::all(), &NamedMaterials).unwrap();

    assert_eq!(skipped, 1);
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].id(), "ok");
}

#[test]
pub fn failures_are_recorded_and_the_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir, &[porosity("p1"), porosity("p2"), porosity("p3")]);

    let executor = executor(FakeConnection::new("local", 1).failing(&["p2"]));
    let summary = study
        .run_simulations(&executor, &NamedMaterials, &RunFilter::all(), &NullProgress)
        .unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    let p2 = study.row("p2").unwrap();
    assert_eq!(p2.status, SimulationStatus::Error);
    assert_eq!(p2.error_message.as_deref(), Some("solver failed"));
    assert_eq!(study.row("p3").unwrap().status, SimulationStatus::Completed);
}

#[test]
pub fn repeated_ids_run_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir, &[porosity("x"), porosity("y"), porosity("z")]);

    let executor = executor(FakeConnection::new("local", 1));
    let summary = study
        .run_simulations(
            &executor,
            &NamedMaterials,
            &RunFilter::all().ids(&["x", "y", "x"]),
            &NullProgress,
        )
        .unwrap();

    assert_eq!(summary.started, 2);
    assert_eq!(submitted(&executor), vec!["x", "y"]);
    assert_eq!(study.row("z").unwrap().status, SimulationStatus::Pending);
}

#[test]
pub fn only_selected_types_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(
        &dir,
        &[single_bead("s", "IN625"), porosity("p"), single_bead("t", "IN625")],
    );

    let executor = executor(FakeConnection::new("local", 1));
    study
        .run_simulations(
            &executor,
            &NamedMaterials,
            &RunFilter::all().types(&[SimulationType::SingleBead]),
            &NullProgress,
        )
        .unwrap();

    assert_eq!(submitted(&executor), vec!["s", "t"]);
    assert_eq!(study.row("p").unwrap().status, SimulationStatus::Pending);
}

#[test]
pub fn second_run_finds_nothing_pending() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir, &[porosity("x")]);
    let executor = executor(FakeConnection::new("local", 1));

    study
        .run_simulations(&executor, &NamedMaterials, &RunFilter::all(), &NullProgress)
        .unwrap();
    let summary = study
        .run_simulations(&executor, &NamedMaterials, &RunFilter::all(), &NullProgress)
        .unwrap();

    assert_eq!(summary, RunSummary::default());
    assert_eq!(submitted(&executor), vec!["x"]);
}

#[test]
pub fn malformed_filter_submits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir, &[porosity("x")]);
    let executor = executor(FakeConnection::new("local", 1));

    let result = study.run_simulations(
        &executor,
        &NamedMaterials,
        &RunFilter::all().types(&[]),
        &NullProgress,
    );

    assert!(matches!(result, Err(RunError::MalformedFilter(_))));
    assert!(submitted(&executor).is_empty());
}

#[test]
pub fn run_leaves_the_study_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let study = study(&dir, &[porosity("x"), porosity("y")]);
    let executor = executor(FakeConnection::new("local", 1));

    let outcomes = run(
        &study,
        &executor,
        &NamedMaterials,
        &RunFilter::all(),
        &NullProgress,
    )
    .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(study
        .rows()
        .iter()
        .all(|row| row.status == SimulationStatus::Pending));
}
