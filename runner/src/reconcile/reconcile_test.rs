use super::ReconcileReport;
use crate::{
    executors::local_test::summary_for,
    inputs::{Machine, Material, PorosityInput, SimulationInput, SingleBeadInput},
    study::{Results, SimulationStatus, Study},
    summary::{MeltPool, Outcome, SimulationError, Summary},
};
use std::path::PathBuf;

fn single_bead(id: &str) -> SimulationInput {
    SingleBeadInput::new(id, Material::named("IN625"), Machine::default(), 3e-3)
        .unwrap()
        .into()
}

fn porosity(id: &str) -> SimulationInput {
    PorosityInput::new(id, Material::named("IN625"), Machine::default(), [3e-3; 3])
        .unwrap()
        .into()
}

fn success(input: &SimulationInput) -> Outcome {
    Outcome::Summary(summary_for(input))
}

fn failure(input: &SimulationInput, message: &str) -> Outcome {
    Outcome::Error(SimulationError::new(input.clone(), message, ""))
}

fn study(dir: &tempfile::TempDir) -> Study {
    let mut study = Study::new(&dir.path().join("reconcile")).unwrap();
    study
        .add_inputs(
            &[single_bead("a"), porosity("b"), porosity("c")],
            0,
            1,
            SimulationStatus::Pending,
        )
        .unwrap();
    study
}

#[test]
pub fn outcomes_update_their_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir);

    let report = study
        .apply(&[success(&single_bead("a")), failure(&porosity("b"), "diverged")])
        .unwrap();

    assert_eq!(
        report,
        ReconcileReport {
            completed: 1,
            failed: 1,
            stale: 0,
            unmatched: 0,
        }
    );

    let a = study.row("a").unwrap();
    assert_eq!(a.status, SimulationStatus::Completed);
    match a.results {
        Some(Results::SingleBead(ref melt_pool)) => {
            assert_eq!(melt_pool.width, 1.1e-4);
            assert_eq!(melt_pool.length_over_width, Some(3e-4 / 1.1e-4));
        }
        ref other => panic!("unexpected results {other:?}"),
    }

    let b = study.row("b").unwrap();
    assert_eq!(b.status, SimulationStatus::Error);
    assert_eq!(b.error_message.as_deref(), Some("diverged"));

    assert_eq!(study.row("c").unwrap().status, SimulationStatus::Pending);
    assert_eq!(Study::load(study.file_name()).unwrap(), study);
}

#[test]
pub fn completed_rows_ignore_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir);
    study.apply(&[success(&porosity("b"))]).unwrap();

    let report = study.apply(&[failure(&porosity("b"), "late")]).unwrap();

    assert_eq!(report.stale, 1);
    assert_eq!(report.failed, 0);
    let b = study.row("b").unwrap();
    assert_eq!(b.status, SimulationStatus::Completed);
    assert_eq!(b.error_message, None);
    assert_eq!(
        b.results,
        Some(Results::Porosity {
            relative_density: 0.99
        })
    );
}

#[test]
pub fn success_after_error_completes() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir);
    study.apply(&[failure(&porosity("c"), "first try")]).unwrap();

    study.apply(&[success(&porosity("c"))]).unwrap();

    // the last error stays on record
    let c = study.row("c").unwrap();
    assert_eq!(c.status, SimulationStatus::Completed);
    assert_eq!(c.error_message.as_deref(), Some("first try"));
    assert_eq!(
        Study::load(study.file_name()).unwrap().row("c").unwrap().error_message.as_deref(),
        Some("first try")
    );
}

#[test]
pub fn applying_twice_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir);
    let outcomes = [
        success(&single_bead("a")),
        failure(&porosity("b"), "diverged"),
        success(&porosity("c")),
    ];

    study.apply(&outcomes).unwrap();
    let once = study.clone();
    study.apply(&outcomes).unwrap();

    assert_eq!(study, once);
}

#[test]
pub fn unknown_and_mismatched_outcomes_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir);
    let before = study.clone();

    // same id, different simulation type
    let report = study
        .apply(&[success(&porosity("a")), success(&porosity("zz"))])
        .unwrap();

    assert_eq!(report.unmatched, 2);
    assert_eq!(report.completed, 0);
    assert_eq!(study, before);
}

#[test]
pub fn output_dir_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir);

    let mut summary = summary_for(&single_bead("a"));
    if let Summary::SingleBead(ref mut single_bead) = summary {
        single_bead.output_dir = Some(dir.path().join("results").join("a"));
    }
    study.apply(&[Outcome::Summary(summary)]).unwrap();

    let expected: PathBuf = dir.path().join("results").join("a");
    assert_eq!(study.row("a").unwrap().output_dir, Some(expected.clone()));
    assert_eq!(
        Study::load(study.file_name()).unwrap().row("a").unwrap().output_dir,
        Some(expected)
    );
}

#[test]
pub fn relative_output_dir_is_kept_across_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir);

    let mut summary = summary_for(&single_bead("a"));
    if let Summary::SingleBead(ref mut single_bead) = summary {
        single_bead.output_dir = Some(PathBuf::from("results").join("a"));
    }
    study.apply(&[Outcome::Summary(summary)]).unwrap();

    let output_dir = study.row("a").unwrap().output_dir.clone();
    assert_eq!(output_dir, Some(dir.path().join("results").join("a")));
    assert_eq!(
        Study::load(study.file_name()).unwrap().row("a").unwrap().output_dir,
        output_dir
    );
}

#[test]
pub fn empty_measurements_are_kept_across_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let mut study = study(&dir);

    let mut summary = summary_for(&single_bead("a"));
    if let Summary::SingleBead(ref mut single_bead) = summary {
        single_bead.melt_pool = MeltPool::default();
    }
    study.apply(&[Outcome::Summary(summary)]).unwrap();

    let loaded = Study::load(study.file_name()).unwrap();
    let a = loaded.row("a").unwrap();
    assert_eq!(a.status, SimulationStatus::Completed);
    match a.results {
        Some(Results::SingleBead(ref melt_pool)) => {
            assert!(melt_pool.width.is_nan());
            assert!(melt_pool.reference_depth.is_nan());
            assert_eq!(melt_pool.length_over_width, None);
        }
        ref other => panic!("unexpected results {other:?}"),
    }
}
