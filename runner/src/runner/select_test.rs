use super::{select::select, RunError, RunFilter};
use crate::{
    inputs::{Machine, Material, PorosityInput, SimulationInput, SingleBeadInput},
    study::{SimulationRow, SimulationStatus, SimulationType},
};

fn row(id: &str, kind: SimulationType, priority: i64, iteration: i64) -> SimulationRow {
    let material = Material::named("IN625");
    let input: SimulationInput = match kind {
        SimulationType::Porosity => {
            PorosityInput::new(id, material, Machine::default(), [3e-3; 3])
                .unwrap()
                .into()
        }
        _ => SingleBeadInput::new(id, material, Machine::default(), 3e-3)
            .unwrap()
            .into(),
    };

    SimulationRow::from_input(&input, SimulationStatus::Pending, iteration, priority)
}

fn rows() -> Vec<SimulationRow> {
    let mut rows = vec![
        row("a", SimulationType::SingleBead, 2, 0),
        row("b", SimulationType::Porosity, 1, 0),
        row("c", SimulationType::SingleBead, 1, 1),
        row("d", SimulationType::Porosity, 2, 1),
        row("e", SimulationType::SingleBead, 1, 0),
    ];
    rows[4].status = SimulationStatus::Completed;
    rows
}

fn ids(selected: Vec<&SimulationRow>) -> Vec<&str> {
    selected.into_iter().map(|row| row.id.as_str()).collect()
}

#[test]
pub fn pending_rows_by_priority() {
    let rows = rows();

    assert_eq!(
        ids(select(&rows, &RunFilter::all()).unwrap()),
        vec!["b", "c", "a", "d"]
    );
}

#[test]
pub fn filter_by_type() {
    let rows = rows();
    let filter = RunFilter::all().types(&[SimulationType::Porosity]);

    assert_eq!(ids(select(&rows, &filter).unwrap()), vec!["b", "d"]);
}

#[test]
pub fn filter_by_priority_and_iteration() {
    let rows = rows();

    assert_eq!(
        ids(select(&rows, &RunFilter::all().priority(2)).unwrap()),
        vec!["a", "d"]
    );
    assert_eq!(
        ids(select(&rows, &RunFilter::all().priority(1).iteration(1)).unwrap()),
        vec!["c"]
    );
}

#[test]
pub fn repeated_ids_select_once() {
    let rows = rows();
    let filter = RunFilter::all().ids(&["d", "b", "d", "e", "unknown"]);

    // e is completed, unknown is not part of the rows
    assert_eq!(ids(select(&rows, &filter).unwrap()), vec!["b", "d"]);
}

#[test]
pub fn no_match_is_empty() {
    let rows = rows();
    let filter = RunFilter::all()
        .types(&[SimulationType::Microstructure])
        .priority(1);

    assert!(select(&rows, &filter).unwrap().is_empty());
    assert!(select(&[], &RunFilter::all()).unwrap().is_empty());
}

#[test]
pub fn malformed_filters_are_rejected() {
    let rows = rows();

    assert!(matches!(
        select(&rows, &RunFilter::all().types(&[])),
        Err(RunError::MalformedFilter(_))
    ));
    assert!(matches!(
        select(&rows, &RunFilter::all().ids(&["a", ""])),
        Err(RunError::MalformedFilter(_))
    ));
}
