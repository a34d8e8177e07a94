use super::{RunError, RunFilter};
use crate::study::{SimulationRow, SimulationStatus};
use std::collections::HashSet;
use tracing::warn;

/// Pending rows matching `filter`, ordered by priority and then by insertion.
///
/// Requested ids are matched as a set, so repeating an id selects its row once.
pub fn select<'a>(
    rows: &'a [SimulationRow],
    filter: &RunFilter,
) -> Result<Vec<&'a SimulationRow>, RunError> {
    filter.check()?;

    let ids: Option<HashSet<&str>> = filter
        .ids
        .as_ref()
        .map(|ids| ids.iter().map(String::as_str).collect());

    let mut selected: Vec<&SimulationRow> = rows
        .iter()
        .filter(|row| row.status == SimulationStatus::Pending)
        .filter(|row| {
            filter
                .types
                .as_ref()
                .map_or(true, |types| types.contains(&row.kind()))
        })
        .filter(|row| filter.priority.map_or(true, |priority| row.priority == priority))
        .filter(|row| filter.iteration.map_or(true, |iteration| row.iteration == iteration))
        .filter(|row| ids.as_ref().map_or(true, |ids| ids.contains(row.id.as_str())))
        .collect();

    // stable, ties keep the insertion order
    selected.sort_by_key(|row| row.priority);

    if selected.is_empty() {
        warn!("None of the input simulations meet the criteria selected");
    }

    Ok(selected)
}
