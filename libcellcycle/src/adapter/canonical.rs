use super::{indices, optional, whole_numbers, Format};
use crate::error::AdapterError;
use crate::sample::{
    ChargeReading, Recording, Sample, State, CANONICAL_COLUMNS, CAPACITY_COLUMN, CURRENT_COLUMN,
    FULL_CYCLE_COLUMN, HALF_CYCLE_COLUMN, INDEX_COLUMN, STATE_COLUMN, TIME_COLUMN,
    VOLTAGE_COLUMN,
};
use crate::state::StateRule;
use crate::table::RawTable;

/// A table that was already normalized. Every canonical column must be present; the values
/// are taken as they are.
pub(super) fn translate(table: &RawTable) -> Result<Recording, AdapterError> {
    let format = Format::PreNormalizedTable;
    if let Some(missing) = CANONICAL_COLUMNS.iter().find(|c| !table.has_column(c)) {
        return Err(AdapterError::MissingColumn {
            format: format.name(),
            column: *missing,
        });
    }

    let index = indices(table, &[INDEX_COLUMN])?;
    let states = table
        .text(STATE_COLUMN)?
        .iter()
        .enumerate()
        .map(|(row, label)| {
            State::from_label(label).ok_or_else(|| AdapterError::BadState {
                value: label.clone(),
                row,
            })
        })
        .collect::<Result<Vec<State>, AdapterError>>()?;
    let half_cycle = cycle_ids(table, HALF_CYCLE_COLUMN)?;
    let full_cycle = cycle_ids(table, FULL_CYCLE_COLUMN)?;
    let capacity = table.numeric(CAPACITY_COLUMN)?;
    let voltage = table.numeric(VOLTAGE_COLUMN)?;
    let current = table.numeric(CURRENT_COLUMN)?;
    let time = optional(table, &[TIME_COLUMN])?;

    let samples = (0..table.n_rows())
        .map(|row| {
            let mut sample = Sample::new(
                index[row],
                voltage[row],
                ChargeReading::HalfCycle(capacity[row]),
            )
            .with_state(states[row]);
            sample.current = present(current[row]);
            sample.time = time.as_ref().and_then(|t| present(t[row]));
            sample.half_cycle = half_cycle[row];
            sample.full_cycle = full_cycle[row];
            sample.capacity = capacity[row];
            sample
        })
        .collect();

    let mut recording = Recording::new(format, StateRule::Labelled, samples);
    recording.canonical = true;
    Ok(recording)
}

/// A cycle id column. Blank, negative and fractional ids are rejected.
fn cycle_ids(table: &RawTable, column: &'static str) -> Result<Vec<u32>, AdapterError> {
    let values = table.numeric(column)?;
    let ids = whole_numbers(&values, u32::MAX as f64)
        .map_err(|(row, value)| AdapterError::BadCycle { column, row, value })?;
    Ok(ids.into_iter().map(|id| id as u32).collect())
}

/// Empty cells are written for readings the instrument did not record
fn present(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}
