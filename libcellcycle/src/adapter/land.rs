use super::{attach, indices, optional, required, Format};
use crate::error::AdapterError;
use crate::sample::{ChargeReading, Recording, Sample};
use crate::state::StateRule;
use crate::table::RawTable;

const INDEX: &[&str] = &["Index"];
const CURRENT: &[&str] = &["Current/mA"];
const VOLTAGE: &[&str] = &["Voltage/V"];
const CAPACITY: &[&str] = &["Capacity/mAh"];
const TIME: &[&str] = &["time /s"];

/// Newer LANDdt exports bury the header under a metadata block; its first cell reads Index
const HEADER_MARKER: &str = "Index";

pub(super) fn detect(table: &RawTable) -> Option<Format> {
    if table.has_columns(VOLTAGE) && table.has_columns(CURRENT) {
        if table.has_columns(INDEX) {
            Some(Format::LandOld)
        } else {
            Some(Format::LandNew)
        }
    } else {
        match table.promote_header(HEADER_MARKER) {
            Ok(promoted) if promoted.has_columns(VOLTAGE) => Some(Format::LandNew),
            _ => None,
        }
    }
}

pub(super) fn translate(table: &RawTable, new_layout: bool) -> Result<Recording, AdapterError> {
    let format = if new_layout {
        Format::LandNew
    } else {
        Format::LandOld
    };
    let promoted;
    let table = if new_layout && !table.has_columns(VOLTAGE) {
        promoted = table.promote_header(HEADER_MARKER)?;
        &promoted
    } else {
        table
    };

    // Step summary lines are interleaved with the records; they have no numeric current
    let current_column = table.column(
        table
            .first_present(CURRENT)
            .ok_or(AdapterError::MissingColumn {
                format: format.name(),
                column: CURRENT[0],
            })?,
    )?;
    let records = table.retain_rows(|row| current_column.value(row).is_some_and(|c| !c.is_nan()));
    let dropped = table.n_rows() - records.n_rows();
    if dropped > 0 {
        log::warn!("{format} adapter dropped {dropped} rows without a numeric current.");
    }

    let current = required(&records, format, CURRENT)?;
    let voltage = required(&records, format, VOLTAGE)?;
    let capacity = required(&records, format, CAPACITY)?;
    let time = optional(&records, TIME)?;
    let index = indices(&records, INDEX)?;

    let mut samples: Vec<Sample> = index
        .iter()
        .zip(&voltage)
        .zip(&capacity)
        .map(|((i, v), q)| Sample::new(*i, *v, ChargeReading::HalfCycle(*q)))
        .collect();
    attach(&mut samples, time.as_deref(), Some(current.as_slice()));
    Ok(Recording::new(format, StateRule::default(), samples))
}
