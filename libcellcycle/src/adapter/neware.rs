use super::{attach, indices, optional, required, scaled, CapacityUnit, Format};
use crate::error::AdapterError;
use crate::sample::{ChargeReading, Recording, Sample, State};
use crate::state::StateRule;
use crate::table::RawTable;

const INDEX: &[&str] = &["Index"];
const STATUS: &[&str] = &["Status"];
const CURRENT: &[&str] = &["Current(mA)"];
const VOLTAGE: &[&str] = &["Voltage"];
const TIME: &[&str] = &["Time"];
const DISCHARGE: &[&str] = &["Discharge_Capacity(mAh)"];
const CHARGE: &[&str] = &["Charge_Capacity(mAh)"];

// The decoder's Current(mA) column is written in A on the instruments this was validated on
const CURRENT_SCALE: f64 = 1000.0;

// Neware charge steps are the discharge direction of the canonical labels, and vice versa
const STATUS_LABELS: &[(&str, State)] = &[
    ("Rest", State::Rest),
    ("Pause", State::Rest),
    ("CC_Chg", State::Discharge),
    ("CV_Chg", State::Discharge),
    ("CCCV_Chg", State::Discharge),
    ("CP_Chg", State::Discharge),
    ("CR_Chg", State::Discharge),
    ("CC_DChg", State::Charge),
    ("CV_DChg", State::Charge),
    ("CCCV_DChg", State::Charge),
    ("CP_DChg", State::Charge),
    ("CR_DChg", State::Charge),
];

pub(super) fn matches(table: &RawTable) -> bool {
    table.has_columns(STATUS) && table.has_columns(CURRENT)
}

fn status_to_state(label: &str) -> Option<State> {
    STATUS_LABELS
        .iter()
        .find(|(l, _)| *l == label.trim())
        .map(|(_, s)| *s)
}

/// Unrecognized labels are active steps of an unknown kind. They take the state of the latest
/// active step, or of the next one when none came before. With no active step at all they are
/// left at rest.
fn resolve_unknown(known: &[Option<State>]) -> Vec<State> {
    let first_active = known
        .iter()
        .flatten()
        .find(|s| !s.is_rest())
        .copied()
        .unwrap_or(State::Rest);
    let mut last_active = first_active;
    known
        .iter()
        .map(|state| match state {
            Some(s) => {
                if !s.is_rest() {
                    last_active = *s;
                }
                *s
            }
            None => last_active,
        })
        .collect()
}

pub(super) fn translate(table: &RawTable, unit: CapacityUnit) -> Result<Recording, AdapterError> {
    let format = Format::NewareBinary;
    let status_name = table.first_present(STATUS).ok_or(AdapterError::MissingColumn {
        format: format.name(),
        column: STATUS[0],
    })?;
    let labels = table.text(status_name)?;
    let known: Vec<Option<State>> = labels.iter().map(|l| status_to_state(l)).collect();
    let unknown = known.iter().filter(|s| s.is_none()).count();
    if unknown > 0 {
        let first = known.iter().position(|s| s.is_none()).unwrap_or(0);
        log::warn!(
            "{format} adapter found {unknown} rows with unrecognized status labels (first {:?} at row {first}); they continue the surrounding step.",
            labels[first]
        );
    }
    let states = resolve_unknown(&known);

    let index = indices(table, INDEX)?;
    let current = scaled(required(table, format, CURRENT)?, CURRENT_SCALE);
    let voltage = required(table, format, VOLTAGE)?;
    let time = optional(table, TIME)?;
    let discharge = scaled(required(table, format, DISCHARGE)?, unit.to_mah());
    let charge = scaled(required(table, format, CHARGE)?, unit.to_mah());

    let mut samples: Vec<Sample> = index
        .iter()
        .zip(&voltage)
        .zip(discharge.iter().zip(&charge))
        .zip(&states)
        .map(|(((i, v), (d, c)), state)| {
            Sample::new(
                *i,
                *v,
                ChargeReading::Counters {
                    discharge: *d,
                    charge: *c,
                },
            )
            .with_state(*state)
        })
        .collect();
    attach(&mut samples, time.as_deref(), Some(current.as_slice()));
    Ok(Recording::new(format, StateRule::Labelled, samples))
}
