use super::{optional, required, Format};
use crate::error::AdapterError;
use crate::sample::{ChargeReading, Recording, Sample};
use crate::state::{SignConvention, StateRule};
use crate::table::RawTable;

const VOLTAGE: &[&str] = &["Ewe/V"];
const TIME: &[&str] = &["time/s"];
const HALF_CYCLE_CHARGE: &[&str] = &["Q charge/discharge/mA.h"];
const INCREMENT: &[&str] = &["dQ/mA.h", "dq/mA.h"];
const CUMULATIVE: &[&str] = &["(Q-Qo)/C"];
const CURRENT: &[&str] = &["I/mA", "<I>/mA"];

const COULOMBS_PER_MILLIAMP_HOUR: f64 = 3.6;

pub(super) fn matches(table: &RawTable) -> bool {
    table.first_present(VOLTAGE).is_some()
}

pub(super) fn translate(table: &RawTable) -> Result<Recording, AdapterError> {
    let format = Format::BiologicBinary;
    let voltage = required(table, format, VOLTAGE)?;
    let time = optional(table, TIME)?;
    let half_cycle_charge = optional(table, HALF_CYCLE_CHARGE)?;
    let increment = optional(table, INCREMENT)?;

    // Exports do not always carry the current, so it is rebuilt from the charge passed over
    // each time step. Failing that, the state comes from the voltage direction.
    let (current, state_rule) = match (&time, &increment, &half_cycle_charge) {
        (Some(t), Some(dq), _) => (derived_current(dq, t), StateRule::default()),
        (Some(t), None, Some(q)) => (derived_current(&diff(q, 0.0), t), StateRule::default()),
        _ => match optional(table, CURRENT)? {
            Some(measured) => (
                measured,
                StateRule::VoltageDelta(SignConvention::default()),
            ),
            None => {
                return Err(AdapterError::MissingColumn {
                    format: format.name(),
                    column: CURRENT[0],
                })
            }
        },
    };

    let charge: Vec<ChargeReading> = if let Some(q) = half_cycle_charge {
        q.into_iter().map(ChargeReading::HalfCycle).collect()
    } else if let Some(dq) = increment {
        dq.into_iter().map(ChargeReading::Increment).collect()
    } else if let Some(q) = optional(table, CUMULATIVE)? {
        q.into_iter()
            .map(|c| ChargeReading::Cumulative(c / COULOMBS_PER_MILLIAMP_HOUR))
            .collect()
    } else {
        return Err(AdapterError::NoChargeSignal {
            format: format.name(),
        });
    };

    let mut samples: Vec<Sample> = voltage
        .iter()
        .zip(charge)
        .zip(&current)
        .enumerate()
        .map(|(i, ((v, q), c))| Sample::new(i as u64, *v, q).with_current(*c))
        .collect();
    if let Some(time) = time {
        for (sample, t) in samples.iter_mut().zip(time) {
            sample.time = Some(t);
        }
    }
    Ok(Recording::new(format, state_rule, samples))
}

/// Differences with a value prepended, so the first element is `values[0] - first`
fn diff(values: &[f64], first: f64) -> Vec<f64> {
    let mut previous = first;
    values
        .iter()
        .map(|v| {
            let d = v - previous;
            previous = *v;
            d
        })
        .collect()
}

/// Current in mA from charge increments (mAh) over time steps (s)
fn derived_current(increment: &[f64], time: &[f64]) -> Vec<f64> {
    let dt = diff(time, 0.0);
    let mut current: Vec<f64> = increment
        .iter()
        .zip(&dt)
        .map(|(dq, dt)| dq / (dt / 3600.0))
        .collect();
    if let Some(first) = current.first_mut() {
        if first.is_nan() {
            *first = 0.0;
        }
    }
    current
}
