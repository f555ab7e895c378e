use super::{attach, indices, optional, required, scaled, Format};
use crate::error::AdapterError;
use crate::sample::{ChargeReading, Recording, Sample};
use crate::state::StateRule;
use crate::table::RawTable;

// Arbin records current in A and capacity in Ah
const AMPS_TO_MILLIAMPS: f64 = 1000.0;
const AMP_HOURS_TO_MILLIAMP_HOURS: f64 = 1000.0;

// Channel_Normal_Table of a .res database
const DB_INDEX: &[&str] = &["Data_Point"];
const DB_CURRENT: &[&str] = &["Current"];
const DB_VOLTAGE: &[&str] = &["Voltage"];
const DB_TIME: &[&str] = &["Test_Time"];
const DB_DISCHARGE: &[&str] = &["Discharge_Capacity", "Discharge_Capacity(Ah)"];
const DB_CHARGE: &[&str] = &["Charge_Capacity", "Charge_Capacity(Ah)"];

// Channel sheets of a spreadsheet export
const XL_CURRENT: &[&str] = &["Current(A)"];
const XL_VOLTAGE: &[&str] = &["Voltage(V)"];
const XL_TIME: &[&str] = &["Test_Time(s)"];
const XL_DISCHARGE: &[&str] = &["Discharge_Capacity(Ah)"];
const XL_CHARGE: &[&str] = &["Charge_Capacity(Ah)"];

pub(super) fn matches_database(table: &RawTable) -> bool {
    table.has_columns(DB_INDEX) && table.has_columns(DB_CURRENT)
}

pub(super) fn matches_spreadsheet(table: &RawTable) -> bool {
    table.has_columns(XL_CURRENT) && table.has_columns(XL_VOLTAGE)
}

pub(super) fn translate_database(table: &RawTable) -> Result<Recording, AdapterError> {
    let format = Format::ArbinDatabase;
    if !table.has_columns(DB_INDEX) {
        return Err(AdapterError::MissingColumn {
            format: format.name(),
            column: DB_INDEX[0],
        });
    }
    let table = table.sort_by(DB_INDEX[0])?;
    let index = indices(&table, DB_INDEX)?;
    let current = scaled(required(&table, format, DB_CURRENT)?, AMPS_TO_MILLIAMPS);
    let voltage = required(&table, format, DB_VOLTAGE)?;
    let time = optional(&table, DB_TIME)?;
    let (discharge, charge) = counters(&table, format, DB_DISCHARGE, DB_CHARGE)?;

    let mut samples = build(&index, &voltage, &discharge, &charge);
    attach(&mut samples, time.as_deref(), Some(current.as_slice()));
    Ok(Recording::new(format, StateRule::default(), samples))
}

pub(super) fn translate_spreadsheet(table: &RawTable) -> Result<Recording, AdapterError> {
    let format = Format::ArbinSpreadsheet;
    let current = scaled(required(table, format, XL_CURRENT)?, AMPS_TO_MILLIAMPS);
    let voltage = required(table, format, XL_VOLTAGE)?;
    let time = optional(table, XL_TIME)?;
    let (discharge, charge) = counters(table, format, XL_DISCHARGE, XL_CHARGE)?;
    let index: Vec<u64> = (0..table.n_rows() as u64).collect();

    let mut samples = build(&index, &voltage, &discharge, &charge);
    attach(&mut samples, time.as_deref(), Some(current.as_slice()));
    Ok(Recording::new(format, StateRule::default(), samples))
}

/// The discharge and charge counters in mAh
fn counters(
    table: &RawTable,
    format: Format,
    discharge: &[&'static str],
    charge: &[&'static str],
) -> Result<(Vec<f64>, Vec<f64>), AdapterError> {
    match (optional(table, discharge)?, optional(table, charge)?) {
        (Some(d), Some(c)) => Ok((
            scaled(d, AMP_HOURS_TO_MILLIAMP_HOURS),
            scaled(c, AMP_HOURS_TO_MILLIAMP_HOURS),
        )),
        _ => Err(AdapterError::NoChargeSignal {
            format: format.name(),
        }),
    }
}

fn build(index: &[u64], voltage: &[f64], discharge: &[f64], charge: &[f64]) -> Vec<Sample> {
    index
        .iter()
        .zip(voltage)
        .zip(discharge.iter().zip(charge))
        .map(|((i, v), (d, c))| {
            Sample::new(
                *i,
                *v,
                ChargeReading::Counters {
                    discharge: *d,
                    charge: *c,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterOptions;
    use crate::capacity::CapacityNormalizer;
    use crate::state::StateSegmenter;
    use approx::assert_relative_eq;

    #[test]
    fn test_database_is_sorted_and_scaled() {
        let contents = "Data_Point,Test_Time,Current,Voltage,Charge_Capacity,Discharge_Capacity\n\
                        2,20,0.001,3.6,0.0005,0\n\
                        1,10,0.001,3.5,0,0\n\
                        3,30,0,3.6,0.0005,0\n";
        let table = RawTable::parse_delimited(contents, ',').unwrap();
        let mut recording = Format::ArbinDatabase
            .translate(&table, &AdapterOptions::default())
            .unwrap();
        let index: Vec<u64> = recording.samples.iter().map(|s| s.index).collect();
        assert_eq!(index, vec![1, 2, 3]);
        assert_eq!(recording.samples[0].current, Some(1.0));
        assert_eq!(recording.samples[0].time, Some(10.0));

        StateSegmenter::new(recording.state_rule)
            .segment(&mut recording.samples)
            .unwrap();
        CapacityNormalizer::new()
            .normalize(&mut recording.samples)
            .unwrap();
        assert_relative_eq!(recording.samples[1].capacity, 0.5, epsilon = 1e-12);
        assert_relative_eq!(recording.samples[2].capacity, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_spreadsheet_requires_counters() {
        let table = RawTable::parse_delimited("Current(A),Voltage(V)\n0.1,3.0\n", ',').unwrap();
        match Format::ArbinSpreadsheet.translate(&table, &AdapterOptions::default()) {
            Err(AdapterError::NoChargeSignal { format }) => assert_eq!(format, "ArbinSpreadsheet"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_spreadsheet_counters_in_mah() {
        let contents = "Test_Time(s),Current(A),Voltage(V),Charge_Capacity(Ah),Discharge_Capacity(Ah)\n\
                        0,-0.5,3.0,0.1,0.2\n";
        let table = RawTable::parse_delimited(contents, ',').unwrap();
        let recording = Format::ArbinSpreadsheet
            .translate(&table, &AdapterOptions::default())
            .unwrap();
        let sample = &recording.samples[0];
        assert_eq!(sample.current, Some(-500.0));
        assert_eq!(
            sample.charge,
            ChargeReading::Counters {
                discharge: 200.0,
                charge: 100.0
            }
        );
    }
}
