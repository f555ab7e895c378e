use super::{required, Format};
use crate::error::AdapterError;
use crate::sample::{ChargeReading, Recording, Sample};
use crate::state::{SignConvention, StateRule};
use crate::table::RawTable;

const TIME: &[&str] = &["time /s"];
const CURRENT: &[&str] = &["I /mA"];
const VOLTAGE: &[&str] = &["E /V"];

pub(super) fn matches(table: &RawTable) -> bool {
    table.has_columns(TIME) && table.has_columns(CURRENT) && table.has_columns(VOLTAGE)
}

/// Ivium records only time, current and voltage. Capacity is integrated from the current, and
/// there is no rest state.
pub(super) fn translate(table: &RawTable) -> Result<Recording, AdapterError> {
    let format = Format::IviumText;
    let time = required(table, format, TIME)?;
    let current = required(table, format, CURRENT)?;
    let voltage = required(table, format, VOLTAGE)?;

    let samples = time
        .iter()
        .zip(&current)
        .zip(&voltage)
        .enumerate()
        .map(|(i, ((t, c), v))| {
            Sample::new(i as u64, *v, ChargeReading::Current)
                .with_time(*t)
                .with_current(*c)
        })
        .collect();
    Ok(Recording::new(
        format,
        StateRule::Current(SignConvention::NO_REST),
        samples,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterOptions;
    use crate::capacity::{CapacityMode, CapacityNormalizer};
    use crate::state::StateSegmenter;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_current_joins_charge() {
        let contents = "time /s\tI /mA\tE /V\n0\t0\t3.0\n1800\t2\t3.1\n3600\t2\t3.2\n5400\t-2\t3.1\n";
        let table = RawTable::parse_delimited(contents, '\t').unwrap();
        let mut recording = Format::IviumText
            .translate(&table, &AdapterOptions::default())
            .unwrap();
        StateSegmenter::new(recording.state_rule)
            .segment(&mut recording.samples)
            .unwrap();
        let mode = CapacityNormalizer::new()
            .normalize(&mut recording.samples)
            .unwrap();
        assert_eq!(mode, CapacityMode::CurrentIntegral);
        let halves: Vec<u32> = recording.samples.iter().map(|s| s.half_cycle).collect();
        assert_eq!(halves, vec![1, 1, 1, 2]);
        assert_relative_eq!(recording.samples[2].capacity, 2.0, epsilon = 1e-12);
        assert_eq!(recording.samples[3].capacity, 0.0);
    }

    #[test]
    fn test_requires_all_columns() {
        let table = RawTable::parse_delimited("time /s\tE /V\n0\t3\n", '\t').unwrap();
        assert!(!matches(&table));
        assert!(matches!(
            Format::IviumText.translate(&table, &AdapterOptions::default()),
            Err(AdapterError::MissingColumn { column: "I /mA", .. })
        ));
    }
}
