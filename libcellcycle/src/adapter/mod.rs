//! Vendor schema adapters.
//!
//! Every supported cycler export is one variant of [`Format`]. An adapter takes the decoded
//! [`RawTable`] of its vendor and produces the ordered [`Sample`]s of a [`Recording`], with
//! units normalized to mA, mAh, V and s and the state rule the vendor's data calls for. Vendor
//! column names live as static alias tables in each vendor module.
mod arbin;
mod biologic;
mod canonical;
mod ivium;
mod land;
mod neware;

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::AdapterError;
use super::sample::{Recording, Sample, CANONICAL_COLUMNS};
use super::table::RawTable;

/// The supported input formats, resolved once at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    BiologicBinary,
    ArbinDatabase,
    ArbinSpreadsheet,
    LandNew,
    LandOld,
    IviumText,
    NewareBinary,
    PreNormalizedTable,
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BiologicBinary => "BiologicBinary",
            Self::ArbinDatabase => "ArbinDatabase",
            Self::ArbinSpreadsheet => "ArbinSpreadsheet",
            Self::LandNew => "LandNew",
            Self::LandOld => "LandOld",
            Self::IviumText => "IviumText",
            Self::NewareBinary => "NewareBinary",
            Self::PreNormalizedTable => "PreNormalizedTable",
        }
    }

    /// Formats identified by their file extension alone
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "mpr" => Some(Self::BiologicBinary),
            "res" => Some(Self::ArbinDatabase),
            "nda" | "ndax" => Some(Self::NewareBinary),
            _ => None,
        }
    }

    /// Identify a format from the columns of an exported table
    pub fn from_columns(table: &RawTable) -> Option<Self> {
        if table.has_columns(&CANONICAL_COLUMNS) {
            Some(Self::PreNormalizedTable)
        } else if biologic::matches(table) {
            Some(Self::BiologicBinary)
        } else if arbin::matches_database(table) {
            Some(Self::ArbinDatabase)
        } else if arbin::matches_spreadsheet(table) {
            Some(Self::ArbinSpreadsheet)
        } else if neware::matches(table) {
            Some(Self::NewareBinary)
        } else if ivium::matches(table) {
            Some(Self::IviumText)
        } else {
            land::detect(table)
        }
    }

    /// Resolve the format of a table read from a file with the given extension
    pub fn detect(extension: &str, table: &RawTable) -> Result<Self, AdapterError> {
        if table.has_columns(&CANONICAL_COLUMNS) {
            return Ok(Self::PreNormalizedTable);
        }
        if let Some(format) = Self::from_extension(extension) {
            return Ok(format);
        }
        match extension.to_lowercase().as_str() {
            // Plain text exports are only produced by Ivium cyclers
            "txt" => {
                if ivium::matches(table) {
                    Ok(Self::IviumText)
                } else {
                    Err(AdapterError::UnrecognizedFormat(format!(
                        "text file columns {:?} do not match an Ivium export",
                        table.headers()
                    )))
                }
            }
            // A csv with no vendor columns can only be a previously normalized table
            "csv" => Ok(Self::from_columns(table).unwrap_or(Self::PreNormalizedTable)),
            "tsv" | "xls" | "xlsx" => Self::from_columns(table).ok_or_else(|| {
                AdapterError::UnrecognizedFormat(format!(
                    "columns {:?} do not match any supported cycler",
                    table.headers()
                ))
            }),
            other => Err(AdapterError::UnrecognizedFormat(format!(
                "file extension {other:?} is not supported"
            ))),
        }
    }

    /// Translate a decoded table of this format into ordered raw samples
    pub fn translate(
        &self,
        table: &RawTable,
        options: &AdapterOptions,
    ) -> Result<Recording, AdapterError> {
        let recording = match self {
            Self::BiologicBinary => biologic::translate(table)?,
            Self::ArbinDatabase => arbin::translate_database(table)?,
            Self::ArbinSpreadsheet => arbin::translate_spreadsheet(table)?,
            Self::LandNew => land::translate(table, true)?,
            Self::LandOld => land::translate(table, false)?,
            Self::IviumText => ivium::translate(table)?,
            Self::NewareBinary => neware::translate(table, options.capacity_unit)?,
            Self::PreNormalizedTable => canonical::translate(table)?,
        };
        log::info!(
            "{} adapter produced {} samples.",
            self.name(),
            recording.samples.len()
        );
        Ok(recording)
    }
}

/// Unit the instrument actually wrote its capacity counters in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapacityUnit {
    #[default]
    #[serde(rename = "mAh")]
    MilliampHours,
    #[serde(rename = "Ah")]
    AmpHours,
}

impl CapacityUnit {
    /// Factor converting a value in this unit to mAh
    pub fn to_mah(&self) -> f64 {
        match self {
            Self::MilliampHours => 1.0,
            Self::AmpHours => 1000.0,
        }
    }
}

impl FromStr for CapacityUnit {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mAh" => Ok(Self::MilliampHours),
            "Ah" => Ok(Self::AmpHours),
            other => Err(AdapterError::UnsupportedUnit(other.to_string())),
        }
    }
}

/// Per-invocation adapter settings
#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterOptions {
    pub capacity_unit: CapacityUnit,
}

/// The first present alias of a required column, as numbers
fn required(
    table: &RawTable,
    format: Format,
    aliases: &[&'static str],
) -> Result<Vec<f64>, AdapterError> {
    let name = table
        .first_present(aliases)
        .ok_or(AdapterError::MissingColumn {
            format: format.name(),
            column: aliases[0],
        })?;
    Ok(table.numeric(name)?)
}

/// The first present alias of an optional column, as numbers
fn optional(table: &RawTable, aliases: &[&'static str]) -> Result<Option<Vec<f64>>, AdapterError> {
    match table.first_present(aliases) {
        Some(name) => Ok(Some(table.numeric(name)?)),
        None => Ok(None),
    }
}

/// Sample indices from a vendor index column, or the row position when there is none
fn indices(table: &RawTable, aliases: &[&'static str]) -> Result<Vec<u64>, AdapterError> {
    match table.first_present(aliases) {
        Some(column) => whole_numbers(&table.numeric(column)?, u64::MAX as f64)
            .map_err(|(row, value)| AdapterError::BadIndex { column, row, value }),
        None => Ok((0..table.n_rows() as u64).collect()),
    }
}

/// Check that every value is a finite, non-negative integer no larger than `max`.
/// Returns the first offending (row, value) otherwise.
fn whole_numbers(values: &[f64], max: f64) -> Result<Vec<u64>, (usize, f64)> {
    values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            if v.is_finite() && *v >= 0.0 && v.fract() == 0.0 && *v <= max {
                Ok(*v as u64)
            } else {
                Err((row, *v))
            }
        })
        .collect()
}

fn scaled(values: Vec<f64>, factor: f64) -> Vec<f64> {
    values.into_iter().map(|v| v * factor).collect()
}

/// Attach optional time and current columns to freshly built samples
fn attach(samples: &mut [Sample], time: Option<&[f64]>, current: Option<&[f64]>) {
    if let Some(time) = time {
        for (sample, t) in samples.iter_mut().zip(time) {
            sample.time = Some(*t);
        }
    }
    if let Some(current) = current {
        for (sample, c) in samples.iter_mut().zip(current) {
            sample.current = Some(*c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn table(contents: &str) -> RawTable {
        RawTable::parse_delimited(contents, ',').unwrap()
    }

    #[test]
    fn test_detect_by_extension_and_columns() {
        let any = table("x\n1\n");
        assert_eq!(Format::detect("mpr", &any).unwrap(), Format::BiologicBinary);
        assert_eq!(Format::detect("RES", &any).unwrap(), Format::ArbinDatabase);
        assert_eq!(Format::detect("ndax", &any).unwrap(), Format::NewareBinary);

        let ivium = table("time /s,I /mA,E /V\n0,1,3\n");
        assert_eq!(Format::detect("txt", &ivium).unwrap(), Format::IviumText);
        let err = Format::detect("txt", &any).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::UnrecognizedFormat));

        let arbin = table("Current(A),Voltage(V),Charge_Capacity(Ah),Discharge_Capacity(Ah)\n0,3,0,0\n");
        assert_eq!(Format::detect("xlsx", &arbin).unwrap(), Format::ArbinSpreadsheet);

        let canonical = table("index,state,half cycle,full cycle,Capacity,Voltage,Current\n0,R,0,0,0,3,0\n");
        assert_eq!(Format::detect("csv", &canonical).unwrap(), Format::PreNormalizedTable);
        assert_eq!(Format::detect("csv", &any).unwrap(), Format::PreNormalizedTable);

        let err = Format::detect("h5", &any).unwrap_err();
        assert!(matches!(err, AdapterError::UnrecognizedFormat(_)));
    }

    #[test]
    fn test_quoted_vendor_header_is_detected() {
        let arbin = table(
            "\"Current(A)\",\"Voltage(V)\",\"Charge_Capacity(Ah)\",\"Discharge_Capacity(Ah)\"\n\
             0.1,3.0,0,0\n",
        );
        assert_eq!(Format::detect("csv", &arbin).unwrap(), Format::ArbinSpreadsheet);
    }

    #[test]
    fn test_index_must_be_whole_number() {
        let t = table("Index,v\n1,3\n2.5,3\n");
        match indices(&t, &["Index"]) {
            Err(AdapterError::BadIndex { column, row, value }) => {
                assert_eq!(column, "Index");
                assert_eq!(row, 1);
                assert_eq!(value, 2.5);
            }
            other => panic!("unexpected result {other:?}"),
        }
        let t = table("Index,v\n-1,3\n");
        let err = indices(&t, &["Index"]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::SchemaMismatch));
        assert_eq!(indices(&table("v\n3\n4\n"), &["Index"]).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_capacity_unit_parsing() {
        assert_eq!("mAh".parse::<CapacityUnit>().unwrap(), CapacityUnit::MilliampHours);
        assert_eq!("Ah".parse::<CapacityUnit>().unwrap().to_mah(), 1000.0);
        let err = "Wh".parse::<CapacityUnit>().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::UnsupportedUnit));
    }

    #[test]
    fn test_missing_required_column_names_format() {
        let t = table("a\n1\n");
        match required(&t, Format::LandOld, &["Voltage/V"]) {
            Err(AdapterError::MissingColumn { format, column }) => {
                assert_eq!(format, "LandOld");
                assert_eq!(column, "Voltage/V");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
