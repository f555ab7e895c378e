use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

/// The error taxonomy shared by every stage of the pipeline.
///
/// Each stage has its own error enum (so the failing stage is always known), and each
/// of those maps onto one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnrecognizedFormat,
    SchemaMismatch,
    InvalidSign,
    InsufficientData,
    InvalidParameter,
    UnsupportedUnit,
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("RawTable failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Could not read table because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("RawTable was given a file with no header line")]
    NoHeader,
    #[error("RawTable delimiter {0:?} is not a single ASCII character")]
    BadDelimiter(char),
    #[error("RawTable failed to parse delimited text: {0}")]
    CsvError(#[from] csv::Error),
    #[error("RawTable does not contain a column named {0}")]
    MissingColumn(String),
    #[error("RawTable could not parse value {value:?} in column {column} (row {row}) as a number")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("RawTable could not find a header row marked with {0:?}")]
    NoHeaderRow(String),
}

impl TableError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::IOError(_) | Self::BadFilePath(_) => None,
            Self::CsvError(e) if e.is_io_error() => None,
            _ => Some(ErrorKind::SchemaMismatch),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Adapter failed due to RawTable error: {0}")]
    TableError(#[from] TableError),
    #[error("Adapter could not map the input to a known cycler format: {0}")]
    UnrecognizedFormat(String),
    #[error("Adapter for {format} expected column {column}, which is absent")]
    MissingColumn {
        format: &'static str,
        column: &'static str,
    },
    #[error("Adapter for {format} found no recognized charge signal (capacity, charge counter or current/time columns)")]
    NoChargeSignal { format: &'static str },
    #[error("Adapter does not support capacity unit {0:?}; expected mAh or Ah")]
    UnsupportedUnit(String),
    #[error("Adapter found cycle id {value} in column {column} (row {row}); cycle ids are whole numbers")]
    BadCycle {
        column: &'static str,
        row: usize,
        value: f64,
    },
    #[error("Adapter found sample index {value} in column {column} (row {row}); indices are whole numbers")]
    BadIndex {
        column: &'static str,
        row: usize,
        value: f64,
    },
    #[error("Adapter found invalid state value {value:?} at row {row} of a canonical table")]
    BadState { value: String, row: usize },
}

impl AdapterError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::TableError(e) => e.kind(),
            Self::UnrecognizedFormat(_) => Some(ErrorKind::UnrecognizedFormat),
            Self::MissingColumn { .. }
            | Self::NoChargeSignal { .. }
            | Self::BadState { .. }
            | Self::BadCycle { .. }
            | Self::BadIndex { .. } => Some(ErrorKind::SchemaMismatch),
            Self::UnsupportedUnit(_) => Some(ErrorKind::UnsupportedUnit),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("StateSegmenter requires a current value but sample {index} has none")]
    MissingCurrent { index: u64 },
    #[error("StateSegmenter found a current of {value} at sample {index}, which has no sign")]
    InvalidCurrent { index: u64, value: f64 },
    #[error("StateSegmenter found a voltage delta of {value} at sample {index}, which has no sign")]
    InvalidVoltageDelta { index: u64, value: f64 },
}

impl StateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCurrent { .. } => ErrorKind::SchemaMismatch,
            Self::InvalidCurrent { .. } | Self::InvalidVoltageDelta { .. } => {
                ErrorKind::InvalidSign
            }
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CapacityError {
    #[error("CapacityNormalizer found no recognized charge signal at sample {index}")]
    NoChargeSignal { index: u64 },
    #[error("CapacityNormalizer expected a {expected} charge signal at sample {index} but found {found}")]
    MixedSignal {
        index: u64,
        expected: &'static str,
        found: &'static str,
    },
    #[error("CapacityNormalizer requires field {field} at sample {index}, which is absent")]
    MissingField { index: u64, field: &'static str },
    #[error("CapacityNormalizer was given no samples")]
    NoSamples,
}

impl CapacityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSamples => ErrorKind::InsufficientData,
            _ => ErrorKind::SchemaMismatch,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SummaryError {
    #[error("CycleSummary was given no samples")]
    NoSamples,
    #[error("CycleSummary was given a non-positive {name} normalization factor {value}")]
    BadFactor { name: &'static str, value: f64 },
}

impl SummaryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSamples => ErrorKind::InsufficientData,
            Self::BadFactor { .. } => ErrorKind::InvalidParameter,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum DqdvError {
    #[error("dQ/dV {stage} window size {window} must be odd")]
    EvenWindow { stage: &'static str, window: usize },
    #[error("dQ/dV {stage} window size {window} exceeds the {len} points it filters")]
    WindowTooLarge {
        stage: &'static str,
        window: usize,
        len: usize,
    },
    #[error("dQ/dV {stage} polynomial order {order} must be less than the window size {window}")]
    OrderTooLarge {
        stage: &'static str,
        order: usize,
        window: usize,
    },
    #[error("dQ/dV spline order {0} is outside the supported range 1..=5")]
    BadSplineOrder(usize),
    #[error("dQ/dV spline smoothing factor {0} must be finite and non-negative")]
    BadSmoothing(f64),
    #[error("dQ/dV grid size {grid} must be at least 2 and greater than the spline order {order}")]
    BadGridSize { grid: usize, order: usize },
    #[error("dQ/dV was given {capacity} capacity values and {voltage} voltage values")]
    LengthMismatch { capacity: usize, voltage: usize },
    #[error("dQ/dV requires at least 2 distinct voltages; found {0}")]
    TooFewVoltages(usize),
    #[error("dQ/dV {stage} least-squares system is singular")]
    Singular { stage: &'static str },
}

impl DqdvError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TooFewVoltages(_) | Self::Singular { .. } => ErrorKind::InsufficientData,
            _ => ErrorKind::InvalidParameter,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config requested {0} threads; at least 1 is required")]
    BadThreadCount(i32),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Writer failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Writer failed to write delimited text: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Adapter error: {0}")]
    AdapterError(#[from] AdapterError),
    #[error("Processor failed due to StateSegmenter error: {0}")]
    StateError(#[from] StateError),
    #[error("Processor failed due to CapacityNormalizer error: {0}")]
    CapacityError(#[from] CapacityError),
    #[error("Processor failed due to CycleSummary error: {0}")]
    SummaryError(#[from] SummaryError),
    #[error("Processor failed due to dQ/dV error in half cycle {half_cycle}: {source}")]
    DqdvError { half_cycle: u32, source: DqdvError },
    #[error("Processor failed due to RawTable error: {0}")]
    TableError(#[from] TableError),
    #[error("Processor failed due to Writer error: {0}")]
    WriterError(#[from] WriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed to build its thread pool: {0}")]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProcessorError {
    /// The taxonomy kind of the underlying failure, if it has one (IO and thread errors do not)
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::AdapterError(e) => e.kind(),
            Self::StateError(e) => Some(e.kind()),
            Self::CapacityError(e) => Some(e.kind()),
            Self::SummaryError(e) => Some(e.kind()),
            Self::DqdvError { source, .. } => Some(source.kind()),
            Self::TableError(e) => e.kind(),
            _ => None,
        }
    }
}
