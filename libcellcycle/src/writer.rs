use std::path::PathBuf;

use super::config::Config;
use super::dqdv::HalfCycleCurve;
use super::error::WriterError;
use super::sample::{
    Sample, CAPACITY_COLUMN, CURRENT_COLUMN, FULL_CYCLE_COLUMN, HALF_CYCLE_COLUMN, INDEX_COLUMN,
    STATE_COLUMN, TIME_COLUMN, VOLTAGE_COLUMN,
};
use super::summary::{CycleSummary, SummaryOptions};

const SPECIFIC_CAPACITY_COLUMN: &str = "Specific Capacity";
const AREAL_CAPACITY_COLUMN: &str = "Specific Capacity (Area)";
const SPECIFIC_CURRENT_COLUMN: &str = "Specific Current";
const CURRENT_DENSITY_COLUMN: &str = "Current Density";
const DQDV_HEADER: [&str; 3] = ["Voltage", "dQ/dV", "Capacity"];

/// Writes the products of a processed recording as delimited text and YAML.
///
/// Layout, under the configured output directory:
/// - `<stem>_canonical.csv`: the annotated sample table
/// - `<stem>_summary.yml`: one entry per full cycle
/// - `<stem>_dqdv/half_cycle_<n>.csv`: one dQ/dV curve per half cycle
#[derive(Debug)]
pub struct OutputWriter {
    canonical_path: PathBuf,
    summary_path: PathBuf,
    dqdv_directory: PathBuf,
    options: SummaryOptions,
}

impl OutputWriter {
    /// Create the writer, making the output directory if needed
    pub fn new(config: &Config) -> Result<Self, WriterError> {
        std::fs::create_dir_all(&config.output_path)?;
        Ok(Self {
            canonical_path: config.get_canonical_file_name(),
            summary_path: config.get_summary_file_name(),
            dqdv_directory: config.get_dqdv_directory(),
            options: config.summary_options(),
        })
    }

    /// Write the canonical table. Specific columns are added when mass or area is configured,
    /// and the Time column is left out when no sample recorded a time.
    pub fn write_canonical(&self, samples: &[Sample]) -> Result<(), WriterError> {
        let with_time = samples.iter().any(|s| s.time.is_some());
        let mut writer = csv::Writer::from_path(&self.canonical_path)?;

        let mut header = vec![INDEX_COLUMN];
        if with_time {
            header.push(TIME_COLUMN);
        }
        header.extend([
            STATE_COLUMN,
            HALF_CYCLE_COLUMN,
            FULL_CYCLE_COLUMN,
            CAPACITY_COLUMN,
            VOLTAGE_COLUMN,
            CURRENT_COLUMN,
        ]);
        if self.options.mass.is_some() {
            header.extend([SPECIFIC_CAPACITY_COLUMN, SPECIFIC_CURRENT_COLUMN]);
        }
        if self.options.area.is_some() {
            header.extend([AREAL_CAPACITY_COLUMN, CURRENT_DENSITY_COLUMN]);
        }
        writer.write_record(&header)?;

        for sample in samples {
            let mut record = vec![sample.index.to_string()];
            if with_time {
                record.push(optional_cell(sample.time));
            }
            record.extend([
                sample.state.label().to_string(),
                sample.half_cycle.to_string(),
                sample.full_cycle.to_string(),
                sample.capacity.to_string(),
                sample.voltage.to_string(),
                optional_cell(sample.current),
            ]);
            for factor in [self.options.mass, self.options.area].into_iter().flatten() {
                record.push((sample.capacity / factor).to_string());
                record.push(optional_cell(sample.current.map(|c| c / factor)));
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        log::info!(
            "Wrote {} samples to {}",
            samples.len(),
            self.canonical_path.display()
        );
        Ok(())
    }

    pub fn write_summary(&self, summary: &[CycleSummary]) -> Result<(), WriterError> {
        let yaml = serde_yaml::to_string(summary)?;
        std::fs::write(&self.summary_path, yaml)?;
        log::info!(
            "Wrote {} cycle summaries to {}",
            summary.len(),
            self.summary_path.display()
        );
        Ok(())
    }

    /// Write each curve to its own file. Returns the paths written.
    pub fn write_dqdv(&self, curves: &[HalfCycleCurve]) -> Result<Vec<PathBuf>, WriterError> {
        if curves.is_empty() {
            return Ok(vec![]);
        }
        std::fs::create_dir_all(&self.dqdv_directory)?;
        let mut paths = Vec::with_capacity(curves.len());
        for entry in curves {
            let path = self
                .dqdv_directory
                .join(format!("half_cycle_{}.csv", entry.half_cycle));
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(DQDV_HEADER)?;
            let curve = &entry.curve;
            for ((v, d), q) in curve
                .voltage
                .iter()
                .zip(curve.dqdv.iter())
                .zip(curve.capacity.iter())
            {
                writer.write_record([v.to_string(), d.to_string(), q.to_string()])?;
            }
            writer.flush()?;
            paths.push(path);
        }
        log::info!(
            "Wrote {} dQ/dV curves to {}",
            curves.len(),
            self.dqdv_directory.display()
        );
        Ok(paths)
    }
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
