use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::adapter::{AdapterOptions, CapacityUnit, Format};
use super::dqdv::DqdvParams;
use super::error::{AdapterError, ConfigError};
use super::summary::SummaryOptions;

/// Structure representing the application configuration. Contains pathing and processing
/// information. Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Force an input format instead of detecting it from the file
    pub format: Option<Format>,
    /// Unit the instrument actually wrote its capacity in (mAh or Ah). Only Neware files use it
    pub capacity_unit: String,
    pub mass: Option<f64>,
    pub area: Option<f64>,
    pub dqdv: DqdvParams,
    /// Half cycles to compute dQ/dV curves for. Empty means every active half cycle
    pub dqdv_half_cycles: Vec<u32>,
    pub n_threads: i32,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            format: None,
            capacity_unit: String::from("mAh"),
            mass: None,
            area: None,
            dqdv: DqdvParams::default(),
            dqdv_half_cycles: vec![],
            n_threads: 1,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// The lowercase extension of the input file, empty if there is none
    pub fn input_extension(&self) -> String {
        self.input_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Stem used to name every output file
    pub fn output_stem(&self) -> String {
        self.input_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| String::from("cellcycle"))
    }

    pub fn get_canonical_file_name(&self) -> PathBuf {
        self.output_path
            .join(format!("{}_canonical.csv", self.output_stem()))
    }

    pub fn get_summary_file_name(&self) -> PathBuf {
        self.output_path
            .join(format!("{}_summary.yml", self.output_stem()))
    }

    /// Directory holding one dQ/dV curve file per half cycle
    pub fn get_dqdv_directory(&self) -> PathBuf {
        self.output_path.join(format!("{}_dqdv", self.output_stem()))
    }

    pub fn adapter_options(&self) -> Result<AdapterOptions, AdapterError> {
        Ok(AdapterOptions {
            capacity_unit: CapacityUnit::from_str(&self.capacity_unit)?,
        })
    }

    pub fn summary_options(&self) -> SummaryOptions {
        SummaryOptions {
            mass: self.mass,
            area: self.area,
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}
