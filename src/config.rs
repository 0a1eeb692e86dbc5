//! Run configuration, read from TOML and overridden from the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::model::ReconMethod;
use crate::recon::ReconSettings;
use crate::recon::pca::ComponentSelection;
use crate::render::FigureSize;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data: DataConfig,
    pub reconstruction: ReconstructionConfig,
    /// Metadata column → accepted values.
    pub filter: BTreeMap<String, Vec<String>>,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Proxy network file; takes precedence over `dataset`.
    pub network: Option<PathBuf>,
    /// Named archive fetched into the data home, e.g. `mann2008-infilled`.
    pub dataset: Option<String>,
    /// Instrumental temperature CSV used for calibration.
    pub target: Option<PathBuf>,
    /// Published reconstruction to compare against.
    pub reference: Option<PathBuf>,
    pub data_home: Option<PathBuf>,
    pub download_if_missing: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            network: None,
            dataset: None,
            target: None,
            reference: None,
            data_home: None,
            download_if_missing: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub method: ReconMethod,
    pub calibration: [i32; 2],
    pub validation: Option<[i32; 2]>,
    /// Principal components kept per nest, unless `variance_fraction` is set.
    pub components: usize,
    pub variance_fraction: Option<f64>,
    pub nest_step: i32,
    /// Minimum |r| with the target over calibration for a record to be used.
    pub screening: Option<f64>,
    pub uncertainty_sigmas: f64,
    /// Largest accepted |ours − reference| in any common year.
    pub reference_tolerance: f64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        let settings = ReconSettings::default();
        Self {
            method: settings.method,
            calibration: [settings.calibration.0, settings.calibration.1],
            validation: settings.validation.map(|(s, e)| [s, e]),
            components: 3,
            variance_fraction: None,
            nest_step: settings.nest_step,
            screening: None,
            uncertainty_sigmas: settings.uncertainty_sigmas,
            reference_tolerance: 1e-6,
        }
    }
}

impl ReconstructionConfig {
    pub fn settings(&self) -> ReconSettings {
        let components = match self.variance_fraction {
            Some(f) => ComponentSelection::VarianceFraction(f),
            None => ComponentSelection::Fixed(self.components),
        };
        ReconSettings {
            method: self.method,
            calibration: (self.calibration[0], self.calibration[1]),
            validation: self.validation.map(|[s, e]| (s, e)),
            components,
            nest_step: self.nest_step,
            uncertainty_sigmas: self.uncertainty_sigmas,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Running-mean window of the smoothed curve, in years.
    pub smoothing: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let size = FigureSize::default();
        Self {
            dir: PathBuf::from("output"),
            smoothing: 21,
            width: size.width,
            height: size.height,
        }
    }
}

impl OutputConfig {
    pub fn figure_size(&self) -> FigureSize {
        FigureSize {
            width: self.width,
            height: self.height,
        }
    }
}

impl RunConfig {
    /// Read a TOML file; absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        let config: RunConfig = toml::from_str(&text)
            .with_context(|| format!("Invalid config '{}'", path.display()))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// `load` when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}
