//! TOML configuration deserialisation for analysis jobs.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use picspec_core::spectrum::ThermalFitOptions;
use picspec_core::types::SimulationDescriptor;
use picspec_io::Species;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub simulation: SimulationDescriptor,
    #[serde(default)]
    pub data: DataConfig,
    pub velocity: Option<VelocityConfig>,
    pub spectrum: Option<SpectrumConfig>,
    pub tool: Option<ToolConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where the run's output lives.
#[derive(Debug, Deserialize)]
pub struct DataConfig {
    /// Run directory containing `particle/` (default: ".").
    #[serde(default = "default_data_dir")]
    pub directory: String,
    /// Directory of `spectrum-<species>.<frame>` tables (default: "<directory>/spectrum").
    pub spectrum_dir: Option<String>,
    /// Directory of precomputed distributions (default: "<directory>/vdistributions").
    pub vdist_dir: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            directory: default_data_dir(),
            spectrum_dir: None,
            vdist_dir: None,
        }
    }
}

impl DataConfig {
    pub fn base(&self) -> PathBuf {
        PathBuf::from(&self.directory)
    }

    pub fn spectrum_path(&self) -> PathBuf {
        self.spectrum_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.base().join("spectrum"))
    }

    pub fn vdist_path(&self) -> PathBuf {
        self.vdist_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.base().join("vdistributions"))
    }
}

fn default_data_dir() -> String {
    ".".into()
}

/// Velocity histograms of a box, binned from the raw particle dumps.
#[derive(Debug, Deserialize)]
pub struct VelocityConfig {
    /// Box centre in di.
    pub center_di: [f64; 3],
    /// Box size in grid cells.
    pub sizes_cells: [f64; 3],
    /// Particle output frame; the step is `frame * particle_interval`.
    pub frame: u64,
    /// Species prefix of the dump files (default: "e").
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Bins per velocity axis (default: 64).
    #[serde(default = "default_nbins")]
    pub nbins: usize,
    /// Compute backend: "serial" or "cpu". Default: "cpu".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Worker threads for the CPU backend (default: rayon's global pool).
    pub threads: Option<usize>,
}

fn default_prefix() -> String {
    "e".into()
}
fn default_nbins() -> usize {
    64
}
fn default_backend() -> String {
    "cpu".into()
}

/// One energy spectrum and the fits applied to it.
#[derive(Debug, Deserialize)]
pub struct SpectrumConfig {
    /// `"e"`/`"electron"` or `"h"`/`"ion"`.
    #[serde(deserialize_with = "deserialize_species")]
    pub species: Species,
    pub frame: u32,
    /// Fit a power law to the non-thermal remainder.
    pub power_law: Option<PowerLawWindow>,
    #[serde(default)]
    pub thermal: ThermalFitOptions,
    /// Also scale the initial Maxwellian to the spectrum (default: false).
    #[serde(default)]
    pub background: bool,
}

/// Power-law window relative to the spectrum peak.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PowerLawWindow {
    pub offset: usize,
    pub extent: usize,
}

/// Inputs of the external spectrum/distribution tool. The box comes from
/// `[velocity]`.
#[derive(Debug, Deserialize)]
pub struct ToolConfig {
    pub nbins: usize,
    pub vmin: f64,
    pub vmax: f64,
    pub tframe: u32,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to also save results as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}

/// Accepts file-name tags as well as the full species names.
pub fn parse_species(s: &str) -> anyhow::Result<Species> {
    match s.to_ascii_lowercase().as_str() {
        "electron" => Ok(Species::Electron),
        "ion" => Ok(Species::Ion),
        tag => Species::from_tag(tag).with_context(|| {
            format!("Unknown species '{}'. Valid values: e, h, electron, ion", s)
        }),
    }
}

fn deserialize_species<'de, D>(deserializer: D) -> Result<Species, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_species(&s).map_err(serde::de::Error::custom)
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read job file {}", path.display()))?;
    let config: JobConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid job file {}", path.display()))?;
    Ok(config)
}
