//! Summing velocity histograms over the particle files of a rank block.

use std::path::PathBuf;

use picspec_compute::{ComputeBackend, ComputeError, TaskError};
use picspec_io::formats::particle::{particle_file_path, read_particle_file};
use picspec_io::DecodeError;

use super::histogram::velocity_histograms;
use super::region::RankBlock;
use super::{BinningError, VelocityHistograms};
use crate::types::{Corners, SimulationDescriptor};

/// Where the per-rank particle files of one output step live.
#[derive(Debug, Clone)]
pub struct ParticleSource {
    /// Run directory containing `particle/`.
    pub base_dir: PathBuf,
    /// File prefix such as `e` or `h`.
    pub prefix: String,
    pub step: u64,
}

impl ParticleSource {
    pub fn new(base_dir: impl Into<PathBuf>, prefix: impl Into<String>, step: u64) -> Self {
        Self {
            base_dir: base_dir.into(),
            prefix: prefix.into(),
            step,
        }
    }

    pub fn path(&self, rank: usize) -> PathBuf {
        particle_file_path(&self.base_dir, &self.prefix, self.step, rank)
    }
}

/// Decode every file of `ranks` and sum their velocity histograms.
///
/// `corners` are in de. The result is independent of the order in which the
/// backend visits the files. A decode failure in any file aborts the whole
/// query.
pub fn aggregate_velocity_histograms(
    source: &ParticleSource,
    ranks: &RankBlock,
    descriptor: &SimulationDescriptor,
    corners: &Corners,
    nbins: usize,
    backend: &dyn ComputeBackend,
) -> Result<VelocityHistograms, BinningError> {
    if nbins == 0 {
        return Err(BinningError::InvalidBins("nbins must be positive".into()));
    }

    let rank_ids = ranks.ranks(descriptor);
    log::info!(
        "Aggregating {} particle files for step {} on {}",
        rank_ids.len(),
        source.step,
        backend.device_info().name
    );

    let task = |i: usize| -> Result<ndarray::Array3<f64>, TaskError> {
        let rank = rank_ids[i];
        let file = read_particle_file(&source.path(rank))?;
        let hist = velocity_histograms(&file.header, &file.particles, descriptor, corners, nbins)?;
        Ok(hist.to_stacked())
    };

    let stacked = backend
        .parallel_sum((3, nbins, nbins), rank_ids.len(), &task)
        .map_err(unwrap_task_error)?;
    let hist = VelocityHistograms::from_stacked(&stacked)?;

    log::info!("Binned {} particles", hist.total());
    Ok(hist)
}

/// Surface decode failures from a task as [`BinningError::Decode`].
fn unwrap_task_error(err: ComputeError) -> BinningError {
    match err {
        ComputeError::TaskFailed { task, source } => match source.downcast::<DecodeError>() {
            Ok(decode) => BinningError::Decode(*decode),
            Err(source) => match source.downcast::<BinningError>() {
                Ok(binning) => *binning,
                Err(source) => BinningError::Compute(ComputeError::TaskFailed { task, source }),
            },
        },
        other => BinningError::Compute(other),
    }
}
