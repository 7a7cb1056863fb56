//! Spatial selection and velocity-space binning of particles.
//!
//! Particles are located from their cell index and in-cell offset, filtered
//! by a box, and histogrammed in three 2D velocity projections over
//! `[-1, 1] × [-1, 1]`. Many particle files (one per MPI rank) can be reduced
//! into a single set of histograms through a compute backend.

pub mod aggregate;
pub mod histogram;
pub mod region;

pub use aggregate::{aggregate_velocity_histograms, ParticleSource};
pub use histogram::{bin_index, particle_position, velocity_histograms};
pub use region::{select_region, RankBlock, RegionSelection};

use ndarray::{Array1, Array2, Array3, Axis};
use picspec_compute::ComputeError;
use picspec_io::DecodeError;
use serde::Serialize;
use thiserror::Error;

/// Velocity range covered by the histograms on every axis.
pub const VELOCITY_RANGE: [f64; 2] = [-1.0, 1.0];

/// Errors from binning and aggregation.
#[derive(Debug, Error)]
pub enum BinningError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Compute backend error: {0}")]
    Compute(#[from] ComputeError),

    #[error("Invalid binning: {0}")]
    InvalidBins(String),

    #[error("Invalid local grid {nx}x{ny}x{nz} on rank {rank}")]
    InvalidGrid { rank: i32, nx: i32, ny: i32, nz: i32 },
}

/// The three 2D velocity projections of a particle set.
///
/// Rows hold the second component of each projection and columns the
/// first: `xy` is `(uy, ux)`, `xz` is `(uz, ux)`, `yz` is `(uz, uy)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityHistograms {
    pub xy: Array2<f64>,
    pub xz: Array2<f64>,
    pub yz: Array2<f64>,
    /// Bin edges along rows (`nbins + 1`).
    pub row_edges: Array1<f64>,
    /// Bin edges along columns (`nbins + 1`).
    pub col_edges: Array1<f64>,
}

impl VelocityHistograms {
    pub fn zeros(nbins: usize) -> Self {
        let edges = bin_edges(nbins);
        Self {
            xy: Array2::zeros((nbins, nbins)),
            xz: Array2::zeros((nbins, nbins)),
            yz: Array2::zeros((nbins, nbins)),
            row_edges: edges.clone(),
            col_edges: edges,
        }
    }

    pub fn nbins(&self) -> usize {
        self.xy.nrows()
    }

    /// Number of particles counted in the `xy` projection.
    pub fn total(&self) -> f64 {
        self.xy.sum()
    }

    /// Stack as `(3, nbins, nbins)` in the order `xy`, `xz`, `yz`.
    pub fn to_stacked(&self) -> Array3<f64> {
        let n = self.nbins();
        let mut out = Array3::zeros((3, n, n));
        out.index_axis_mut(Axis(0), 0).assign(&self.xy);
        out.index_axis_mut(Axis(0), 1).assign(&self.xz);
        out.index_axis_mut(Axis(0), 2).assign(&self.yz);
        out
    }

    /// Inverse of [`to_stacked`](Self::to_stacked).
    pub fn from_stacked(stacked: &Array3<f64>) -> Result<Self, BinningError> {
        let (planes, rows, cols) = stacked.dim();
        if planes != 3 || rows != cols {
            return Err(BinningError::InvalidBins(format!(
                "expected a (3, n, n) stack, got {:?}",
                stacked.dim()
            )));
        }
        let mut hist = Self::zeros(rows);
        hist.xy.assign(&stacked.index_axis(Axis(0), 0));
        hist.xz.assign(&stacked.index_axis(Axis(0), 1));
        hist.yz.assign(&stacked.index_axis(Axis(0), 2));
        Ok(hist)
    }
}

/// `nbins + 1` evenly spaced edges over [`VELOCITY_RANGE`].
pub fn bin_edges(nbins: usize) -> Array1<f64> {
    Array1::linspace(VELOCITY_RANGE[0], VELOCITY_RANGE[1], nbins + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_roundtrip() {
        let mut h = VelocityHistograms::zeros(4);
        h.xy[[0, 1]] = 1.0;
        h.xz[[2, 3]] = 2.0;
        h.yz[[3, 3]] = 3.0;
        let stacked = h.to_stacked();
        assert_eq!(stacked.dim(), (3, 4, 4));
        assert_eq!(stacked[[1, 2, 3]], 2.0);
        assert_eq!(VelocityHistograms::from_stacked(&stacked).unwrap(), h);
    }

    #[test]
    fn test_from_bad_stack() {
        let err = VelocityHistograms::from_stacked(&Array3::zeros((2, 4, 4))).unwrap_err();
        assert!(matches!(err, BinningError::InvalidBins(_)));
    }

    #[test]
    fn test_edges() {
        let e = bin_edges(4);
        assert_eq!(e.to_vec(), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
    }
}
