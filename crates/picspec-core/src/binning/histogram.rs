//! Velocity histograms for the particles of a single file.

use picspec_io::formats::particle::{ParticleFileHeader, ParticleRecord, V0Header};

use super::{BinningError, VelocityHistograms, VELOCITY_RANGE};
use crate::types::{Corners, SimulationDescriptor};

/// Position of a particle in de.
///
/// The cell index is flattened over the grid padded with one ghost cell on
/// each side, so the local grid is `(nx + 2, ny + 2, nz + 2)` and interior
/// cells start at index 1. `dxyz` is the offset inside the cell in `[-1, 1]`.
///
/// # Panics
///
/// If `nx` or `ny` is `-2`. [`velocity_histograms`] and the particle file
/// decoder reject non-positive grid dimensions first.
pub fn particle_position(v0: &V0Header, particle: &ParticleRecord, smime: f64) -> [f64; 3] {
    let nx = v0.nx as i64 + 2;
    let ny = v0.ny as i64 + 2;
    let icell = particle.icell as i64;

    let iz = icell / (nx * ny);
    let iy = (icell - iz * nx * ny) / nx;
    let ix = icell - iz * nx * ny - iy * nx;

    let origin = [v0.x0, v0.y0, v0.z0];
    let delta = [v0.dx, v0.dy, v0.dz];
    let index = [ix, iy, iz];

    let mut pos = [0.0; 3];
    for a in 0..3 {
        let offset = (index[a] as f64 - 1.0) + (particle.dxyz[a] as f64 + 1.0) * 0.5;
        pos[a] = (origin[a] as f64 + offset * delta[a] as f64) / smime;
    }
    pos
}

/// Bin of `value` among `nbins` equal bins over [`VELOCITY_RANGE`].
///
/// Bins are half-open except the last, which also takes the upper edge.
/// Values outside the range (and NaN) have no bin.
pub fn bin_index(value: f64, nbins: usize) -> Option<usize> {
    let [lo, hi] = VELOCITY_RANGE;
    if !(lo..=hi).contains(&value) || nbins == 0 {
        return None;
    }
    if value == hi {
        return Some(nbins - 1);
    }
    let idx = ((value - lo) / (hi - lo) * nbins as f64).floor() as usize;
    Some(idx.min(nbins - 1))
}

/// Histogram the velocities of the particles inside `corners`.
///
/// `corners` must be in the same unit as [`particle_position`], i.e. de.
pub fn velocity_histograms(
    header: &ParticleFileHeader,
    particles: &[ParticleRecord],
    descriptor: &SimulationDescriptor,
    corners: &Corners,
    nbins: usize,
) -> Result<VelocityHistograms, BinningError> {
    if nbins == 0 {
        return Err(BinningError::InvalidBins("nbins must be positive".into()));
    }
    let v0 = &header.v0;
    if v0.nx < 1 || v0.ny < 1 || v0.nz < 1 {
        return Err(BinningError::InvalidGrid {
            rank: v0.rank,
            nx: v0.nx,
            ny: v0.ny,
            nz: v0.nz,
        });
    }

    let smime = descriptor.smime();
    let mut hist = VelocityHistograms::zeros(nbins);
    let mut selected = 0usize;

    for particle in particles {
        let pos = particle_position(&header.v0, particle, smime);
        if !corners.contains(pos) {
            continue;
        }
        selected += 1;

        let [ux, uy, uz] = particle.u.map(|u| bin_index(u as f64, nbins));
        if let (Some(r), Some(c)) = (uy, ux) {
            hist.xy[[r, c]] += 1.0;
        }
        if let (Some(r), Some(c)) = (uz, ux) {
            hist.xz[[r, c]] += 1.0;
        }
        if let (Some(r), Some(c)) = (uz, uy) {
            hist.yz[[r, c]] += 1.0;
        }
    }

    log::debug!(
        "Rank {}: {} of {} particles inside the region",
        header.v0.rank,
        selected,
        particles.len()
    );
    Ok(hist)
}
