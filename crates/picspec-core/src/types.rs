//! Core types shared across the analysis pipeline.
//!
//! The [`SimulationDescriptor`] is produced by whoever loads the run
//! metadata (the CLI reads it from a TOML job file) and is never mutated
//! here.

use picspec_io::Species;
use serde::{Deserialize, Serialize};

/// Read-only description of a simulation run.
///
/// Lengths are in ion inertial lengths (di) unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationDescriptor {
    /// Global grid size (cells).
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// MPI domain decomposition.
    pub topology_x: usize,
    pub topology_y: usize,
    pub topology_z: usize,
    pub lx_di: f64,
    pub ly_di: f64,
    pub lz_di: f64,
    pub dx_di: f64,
    pub dy_di: f64,
    pub dz_di: f64,
    /// Ion to electron mass ratio.
    pub mime: f64,
    /// Electron thermal speed (units of c).
    pub vthe: f64,
    /// Ion thermal speed (units of c).
    pub vthi: f64,
    /// Particles per cell per species.
    pub nppc: usize,
    /// Number of particle output frames.
    #[serde(default)]
    pub ntp: usize,
    /// Time between particle outputs (1/wpe).
    #[serde(default)]
    pub dt_particles: f64,
    /// Steps between particle outputs.
    #[serde(default)]
    pub particle_interval: u64,
}

impl SimulationDescriptor {
    /// `sqrt(mime)`, the di / de length ratio.
    pub fn smime(&self) -> f64 {
        self.mime.sqrt()
    }

    /// Thermal speed of `species`.
    pub fn vth(&self, species: Species) -> f64 {
        match species {
            Species::Electron => self.vthe,
            Species::Ion => self.vthi,
        }
    }

    /// Number of particles of one species in the initial load.
    pub fn particles_per_species(&self) -> f64 {
        (self.nx * self.ny * self.nz * self.nppc) as f64
    }

    /// Total number of MPI ranks.
    pub fn num_ranks(&self) -> usize {
        self.topology_x * self.topology_y * self.topology_z
    }

    /// Rank id of the domain at `(ix, iy, iz)`.
    pub fn rank_id(&self, ix: usize, iy: usize, iz: usize) -> usize {
        ix + iy * self.topology_x + iz * self.topology_x * self.topology_y
    }

    /// Step index of particle frame `frame`.
    pub fn particle_step(&self, frame: u64) -> u64 {
        frame * self.particle_interval
    }
}

/// Axis-aligned box given by `[lower, upper]` bounds on x, y and z.
///
/// Bounds are inclusive on both ends. The unit (di or de) is whatever the
/// caller works in; [`Corners::scaled`] converts between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corners {
    pub bounds: [[f64; 2]; 3],
}

impl Corners {
    pub fn new(bounds: [[f64; 2]; 3]) -> Self {
        Self { bounds }
    }

    /// A box that accepts every finite position.
    pub fn unbounded() -> Self {
        Self {
            bounds: [[f64::NEG_INFINITY, f64::INFINITY]; 3],
        }
    }

    pub fn contains(&self, pos: [f64; 3]) -> bool {
        self.bounds
            .iter()
            .zip(pos)
            .all(|(b, p)| b[0] <= p && p <= b[1])
    }

    /// Multiply every bound by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            bounds: self.bounds.map(|[lo, hi]| [lo * factor, hi * factor]),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn descriptor() -> SimulationDescriptor {
        SimulationDescriptor {
            nx: 64,
            ny: 1,
            nz: 32,
            topology_x: 4,
            topology_y: 1,
            topology_z: 2,
            lx_di: 100.0,
            ly_di: 1.0,
            lz_di: 50.0,
            dx_di: 100.0 / 64.0,
            dy_di: 1.0,
            dz_di: 50.0 / 32.0,
            mime: 25.0,
            vthe: 0.1,
            vthi: 0.02,
            nppc: 100,
            ntp: 10,
            dt_particles: 2.5,
            particle_interval: 100,
        }
    }

    #[test]
    fn test_descriptor_helpers() {
        let d = descriptor();
        assert_eq!(d.smime(), 5.0);
        assert_eq!(d.num_ranks(), 8);
        assert_eq!(d.rank_id(3, 0, 1), 7);
        assert_eq!(d.particles_per_species(), (64 * 32 * 100) as f64);
        assert_eq!(d.vth(Species::Ion), 0.02);
        assert_eq!(d.particle_step(3), 300);
    }

    #[test]
    fn test_descriptor_from_toml_defaults() {
        let text = r#"
            nx = 8
            ny = 8
            nz = 8
            topology_x = 2
            topology_y = 2
            topology_z = 2
            lx_di = 10.0
            ly_di = 10.0
            lz_di = 10.0
            dx_di = 1.25
            dy_di = 1.25
            dz_di = 1.25
            mime = 100.0
            vthe = 0.1
            vthi = 0.01
            nppc = 50
        "#;
        let d: SimulationDescriptor = toml::from_str(text).unwrap();
        assert_eq!(d.ntp, 0);
        assert_eq!(d.particle_interval, 0);
        assert_eq!(d.mime, 100.0);
    }

    #[test]
    fn test_corners_inclusive() {
        let c = Corners::new([[0.0, 1.0], [-1.0, 1.0], [2.0, 3.0]]);
        assert!(c.contains([0.0, 1.0, 3.0]));
        assert!(!c.contains([1.0001, 0.0, 2.5]));
        let s = c.scaled(2.0);
        assert_eq!(s.bounds[2], [4.0, 6.0]);
        assert!(Corners::unbounded().contains([1e9, -1e9, 0.0]));
    }
}
