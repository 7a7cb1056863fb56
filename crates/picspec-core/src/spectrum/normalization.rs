//! Spectrum normalization and thermal reference energies.

use picspec_io::Species;
use serde::Serialize;

use super::accumulate::accumulate;
use super::assert_lengths;
use super::thermal::maxwellian;
use crate::types::SimulationDescriptor;

/// Factor a raw spectrum is divided by: the initial particle count of one
/// species, weighted by particle mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpectrumNormalization {
    pub species: Species,
    /// `nx * ny * nz * nppc`
    pub particles: f64,
    /// 1 for electrons, `mime` for ions.
    pub mass: f64,
}

impl SpectrumNormalization {
    pub fn new(descriptor: &SimulationDescriptor, species: Species) -> Self {
        Self {
            species,
            particles: descriptor.particles_per_species(),
            mass: species.mass(descriptor.mime),
        }
    }

    pub fn factor(&self) -> f64 {
        self.particles * self.mass
    }
}

/// Kinetic energy (units of `m c²`) of a particle at thermal speed `vth`:
/// `1 / sqrt(1 - 3 vth²) - 1`.
pub fn thermal_energy(vth: f64) -> f64 {
    1.0 / (1.0 - 3.0 * vth * vth).sqrt() - 1.0
}

/// Energy bins in units of the species' initial thermal energy.
pub fn normalized_energy(
    species: Species,
    energy: &[f64],
    descriptor: &SimulationDescriptor,
) -> Vec<f64> {
    let eth = thermal_energy(descriptor.vth(species));
    energy.iter().map(|e| e / eth).collect()
}

/// Initial Maxwellian `fnorm sqrt(E) exp(-1.5 E / eth)`, divided by its own
/// accumulated particle count so that it integrates to one.
pub fn initial_maxwellian(energy: &[f64], fnorm: f64, eth: f64) -> Vec<f64> {
    let f = maxwellian(energy, fnorm, 1.5 / eth);
    let total = accumulate(energy, &f).total_count();
    f.into_iter().map(|v| v / total).collect()
}

/// Energy of the highest bin with non-zero flux.
///
/// # Panics
///
/// If `energy` and `flux` differ in length.
pub fn maximum_energy(energy: &[f64], flux: &[f64]) -> Option<f64> {
    assert_lengths(energy, flux);
    flux.iter().rposition(|&f| f != 0.0).map(|i| energy[i])
}
