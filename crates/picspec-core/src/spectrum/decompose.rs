//! Two-pass thermal / non-thermal decomposition.

use serde::Serialize;

use super::thermal::{fit_thermal_core_with, ThermalFitOptions};
use super::{check_lengths, FitError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    /// Maxwellian fitted to the full spectrum.
    pub thermal: Vec<f64>,
    /// `flux - thermal`
    pub nonthermal: Vec<f64>,
    /// Maxwellian fitted to `nonthermal`.
    pub secondary_thermal: Vec<f64>,
    /// `nonthermal - secondary_thermal`
    pub secondary_nonthermal: Vec<f64>,
}

pub fn decompose(energy: &[f64], flux: &[f64]) -> Result<Decomposition, FitError> {
    decompose_with(energy, flux, &ThermalFitOptions::default())
}

/// Fit, subtract, and repeat exactly once on the remainder.
pub fn decompose_with(
    energy: &[f64],
    flux: &[f64],
    options: &ThermalFitOptions,
) -> Result<Decomposition, FitError> {
    check_lengths(energy, flux)?;
    let thermal = fit_thermal_core_with(energy, flux, options)?.flux;
    let nonthermal = subtract(flux, &thermal);
    let secondary_thermal = fit_thermal_core_with(energy, &nonthermal, options)?.flux;
    let secondary_nonthermal = subtract(&nonthermal, &secondary_thermal);

    Ok(Decomposition {
        thermal,
        nonthermal,
        secondary_thermal,
        secondary_nonthermal,
    })
}

fn subtract(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}
