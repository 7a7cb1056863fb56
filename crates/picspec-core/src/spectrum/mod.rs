//! Energy spectrum analysis.
//!
//! The pipeline for one spectrum is:
//!
//! 1. [`accumulate`] the cumulative particle number and energy,
//! 2. fit the thermal core with a Maxwellian ([`fit_thermal_core`]),
//! 3. subtract it and fit the remainder with a power law
//!    ([`fit_power_law`] / [`fit_nonthermal_power_law`]).
//!
//! [`decompose`] runs two thermal passes to separate a secondary thermal
//! population. All functions are pure and return plain data.
//!
//! The Maxwellian in energy is $f(E) = A \sqrt{E} e^{-B E}$, whose peak sits
//! at $E = 1 / (2B)$.

pub mod accumulate;
pub mod budget;
pub mod decompose;
pub mod normalization;
pub mod power_law;
pub mod thermal;

pub use accumulate::{accumulate, Accumulated};
pub use budget::{nonthermal_fraction, thermal_budget, NonthermalFraction, ThermalBudget};
pub use decompose::{decompose, decompose_with, Decomposition};
pub use normalization::{
    initial_maxwellian, maximum_energy, normalized_energy, thermal_energy, SpectrumNormalization,
};
pub use power_law::{fit_nonthermal_power_law, fit_power_law, PowerLawFit};
pub use thermal::{
    background_thermal_core, fit_thermal_core, fit_thermal_core_with, lower_thermal_core,
    maxwellian, ThermalFit, ThermalFitOptions,
};

use thiserror::Error;

/// Errors from the spectrum fits.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    /// The nonlinear fit did not produce usable parameters. Callers may fall
    /// back to [`ThermalFit::zero`].
    #[error("Fit did not converge: {0}")]
    Convergence(String),

    /// The requested window cannot be fitted. Never adjusted automatically.
    #[error("Invalid fit window [{start}, {end}) for {len} bins: {reason}")]
    InvalidWindow {
        start: usize,
        end: usize,
        len: usize,
        reason: String,
    },

    /// Energy and flux arrays of different lengths.
    #[error("Energy has {energy} bins but flux has {flux}")]
    LengthMismatch { energy: usize, flux: usize },
}

impl FitError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FitError::Convergence(_))
    }
}

pub(crate) fn check_lengths(energy: &[f64], flux: &[f64]) -> Result<(), FitError> {
    if energy.len() != flux.len() {
        return Err(FitError::LengthMismatch {
            energy: energy.len(),
            flux: flux.len(),
        });
    }
    Ok(())
}

/// Panicking form of [`check_lengths`] for the infallible summaries.
pub(crate) fn assert_lengths(energy: &[f64], flux: &[f64]) {
    assert_eq!(
        energy.len(),
        flux.len(),
        "energy and flux must have the same length"
    );
}
