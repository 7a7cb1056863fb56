//! Power-law fits of the high-energy tail.

use serde::Serialize;

use super::accumulate::accumulate;
use super::{check_lengths, FitError};
use crate::fitting::{argmax, fit_line};

/// `f = 10^intercept * E^slope` fitted on `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerLawFit {
    /// Fitted power law over every energy bin.
    pub flux: Vec<f64>,
    pub start: usize,
    pub end: usize,
    /// Spectral index.
    pub slope: f64,
    /// `log10` of the normalisation.
    pub intercept: f64,
    /// Share of the spectrum's particles carried by the fitted window.
    pub number_fraction: f64,
    /// Share of the spectrum's kinetic energy carried by the fitted window.
    pub energy_fraction: f64,
}

/// Fit a power law on `[argmax + offset, argmax + offset + extent)`.
///
/// The fit is a straight line in `log10 E` / `log10 f`. The window is never
/// moved to make the fit possible: running past the end of the spectrum,
/// containing fewer than two bins or any non-positive value is an
/// [`FitError::InvalidWindow`].
pub fn fit_power_law(
    energy: &[f64],
    flux: &[f64],
    offset: usize,
    extent: usize,
) -> Result<PowerLawFit, FitError> {
    check_lengths(energy, flux)?;
    let n = flux.len();
    let peak = argmax(flux).ok_or_else(|| FitError::InvalidWindow {
        start: 0,
        end: 0,
        len: n,
        reason: "no finite peak".into(),
    })?;
    let start = peak.saturating_add(offset);
    let Some(end) = peak
        .checked_add(offset)
        .and_then(|s| s.checked_add(extent))
    else {
        return Err(FitError::InvalidWindow {
            start,
            end: usize::MAX,
            len: n,
            reason: "window runs past the end of the spectrum".into(),
        });
    };
    let invalid = |reason: String| FitError::InvalidWindow {
        start,
        end,
        len: n,
        reason,
    };

    if end > n {
        return Err(invalid("window runs past the end of the spectrum".into()));
    }
    if extent < 2 {
        return Err(invalid(format!("need at least 2 bins, got {}", extent)));
    }
    if let Some(i) = (start..end).find(|&i| !(energy[i] > 0.0 && flux[i] > 0.0)) {
        return Err(invalid(format!(
            "non-positive value at bin {} (E = {}, f = {})",
            i, energy[i], flux[i]
        )));
    }

    let log_e: Vec<f64> = energy[start..end].iter().map(|e| e.log10()).collect();
    let log_f: Vec<f64> = flux[start..end].iter().map(|f| f.log10()).collect();
    let line = fit_line(&log_e, &log_f)
        .ok_or_else(|| invalid("energies in the window are not distinct".into()))?;

    let fitted: Vec<f64> = energy
        .iter()
        .map(|e| 10f64.powf(line.eval(e.log10())))
        .collect();

    let window = accumulate(&energy[start..end], &fitted[start..end]);
    let whole = accumulate(energy, flux);
    let fit = PowerLawFit {
        flux: fitted,
        start,
        end,
        slope: line.slope,
        intercept: line.intercept,
        number_fraction: window.total_count() / whole.total_count(),
        energy_fraction: window.total_energy() / whole.total_energy(),
    };

    log::info!(
        "Power law on [{}, {}) (E = {:.4e} .. {:.4e}): index {:.4}, number fraction {:.4}, energy fraction {:.4}",
        start,
        end,
        energy[start],
        energy[end - 1],
        fit.slope,
        fit.number_fraction,
        fit.energy_fraction
    );
    Ok(fit)
}

/// Power-law fit of `flux - thermal`, with the window placed relative to the
/// peak of the non-thermal remainder.
pub fn fit_nonthermal_power_law(
    energy: &[f64],
    flux: &[f64],
    thermal: &[f64],
    offset: usize,
    extent: usize,
) -> Result<PowerLawFit, FitError> {
    check_lengths(energy, flux)?;
    check_lengths(energy, thermal)?;
    let nonthermal: Vec<f64> = flux.iter().zip(thermal).map(|(f, t)| f - t).collect();
    fit_power_law(energy, &nonthermal, offset, extent)
}
