//! Maxwellian fits of the thermal core of a spectrum.

use serde::Serialize;

use super::normalization::thermal_energy;
use super::{check_lengths, FitError};
use crate::fitting::{argmax, argmin, fit_two_parameter, moving_average, LmOptions};

/// `A * sqrt(E) * exp(-B * E)` over every energy bin.
pub fn maxwellian(energy: &[f64], amplitude: f64, inverse_temperature: f64) -> Vec<f64> {
    energy
        .iter()
        .map(|&e| amplitude * e.sqrt() * (-inverse_temperature * e).exp())
        .collect()
}

fn maxwellian_with_gradient(e: f64, p: [f64; 2]) -> (f64, [f64; 2]) {
    let shape = e.sqrt() * (-p[1] * e).exp();
    let value = p[0] * shape;
    (value, [shape, -e * value])
}

/// Controls for [`fit_thermal_core_with`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ThermalFitOptions {
    /// Width of the moving average used to locate the peak.
    pub smoothing: usize,
    /// Bins past the smoothed peak included in the fit window.
    pub peak_shift: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for ThermalFitOptions {
    fn default() -> Self {
        Self {
            smoothing: 3,
            peak_shift: 10,
            max_iterations: 200,
            tolerance: 1e-10,
        }
    }
}

impl ThermalFitOptions {
    fn lm(&self) -> LmOptions {
        LmOptions {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            ..Default::default()
        }
    }
}

/// Fitted Maxwellian evaluated over the whole spectrum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermalFit {
    pub flux: Vec<f64>,
    /// `A`
    pub amplitude: f64,
    /// `B`
    pub inverse_temperature: f64,
    /// Peak bin used to place the window.
    pub peak_index: usize,
    /// Exclusive end of the fit window.
    pub window_end: usize,
}

impl ThermalFit {
    /// An all-zero thermal component, for callers that continue after a
    /// recoverable fit failure.
    pub fn zero(n: usize) -> Self {
        Self {
            flux: vec![0.0; n],
            amplitude: 0.0,
            inverse_temperature: 0.0,
            peak_index: 0,
            window_end: 0,
        }
    }

    /// Energy at which the fitted Maxwellian peaks, `1 / (2B)`.
    pub fn peak_energy(&self) -> f64 {
        0.5 / self.inverse_temperature
    }
}

/// Fit the thermal core with the default options.
pub fn fit_thermal_core(energy: &[f64], flux: &[f64]) -> Result<ThermalFit, FitError> {
    fit_thermal_core_with(energy, flux, &ThermalFitOptions::default())
}

/// Fit `A sqrt(E) exp(-B E)` to the bins up to just past the spectrum peak.
///
/// The peak is the first maximum of the smoothed flux; the window is
/// `[0, min(peak + peak_shift, n))`.
pub fn fit_thermal_core_with(
    energy: &[f64],
    flux: &[f64],
    options: &ThermalFitOptions,
) -> Result<ThermalFit, FitError> {
    check_lengths(energy, flux)?;
    let smoothed = moving_average(flux, options.smoothing);
    let peak = argmax(&smoothed)
        .ok_or_else(|| FitError::Convergence("spectrum has no finite values".into()))?;
    let end = peak.saturating_add(options.peak_shift).min(energy.len());

    let (a, b) = fit_window(energy, flux, end, peak, options)?;
    let fit = ThermalFit {
        flux: maxwellian(energy, a, b),
        amplitude: a,
        inverse_temperature: b,
        peak_index: peak,
        window_end: end,
    };

    log::info!(
        "Thermal core: peak flux at E = {:.4e}, fitted peak at E = {:.4e} (A = {:.4e}, B = {:.4e})",
        energy[peak],
        fit.peak_energy(),
        a,
        b
    );
    Ok(fit)
}

/// Levenberg–Marquardt on `[0, end)`, seeded from the bin `guess_at`.
fn fit_window(
    energy: &[f64],
    flux: &[f64],
    end: usize,
    guess_at: usize,
    options: &ThermalFitOptions,
) -> Result<(f64, f64), FitError> {
    if end < 3 {
        return Err(FitError::Convergence(format!(
            "fit window has {} bins, need at least 3",
            end
        )));
    }

    let e_peak = energy[guess_at];
    let f_peak = flux[guess_at];
    let b0 = 0.5 / e_peak;
    let a0 = f_peak / (e_peak.sqrt() * (-0.5f64).exp());
    if !(a0.is_finite() && b0.is_finite()) {
        return Err(FitError::Convergence(format!(
            "cannot seed fit from E = {}, f = {}",
            e_peak, f_peak
        )));
    }

    let solution = fit_two_parameter(
        &energy[..end],
        &flux[..end],
        [a0, b0],
        &options.lm(),
        maxwellian_with_gradient,
    )
    .map_err(|e| FitError::Convergence(e.to_string()))?;

    let [a, b] = solution.params;
    if !(a.is_finite() && b.is_finite()) {
        return Err(FitError::Convergence(format!(
            "non-finite parameters A = {}, B = {}",
            a, b
        )));
    }
    Ok((a, b))
}

/// Background Maxwellian from the initial thermal speed.
///
/// The shape uses `B = 1.5 / (thermal_energy(vth) * mime)`; it is then scaled
/// so it touches the measured spectrum where `flux / shape` is smallest
/// before its first NaN-aware minimum.
pub fn background_thermal_core(
    energy: &[f64],
    flux: &[f64],
    vth: f64,
    mime: f64,
) -> Result<Vec<f64>, FitError> {
    check_lengths(energy, flux)?;
    let eth = thermal_energy(vth) * mime;
    let mut fthermal = maxwellian(energy, 1.0, 1.5 / eth);

    let ratio: Vec<f64> = flux.iter().zip(&fthermal).map(|(f, t)| f / t).collect();
    let limit = argmin(&ratio).ok_or_else(|| FitError::InvalidWindow {
        start: 0,
        end: 0,
        len: energy.len(),
        reason: "flux / background is NaN everywhere".into(),
    })?;
    let touch = argmin(&ratio[..limit]).ok_or_else(|| FitError::InvalidWindow {
        start: 0,
        end: limit,
        len: energy.len(),
        reason: "no bins before the ratio minimum".into(),
    })?;

    let scale = flux[touch] / fthermal[touch];
    for v in &mut fthermal {
        *v *= scale;
    }
    log::info!(
        "Background thermal core: E_th = {:.4e}, matched at bin {} (scale {:.4e})",
        eth,
        touch,
        scale
    );
    Ok(fthermal)
}

/// Maxwellian fit to the low-energy bins below the spectrum minimum.
///
/// With `peak = argmax(flux)` and `emin = argmin(flux[..peak])`, the fit
/// window is `[0, emin)`. The returned component equals the measured flux
/// below `emin` and is zero from `emin` on; the fitted parameters are kept
/// in the result.
pub fn lower_thermal_core(energy: &[f64], flux: &[f64]) -> Result<ThermalFit, FitError> {
    check_lengths(energy, flux)?;
    let options = ThermalFitOptions::default();
    let peak = argmax(flux)
        .ok_or_else(|| FitError::Convergence("spectrum has no finite values".into()))?;
    let emin = argmin(&flux[..peak]).ok_or_else(|| FitError::InvalidWindow {
        start: 0,
        end: peak,
        len: flux.len(),
        reason: "spectrum peaks in the first bin".into(),
    })?;

    let guess_at = argmax(&flux[..emin]).unwrap_or(0);
    let (a, b) = fit_window(energy, flux, emin, guess_at, &options)?;

    let mut component = vec![0.0; flux.len()];
    component[..emin].copy_from_slice(&flux[..emin]);
    log::info!("Lower thermal core: window [0, {}), A = {:.4e}, B = {:.4e}", emin, a, b);
    Ok(ThermalFit {
        flux: component,
        amplitude: a,
        inverse_temperature: b,
        peak_index: peak,
        window_end: emin,
    })
}
