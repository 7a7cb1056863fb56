//! Cumulative particle number and kinetic energy of a spectrum.

use serde::Serialize;

use super::assert_lengths;

/// Running totals over the energy bins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accumulated {
    pub count: Vec<f64>,
    pub energy: Vec<f64>,
}

impl Accumulated {
    pub fn total_count(&self) -> f64 {
        self.count.last().copied().unwrap_or(0.0)
    }

    pub fn total_energy(&self) -> f64 {
        self.energy.last().copied().unwrap_or(0.0)
    }
}

/// Trapezoidal accumulation on logarithmic bins.
///
/// With `dlogE = (log10 max E - log10 min E) / n`:
///
/// - `count[0] = f0 E0`, `count[i] = count[i-1] + f_i (E_i + E_{i-1}) / 2`
/// - `energy[0] = f0 E0² / 2`,
///   `energy[i] = energy[i-1] + f_i (E_i - E_{i-1})(E_i + E_{i-1}) / 2`
///
/// and both series are scaled by `dlogE`. For non-negative flux and
/// increasing energies both are non-decreasing.
///
/// # Panics
///
/// If `energy` and `flux` differ in length.
pub fn accumulate(energy: &[f64], flux: &[f64]) -> Accumulated {
    assert_lengths(energy, flux);
    let n = energy.len();
    if n == 0 {
        return Accumulated {
            count: Vec::new(),
            energy: Vec::new(),
        };
    }

    let (emin, emax) = energy
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &e| (lo.min(e), hi.max(e)));
    let dloge = (emax.log10() - emin.log10()) / n as f64;

    let mut count = Vec::with_capacity(n);
    let mut eacc = Vec::with_capacity(n);
    count.push(flux[0] * energy[0]);
    eacc.push(0.5 * flux[0] * energy[0] * energy[0]);
    for i in 1..n {
        let (e0, e1) = (energy[i - 1], energy[i]);
        count.push(count[i - 1] + flux[i] * (e1 + e0) * 0.5);
        eacc.push(eacc[i - 1] + 0.5 * flux[i] * (e1 - e0) * (e1 + e0));
    }

    for v in count.iter_mut().chain(eacc.iter_mut()) {
        *v *= dloge;
    }
    Accumulated {
        count,
        energy: eacc,
    }
}
