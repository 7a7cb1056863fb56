//! Spectrum decomposition on synthetic spectra with known parameters.

use approx::assert_relative_eq;
use picspec_core::spectrum::{
    accumulate, decompose, fit_power_law, fit_thermal_core, maxwellian, FitError, ThermalFit,
};

/// `n` logarithmically spaced bins on `[emin, emax]`.
fn log_bins(n: usize, emin: f64, emax: f64) -> Vec<f64> {
    let (l0, l1) = (emin.log10(), emax.log10());
    (0..n)
        .map(|i| 10f64.powf(l0 + (l1 - l0) * i as f64 / (n - 1) as f64))
        .collect()
}

#[test]
fn test_maxwellian_recovered_inside_window() {
    let energy = log_bins(200, 1e-4, 10.0);
    let (a, b) = (1.7e3, 45.0);
    let flux = maxwellian(&energy, a, b);

    let fit = fit_thermal_core(&energy, &flux).unwrap();
    assert!(fit.window_end <= energy.len());
    assert_eq!(fit.window_end, fit.peak_index + 10);
    for i in 0..fit.window_end {
        assert_relative_eq!(fit.flux[i], flux[i], max_relative = 1e-4);
    }
    assert_relative_eq!(fit.inverse_temperature, b, max_relative = 1e-4);
    assert_relative_eq!(fit.peak_energy(), 0.5 / b, max_relative = 1e-4);
}

#[test]
fn test_power_law_recovered() {
    let energy = log_bins(300, 1e-3, 1e2);
    let (c, k) = (3.0e-2, -2.4);
    let flux: Vec<f64> = energy.iter().map(|e| c * e.powf(k)).collect();

    let fit = fit_power_law(&energy, &flux, 20, 100).unwrap();
    assert_eq!(fit.start, 20);
    assert_eq!(fit.end, 120);
    assert_relative_eq!(fit.slope, k, max_relative = 1e-6);
    assert_relative_eq!(fit.intercept, c.log10(), max_relative = 1e-6);
    assert!(fit.number_fraction > 0.0 && fit.number_fraction < 1.0);
    assert!(fit.energy_fraction > 0.0 && fit.energy_fraction < 1.0);
}

#[test]
fn test_power_law_window_past_end() {
    let energy = log_bins(50, 1e-2, 1.0);
    let flux: Vec<f64> = energy.iter().map(|e| e.powf(-1.0)).collect();

    // Peak is bin 0; [45, 55) runs past 50 bins.
    let err = fit_power_law(&energy, &flux, 45, 10).unwrap_err();
    match err {
        FitError::InvalidWindow { start, end, len, .. } => {
            assert_eq!((start, end, len), (45, 55, 50));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(!fit_power_law(&energy, &flux, 45, 10)
        .unwrap_err()
        .is_recoverable());

    // Exactly reaching the end is fine.
    assert!(fit_power_law(&energy, &flux, 40, 10).is_ok());
}

#[test]
fn test_power_law_window_with_zero_flux() {
    let energy = log_bins(40, 1e-2, 1.0);
    let mut flux: Vec<f64> = energy.iter().map(|e| e.powf(-1.0)).collect();
    flux[15] = 0.0;
    let err = fit_power_law(&energy, &flux, 10, 10).unwrap_err();
    assert!(matches!(err, FitError::InvalidWindow { start: 10, end: 20, .. }));

    flux[15] = -1e-9;
    assert!(fit_power_law(&energy, &flux, 10, 10).is_err());
}

#[test]
fn test_accumulate_monotone() {
    let energy = log_bins(120, 1e-4, 50.0);
    let flux: Vec<f64> = energy
        .iter()
        .map(|e| 3.0 * e.sqrt() * (-20.0 * e).exp() + 1e-3 * e.powf(-2.0))
        .collect();
    let acc = accumulate(&energy, &flux);

    let dloge = (50f64.log10() - 1e-4f64.log10()) / 120.0;
    assert_relative_eq!(acc.count[0], flux[0] * energy[0] * dloge, max_relative = 1e-12);
    for w in acc.count.windows(2) {
        assert!(w[1] >= w[0]);
    }
    for w in acc.energy.windows(2) {
        assert!(w[1] >= w[0]);
    }
}

#[test]
fn test_decompose_two_populations() {
    let energy = log_bins(250, 1e-4, 20.0);
    let cold = maxwellian(&energy, 2.0e3, 60.0);
    let hot = maxwellian(&energy, 1.0, 0.8);
    let flux: Vec<f64> = cold.iter().zip(&hot).map(|(a, b)| a + b).collect();

    let d = decompose(&energy, &flux).unwrap();
    for i in 0..energy.len() {
        assert_relative_eq!(d.nonthermal[i], flux[i] - d.thermal[i]);
        assert_relative_eq!(d.secondary_nonthermal[i], d.nonthermal[i] - d.secondary_thermal[i]);
    }
    // The cold core dominates the first pass.
    let peak = (0..energy.len())
        .max_by(|&i, &j| d.thermal[i].total_cmp(&d.thermal[j]))
        .unwrap();
    assert_relative_eq!(energy[peak], 1.0 / 120.0, max_relative = 0.1);
}

#[test]
fn test_zero_fallback_after_convergence_failure() {
    let energy = [1.0, 2.0, 3.0, 4.0, 5.0];
    let flux = [f64::NAN; 5];
    let fit = match fit_thermal_core(&energy, &flux) {
        Err(e) if e.is_recoverable() => ThermalFit::zero(energy.len()),
        other => panic!("expected recoverable error, got {:?}", other),
    };
    assert_eq!(fit.flux, vec![0.0; 5]);
}

#[test]
fn test_fit_results_serialise() {
    let energy = log_bins(100, 1e-3, 10.0);
    let flux: Vec<f64> = energy.iter().map(|e| 2.0 * e.powf(-1.5)).collect();
    let fit = fit_power_law(&energy, &flux, 10, 30).unwrap();

    let value = serde_json::to_value(&fit).unwrap();
    assert_eq!(value["start"], 10);
    assert_eq!(value["end"], 40);
    assert_eq!(value["flux"].as_array().unwrap().len(), 100);
    assert_relative_eq!(value["slope"].as_f64().unwrap(), -1.5, max_relative = 1e-9);
}
