//! Particle and energy content of the thermal and non-thermal components.

use serde::Serialize;

use super::accumulate::accumulate;
use super::assert_lengths;

/// Thermal vs total particle number and kinetic energy, in physical units
/// (the normalized spectrum multiplied back by `fnorm`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThermalBudget {
    pub thermal_count: f64,
    pub total_count: f64,
    pub thermal_energy: f64,
    pub total_energy: f64,
}

impl ThermalBudget {
    pub fn count_ratio(&self) -> f64 {
        self.thermal_count / self.total_count
    }

    pub fn energy_ratio(&self) -> f64 {
        self.thermal_energy / self.total_energy
    }
}

/// Particle and energy totals of `flux` and of its thermal part.
///
/// # Panics
///
/// If `flux` or `thermal` differ in length from `energy`.
pub fn thermal_budget(energy: &[f64], flux: &[f64], thermal: &[f64], fnorm: f64) -> ThermalBudget {
    assert_lengths(energy, flux);
    assert_lengths(energy, thermal);
    let total = accumulate(energy, flux);
    let th = accumulate(energy, thermal);
    let budget = ThermalBudget {
        thermal_count: th.total_count() * fnorm,
        total_count: total.total_count() * fnorm,
        thermal_energy: th.total_energy() * fnorm,
        total_energy: total.total_energy() * fnorm,
    };
    log::info!(
        "Thermal and total particles: {:.4e} {:.4e} ({:.4})",
        budget.thermal_count,
        budget.total_count,
        budget.count_ratio()
    );
    log::info!(
        "Thermal and total energies: {:.4e} {:.4e} ({:.4})",
        budget.thermal_energy,
        budget.total_energy,
        budget.energy_ratio()
    );
    budget
}

/// Fractions of the spectrum outside its thermal component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NonthermalFraction {
    pub number: f64,
    pub energy: f64,
}

/// # Panics
///
/// If `flux` or `thermal` differ in length from `energy`.
pub fn nonthermal_fraction(energy: &[f64], flux: &[f64], thermal: &[f64]) -> NonthermalFraction {
    assert_lengths(energy, flux);
    assert_lengths(energy, thermal);
    let remainder: Vec<f64> = flux.iter().zip(thermal).map(|(f, t)| f - t).collect();
    let total = accumulate(energy, flux);
    let nth = accumulate(energy, &remainder);
    NonthermalFraction {
        number: nth.total_count() / total.total_count(),
        energy: nth.total_energy() / total.total_energy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_budget_and_fraction_are_complementary() {
        let e: Vec<f64> = (1..=50).map(|i| 0.1 * i as f64).collect();
        let flux: Vec<f64> = e.iter().map(|x| (-x).exp() + 0.1 / x).collect();
        let thermal: Vec<f64> = e.iter().map(|x| (-x).exp()).collect();

        let budget = thermal_budget(&e, &flux, &thermal, 1000.0);
        let frac = nonthermal_fraction(&e, &flux, &thermal);
        assert_relative_eq!(budget.count_ratio() + frac.number, 1.0, max_relative = 1e-12);
        assert_relative_eq!(budget.energy_ratio() + frac.energy, 1.0, max_relative = 1e-12);
        assert!(budget.total_count > budget.thermal_count);
    }

    #[test]
    fn test_all_thermal() {
        let e = [1.0, 2.0, 4.0];
        let f = [1.0, 0.5, 0.25];
        let frac = nonthermal_fraction(&e, &f, &f);
        assert_eq!(frac.number, 0.0);
        assert_eq!(frac.energy, 0.0);
    }
}
