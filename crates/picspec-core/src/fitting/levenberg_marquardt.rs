//! Levenberg–Marquardt least squares for two-parameter models.
//!
//! Minimises $\sum_i (y_i - f(x_i; p))^2$ with Marquardt's diagonal scaling,
//! so the damping is invariant to the scale of each parameter. The $2 \times 2$
//! normal equations are solved with `nalgebra`.

use nalgebra::{Matrix2, Vector2};
use thiserror::Error;

/// Errors from [`fit_two_parameter`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LmError {
    #[error("No convergence after {iterations} iterations (cost {cost:.3e})")]
    MaxIterations { iterations: usize, cost: f64 },

    #[error("Singular normal equations at iteration {iteration}")]
    Singular { iteration: usize },

    #[error("Non-finite model value or parameter at iteration {iteration}")]
    NonFinite { iteration: usize },

    #[error("Need at least {required} points, got {got}")]
    TooFewPoints { required: usize, got: usize },
}

/// Solver controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative tolerance on cost reduction and parameter step.
    pub tolerance: f64,
    pub initial_damping: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            initial_damping: 1e-3,
        }
    }
}

/// Converged parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSolution {
    pub params: [f64; 2],
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    pub iterations: usize,
}

const MAX_DAMPING: f64 = 1e16;

/// Fit `model` to `(x, y)` starting from `initial`.
///
/// `model(x, p)` returns the model value and its gradient with respect to
/// `p`. At least three points are required.
pub fn fit_two_parameter<F>(
    x: &[f64],
    y: &[f64],
    initial: [f64; 2],
    options: &LmOptions,
    model: F,
) -> Result<LmSolution, LmError>
where
    F: Fn(f64, [f64; 2]) -> (f64, [f64; 2]),
{
    assert_eq!(x.len(), y.len(), "x and y must have the same length");
    if x.len() < 3 {
        return Err(LmError::TooFewPoints {
            required: 3,
            got: x.len(),
        });
    }

    let cost_at = |p: [f64; 2]| -> f64 {
        x.iter()
            .zip(y)
            .map(|(&xi, &yi)| {
                let r = yi - model(xi, p).0;
                r * r
            })
            .sum()
    };

    let mut params = initial;
    let mut cost = cost_at(params);
    if !cost.is_finite() {
        return Err(LmError::NonFinite { iteration: 0 });
    }
    let mut damping = options.initial_damping;

    for iteration in 1..=options.max_iterations {
        if cost == 0.0 {
            return Ok(LmSolution {
                params,
                cost,
                iterations: iteration - 1,
            });
        }

        let mut jtj = Matrix2::<f64>::zeros();
        let mut jtr = Vector2::<f64>::zeros();
        for (&xi, &yi) in x.iter().zip(y) {
            let (f, grad) = model(xi, params);
            let g = Vector2::new(grad[0], grad[1]);
            jtj += g * g.transpose();
            jtr += g * (yi - f);
        }
        if !jtj.iter().all(|v| v.is_finite()) || !jtr.iter().all(|v| v.is_finite()) {
            return Err(LmError::NonFinite { iteration });
        }

        // Try increasingly damped steps until one lowers the cost.
        loop {
            let mut a = jtj;
            for k in 0..2 {
                a[(k, k)] += damping * jtj[(k, k)].max(f64::MIN_POSITIVE);
            }
            let step = a.lu().solve(&jtr).ok_or(LmError::Singular { iteration })?;
            let trial = [params[0] + step[0], params[1] + step[1]];
            let trial_cost = cost_at(trial);

            if trial_cost.is_finite() && trial_cost < cost {
                let reduction = (cost - trial_cost) / cost;
                let step_norm = step.norm();
                let param_norm = Vector2::new(params[0], params[1]).norm();
                params = trial;
                cost = trial_cost;
                damping = (damping / 10.0).max(1e-12);

                if reduction <= options.tolerance
                    || step_norm <= options.tolerance * (param_norm + options.tolerance)
                {
                    return Ok(LmSolution {
                        params,
                        cost,
                        iterations: iteration,
                    });
                }
                break;
            }

            damping *= 10.0;
            if damping > MAX_DAMPING {
                // No direction lowers the cost any further: this is the minimum
                // to machine precision.
                return Ok(LmSolution {
                    params,
                    cost,
                    iterations: iteration,
                });
            }
        }
    }

    Err(LmError::MaxIterations {
        iterations: options.max_iterations,
        cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exponential(x: f64, p: [f64; 2]) -> (f64, [f64; 2]) {
        let e = (-p[1] * x).exp();
        (p[0] * e, [e, -p[0] * x * e])
    }

    #[test]
    fn test_recovers_exponential() {
        let x: Vec<f64> = (0..30).map(|i| i as f64 * 0.2).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 3.0 * (-0.7 * xi).exp()).collect();
        let sol = fit_two_parameter(&x, &y, [1.0, 0.3], &LmOptions::default(), exponential).unwrap();
        assert_relative_eq!(sol.params[0], 3.0, max_relative = 1e-6);
        assert_relative_eq!(sol.params[1], 0.7, max_relative = 1e-6);
        assert!(sol.cost < 1e-12);
    }

    #[test]
    fn test_too_few_points() {
        let err = fit_two_parameter(&[1.0, 2.0], &[1.0, 2.0], [1.0, 1.0], &LmOptions::default(), exponential)
            .unwrap_err();
        assert_eq!(err, LmError::TooFewPoints { required: 3, got: 2 });
    }

    #[test]
    fn test_non_finite_start() {
        let x = [1.0, 2.0, 3.0];
        let y = [1.0, f64::NAN, 1.0];
        let err = fit_two_parameter(&x, &y, [1.0, 1.0], &LmOptions::default(), exponential).unwrap_err();
        assert!(matches!(err, LmError::NonFinite { .. }));
    }

    #[test]
    fn test_iteration_cap() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.3).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 5.0 * (-1.3 * xi).exp()).collect();
        let options = LmOptions {
            max_iterations: 1,
            ..Default::default()
        };
        let err = fit_two_parameter(&x, &y, [0.1, 0.01], &options, exponential).unwrap_err();
        assert!(matches!(err, LmError::MaxIterations { iterations: 1, .. }));
    }
}
