//! Ordinary least-squares straight line `y = slope * x + intercept`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Closed-form least squares. `None` with fewer than two points, when all
/// `x` coincide, or when the input is not finite.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<LineFit> {
    assert_eq!(x.len(), y.len(), "x and y must have the same length");
    let n = x.len();
    if n < 2 {
        return None;
    }

    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;
    let (sxx, sxy) = x.iter().zip(y).fold((0.0, 0.0), |(sxx, sxy), (&xi, &yi)| {
        let dx = xi - mean_x;
        (sxx + dx * dx, sxy + dx * (yi - mean_y))
    });

    if !(sxx > 0.0) || !sxy.is_finite() {
        return None;
    }
    let slope = sxy / sxx;
    Some(LineFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| -2.5 * v + 4.0).collect();
        let fit = fit_line(&x, &y).unwrap();
        assert_relative_eq!(fit.slope, -2.5, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 4.0, epsilon = 1e-12);
        assert_relative_eq!(fit.eval(10.0), -21.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate() {
        assert!(fit_line(&[1.0], &[1.0]).is_none());
        assert!(fit_line(&[2.0, 2.0], &[1.0, 3.0]).is_none());
        assert!(fit_line(&[1.0, f64::NAN], &[1.0, 3.0]).is_none());
    }
}
