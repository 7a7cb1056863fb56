//! Small numerical kernels used by the spectrum fits.
//!
//! - [`levenberg_marquardt`] — damped Gauss–Newton for two-parameter models.
//! - [`linear`] — ordinary least-squares straight line.
//! - [`moving_average`], [`argmax`], [`argmin`] — array helpers with
//!   NumPy-compatible tie breaking (lowest index wins).

pub mod levenberg_marquardt;
pub mod linear;

pub use levenberg_marquardt::{fit_two_parameter, LmError, LmOptions, LmSolution};
pub use linear::{fit_line, LineFit};

/// Length-`width` moving average, same-size output with zero padding.
///
/// Matches `np.convolve(data, ones(width) / width, 'same')`: the window for
/// output `i` covers `data[i + (width - 1) / 2 + 1 - width ..= i + (width - 1) / 2]`.
pub fn moving_average(data: &[f64], width: usize) -> Vec<f64> {
    if width <= 1 {
        return data.to_vec();
    }
    let n = data.len() as isize;
    let ahead = ((width - 1) / 2) as isize;
    let behind = width as isize - 1 - ahead;
    (0..n)
        .map(|i| {
            let lo = (i - behind).max(0);
            let hi = (i + ahead).min(n - 1);
            let sum: f64 = (lo..=hi).map(|j| data[j as usize]).sum();
            sum / width as f64
        })
        .collect()
}

/// Index of the first maximum, ignoring NaN. `None` for empty or all-NaN input.
pub fn argmax(data: &[f64]) -> Option<usize> {
    extremum(data, |candidate, best| candidate > best)
}

/// Index of the first minimum, ignoring NaN.
pub fn argmin(data: &[f64]) -> Option<usize> {
    extremum(data, |candidate, best| candidate < best)
}

fn extremum(data: &[f64], better: impl Fn(f64, f64) -> bool) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in data.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if !better(v, b) => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_moving_average_same() {
        let out = moving_average(&[3.0, 6.0, 9.0, 12.0], 3);
        assert_relative_eq!(out[0], 3.0);
        assert_relative_eq!(out[1], 6.0);
        assert_relative_eq!(out[2], 9.0);
        assert_relative_eq!(out[3], 7.0);
        assert_eq!(moving_average(&[1.0, 2.0], 1), vec![1.0, 2.0]);
    }

    #[test]
    fn test_moving_average_even_width() {
        // np.convolve([1, 2, 3, 4], [0.5, 0.5], 'same') == [0.5, 1.5, 2.5, 3.5]
        let out = moving_average(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![0.5, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_arg_ties_and_nan() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmin(&[2.0, 1.0, 1.0]), Some(1));
        assert_eq!(argmax(&[f64::NAN, 1.0, f64::NAN]), Some(1));
        assert_eq!(argmin(&[f64::NAN, f64::NAN]), None);
        assert_eq!(argmax(&[]), None);
    }
}
