//! Parser for the four-column energy spectrum text tables.
//!
//! Each row holds: linear energy bin, flux on the linear bins, logarithmic
//! energy bin, flux on the logarithmic bins. Columns are separated by any
//! whitespace. Blank lines and `#` comments are skipped.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{open, DecodeError, Species};

/// Energy spectrum of one species, normalized by [`EnergySpectrum::normalization`].
#[derive(Debug, Clone, Serialize)]
pub struct EnergySpectrum {
    pub species: Species,
    pub energy_linear: Vec<f64>,
    pub flux_linear: Vec<f64>,
    pub energy_log: Vec<f64>,
    pub flux_log: Vec<f64>,
    pub normalization: f64,
}

impl EnergySpectrum {
    pub fn len(&self) -> usize {
        self.energy_log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy_log.is_empty()
    }
}

/// `<dir>/spectrum-<tag>.<frame>`
pub fn spectrum_file_path(dir: &Path, species: Species, frame: u32) -> PathBuf {
    dir.join(format!("spectrum-{}.{}", species.tag(), frame))
}

/// Read a spectrum table and divide both flux columns by `normalization`.
pub fn read_energy_spectrum(
    path: &Path,
    species: Species,
    normalization: f64,
) -> Result<EnergySpectrum, DecodeError> {
    let file = open(path)?;
    let reader = BufReader::new(file);

    let mut spectrum = EnergySpectrum {
        species,
        energy_linear: Vec::new(),
        flux_linear: Vec::new(),
        energy_log: Vec::new(),
        flux_log: Vec::new(),
        normalization,
    };

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let values = parse_row(trimmed, line_num)?;
        spectrum.energy_linear.push(values[0]);
        spectrum.flux_linear.push(values[1] / normalization);
        spectrum.energy_log.push(values[2]);
        spectrum.flux_log.push(values[3] / normalization);
    }

    log::debug!(
        "Read {} spectrum bins from {} (normalization {:e})",
        spectrum.len(),
        path.display(),
        normalization
    );
    Ok(spectrum)
}

fn parse_row(line: &str, line_num: usize) -> Result<[f64; 4], DecodeError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 4 {
        return Err(DecodeError::Format {
            line: line_num,
            message: format!("expected 4 columns, found {}", parts.len()),
        });
    }

    let mut values = [0.0; 4];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part.parse().map_err(|e| DecodeError::Format {
            line: line_num,
            message: format!("invalid number '{}': {}", part, e),
        })?;
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn write_table(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_and_normalize_both_fluxes() {
        let file = write_table(
            "# lin flin log flog\n\
             0.1  10.0  0.001  4.0\n\
             \n\
             0.2\t20.0  1e-2   8.0\n",
        );
        let spect = read_energy_spectrum(file.path(), Species::Electron, 2.0).unwrap();
        assert_eq!(spect.len(), 2);
        assert_eq!(spect.energy_linear, vec![0.1, 0.2]);
        assert_eq!(spect.flux_linear, vec![5.0, 10.0]);
        assert_relative_eq!(spect.energy_log[1], 0.01);
        assert_eq!(spect.flux_log, vec![2.0, 4.0]);
        assert_eq!(spect.normalization, 2.0);
    }

    #[test]
    fn test_wrong_column_count() {
        let file = write_table("0.1 1.0 0.1 1.0\n0.2 2.0 0.2\n");
        let err = read_energy_spectrum(file.path(), Species::Ion, 1.0).unwrap_err();
        match err {
            DecodeError::Format { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("found 3"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_invalid_number() {
        let file = write_table("0.1 abc 0.1 1.0\n");
        let err = read_energy_spectrum(file.path(), Species::Electron, 1.0).unwrap_err();
        assert!(matches!(err, DecodeError::Format { line: 1, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = read_energy_spectrum(Path::new("/nonexistent/spectrum-e.1"), Species::Electron, 1.0)
            .unwrap_err();
        assert!(matches!(err, DecodeError::FileNotFound { .. }));
    }

    #[test]
    fn test_spectrum_path() {
        let path = spectrum_file_path(Path::new("spectrum"), Species::Ion, 12);
        assert_eq!(path, Path::new("spectrum/spectrum-h.12"));
    }
}
