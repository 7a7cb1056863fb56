//! Binary and text formats produced by the simulation and its tooling.
//!
//! Supported formats:
//! - [`particle`] — `<prefix>particle.<step>.<rank>` particle dumps
//! - [`vdist`] — `vdist_2d-<tag>.<frame>` / `vdist_1d-<tag>.<frame>` pairs
//! - [`spectrum`] — `spectrum-<tag>.<frame>` energy tables

pub mod particle;
pub mod schema;
pub mod spectrum;
pub mod vdist;

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors while decoding simulation output.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Truncated {section} in {}: need {required} bytes, file has {available}", path.display())]
    TruncatedRecord {
        path: PathBuf,
        section: &'static str,
        required: u64,
        available: u64,
    },

    #[error("Layout mismatch in {}: {message}", path.display())]
    LayoutMismatch { path: PathBuf, message: String },

    #[error("Parse error at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Particle species as tagged in file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Electron,
    Ion,
}

impl Species {
    /// Single-letter tag used in distribution and spectrum file names.
    pub fn tag(self) -> &'static str {
        match self {
            Species::Electron => "e",
            Species::Ion => "h",
        }
    }

    /// Parse a file-name tag (`e`, or `h`/`i` for ions).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "e" => Some(Species::Electron),
            "h" | "i" => Some(Species::Ion),
            _ => None,
        }
    }

    /// Particle mass in electron masses.
    pub fn mass(self, mass_ratio: f64) -> f64 {
        match self {
            Species::Electron => 1.0,
            Species::Ion => mass_ratio,
        }
    }
}

/// Open a file, mapping a missing path to [`DecodeError::FileNotFound`].
pub(crate) fn open(path: &Path) -> Result<std::fs::File, DecodeError> {
    std::fs::File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DecodeError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => DecodeError::Io(e),
    })
}

/// Map an `UnexpectedEof` from `read_exact` to a truncation error.
pub(crate) fn truncated(
    err: io::Error,
    path: &Path,
    section: &'static str,
    required: u64,
    available: u64,
) -> DecodeError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        DecodeError::TruncatedRecord {
            path: path.to_path_buf(),
            section,
            required,
            available,
        }
    } else {
        DecodeError::Io(err)
    }
}
