//! Reader for precomputed velocity-distribution file pairs.
//!
//! The external spectrum tool writes two files per species and frame:
//!
//! - `vdist_2d-<tag>.<frame>`: a 36-byte header (box centre and sizes,
//!   velocity bounds, `nbins`) followed by the velocity bin arrays and four
//!   2D histograms, all `f64` in row-major order.
//! - `vdist_1d-<tag>.<frame>`: the same header and bin arrays, then the
//!   parallel and perpendicular 1D histograms.
//!
//! Every array offset is derived from `nbins` through
//! [`VdistLayout`](super::schema::VdistLayout).

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{NativeEndian, ReadBytesExt};
use ndarray::{Array1, Array2};
use serde::Serialize;

use super::schema::{ArraySection, VdistLayout, VDIST_HEADER, VDIST_HEADER_SIZE};
use super::{open, truncated, DecodeError, Species};

/// Added to every histogram bin so the arrays are safe to take logs of.
pub const HISTOGRAM_FLOOR: f64 = 0.01;

/// Header shared by both files of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VdistHeader {
    /// Centre of the sampling box (de).
    pub center: [f32; 3],
    /// Size of the sampling box (cells).
    pub sizes: [f32; 3],
    pub vmin: f32,
    pub vmax: f32,
    pub nbins: i32,
}

/// Smallest and largest non-zero value over a group of histograms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

/// Decoded velocity distributions for one species at one frame.
#[derive(Debug, Clone, Serialize)]
pub struct VelocityDistribution {
    pub species: Species,
    pub frame: u32,
    pub center: [f64; 3],
    pub sizes: [f64; 3],
    pub vmin: f64,
    pub vmax: f64,
    pub nbins: usize,
    /// Bin positions for the perpendicular axis (`nbins`).
    pub vbins_short: Array1<f64>,
    /// Bin positions for symmetric axes (`2 * nbins`).
    pub vbins_long: Array1<f64>,
    /// Parallel vs perpendicular, shape `(nbins, 2 * nbins)`.
    pub para_perp: Array2<f64>,
    pub xy: Array2<f64>,
    pub xz: Array2<f64>,
    pub yz: Array2<f64>,
    pub para: Array1<f64>,
    pub perp: Array1<f64>,
    /// Non-zero range over the four 2D histograms.
    pub range_2d: Option<ValueRange>,
    /// Non-zero range over the two 1D histograms.
    pub range_1d: Option<ValueRange>,
}

/// Paths of the 2D and 1D files for `species` at `frame`.
pub fn vdist_file_paths(dir: &Path, species: Species, frame: u32) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("vdist_2d-{}.{}", species.tag(), frame)),
        dir.join(format!("vdist_1d-{}.{}", species.tag(), frame)),
    )
}

/// Read and post-process the distribution pair for `species` at `frame`.
///
/// Ion velocities are stored as `sqrt(m_i) * u`, so bins and bounds are
/// divided by `sqrt(mass_ratio)`. [`HISTOGRAM_FLOOR`] is added to every
/// histogram.
pub fn read_velocity_distribution(
    dir: &Path,
    species: Species,
    frame: u32,
    mass_ratio: f64,
) -> Result<VelocityDistribution, DecodeError> {
    let (path_2d, path_1d) = vdist_file_paths(dir, species, frame);

    let (header, layout, grid) = read_grid_file(&path_2d)?;
    let profile = read_profile_file(&path_1d, &layout)?;

    let n = layout.nbins;
    let mut vbins_short = Array1::from_vec(grid.vbins_short);
    let mut vbins_long = Array1::from_vec(grid.vbins_long);
    let mut vmin = header.vmin as f64;
    let mut vmax = header.vmax as f64;
    if species == Species::Ion {
        let smime = mass_ratio.sqrt();
        vbins_short /= smime;
        vbins_long /= smime;
        vmin /= smime;
        vmax /= smime;
    }

    let to_2d = |path: &Path, name: &str, shape: (usize, usize), data: Vec<f64>| {
        Array2::from_shape_vec(shape, data).map_err(|e| DecodeError::LayoutMismatch {
            path: path.to_path_buf(),
            message: format!("{}: {}", name, e),
        })
    };
    let mut para_perp = to_2d(&path_2d, "para_perp", (n, 2 * n), grid.para_perp)?;
    let mut xy = to_2d(&path_2d, "xy", (2 * n, 2 * n), grid.xy)?;
    let mut xz = to_2d(&path_2d, "xz", (2 * n, 2 * n), grid.xz)?;
    let mut yz = to_2d(&path_2d, "yz", (2 * n, 2 * n), grid.yz)?;
    let mut para = Array1::from_vec(profile.para);
    let mut perp = Array1::from_vec(profile.perp);

    for h in [&mut para_perp, &mut xy, &mut xz, &mut yz] {
        *h += HISTOGRAM_FLOOR;
    }
    para += HISTOGRAM_FLOOR;
    perp += HISTOGRAM_FLOOR;

    let range_2d = nonzero_range(
        [&para_perp, &xy, &xz, &yz]
            .into_iter()
            .flat_map(|a| a.iter().copied()),
    );
    let range_1d = nonzero_range(para.iter().chain(perp.iter()).copied());

    Ok(VelocityDistribution {
        species,
        frame,
        center: header.center.map(f64::from),
        sizes: header.sizes.map(f64::from),
        vmin,
        vmax,
        nbins: n,
        vbins_short,
        vbins_long,
        para_perp,
        xy,
        xz,
        yz,
        para,
        perp,
        range_2d,
        range_1d,
    })
}

/// Min/max over the non-zero values of `values`, `None` if all are zero.
pub fn nonzero_range(values: impl IntoIterator<Item = f64>) -> Option<ValueRange> {
    values
        .into_iter()
        .filter(|v| *v != 0.0 && !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some(ValueRange { min: v, max: v }),
            Some(r) => Some(ValueRange {
                min: r.min.min(v),
                max: r.max.max(v),
            }),
        })
}

struct GridArrays {
    vbins_short: Vec<f64>,
    vbins_long: Vec<f64>,
    para_perp: Vec<f64>,
    xy: Vec<f64>,
    xz: Vec<f64>,
    yz: Vec<f64>,
}

struct ProfileArrays {
    para: Vec<f64>,
    perp: Vec<f64>,
}

fn read_header(
    reader: &mut impl Read,
    path: &Path,
    available: u64,
) -> Result<VdistHeader, DecodeError> {
    let mut bytes = [0u8; VDIST_HEADER_SIZE];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| truncated(e, path, "vdist header", VDIST_HEADER_SIZE as u64, available))?;
    let rec = VDIST_HEADER.record(&bytes);
    Ok(VdistHeader {
        center: [0, 1, 2].map(|i| rec.f32_at("center", i)),
        sizes: [0, 1, 2].map(|i| rec.f32_at("sizes", i)),
        vmin: rec.f32("vmin"),
        vmax: rec.f32("vmax"),
        nbins: rec.i32("nbins"),
    })
}

fn layout_for(header: &VdistHeader, path: &Path) -> Result<VdistLayout, DecodeError> {
    let nbins = usize::try_from(header.nbins).map_err(|_| DecodeError::LayoutMismatch {
        path: path.to_path_buf(),
        message: format!("negative nbins {}", header.nbins),
    })?;
    VdistLayout::for_bins(nbins).ok_or_else(|| DecodeError::LayoutMismatch {
        path: path.to_path_buf(),
        message: format!("nbins = {} implies a file larger than the address space", nbins),
    })
}

fn check_len(path: &Path, nbins: usize, required: u64, available: u64) -> Result<(), DecodeError> {
    if available < required {
        return Err(DecodeError::LayoutMismatch {
            path: path.to_path_buf(),
            message: format!(
                "nbins = {} implies at least {} bytes, file has {}",
                nbins, required, available
            ),
        });
    }
    Ok(())
}

fn read_section(
    reader: &mut BufReader<File>,
    section: &ArraySection,
    path: &Path,
    available: u64,
) -> Result<Vec<f64>, DecodeError> {
    reader.seek(SeekFrom::Start(section.offset))?;
    let mut data = vec![0.0; section.len()];
    reader
        .read_f64_into::<NativeEndian>(&mut data)
        .map_err(|e| truncated(e, path, section.name, section.end(), available))?;
    Ok(data)
}

fn read_grid_file(path: &Path) -> Result<(VdistHeader, VdistLayout, GridArrays), DecodeError> {
    let file = open(path)?;
    let available = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let header = read_header(&mut reader, path, available)?;
    let layout = layout_for(&header, path)?;
    check_len(path, layout.nbins, layout.grid_len(), available)?;

    let mut arrays = Vec::with_capacity(layout.grid.len());
    for section in &layout.grid {
        arrays.push(read_section(&mut reader, section, path, available)?);
    }
    let mut it = arrays.into_iter();
    let mut next = || it.next().unwrap_or_default();
    let grid = GridArrays {
        vbins_short: next(),
        vbins_long: next(),
        para_perp: next(),
        xy: next(),
        xz: next(),
        yz: next(),
    };

    log::debug!("Read 2D velocity distribution {} (nbins = {})", path.display(), layout.nbins);
    Ok((header, layout, grid))
}

fn read_profile_file(path: &Path, layout: &VdistLayout) -> Result<ProfileArrays, DecodeError> {
    let file = open(path)?;
    let available = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let header = read_header(&mut reader, path, available)?;
    if header.nbins as i64 != layout.nbins as i64 {
        return Err(DecodeError::LayoutMismatch {
            path: path.to_path_buf(),
            message: format!(
                "nbins = {} but the 2D file declares {}",
                header.nbins, layout.nbins
            ),
        });
    }
    check_len(path, layout.nbins, layout.profile_len(), available)?;

    let mut arrays = Vec::with_capacity(layout.profile.len());
    for section in &layout.profile {
        arrays.push(read_section(&mut reader, section, path, available)?);
    }
    let mut it = arrays.into_iter();
    let para = it.next().unwrap_or_default();
    let perp = it.next().unwrap_or_default();
    Ok(ProfileArrays { para, perp })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use byteorder::{ByteOrder, NativeEndian};

    use super::*;

    /// Encode a 2D/1D file pair where every section is filled with `fill(name, i)`.
    pub fn encode_pair(
        nbins: usize,
        vmin: f32,
        vmax: f32,
        fill: impl Fn(&str, usize) -> f64,
    ) -> (Vec<u8>, Vec<u8>) {
        let mut h = VDIST_HEADER.builder();
        for i in 0..3 {
            h.set_f32_at("center", i, 10.0 * i as f32);
            h.set_f32_at("sizes", i, 1.0 + i as f32);
        }
        h.set_f32("vmin", vmin)
            .set_f32("vmax", vmax)
            .set_i32("nbins", nbins as i32);
        let header = h.finish();

        let layout = VdistLayout::for_bins(nbins).unwrap();
        let push = |out: &mut Vec<u8>, name: &str, len: usize| {
            let start = out.len();
            out.resize(start + len * 8, 0);
            for i in 0..len {
                NativeEndian::write_f64(&mut out[start + i * 8..start + (i + 1) * 8], fill(name, i));
            }
        };

        let mut grid = header.clone();
        for s in &layout.grid {
            push(&mut grid, s.name, s.len());
        }

        let mut profile = header;
        push(&mut profile, "vbins_short", nbins);
        push(&mut profile, "vbins_long", 2 * nbins);
        for s in &layout.profile {
            push(&mut profile, s.name, s.len());
        }
        (grid, profile)
    }
}
