//! Job runner: ties together decoding, binning and spectrum fitting.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::Serialize;

use picspec_compute::{create_backend, BackendType, ComputeBackend, CpuBackend};
use picspec_core::binning::{
    aggregate_velocity_histograms, select_region, ParticleSource, RegionSelection,
    VelocityHistograms,
};
use picspec_core::spectrum::{
    background_thermal_core, decompose_with, fit_nonthermal_power_law, fit_thermal_core_with,
    maximum_energy, nonthermal_fraction, normalized_energy, thermal_budget, Decomposition,
    NonthermalFraction, PowerLawFit, SpectrumNormalization, ThermalBudget, ThermalFit,
};
use picspec_io::formats::spectrum::{read_energy_spectrum, spectrum_file_path};
use picspec_io::formats::vdist::{read_velocity_distribution, VelocityDistribution};
use picspec_io::tool_config::SpectrumToolConfig;
use picspec_io::Species;

use crate::config::{JobConfig, SpectrumConfig, VelocityConfig};

/// Velocity histograms of the configured box.
#[derive(Serialize)]
pub struct VelocityOutput {
    pub region: RegionSelection,
    pub step: u64,
    pub histograms: VelocityHistograms,
}

/// Fits of one energy spectrum.
#[derive(Serialize)]
pub struct SpectrumOutput {
    pub species: Species,
    pub frame: u32,
    pub normalization: SpectrumNormalization,
    pub energy: Vec<f64>,
    /// Energy in units of the initial thermal energy.
    pub normalized_energy: Vec<f64>,
    pub flux: Vec<f64>,
    pub thermal: ThermalFit,
    pub decomposition: Option<Decomposition>,
    pub budget: ThermalBudget,
    pub nonthermal: NonthermalFraction,
    pub power_law: Option<PowerLawFit>,
    pub background: Option<Vec<f64>>,
    pub maximum_energy: Option<f64>,
}

fn velocity_section(job: &JobConfig) -> Result<&VelocityConfig> {
    job.velocity
        .as_ref()
        .context("Job file has no [velocity] section")
}

fn spectrum_section(job: &JobConfig) -> Result<&SpectrumConfig> {
    job.spectrum
        .as_ref()
        .context("Job file has no [spectrum] section")
}

/// Bin the particles of every rank overlapping the configured box.
pub fn run_velocity(job: &JobConfig) -> Result<VelocityOutput> {
    let velocity = velocity_section(job)?;
    let descriptor = &job.simulation;

    let region = select_region(descriptor, velocity.center_di, velocity.sizes_cells);
    let step = descriptor.particle_step(velocity.frame);
    println!(
        "  Box x=[{:.2}, {:.2}] y=[{:.2}, {:.2}] z=[{:.2}, {:.2}] di",
        region.corners.bounds[0][0],
        region.corners.bounds[0][1],
        region.corners.bounds[1][0],
        region.corners.bounds[1][1],
        region.corners.bounds[2][0],
        region.corners.bounds[2][1],
    );
    println!(
        "  Ranks x={:?} y={:?} z={:?} ({} files, step {})",
        region.ranks.x,
        region.ranks.y,
        region.ranks.z,
        region.ranks.len(),
        step
    );

    let backend = build_backend(&velocity.backend, velocity.threads)?;
    println!("Backend: {}", backend.device_info().name);

    let source = ParticleSource::new(job.data.base(), velocity.prefix.as_str(), step);
    let histograms = aggregate_velocity_histograms(
        &source,
        &region.ranks,
        descriptor,
        &region.corners_de(descriptor),
        velocity.nbins,
        backend.as_ref(),
    )
    .with_context(|| format!("Velocity binning failed for step {}", step))?;

    println!("  Particles binned: {}", histograms.total());
    Ok(VelocityOutput {
        region,
        step,
        histograms,
    })
}

/// Create a compute backend from the configured name and thread count.
fn build_backend(name: &str, threads: Option<usize>) -> Result<Box<dyn ComputeBackend>> {
    let kind: BackendType = name.parse()?;
    match (kind, threads) {
        (BackendType::Cpu, Some(n)) => Ok(Box::new(CpuBackend::with_threads(n)?)),
        (kind, _) => Ok(create_backend(kind)?),
    }
}

/// Decompose the configured spectrum and fit its non-thermal tail.
pub fn run_spectrum(job: &JobConfig) -> Result<SpectrumOutput> {
    let section = spectrum_section(job)?;
    let descriptor = &job.simulation;
    let species = section.species;

    let normalization = SpectrumNormalization::new(descriptor, species);
    let path = spectrum_file_path(&job.data.spectrum_path(), species, section.frame);
    let spectrum = read_energy_spectrum(&path, species, normalization.factor())
        .with_context(|| format!("Cannot load spectrum {}", path.display()))?;
    if spectrum.is_empty() {
        anyhow::bail!("Spectrum {} has no bins", path.display());
    }
    println!("  Spectrum: {} ({} bins)", path.display(), spectrum.len());

    let energy = spectrum.energy_log;
    let flux = spectrum.flux_log;

    let thermal = match fit_thermal_core_with(&energy, &flux, &section.thermal) {
        Ok(fit) => fit,
        Err(e) if e.is_recoverable() => {
            log::warn!("Thermal fit failed ({}), using a zero thermal component", e);
            ThermalFit::zero(energy.len())
        }
        Err(e) => return Err(e).context("Thermal fit failed"),
    };

    let decomposition = match decompose_with(&energy, &flux, &section.thermal) {
        Ok(d) => Some(d),
        Err(e) => {
            log::warn!("Two-pass decomposition skipped: {}", e);
            None
        }
    };

    let budget = thermal_budget(&energy, &flux, &thermal.flux, normalization.factor());
    let nonthermal = nonthermal_fraction(&energy, &flux, &thermal.flux);
    println!(
        "  Thermal: {:.4} of particles, {:.4} of energy",
        budget.count_ratio(),
        budget.energy_ratio()
    );

    let power_law = section
        .power_law
        .map(|w| fit_nonthermal_power_law(&energy, &flux, &thermal.flux, w.offset, w.extent))
        .transpose()
        .context("Power-law fit failed")?;
    if let Some(fit) = &power_law {
        println!("  Power-law index: {:.4}", fit.slope);
    }

    let background = if section.background {
        let vth = descriptor.vth(species);
        let mass = species.mass(descriptor.mime);
        Some(
            background_thermal_core(&energy, &flux, vth, mass)
                .context("Background Maxwellian failed")?,
        )
    } else {
        None
    };

    Ok(SpectrumOutput {
        species,
        frame: section.frame,
        normalization,
        normalized_energy: normalized_energy(species, &energy, descriptor),
        maximum_energy: maximum_energy(&energy, &flux),
        energy,
        flux,
        thermal,
        decomposition,
        budget,
        nonthermal,
        power_law,
        background,
    })
}

/// Load the precomputed distributions of `species` at `frame`.
pub fn read_distribution(
    job: &JobConfig,
    species: Species,
    frame: u32,
) -> Result<VelocityDistribution> {
    let dir = job.data.vdist_path();
    read_velocity_distribution(&dir, species, frame, job.simulation.mime)
        .with_context(|| format!("Cannot load velocity distribution from {}", dir.display()))
}

/// Build the external tool's configuration from `[velocity]` and `[tool]`.
pub fn tool_config(job: &JobConfig) -> Result<SpectrumToolConfig> {
    let velocity = velocity_section(job)?;
    let tool = job
        .tool
        .as_ref()
        .context("Job file has no [tool] section")?;
    let smime = job.simulation.smime();
    let center = velocity.center_di.map(|c| c * smime);
    let sizes = velocity.sizes_cells.map(|s| s.round() as i64);
    Ok(SpectrumToolConfig::new(
        center, sizes, tool.nbins, tool.vmin, tool.vmax, tool.tframe,
    ))
}

fn create_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::File::create(path).with_context(|| format!("Cannot create {}", path.display()))
}

/// Write the three projections as `projection,row,col,ucol,urow,count` rows.
pub fn write_histograms_csv(output: &VelocityOutput, path: &Path, job: &JobConfig) -> Result<()> {
    let mut file = std::io::BufWriter::new(create_file(path)?);
    let h = &output.histograms;

    writeln!(file, "# picspec velocity histograms")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# step: {}", output.step)?;
    if let Some(v) = &job.velocity {
        writeln!(
            file,
            "# center_di: {:?}, sizes_cells: {:?}, prefix: {}",
            v.center_di, v.sizes_cells, v.prefix
        )?;
    }
    writeln!(file, "# ranks: x={:?} y={:?} z={:?}", output.region.ranks.x, output.region.ranks.y, output.region.ranks.z)?;
    writeln!(file, "#")?;
    writeln!(file, "projection,row,col,u_col,u_row,count")?;

    let centers = |edges: &ndarray::Array1<f64>| -> Vec<f64> {
        edges.windows(2).into_iter().map(|w| 0.5 * (w[0] + w[1])).collect()
    };
    let rows = centers(&h.row_edges);
    let cols = centers(&h.col_edges);
    for (name, hist) in [("xy", &h.xy), ("xz", &h.xz), ("yz", &h.yz)] {
        write_matrix(&mut file, name, hist, &rows, &cols)?;
    }
    file.flush()?;

    println!("Histograms written to: {}", path.display());
    Ok(())
}

fn write_matrix<W: Write>(
    w: &mut W,
    name: &str,
    hist: &Array2<f64>,
    rows: &[f64],
    cols: &[f64],
) -> Result<()> {
    for ((i, j), count) in hist.indexed_iter() {
        writeln!(
            w,
            "{},{},{},{:.6},{:.6},{}",
            name, i, j, cols[j], rows[i], count
        )?;
    }
    Ok(())
}

/// Write the spectrum and its fitted components column by column.
pub fn write_spectrum_csv(output: &SpectrumOutput, path: &Path) -> Result<()> {
    let mut file = std::io::BufWriter::new(create_file(path)?);

    writeln!(file, "# picspec energy spectrum")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        file,
        "# species: {}, frame: {}, normalization: {:.6e}",
        output.species.tag(),
        output.frame,
        output.normalization.factor()
    )?;
    writeln!(
        file,
        "# thermal: A={:.6e}, B={:.6e}, window=[0, {})",
        output.thermal.amplitude, output.thermal.inverse_temperature, output.thermal.window_end
    )?;
    if let Some(fit) = &output.power_law {
        writeln!(
            file,
            "# power law: index={:.6}, window=[{}, {}), number_fraction={:.6e}, energy_fraction={:.6e}",
            fit.slope, fit.start, fit.end, fit.number_fraction, fit.energy_fraction
        )?;
    }
    writeln!(file, "#")?;

    let mut header = String::from("energy,normalized_energy,flux,thermal,nonthermal");
    if output.power_law.is_some() {
        header.push_str(",power_law");
    }
    if output.background.is_some() {
        header.push_str(",background");
    }
    writeln!(file, "{}", header)?;

    for i in 0..output.energy.len() {
        let thermal = output.thermal.flux[i];
        write!(
            file,
            "{:.6e},{:.6e},{:.6e},{:.6e},{:.6e}",
            output.energy[i],
            output.normalized_energy[i],
            output.flux[i],
            thermal,
            output.flux[i] - thermal
        )?;
        if let Some(fit) = &output.power_law {
            write!(file, ",{:.6e}", fit.flux[i])?;
        }
        if let Some(bg) = &output.background {
            write!(file, ",{:.6e}", bg[i])?;
        }
        writeln!(file)?;
    }
    file.flush()?;

    println!("Spectrum written to: {}", path.display());
    Ok(())
}

/// Write the 1D parallel and perpendicular profiles of a distribution.
pub fn write_profiles_csv(dist: &VelocityDistribution, path: &Path) -> Result<()> {
    let mut file = std::io::BufWriter::new(create_file(path)?);

    writeln!(file, "# picspec velocity profiles")?;
    writeln!(
        file,
        "# species: {}, frame: {}, vmin: {}, vmax: {}, nbins: {}",
        dist.species.tag(),
        dist.frame,
        dist.vmin,
        dist.vmax,
        dist.nbins
    )?;
    writeln!(file, "#")?;
    writeln!(file, "axis,v,count")?;
    for (v, f) in dist.vbins_long.iter().zip(dist.para.iter()) {
        writeln!(file, "para,{:.6e},{:.6e}", v, f)?;
    }
    for (v, f) in dist.vbins_short.iter().zip(dist.perp.iter()) {
        writeln!(file, "perp,{:.6e},{:.6e}", v, f)?;
    }
    file.flush()?;

    println!("Profiles written to: {}", path.display());
    Ok(())
}

/// Write any result as pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let mut writer = std::io::BufWriter::new(create_file(path)?);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    writer.flush()?;

    println!("JSON written to: {}", path.display());
    Ok(())
}

/// Write the external tool's configuration file.
pub fn write_tool_config(config: &SpectrumToolConfig, path: &Path) -> Result<()> {
    let mut writer = std::io::BufWriter::new(create_file(path)?);
    config.write_to(&mut writer)?;
    writer.flush()?;
    println!("Tool configuration written to: {}", path.display());
    Ok(())
}
