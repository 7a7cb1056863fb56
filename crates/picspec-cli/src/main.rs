//! picspec command-line interface.
//!
//! Analyse PIC particle output from TOML job files:
//! ```sh
//! picspec vdist job.toml
//! picspec spectrum job.toml
//! picspec read-vdist job.toml --species e --frame 10
//! picspec tool-config job.toml
//! picspec validate job.toml
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "picspec")]
#[command(about = "picspec: velocity distributions and energy spectra of PIC particle output")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bin particle velocities inside the `[velocity]` box.
    Vdist {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fit the thermal core and non-thermal tail of the `[spectrum]` spectrum.
    Spectrum {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Read distributions precomputed by the external spectrum tool.
    ReadVdist {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Species tag or name (e, h, electron, ion).
        #[arg(short, long)]
        species: String,
        /// Output frame.
        #[arg(short, long)]
        frame: u32,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the configuration file of the external spectrum tool.
    ToolConfig {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Destination (default: config_files/vdist_config.dat).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running anything.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Vdist { config, output } => {
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_velocity(&job)?;
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            runner::write_histograms_csv(&result, &out_dir.join("vdist.csv"), &job)?;
            if job.output.save_json {
                runner::write_json(&result, &out_dir.join("vdist.json"))?;
            }

            println!("Velocity binning complete.");
            Ok(())
        }
        Commands::Spectrum { config, output } => {
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_spectrum(&job)?;
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            let stem = format!("spectrum-{}.{}", result.species.tag(), result.frame);
            runner::write_spectrum_csv(&result, &out_dir.join(format!("{}.csv", stem)))?;
            if job.output.save_json {
                runner::write_json(&result, &out_dir.join(format!("{}.json", stem)))?;
            }

            println!("Spectrum analysis complete.");
            Ok(())
        }
        Commands::ReadVdist {
            config,
            species,
            frame,
            output,
        } => {
            let job = config::load_config(&config)?;
            let species = config::parse_species(&species)?;

            let dist = runner::read_distribution(&job, species, frame)?;
            println!(
                "Distribution: {} bins, v in [{}, {}]",
                dist.nbins, dist.vmin, dist.vmax
            );
            if let Some(range) = dist.range_2d {
                println!("  2D non-zero range: [{:.4e}, {:.4e}]", range.min, range.max);
            }
            if let Some(range) = dist.range_1d {
                println!("  1D non-zero range: [{:.4e}, {:.4e}]", range.min, range.max);
            }

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            let stem = format!("vdist-{}.{}", species.tag(), frame);
            runner::write_profiles_csv(&dist, &out_dir.join(format!("{}.csv", stem)))?;
            if job.output.save_json {
                runner::write_json(&dist, &out_dir.join(format!("{}.json", stem)))?;
            }
            Ok(())
        }
        Commands::ToolConfig { config, output } => {
            let job = config::load_config(&config)?;
            let tool = runner::tool_config(&job)?;
            let path = output.unwrap_or_else(|| {
                job.data
                    .base()
                    .join("config_files")
                    .join("vdist_config.dat")
            });
            runner::write_tool_config(&tool, &path)?;
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            println!("Configuration is valid: {}", config.display());
            println!(
                "  Grid {}x{}x{}, topology {}x{}x{} ({} ranks)",
                job.simulation.nx,
                job.simulation.ny,
                job.simulation.nz,
                job.simulation.topology_x,
                job.simulation.topology_y,
                job.simulation.topology_z,
                job.simulation.num_ranks()
            );
            for (name, present) in [
                ("velocity", job.velocity.is_some()),
                ("spectrum", job.spectrum.is_some()),
                ("tool", job.tool.is_some()),
            ] {
                println!("  [{}]: {}", name, if present { "yes" } else { "no" });
            }
            Ok(())
        }
    }
}
