//! # picspec Core
//!
//! Physics-facing analysis of PIC particle output. This crate turns decoded
//! particle dumps and energy spectra into velocity histograms and
//! thermal / non-thermal spectrum decompositions.
//!
//! ## Architecture
//!
//! Decoding lives in `picspec-io`; this crate only consumes decoded data and
//! a read-only [`types::SimulationDescriptor`]. Multi-file reductions run
//! through a `picspec_compute::ComputeBackend` so the same code path serves
//! serial and Rayon execution.
//!
//! ## Modules
//!
//! - [`types`] — Simulation descriptor and region corners.
//! - [`binning`] — Particle positions, velocity histograms, rank selection
//!   and multi-file aggregation.
//! - [`fitting`] — Small numerical kernels (Levenberg–Marquardt, linear
//!   least squares, smoothing).
//! - [`spectrum`] — Accumulated spectra, Maxwellian and power-law fits,
//!   decomposition and particle/energy budgets.

pub mod binning;
pub mod fitting;
pub mod spectrum;
pub mod types;
