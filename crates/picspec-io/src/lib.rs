//! # picspec I/O
//!
//! Decoders for the files a PIC run leaves behind. This crate provides:
//!
//! - **Particle dumps** ([`formats::particle`]) — boilerplate, versioned
//!   header and fixed-size particle records written per MPI rank.
//! - **Velocity distributions** ([`formats::vdist`]) — precomputed 2D/1D
//!   velocity-space histograms produced by the external spectrum tool.
//! - **Energy spectra** ([`formats::spectrum`]) — four-column text tables of
//!   linear and logarithmic energy bins.
//! - **Layout schemas** ([`formats::schema`]) — the single source of byte
//!   offsets for every fixed binary block.
//! - **Tool configuration** ([`tool_config`]) — the key/value file consumed
//!   by the external spectrum executable.

pub mod formats;
pub mod tool_config;

pub use formats::{DecodeError, Species};
