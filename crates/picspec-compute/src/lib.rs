//! # picspec Compute
//!
//! Execution backends for reductions over many independent inputs, such as
//! summing velocity histograms over the particle files of a rank block. This
//! crate provides a [`ComputeBackend`](backend::ComputeBackend) trait so the
//! binning code does not depend on how the work is scheduled.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Status |
//! |---------|-------------|--------|
//! | Serial | always | Implemented |
//! | CPU (Rayon) | `cpu` (default) | Implemented |

pub mod backend;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{
    BackendType, ComputeBackend, ComputeError, DeviceInfo, ReduceTask, SerialBackend, TaskError,
};

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;

/// Construct the backend named by `kind`.
pub fn create_backend(kind: BackendType) -> Result<Box<dyn ComputeBackend>, ComputeError> {
    match kind {
        BackendType::Serial => Ok(Box::new(SerialBackend)),
        #[cfg(feature = "cpu")]
        BackendType::Cpu => Ok(Box::new(CpuBackend::new())),
        #[cfg(not(feature = "cpu"))]
        BackendType::Cpu => Err(ComputeError::Unavailable(
            "CPU backend requires the `cpu` feature".into(),
        )),
    }
}
