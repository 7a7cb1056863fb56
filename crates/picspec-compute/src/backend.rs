//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over the execution strategy for
//! multi-file reductions so that the binning code in `picspec-core` stays
//! independent of how (and on how many threads) the per-file work runs.

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;

use ndarray::Array3;
use thiserror::Error;

/// Error type returned by an individual reduction task.
pub type TaskError = Box<dyn StdError + Send + Sync + 'static>;

/// A reduction task: produces the partial result for task index `i`.
pub type ReduceTask<'a> = dyn Fn(usize) -> Result<Array3<f64>, TaskError> + Send + Sync + 'a;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Task {task} returned shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        task: usize,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    #[error("Task {task} failed: {source}")]
    TaskFailed {
        task: usize,
        #[source]
        source: TaskError,
    },
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub compute_units: Option<usize>,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    Serial,
    #[default]
    Cpu,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Serial => write!(f, "serial"),
            BackendType::Cpu => write!(f, "cpu"),
        }
    }
}

impl FromStr for BackendType {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(BackendType::Serial),
            "cpu" | "rayon" => Ok(BackendType::Cpu),
            other => Err(ComputeError::Unavailable(format!(
                "Unknown backend '{}'. Use 'serial' or 'cpu'.",
                other
            ))),
        }
    }
}

/// Abstraction over execution backends.
///
/// Implementations evaluate every task and combine the partial arrays with an
/// element-wise sum. Either all tasks succeed and the full sum is returned,
/// or the first observed failure is returned and no partial sum escapes.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Evaluate `task(i)` for `i` in `0..n_tasks` and sum the results.
    ///
    /// Every partial result must have exactly `shape`; `n_tasks == 0` yields
    /// zeros.
    fn parallel_sum(
        &self,
        shape: (usize, usize, usize),
        n_tasks: usize,
        task: &ReduceTask<'_>,
    ) -> Result<Array3<f64>, ComputeError>;
}

/// Run one task and check its shape.
pub(crate) fn run_task(
    shape: (usize, usize, usize),
    index: usize,
    task: &ReduceTask<'_>,
) -> Result<Array3<f64>, ComputeError> {
    let partial = task(index).map_err(|source| ComputeError::TaskFailed {
        task: index,
        source,
    })?;
    if partial.dim() != shape {
        return Err(ComputeError::ShapeMismatch {
            task: index,
            expected: shape,
            actual: partial.dim(),
        });
    }
    Ok(partial)
}

/// CPU backend that runs tasks one after another in index order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "CPU (serial)".into(),
            backend_type: BackendType::Serial,
            compute_units: Some(1),
        }
    }

    fn parallel_sum(
        &self,
        shape: (usize, usize, usize),
        n_tasks: usize,
        task: &ReduceTask<'_>,
    ) -> Result<Array3<f64>, ComputeError> {
        let mut total = Array3::zeros(shape);
        for i in 0..n_tasks {
            let partial = run_task(shape, i, task)?;
            total += &partial;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl StdError for Boom {}

    #[test]
    fn test_serial_sum() {
        let total = SerialBackend
            .parallel_sum((1, 2, 2), 4, &|i| Ok(Array3::from_elem((1, 2, 2), i as f64)))
            .unwrap();
        assert!(total.iter().all(|&v| v == 6.0));
    }

    #[test]
    fn test_serial_empty_is_zero() {
        let total = SerialBackend
            .parallel_sum((2, 3, 3), 0, &|_| unreachable!())
            .unwrap();
        assert_eq!(total.dim(), (2, 3, 3));
        assert!(total.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_serial_failure_carries_source() {
        let err = SerialBackend
            .parallel_sum((1, 1, 1), 3, &|i| {
                if i == 1 {
                    Err(Box::new(Boom) as TaskError)
                } else {
                    Ok(Array3::zeros((1, 1, 1)))
                }
            })
            .unwrap_err();
        match err {
            ComputeError::TaskFailed { task, source } => {
                assert_eq!(task, 1);
                assert!(source.downcast_ref::<Boom>().is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let err = SerialBackend
            .parallel_sum((1, 2, 2), 1, &|_| Ok(Array3::zeros((1, 3, 3))))
            .unwrap_err();
        assert!(matches!(err, ComputeError::ShapeMismatch { task: 0, .. }));
    }

    #[test]
    fn test_backend_type_parse() {
        assert_eq!("serial".parse::<BackendType>().unwrap(), BackendType::Serial);
        assert_eq!("CPU".parse::<BackendType>().unwrap(), BackendType::Cpu);
        assert!("gpu".parse::<BackendType>().is_err());
    }
}
