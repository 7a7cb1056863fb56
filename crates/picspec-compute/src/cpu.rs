//! CPU compute backend using Rayon for shared-memory parallelism.

use ndarray::Array3;
use rayon::prelude::*;

use crate::backend::{run_task, BackendType, ComputeBackend, ComputeError, DeviceInfo, ReduceTask};

/// CPU backend that parallelises work across threads via Rayon.
pub struct CpuBackend {
    num_threads: usize,
    pool: Option<rayon::ThreadPool>,
}

impl CpuBackend {
    /// Create a new CPU backend using the global Rayon pool.
    pub fn new() -> Self {
        Self {
            num_threads: rayon::current_num_threads(),
            pool: None,
        }
    }

    /// Create a CPU backend with a dedicated pool of `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| ComputeError::Unavailable(e.to_string()))?;
        Ok(Self {
            num_threads: pool.current_num_threads(),
            pool: Some(pool),
        })
    }

    fn reduce(
        shape: (usize, usize, usize),
        n_tasks: usize,
        task: &ReduceTask<'_>,
    ) -> Result<Array3<f64>, ComputeError> {
        (0..n_tasks)
            .into_par_iter()
            .map(|i| run_task(shape, i, task))
            .try_reduce(
                || Array3::zeros(shape),
                |mut acc, partial| {
                    acc += &partial;
                    Ok(acc)
                },
            )
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            backend_type: BackendType::Cpu,
            compute_units: Some(self.num_threads),
        }
    }

    fn parallel_sum(
        &self,
        shape: (usize, usize, usize),
        n_tasks: usize,
        task: &ReduceTask<'_>,
    ) -> Result<Array3<f64>, ComputeError> {
        match &self.pool {
            Some(pool) => pool.install(|| Self::reduce(shape, n_tasks, task)),
            None => Self::reduce(shape, n_tasks, task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SerialBackend;

    fn partial(i: usize) -> Array3<f64> {
        Array3::from_shape_fn((3, 4, 4), |(p, r, c)| ((i + 1) * (p + 2 * r + 3 * c)) as f64)
    }

    #[test]
    fn test_matches_serial() {
        let task = |i: usize| -> Result<Array3<f64>, crate::backend::TaskError> { Ok(partial(i)) };
        let serial = SerialBackend.parallel_sum((3, 4, 4), 17, &task).unwrap();
        let cpu = CpuBackend::new().parallel_sum((3, 4, 4), 17, &task).unwrap();
        assert_eq!(serial, cpu);
    }

    #[test]
    fn test_dedicated_pool() {
        let backend = CpuBackend::with_threads(2).unwrap();
        assert_eq!(backend.device_info().compute_units, Some(2));
        let total = backend
            .parallel_sum((1, 1, 1), 10, &|_| Ok(Array3::ones((1, 1, 1))))
            .unwrap();
        assert_eq!(total[[0, 0, 0]], 10.0);
    }

    #[test]
    fn test_failure_aborts() {
        let err = CpuBackend::new()
            .parallel_sum((1, 1, 1), 8, &|i| {
                if i == 5 {
                    Err("bad file".into())
                } else {
                    Ok(Array3::zeros((1, 1, 1)))
                }
            })
            .unwrap_err();
        assert!(matches!(err, ComputeError::TaskFailed { task: 5, .. }));
    }
}
