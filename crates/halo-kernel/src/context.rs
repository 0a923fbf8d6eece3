//! Per-call kernel context.

use rayon::ThreadPool;

use crate::params::SearchParams;

/// Everything a kernel may consult besides its explicit arguments.
///
/// Kernels may parallelise internally by running work inside
/// [`install`](Self::install); the orchestrator itself stays
/// single-threaded and calls kernels one at a time.
pub struct KernelContext<'a> {
    params: &'a SearchParams,
    pool: &'a ThreadPool,
}

impl<'a> KernelContext<'a> {
    /// Bundle parameters with the rank's thread pool.
    pub fn new(params: &'a SearchParams, pool: &'a ThreadPool) -> Self {
        Self { params, pool }
    }

    /// Resolved search parameters.
    pub fn params(&self) -> &SearchParams {
        self.params
    }

    /// Number of worker threads available to kernels.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` inside the rank's thread pool.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::ThreadPoolBuilder;

    #[test]
    fn install_runs_on_pool() {
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let params = SearchParams::default();
        let ctx = KernelContext::new(&params, &pool);
        assert_eq!(ctx.threads(), 2);
        let sum: u64 = ctx.install(|| {
            use rayon::prelude::*;
            (1..=100u64).into_par_iter().sum()
        });
        assert_eq!(sum, 5050);
    }
}
