use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Controls how frame-wise operations are executed.
///
/// Frames are independent, so both strategies produce identical results in the
/// same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionStrategy {
    /// Run sequentially on the current thread.
    ///
    /// Keeps per-frame log messages in frame order.
    #[default]
    Serial,

    /// Use the global Rayon thread pool to process frames in parallel.
    Parallel,
}

/// Apply `f` to every frame index in `0..n_frames` and collect the results in order.
pub fn map_frames<T, F>(n_frames: usize, strategy: ExecutionStrategy, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    match strategy {
        ExecutionStrategy::Serial => (0..n_frames).map(f).collect(),
        ExecutionStrategy::Parallel => (0..n_frames).into_par_iter().map(f).collect(),
    }
}

/// Fallible version of [`map_frames`].
///
/// The first error aborts the whole batch and no partial output is returned.
pub fn try_map_frames<T, E, F>(
    n_frames: usize,
    strategy: ExecutionStrategy,
    f: F,
) -> Result<Vec<T>, E>
where
    T: Send,
    E: Send,
    F: Fn(usize) -> Result<T, E> + Send + Sync,
{
    match strategy {
        ExecutionStrategy::Serial => (0..n_frames).map(f).collect(),
        ExecutionStrategy::Parallel => (0..n_frames).into_par_iter().map(f).collect(),
    }
}
