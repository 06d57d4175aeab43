//! Bounded parallel iteration.
//!
//! Wraps rayon's `par_iter` so that at most `max_concurrent` items are in flight,
//! which caps peak memory when each item loads a full set of tiles.

use rayon::prelude::*;

/// Maps `f` over `items` in parallel with at most `max_concurrent` items in flight.
///
/// Results keep the input order. Stops after the first chunk that contains an
/// error and returns the error of the lowest-indexed failing item in that chunk.
///
/// # Panics
///
/// Panics if `max_concurrent` is 0.
pub fn try_par_map_limited<T, R, E, F>(
    items: &[T],
    max_concurrent: usize,
    f: F,
) -> Result<Vec<R>, E>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(&T) -> Result<R, E> + Sync,
{
    assert!(max_concurrent > 0, "max_concurrent must be > 0");

    let mut results = Vec::with_capacity(items.len());
    for chunk in items.chunks(max_concurrent) {
        let chunk_results: Vec<Result<R, E>> = chunk.par_iter().map(&f).collect();
        for result in chunk_results {
            results.push(result?);
        }
    }
    Ok(results)
}
