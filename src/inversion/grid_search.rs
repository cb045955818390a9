//! Parallel evaluation of independent grid points.
//!
//! Every hypothesis owns its scratch matrices and writes only its own slot, so
//! the search is a plain indexed `par_iter`. Results come back in grid order
//! regardless of how many worker threads ran, which keeps the later
//! argmin/argmax selection reproducible.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{InversionError, InversionResult};

/// Per-point results of one grid search, in the order the points were given.
#[derive(Debug, Clone)]
pub struct GridSearchOutcome<T> {
    pub results: Vec<Option<T>>,
    pub failed: usize,
}

impl<T> GridSearchOutcome<T> {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// The aggregate failure to report once partial results have been stored.
    pub fn status(&self) -> InversionResult<()> {
        if self.failed == 0 {
            Ok(())
        } else {
            Err(InversionError::GridSearch {
                failed: self.failed,
                total: self.total(),
            })
        }
    }
}

/// Evaluate `solve` at every point in parallel.
///
/// A failing point is logged and left as `None`; the search always runs to
/// completion.
pub fn search<P, T, F>(label: &str, points: &[P], solve: F) -> GridSearchOutcome<T>
where
    P: Sync,
    T: Send,
    F: Fn(&P) -> InversionResult<T> + Sync,
{
    let results: Vec<Option<T>> = points
        .par_iter()
        .enumerate()
        .map(|(idx, point)| match solve(point) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(search = label, point = idx, error = %e, "grid point failed");
                None
            }
        })
        .collect();

    let failed = results.iter().filter(|r| r.is_none()).count();
    if failed > 0 {
        warn!(search = label, failed, total = points.len(), "errors detected during grid search");
    } else {
        debug!(search = label, total = points.len(), "grid search complete");
    }
    GridSearchOutcome { results, failed }
}
