/* ************************************************************************ **
** This file is part of kdots, and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of kdots is provided under this permissive license,**
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

use kdots_core::Complex64;
use kdots_mesh::Edge;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Observer of an overlap run.
///
/// Called from worker threads, in no particular order.
pub trait Progress: Sync {
    /// An edge has been computed.
    fn task_done(&self, _edge: &Edge, _elapsed: Duration) {}

    /// One overlap, before normalization.
    fn cell(&self, _edge: &Edge, _i: usize, _j: usize, _value: Complex64) {}
}

/// Ignores everything.
#[derive(Debug, Copy, Clone, Default)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Reports to the `log` facade; edges at debug level, cells at trace level.
#[derive(Debug, Default)]
pub struct LogProgress {
    total: usize,
    done: AtomicUsize,
}

impl LogProgress {
    /// `total` is the number of edges that will be reported.
    pub fn new(total: usize) -> Self
    { LogProgress { total, done: AtomicUsize::new(0) } }

    pub fn done(&self) -> usize
    { self.done.load(Ordering::SeqCst) }
}

impl Progress for LogProgress {
    fn task_done(&self, edge: &Edge, elapsed: Duration) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Finished k-point {:>4}, neighbor {:>4} in {:>6.2}s ({}/{})",
            edge.point, edge.neighbor, elapsed.as_secs_f64(), done, self.total,
        );
    }

    fn cell(&self, edge: &Edge, i: usize, j: usize, value: Complex64) {
        trace!("\t{}\t{}\t{}\t{}\t{}", edge.point, i, edge.direction, j, value);
    }
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    use super::*;

    #[test]
    fn counts_edges() {
        let progress = LogProgress::new(2);
        let edge = Edge { point: 0, direction: 0, neighbor: 1, reverse: 1 };
        progress.task_done(&edge, Duration::from_millis(3));
        progress.task_done(&edge.flip(), Duration::from_millis(3));
        progress.cell(&edge, 0, 0, Complex64::new(1.0, 0.0));
        assert_eq!(progress.done(), 2);
    }
}
