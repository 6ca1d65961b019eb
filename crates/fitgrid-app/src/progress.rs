//! Progress reporting for parallel work.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Receives `(current, total)` after every completed step.
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Step counter shared by parallel workers.
///
/// The callback runs under the counter lock, so reports arrive in order.
pub struct ProgressUpdater {
    total: usize,
    current: Mutex<usize>,
    callback: ProgressCallback,
}

impl fmt::Debug for ProgressUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressUpdater")
            .field("total", &self.total)
            .field("current", &self.current())
            .finish()
    }
}

impl ProgressUpdater {
    #[must_use]
    pub fn new(total: usize, callback: ProgressCallback) -> Self {
        Self {
            total,
            current: Mutex::new(0),
            callback,
        }
    }

    /// Count one finished step and report it.
    pub fn update(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += 1;
        (self.callback)(*current, self.total);
    }

    #[must_use]
    pub fn current(&self) -> usize {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::sync::Arc;

    #[test]
    fn parallel_updates_report_every_step_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let updater = ProgressUpdater::new(
            64,
            Box::new(move |current, total| sink.lock().expect("lock").push((current, total))),
        );
        (0..64).into_par_iter().for_each(|_| updater.update());

        assert_eq!(updater.current(), 64);
        let seen = seen.lock().expect("lock").clone();
        let expected: Vec<_> = (1..=64).map(|i| (i, 64)).collect();
        assert_eq!(seen, expected);
    }
}
