//! Observer hooks that end a run early.

use fitgrid_core::{GridPos, IndividualRef, PopulationObserver};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Shared flag telling producers to stop.
pub type StopSignal = Arc<AtomicBool>;

/// Raises the stop signal when a perfect individual is placed.
#[derive(Debug, Clone)]
pub struct StopOnPerfect {
    signal: StopSignal,
}

impl StopOnPerfect {
    #[must_use]
    pub fn new(signal: StopSignal) -> Self {
        Self { signal }
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.signal.load(Ordering::Acquire)
    }
}

impl PopulationObserver for StopOnPerfect {
    fn on_set(&mut self, individual: &IndividualRef) {
        if individual.fitness().is_perfect() && !self.signal.swap(true, Ordering::AcqRel) {
            info!(pos = %individual.position(), "perfect individual found; stopping as requested");
        }
    }

    fn on_remove(&mut self, _pos: GridPos) {}
}
