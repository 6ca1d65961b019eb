//! Selection of the individuals tied for the highest actual fitness.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::{IndividualRef, PopulationGrid};

/// Errors raised when a selection result cannot be used.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SelectionError {
    /// The grid held no individual at all, so there is nothing to export.
    #[error("the population grid holds no individuals")]
    EmptySelection,
}

/// All occupants sharing the maximum actual fitness, in scan order.
///
/// Occupants without a finite actual fitness count as `0.0`. The result is
/// empty only when the grid is empty.
#[must_use]
pub fn best_fit(grid: &PopulationGrid) -> Vec<IndividualRef> {
    let mut best_value = f64::NEG_INFINITY;
    let mut best = Vec::new();
    for individual in grid.iter_occupied() {
        let value = individual.fitness().actual_or_zero();
        if value > best_value {
            best.clear();
            best_value = value;
            best.push(Arc::clone(individual));
        } else if value == best_value {
            best.push(Arc::clone(individual));
        }
    }
    if best.len() > 1 {
        debug!(fitness = best_value, count = best.len(), "several individuals tied for best fit");
    }
    best
}

/// Turn an empty selection into [`SelectionError::EmptySelection`].
pub fn non_empty(selection: Vec<IndividualRef>) -> Result<Vec<IndividualRef>, SelectionError> {
    if selection.is_empty() {
        Err(SelectionError::EmptySelection)
    } else {
        Ok(selection)
    }
}
