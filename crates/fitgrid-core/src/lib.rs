//! Population fitness tracking for grid-structured genetic programming runs.
//!
//! Producer threads report individuals settling into and leaving cells of a
//! fixed 2-D grid. The [`FitnessTracker`] keeps the grid, selects the best-fit
//! individuals on demand and, while observing, publishes throttled
//! [`FitnessSnapshot`]s to registered sinks.

mod config;
mod expr;
mod fitness;
mod grid;
mod individual;
mod scaling;
mod selection;
mod sink;
mod stats;
mod tracker;

pub use config::{TrackerConfig, TrackerError};
pub use expr::{BinaryOp, Expr};
pub use fitness::{Fitness, NO_SCALE, NO_SHIFT};
pub use grid::PopulationGrid;
pub use individual::{Candidate, GridPos, Individual, IndividualRef, same_individual};
pub use scaling::{apply_affine, apply_scaling};
pub use selection::{SelectionError, best_fit, non_empty};
pub use sink::{CellValue, NullSink, PopulationObserver, SnapshotListener, SnapshotSink, Throttle};
pub use stats::{Aggregator, ChannelStats, CompensatedSum, FitnessSnapshot, MIN_SAMPLE_SIZE};
pub use tracker::FitnessTracker;
