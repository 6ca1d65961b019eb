//! Adapters between a running search and the fitness tracker: export,
//! filtering, stop hooks, snapshot channel and a synthetic producer.

pub mod channel;
pub mod export;
pub mod filter;
pub mod hooks;
pub mod producer;
pub mod progress;

use fitgrid_core::FitnessTracker;
use std::sync::Arc;

pub use channel::{ChannelSink, SnapshotReceiver, SnapshotSender, create_snapshot_bus, drain_snapshots};
pub use export::{ExportCandidate, ExportError, export_best_fit, format_controller, select_smallest};
pub use filter::{AvgFilter, IndividualFilter, run_filter_round};
pub use hooks::{StopOnPerfect, StopSignal};
pub use producer::{ProducerConfig, ProducerReport, run_producer};
pub use progress::{ProgressCallback, ProgressUpdater};

/// Tracker handle shared between producer threads and the driver.
pub type SharedTracker = Arc<FitnessTracker>;
