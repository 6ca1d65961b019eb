//! Tracker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::stats::MIN_SAMPLE_SIZE;

/// Errors that can occur when constructing or running a tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The observing thread could not be started.
    #[error("observer worker error: {0}")]
    Worker(String),
}

/// Static configuration for one tracked population grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Grid width (number of x positions).
    pub size_x: usize,
    /// Grid height (number of y positions).
    pub size_y: usize,
    /// Fewest occupied cells for which statistics are published.
    pub min_sample_size: usize,
    /// Highest rate (Hz) at which statistics snapshots are published.
    ///
    /// Grid views repaint from observer events on their own cadence, so this
    /// only bounds snapshot delivery to charts and listeners.
    pub stats_rate_hz: f64,
    /// Highest rate (Hz) at which grid views repaint.
    pub grid_redraw_rate_hz: f64,
    /// Highest rate (Hz) at which chart points are appended.
    pub chart_rate_hz: f64,
    /// Points retained per chart series.
    pub chart_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            size_x: 32,
            size_y: 32,
            min_sample_size: MIN_SAMPLE_SIZE,
            stats_rate_hz: 2.0,
            grid_redraw_rate_hz: 24.0,
            chart_rate_hz: 2.0,
            chart_capacity: 1_000,
        }
    }
}

impl TrackerConfig {
    /// Default configuration for a `size_x * size_y` grid.
    #[must_use]
    pub fn with_size(size_x: usize, size_y: usize) -> Self {
        Self {
            size_x,
            size_y,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.size_x == 0 || self.size_y == 0 {
            return Err(TrackerError::InvalidConfig(
                "population grid dimensions must be non-zero",
            ));
        }
        if self.size_x.checked_mul(self.size_y).is_none() {
            return Err(TrackerError::InvalidConfig(
                "population grid dimensions overflow",
            ));
        }
        if self.min_sample_size < 2 {
            return Err(TrackerError::InvalidConfig(
                "min_sample_size must be at least 2",
            ));
        }
        for rate in [self.stats_rate_hz, self.grid_redraw_rate_hz, self.chart_rate_hz] {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(TrackerError::InvalidConfig(
                    "update rates must be positive and finite",
                ));
            }
        }
        if self.chart_capacity == 0 {
            return Err(TrackerError::InvalidConfig(
                "chart_capacity must be non-zero",
            ));
        }
        Ok(())
    }

    /// Minimum spacing between statistics snapshots.
    #[must_use]
    pub fn stats_interval(&self) -> Duration {
        interval_for(self.stats_rate_hz)
    }

    /// Minimum spacing between grid repaints.
    #[must_use]
    pub fn grid_redraw_interval(&self) -> Duration {
        interval_for(self.grid_redraw_rate_hz)
    }

    /// Minimum spacing between chart points.
    #[must_use]
    pub fn chart_interval(&self) -> Duration {
        interval_for(self.chart_rate_hz)
    }
}

fn interval_for(rate_hz: f64) -> Duration {
    Duration::from_secs_f64(1.0 / rate_hz)
}
