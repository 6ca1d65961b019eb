//! Headless sinks for the fitgrid observation pipeline.
//!
//! [`GridView`] paints one colour per population cell and [`FitnessChart`]
//! keeps the statistics history. Both are cheap cloneable handles: register a
//! clone with the tracker and keep another to read frames and series.

mod chart;
mod grid_view;

use serde::{Deserialize, Serialize};

pub use chart::{ChartPoint, ChartSeries, FitnessChart, MEAN_LABEL, MAX_LABEL, MINUS_DEV_LABEL, PLUS_DEV_LABEL};
pub use grid_view::{CellColor, GridFrame, GridView, TARGET_RANGE};

/// Which fitness channel a sink follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// The exact fitness the search tries to drive to 1.0.
    #[default]
    Actual,
    /// The steering over-estimate.
    Guidance,
}

impl Channel {
    /// Value of this channel for one fitness; uncomputable actual fitness is `0.0`.
    #[must_use]
    pub fn of(self, fitness: &fitgrid_core::Fitness) -> f64 {
        match self {
            Self::Actual => fitness.actual_or_zero(),
            Self::Guidance => fitness.guidance(),
        }
    }

    /// Statistics of this channel in a published snapshot.
    #[must_use]
    pub const fn stats(self, snapshot: &fitgrid_core::FitnessSnapshot) -> fitgrid_core::ChannelStats {
        match self {
            Self::Actual => snapshot.actual,
            Self::Guidance => snapshot.guidance,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Actual => "actual",
            Self::Guidance => "guidance",
        }
    }
}
