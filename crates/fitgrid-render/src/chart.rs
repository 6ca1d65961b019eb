use fitgrid_core::{ChannelStats, FitnessSnapshot, SnapshotSink, Throttle};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::Channel;

pub const MEAN_LABEL: &str = "Avg: ";
pub const MINUS_DEV_LABEL: &str = "-Dev: ";
pub const PLUS_DEV_LABEL: &str = "+Dev: ";
pub const MAX_LABEL: &str = "Max: ";

/// One chart sample; `update` counts published snapshots, not chart points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub update: u64,
    pub value: f64,
}

/// A named, bounded line series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    /// Prefix plus the latest value once a point exists.
    pub name: String,
    pub points: VecDeque<ChartPoint>,
}

impl ChartSeries {
    fn new(prefix: &str) -> Self {
        Self {
            name: prefix.to_string(),
            points: VecDeque::new(),
        }
    }

    fn push(&mut self, prefix: &str, point: ChartPoint, capacity: usize) {
        self.points.push_back(point);
        while self.points.len() > capacity {
            self.points.pop_front();
        }
        self.name = format!("{prefix}{}", point.value);
    }

    #[must_use]
    pub fn last(&self) -> Option<ChartPoint> {
        self.points.back().copied()
    }
}

struct ChartState {
    channel: Channel,
    capacity: usize,
    throttle: Throttle,
    pending: Option<ChannelStats>,
    updates: u64,
    mean: ChartSeries,
    minus_dev: ChartSeries,
    plus_dev: ChartSeries,
    max: ChartSeries,
}

impl ChartState {
    fn append(&mut self) -> bool {
        let Some(stats) = self.pending.take() else {
            return false;
        };
        let update = self.updates;
        let capacity = self.capacity;
        let point = |value| ChartPoint { update, value };
        self.mean.push(MEAN_LABEL, point(stats.mean), capacity);
        self.minus_dev
            .push(MINUS_DEV_LABEL, point(stats.mean - stats.dev), capacity);
        self.plus_dev
            .push(PLUS_DEV_LABEL, point(stats.mean + stats.dev), capacity);
        self.max.push(MAX_LABEL, point(stats.max), capacity);
        true
    }
}

/// Fitness history of one channel: mean, mean -/+ deviation and maximum.
///
/// Snapshots arrive at the stats rate; at most one point per chart interval
/// is appended, carrying the most recent triple.
#[derive(Clone)]
pub struct FitnessChart {
    state: Arc<Mutex<ChartState>>,
}

impl std::fmt::Debug for FitnessChart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("FitnessChart")
            .field("channel", &state.channel)
            .field("updates", &state.updates)
            .field("points", &state.mean.points.len())
            .finish()
    }
}

impl FitnessChart {
    #[must_use]
    pub fn new(channel: Channel, interval: Duration, capacity: usize) -> Self {
        let state = ChartState {
            channel,
            capacity: capacity.max(1),
            throttle: Throttle::new(interval),
            pending: None,
            updates: 0,
            mean: ChartSeries::new(MEAN_LABEL),
            minus_dev: ChartSeries::new(MINUS_DEV_LABEL),
            plus_dev: ChartSeries::new(PLUS_DEV_LABEL),
            max: ChartSeries::new(MAX_LABEL),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a `[mean, dev, max]` triple for the next chart point.
    pub fn schedule_update(&self, stats: ChannelStats) {
        let mut state = self.state();
        trace!(mean = stats.mean, dev = stats.dev, max = stats.max, "chart update");
        state.updates += 1;
        state.pending = Some(stats);
    }

    /// Snapshots received so far.
    #[must_use]
    pub fn updates(&self) -> u64 {
        self.state().updates
    }

    /// `[mean, -dev, +dev, max]` series, in legend order.
    #[must_use]
    pub fn series(&self) -> [ChartSeries; 4] {
        let state = self.state();
        [
            state.mean.clone(),
            state.minus_dev.clone(),
            state.plus_dev.clone(),
            state.max.clone(),
        ]
    }
}

impl SnapshotSink for FitnessChart {
    fn on_snapshot(&mut self, snapshot: &FitnessSnapshot) {
        let stats = self.state().channel.stats(snapshot);
        self.schedule_update(stats);
    }

    fn on_tick(&mut self, now: Instant) {
        let mut state = self.state();
        if state.pending.is_some() && state.throttle.ready(now) {
            state.append();
        }
    }

    fn on_stop(&mut self) {
        let mut state = self.state();
        if state.append() {
            debug!(
                channel = state.channel.label(),
                updates = state.updates,
                "appended final chart point"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(mean: f64, dev: f64, max: f64) -> ChannelStats {
        ChannelStats { mean, dev, max }
    }

    #[test]
    fn coalesces_updates_between_points() {
        let mut chart = FitnessChart::new(Channel::Actual, Duration::from_millis(500), 10);
        let start = Instant::now();
        chart.on_tick(start);
        chart.schedule_update(stats(0.2, 0.1, 0.5));
        chart.schedule_update(stats(0.4, 0.1, 0.6));
        chart.on_tick(start + Duration::from_millis(100));
        assert!(chart.series()[0].points.is_empty());
        chart.on_tick(start + Duration::from_millis(400));
        assert!(chart.series()[0].points.is_empty());

        chart.on_tick(start + Duration::from_millis(600));
        let [mean, minus, plus, max] = chart.series();
        assert_eq!(mean.points.len(), 1);
        assert_eq!(mean.last(), Some(ChartPoint { update: 2, value: 0.4 }));
        assert!((minus.last().expect("point").value - 0.3).abs() < 1e-12);
        assert!((plus.last().expect("point").value - 0.5).abs() < 1e-12);
        assert_eq!(max.name, "Max: 0.6");
        assert_eq!(mean.name, "Avg: 0.4");
    }

    #[test]
    fn history_is_truncated_from_the_front() {
        let mut chart = FitnessChart::new(Channel::Guidance, Duration::from_millis(1), 3);
        for update in 0..5 {
            chart.schedule_update(stats(update as f64, 0.0, 1.0));
            chart.on_stop();
        }
        let mean = chart.series()[0].clone();
        let updates: Vec<u64> = mean.points.iter().map(|p| p.update).collect();
        assert_eq!(updates, vec![3, 4, 5]);
    }

    #[test]
    fn follows_the_configured_channel() {
        let mut chart = FitnessChart::new(Channel::Guidance, Duration::from_millis(1), 10);
        let snapshot = FitnessSnapshot {
            guidance: stats(0.7, 0.05, 0.9),
            actual: stats(0.1, 0.01, 0.2),
            sample_size: 3,
            sequence: 1,
        };
        chart.on_snapshot(&snapshot);
        chart.on_stop();
        assert_eq!(chart.series()[3].last().map(|p| p.value), Some(0.9));
        assert_eq!(chart.updates(), 1);
        chart.on_stop();
        assert_eq!(chart.series()[0].points.len(), 1, "no data, no new point");
    }
}
