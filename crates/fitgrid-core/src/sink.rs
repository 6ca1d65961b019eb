//! Downstream contracts: who hears about grid mutations and published statistics.

use std::time::{Duration, Instant};

use crate::{FitnessSnapshot, GridPos, IndividualRef};

/// Value a grid-cell renderer shows for one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Empty,
    Occupied(f64),
}

/// Side effect run under the tracker lock for every grid mutation.
///
/// Implementations must not call back into the tracker.
pub trait PopulationObserver: Send {
    fn on_set(&mut self, individual: &IndividualRef);

    fn on_remove(&mut self, pos: GridPos);
}

/// Consumer of published statistics, driven by the observing thread.
pub trait SnapshotSink: Send {
    fn on_snapshot(&mut self, snapshot: &FitnessSnapshot);

    /// Called on every pipeline tick so sinks can pace their own output.
    fn on_tick(&mut self, _now: Instant) {}

    /// Called once, after the final flush, when observing stops.
    fn on_stop(&mut self) {}
}

/// No-op sink.
#[derive(Debug, Default)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn on_snapshot(&mut self, _snapshot: &FitnessSnapshot) {}
}

/// Callback installed with `FitnessTracker::set_snapshot_listener`.
pub type SnapshotListener = Box<dyn FnMut(&FitnessSnapshot) + Send>;

/// Minimum-interval gate for periodic work.
///
/// The first call only arms the gate, mirroring a frame timer whose first
/// frame has no predecessor to measure against.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether at least one interval has elapsed since the last firing.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            None => {
                self.last = Some(now);
                false
            }
            Some(prev) if now.saturating_duration_since(prev) >= self.interval => {
                self.last = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_arms_then_fires_once_per_interval() {
        let start = Instant::now();
        let mut gate = Throttle::new(Duration::from_millis(100));
        assert!(!gate.ready(start));
        assert!(!gate.ready(start + Duration::from_millis(50)));
        assert!(gate.ready(start + Duration::from_millis(100)));
        assert!(!gate.ready(start + Duration::from_millis(150)));
        assert!(gate.ready(start + Duration::from_millis(260)));
    }
}
