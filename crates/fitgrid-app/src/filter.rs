//! Periodic culling of individuals below the population's average fitness.

use fitgrid_core::{FitnessTracker, Individual, IndividualRef};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Decides whether an individual is dropped from the population.
pub trait IndividualFilter: Send + Sync {
    /// `true` when `individual` must be filtered out.
    fn evaluate(&self, individual: &dyn Individual) -> bool;
}

#[derive(Debug)]
struct FilterState {
    active: bool,
    fitness_bound: f64,
    last_round: Instant,
}

/// Filter that runs rounds at most once per `interval`, whenever the observed
/// average drops below `bound`.
#[derive(Debug)]
pub struct AvgFilter {
    bound: f64,
    interval: Duration,
    state: Mutex<FilterState>,
}

impl AvgFilter {
    /// The interval counts from construction, as if a round had just ended.
    #[must_use]
    pub fn new(bound: f64, interval: Duration) -> Self {
        Self::new_at(bound, interval, Instant::now())
    }

    #[must_use]
    pub fn new_at(bound: f64, interval: Duration, now: Instant) -> Self {
        Self {
            bound,
            interval,
            state: Mutex::new(FilterState {
                active: false,
                fitness_bound: 0.0,
                last_round: now,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FilterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn bound(&self) -> f64 {
        self.bound
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state().active
    }

    #[must_use]
    pub fn fitness_bound(&self) -> f64 {
        self.state().fitness_bound
    }

    pub fn set_fitness_bound(&self, fitness_bound: f64) {
        self.state().fitness_bound = fitness_bound;
    }

    /// Whether a new round should start for the observed `value`.
    #[must_use]
    pub fn is_trigger(&self, value: f64) -> bool {
        self.is_trigger_at(value, Instant::now())
    }

    #[must_use]
    pub fn is_trigger_at(&self, value: f64, now: Instant) -> bool {
        let state = self.state();
        !state.active
            && now.saturating_duration_since(state.last_round) >= self.interval
            && value < self.bound
    }

    pub fn start_filtering(&self) {
        self.state().active = true;
    }

    pub fn stop_filtering(&self) {
        self.stop_filtering_at(Instant::now());
    }

    pub fn stop_filtering_at(&self, now: Instant) {
        let mut state = self.state();
        state.active = false;
        state.last_round = now;
    }
}

impl IndividualFilter for AvgFilter {
    /// Outside a round nothing is filtered; during one, individuals whose
    /// actual fitness is unknown or below the fitness bound are.
    fn evaluate(&self, individual: &dyn Individual) -> bool {
        let state = self.state();
        if !state.active {
            return false;
        }
        match individual.fitness().actual() {
            Some(actual) => actual < state.fitness_bound,
            None => true,
        }
    }
}

/// Run one round against the tracked population if the filter triggers on
/// the published mean actual fitness; returns how many individuals were removed.
pub fn run_filter_round(tracker: &FitnessTracker, filter: &AvgFilter) -> usize {
    let mean = tracker.actual_stats().mean;
    if !filter.is_trigger(mean) {
        return 0;
    }
    filter.set_fitness_bound(mean);
    filter.start_filtering();

    let config = tracker.config();
    let doomed: Vec<IndividualRef> = (0..config.size_x)
        .flat_map(|x| (0..config.size_y).map(move |y| (x, y)))
        .filter_map(|(x, y)| tracker.get(x, y))
        .filter(|individual| filter.evaluate(individual.as_ref()))
        .collect();
    for individual in &doomed {
        debug!(pos = %individual.position(), fitness = %individual.fitness(), "filtering out individual");
        tracker.remove(individual);
    }
    filter.stop_filtering();
    info!(removed = doomed.len(), fitness_bound = mean, "finished average filter round");
    doomed.len()
}
