//! Observer-facing tracker: grid mutations in, throttled statistics out.

use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::selection::best_fit;
use crate::sink::{PopulationObserver, SnapshotListener, SnapshotSink, Throttle};
use crate::stats::{Aggregator, ChannelStats, FitnessSnapshot};
use crate::{IndividualRef, PopulationGrid, TrackerConfig, TrackerError};

/// Grid, statistics and dirty flag; always locked together.
struct TrackerState {
    grid: PopulationGrid,
    aggregator: Aggregator,
    dirty: bool,
    observers: Vec<Box<dyn PopulationObserver>>,
}

#[derive(Default)]
struct SinkSet {
    sinks: Vec<Box<dyn SnapshotSink>>,
    listener: Option<SnapshotListener>,
}

impl SinkSet {
    fn publish(&mut self, snapshot: &FitnessSnapshot) {
        if let Some(listener) = self.listener.as_mut() {
            listener(snapshot);
        }
        for sink in &mut self.sinks {
            sink.on_snapshot(snapshot);
        }
    }
}

struct Shared {
    state: Mutex<TrackerState>,
    sinks: Mutex<SinkSet>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sinks(&self) -> MutexGuard<'_, SinkSet> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recompute and publish when the grid changed since the last publish.
    ///
    /// The sinks lock is taken before the state lock is released, so
    /// concurrent flushes deliver snapshots in sequence order. Sinks
    /// themselves run after the state lock is released.
    fn flush(&self) -> Option<FitnessSnapshot> {
        let (snapshot, mut sinks) = {
            let mut state = self.state();
            if !state.dirty {
                return None;
            }
            let TrackerState {
                grid, aggregator, ..
            } = &mut *state;
            if !aggregator.recompute(grid) {
                return None;
            }
            state.dirty = false;
            (*state.aggregator.published(), self.sinks())
        };
        sinks.publish(&snapshot);
        Some(snapshot)
    }

    fn tick(&self, now: Instant) {
        for sink in &mut self.sinks().sinks {
            sink.on_tick(now);
        }
    }

    fn stop_sinks(&self) {
        for sink in &mut self.sinks().sinks {
            sink.on_stop();
        }
    }
}

enum PipelineCommand {
    Stop,
}

struct Worker {
    tx: mpsc::Sender<PipelineCommand>,
    handle: thread::JoinHandle<()>,
}

/// Tracks one population grid for the duration of a search run.
///
/// Producer threads call [`set`](Self::set) and [`remove`](Self::remove)
/// concurrently; while observing, a dedicated thread republishes statistics
/// at most at the configured stats rate, coalescing every mutation made in
/// between.
pub struct FitnessTracker {
    config: TrackerConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl fmt::Debug for FitnessTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitnessTracker")
            .field("config", &self.config)
            .field("observing", &self.is_observing())
            .finish()
    }
}

impl FitnessTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        let grid = PopulationGrid::new(config.size_x, config.size_y)?;
        let state = TrackerState {
            grid,
            aggregator: Aggregator::new(config.min_sample_size),
            dirty: false,
            observers: Vec::new(),
        };
        Ok(Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                sinks: Mutex::new(SinkSet::default()),
            }),
            worker: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Register a side effect for every grid mutation.
    pub fn add_observer(&self, observer: Box<dyn PopulationObserver>) {
        self.shared.state().observers.push(observer);
    }

    /// Register a consumer of published statistics.
    pub fn add_sink(&self, sink: Box<dyn SnapshotSink>) {
        self.shared.sinks().sinks.push(sink);
    }

    /// Install the snapshot listener, returning the one it replaces.
    pub fn set_snapshot_listener(
        &self,
        listener: Option<SnapshotListener>,
    ) -> Option<SnapshotListener> {
        std::mem::replace(&mut self.shared.sinks().listener, listener)
    }

    /// An individual was placed at (or replaced the occupant of) its cell.
    ///
    /// # Panics
    ///
    /// Panics when the individual's position lies outside the grid or its
    /// scaling vectors do not match its dimensions.
    pub fn set(&self, individual: IndividualRef) {
        let mut state = self.shared.state();
        state.grid.set(Arc::clone(&individual));
        for observer in &mut state.observers {
            observer.on_set(&individual);
        }
        state.dirty = true;
    }

    /// An individual was evicted from its cell.
    ///
    /// Removal is ignored when the cell already holds a newer individual.
    ///
    /// # Panics
    ///
    /// Panics when the individual's position lies outside the grid.
    pub fn remove(&self, individual: &IndividualRef) {
        let mut state = self.shared.state();
        if state.grid.remove(individual) {
            let pos = individual.position();
            for observer in &mut state.observers {
                observer.on_remove(pos);
            }
            state.dirty = true;
        }
    }

    /// Current occupant of `(x, y)`.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<IndividualRef> {
        self.shared.state().grid.get(x, y).map(Arc::clone)
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.shared.state().grid.occupied()
    }

    /// Individuals tied for the best actual fitness; empty only for an empty grid.
    #[must_use]
    pub fn get_best_fit_ind(&self) -> Vec<IndividualRef> {
        best_fit(&self.shared.state().grid)
    }

    /// Whether mutations happened since the last published snapshot.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.shared.state().dirty
    }

    /// Publish new statistics now if the grid changed and enough cells are occupied.
    ///
    /// This is what the observing thread runs on each stats tick; callers
    /// driving their own timer can use it without starting that thread.
    pub fn flush(&self) -> Option<FitnessSnapshot> {
        self.shared.flush()
    }

    /// Last published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> FitnessSnapshot {
        *self.shared.state().aggregator.published()
    }

    /// Last published guidance-fitness statistics.
    #[must_use]
    pub fn guidance_stats(&self) -> ChannelStats {
        self.snapshot().guidance
    }

    /// Last published actual-fitness statistics.
    #[must_use]
    pub fn actual_stats(&self) -> ChannelStats {
        self.snapshot().actual
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.worker().is_some()
    }

    /// Start the observing thread; a second start while running is a no-op.
    pub fn start_observing(&self) -> Result<(), TrackerError> {
        let mut worker = self.worker();
        if worker.is_some() {
            debug!("observing already active");
            return Ok(());
        }

        let stats_interval = self.config.stats_interval();
        let tick = stats_interval
            .min(self.config.grid_redraw_interval())
            .min(self.config.chart_interval());
        let shared = Arc::clone(&self.shared);
        let (tx, rx) = mpsc::channel::<PipelineCommand>();
        let handle = thread::Builder::new()
            .name("fitgrid-observer".into())
            .spawn(move || {
                let mut stats_gate = Throttle::new(stats_interval);
                loop {
                    match rx.recv_timeout(tick) {
                        Ok(PipelineCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    let now = Instant::now();
                    if stats_gate.ready(now) {
                        shared.flush();
                    }
                    shared.tick(now);
                }
                let flushed = shared.flush();
                debug!(published = flushed.is_some(), "final observer flush");
                shared.stop_sinks();
            })
            .map_err(|err| {
                TrackerError::Worker(format!("failed to spawn observer thread: {err}"))
            })?;

        info!(
            size_x = self.config.size_x,
            size_y = self.config.size_y,
            stats_hz = self.config.stats_rate_hz,
            "observing population grid"
        );
        *worker = Some(Worker { tx, handle });
        Ok(())
    }

    /// Flush pending statistics once, then stop the observing thread.
    pub fn stop_observing(&self) {
        let Some(worker) = self.worker().take() else {
            return;
        };
        let _ = worker.tx.send(PipelineCommand::Stop);
        if let Err(err) = worker.handle.join() {
            warn!(?err, "observer thread panicked");
        }
        info!("stopped observing population grid");
    }
}

impl Drop for FitnessTracker {
    fn drop(&mut self) {
        self.stop_observing();
    }
}
