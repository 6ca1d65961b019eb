use fitgrid_core::{
    CellValue, FitnessSnapshot, GridPos, IndividualRef, PopulationObserver, SnapshotSink, Throttle,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::Channel;

/// Share of the colour range the previous frame's fitness span is stretched over.
pub const TARGET_RANGE: f64 = 0.9;
const TARGET_LOW: f64 = (1.0 - TARGET_RANGE) / 2.0;
const TARGET_HIGH: f64 = 1.0 - TARGET_LOW;
const EMPTY_GRAY: f64 = 0.99;

/// Linear RGB colour, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl CellColor {
    pub const EMPTY: Self = Self {
        r: EMPTY_GRAY,
        g: EMPTY_GRAY,
        b: EMPTY_GRAY,
    };
    pub const PERFECT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 1.0,
    };

    /// Red for 0.0 fading into green towards 1.0; blue for perfect fitness.
    #[must_use]
    pub fn for_fitness(fitness: f64) -> Self {
        if fitness >= 1.0 {
            Self::PERFECT
        } else {
            Self {
                r: 1.0 - fitness,
                g: fitness,
                b: 0.0,
            }
        }
    }

    fn glyph(self) -> char {
        if self == Self::EMPTY {
            '.'
        } else if self == Self::PERFECT {
            '@'
        } else if self.g > 0.66 {
            '#'
        } else if self.g > 0.33 {
            '+'
        } else {
            '-'
        }
    }
}

/// Painted state of the whole grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridFrame {
    pub size_x: usize,
    pub size_y: usize,
    /// Number of redraws that produced this frame.
    pub redraws: u64,
    cells: Vec<CellColor>,
}

impl GridFrame {
    fn new(size_x: usize, size_y: usize) -> Self {
        Self {
            size_x,
            size_y,
            redraws: 0,
            cells: vec![CellColor::EMPTY; size_x * size_y],
        }
    }

    /// Colour of `(x, y)`; `None` outside the grid.
    #[must_use]
    pub fn color_at(&self, x: usize, y: usize) -> Option<CellColor> {
        (x < self.size_x && y < self.size_y).then(|| self.cells[x * self.size_y + y])
    }

    /// One text row per `y`, one glyph per `x`.
    #[must_use]
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.size_x + 1) * self.size_y);
        for y in 0..self.size_y {
            for x in 0..self.size_x {
                out.push(self.cells[x * self.size_y + y].glyph());
            }
            let _ = writeln!(out);
        }
        out
    }
}

struct ViewState {
    channel: Channel,
    latest: Vec<CellValue>,
    pending: Vec<bool>,
    frame: GridFrame,
    throttle: Throttle,
    span: Option<(f64, f64)>,
}

impl ViewState {
    fn schedule(&mut self, pos: GridPos, value: CellValue) {
        if pos.x >= self.frame.size_x || pos.y >= self.frame.size_y {
            return;
        }
        let idx = pos.x * self.frame.size_y + pos.y;
        self.latest[idx] = value;
        self.pending[idx] = true;
    }

    /// Affine map stretching the previous frame's span over the target range.
    fn normalisation(&self) -> (f64, f64) {
        match self.span {
            None => (1.0, 0.0),
            Some((lo, hi)) => {
                let delta = hi - lo;
                let scale = if delta > f64::EPSILON {
                    TARGET_RANGE / delta
                } else {
                    1.0
                };
                (scale, 0.5 - scale * (hi + lo) / 2.0)
            }
        }
    }

    /// Paint pending cells; returns the number of cells painted.
    fn redraw(&mut self) -> usize {
        let (scale, shift) = self.normalisation();
        let mut painted = 0;
        for (idx, pending) in self.pending.iter_mut().enumerate() {
            if !*pending {
                continue;
            }
            let color = match self.latest[idx] {
                CellValue::Empty => Some(CellColor::EMPTY),
                CellValue::Occupied(fitness) if fitness < 1.0 => {
                    let adjusted = fitness * scale + shift;
                    (TARGET_LOW..=TARGET_HIGH)
                        .contains(&adjusted)
                        .then(|| CellColor::for_fitness(adjusted))
                }
                CellValue::Occupied(fitness) => Some(CellColor::for_fitness(fitness)),
            };
            // Cells outside the stretched range stay pending.
            if let Some(color) = color {
                self.frame.cells[idx] = color;
                *pending = false;
                painted += 1;
            }
        }
        self.span = self.latest.iter().fold(None, |span, value| match (span, *value) {
            (span, CellValue::Empty) => span,
            (None, CellValue::Occupied(f)) => Some((f, f)),
            (Some((lo, hi)), CellValue::Occupied(f)) => Some((lo.min(f), hi.max(f))),
        });
        self.frame.redraws += 1;
        painted
    }
}

/// Per-cell colour view of the population.
///
/// Registered with a tracker both as a [`PopulationObserver`] (collecting
/// per-cell values) and as a [`SnapshotSink`] (repainting on pipeline ticks
/// at most once per redraw interval).
#[derive(Clone)]
pub struct GridView {
    state: Arc<Mutex<ViewState>>,
}

impl std::fmt::Debug for GridView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("GridView")
            .field("channel", &state.channel)
            .field("size_x", &state.frame.size_x)
            .field("size_y", &state.frame.size_y)
            .field("redraws", &state.frame.redraws)
            .finish()
    }
}

impl GridView {
    /// Every cell starts pending as empty so the first redraw clears the canvas.
    #[must_use]
    pub fn new(size_x: usize, size_y: usize, channel: Channel, redraw_interval: Duration) -> Self {
        let state = ViewState {
            channel,
            latest: vec![CellValue::Empty; size_x * size_y],
            pending: vec![true; size_x * size_y],
            frame: GridFrame::new(size_x, size_y),
            throttle: Throttle::new(redraw_interval),
            span: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn channel(&self) -> Channel {
        self.state().channel
    }

    /// Queue a value for `pos`; positions outside the view are ignored.
    pub fn schedule_update(&self, pos: GridPos, value: CellValue) {
        self.state().schedule(pos, value);
    }

    /// Cells still waiting to be painted.
    #[must_use]
    pub fn pending_cells(&self) -> usize {
        self.state().pending.iter().filter(|p| **p).count()
    }

    /// Repaint now, regardless of the redraw interval; returns the painted cell count.
    pub fn redraw(&self) -> usize {
        self.state().redraw()
    }

    /// Copy of the painted frame.
    #[must_use]
    pub fn frame(&self) -> GridFrame {
        self.state().frame.clone()
    }
}

impl PopulationObserver for GridView {
    fn on_set(&mut self, individual: &IndividualRef) {
        let mut state = self.state();
        let value = state.channel.of(individual.fitness());
        state.schedule(individual.position(), CellValue::Occupied(value));
    }

    fn on_remove(&mut self, pos: GridPos) {
        self.state().schedule(pos, CellValue::Empty);
    }
}

impl SnapshotSink for GridView {
    fn on_snapshot(&mut self, _snapshot: &FitnessSnapshot) {}

    fn on_tick(&mut self, now: Instant) {
        let mut state = self.state();
        if state.throttle.ready(now) {
            let painted = state.redraw();
            trace!(painted, redraws = state.frame.redraws, "grid view redraw");
        }
    }

    fn on_stop(&mut self) {
        self.state().redraw();
    }
}
