//! Synthetic search workers standing in for the evolutionary engine.

use fitgrid_core::{BinaryOp, Candidate, Expr, Fitness, FitnessTracker, GridPos, IndividualRef};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::Serialize;
use std::sync::atomic::Ordering;
use tracing::debug;

use crate::StopSignal;

const FUNCTIONS: [&str; 4] = ["sin", "cos", "exp", "abs"];
const OPS: [BinaryOp; 4] = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div];
/// Individuals a worker remembers as candidates for later eviction.
const RECENT_WINDOW: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct ProducerConfig {
    pub seed: u64,
    pub placements: usize,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProducerReport {
    pub worker: usize,
    pub placed: usize,
    pub removed: usize,
    pub stopped_early: bool,
}

fn random_expr(rng: &mut SmallRng, dimension: usize, depth: u32) -> Expr {
    if depth == 0 || rng.gen_bool(0.3) {
        return if rng.gen_bool(0.6) {
            Expr::var(format!("x{}", rng.gen_range(0..=dimension)))
        } else {
            Expr::constant((rng.gen_range(-4.0..4.0_f64) * 100.0).round() / 100.0)
        };
    }
    if rng.gen_bool(0.25) {
        let name = FUNCTIONS[rng.gen_range(0..FUNCTIONS.len())];
        Expr::call(name, vec![random_expr(rng, dimension, depth - 1)])
    } else {
        let op = OPS[rng.gen_range(0..OPS.len())];
        Expr::binary(
            op,
            random_expr(rng, dimension, depth - 1),
            random_expr(rng, dimension, depth - 1),
        )
    }
}

/// Random fitness whose ceiling rises with `progress` in `[0, 1]` and
/// reaches 1.0 for the last fifth of a run.
///
/// Actual fitness is rounded to hundredths so ties and perfect fits occur.
fn random_fitness(rng: &mut SmallRng, progress: f64, dimensions: usize) -> Fitness {
    let ceiling = (progress * 1.25).clamp(0.01, 1.0);
    let actual = (rng.gen_range(0.0..=ceiling) * 100.0).round() / 100.0;
    let guidance = (actual + rng.gen_range(0.0..0.1)).min(1.0);
    match rng.gen_range(0..10) {
        0 => Fitness::plain(guidance),
        1 | 2 => {
            let scales = (0..dimensions)
                .map(|_| if rng.gen_bool(0.5) { 1.0 } else { rng.gen_range(0.5..2.0) })
                .collect();
            let shifts = (0..dimensions)
                .map(|_| if rng.gen_bool(0.5) { 0.0 } else { rng.gen_range(-1.0..1.0) })
                .collect();
            Fitness::scaled(actual, guidance, scales, shifts)
        }
        _ => Fitness::extended(actual, guidance),
    }
}

/// One random individual somewhere on a `size_x * size_y` grid.
pub fn random_individual(
    rng: &mut SmallRng,
    size_x: usize,
    size_y: usize,
    dimensions: usize,
    progress: f64,
) -> IndividualRef {
    let pos = GridPos::new(rng.gen_range(0..size_x), rng.gen_range(0..size_y));
    let exprs = (0..dimensions).map(|dim| random_expr(rng, dim, 3)).collect();
    Candidate::new(pos, random_fitness(rng, progress, dimensions), exprs).into_ref()
}

/// Place `config.placements` random individuals, occasionally evicting a
/// recently placed one, until done or `stop` is raised.
pub fn run_producer(
    tracker: &FitnessTracker,
    worker: usize,
    config: ProducerConfig,
    stop: &StopSignal,
) -> ProducerReport {
    let mut rng = SmallRng::seed_from_u64(config.seed.wrapping_add(worker as u64));
    let grid = tracker.config();
    let mut report = ProducerReport {
        worker,
        ..ProducerReport::default()
    };
    let mut recent: Vec<IndividualRef> = Vec::with_capacity(RECENT_WINDOW);

    for step in 0..config.placements {
        if stop.load(Ordering::Acquire) {
            report.stopped_early = true;
            break;
        }
        let progress = (step + 1) as f64 / config.placements as f64;
        let individual = random_individual(&mut rng, grid.size_x, grid.size_y, config.dimensions, progress);
        tracker.set(individual.clone());
        report.placed += 1;

        if recent.len() == RECENT_WINDOW {
            recent.swap_remove(rng.gen_range(0..RECENT_WINDOW));
        }
        recent.push(individual);
        // The evicted individual may already have been replaced in its cell.
        if rng.gen_bool(0.05) {
            let victim = recent.swap_remove(rng.gen_range(0..recent.len()));
            tracker.remove(&victim);
            report.removed += 1;
        }
    }
    debug!(worker, placed = report.placed, removed = report.removed, "producer finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitgrid_core::TrackerConfig;

    #[test]
    fn producers_are_reproducible() {
        let make = || {
            let mut rng = SmallRng::seed_from_u64(42);
            random_individual(&mut rng, 8, 8, 2, 0.5)
        };
        let (a, b) = (make(), make());
        assert_eq!(a.position(), b.position());
        assert!(a.fitness().same_as(b.fitness()));
        assert_eq!(a.expr_text(), b.expr_text());
        assert_eq!(a.dimensions(), 2);
    }

    #[test]
    fn run_respects_stop_signal() {
        let tracker = FitnessTracker::new(TrackerConfig::with_size(4, 4)).expect("tracker");
        let config = ProducerConfig {
            seed: 7,
            placements: 200,
            dimensions: 1,
        };
        let report = run_producer(&tracker, 0, config, &StopSignal::default());
        assert_eq!(report.placed, 200);
        assert!(!report.stopped_early);
        assert!(tracker.occupied() > 0);

        let stop = StopSignal::default();
        stop.store(true, Ordering::Release);
        let report = run_producer(&tracker, 1, config, &stop);
        assert_eq!(report.placed, 0);
        assert!(report.stopped_early);
    }
}
