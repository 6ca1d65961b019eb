//! Population statistics over the occupied grid cells.

use serde::{Deserialize, Serialize};

use crate::PopulationGrid;

/// Fewest occupied cells for which statistics are published.
pub const MIN_SAMPLE_SIZE: usize = 3;

/// Neumaier-compensated running sum.
///
/// Keeps the rounding error of every addition in a second term; plain `f64`
/// summation over hundreds of thousands of cells drifts visibly once the
/// variance approaches zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    pub fn add(&mut self, value: f64) {
        let total = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - total) + value;
        } else {
            self.compensation += (value - total) + self.sum;
        }
        self.sum = total;
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }

    /// High and low parts; `hi + lo` is the sum.
    #[must_use]
    pub const fn parts(&self) -> (f64, f64) {
        (self.sum, self.compensation)
    }
}

/// Mean, standard deviation and maximum of one fitness channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub dev: f64,
    pub max: f64,
}

impl ChannelStats {
    /// `[mean, dev, max]`, the shape chart sinks consume.
    #[must_use]
    pub const fn as_triple(&self) -> [f64; 3] {
        [self.mean, self.dev, self.max]
    }
}

/// Running sums for one channel.
///
/// Values are accumulated as offsets from the first value seen; a converging
/// population then sums tiny offsets instead of cancelling large squares.
#[derive(Debug, Clone, Copy)]
struct ChannelAccumulator {
    shift: Option<f64>,
    sum: CompensatedSum,
    sum_sq: CompensatedSum,
    max: f64,
}

impl Default for ChannelAccumulator {
    fn default() -> Self {
        Self {
            shift: None,
            sum: CompensatedSum::default(),
            sum_sq: CompensatedSum::default(),
            max: f64::NEG_INFINITY,
        }
    }
}

impl ChannelAccumulator {
    fn push(&mut self, value: f64) {
        let offset = value - *self.shift.get_or_insert(value);
        self.sum.add(offset);
        // Split the square into its rounded value and exact error.
        let square = offset * offset;
        self.sum_sq.add(square);
        self.sum_sq.add(offset.mul_add(offset, -square));
        self.max = self.max.max(value);
    }

    /// Sample statistics with the Bessel-corrected variance; `count >= 2`.
    fn finish(&self, count: usize) -> ChannelStats {
        let n = count as f64;
        let (s_hi, s_lo) = self.sum.parts();
        let (q_hi, q_lo) = self.sum_sq.parts();
        let offset_mean = self.sum.value() / n;
        // sum_sq - sum * mean, with the product error recovered through fma.
        let product = s_hi * offset_mean;
        let product_err = s_hi.mul_add(offset_mean, -product);
        let spread = (q_hi - product) + (q_lo - product_err - s_lo * offset_mean);
        let variance = (spread / (n - 1.0)).max(0.0);
        ChannelStats {
            mean: self.shift.unwrap_or(0.0) + offset_mean,
            dev: variance.sqrt(),
            max: self.max,
        }
    }
}

/// Statistics published for the whole population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessSnapshot {
    /// Guidance fitness channel.
    pub guidance: ChannelStats,
    /// Actual fitness channel; uncomputable values count as `0.0`.
    pub actual: ChannelStats,
    /// Occupied cells the statistics were computed from.
    pub sample_size: usize,
    /// Number of snapshots published before and including this one.
    pub sequence: u64,
}

/// Recomputes [`FitnessSnapshot`]s from the grid.
#[derive(Debug, Clone)]
pub struct Aggregator {
    min_sample_size: usize,
    published: FitnessSnapshot,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(MIN_SAMPLE_SIZE)
    }
}

impl Aggregator {
    /// `min_sample_size` is raised to 2 so the variance divisor stays positive.
    #[must_use]
    pub fn new(min_sample_size: usize) -> Self {
        Self {
            min_sample_size: min_sample_size.max(2),
            published: FitnessSnapshot::default(),
        }
    }

    /// Last published snapshot; all zero until the first success.
    #[must_use]
    pub const fn published(&self) -> &FitnessSnapshot {
        &self.published
    }

    /// Scan the grid and publish new statistics.
    ///
    /// Returns `false` and keeps the previous snapshot when fewer than the
    /// minimum sample of cells are occupied.
    pub fn recompute(&mut self, grid: &PopulationGrid) -> bool {
        let mut guidance = ChannelAccumulator::default();
        let mut actual = ChannelAccumulator::default();
        let mut count = 0usize;
        for individual in grid.iter_occupied() {
            let fitness = individual.fitness();
            guidance.push(fitness.guidance());
            actual.push(fitness.actual_or_zero());
            count += 1;
        }
        if count < self.min_sample_size {
            return false;
        }
        self.published = FitnessSnapshot {
            guidance: guidance.finish(count),
            actual: actual.finish(count),
            sample_size: count,
            sequence: self.published.sequence + 1,
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Candidate, Expr, Fitness, GridPos};
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    const TOLERANCE: f64 = 1e-9;

    fn place(grid: &mut PopulationGrid, x: usize, y: usize, fitness: Fitness) {
        grid.set(Candidate::new(GridPos::new(x, y), fitness, vec![Expr::var("x0")]).into_ref());
    }

    fn two_pass(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, var.sqrt())
    }

    #[test]
    fn compensated_sum_recovers_lost_bits() {
        let mut sum = CompensatedSum::default();
        sum.add(1.0);
        for _ in 0..10_000 {
            sum.add(1e-16);
        }
        sum.add(-1.0);
        assert!((sum.value() - 1e-12).abs() < 1e-20);
    }

    #[test]
    fn too_few_cells_keep_previous_snapshot() {
        let mut grid = PopulationGrid::new(4, 4).expect("grid");
        let mut aggregator = Aggregator::default();
        place(&mut grid, 0, 0, Fitness::extended(0.5, 0.5));
        place(&mut grid, 0, 1, Fitness::extended(0.7, 0.8));
        assert!(!aggregator.recompute(&grid));
        assert_eq!(*aggregator.published(), FitnessSnapshot::default());

        place(&mut grid, 1, 1, Fitness::extended(0.9, 0.9));
        assert!(aggregator.recompute(&grid));
        let published = *aggregator.published();
        assert_eq!(published.sequence, 1);

        grid.clear_cell(GridPos::new(1, 1));
        assert!(!aggregator.recompute(&grid));
        assert_eq!(*aggregator.published(), published);
    }

    #[test]
    fn matches_two_pass_sample_statistics() {
        let mut grid = PopulationGrid::new(2, 3).expect("grid");
        let actual = [0.2, 0.9, 0.9, 0.4, 0.0];
        let guidance = [0.5, 0.95, 0.8, 0.45, 0.3];
        for (idx, (&a, &g)) in actual.iter().zip(&guidance).enumerate() {
            let fitness = if idx == 4 {
                Fitness::plain(g)
            } else {
                Fitness::extended(a, g)
            };
            place(&mut grid, idx / 3, idx % 3, fitness);
        }
        let mut aggregator = Aggregator::default();
        assert!(aggregator.recompute(&grid));
        let snapshot = aggregator.published();

        let (mean, dev) = two_pass(&actual);
        assert!((snapshot.actual.mean - mean).abs() < TOLERANCE);
        assert!((snapshot.actual.dev - dev).abs() < TOLERANCE);
        assert_eq!(snapshot.actual.max, 0.9);

        let (mean, dev) = two_pass(&guidance);
        assert!((snapshot.guidance.mean - mean).abs() < TOLERANCE);
        assert!((snapshot.guidance.dev - dev).abs() < TOLERANCE);
        assert_eq!(snapshot.guidance.max, 0.95);
        assert_eq!(snapshot.sample_size, 5);
    }

    fn random_fitness(rng: &mut SmallRng, base: f64, spread: f64) -> Fitness {
        let actual = base + spread * rng.r#gen::<f64>();
        let guidance = base + spread * rng.r#gen::<f64>();
        match rng.gen_range(0..10) {
            0 => Fitness::plain(guidance),
            1 | 2 => Fitness::scaled(actual, guidance, vec![rng.gen_range(0.5..2.0)], vec![0.0]),
            _ => Fitness::extended(actual, guidance),
        }
    }

    #[test]
    fn random_grids_match_two_pass_sample_statistics() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for case in 0..60 {
            let size_x = rng.gen_range(1..=48);
            let size_y = rng.gen_range(1..=48);
            let occupancy = rng.gen_range(0.05..=1.0);
            let base = rng.gen_range(0.0..1.0);
            let spread = 10f64.powi(-rng.gen_range(0..=11));

            let mut grid = PopulationGrid::new(size_x, size_y).expect("grid");
            let mut actual = Vec::new();
            let mut guidance = Vec::new();
            for x in 0..size_x {
                for y in 0..size_y {
                    if rng.gen_bool(occupancy) {
                        let fitness = random_fitness(&mut rng, base, spread);
                        actual.push(fitness.actual_or_zero());
                        guidance.push(fitness.guidance());
                        place(&mut grid, x, y, fitness);
                    }
                }
            }

            let mut aggregator = Aggregator::default();
            if actual.len() < MIN_SAMPLE_SIZE {
                assert!(!aggregator.recompute(&grid), "case {case}");
                continue;
            }
            assert!(aggregator.recompute(&grid), "case {case}");
            let snapshot = aggregator.published();
            assert_eq!(snapshot.sample_size, actual.len());
            for (stats, values) in [(&snapshot.actual, &actual), (&snapshot.guidance, &guidance)] {
                let (mean, dev) = two_pass(values);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                assert!((stats.mean - mean).abs() < TOLERANCE, "case {case}: mean {} vs {mean}", stats.mean);
                assert!((stats.dev - dev).abs() < TOLERANCE, "case {case}: dev {} vs {dev}", stats.dev);
                assert_eq!(stats.max, max, "case {case}");
            }
        }
    }

    #[test]
    fn converged_population_has_zero_deviation() {
        let mut grid = PopulationGrid::new(300, 300).expect("grid");
        for x in 0..300 {
            for y in 0..300 {
                place(&mut grid, x, y, Fitness::extended(0.1, 0.3));
            }
        }
        let mut aggregator = Aggregator::default();
        assert!(aggregator.recompute(&grid));
        let snapshot = aggregator.published();
        assert!((snapshot.actual.mean - 0.1).abs() < TOLERANCE);
        assert!(snapshot.actual.dev < 1e-9, "dev = {}", snapshot.actual.dev);
        assert!(snapshot.guidance.dev < 1e-9, "dev = {}", snapshot.guidance.dev);
    }
}
