use fitgrid_core::{
    Candidate, Expr, Fitness, FitnessSnapshot, FitnessTracker, GridPos, Individual,
    IndividualRef, SnapshotSink, TrackerConfig, non_empty, same_individual,
};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn individual(x: usize, y: usize, fitness: Fitness) -> IndividualRef {
    Candidate::new(GridPos::new(x, y), fitness, vec![Expr::var("x0"), Expr::var("x1")]).into_ref()
}

#[derive(Clone, Default)]
struct Collect(Arc<Mutex<Vec<FitnessSnapshot>>>);

impl SnapshotSink for Collect {
    fn on_snapshot(&mut self, snapshot: &FitnessSnapshot) {
        self.0.lock().expect("lock").push(*snapshot);
    }
}

#[test]
fn two_by_two_population_statistics_and_best_fit() {
    let tracker = FitnessTracker::new(TrackerConfig::with_size(2, 2)).expect("tracker");
    tracker.set(individual(0, 0, Fitness::extended(0.2, 0.5)));
    tracker.set(individual(0, 1, Fitness::extended(0.9, 0.95)));
    tracker.set(individual(1, 0, Fitness::extended(0.9, 0.80)));
    let snapshot = tracker.flush().expect("three cells are enough");

    let mean = (0.2 + 0.9 + 0.9) / 3.0;
    let dev = (((0.2f64 - mean).powi(2) + 2.0 * (0.9f64 - mean).powi(2)) / 2.0).sqrt();
    assert!((snapshot.actual.mean - mean).abs() < 1e-9);
    assert!((snapshot.actual.dev - dev).abs() < 1e-9);
    assert_eq!(snapshot.actual.max, 0.9);
    assert_eq!(snapshot.guidance.max, 0.95);

    let best: Vec<GridPos> = tracker.get_best_fit_ind().iter().map(|i| i.position()).collect();
    assert_eq!(best, vec![GridPos::new(0, 1), GridPos::new(1, 0)]);
}

#[test]
fn empty_tracker_reports_empty_selection() {
    let tracker = FitnessTracker::new(TrackerConfig::with_size(4, 4)).expect("tracker");
    assert!(non_empty(tracker.get_best_fit_ind()).is_err());
    assert_eq!(tracker.snapshot(), FitnessSnapshot::default());
}

#[test]
fn scaled_individual_is_rewritten_before_selection() {
    let tracker = FitnessTracker::new(TrackerConfig::with_size(3, 3)).expect("tracker");
    let scaled = individual(1, 2, Fitness::scaled(0.87, 0.6, vec![1.0, 2.0], vec![0.0, 3.0]));
    tracker.set(Arc::clone(&scaled));
    assert_eq!(scaled.expr_text(), vec!["x0", "(x1 * 2.0) + 3.0"]);
    let best = tracker.get_best_fit_ind();
    assert_eq!(best.len(), 1);
    assert!(same_individual(&best[0], &scaled));
}

#[test]
fn concurrent_producers_converge_to_final_grid() {
    let config = TrackerConfig {
        stats_rate_hz: 200.0,
        ..TrackerConfig::with_size(16, 16)
    };
    let tracker = Arc::new(FitnessTracker::new(config).expect("tracker"));
    let collect = Collect::default();
    tracker.add_sink(Box::new(collect.clone()));
    tracker.start_observing().expect("start");

    let handles: Vec<_> = (0..4u64)
        .map(|worker| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                let mut rng = SmallRng::seed_from_u64(worker);
                // Each producer owns four columns.
                for _ in 0..2_000 {
                    let x = worker as usize * 4 + rng.gen_range(0..4);
                    let y = rng.gen_range(0..16);
                    let ind = individual(x, y, Fitness::extended(rng.gen_range(0.0..0.99), 0.5));
                    tracker.set(Arc::clone(&ind));
                    if rng.gen_bool(0.1) {
                        tracker.remove(&ind);
                    }
                }
                for x in worker as usize * 4..worker as usize * 4 + 4 {
                    for y in 0..16 {
                        tracker.set(individual(x, y, Fitness::extended(0.25, 0.5)));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer");
    }
    thread::sleep(Duration::from_millis(20));
    tracker.stop_observing();

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.sample_size, 256);
    assert!((snapshot.actual.mean - 0.25).abs() < 1e-12);
    assert!(snapshot.actual.dev < 1e-9);
    assert_eq!(tracker.get_best_fit_ind().len(), 256);

    let published = collect.0.lock().expect("lock").clone();
    assert_eq!(published.last(), Some(&snapshot));
    assert!(
        published.windows(2).all(|w| w[0].sequence < w[1].sequence),
        "snapshots arrive in publication order"
    );
}

#[test]
fn stale_remove_from_another_thread_is_ignored() {
    let tracker = Arc::new(FitnessTracker::new(TrackerConfig::with_size(1, 1)).expect("tracker"));
    let old = individual(0, 0, Fitness::extended(0.1, 0.1));
    let new = individual(0, 0, Fitness::extended(0.2, 0.2));
    tracker.set(Arc::clone(&old));
    tracker.set(Arc::clone(&new));

    let remover = {
        let tracker = Arc::clone(&tracker);
        thread::spawn(move || tracker.remove(&old))
    };
    remover.join().expect("remover");
    let occupant = tracker.get(0, 0).expect("newer occupant stays");
    assert!(same_individual(&occupant, &new));
}

#[test]
#[should_panic(expected = "outside 2x2 population grid")]
fn out_of_bounds_position_panics() {
    let tracker = FitnessTracker::new(TrackerConfig::with_size(2, 2)).expect("tracker");
    tracker.set(individual(0, 5, Fitness::plain(0.3)));
}
