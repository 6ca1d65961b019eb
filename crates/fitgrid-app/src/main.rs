use anyhow::{Context, Result};
use clap::Parser;
use fitgrid_app::{
    AvgFilter, ChannelSink, ExportError, ProducerConfig, ProducerReport, ProgressUpdater,
    SharedTracker, StopOnPerfect, StopSignal, create_snapshot_bus, drain_snapshots,
    export_best_fit, run_filter_round, run_producer,
};
use fitgrid_core::{FitnessSnapshot, FitnessTracker, SelectionError, TrackerConfig};
use fitgrid_render::{ChartSeries, Channel, FitnessChart, GridView};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(
    name = "fitgrid",
    version,
    about = "Track a synthetic grid-based GP population and export its best controller"
)]
struct Cli {
    /// Grid width.
    #[arg(long, env = "FITGRID_SIZE_X", default_value_t = 32)]
    size_x: usize,
    /// Grid height.
    #[arg(long, env = "FITGRID_SIZE_Y", default_value_t = 32)]
    size_y: usize,
    /// Number of producer threads.
    #[arg(long, env = "FITGRID_WORKERS", default_value_t = 4)]
    workers: usize,
    /// Individuals placed by each producer.
    #[arg(long, env = "FITGRID_PLACEMENTS", default_value_t = 5_000)]
    placements: usize,
    /// Output dimensions (degrees of freedom) per individual.
    #[arg(long, env = "FITGRID_DIMENSIONS", default_value_t = 2)]
    dimensions: usize,
    /// Base seed; producer `i` uses `seed + i`.
    #[arg(long, env = "FITGRID_SEED", default_value_t = 0xF17_0001)]
    seed: u64,
    /// Fewest occupied cells for which statistics are published.
    #[arg(long, env = "FITGRID_MIN_SAMPLE", default_value_t = fitgrid_core::MIN_SAMPLE_SIZE)]
    min_sample_size: usize,
    #[arg(long, env = "FITGRID_STATS_HZ", default_value_t = 2.0)]
    stats_rate_hz: f64,
    #[arg(long, env = "FITGRID_GRID_HZ", default_value_t = 24.0)]
    grid_redraw_rate_hz: f64,
    #[arg(long, env = "FITGRID_CHART_HZ", default_value_t = 2.0)]
    chart_rate_hz: f64,
    #[arg(long, env = "FITGRID_CHART_CAPACITY", default_value_t = 1_000)]
    chart_capacity: usize,
    /// Stop all producers once a perfect individual is placed.
    #[arg(long, env = "FITGRID_STOP_ON_PERFECT")]
    stop_on_perfect: bool,
    /// Run average-filter rounds when the mean actual fitness drops below this bound.
    #[arg(long, env = "FITGRID_FILTER_BOUND")]
    filter_bound: Option<f64>,
    /// Minimum milliseconds between filter rounds.
    #[arg(long, env = "FITGRID_FILTER_INTERVAL_MS", default_value_t = 2_000)]
    filter_interval_ms: u64,
    /// Write the best-fit controller to this file.
    #[arg(long, env = "FITGRID_OUTPUT")]
    output: Option<PathBuf>,
    /// Write the final grid frame as text to this file.
    #[arg(long, env = "FITGRID_GRID_SNAPSHOT")]
    grid_snapshot: Option<PathBuf>,
    /// Write a JSON run report to this file.
    #[arg(long, env = "FITGRID_REPORT")]
    report: Option<PathBuf>,
}

impl Cli {
    fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            size_x: self.size_x,
            size_y: self.size_y,
            min_sample_size: self.min_sample_size,
            stats_rate_hz: self.stats_rate_hz,
            grid_redraw_rate_hz: self.grid_redraw_rate_hz,
            chart_rate_hz: self.chart_rate_hz,
            chart_capacity: self.chart_capacity,
        }
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    config: TrackerConfig,
    producers: Vec<ProducerReport>,
    snapshots_received: usize,
    final_snapshot: FitnessSnapshot,
    actual_chart: [ChartSeries; 4],
    guidance_chart: [ChartSeries; 4],
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(&cli)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.tracker_config();
    let tracker: SharedTracker =
        Arc::new(FitnessTracker::new(config.clone()).context("invalid tracker configuration")?);

    let view = GridView::new(config.size_x, config.size_y, Channel::Actual, config.grid_redraw_interval());
    let actual_chart = FitnessChart::new(Channel::Actual, config.chart_interval(), config.chart_capacity);
    let guidance_chart =
        FitnessChart::new(Channel::Guidance, config.chart_interval(), config.chart_capacity);
    let stop = StopSignal::default();
    let (tx, rx) = create_snapshot_bus(64);

    tracker.add_observer(Box::new(view.clone()));
    if cli.stop_on_perfect {
        tracker.add_observer(Box::new(StopOnPerfect::new(Arc::clone(&stop))));
    }
    tracker.add_sink(Box::new(view.clone()));
    tracker.add_sink(Box::new(actual_chart.clone()));
    tracker.add_sink(Box::new(guidance_chart.clone()));
    tracker.add_sink(Box::new(ChannelSink::new(tx)));
    tracker.start_observing().context("failed to start observing")?;

    let filter = cli
        .filter_bound
        .map(|bound| AvgFilter::new(bound, Duration::from_millis(cli.filter_interval_ms)));
    let producer_config = ProducerConfig {
        seed: cli.seed,
        placements: cli.placements,
        dimensions: cli.dimensions.max(1),
    };
    let mut snapshots_received = 0usize;
    let log_snapshot = |snapshot: FitnessSnapshot| {
        debug!(
            sequence = snapshot.sequence,
            cells = snapshot.sample_size,
            actual_mean = snapshot.actual.mean,
            actual_dev = snapshot.actual.dev,
            actual_max = snapshot.actual.max,
            guidance_mean = snapshot.guidance.mean,
            "population statistics"
        );
    };

    info!(workers = cli.workers, placements = cli.placements, "starting producers");
    let producers = thread::scope(|scope| {
        let handles: Vec<thread::ScopedJoinHandle<'_, ProducerReport>> = (0..cli.workers)
            .map(|worker| {
                let tracker = Arc::clone(&tracker);
                let stop = Arc::clone(&stop);
                thread::Builder::new()
                    .name(format!("fitgrid-producer-{worker}"))
                    .spawn_scoped(scope, move || run_producer(&tracker, worker, producer_config, &stop))
            })
            .collect::<std::io::Result<_>>()
            .context("failed to spawn producer threads")?;

        while !handles.iter().all(|handle| handle.is_finished()) {
            thread::sleep(config.chart_interval().min(Duration::from_millis(50)));
            snapshots_received += drain_snapshots(&rx, log_snapshot);
            if let Some(filter) = &filter {
                run_filter_round(&tracker, filter);
            }
        }
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("producer thread panicked"))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    tracker.stop_observing();
    snapshots_received += drain_snapshots(&rx, log_snapshot);

    let final_snapshot = tracker.snapshot();
    info!(
        cells = tracker.occupied(),
        snapshots = snapshots_received,
        actual_mean = final_snapshot.actual.mean,
        actual_max = final_snapshot.actual.max,
        guidance_mean = final_snapshot.guidance.mean,
        stopped_on_perfect = stop.load(std::sync::atomic::Ordering::Acquire),
        "finished run"
    );

    if let Some(path) = &cli.grid_snapshot {
        write_file(path, view.frame().to_ascii())?;
    }
    if let Some(path) = &cli.report {
        let report = RunReport {
            config,
            producers,
            snapshots_received,
            final_snapshot,
            actual_chart: actual_chart.series(),
            guidance_chart: guidance_chart.series(),
        };
        let json = serde_json::to_string_pretty(&report).context("failed to serialize run report")?;
        write_file(path, json)?;
    }
    if let Some(path) = &cli.output {
        export(&tracker, path)?;
    }
    Ok(())
}

fn export(tracker: &FitnessTracker, path: &Path) -> Result<()> {
    let winners = tracker.get_best_fit_ind().len();
    let progress = ProgressUpdater::new(
        winners,
        Box::new(|current, total| debug!(current, total, "sized candidate individual")),
    );
    match export_best_fit(tracker, path, Some(&progress)) {
        Ok(candidate) => {
            println!(
                "The controller's fitness is: {:05.2}%",
                candidate.individual.fitness().actual_or_zero() * 100.0
            );
            Ok(())
        }
        Err(ExportError::Selection(SelectionError::EmptySelection)) => {
            error!("there is no single individual available; nothing exported");
            eprintln!("error: the population is empty, no controller was exported");
            Ok(())
        }
        Err(err) => Err(err).context("failed to export the best-fit controller"),
    }
}

fn write_file(path: &Path, contents: String) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
