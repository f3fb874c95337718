//! `syringe-sim stream`: run the line headlessly and print one line per interval.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use syringe_sim_core::{Snapshot, StreamConfig, StreamController, SummaryMetrics, TagId};

pub fn run(
    config: StreamConfig,
    intervals: Option<u64>,
    duration: Option<&str>,
    output: Option<&str>,
) {
    let max_duration = match duration.map(super::parse_duration).transpose() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    println!("Streaming inspection data");
    println!("  Batch:        {}", config.batch_name);
    println!("  Interval:     {}s", config.stream_speed_secs);
    println!("  Inspections:  {}/interval", config.inspections_per_interval);
    println!(
        "  Defect rates: flange {:.1}%  glass {:.1}%  wall {:.1}%",
        config.rates.flange, config.rates.glass, config.rates.wall
    );
    match (intervals, max_duration) {
        (Some(n), _) => println!("  Stop after:   {n} intervals"),
        (None, Some(d)) => println!("  Stop after:   {}s", d.as_secs()),
        (None, None) => println!("  Stop after:   Ctrl+C"),
    }
    if let Some(path) = output {
        println!("  Output:       {path}");
    }
    println!();

    let rt = super::runtime();
    let (intervals_run, metrics, export) = rt.block_on(async {
        let batch = config.batch_name.clone();
        let controller = StreamController::spawn(config);
        let mut updates = controller.subscribe();
        controller.start();

        let start = Instant::now();
        let mut seen = 0u64;
        while running.load(Ordering::SeqCst) {
            if let Some(max) = max_duration
                && start.elapsed() >= max
            {
                break;
            }
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = updates.borrow_and_update().clone();
                    let count = interval_count(&snapshot);
                    if count > seen {
                        seen = count;
                        let metrics = SummaryMetrics::from_snapshot(&snapshot, &batch);
                        println!("{}", format_interval(seen, &snapshot, &metrics));
                    }
                    if intervals.is_some_and(|limit| seen >= limit) {
                        break;
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            }
        }

        controller.stop();
        let export = output.map(|path| controller.export(Path::new(path)));
        let metrics = controller.metrics();
        let intervals_run = controller.session().intervals;
        controller.shutdown().await;
        (intervals_run, metrics, export)
    });

    println!();
    println!(
        "Stopped after {intervals_run} intervals: {} inspected, {} defects, defect rate {}",
        metrics.total_inspected,
        metrics.total_defects,
        metrics.defect_rate_display()
    );

    match export {
        Some(Ok(summary)) => println!(
            "Saved {} samples to {} ({})",
            summary.rows,
            summary.path.display(),
            summary.format
        ),
        Some(Err(e)) => {
            eprintln!("Error saving data: {e}");
            std::process::exit(1);
        }
        None => {}
    }
}

fn interval_count(snapshot: &Snapshot) -> u64 {
    snapshot.cumulative.series(TagId::Inspected).len() as u64
}

/// One status line: running totals plus the latest per-category counts.
fn format_interval(n: u64, snapshot: &Snapshot, metrics: &SummaryMetrics) -> String {
    let latest = |tag: TagId| {
        snapshot
            .latest(tag)
            .and_then(|s| s.count_value())
            .unwrap_or(0)
    };
    format!(
        "#{n:<4} inspected {:>7}  defects {:>5}  rate {:>6}  [flange {} glass {} wall {}]",
        metrics.total_inspected,
        metrics.total_defects,
        metrics.defect_rate_display(),
        latest(TagId::FlangeDefects),
        latest(TagId::GlassDefects),
        latest(TagId::WallDefects),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use syringe_sim_core::{Sample, SampleStore};

    use super::*;

    fn snapshot_after_one_interval() -> Snapshot {
        let now = Utc::now();
        let mut store = SampleStore::new();
        store.append([
            Sample::batch_marker("Batch-1", now),
            Sample::count(TagId::FlangeDefects, 5, now),
            Sample::count(TagId::GlassDefects, 7, now),
            Sample::count(TagId::WallDefects, 4, now),
            Sample::count(TagId::TotalDefects, 16, now),
            Sample::count(TagId::Inspected, 500, now),
        ]);
        store.recompute_cumulative();
        store.snapshot()
    }

    #[test]
    fn test_interval_count_ignores_marker() {
        assert_eq!(interval_count(&Snapshot::default()), 0);
        assert_eq!(interval_count(&snapshot_after_one_interval()), 1);
    }

    #[test]
    fn test_format_interval_line() {
        let snapshot = snapshot_after_one_interval();
        let metrics = SummaryMetrics::from_snapshot(&snapshot, "Batch-1");
        let line = format_interval(1, &snapshot, &metrics);
        assert!(line.starts_with("#1 "));
        assert!(line.contains("inspected     500"));
        assert!(line.contains("rate  3.20%"));
        assert!(line.ends_with("[flange 5 glass 7 wall 4]"));
    }
}
