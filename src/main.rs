//! edgecache demo
//!
//! Runs a synthetic lattice-and-ring shape through the intersection manager
//! twice. The first run computes and stores intersections; the second replays
//! them from the cache.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         edgecache demo                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   Manager    │───▶│ Worker Task  │───▶│  UI Channel  │       │
//! │  │              │    │  (thread)    │    │ (tokio mpsc) │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │                             ▼                                   │
//! │                    EdgeGeometryCache                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use edgecache::adapters::{EdgeSet, MessageLog, SampledEdgeExtractor};
use edgecache::cache::{CacheStats, EdgeGeometryCache};
use edgecache::{AsyncIntersectionManager, EngineConfig, IntersectionEvent, Point, Shape};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Edge intersection cache demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Lattice lines per axis; crossings land on sample positions when
    /// `grid_size + 1` divides 16
    #[arg(long, env = "EDGECACHE_GRID_SIZE", default_value = "15")]
    grid_size: usize,

    /// Intersection tolerance (0 selects an adaptive tolerance)
    #[arg(long, env = "EDGECACHE_TOLERANCE", default_value = "0.001")]
    tolerance: f64,

    /// Points per partial-results batch (overrides the config file)
    #[arg(long, env = "EDGECACHE_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// YAML configuration file
    #[arg(long, env = "EDGECACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

/// Outcome of one pass through the manager
#[derive(Debug, Serialize)]
struct RunSummary {
    run: usize,
    task_id: Uuid,
    points: usize,
    batches: usize,
    duration_ms: u64,
    from_cache: bool,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct Summary {
    edges: usize,
    tolerance: f64,
    runs: Vec<RunSummary>,
    cache: CacheStats,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(batch_size) = args.batch_size {
        config.task.batch_size = batch_size;
    }
    config.validate()?;

    info!("Starting edgecache demo");
    info!("  Grid size: {}", args.grid_size);
    info!("  Tolerance: {}", args.tolerance);
    info!("  Batch size: {}", config.task.batch_size);
    info!("  Memory budget: {} bytes", config.cache.memory_budget_bytes);

    let cache = Arc::new(EdgeGeometryCache::with_config(config.cache.clone()));
    let extractor = Arc::new(
        SampledEdgeExtractor::new(config.sampling.clone()).with_cache(Arc::clone(&cache)),
    );
    let display = Arc::new(MessageLog::new());
    let (tx, mut rx) = unbounded_channel();

    let manager = AsyncIntersectionManager::new(extractor, cache.clone())
        .with_options(config.task.clone())
        .with_display(display.clone())
        .with_event_sender(tx);

    let extent = (args.grid_size + 1) as f64;
    let lattice = EdgeSet::lattice(args.grid_size, 1.0)
        .with_circle(Point::new(extent / 2.0, extent / 2.0, 0.0), extent / 3.0);
    let edges = lattice.len();
    let shape: Arc<dyn Shape> = Arc::new(lattice);

    let mut runs = Vec::new();
    for run in 1..=2 {
        let hits_before = cache.stats().intersection_hits;
        let started = manager.start_intersection_computation(
            Arc::clone(&shape),
            args.tolerance,
            |_| {},
            None::<fn(&[Point], usize)>,
            0,
        );
        let task_id = match (started, manager.current_task_id()) {
            (true, Some(id)) => id,
            _ => anyhow::bail!("intersection computation did not start"),
        };

        let mut summary = drain_task(&mut rx, task_id).await;
        summary.run = run;
        summary.from_cache = cache.stats().intersection_hits > hits_before;

        if !manager.wait_for_current(Some(config.task.cancel_wait)) {
            warn!(%task_id, "Worker still running after its final event");
        }
        info!(
            run,
            points = summary.points,
            from_cache = summary.from_cache,
            "Pass finished"
        );
        runs.push(summary);
    }

    let summary = Summary {
        edges,
        tolerance: args.tolerance,
        runs,
        cache: cache.stats(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, &display);
    }

    info!("Demo complete");
    Ok(())
}

/// Consume UI events for `task_id` until its terminal event
async fn drain_task(rx: &mut UnboundedReceiver<IntersectionEvent>, task_id: Uuid) -> RunSummary {
    let mut summary = RunSummary {
        run: 0,
        task_id,
        points: 0,
        batches: 0,
        duration_ms: 0,
        from_cache: false,
        error: None,
    };

    while let Some(event) = rx.recv().await {
        if event.task_id() != task_id {
            continue;
        }
        match event {
            IntersectionEvent::PartialResults { total_so_far, .. } => {
                summary.batches += 1;
                summary.points = total_so_far;
            }
            IntersectionEvent::Completed {
                points,
                duration_ms,
                ..
            } => {
                summary.points = points.len();
                summary.duration_ms = duration_ms;
                break;
            }
            IntersectionEvent::Error { message, .. } => {
                summary.error = Some(message);
                break;
            }
            IntersectionEvent::Progress { .. } => {}
        }
    }
    summary
}

fn print_summary(summary: &Summary, display: &MessageLog) {
    println!("Shape: {} edges, tolerance {}", summary.edges, summary.tolerance);
    for run in &summary.runs {
        match &run.error {
            Some(error) => println!("  run {}: {}", run.run, error),
            None => println!(
                "  run {}: {} points in {} batches, {} ms{}",
                run.run,
                run.points,
                run.batches,
                run.duration_ms,
                if run.from_cache { " (cached)" } else { "" }
            ),
        }
    }
    println!(
        "Cache: {} entries, {} bytes, hit rate {:.1}%",
        summary.cache.entries(),
        summary.cache.total_memory_bytes,
        summary.cache.hit_rate * 100.0
    );
    println!("Messages:");
    for line in display.lines() {
        println!("  {}", line);
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
