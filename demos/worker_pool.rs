//! Worker pool demonstration
//!
//! Runs three pools back to back:
//! 1. A basic pool doubling task ids with simulated work
//! 2. A rate limited pool admitting two tasks per second per worker
//! 3. A pool that adds one worker when the backlog is high
//!
//! Run with: `cargo run --example worker_pool`
//!
//! Set RUST_LOG to control log levels:
//! - `RUST_LOG=info` - Pool start, scale-up and completion (default)
//! - `RUST_LOG=rust_worker_pool=debug` - Per-task worker events

use rust_worker_pool::prelude::*;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const NUM_WORKERS: usize = 3;
const NUM_TASKS: i64 = 10;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,rust_worker_pool=info")),
        )
        .init();

    println!("=== Worker Pool Demo ===\n");

    println!("1. Basic Worker Pool");
    let config = PoolConfig::new(NUM_WORKERS).with_thread_name_prefix("basic");
    let report = pipeline::run(
        config,
        Doubler::with_work(Duration::from_millis(100)),
        1..=NUM_TASKS,
    )?;
    for result in report.sorted_results() {
        println!(
            "   Task {:>2} -> {:>2} (worker {})",
            result.task_id(),
            result.value().unwrap_or_default(),
            result.worker_id
        );
    }
    println!("   Statistics - {}\n", report.stats);

    println!("2. Rate Limited Worker Pool");
    let config = PoolConfig::new(NUM_WORKERS)
        .with_thread_name_prefix("limited")
        .with_rate_limit(RateLimitConfig::per_second(2.0));
    let report = pipeline::run(config, Doubler::new(), 1..=NUM_TASKS)?;
    for result in &report.results {
        println!(
            "   Got rate-limited result for task {}: {}",
            result.task_id(),
            result.value().unwrap_or_default()
        );
    }
    println!("   Finished in {:.2}s\n", report.elapsed.as_secs_f64());

    println!("3. Dynamic Worker Pool");
    let config = PoolConfig::new(2)
        .with_thread_name_prefix("dynamic")
        .with_scaling(ScalingPolicy::OneShot {
            backlog_threshold: 5,
        });
    let report = pipeline::run(
        config,
        Doubler::with_work(Duration::from_millis(50)),
        1..=NUM_TASKS,
    )?;
    match report.scale_decision {
        ScaleDecision::AddedWorker { worker_id, depth } => {
            println!("   Backlog of {} tasks, added worker {}", depth, worker_id)
        }
        other => println!("   No worker added ({:?})", other),
    }
    for result in &report.results {
        println!(
            "   Got dynamic result for task {}: {}",
            result.task_id(),
            result.value().unwrap_or_default()
        );
    }

    println!("\n{}", report);
    println!("{}", report.to_json()?);
    println!("\n=== Demo Complete ===");
    Ok(())
}
