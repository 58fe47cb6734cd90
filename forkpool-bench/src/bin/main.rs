//! forkpool-bench: runs the sequential and fork-join variant of each workload
//! on the same seeded input, checks they agree and prints the timings.

use anyhow::Context;
use clap::Parser;
use forkpool::Builder;
use forkpool_bench::{Report, Workload, workloads};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "forkpool-bench", version, about)]
struct Cli {
    /// Workloads to run, all of them when omitted.
    #[arg(long, short, value_enum, value_delimiter = ',')]
    workload: Vec<Workload>,

    /// Worker threads, one per core when omitted.
    #[arg(long, short, env = "FORKPOOL_THREADS")]
    threads: Option<usize>,

    /// Number of input elements per workload.
    #[arg(long, short, env = "FORKPOOL_SIZE", default_value_t = 100_000)]
    size: usize,

    /// Seed of the input generators.
    #[arg(long, env = "FORKPOOL_SEED", default_value_t = 42)]
    seed: u64,

    /// Runs per workload, the fastest run of each variant is reported.
    #[arg(long, short, env = "FORKPOOL_REPEAT", default_value_t = 3)]
    repeat: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(cli.repeat > 0, "--repeat must be at least 1");

    let mut builder = Builder::new().thread_name("forkpool-bench");
    if let Some(threads) = cli.threads {
        anyhow::ensure!(threads > 0, "--threads must be at least 1");
        builder = builder.worker_threads(threads);
    }
    let pool = builder.try_build().context("failed to build thread pool")?;

    info!(
        threads = pool.num_threads(),
        size = cli.size,
        seed = cli.seed,
        "starting benchmark"
    );

    let selected = if cli.workload.is_empty() {
        Workload::ALL.to_vec()
    } else {
        cli.workload
    };

    println!(
        "{:<12} {:>10} {:>14} {:>14} {:>8}",
        "workload", "size", "sequential", "parallel", "speedup"
    );
    for workload in selected {
        let best = best_of(cli.repeat, || {
            workloads::run(&pool, workload, cli.size, cli.seed)
        })
        .with_context(|| format!("workload {workload} failed"))?;

        println!(
            "{:<12} {:>10} {:>14} {:>14} {:>7.2}x",
            best.workload.name(),
            best.size,
            millis(best.sequential),
            millis(best.parallel),
            best.speedup()
        );
    }

    let stats = pool.stats();
    info!(
        executed = stats.jobs_executed,
        stolen = stats.jobs_stolen,
        parks = stats.parks,
        roots = stats.roots_submitted,
        "pool stats"
    );

    if let Err(e) = pool.shutdown() {
        warn!(error = ?e, "thread pool did not shut down cleanly");
    }
    Ok(())
}

/// Fastest sequential and fastest parallel time over `repeat` runs.
fn best_of(
    repeat: usize,
    mut run: impl FnMut() -> anyhow::Result<Report>,
) -> anyhow::Result<Report> {
    let mut best = run()?;
    for _ in 1..repeat {
        let next = run()?;
        best.sequential = best.sequential.min(next.sequential);
        best.parallel = best.parallel.min(next.parallel);
    }
    Ok(best)
}

fn millis(d: Duration) -> String {
    format!("{:.3} ms", d.as_secs_f64() * 1e3)
}
