//! Counting benchmark.
//!
//! Runs the counting workload (N-1 tells plus one ask per entity, every
//! entity concurrently) under the default single-host configuration and a
//! three-host clustered configuration, then prints one report per
//! configuration.
//!
//! ```bash
//! cargo run --example counting_benchmark -- --entities 1000 --iterations 5
//! cargo run --example counting_benchmark -- --json
//! RUST_LOG=moonpool_bench=debug cargo run --example counting_benchmark
//! ```

use std::time::Duration;

use clap::Parser;
use moonpool_bench::workloads::counting::{
    clustered_config, counting_flow, counting_topology, DEFAULT_ENTITY_COUNT, MESSAGES_PER_ENTITY,
};
use moonpool_bench::{BenchmarkConfig, BenchmarkRunner, BenchmarkSuite, RunSettings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "counting_benchmark")]
#[command(
    about = "Drive the counting workload against local and clustered hosts",
    long_about = None
)]
struct Args {
    /// Number of entities
    #[arg(short, long, default_value_t = DEFAULT_ENTITY_COUNT)]
    entities: usize,

    /// Messages sent to each entity per iteration
    #[arg(short, long, default_value_t = MESSAGES_PER_ENTITY)]
    messages: usize,

    /// Measured iterations per configuration
    #[arg(short, long, default_value_t = 3)]
    iterations: usize,

    /// Per-iteration deadline in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Skip the clustered configuration
    #[arg(long)]
    local_only: bool,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,moonpool_bench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut configurations = vec![BenchmarkConfig::default()];
    if !args.local_only {
        configurations.push(clustered_config()?);
    }

    tracing::info!(
        entities = args.entities,
        messages = args.messages,
        configurations = configurations.len(),
        "starting counting benchmark"
    );

    let suite = BenchmarkSuite::new(counting_topology(args.entities), counting_flow(args.messages))
        .with_configurations(configurations);
    let runner = BenchmarkRunner::new(
        RunSettings::default()
            .with_iterations(args.iterations)
            .with_iteration_timeout(Duration::from_secs(args.timeout_secs)),
    );

    // Hosts and actors are !Send.
    let local = tokio::task::LocalSet::new();
    let reports = local.run_until(runner.run_suite(&suite)).await;

    let mut failed = false;
    for report in &reports {
        failed |= !report.outcome.is_passed();
        if args.json {
            println!("{}", report.to_json()?);
        } else {
            println!("{report}");
        }
    }

    if failed {
        return Err("at least one configuration failed".into());
    }
    Ok(())
}
