//! meshsim CLI
//!
//! Run deterministic discrete-event network simulations with configurable
//! parameters.
//!
//! # Example
//!
//! ```bash
//! # Four hosts on two workers for 30 simulated seconds
//! meshsim --hosts 4 -w 2 -p 2 -d 30 --seed 42
//!
//! # A lossy network with more parallelism
//! meshsim --hosts 100 -w 8 -p 4 --reliability 0.9 --latency-ms 50
//! ```

use clap::Parser;
use meshsim_runtime::SimulationConfig;
use meshsim_simulator::{Runner, RunnerConfig};
use meshsim_types::SimulationTime;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// meshsim discrete-event network simulator
///
/// Advances simulated time in synchronous rounds over a pool of worker
/// threads. Reproducible when the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "meshsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of simulated hosts
    #[arg(long, default_value = "4")]
    hosts: usize,

    /// Number of worker threads
    #[arg(short = 'w', long, default_value = "1")]
    workers: usize,

    /// Upper bound on the number of logical processors
    #[arg(short = 'p', long, default_value = "1")]
    parallelism: usize,

    /// Simulated duration in seconds
    #[arg(short = 'd', long, default_value = "30")]
    duration: u64,

    /// Seed for all deterministic random streams
    #[arg(long, default_value = "1")]
    seed: u64,

    /// One-way path latency in milliseconds
    #[arg(long, default_value = "20.0")]
    latency_ms: f64,

    /// Path reliability (0.0-1.0)
    #[arg(long, default_value = "1.0")]
    reliability: f64,

    /// Simulated milliseconds between a host's pings
    #[arg(long, default_value = "100")]
    ping_interval_ms: u64,

    /// End of the bootstrap phase (no reliability drops before this), in
    /// simulated seconds
    #[arg(long, default_value = "0")]
    bootstrap_secs: u64,

    /// Disable per-worker object allocation counters
    #[arg(long)]
    no_object_counters: bool,

    /// Disable pinning worker threads to CPUs
    #[arg(long)]
    no_cpu_pinning: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,meshsim=info,meshsim_simulator=info")),
        )
        .init();

    let args = Args::parse();

    let config = RunnerConfig {
        hosts: args.hosts,
        latency_ms: args.latency_ms,
        reliability: args.reliability.clamp(0.0, 1.0),
        ping_interval: SimulationTime::from_millis(args.ping_interval_ms),
        simulation: SimulationConfig {
            workers: args.workers,
            parallelism: args.parallelism,
            use_object_counters: !args.no_object_counters,
            use_cpu_pinning: !args.no_cpu_pinning,
            bootstrap_end_secs: args.bootstrap_secs,
            stop_secs: args.duration,
            seed: args.seed,
        },
    };

    info!(
        hosts = config.hosts,
        workers = config.simulation.workers,
        parallelism = config.simulation.parallelism,
        duration_secs = args.duration,
        seed = args.seed,
        latency_ms = config.latency_ms,
        reliability = config.reliability,
        "starting meshsim"
    );

    let runner = match Runner::new(config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("meshsim: {e}");
            std::process::exit(1);
        }
    };

    let stats = runner.run();

    info!(
        rounds = stats.rounds,
        events = stats.events_executed,
        packets = stats.packets_sent,
        plugin_errors = stats.plugin_errors,
        end_time = %stats.end_time,
        "run complete"
    );

    println!(
        "simulated {} across {} rounds: {} events, {} packets",
        stats.end_time, stats.rounds, stats.events_executed, stats.packets_sent
    );
}
