//! Chaos simulation binary.
//!
//! # Usage
//!
//! ```bash
//! # One run with the default schedule
//! carelink-sim --seed 42
//!
//! # Sweep 100 seeds with slow links and frequent failures
//! carelink-sim --seed 0 --runs 100 --max-latency-ms 2000 --failure-percent 25
//!
//! # Keep focus on the current chat when messages arrive elsewhere
//! carelink-sim --focus stay
//! ```

use std::time::Duration;

use carelink_client::FocusPolicy;
use carelink_harness::{ChaosConfig, chaos};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Focus reaction to messages for background chats.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Focus {
    /// Switch to the chat the message arrived in
    Follow,
    /// Stay on the current chat
    Stay,
}

impl From<Focus> for FocusPolicy {
    fn from(focus: Focus) -> Self {
        match focus {
            Focus::Follow => Self::FollowMessage,
            Focus::Stay => Self::Stay,
        }
    }
}

/// Messaging sync chaos simulator
#[derive(Parser, Debug)]
#[command(name = "carelink-sim")]
#[command(about = "Seeded chaos runs of the messaging sync core")]
#[command(version)]
struct Args {
    /// First seed
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Number of consecutive seeds to run
    #[arg(short, long, default_value = "1")]
    runs: u64,

    /// Random steps per run
    #[arg(long, default_value = "200")]
    steps: usize,

    /// Chance per step, in percent, of arming a send or fetch failure
    #[arg(long, default_value = "10")]
    failure_percent: u32,

    /// Upper bound of per-request latency in milliseconds
    #[arg(long, default_value = "400")]
    max_latency_ms: u64,

    /// Fallback poll period in seconds
    #[arg(long, default_value = "8")]
    poll_interval_secs: u64,

    /// Reaction to messages for background chats
    #[arg(long, value_enum, default_value = "follow")]
    focus: Focus,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()?;

    let mut diverged = 0u64;
    for seed in args.seed..args.seed.saturating_add(args.runs) {
        let config = ChaosConfig {
            seed,
            steps: args.steps,
            failure_percent: args.failure_percent,
            max_latency_ms: args.max_latency_ms,
            focus_policy: args.focus.into(),
            poll_interval: Duration::from_secs(args.poll_interval_secs),
        };

        let report = runtime.block_on(chaos::run(&config))?;
        if report.converged() {
            tracing::info!(
                seed,
                sends = report.sends,
                peer_messages = report.peer_messages,
                disconnects = report.disconnects,
                lost_events = report.lost_events,
                fetches = report.fetches,
                "run converged"
            );
        } else {
            diverged += 1;
            tracing::warn!(
                seed,
                missing = ?report.missing,
                unexpected = ?report.unexpected,
                "run diverged from server"
            );
        }
    }

    tracing::info!(runs = args.runs, diverged, "simulation finished");
    if diverged > 0 {
        return Err(format!("{diverged} of {} runs diverged", args.runs).into());
    }
    Ok(())
}
