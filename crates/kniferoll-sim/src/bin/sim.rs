#![forbid(unsafe_code)]

//! Scenario runner. Exits non-zero when the oracle finds a violation, so
//! a failing seed can go straight into a bug report.

use std::env;

use anyhow::Result;
use clap::Parser;
use kniferoll_sim::{FaultConfig, ScenarioConfig, run_scenario};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "kniferoll-sim: fault-injection scenarios for the prep stores",
    long_about = None
)]
struct Cli {
    /// Seed for the workload and the fault dice.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Concurrent cook tasks.
    #[arg(long, default_value_t = 4)]
    cooks: usize,

    /// Operations each cook attempts.
    #[arg(long, default_value_t = 32)]
    rounds: u32,

    /// Insert failure rate during the storm, in percent.
    #[arg(long, default_value_t = 10)]
    insert_fail: u8,

    /// Update failure rate during the storm, in percent.
    #[arg(long, default_value_t = 10)]
    update_fail: u8,

    /// Delete failure rate during the storm, in percent.
    #[arg(long, default_value_t = 10)]
    delete_fail: u8,

    /// Load failure rate during the storm, in percent.
    #[arg(long, default_value_t = 5)]
    load_fail: u8,

    /// Emit the report as JSON instead of a summary line.
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("KNIFEROLL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "kniferoll_core=debug,kniferoll_sim=debug,info"
        } else {
            "kniferoll_core=info,kniferoll_sim=info,warn"
        })
    });

    let registry = tracing_subscriber::registry().with(filter);
    if env::var("KNIFEROLL_LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(fmt::layer().json().with_ansi(false)).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = ScenarioConfig {
        seed: cli.seed,
        cooks: cli.cooks,
        rounds: cli.rounds,
        fault: FaultConfig {
            insert_fail_percent: cli.insert_fail,
            update_fail_percent: cli.update_fail,
            delete_fail_percent: cli.delete_fail,
            load_fail_percent: cli.load_fail,
        },
    };

    let report = run_scenario(&config).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "scenario complete: ops={} rejected={} faults={} items={} passed={}",
            report.ops_attempted,
            report.ops_rejected,
            report.faults_injected,
            report.final_item_count,
            report.passed
        );
        for violation in &report.violations {
            println!("violation: {violation}");
        }
    }

    if !report.passed {
        std::process::exit(1);
    }
    Ok(())
}
