//! agent-runner: runs the churn-retention agent against a SQLite database.
//!
//! Usage:
//!   agent-runner --db agent.db --cycles 10 --interval-secs 15
//!   agent-runner --config data/agent_config.json --cycles 0      (run until killed)
//!   agent-runner --db agent.db --no-seed

use anyhow::Result;
use retention_core::{
    analytics::ChurnAnalytics,
    clock::AgentClock,
    config::AgentConfig,
    engine::{AgentEngine, CycleReport},
    seed::SeedSummary,
    store::AgentStore,
};
use std::{env, thread, time::Duration};

#[derive(serde::Serialize)]
struct RunSummary {
    db:         String,
    cycles_run: u64,
    seeded:     Option<SeedSummary>,
    last_cycle: Option<CycleReport>,
    analytics:  ChurnAnalytics,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = parse_str(&args, "--db").unwrap_or(":memory:").to_string();
    let config = match parse_str(&args, "--config") {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::reference(),
    };
    let cycles = parse_arg(&args, "--cycles", 1u64);
    let interval = parse_arg(&args, "--interval-secs", config.cycle_interval_secs);
    let seed = !args.iter().any(|a| a == "--no-seed");

    println!("churn retention agent: agent-runner");
    println!("  db:        {db}");
    println!("  cycles:    {}", if cycles == 0 { "until stopped".to_string() } else { cycles.to_string() });
    println!("  interval:  {interval}s");
    println!("  threshold: {:.2}", config.thresholds.churn_threshold);
    println!();

    let store = if db == ":memory:" {
        AgentStore::in_memory()?
    } else {
        AgentStore::open(&db)?
    };
    let mut engine = AgentEngine::build(config, store, AgentClock::system())?;

    let seeded = if seed {
        let summary = engine.seed_demo_data()?;
        if summary.customers > 0 {
            log::info!(
                "seeded {} customers, {} patterns, {} messages",
                summary.customers,
                summary.patterns,
                summary.communications
            );
        }
        Some(summary)
    } else {
        None
    };

    let mut cycles_run = 0;
    let mut last_cycle = None;
    loop {
        let report = engine.run_cycle();
        cycles_run += 1;
        print_cycle(&report);
        last_cycle = Some(report);

        if cycles != 0 && cycles_run >= cycles {
            break;
        }
        thread::sleep(Duration::from_secs(interval));
    }

    let summary = RunSummary {
        db,
        cycles_run,
        seeded,
        last_cycle,
        analytics: engine.analytics()?,
    };
    println!();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_cycle(report: &CycleReport) {
    println!(
        "cycle {:>4} | scored {:>3} | candidates {:>2} | interventions {:>2} | rejected {:>2} | follow-ups {:>2} | learned {:>2} | errors {}",
        report.cycle,
        report.customers_scored,
        report.candidates,
        report.interventions_created,
        report.plans_rejected,
        report.follow_ups,
        report.patterns_updated,
        report.errors,
    );
    for activity in &report.activities {
        println!("    [{}] {}", activity.urgency, activity.description);
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    parse_str(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_str<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}
