//! Powersched Simulation CLI
//!
//! Runs one process set under several scheduling disciplines and compares them.

use std::fs;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use powersched_simulation_engine::{
    metrics::TimelineMetrics,
    types::{AlgorithmKind, Process, Timeline},
    Simulator,
};

#[derive(Parser, Debug)]
#[command(name = "powersched-sim")]
#[command(about = "Compare CPU scheduling disciplines on a process set", long_about = None)]
struct Args {
    /// JSON file with an array of processes ({"id", "burst", "priority", optional "arrival"}); demo set if omitted
    #[arg(short, long)]
    processes: Option<String>,

    /// Algorithms to compare (comma-separated: fcfs,round_robin,priority,sjf,srtf)
    #[arg(short, long, default_value = "fcfs,round_robin,priority,sjf,srtf")]
    algorithms: String,

    /// Round Robin quantum (ticks)
    #[arg(short, long, default_value_t = 2)]
    quantum: u32,

    /// Print the tick-by-tick timeline for each algorithm
    #[arg(long)]
    show_timeline: bool,

    /// Output JSON file path (optional)
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(Serialize)]
struct ComparisonEntry {
    timeline: Timeline,
    metrics: TimelineMetrics,
}

fn load_processes(path: Option<&str>) -> anyhow::Result<Vec<Process>> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            let processes = serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
            Ok(processes)
        }
        None => Ok(Process::demo_set()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "powersched_simulation_engine=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let processes = load_processes(args.processes.as_deref())?;
    let simulator = Simulator::with_quantum(args.quantum);

    println!("Configuration:");
    println!("  Processes: {}", processes.len());
    println!("  Round Robin quantum: {} ticks\n", args.quantum);

    println!("{:<8} {:>8} {:>8} {:>8}", "PID", "Burst", "Priority", "Arrival");
    for p in &processes {
        println!("{:<8} {:>8} {:>8} {:>8}", p.id, p.burst, p.priority, p.arrival);
    }
    println!();

    let mut results = Vec::new();

    for name in args.algorithms.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let algorithm = match name.parse::<AlgorithmKind>() {
            Ok(algorithm) => algorithm,
            Err(e) => {
                warn!("{e}");
                continue;
            }
        };

        let timeline = simulator.simulate(&processes, algorithm)?;
        let metrics = TimelineMetrics::compute(&timeline, &processes);
        info!(algorithm = %algorithm, ticks = timeline.len(), "Simulated");

        if args.show_timeline {
            let trace: Vec<String> = timeline.pids().map(|pid| format!("P{pid}")).collect();
            println!("{:<20} {}", algorithm.label(), trace.join(" "));
        }

        results.push(ComparisonEntry { timeline, metrics });
    }

    if args.show_timeline {
        println!();
    }

    println!(
        "{:<20} {:>8} {:>10} {:>10} {:>12} {:>10} {:>12}",
        "Algorithm", "Ticks", "Switches", "Avg Wait", "Avg Turnarnd", "Avg Resp", "Throughput"
    );
    println!("{}", "-".repeat(88));

    for entry in &results {
        let m = &entry.metrics;
        println!(
            "{:<20} {:>8} {:>10} {:>10.2} {:>12.2} {:>10.2} {:>12.2}",
            m.algorithm.label(),
            m.total_ticks,
            m.context_switches,
            m.average_waiting_time,
            m.average_turnaround_time,
            m.average_response_time,
            m.throughput,
        );
    }

    if let Some(best) = results.iter().min_by(|a, b| {
        a.metrics
            .average_waiting_time
            .total_cmp(&b.metrics.average_waiting_time)
    }) {
        println!("\nLowest average wait: {}", best.metrics.algorithm.label());
    }

    if let Some(output_path) = args.output {
        let json = serde_json::to_string_pretty(&results)?;
        fs::write(&output_path, json).with_context(|| format!("writing {output_path}"))?;
        println!("Results saved to {output_path}");
    }

    Ok(())
}
