//! Powersched - scheduler playback with battery-aware alerting
//!
//! Session events are written to stdout as JSON lines; logs go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! # Play one algorithm, exit when the run completes
//! powersched run --algorithm round_robin
//!
//! # Same, with a synthetic battery feeding the alert state machine
//! powersched run --algorithm priority --monitor --start-battery 25
//!
//! # Alerts only, replaying a recorded trace (JSON lines)
//! powersched monitor --replay trace.jsonl
//!
//! # Ask the advisor which discipline suits the current power state
//! powersched recommend --battery 35 --cpu 80
//!
//! # Print a simulated timeline
//! powersched simulate --algorithm srtf
//! ```

use std::path::PathBuf;
use std::pin::Pin;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use powersched_orchestrator::{EventSink, PowerMonitor, Session, SessionConfig, SessionEvent, TracePowerSource};
use powersched_simulation_engine::advisor::{decide, recommend, SystemSnapshot};
use powersched_simulation_engine::power_data::PowerTraceGenerator;
use powersched_simulation_engine::{AlgorithmKind, PowerSample, Simulator};

type SampleStream = Pin<Box<dyn Stream<Item = PowerSample> + Send>>;

/// Powersched: CPU scheduling playback with battery impact and power alerts
#[derive(Parser)]
#[command(name = "powersched")]
#[command(about = "CPU scheduling playback with battery impact and power alerts", long_about = None)]
struct Cli {
    /// Session configuration file (JSON)
    #[arg(long, global = true, env = "POWERSCHED_CONFIG")]
    config: Option<PathBuf>,

    /// Wall time between playback ticks (ms)
    #[arg(long, global = true, env = "POWERSCHED_TICK_INTERVAL_MS")]
    tick_interval_ms: Option<u64>,

    /// Wall time between battery impact drift updates (ms)
    #[arg(long, global = true, env = "POWERSCHED_DRIFT_INTERVAL_MS")]
    drift_interval_ms: Option<u64>,

    /// Round Robin quantum (ticks)
    #[arg(long, global = true, env = "POWERSCHED_QUANTUM")]
    quantum: Option<u32>,

    /// Battery percent at or below which the low-battery alert fires
    #[arg(long, global = true, env = "POWERSCHED_LOW_BATTERY_THRESHOLD")]
    low_battery_threshold: Option<u8>,

    /// Power monitor polling interval (ms)
    #[arg(long, global = true, env = "POWERSCHED_MONITOR_INTERVAL_MS")]
    monitor_interval_ms: Option<u64>,

    /// Fixed seed for battery impact drift
    #[arg(long, global = true, env = "POWERSCHED_IMPACT_SEED")]
    impact_seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate and play one algorithm, streaming session events
    Run {
        /// Scheduling algorithm (fcfs, round_robin, priority, sjf, srtf)
        #[arg(long, default_value = "fcfs")]
        algorithm: String,

        /// Feed a synthetic battery trace through the alert state machine
        #[arg(long)]
        monitor: bool,

        /// Keep monitoring after the run completes (until Ctrl+C)
        #[arg(long)]
        follow: bool,

        #[command(flatten)]
        synthetic: SyntheticArgs,
    },

    /// Power alerts only (no simulation)
    Monitor {
        /// Replay a JSON-lines trace instead of the synthetic battery
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Stop after this many samples
        #[arg(long)]
        samples: Option<usize>,

        #[command(flatten)]
        synthetic: SyntheticArgs,
    },

    /// Recommend a scheduling algorithm for the given power state
    Recommend {
        /// Battery level (percent)
        #[arg(long)]
        battery: f64,

        /// Charger connected
        #[arg(long)]
        charging: bool,

        /// CPU load (percent)
        #[arg(long, default_value_t = 30.0)]
        cpu: f64,

        /// Play the recommended run with the runnable processes
        #[arg(long)]
        start: bool,
    },

    /// Print a simulated timeline as JSON
    Simulate {
        /// Scheduling algorithm (fcfs, round_robin, priority, sjf, srtf)
        #[arg(long, default_value = "fcfs")]
        algorithm: String,
    },
}

/// Synthetic battery trace parameters
#[derive(Args, Debug, Clone)]
struct SyntheticArgs {
    /// Starting battery level (percent)
    #[arg(long, default_value_t = 60.0)]
    start_battery: f64,

    /// Battery drained per sample while unplugged (percent)
    #[arg(long, default_value_t = 0.8)]
    drain: f64,

    /// Chance per sample that the charger is plugged or unplugged
    #[arg(long, default_value_t = 0.02)]
    toggle_probability: f64,

    /// Start with the charger connected
    #[arg(long)]
    plugged: bool,

    /// Trace seed (random when omitted; logged for reproduction)
    #[arg(long)]
    seed: Option<u64>,
}

/// Prints events as JSON lines and reports completed runs back to the CLI loop
struct StdoutSink {
    completed: mpsc::UnboundedSender<Uuid>,
}

impl EventSink for StdoutSink {
    fn emit(&self, event: SessionEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "Failed to serialize event"),
        }

        if let SessionEvent::RunCompleted { run_id } = event {
            let _ = self.completed.send(run_id);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (stderr, so stdout carries only events)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "powersched=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            algorithm,
            monitor,
            follow,
            synthetic,
        } => {
            let algorithm: AlgorithmKind = algorithm.parse()?;
            let samples: SampleStream = if monitor {
                synthetic_stream(&synthetic, &config)?
            } else {
                Box::pin(futures::stream::pending::<PowerSample>())
            };
            run(config, algorithm, samples, follow).await
        }
        Commands::Monitor {
            replay,
            samples,
            synthetic,
        } => {
            let stream = match replay {
                Some(path) => {
                    let source = TracePowerSource::load(&path)
                        .with_context(|| format!("loading trace {}", path.display()))?;
                    PowerMonitor::with_interval(source, config.monitor_interval())
                        .with_smoothing(config.smoothing_window)
                        .monitor_stream()
                }
                None => synthetic_stream(&synthetic, &config)?,
            };
            let stream: SampleStream = match samples {
                Some(n) => Box::pin(stream.take(n)),
                None => stream,
            };
            monitor_only(config, stream).await
        }
        Commands::Recommend {
            battery,
            charging,
            cpu,
            start,
        } => {
            let snapshot = SystemSnapshot {
                battery_percent: battery,
                charging,
                cpu_percent: cpu,
            };
            recommend_cmd(config, snapshot, start).await
        }
        Commands::Simulate { algorithm } => {
            let algorithm: AlgorithmKind = algorithm.parse()?;
            let timeline = Simulator::new(config.simulator_config()).simulate(&config.processes, algorithm)?;
            println!("{}", serde_json::to_string_pretty(&timeline)?);
            Ok(())
        }
    }
}

/// Config file (if any), then CLI/env overrides
fn load_config(cli: &Cli) -> anyhow::Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    if let Some(v) = cli.tick_interval_ms {
        config.tick_interval_ms = v;
    }
    if let Some(v) = cli.drift_interval_ms {
        config.drift_interval_ms = v;
    }
    if let Some(v) = cli.quantum {
        config.quantum = v;
    }
    if let Some(v) = cli.low_battery_threshold {
        config.low_battery_threshold = v;
    }
    if let Some(v) = cli.monitor_interval_ms {
        config.monitor_interval_ms = v;
    }
    if cli.impact_seed.is_some() {
        config.impact_seed = cli.impact_seed;
    }

    config.validate()?;
    Ok(config)
}

fn synthetic_stream(args: &SyntheticArgs, config: &SessionConfig) -> anyhow::Result<SampleStream> {
    let seed = args.seed.unwrap_or_else(rand::random);
    info!(
        seed,
        start_battery = args.start_battery,
        drain = args.drain,
        plugged = args.plugged,
        "Using synthetic power trace"
    );

    let generator = PowerTraceGenerator::new(args.start_battery, args.drain, args.toggle_probability)
        .context("invalid synthetic trace parameters")?
        .with_seed(seed)
        .plugged(args.plugged);

    Ok(PowerMonitor::with_interval(generator, config.monitor_interval())
        .with_smoothing(config.smoothing_window)
        .monitor_stream())
}

fn stdout_session(config: SessionConfig) -> (Session<StdoutSink>, mpsc::UnboundedReceiver<Uuid>) {
    let (completed, completed_rx) = mpsc::unbounded_channel();
    (Session::new(config, StdoutSink { completed }), completed_rx)
}

async fn run(config: SessionConfig, algorithm: AlgorithmKind, samples: SampleStream, follow: bool) -> anyhow::Result<()> {
    let (mut session, completed_rx) = stdout_session(config);

    let run_id = session.start_simulation(algorithm).await?;
    info!(run_id = %run_id, algorithm = %algorithm, "Playing; Ctrl+C to stop");

    drive(&mut session, run_id, completed_rx, samples, follow).await;
    session.shutdown().await;
    Ok(())
}

async fn monitor_only(config: SessionConfig, mut samples: SampleStream) -> anyhow::Result<()> {
    let (mut session, _completed_rx) = stdout_session(config);
    info!("Monitoring power; Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Exiting monitor");
                break;
            }
            sample = samples.next() => match sample {
                Some(sample) => {
                    session.handle_power_sample(sample);
                }
                None => {
                    info!("Power trace finished");
                    break;
                }
            },
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn recommend_cmd(config: SessionConfig, snapshot: SystemSnapshot, start: bool) -> anyhow::Result<()> {
    if start {
        let (mut session, completed_rx) = stdout_session(config);
        let (recommendation, run_id) = session.start_recommended(&snapshot).await?;
        info!(algorithm = %recommendation.algorithm, reason = %recommendation.reason, "Playing recommendation");

        drive(&mut session, run_id, completed_rx, Box::pin(futures::stream::pending::<PowerSample>()), false).await;
        session.shutdown().await;
        return Ok(());
    }

    let recommendation = recommend(&snapshot);
    println!("Algorithm: {}", recommendation.algorithm.label());
    println!("Quantum:   {} ticks", recommendation.quantum);
    println!("Reason:    {}\n", recommendation.reason);

    println!("{:<8} {:>8} {:>10}", "PID", "Priority", "Decision");
    for process in &config.processes {
        println!(
            "{:<8} {:>8} {:>10}",
            process.id,
            process.priority,
            format!("{:?}", decide(process.priority, &snapshot))
        );
    }

    Ok(())
}

/// Feed samples to the session until the run completes (unless following) or Ctrl+C
async fn drive(
    session: &mut Session<StdoutSink>,
    run_id: Uuid,
    mut completed_rx: mpsc::UnboundedReceiver<Uuid>,
    mut samples: SampleStream,
    follow: bool,
) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping run");
                break;
            }
            Some(completed) = completed_rx.recv() => {
                if completed == run_id && !follow {
                    break;
                }
            }
            Some(sample) = samples.next() => {
                session.handle_power_sample(sample);
            }
        }
    }
}
