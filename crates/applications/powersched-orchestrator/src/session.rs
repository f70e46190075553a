//! Session orchestration
//!
//! A [`Session`] owns at most one active run. A run is a playback task that steps
//! through a simulated timeline and drives battery impact drift while it plays:
//!
//! ```text
//! start_simulation(alg)
//!   ├─ simulate (sync; on error the current run keeps playing)
//!   ├─ cancel previous run (joins its playback and drift tasks)
//!   ├─ RunStarted, AlgorithmImpactChanged (baseline for alg)
//!   └─ spawn run task
//!        ├─ drift task: AlgorithmImpactChanged every drift interval
//!        ├─ RunningChanged + ReadyQueueChanged every tick interval
//!        └─ on completion: stop drift, clear highlight, RunCompleted
//! ```
//!
//! Power samples are handled one at a time through `&mut self`, so alert state
//! transitions follow arrival order.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use powersched_simulation_engine::advisor::{recommend, runnable, Recommendation, SystemSnapshot};
use powersched_simulation_engine::{AlgorithmKind, BatteryImpactModel, ImpactTable, PowerSample, Simulator, Timeline};

use crate::alerts::{Alert, AlertState, AlertStateMachine};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::events::{EventSink, SessionCommand, SessionEvent};
use crate::playback::{Playback, PlaybackClock};
use crate::task::ScheduledTask;

type SharedImpactModel = Arc<Mutex<BatteryImpactModel>>;

/// Run currently owned by the session
struct ActiveRun {
    run_id: Uuid,
    algorithm: AlgorithmKind,
    task: ScheduledTask,
}

/// One monitoring session: simulation runs, impact model and alert state
pub struct Session<S: EventSink> {
    config: SessionConfig,
    simulator: Simulator,
    sink: Arc<S>,
    impact: SharedImpactModel,
    alerts: AlertStateMachine,
    alert_state: AlertState,
    current: Option<ActiveRun>,
}

impl<S: EventSink> Session<S> {
    pub fn new(config: SessionConfig, sink: S) -> Self {
        let impact = match config.impact_seed {
            Some(seed) => BatteryImpactModel::seeded(config.baselines.clone(), seed),
            None => BatteryImpactModel::new(config.baselines.clone()),
        };

        Self {
            simulator: Simulator::new(config.simulator_config()),
            alerts: AlertStateMachine::new(config.low_battery_threshold),
            alert_state: AlertState::new(),
            sink: Arc::new(sink),
            impact: Arc::new(Mutex::new(impact)),
            current: None,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Id of the current run, if one was started and not stopped
    pub fn current_run(&self) -> Option<Uuid> {
        self.current.as_ref().map(|run| run.run_id)
    }

    /// Whether a run is still playing
    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|run| !run.task.is_finished())
    }

    pub fn alert_state(&self) -> AlertState {
        self.alert_state
    }

    /// Snapshot of the battery impact table
    pub async fn impact_table(&self) -> ImpactTable {
        self.impact.lock().await.table().clone()
    }

    /// Simulate the configured process set under `algorithm` and start playing it
    pub async fn start_simulation(&mut self, algorithm: AlgorithmKind) -> Result<Uuid> {
        let timeline = self.simulator.simulate(&self.config.processes, algorithm)?;
        Ok(self.start_timeline(timeline).await)
    }

    /// Let the advisor pick the discipline and the runnable processes, then start
    pub async fn start_recommended(&mut self, snapshot: &SystemSnapshot) -> Result<(Recommendation, Uuid)> {
        let recommendation = recommend(snapshot);
        let processes = runnable(&self.config.processes, snapshot);

        info!(
            algorithm = %recommendation.algorithm,
            quantum = recommendation.quantum,
            runnable = processes.len(),
            held_back = self.config.processes.len() - processes.len(),
            reason = %recommendation.reason,
            "Advisor recommendation"
        );

        let timeline = Simulator::with_quantum(recommendation.quantum).simulate(&processes, recommendation.algorithm)?;
        let run_id = self.start_timeline(timeline).await;
        Ok((recommendation, run_id))
    }

    /// Cancel the current run
    ///
    /// A run stopped mid-playback loses its highlight in the impact table. Returns
    /// whether there was a run to stop.
    pub async fn stop_simulation(&mut self) -> bool {
        let Some(run) = self.current.take() else {
            return false;
        };

        let interrupted = !run.task.is_finished();
        run.task.cancel().await;

        if interrupted {
            info!(run_id = %run.run_id, algorithm = %run.algorithm, "Run stopped");
            let mut model = self.impact.lock().await;
            model.clear_active();
            self.sink.emit(SessionEvent::AlgorithmImpactChanged {
                table: model.table().clone(),
            });
        }

        true
    }

    /// Feed one power reading through the alert state machine
    pub fn handle_power_sample(&mut self, sample: PowerSample) -> Vec<Alert> {
        let alerts = self.alerts.process(&mut self.alert_state, &sample);

        for alert in &alerts {
            self.sink.emit(SessionEvent::Alert { alert: alert.clone() });
        }

        alerts
    }

    pub async fn handle_command(&mut self, command: SessionCommand) -> Result<()> {
        match command {
            SessionCommand::StartSimulation { algorithm } => {
                self.start_simulation(algorithm).await?;
            }
            SessionCommand::StopSimulation => {
                if !self.stop_simulation().await {
                    debug!("Stop requested with no active run");
                }
            }
            SessionCommand::PowerSample(sample) => {
                self.handle_power_sample(sample);
            }
        }
        Ok(())
    }

    /// Wait for the current run to play out
    pub async fn wait_for_run(&mut self) {
        if let Some(run) = self.current.take() {
            run.task.join().await;
        }
    }

    /// Stop everything the session owns
    pub async fn shutdown(mut self) {
        if self.current.is_some() {
            self.stop_simulation().await;
        }
        debug!("Session shut down");
    }

    async fn start_timeline(&mut self, timeline: Timeline) -> Uuid {
        if let Some(previous) = self.current.take() {
            debug!(run_id = %previous.run_id, "Cancelling previous run");
            previous.task.cancel().await;
        }

        let run_id = Uuid::new_v4();
        let algorithm = timeline.algorithm;

        if !timeline.skipped.is_empty() {
            warn!(run_id = %run_id, skipped = ?timeline.skipped, "Some processes were not scheduled");
        }

        info!(run_id = %run_id, algorithm = %algorithm, ticks = timeline.len(), "Run started");

        let playback = Playback::new(&timeline, self.config.preview_len);
        self.sink.emit(SessionEvent::RunStarted {
            run_id,
            algorithm,
            timeline,
        });

        {
            let mut model = self.impact.lock().await;
            model.apply_baseline(algorithm);
            self.sink.emit(SessionEvent::AlgorithmImpactChanged {
                table: model.table().clone(),
            });
        }

        let task = spawn_run(
            run_id,
            playback,
            PlaybackClock::new(self.config.tick_interval()),
            self.config.drift_interval(),
            self.impact.clone(),
            self.sink.clone(),
        );

        self.current = Some(ActiveRun {
            run_id,
            algorithm,
            task,
        });

        run_id
    }
}

fn spawn_run<S: EventSink>(
    run_id: Uuid,
    playback: Playback,
    clock: PlaybackClock,
    drift_period: Duration,
    impact: SharedImpactModel,
    sink: Arc<S>,
) -> ScheduledTask {
    ScheduledTask::spawn(format!("run-{run_id}"), move |mut cancel| async move {
        let drift = spawn_drift(run_id, drift_period, impact.clone(), sink.clone());
        let mut snapshots = clock.stream(playback);

        let completed = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break false,
                next = snapshots.next() => match next {
                    Some(snapshot) => {
                        let tick = snapshot.tick_index;
                        sink.emit(SessionEvent::RunningChanged {
                            run_id,
                            tick,
                            pid: snapshot.running_pid,
                        });
                        sink.emit(SessionEvent::ReadyQueueChanged {
                            run_id,
                            tick,
                            queue: snapshot.ready_queue_preview,
                        });
                    }
                    None => break true,
                },
            }
        };

        drift.cancel().await;

        if completed {
            {
                let mut model = impact.lock().await;
                model.clear_active();
                sink.emit(SessionEvent::AlgorithmImpactChanged {
                    table: model.table().clone(),
                });
            }
            sink.emit(SessionEvent::RunCompleted { run_id });
            info!(run_id = %run_id, "Run completed");
        } else {
            debug!(run_id = %run_id, "Run cancelled");
        }
    })
}

fn spawn_drift<S: EventSink>(
    run_id: Uuid,
    period: Duration,
    impact: SharedImpactModel,
    sink: Arc<S>,
) -> ScheduledTask {
    ScheduledTask::periodic(format!("drift-{run_id}"), period, move || {
        let impact = impact.clone();
        let sink = sink.clone();
        async move {
            let mut model = impact.lock().await;
            if model.drift() {
                sink.emit(SessionEvent::AlgorithmImpactChanged {
                    table: model.table().clone(),
                });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertKind;
    use powersched_simulation_engine::Process;
    use tokio::sync::mpsc;

    fn test_config() -> SessionConfig {
        SessionConfig {
            impact_seed: Some(42),
            ..SessionConfig::default()
        }
    }

    fn session() -> (Session<mpsc::UnboundedSender<SessionEvent>>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Session::new(test_config(), tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn running_pids(events: &[SessionEvent], id: Uuid) -> Vec<Option<u32>> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::RunningChanged { run_id, pid, .. } if *run_id == id => Some(*pid),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_plays_to_completion() {
        let (mut session, mut rx) = session();

        let run_id = session.start_simulation(AlgorithmKind::Fcfs).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;

        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            SessionEvent::RunStarted { algorithm: AlgorithmKind::Fcfs, timeline, .. } if timeline.len() == 16
        ));

        let pids = running_pids(&events, run_id);
        assert_eq!(pids.len(), 17);
        assert_eq!(pids[0], Some(1));
        assert_eq!(pids[5], Some(2));
        assert_eq!(pids[16], None);

        let queues = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::ReadyQueueChanged { .. }))
            .count();
        assert_eq!(queues, 17);

        // Completion clears the highlight, then reports the run as done
        let n = events.len();
        assert_eq!(events[n - 1], SessionEvent::RunCompleted { run_id });
        match &events[n - 2] {
            SessionEvent::AlgorithmImpactChanged { table } => assert_eq!(table.active(), None),
            other => panic!("unexpected event {other:?}"),
        }

        assert!(!session.is_running());
        assert_eq!(session.impact_table().await.active(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drift_only_while_playing() {
        let (mut session, mut rx) = session();

        session.start_simulation(AlgorithmKind::Priority).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let events = drain(&mut rx);
        let tables: Vec<&ImpactTable> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::AlgorithmImpactChanged { table } => Some(table),
                _ => None,
            })
            .collect();

        // Baseline load, drift at 2s..16s, highlight cleared at 17s
        assert_eq!(tables.len(), 1 + 8 + 1);
        assert_eq!(tables[0].score(AlgorithmKind::Priority), 85);
        for table in &tables[..tables.len() - 1] {
            assert_eq!(table.active(), Some(AlgorithmKind::Priority));
            for score in table.scores().values() {
                assert!((10..=90).contains(score));
            }
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_run_cancels_previous() {
        let (mut session, mut rx) = session();

        let first = session.start_simulation(AlgorithmKind::Fcfs).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        let second = session.start_simulation(AlgorithmKind::RoundRobin).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let events = drain(&mut rx);
        let second_start = events
            .iter()
            .position(|e| matches!(e, SessionEvent::RunStarted { run_id, .. } if *run_id == second))
            .unwrap();

        assert!(events[second_start..].iter().all(|e| e.run_id() != Some(first)));
        assert_eq!(running_pids(&events, first).len(), 3);
        assert!(!events.contains(&SessionEvent::RunCompleted { run_id: first }));
        assert_eq!(events.last(), Some(&SessionEvent::RunCompleted { run_id: second }));
        assert_eq!(session.current_run(), Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_keeps_current_run() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = SessionConfig {
            quantum: 0,
            ..test_config()
        };
        let mut session = Session::new(config, tx);

        let run_id = session.start_simulation(AlgorithmKind::Sjf).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(session.start_simulation(AlgorithmKind::RoundRobin).await.is_err());
        assert_eq!(session.current_run(), Some(run_id));

        tokio::time::sleep(Duration::from_secs(20)).await;
        let events = drain(&mut rx);
        assert_eq!(running_pids(&events, run_id).len(), 17);
        assert_eq!(events.last(), Some(&SessionEvent::RunCompleted { run_id }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_simulation() {
        let (mut session, mut rx) = session();

        let run_id = session.start_simulation(AlgorithmKind::Srtf).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(session.stop_simulation().await);
        assert!(!session.stop_simulation().await);

        let events = drain(&mut rx);
        assert_eq!(running_pids(&events, run_id).len(), 2);
        match events.last() {
            Some(SessionEvent::AlgorithmImpactChanged { table }) => assert_eq!(table.active(), None),
            other => panic!("unexpected event {other:?}"),
        }

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_process_set_completes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = SessionConfig {
            processes: vec![],
            ..test_config()
        };
        let mut session = Session::new(config, tx);

        let run_id = session.start_simulation(AlgorithmKind::Fcfs).await.unwrap();
        session.wait_for_run().await;

        let events = drain(&mut rx);
        assert_eq!(running_pids(&events, run_id), vec![None]);
        assert_eq!(events.last(), Some(&SessionEvent::RunCompleted { run_id }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_recommended() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = SessionConfig {
            processes: vec![Process::new(1, 2, 0), Process::new(2, 3, 1), Process::new(3, 4, 2)],
            ..test_config()
        };
        let mut session = Session::new(config, tx);

        // Low battery: only the high-priority process may run
        let snapshot = SystemSnapshot {
            battery_percent: 15.0,
            charging: false,
            cpu_percent: 30.0,
        };

        let (recommendation, run_id) = session.start_recommended(&snapshot).await.unwrap();
        assert_eq!(recommendation.algorithm, AlgorithmKind::Priority);

        session.wait_for_run().await;
        let events = drain(&mut rx);
        assert_eq!(running_pids(&events, run_id), vec![Some(1), Some(1), None]);
    }

    #[tokio::test]
    async fn test_power_samples_raise_alerts() {
        let (mut session, mut rx) = session();

        let alerts = session.handle_power_sample(PowerSample::new(Some(15), Some(false)));
        assert_eq!(alerts.len(), 2);
        assert!(session.handle_power_sample(PowerSample::new(Some(15), Some(false))).is_empty());
        assert!(session.alert_state().low_battery_latched);

        let kinds: Vec<AlertKind> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Alert { alert } => Some(alert.kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![AlertKind::ChargerDisconnected, AlertKind::LowBattery { percent: 15 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_commands() {
        let (mut session, mut rx) = session();

        let start: SessionCommand =
            serde_json::from_str(r#"{"command": "start_simulation", "algorithm": "sjf"}"#).unwrap();
        session.handle_command(start).await.unwrap();
        assert!(session.is_running());

        session
            .handle_command(SessionCommand::PowerSample(PowerSample::new(None, Some(true))))
            .await
            .unwrap();
        session.handle_command(SessionCommand::StopSimulation).await.unwrap();
        assert!(!session.is_running());

        let events = drain(&mut rx);
        assert!(matches!(events[0], SessionEvent::RunStarted { algorithm: AlgorithmKind::Sjf, .. }));
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Alert { .. })));

        session.shutdown().await;
    }
}
