//! Cancellable background tasks
//!
//! A [`ScheduledTask`] pairs a tokio task with a cancel channel. `cancel().await`
//! signals the task and then joins it, so once it returns the task has stopped and
//! will produce no further side effects. Dropping the handle only signals.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Task-side view of the cancel channel
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested (or the owner is gone)
    pub async fn cancelled(&mut self) {
        // Err means every sender was dropped, which also ends the task
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Owner-side trigger, cloneable so other tasks can request a stop
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Handle to a spawned, cancellable task
#[derive(Debug)]
pub struct ScheduledTask {
    name: String,
    cancel: CancelHandle,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Spawn `body` with a cancel signal it must watch
    pub fn spawn<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(body(CancelSignal { rx }));

        debug!(task = %name, "Task spawned");

        Self {
            name,
            cancel: CancelHandle { tx: Arc::new(tx) },
            handle: Some(handle),
        }
    }

    /// Run `tick` every `period`, first after one full period
    ///
    /// A tick that falls due while the previous body is still running is dropped,
    /// so bodies never run back to back. A tick body always runs to completion
    /// before cancellation is observed.
    pub fn periodic<F, Fut>(name: impl Into<String>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let task_name = name.clone();

        Self::spawn(name, move |mut cancel| async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut idle_since = Instant::now();

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    deadline = ticker.tick() => {
                        if deadline < idle_since {
                            debug!(task = %task_name, "Dropped late tick");
                            continue;
                        }
                        tick().await;
                        idle_since = Instant::now();
                    }
                }
            }

            debug!(task = %task_name, "Periodic task stopped");
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Whether the task body has returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signal cancellation and wait for the task to stop
    pub async fn cancel(mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!(task = %self.name, "Task panicked before cancellation");
                }
            }
        }

        debug!(task = %self.name, "Task cancelled");
    }

    /// Wait for the task to finish on its own
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(task = %self.name, error = %e, "Task ended abnormally");
            }
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}
