//! Background expiry sweep

use crate::PUNISHMENT_TARGET;
use crate::punishment::{LifecycleCoordinator, PunishmentError, PunishmentResult, SweepReport};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

const REQUEST_BUFFER: usize = 16;

/// Requests accepted by the sweep task
#[derive(Debug)]
pub enum SweepRequest {
    /// Run a sweep now, optionally reporting the result
    SweepNow {
        reply: Option<oneshot::Sender<PunishmentResult<SweepReport>>>,
    },
    /// Stop after the current sweep
    Shutdown,
}

/// Periodic task lifting expired punishments
pub struct ExpirySweep {
    coordinator: LifecycleCoordinator,
    interval: Duration,
}

impl ExpirySweep {
    #[must_use]
    pub const fn new(coordinator: LifecycleCoordinator, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    /// Start the sweep on the current runtime
    #[must_use]
    pub fn spawn(self) -> SweepHandle {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
        let task = tokio::spawn(self.run(rx));
        SweepHandle { tx, task }
    }

    async fn run(self, mut rx: mpsc::Receiver<SweepRequest>) {
        info!(target: PUNISHMENT_TARGET, "Expiry sweep started, every {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                request = rx.recv() => match request {
                    Some(SweepRequest::SweepNow { reply }) => {
                        let result = self.coordinator.sweep().await;
                        if let Err(e) = &result {
                            error!(target: PUNISHMENT_TARGET, "Requested sweep abandoned: {e}");
                        }
                        if let Some(reply) = reply {
                            let _ = reply.send(result);
                        }
                    }
                    Some(SweepRequest::Shutdown) | None => break,
                },
            }
        }

        info!(target: PUNISHMENT_TARGET, "Expiry sweep stopped");
    }

    async fn sweep(&self) {
        if let Err(e) = self.coordinator.sweep().await {
            error!(target: PUNISHMENT_TARGET, "Sweep abandoned: {e}");
        }
    }
}

/// Handle to a running [`ExpirySweep`]
pub struct SweepHandle {
    tx: mpsc::Sender<SweepRequest>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Sender for requests to the sweep task
    #[must_use]
    pub fn requests(&self) -> mpsc::Sender<SweepRequest> {
        self.tx.clone()
    }

    /// Run a sweep now and wait for its report
    ///
    /// # Errors
    /// See [`request_sweep`].
    pub async fn sweep_now(&self) -> PunishmentResult<SweepReport> {
        request_sweep(&self.tx).await
    }

    /// Stop the task, letting an in-flight sweep finish
    ///
    /// # Errors
    /// Returns `Other` when the task panicked.
    pub async fn shutdown(self) -> PunishmentResult<()> {
        // A closed channel means the task already ended
        let _ = self.tx.send(SweepRequest::Shutdown).await;
        self.task
            .await
            .map_err(|e| PunishmentError::Other(format!("Sweep task failed: {e}")))
    }
}

/// Ask the sweep task behind `tx` for an immediate sweep
///
/// # Errors
/// Returns `Other` when the task is not running, or the sweep's own error.
pub async fn request_sweep(tx: &mpsc::Sender<SweepRequest>) -> PunishmentResult<SweepReport> {
    let (reply, response) = oneshot::channel();
    tx.send(SweepRequest::SweepNow { reply: Some(reply) })
        .await
        .map_err(|_| PunishmentError::Other("Sweep task is not running".into()))?;
    response
        .await
        .map_err(|_| PunishmentError::Other("Sweep task stopped before replying".into()))?
}
