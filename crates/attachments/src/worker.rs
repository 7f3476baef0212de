use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::service::AttachmentService;

/// Configuration for the [`SweepWorker`].
#[derive(Debug, Clone)]
pub struct SweepWorkerConfig {
    /// How often to run the orphan sweep (default: daily). Correctness does
    /// not depend on the cadence; a larger backlog just takes more
    /// invocations to drain.
    pub sweep_interval: Duration,
}

impl Default for SweepWorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Periodic driver for the orphan sweep.
///
/// Owns nothing but a handle to the service; stopping it mid-cycle is safe
/// because each swept item commits independently.
pub struct SweepWorker {
    service: Arc<AttachmentService>,
    config: SweepWorkerConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

impl SweepWorker {
    /// Create a worker and the sender used to signal shutdown.
    pub fn new(
        service: Arc<AttachmentService>,
        config: SweepWorkerConfig,
    ) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            Self {
                service,
                config,
                shutdown_rx,
            },
            shutdown_tx,
        )
    }

    /// Run sweeps on the configured cadence until shutdown is signaled.
    ///
    /// The first sweep runs immediately on startup.
    pub async fn run(mut self) {
        let mut tick = interval(self.config.sweep_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("sweep worker received shutdown signal");
                    break;
                }
                _ = tick.tick() => {
                    match self.service.run_sweep().await {
                        Ok(report) => {
                            if report.errors > 0 {
                                info!(errors = report.errors, "sweep finished with errors; next cycle retries");
                            }
                        }
                        Err(err) => {
                            error!(error = %err, "orphan sweep failed");
                        }
                    }
                }
            }
        }
    }
}
