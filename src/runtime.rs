//! # Printer Runtime
//!
//! Runs a [`ThermalPrinter`] on one tokio task. The task ticks the scheduler
//! on a fixed interval and serves [`PrinterRequest`]s from an mpsc channel,
//! so the queue and health state have exactly one mutator and need no locks.
//!
//! ```text
//! HTTP handlers ──PrinterRequest──► printer task ──tick──► scheduler ──► channel
//!               ◄──── oneshot ─────┘
//! ```

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::channel::ByteChannel;
use crate::error::CalorError;
use crate::health::UsageSnapshot;
use crate::scheduler::TickOutcome;
use crate::service::{PrinterStatus, ServiceCall, ServiceReply, ThermalPrinter};

/// Pending requests before senders wait
const REQUEST_BUFFER: usize = 32;

/// A request sent from a handler to the printer task.
#[derive(Debug)]
pub enum PrinterRequest {
    Call {
        call: ServiceCall,
        respond_to: oneshot::Sender<Result<ServiceReply, CalorError>>,
    },
    Status {
        respond_to: oneshot::Sender<PrinterStatus>,
    },
}

/// Cloneable sender side of the printer task.
#[derive(Debug, Clone)]
pub struct PrinterHandle {
    tx: mpsc::Sender<PrinterRequest>,
}

impl PrinterHandle {
    pub async fn call(&self, call: ServiceCall) -> Result<ServiceReply, CalorError> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(PrinterRequest::Call { call, respond_to })
            .await
            .map_err(|_| CalorError::Unavailable)?;
        rx.await.map_err(|_| CalorError::Unavailable)?
    }

    pub async fn status(&self) -> Result<PrinterStatus, CalorError> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(PrinterRequest::Status { respond_to })
            .await
            .map_err(|_| CalorError::Unavailable)?;
        rx.await.map_err(|_| CalorError::Unavailable)
    }
}

/// Writes the usage snapshot whenever it changes.
struct UsageStore {
    path: Option<PathBuf>,
    last_saved: Option<UsageSnapshot>,
}

impl UsageStore {
    fn sync(&mut self, snapshot: UsageSnapshot) {
        let Some(path) = &self.path else {
            return;
        };
        if self.last_saved.as_ref() == Some(&snapshot) {
            return;
        }
        match snapshot.save(path) {
            Ok(()) => {
                debug!(path = %path.display(), "paper usage saved");
                self.last_saved = Some(snapshot);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to save paper usage"),
        }
    }
}

/// Move `printer` onto its own task.
///
/// The task stops when every [`PrinterHandle`] has been dropped.
pub fn spawn<C>(
    mut printer: ThermalPrinter<C>,
    tick_interval: Duration,
    usage_file: Option<PathBuf>,
) -> (PrinterHandle, JoinHandle<()>)
where
    C: ByteChannel + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<PrinterRequest>(REQUEST_BUFFER);
    let mut store = UsageStore {
        last_saved: None,
        path: usage_file,
    };

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick_ms = tick_interval.as_millis() as u64, "printer task running");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let outcome = printer.tick(Instant::now());
                    if let TickOutcome::Transmitted { .. } | TickOutcome::Rejected { .. } = outcome {
                        store.sync(printer.usage_snapshot());
                    }
                }
                request = rx.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    match request {
                        PrinterRequest::Call { call, respond_to } => {
                            let result = printer.call(call, Instant::now());
                            store.sync(printer.usage_snapshot());
                            let _ = respond_to.send(result);
                        }
                        PrinterRequest::Status { respond_to } => {
                            let _ = respond_to.send(printer.status(Instant::now()));
                        }
                    }
                }
            }
        }

        store.sync(printer.usage_snapshot());
        info!("printer task stopped");
    });

    (PrinterHandle { tx }, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::encoder::TextParams;
    use crate::printer::PrinterConfig;

    fn printer() -> ThermalPrinter<MemoryChannel> {
        let config = PrinterConfig {
            startup_message: false,
            ..Default::default()
        };
        ThermalPrinter::new(MemoryChannel::new(), &config, Instant::now()).unwrap()
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let (handle, _task) = spawn(printer(), Duration::from_millis(10), None);
        let reply = handle
            .call(ServiceCall::PrintText(TextParams::new("hi")))
            .await
            .unwrap();
        assert!(matches!(reply, ServiceReply::Queued { .. }));
    }

    #[tokio::test]
    async fn test_queue_drains_in_background() {
        let (handle, _task) = spawn(printer(), Duration::from_millis(5), None);
        handle
            .call(ServiceCall::PrintText(TextParams::new("hi")))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let status = handle.status().await.unwrap();
        assert_eq!(status.scheduler.queue_len, 0);
        assert_eq!(status.health.counters.jobs_transmitted, 1);
    }

    #[tokio::test]
    async fn test_usage_saved_on_exit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        let (handle, task) = spawn(printer(), Duration::from_millis(5), Some(path.clone()));
        handle
            .call(ServiceCall::PrintText(TextParams::new("paper")))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(handle);
        task.await.unwrap();

        let saved = UsageSnapshot::load(&path).unwrap();
        assert_eq!(saved.jobs_transmitted, 1);
        assert_eq!(saved.paper_remaining_mm, 30_000.0 - 4.0);
    }
}
