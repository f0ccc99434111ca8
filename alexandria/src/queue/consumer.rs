use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, watch};

use alexandria_types::{AlexandriaError, Disposition, QueueConfig, QueueMessage};

use super::{Delivery, JobQueue, backoff};

/// Processes one message at a time. Handlers must be idempotent: delivery
/// is at-least-once and a retried message replays the same payload.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Process a message. The returned error's disposition decides between
    /// ack, retry, and dead-letter.
    async fn handle(&self, message: &QueueMessage) -> Result<(), AlexandriaError>;
}

/// A batch consumer loop over one queue.
pub struct Consumer {
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    cfg: QueueConfig,
}

impl Consumer {
    /// Create a consumer; call [`spawn`](Self::spawn) to start it.
    pub fn new(queue: Arc<dyn JobQueue>, handler: Arc<dyn JobHandler>, cfg: QueueConfig) -> Self {
        Self {
            queue,
            handler,
            cfg,
        }
    }

    /// Start the consumer loop on the runtime.
    #[must_use]
    pub fn spawn(self) -> ConsumerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(run_loop(self.queue, self.handler, self.cfg, stop_rx));
        ConsumerHandle {
            join: Some(join),
            stop_tx,
        }
    }
}

/// Handle to a running consumer.
///
/// Lifecycle contract: prefer [`stop`](Self::stop) to drain the in-flight
/// batch within a deadline; dropping the handle leaves the task running
/// detached.
pub struct ConsumerHandle {
    join: Option<tokio::task::JoinHandle<()>>,
    stop_tx: watch::Sender<bool>,
}

impl ConsumerHandle {
    /// Request a graceful stop and wait up to `drain` for the in-flight
    /// batch to settle, then abort whatever remains.
    pub async fn stop(mut self, drain: Duration) {
        let _ = self.stop_tx.send(true);
        if let Some(join) = self.join.take() {
            if tokio::time::timeout(drain, join).await.is_err() {
                tracing::warn!("consumer drain deadline elapsed, aborting");
            }
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = self.stop_tx.send(true);
            join.abort();
        }
    }
}

async fn run_loop(
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    cfg: QueueConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(cfg.max_concurrency.max(1)));
    loop {
        if *stop_rx.borrow() {
            break;
        }
        let batch = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            leased = queue.lease(cfg.max_batch_size, cfg.max_batch_timeout) => match leased {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(queue = %queue.name(), error = %e, "lease failed");
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    continue;
                }
            },
        };
        if batch.is_empty() {
            continue;
        }

        // Settle the whole batch before leasing again; the semaphore bounds
        // in-flight work, which is the backpressure knob protecting
        // upstream providers.
        let tasks = batch.into_iter().map(|delivery| {
            let queue = queue.clone();
            let handler = handler.clone();
            let semaphore = semaphore.clone();
            let backoff_cfg = cfg.backoff;
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                settle(&*queue, &*handler, delivery, &backoff_cfg).await;
            }
        });
        futures::future::join_all(tasks).await;
    }
    tracing::debug!(queue = %queue.name(), "consumer stopped");
}

async fn settle(
    queue: &dyn JobQueue,
    handler: &dyn JobHandler,
    delivery: Delivery,
    backoff_cfg: &alexandria_types::BackoffConfig,
) {
    let settled = match handler.handle(&delivery.message).await {
        Ok(()) => queue.ack(delivery.id).await,
        Err(e) => match e.disposition() {
            Disposition::Ack => {
                tracing::info!(
                    queue = %queue.name(),
                    key = %delivery.message.key,
                    error = %e,
                    "permanent harmless failure, acking"
                );
                queue.ack(delivery.id).await
            }
            Disposition::Retry => {
                let delay_ms = e
                    .retry_after_ms()
                    .unwrap_or_else(|| backoff::retry_delay_ms(backoff_cfg, delivery.message.attempts));
                tracing::debug!(
                    queue = %queue.name(),
                    key = %delivery.message.key,
                    attempts = delivery.message.attempts,
                    delay_ms,
                    error = %e,
                    "transient failure, scheduling retry"
                );
                queue.retry(delivery.id, Duration::from_millis(delay_ms)).await
            }
            Disposition::DeadLetter => {
                tracing::error!(
                    queue = %queue.name(),
                    key = %delivery.message.key,
                    error = %e,
                    "fatal failure, dead-lettering"
                );
                queue.dead_letter(delivery.id).await
            }
        },
    };
    if let Err(e) = settled {
        tracing::warn!(queue = %queue.name(), error = %e, "failed to settle delivery");
    }
}
