//! Durable work queues with at-least-once delivery, retry with jittered
//! backoff, and mirrored dead-letter queues.
//!
//! Per-message lifecycle: `queued → leased → {acked, retry_scheduled,
//! dead_letter, expired}`. A message retried past `max_retries` expires to
//! the dead-letter queue; nothing downstream may assume dead-letter
//! delivery is guaranteed.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;

use alexandria_types::{AlexandriaError, QueueMessage, QueueName};

pub(crate) mod backoff;
mod consumer;

pub use consumer::{Consumer, ConsumerHandle, JobHandler};

/// A leased message with the receipt id used to settle it.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Receipt id, valid while the message is leased.
    pub id: u64,
    /// The message, with `attempts` counting this delivery's predecessors.
    pub message: QueueMessage,
}

/// The queue boundary. The production deployment binds this to the
/// platform queue service; [`MemoryQueue`] is the in-process reference
/// implementation.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Which named queue this is.
    fn name(&self) -> QueueName;

    /// Enqueue one message.
    async fn send(&self, message: QueueMessage) -> Result<(), AlexandriaError>;

    /// Enqueue a batch of messages.
    async fn send_batch(&self, messages: Vec<QueueMessage>) -> Result<(), AlexandriaError> {
        for message in messages {
            self.send(message).await?;
        }
        Ok(())
    }

    /// Lease up to `max` ready messages, waiting up to `wait` for the
    /// first one. May return fewer, or none on timeout.
    async fn lease(&self, max: usize, wait: Duration) -> Result<Vec<Delivery>, AlexandriaError>;

    /// Acknowledge a leased message; it will not be delivered again.
    async fn ack(&self, delivery_id: u64) -> Result<(), AlexandriaError>;

    /// Schedule a leased message for redelivery after `delay`, incrementing
    /// its attempt count. Messages past the retry budget expire to the
    /// dead-letter queue instead.
    async fn retry(&self, delivery_id: u64, delay: Duration) -> Result<(), AlexandriaError>;

    /// Move a leased message straight to the dead-letter queue.
    async fn dead_letter(&self, delivery_id: u64) -> Result<(), AlexandriaError>;

    /// Messages currently ready or scheduled on the primary queue.
    async fn pending(&self) -> usize;

    /// Messages on the mirrored dead-letter queue.
    async fn dead_letter_count(&self) -> usize;

    /// Drain a copy of the dead-letter queue, oldest first.
    async fn drain_dead_letters(&self) -> Vec<QueueMessage>;
}

struct QueueInner {
    ready: VecDeque<Delivery>,
    delayed: Vec<(Instant, Delivery)>,
    inflight: HashMap<u64, QueueMessage>,
    dead: VecDeque<QueueMessage>,
    seq: u64,
}

impl QueueInner {
    // Promote delayed messages whose due time has passed.
    fn promote_due(&mut self, now: Instant) {
        let mut still_delayed = Vec::with_capacity(self.delayed.len());
        for (due, delivery) in self.delayed.drain(..) {
            if due <= now {
                self.ready.push_back(delivery);
            } else {
                still_delayed.push((due, delivery));
            }
        }
        self.delayed = still_delayed;
    }
}

/// In-process [`JobQueue`] used by tests and single-process deployments.
pub struct MemoryQueue {
    name: QueueName,
    max_retries: u32,
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl MemoryQueue {
    /// Create an empty queue with the given retry budget.
    #[must_use]
    pub fn new(name: QueueName, max_retries: u32) -> Self {
        Self {
            name,
            max_retries,
            inner: Mutex::new(QueueInner {
                ready: VecDeque::new(),
                delayed: Vec::new(),
                inflight: HashMap::new(),
                dead: VecDeque::new(),
                seq: 0,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, QueueInner>, AlexandriaError> {
        self.inner
            .lock()
            .map_err(|_| AlexandriaError::Queue("queue mutex poisoned".into()))
    }

    fn take_ready(&self, max: usize) -> Result<Vec<Delivery>, AlexandriaError> {
        let mut inner = self.lock()?;
        inner.promote_due(Instant::now());
        let mut out = Vec::new();
        while out.len() < max {
            let Some(delivery) = inner.ready.pop_front() else {
                break;
            };
            inner
                .inflight
                .insert(delivery.id, delivery.message.clone());
            out.push(delivery);
        }
        Ok(out)
    }

    fn next_delayed_due(&self) -> Option<Instant> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.delayed.iter().map(|(due, _)| *due).min())
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    fn name(&self) -> QueueName {
        self.name
    }

    async fn send(&self, message: QueueMessage) -> Result<(), AlexandriaError> {
        {
            let mut inner = self.lock()?;
            inner.seq += 1;
            let id = inner.seq;
            inner.ready.push_back(Delivery { id, message });
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn lease(&self, max: usize, wait: Duration) -> Result<Vec<Delivery>, AlexandriaError> {
        let deadline = Instant::now() + wait;
        loop {
            let batch = self.take_ready(max)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            // Wake for a new send, a delayed message coming due, or the
            // lease deadline, whichever is first.
            let mut sleep_until = deadline;
            if let Some(due) = self.next_delayed_due() {
                sleep_until = sleep_until.min(due);
            }
            let notified = self.notify.notified();
            tokio::select! {
                () = notified => {}
                () = tokio::time::sleep_until(tokio::time::Instant::from_std(sleep_until)) => {}
            }
        }
    }

    async fn ack(&self, delivery_id: u64) -> Result<(), AlexandriaError> {
        let mut inner = self.lock()?;
        inner.inflight.remove(&delivery_id).ok_or_else(|| {
            AlexandriaError::Queue(format!("unknown delivery id {delivery_id}"))
        })?;
        Ok(())
    }

    async fn retry(&self, delivery_id: u64, delay: Duration) -> Result<(), AlexandriaError> {
        {
            let mut inner = self.lock()?;
            let mut message = inner.inflight.remove(&delivery_id).ok_or_else(|| {
                AlexandriaError::Queue(format!("unknown delivery id {delivery_id}"))
            })?;
            message.attempts += 1;
            if message.attempts > self.max_retries {
                tracing::warn!(
                    queue = %self.name,
                    key = %message.key,
                    attempts = message.attempts,
                    "retry budget spent, expiring to dead-letter"
                );
                inner.dead.push_back(message);
            } else {
                inner.seq += 1;
                let id = inner.seq;
                inner
                    .delayed
                    .push((Instant::now() + delay, Delivery { id, message }));
            }
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn dead_letter(&self, delivery_id: u64) -> Result<(), AlexandriaError> {
        let mut inner = self.lock()?;
        let message = inner.inflight.remove(&delivery_id).ok_or_else(|| {
            AlexandriaError::Queue(format!("unknown delivery id {delivery_id}"))
        })?;
        inner.dead.push_back(message);
        Ok(())
    }

    async fn pending(&self) -> usize {
        self.lock()
            .map(|inner| inner.ready.len() + inner.delayed.len())
            .unwrap_or(0)
    }

    async fn dead_letter_count(&self) -> usize {
        self.lock().map(|inner| inner.dead.len()).unwrap_or(0)
    }

    async fn drain_dead_letters(&self) -> Vec<QueueMessage> {
        self.lock()
            .map(|mut inner| inner.dead.drain(..).collect())
            .unwrap_or_default()
    }
}
