mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use alexandria::{
    AlexandriaError, Consumer, JobHandler, JobQueue, MemoryQueue, QueueMessage, QueueName,
};
use alexandria_types::{BackoffConfig, JobPayload, QueueConfig};
use async_trait::async_trait;
use helpers::isbn;

fn test_config(max_retries: u32) -> QueueConfig {
    QueueConfig {
        max_batch_size: 10,
        max_batch_timeout: Duration::from_millis(20),
        max_retries,
        max_concurrency: 4,
        backoff: BackoffConfig {
            min_backoff_ms: 1,
            max_backoff_ms: 5,
            factor: 2,
            jitter_percent: 0,
        },
    }
}

fn cover_message(key: &str) -> QueueMessage {
    QueueMessage::new(
        key.to_string(),
        JobPayload::ProcessCover(alexandria_types::CoverJob {
            isbn: isbn("9780439064873"),
            provider_url: "https://covers.example/x.jpg".into(),
            size_hint: None,
        }),
    )
}

/// Handler scripted by error kind, counting deliveries.
struct ScriptedHandler {
    deliveries: AtomicU32,
    fail_first: u32,
    error: fn() -> AlexandriaError,
}

#[async_trait]
impl JobHandler for ScriptedHandler {
    async fn handle(&self, _message: &QueueMessage) -> Result<(), AlexandriaError> {
        let n = self.deliveries.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            Err((self.error)())
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn transient_failures_retry_with_incremented_attempts_then_succeed() {
    let queue = Arc::new(MemoryQueue::new(QueueName::Covers, 5));
    let handler = Arc::new(ScriptedHandler {
        deliveries: AtomicU32::new(0),
        fail_first: 2,
        error: || AlexandriaError::provider("upstream", "503"),
    });

    queue.send(cover_message("k")).await.unwrap();
    let consumer = Consumer::new(queue.clone(), handler.clone(), test_config(5)).spawn();

    tokio::time::timeout(Duration::from_secs(2), async {
        while handler.deliveries.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("message should be retried to success");
    consumer.stop(Duration::from_secs(1)).await;

    assert_eq!(handler.deliveries.load(Ordering::SeqCst), 3);
    assert_eq!(queue.pending().await, 0);
    assert_eq!(queue.dead_letter_count().await, 0);
}

#[tokio::test]
async fn retry_budget_exhaustion_expires_to_the_dead_letter_queue() {
    let max_retries = 3;
    let queue = Arc::new(MemoryQueue::new(QueueName::Covers, max_retries));
    let handler = Arc::new(ScriptedHandler {
        deliveries: AtomicU32::new(0),
        fail_first: u32::MAX,
        error: || AlexandriaError::provider("upstream", "503"),
    });

    queue.send(cover_message("k")).await.unwrap();
    let consumer = Consumer::new(queue.clone(), handler.clone(), test_config(max_retries)).spawn();

    tokio::time::timeout(Duration::from_secs(2), async {
        while queue.dead_letter_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("message should expire to the dead-letter queue");

    // Settle: no further deliveries happen after expiry.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let delivered = handler.deliveries.load(Ordering::SeqCst);
    consumer.stop(Duration::from_secs(1)).await;

    // Initial delivery plus max_retries redeliveries, nothing more.
    assert_eq!(delivered, 1 + max_retries);
    assert_eq!(queue.pending().await, 0);

    let dead = queue.drain_dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 1 + max_retries);
}

#[tokio::test]
async fn validation_failures_are_acked_and_dropped() {
    let queue = Arc::new(MemoryQueue::new(QueueName::Covers, 3));
    let handler = Arc::new(ScriptedHandler {
        deliveries: AtomicU32::new(0),
        fail_first: u32::MAX,
        error: || AlexandriaError::InvalidArg("bad payload".into()),
    });

    queue.send(cover_message("k")).await.unwrap();
    let consumer = Consumer::new(queue.clone(), handler.clone(), test_config(3)).spawn();

    tokio::time::timeout(Duration::from_secs(2), async {
        while handler.deliveries.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    consumer.stop(Duration::from_secs(1)).await;

    assert_eq!(handler.deliveries.load(Ordering::SeqCst), 1);
    assert_eq!(queue.pending().await, 0);
    assert_eq!(queue.dead_letter_count().await, 0);
}

#[tokio::test]
async fn fatal_failures_dead_letter_immediately() {
    let queue = Arc::new(MemoryQueue::new(QueueName::Covers, 3));
    let handler = Arc::new(ScriptedHandler {
        deliveries: AtomicU32::new(0),
        fail_first: u32::MAX,
        error: || AlexandriaError::Auth {
            provider: "isbndb".into(),
        },
    });

    queue.send(cover_message("k")).await.unwrap();
    let consumer = Consumer::new(queue.clone(), handler.clone(), test_config(3)).spawn();

    tokio::time::timeout(Duration::from_secs(2), async {
        while queue.dead_letter_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    consumer.stop(Duration::from_secs(1)).await;

    assert_eq!(handler.deliveries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn messages_in_a_batch_are_processed_independently() {
    let queue = Arc::new(MemoryQueue::new(QueueName::Covers, 3));
    let handler = Arc::new(ScriptedHandler {
        deliveries: AtomicU32::new(0),
        // First delivery fails transiently, the rest succeed.
        fail_first: 1,
        error: || AlexandriaError::provider("upstream", "503"),
    });

    for key in ["a", "b", "c"] {
        queue.send(cover_message(key)).await.unwrap();
    }
    let consumer = Consumer::new(queue.clone(), handler.clone(), test_config(3)).spawn();

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if queue.pending().await == 0 && handler.deliveries.load(Ordering::SeqCst) >= 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("all three messages settle, one after a retry");
    consumer.stop(Duration::from_secs(1)).await;

    assert_eq!(queue.dead_letter_count().await, 0);
}

#[tokio::test]
async fn graceful_stop_drains_the_inflight_batch() {
    let queue = Arc::new(MemoryQueue::new(QueueName::Covers, 3));

    struct SlowHandler {
        done: AtomicU32,
    }
    #[async_trait]
    impl JobHandler for SlowHandler {
        async fn handle(&self, _message: &QueueMessage) -> Result<(), AlexandriaError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
    let handler = Arc::new(SlowHandler {
        done: AtomicU32::new(0),
    });

    queue.send(cover_message("k")).await.unwrap();
    let consumer = Consumer::new(queue.clone(), handler.clone(), test_config(3)).spawn();

    // Give the consumer time to lease, then stop with a generous drain.
    tokio::time::sleep(Duration::from_millis(30)).await;
    consumer.stop(Duration::from_secs(2)).await;

    assert_eq!(handler.done.load(Ordering::SeqCst), 1);
    assert_eq!(queue.pending().await, 0);
}
