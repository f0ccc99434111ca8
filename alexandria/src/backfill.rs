//! Checkpointed historical seeding.
//!
//! The scheduler walks year buckets between the configured bounds. Each
//! bucket reads candidates from a catalog source, validates and dedupes
//! them, enqueues the remainder on the enrichment queue, and checkpoints.
//! A restart with the same bounds resumes behind the checkpoint, so an
//! interrupted run plus its resume produce the same totals as one
//! uninterrupted run.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use alexandria_core::kv::KvStore;
use alexandria_core::store::CatalogStore;
use alexandria_core::{AlexandriaError, Isbn};
use alexandria_types::{
    BackfillCandidate, BackfillConfig, EnrichmentJob, JobPayload, JobPriority, QueueMessage,
};

use crate::Alexandria;
use crate::dedup::DedupService;
use crate::queue::JobQueue;

/// Where backfill candidates come from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Up to `batch` candidates for one planning bucket. Candidates carry
    /// validated ISBNs only.
    async fn candidates(
        &self,
        bucket_id: &str,
        batch: usize,
    ) -> Result<Vec<BackfillCandidate>, AlexandriaError>;
}

/// AI-generated curated lists, one prompt per year bucket.
///
/// Model selection is a scheduler heuristic, not a core invariant: buckets
/// before the cutoff year use the classic generator, the rest use the
/// current one. Either falls back to the full generation fan-out when the
/// named provider is unavailable.
pub struct GenerationSource {
    alexandria: Arc<Alexandria>,
    classic_provider: String,
    current_provider: String,
    cutoff_year: i32,
}

impl GenerationSource {
    /// Create a source over two named generation providers.
    pub fn new(
        alexandria: Arc<Alexandria>,
        classic_provider: impl Into<String>,
        current_provider: impl Into<String>,
        cutoff_year: i32,
    ) -> Self {
        Self {
            alexandria,
            classic_provider: classic_provider.into(),
            current_provider: current_provider.into(),
            cutoff_year,
        }
    }
}

#[async_trait]
impl CatalogSource for GenerationSource {
    async fn candidates(
        &self,
        bucket_id: &str,
        batch: usize,
    ) -> Result<Vec<BackfillCandidate>, AlexandriaError> {
        let year: i32 = bucket_id
            .parse()
            .map_err(|_| AlexandriaError::InvalidArg(format!("bad bucket id: {bucket_id}")))?;
        let provider = if year >= self.cutoff_year {
            &self.current_provider
        } else {
            &self.classic_provider
        };
        let prompt = format!(
            "List notable books first published in {year}, across fiction and \
             non-fiction. Prefer widely-catalogued editions."
        );
        let books = self
            .alexandria
            .generate_books_with(provider, &prompt, batch)
            .await?;

        // Candidates without a checksum-valid ISBN cannot enter the
        // pipeline; the advisory confidence field does not override that.
        Ok(books
            .into_iter()
            .filter_map(|book| {
                book.isbn.map(|isbn| BackfillCandidate {
                    isbn,
                    title: book.title,
                    author: book.author,
                })
            })
            .collect())
    }
}

/// A cursor over already-persisted editions, for re-enrichment sweeps.
/// Bucket ids are page indices.
pub struct EditionCursorSource {
    store: Arc<dyn CatalogStore>,
}

impl EditionCursorSource {
    /// Create a cursor source over the catalog.
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CatalogSource for EditionCursorSource {
    async fn candidates(
        &self,
        bucket_id: &str,
        batch: usize,
    ) -> Result<Vec<BackfillCandidate>, AlexandriaError> {
        let page: usize = bucket_id
            .parse()
            .map_err(|_| AlexandriaError::InvalidArg(format!("bad bucket id: {bucket_id}")))?;
        let editions = self.store.editions_page(page * batch, batch).await?;
        Ok(editions
            .into_iter()
            .map(|edition| BackfillCandidate {
                isbn: edition.isbn,
                title: edition.title,
                author: edition.authors.into_iter().next().unwrap_or_default(),
            })
            .collect())
    }
}

/// Rolling totals carried in the checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointTotals {
    /// Candidates seen across all buckets.
    pub isbns_found: u64,
    /// Candidates that were not yet in the catalog.
    pub new: u64,
    /// Messages actually enqueued (zero on dry runs).
    pub queued: u64,
}

/// The durable resume record, written after every bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Buckets that completed (including ones that failed; see
    /// `failed_keys`).
    pub processed_keys: Vec<String>,
    /// Buckets that failed and are eligible for `force_retry`.
    pub failed_keys: Vec<String>,
    /// Buckets planned for this run's bounds.
    pub total_planned: u32,
    /// Rolling totals.
    pub totals: CheckpointTotals,
    /// When the first run with these bounds started.
    pub started_at: DateTime<Utc>,
    /// When the checkpoint was last written.
    pub last_updated: DateTime<Utc>,
}

impl Checkpoint {
    fn new(total_planned: u32) -> Self {
        let now = Utc::now();
        Self {
            processed_keys: Vec::new(),
            failed_keys: Vec::new(),
            total_planned,
            totals: CheckpointTotals::default(),
            started_at: now,
            last_updated: now,
        }
    }
}

/// Summary returned by one scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    /// Buckets processed in this run.
    pub buckets_processed: usize,
    /// Buckets skipped because the checkpoint already covered them.
    pub buckets_skipped: usize,
    /// Totals accumulated across this run and any prior resumed runs.
    pub totals: CheckpointTotals,
}

/// Resumable year-bucket seeding engine.
pub struct BackfillScheduler {
    source: Arc<dyn CatalogSource>,
    dedup: DedupService,
    queue: Arc<dyn JobQueue>,
    kv: Arc<dyn KvStore>,
    cfg: BackfillConfig,
    enqueue_chunk: usize,
}

impl BackfillScheduler {
    /// Wire the scheduler to its collaborators. `enqueue_chunk` caps the
    /// size of each `send_batch` to the queue's configured batch size.
    pub fn new(
        source: Arc<dyn CatalogSource>,
        dedup: DedupService,
        queue: Arc<dyn JobQueue>,
        kv: Arc<dyn KvStore>,
        cfg: BackfillConfig,
        enqueue_chunk: usize,
    ) -> Self {
        Self {
            source,
            dedup,
            queue,
            kv,
            cfg,
            enqueue_chunk: enqueue_chunk.max(1),
        }
    }

    fn checkpoint_key(&self) -> String {
        format!("backfill:{}:{}", self.cfg.start_year, self.cfg.end_year)
    }

    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>, AlexandriaError> {
        let Some(raw) = self.kv.get(&self.checkpoint_key()).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AlexandriaError::Data(format!("corrupt backfill checkpoint: {e}")))
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), AlexandriaError> {
        let raw = serde_json::to_string(checkpoint)
            .map_err(|e| AlexandriaError::Internal(format!("checkpoint serialization: {e}")))?;
        self.kv.put(&self.checkpoint_key(), raw, None).await
    }

    /// Walk every bucket in bounds, resuming behind any existing
    /// checkpoint.
    ///
    /// # Errors
    /// Checkpoint load/store failures. Per-bucket failures are recorded in
    /// the checkpoint and do not abort the run.
    pub async fn run(&self) -> Result<BackfillReport, AlexandriaError> {
        let buckets: Vec<String> = (self.cfg.start_year..=self.cfg.end_year)
            .map(|year| year.to_string())
            .collect();
        let mut checkpoint = match self.load_checkpoint().await? {
            Some(existing) => existing,
            None => Checkpoint::new(buckets.len() as u32),
        };

        let mut buckets_processed = 0;
        let mut buckets_skipped = 0;
        for bucket in &buckets {
            let done = checkpoint.processed_keys.contains(bucket);
            let failed_before = checkpoint.failed_keys.contains(bucket);
            if done && !(self.cfg.force_retry && failed_before) {
                buckets_skipped += 1;
                continue;
            }

            match self.process_bucket(bucket, &mut checkpoint.totals).await {
                Ok(()) => {
                    checkpoint.failed_keys.retain(|k| k != bucket);
                }
                Err(e) => {
                    tracing::warn!(bucket, error = %e, "backfill bucket failed");
                    if !failed_before {
                        checkpoint.failed_keys.push(bucket.clone());
                    }
                }
            }
            if !done {
                checkpoint.processed_keys.push(bucket.clone());
            }
            checkpoint.last_updated = Utc::now();
            self.save_checkpoint(&checkpoint).await?;
            buckets_processed += 1;
        }

        Ok(BackfillReport {
            buckets_processed,
            buckets_skipped,
            totals: checkpoint.totals,
        })
    }

    async fn process_bucket(
        &self,
        bucket: &str,
        totals: &mut CheckpointTotals,
    ) -> Result<(), AlexandriaError> {
        let candidates = self.source.candidates(bucket, self.cfg.batch_size).await?;
        totals.isbns_found += candidates.len() as u64;

        let isbns: Vec<Isbn> = candidates.iter().map(|c| c.isbn.clone()).collect();
        let fresh: HashSet<Isbn> = self
            .dedup
            .filter_new_isbns(&isbns)
            .await?
            .into_iter()
            .collect();
        totals.new += fresh.len() as u64;

        if self.cfg.dry_run {
            tracing::info!(bucket, found = candidates.len(), new = fresh.len(), "dry run");
            return Ok(());
        }

        let messages: Vec<QueueMessage> = candidates
            .into_iter()
            .filter(|c| fresh.contains(&c.isbn))
            .map(|c| {
                QueueMessage::new(
                    c.isbn.as_str().to_string(),
                    JobPayload::EnrichEdition(EnrichmentJob {
                        isbn: c.isbn,
                        title: Some(c.title),
                        author: Some(c.author),
                        priority: JobPriority::Low,
                        source: "backfill".to_string(),
                    }),
                )
            })
            .collect();
        let queued = messages.len() as u64;
        for chunk in messages.chunks(self.enqueue_chunk) {
            self.queue.send_batch(chunk.to_vec()).await?;
        }
        totals.queued += queued;
        Ok(())
    }
}
