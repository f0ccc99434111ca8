//! Alexandria orchestrates book-metadata enrichment across multiple providers.
//!
//! Overview
//! - Routes capability requests to providers that implement the
//!   `alexandria_core` contracts, in explicit-priority-then-registration order.
//! - Fans out concurrently with per-provider timeouts; a failed or slow
//!   provider never aborts its siblings.
//! - Deduplicates fan-out results by ISBN (priority winner) with an optional
//!   fuzzy-title second pass.
//! - The enrichment engine merges provider answers field-by-field, persists
//!   through the catalog boundary, backfills the external-id crosswalk, and
//!   emits follow-up cover and bibliography jobs.
//! - The queue pipeline delivers at-least-once with bounded concurrency,
//!   classified retry/ack/dead-letter handling, and jittered backoff.
//! - The backfill scheduler seeds history in checkpointed year buckets and
//!   resumes cleanly after a restart.
//!
//! Key behaviors and trade-offs
//! - Fan-out breadth: the merge orchestrator queries every capable provider
//!   to fill field gaps; the variant orchestrator can stop on the first
//!   non-empty answer to spare rate budgets.
//! - Bibliography fetches stay sequential per author to respect the paid
//!   provider's request-per-second contract.
//! - Quota and rate ledgers are advisory; store uniqueness is authoritative.
#![warn(missing_docs)]

pub(crate) mod core;
/// Backfill planning, catalog sources, and checkpointed resume.
pub mod backfill;
/// Store-backed deduplication service.
pub mod dedup;
/// The enrichment engine.
pub mod engine;
mod orchestrator;
/// Durable queues, consumers, and retry policy.
pub mod queue;
/// Signed outbound webhook notifications.
pub mod webhook;

pub use crate::core::{Alexandria, AlexandriaBuilder};
pub use backfill::{
    BackfillReport, BackfillScheduler, CatalogSource, Checkpoint, CheckpointTotals,
    EditionCursorSource, GenerationSource,
};
pub use dedup::{DedupService, FuzzyMatch};
pub use engine::{
    BatchBook, BatchOutcome, BibliographyOutcome, EnrichmentEngine, EnrichmentOutcome,
    EnrichmentStatus,
};
pub use orchestrator::merge::MergeReport;
pub use queue::{Consumer, ConsumerHandle, Delivery, JobHandler, JobQueue, MemoryQueue};
pub use webhook::{WebhookEvent, WebhookNotifier};

pub use alexandria_middleware::{CachedProvider, QuotaAwareProvider, RateLimiter};

// Re-export the shared vocabulary for convenience.
pub use alexandria_core::{
    AlexandriaError, AuthorRecord, BibliographyPage, CacheMode, CanonicalAuthor, Capability,
    CatalogStore, CrosswalkEntry, CrosswalkMatch, Disposition, EditionRecord, EnrichmentLogRow,
    EntityKey, EntityKind, ExternalRef, FetchOptions, GeneratedBook, Isbn, KvStore, MemoryCatalog,
    MemoryKv, MetadataProvider, PendingCreations, ProviderAttempt, ProviderKey, ProviderTier,
    PublicationDate, VariantQuery, WorkRecord,
};
pub use alexandria_types::{
    BackfillConfig, BackoffConfig, CacheConfig, EngineConfig, JobKind, JobPayload, JobPriority,
    OrchestratorConfig, QueueConfig, QueueMessage, QueueName, QuotaConfig, RateClass, RateDecision,
    RateLimitConfig, WebhookConfig,
};
