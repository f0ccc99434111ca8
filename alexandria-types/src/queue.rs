//! Queue names, job payloads, and the message envelope shared by producers
//! and consumers.

use chrono::{DateTime, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::{EntityKey, Isbn};

/// The three primary queues. Each has a mirrored dead-letter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    /// Edition/work/author enrichment work.
    Enrichment,
    /// Cover image processing work.
    Covers,
    /// Historical backfill batches.
    Backfill,
}

impl QueueName {
    /// Stable queue identifier for bindings and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enrichment => "enrichment",
            Self::Covers => "covers",
            Self::Backfill => "backfill",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminator for queued work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Enrich a single edition by ISBN.
    EnrichEdition,
    /// Enrich a persisted work by key.
    EnrichWork,
    /// Fetch and enrich an author bibliography.
    EnrichAuthor,
    /// Process a cover image from a provider URL.
    ProcessCover,
    /// Process one backfill bucket of candidates.
    BackfillBatch,
}

impl JobKind {
    /// Stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnrichEdition => "enrich_edition",
            Self::EnrichWork => "enrich_work",
            Self::EnrichAuthor => "enrich_author",
            Self::ProcessCover => "process_cover",
            Self::BackfillBatch => "backfill_batch",
        }
    }
}

/// Relative scheduling priority for enrichment work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    /// Backfill and other bulk work.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// User-triggered synchronous-adjacent work.
    High,
}

/// Payload for `enrich_edition` messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentJob {
    /// Validated target ISBN.
    pub isbn: Isbn,
    /// Seed title, when the producer knows one.
    pub title: Option<String>,
    /// Seed author, when the producer knows one.
    pub author: Option<String>,
    /// Scheduling priority.
    #[serde(default)]
    pub priority: JobPriority,
    /// Producer tag ("api", "backfill", "bibliography", ...).
    pub source: String,
}

/// Payload for `process_cover` messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverJob {
    /// Edition the cover belongs to.
    pub isbn: Isbn,
    /// Source image URL reported by a provider.
    pub provider_url: String,
    /// Optional size hint ("S", "M", "L").
    pub size_hint: Option<String>,
}

/// One candidate inside a backfill bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillCandidate {
    /// Validated candidate ISBN.
    pub isbn: Isbn,
    /// Candidate title.
    pub title: String,
    /// Candidate primary author.
    pub author: String,
}

/// Payload for `backfill_batch` messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillJob {
    /// Planning-bucket identifier (e.g. "1987", "2003-06").
    pub bucket_id: String,
    /// Deduplicated candidates for this bucket.
    pub candidates: Vec<BackfillCandidate>,
}

/// Tagged job payload. The variant determines the queue a message
/// belongs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Enrich a single edition.
    EnrichEdition(EnrichmentJob),
    /// Enrich a persisted work.
    EnrichWork {
        /// Internal key of the work.
        key: EntityKey,
    },
    /// Fetch and enrich an author bibliography.
    EnrichAuthor {
        /// Author display name.
        name: String,
        /// Page cap for the paged provider fetch.
        max_pages: u32,
    },
    /// Process a cover image.
    ProcessCover(CoverJob),
    /// Process one backfill bucket.
    BackfillBatch(BackfillJob),
}

impl JobPayload {
    /// The kind discriminator of this payload.
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        match self {
            Self::EnrichEdition(_) => JobKind::EnrichEdition,
            Self::EnrichWork { .. } => JobKind::EnrichWork,
            Self::EnrichAuthor { .. } => JobKind::EnrichAuthor,
            Self::ProcessCover(_) => JobKind::ProcessCover,
            Self::BackfillBatch(_) => JobKind::BackfillBatch,
        }
    }

    /// The queue this payload belongs on.
    #[must_use]
    pub const fn queue(&self) -> QueueName {
        match self {
            Self::EnrichEdition(_) | Self::EnrichWork { .. } | Self::EnrichAuthor { .. } => {
                QueueName::Enrichment
            }
            Self::ProcessCover(_) => QueueName::Covers,
            Self::BackfillBatch(_) => QueueName::Backfill,
        }
    }
}

/// The durable message envelope.
///
/// `key` deduplicates logically identical work in logs and lets consumers
/// key their idempotence checks; `attempts` counts deliveries so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Logical identity of the work (e.g. the ISBN or author name).
    pub key: String,
    /// The work itself.
    pub payload: JobPayload,
    /// Number of deliveries so far; zero for a fresh message.
    pub attempts: u32,
    /// When the message was first enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl QueueMessage {
    /// Wrap a payload in a fresh envelope.
    #[must_use]
    pub fn new(key: impl Into<String>, payload: JobPayload) -> Self {
        Self {
            key: key.into(),
            payload,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }
}
