//! Alexandria-specific data transfer objects and configuration primitives.
#![warn(missing_docs)]

mod capability;
mod config;
mod error;
mod isbn;
mod provider;
mod queue;
mod record;

pub use capability::Capability;
pub use config::{
    BackfillConfig, BackoffConfig, CacheConfig, CacheMode, EngineConfig, OrchestratorConfig,
    QueueConfig, QuotaConfig, RateClass, RateDecision, RateLimitConfig, WebhookConfig,
};
pub use error::{AlexandriaError, Disposition};
pub use isbn::Isbn;
pub use provider::{ProviderKey, ProviderTier};
pub use queue::{
    BackfillCandidate, BackfillJob, CoverJob, EnrichmentJob, JobKind, JobPayload, JobPriority,
    QueueMessage, QueueName,
};
pub use record::{
    AuthorRecord, BibliographyPage, CanonicalAuthor, CrosswalkEntry, CrosswalkMatch, EditionRecord,
    EnrichmentLogRow, EntityKey, EntityKind, ExternalRef, GeneratedBook, ProviderAttempt,
    PublicationDate, VariantQuery, WorkRecord,
};
