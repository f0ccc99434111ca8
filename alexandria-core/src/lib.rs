//! alexandria-core
//!
//! Core traits and utilities shared across the alexandria ecosystem.
//!
//! - `provider`: the `MetadataProvider` trait and capability provider traits.
//! - `kv`: the TTL'd key-value boundary used by quotas, rate limits, and checkpoints.
//! - `store`: the catalog persistence boundary and its in-memory reference implementation.
//! - `normalize`: author/title normalization and fuzzy similarity.
//! - `pending`: batch-scoped find-or-create coordination.
#![warn(missing_docs)]

/// Provider capability traits and the primary `MetadataProvider` interface.
pub mod provider;

/// TTL'd key-value store boundary with an in-memory implementation.
pub mod kv;

/// Catalog persistence boundary with an in-memory implementation.
pub mod store;

/// Deterministic author/title normalization and similarity scoring.
pub mod normalize;

/// Batch-scoped keyed find-or-create coordination.
pub mod pending;

pub use alexandria_types::{
    AlexandriaError, AuthorRecord, BibliographyPage, CacheMode, CanonicalAuthor, Capability,
    CrosswalkEntry, CrosswalkMatch, Disposition, EditionRecord, EnrichmentLogRow, EntityKey,
    EntityKind, ExternalRef, GeneratedBook, Isbn, ProviderAttempt, ProviderKey, ProviderTier,
    PublicationDate, VariantQuery, WorkRecord,
};
pub use kv::{KvStore, MemoryKv};
pub use normalize::{normalize_author_name, normalize_title, title_similarity, trigram_similarity};
pub use pending::PendingCreations;
pub use provider::{FetchOptions, MetadataProvider};
pub use store::{CatalogStore, MemoryCatalog, TitleMatch, UpsertOutcome};
