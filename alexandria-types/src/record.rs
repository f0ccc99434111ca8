//! Catalog entity records exchanged between providers, orchestrators, and storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Isbn;

/// Internal key for persisted entities (editions, works, authors).
pub type EntityKey = u64;

/// Kind discriminator for crosswalk rows and webhook payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A specific publication identified by ISBN.
    Edition,
    /// The abstract book that editions manifest.
    Work,
    /// A person or collective credited on editions.
    Author,
}

impl EntityKind {
    /// Stable label for logs and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Edition => "edition",
            Self::Work => "work",
            Self::Author => "author",
        }
    }
}

/// Possibly-partial publication date as reported by providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationDate {
    /// Publication year.
    pub year: i32,
    /// Month, 1-12, when known.
    pub month: Option<u32>,
    /// Day of month when known.
    pub day: Option<u32>,
}

impl PublicationDate {
    /// Year-only date, the most common provider answer.
    #[must_use]
    pub const fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }
}

/// An external identifier attached to a provider response
/// (Amazon ASIN, Google volume id, knowledge-graph QID, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef {
    /// Namespace of the identifier (e.g. "amazon", "google").
    pub provider: String,
    /// The identifier value in that namespace.
    pub id: String,
}

/// A specific physical or digital publication identified by an ISBN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditionRecord {
    /// Primary identifier.
    pub isbn: Isbn,
    /// Edition title as reported.
    pub title: String,
    /// Credited author display names, in reported order.
    pub authors: Vec<String>,
    /// Publisher name, when known.
    pub publisher: Option<String>,
    /// Publication date, when known.
    pub published: Option<PublicationDate>,
    /// Page count, when known.
    pub page_count: Option<u32>,
    /// BCP-47-ish language tag, when known.
    pub language: Option<String>,
    /// Best cover image URL reported by the source.
    pub cover_url: Option<String>,
    /// Subject/genre labels; unioned across sources on merge.
    pub subjects: Vec<String>,
    /// External identifiers for the crosswalk table.
    pub external_ids: Vec<ExternalRef>,
    /// Every ISBN known to denote this same edition, self included.
    pub related_isbns: Vec<Isbn>,
    /// Name of the provider that produced this record.
    pub source: String,
    /// Source-reported confidence, 0-100.
    pub confidence: u8,
}

impl EditionRecord {
    /// Minimal record with the invariant `isbn ∈ related_isbns` established.
    #[must_use]
    pub fn new(isbn: Isbn, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            related_isbns: vec![isbn.clone()],
            isbn,
            title: title.into(),
            authors: Vec::new(),
            publisher: None,
            published: None,
            page_count: None,
            language: None,
            cover_url: None,
            subjects: Vec::new(),
            external_ids: Vec::new(),
            source: source.into(),
            confidence: 50,
        }
    }
}

/// The abstract book to which editions belong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    /// Internal key.
    pub key: EntityKey,
    /// Canonical title.
    pub title: String,
    /// Keys of credited authors.
    pub author_keys: Vec<EntityKey>,
}

/// A persisted author row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    /// Internal key.
    pub key: EntityKey,
    /// Display name as first reported.
    pub name: String,
    /// Deterministic canonical form of `name`; maintained by the store
    /// on every insert and update.
    pub normalized_name: String,
    /// Knowledge-graph identifier, when resolved.
    pub qid: Option<String>,
    /// Number of works attributed to this author.
    pub work_count: u32,
}

/// One representative per normalized name, with the variant spellings
/// that collapse into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAuthor {
    /// Key of the representative row.
    pub key: EntityKey,
    /// Display name of the representative row.
    pub name: String,
    /// The shared normalized name.
    pub normalized_name: String,
    /// Work count of the representative row.
    pub work_count: u32,
    /// All raw spellings observed for this normalized name.
    pub variants: Vec<String>,
}

/// A crosswalk row mapping an external identifier to an internal entity.
///
/// `(entity, provider, provider_id)` is unique; inserts are conflict-safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrosswalkEntry {
    /// Kind of the internal entity.
    pub entity: EntityKind,
    /// Internal key of the entity: the canonical ISBN for editions, the
    /// decimal entity key for works and authors.
    pub key: String,
    /// External identifier namespace.
    pub provider: String,
    /// External identifier value.
    pub provider_id: String,
    /// Mapping confidence, 0-100.
    pub confidence: u8,
}

/// A resolved identity-crosswalk answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrosswalkMatch {
    /// Internal key the external id resolved to.
    pub key: EntityKey,
    /// Resolution confidence, 0-100.
    pub confidence: u8,
}

/// A candidate book produced by an AI list generator.
///
/// The `confidence` field is advisory; checksum validation of `isbn` is
/// the authoritative gate before anything enters the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedBook {
    /// Candidate title.
    pub title: String,
    /// Candidate primary author.
    pub author: String,
    /// Candidate ISBN, already checksum-validated.
    pub isbn: Option<Isbn>,
    /// Generator-reported confidence, 0-100.
    pub confidence: u8,
}

/// One page of an author bibliography fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BibliographyPage {
    /// Editions on this page.
    pub editions: Vec<EditionRecord>,
    /// Whether the provider reports further pages.
    pub has_more: bool,
}

/// Seed for an edition-variant lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantQuery {
    /// Expand from a persisted work.
    Work(EntityKey),
    /// Expand from a canonical ISBN.
    Isbn(Isbn),
}

/// Timestamped provider attribution recorded in the enrichment log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    /// Provider name.
    pub provider: String,
    /// Wall-clock duration of the call in milliseconds.
    pub duration_ms: u64,
    /// Whether the call produced a usable result.
    pub succeeded: bool,
}

/// A row in the enrichment log table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentLogRow {
    /// The identifier that was enriched.
    pub target: String,
    /// Providers consulted, in order, with durations and outcomes.
    pub chain: Vec<ProviderAttempt>,
    /// Terminal outcome label ("inserted", "updated", "unchanged", "empty").
    pub outcome: String,
    /// When the enrichment finished.
    pub finished_at: DateTime<Utc>,
}
