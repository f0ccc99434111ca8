use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use alexandria_types::{
    AlexandriaError, BibliographyPage, CacheMode, Capability, CrosswalkMatch, EditionRecord,
    ExternalRef, GeneratedBook, Isbn, ProviderKey, ProviderTier, VariantQuery,
};

/// Per-call options carried into every provider invocation.
///
/// Cancellation is cooperative: orchestrators bound each call with a
/// timeout and drop the future on the shared deadline, so providers only
/// need to avoid detaching work that outlives the call.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Cache strategy hint for wrapped providers.
    pub cache: CacheMode,
    /// Per-call timeout override; orchestrator defaults apply when `None`.
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    /// Options that bypass the read-through cache (forced refresh paths).
    #[must_use]
    pub const fn uncached() -> Self {
        Self {
            cache: CacheMode::Disabled,
            timeout: None,
        }
    }
}

/// Focused role trait for providers that look up edition metadata by ISBN.
#[async_trait]
pub trait BookMetadataProvider: Send + Sync {
    /// Fetch metadata for a single edition.
    ///
    /// A provider that simply has no record answers `NotFound`, which
    /// orchestrators treat as an empty success rather than a failure.
    async fn edition_by_isbn(
        &self,
        isbn: &Isbn,
        opts: &FetchOptions,
    ) -> Result<EditionRecord, AlexandriaError>;

    /// Fetch metadata for many editions at once.
    ///
    /// The default implementation loops over [`edition_by_isbn`](Self::edition_by_isbn),
    /// skipping not-found entries. Providers with a real batch endpoint
    /// override this and declare their cap via [`batch_limit`](Self::batch_limit).
    async fn editions_by_isbns(
        &self,
        isbns: &[Isbn],
        opts: &FetchOptions,
    ) -> Result<HashMap<Isbn, EditionRecord>, AlexandriaError> {
        let mut out = HashMap::with_capacity(isbns.len());
        for isbn in isbns {
            match self.edition_by_isbn(isbn, opts).await {
                Ok(record) => {
                    out.insert(isbn.clone(), record);
                }
                Err(AlexandriaError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Maximum ISBNs accepted by a single batch call.
    fn batch_limit(&self) -> usize {
        1
    }
}

/// Focused role trait for providers that enumerate edition variants of a work.
#[async_trait]
pub trait EditionVariantsProvider: Send + Sync {
    /// Fetch all editions known to manifest the queried work.
    async fn variants(
        &self,
        query: &VariantQuery,
        opts: &FetchOptions,
    ) -> Result<Vec<EditionRecord>, AlexandriaError>;
}

/// Focused role trait for providers that serve paged author bibliographies.
#[async_trait]
pub trait AuthorBibliographyProvider: Send + Sync {
    /// Fetch one page (1-based) of the editions attributed to `author`.
    async fn bibliography_page(
        &self,
        author: &str,
        page: u32,
        opts: &FetchOptions,
    ) -> Result<BibliographyPage, AlexandriaError>;
}

/// Focused role trait for AI providers that generate candidate book lists.
///
/// Output must be schema-constrained upstream; any ISBN in the result is
/// untrusted until it passes checksum validation, which adapters perform
/// before returning.
#[async_trait]
pub trait BookGenerationProvider: Send + Sync {
    /// Generate up to `count` candidate books for a curated prompt.
    async fn generate_books(
        &self,
        prompt: &str,
        count: usize,
        opts: &FetchOptions,
    ) -> Result<Vec<GeneratedBook>, AlexandriaError>;
}

/// Focused role trait for providers that resolve external identity ids.
#[async_trait]
pub trait IdentityCrosswalkProvider: Send + Sync {
    /// Resolve an external author identifier to an internal key, if known.
    async fn resolve_author(
        &self,
        external: &ExternalRef,
        opts: &FetchOptions,
    ) -> Result<Option<CrosswalkMatch>, AlexandriaError>;
}

/// Focused role trait for providers that know cover image URLs.
#[async_trait]
pub trait CoverUrlProvider: Send + Sync {
    /// Best-known cover image URL for an ISBN, if any.
    async fn cover_url(
        &self,
        isbn: &Isbn,
        opts: &FetchOptions,
    ) -> Result<Option<String>, AlexandriaError>;
}

/// Main provider trait implemented by adapter crates. Exposes capability
/// discovery through `as_*_provider` accessors.
///
/// Providers are stateless apart from their HTTP clients; anything
/// per-request travels in [`FetchOptions`].
pub trait MetadataProvider: Send + Sync {
    /// A stable identifier for priority lists (e.g. "isbndb", "openlibrary").
    fn name(&self) -> &'static str;

    /// Canonical provider key constructed from the static name.
    fn key(&self) -> ProviderKey {
        ProviderKey::new(self.name())
    }

    /// Human-friendly vendor string.
    fn vendor(&self) -> &'static str {
        "unknown"
    }

    /// Commercial tier, consulted by the merge policy and quota layer.
    fn tier(&self) -> ProviderTier;

    /// Cheap, side-effect-free availability check.
    ///
    /// Typically "credentials present"; quota wrappers extend this with
    /// "daily budget not exhausted".
    fn is_available(&self) -> bool {
        true
    }

    /// Advertise metadata capability by returning a usable trait object when supported.
    fn as_book_metadata_provider(&self) -> Option<&dyn BookMetadataProvider> {
        None
    }

    /// If implemented, returns a trait object for edition variants.
    fn as_edition_variants_provider(&self) -> Option<&dyn EditionVariantsProvider> {
        None
    }

    /// If implemented, returns a trait object for author bibliographies.
    fn as_author_bibliography_provider(&self) -> Option<&dyn AuthorBibliographyProvider> {
        None
    }

    /// If implemented, returns a trait object for AI book generation.
    fn as_book_generation_provider(&self) -> Option<&dyn BookGenerationProvider> {
        None
    }

    /// If implemented, returns a trait object for identity crosswalk resolution.
    fn as_identity_crosswalk_provider(&self) -> Option<&dyn IdentityCrosswalkProvider> {
        None
    }

    /// If implemented, returns a trait object for cover URLs.
    fn as_cover_url_provider(&self) -> Option<&dyn CoverUrlProvider> {
        None
    }

    /// Whether this provider advertises `cap`.
    fn supports(&self, cap: Capability) -> bool {
        match cap {
            Capability::BookMetadata => self.as_book_metadata_provider().is_some(),
            Capability::EditionVariants => self.as_edition_variants_provider().is_some(),
            Capability::AuthorBibliography => self.as_author_bibliography_provider().is_some(),
            Capability::BookGeneration => self.as_book_generation_provider().is_some(),
            Capability::IdentityCrosswalk => self.as_identity_crosswalk_provider().is_some(),
            Capability::CoverUrl => self.as_cover_url_provider().is_some(),
            _ => false,
        }
    }
}
