//! Deterministic mock provider for tests and CI-safe examples.
//!
//! Behavior is configured per capability with closures through
//! [`MockProvider::builder`]; capabilities without a configured closure are
//! not advertised. Every capability call bumps a shared counter so tests
//! can assert on traffic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::time::{Duration, sleep};

use alexandria_core::provider::{
    AuthorBibliographyProvider, BookGenerationProvider, BookMetadataProvider, CoverUrlProvider,
    EditionVariantsProvider, FetchOptions, IdentityCrosswalkProvider, MetadataProvider,
};
use alexandria_types::{
    AlexandriaError, BibliographyPage, CrosswalkMatch, EditionRecord, ExternalRef, GeneratedBook,
    Isbn, ProviderTier, VariantQuery,
};

pub mod fixtures;

type EditionFn = Arc<dyn Fn(&Isbn) -> Result<EditionRecord, AlexandriaError> + Send + Sync>;
type VariantsFn =
    Arc<dyn Fn(&VariantQuery) -> Result<Vec<EditionRecord>, AlexandriaError> + Send + Sync>;
type BibliographyFn =
    Arc<dyn Fn(&str, u32) -> Result<BibliographyPage, AlexandriaError> + Send + Sync>;
type GenerateFn =
    Arc<dyn Fn(&str, usize) -> Result<Vec<GeneratedBook>, AlexandriaError> + Send + Sync>;
type ResolveFn =
    Arc<dyn Fn(&ExternalRef) -> Result<Option<CrosswalkMatch>, AlexandriaError> + Send + Sync>;
type CoverFn = Arc<dyn Fn(&Isbn) -> Result<Option<String>, AlexandriaError> + Send + Sync>;

/// Closure-configurable in-memory provider.
pub struct MockProvider {
    name: &'static str,
    tier: ProviderTier,
    available: bool,
    delay_ms: u64,
    batch_limit: usize,
    calls: AtomicU64,

    edition_fn: Option<EditionFn>,
    variants_fn: Option<VariantsFn>,
    bibliography_fn: Option<BibliographyFn>,
    generate_fn: Option<GenerateFn>,
    resolve_fn: Option<ResolveFn>,
    cover_fn: Option<CoverFn>,
}

impl MockProvider {
    /// Start configuring a mock provider.
    pub fn builder() -> MockProviderBuilder {
        MockProviderBuilder::new()
    }

    /// Total capability calls observed.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn observe(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }
}

impl MetadataProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn vendor(&self) -> &'static str {
        "Mock"
    }

    fn tier(&self) -> ProviderTier {
        self.tier
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn as_book_metadata_provider(&self) -> Option<&dyn BookMetadataProvider> {
        self.edition_fn
            .is_some()
            .then_some(self as &dyn BookMetadataProvider)
    }

    fn as_edition_variants_provider(&self) -> Option<&dyn EditionVariantsProvider> {
        self.variants_fn
            .is_some()
            .then_some(self as &dyn EditionVariantsProvider)
    }

    fn as_author_bibliography_provider(&self) -> Option<&dyn AuthorBibliographyProvider> {
        self.bibliography_fn
            .is_some()
            .then_some(self as &dyn AuthorBibliographyProvider)
    }

    fn as_book_generation_provider(&self) -> Option<&dyn BookGenerationProvider> {
        self.generate_fn
            .is_some()
            .then_some(self as &dyn BookGenerationProvider)
    }

    fn as_identity_crosswalk_provider(&self) -> Option<&dyn IdentityCrosswalkProvider> {
        self.resolve_fn
            .is_some()
            .then_some(self as &dyn IdentityCrosswalkProvider)
    }

    fn as_cover_url_provider(&self) -> Option<&dyn CoverUrlProvider> {
        self.cover_fn
            .is_some()
            .then_some(self as &dyn CoverUrlProvider)
    }
}

#[async_trait]
impl BookMetadataProvider for MockProvider {
    async fn edition_by_isbn(
        &self,
        isbn: &Isbn,
        _opts: &FetchOptions,
    ) -> Result<EditionRecord, AlexandriaError> {
        self.observe().await;
        match &self.edition_fn {
            Some(f) => f(isbn),
            None => Err(AlexandriaError::unsupported("book-metadata")),
        }
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }
}

#[async_trait]
impl EditionVariantsProvider for MockProvider {
    async fn variants(
        &self,
        query: &VariantQuery,
        _opts: &FetchOptions,
    ) -> Result<Vec<EditionRecord>, AlexandriaError> {
        self.observe().await;
        match &self.variants_fn {
            Some(f) => f(query),
            None => Err(AlexandriaError::unsupported("edition-variants")),
        }
    }
}

#[async_trait]
impl AuthorBibliographyProvider for MockProvider {
    async fn bibliography_page(
        &self,
        author: &str,
        page: u32,
        _opts: &FetchOptions,
    ) -> Result<BibliographyPage, AlexandriaError> {
        self.observe().await;
        match &self.bibliography_fn {
            Some(f) => f(author, page),
            None => Err(AlexandriaError::unsupported("author-bibliography")),
        }
    }
}

#[async_trait]
impl BookGenerationProvider for MockProvider {
    async fn generate_books(
        &self,
        prompt: &str,
        count: usize,
        _opts: &FetchOptions,
    ) -> Result<Vec<GeneratedBook>, AlexandriaError> {
        self.observe().await;
        match &self.generate_fn {
            Some(f) => f(prompt, count),
            None => Err(AlexandriaError::unsupported("book-generation")),
        }
    }
}

#[async_trait]
impl IdentityCrosswalkProvider for MockProvider {
    async fn resolve_author(
        &self,
        external: &ExternalRef,
        _opts: &FetchOptions,
    ) -> Result<Option<CrosswalkMatch>, AlexandriaError> {
        self.observe().await;
        match &self.resolve_fn {
            Some(f) => f(external),
            None => Err(AlexandriaError::unsupported("identity-crosswalk")),
        }
    }
}

#[async_trait]
impl CoverUrlProvider for MockProvider {
    async fn cover_url(
        &self,
        isbn: &Isbn,
        _opts: &FetchOptions,
    ) -> Result<Option<String>, AlexandriaError> {
        self.observe().await;
        match &self.cover_fn {
            Some(f) => f(isbn),
            None => Err(AlexandriaError::unsupported("cover-url")),
        }
    }
}

/// Builder for [`MockProvider`].
pub struct MockProviderBuilder {
    name: &'static str,
    tier: ProviderTier,
    available: bool,
    delay_ms: u64,
    batch_limit: usize,

    edition_fn: Option<EditionFn>,
    variants_fn: Option<VariantsFn>,
    bibliography_fn: Option<BibliographyFn>,
    generate_fn: Option<GenerateFn>,
    resolve_fn: Option<ResolveFn>,
    cover_fn: Option<CoverFn>,
}

impl Default for MockProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProviderBuilder {
    /// Fresh builder with an available free-tier provider named "mock".
    pub fn new() -> Self {
        Self {
            name: "mock",
            tier: ProviderTier::Free,
            available: true,
            delay_ms: 0,
            batch_limit: 1,
            edition_fn: None,
            variants_fn: None,
            bibliography_fn: None,
            generate_fn: None,
            resolve_fn: None,
            cover_fn: None,
        }
    }

    /// Set the provider name used in priority lists.
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Set the commercial tier.
    pub fn tier(mut self, tier: ProviderTier) -> Self {
        self.tier = tier;
        self
    }

    /// Mark the provider unavailable (missing credentials).
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Delay every capability call, for timeout and racing tests.
    pub fn delay(mut self, d: Duration) -> Self {
        self.delay_ms = d.as_millis() as u64;
        self
    }

    /// Advertise a batch endpoint accepting up to `limit` ISBNs per call.
    pub fn batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Configure edition lookup behavior.
    pub fn with_edition_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Isbn) -> Result<EditionRecord, AlexandriaError> + Send + Sync + 'static,
    {
        self.edition_fn = Some(Arc::new(f));
        self
    }

    /// Always answer edition lookups with `record`.
    pub fn returns_edition_ok(self, record: EditionRecord) -> Self {
        self.with_edition_fn(move |_| Ok(record.clone()))
    }

    /// Always answer edition lookups with not-found.
    pub fn returns_edition_not_found(self) -> Self {
        self.with_edition_fn(|isbn| Err(AlexandriaError::not_found(format!("edition {isbn}"))))
    }

    /// Configure variant lookup behavior.
    pub fn with_variants_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&VariantQuery) -> Result<Vec<EditionRecord>, AlexandriaError>
            + Send
            + Sync
            + 'static,
    {
        self.variants_fn = Some(Arc::new(f));
        self
    }

    /// Always answer variant lookups with `records`.
    pub fn returns_variants_ok(self, records: Vec<EditionRecord>) -> Self {
        self.with_variants_fn(move |_| Ok(records.clone()))
    }

    /// Configure bibliography behavior.
    pub fn with_bibliography_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u32) -> Result<BibliographyPage, AlexandriaError> + Send + Sync + 'static,
    {
        self.bibliography_fn = Some(Arc::new(f));
        self
    }

    /// Configure AI generation behavior.
    pub fn with_generate_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize) -> Result<Vec<GeneratedBook>, AlexandriaError> + Send + Sync + 'static,
    {
        self.generate_fn = Some(Arc::new(f));
        self
    }

    /// Always answer generation with `books`.
    pub fn returns_generated_ok(self, books: Vec<GeneratedBook>) -> Self {
        self.with_generate_fn(move |_, _| Ok(books.clone()))
    }

    /// Configure identity resolution behavior.
    pub fn with_resolve_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExternalRef) -> Result<Option<CrosswalkMatch>, AlexandriaError>
            + Send
            + Sync
            + 'static,
    {
        self.resolve_fn = Some(Arc::new(f));
        self
    }

    /// Configure cover URL behavior.
    pub fn with_cover_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Isbn) -> Result<Option<String>, AlexandriaError> + Send + Sync + 'static,
    {
        self.cover_fn = Some(Arc::new(f));
        self
    }

    /// Finish building.
    pub fn build(self) -> Arc<MockProvider> {
        Arc::new(MockProvider {
            name: self.name,
            tier: self.tier,
            available: self.available,
            delay_ms: self.delay_ms,
            batch_limit: self.batch_limit,
            calls: AtomicU64::new(0),
            edition_fn: self.edition_fn,
            variants_fn: self.variants_fn,
            bibliography_fn: self.bibliography_fn,
            generate_fn: self.generate_fn,
            resolve_fn: self.resolve_fn,
            cover_fn: self.cover_fn,
        })
    }
}
