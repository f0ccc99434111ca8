//! Read-through caching for read-heavy provider capabilities.
//!
//! Edition metadata and cover URLs dominate provider traffic and change
//! rarely, so they cache well. Not-found answers are cached too: repeat
//! lookups of unknown ISBNs would otherwise hammer the upstream. Paged
//! bibliographies, variants, and AI generation pass through uncached.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;

use alexandria_core::provider::{
    AuthorBibliographyProvider, BookGenerationProvider, BookMetadataProvider, CoverUrlProvider,
    EditionVariantsProvider, FetchOptions, IdentityCrosswalkProvider, MetadataProvider,
};
use alexandria_types::{
    AlexandriaError, BibliographyPage, CacheConfig, CacheMode, CrosswalkMatch, EditionRecord,
    ExternalRef, GeneratedBook, Isbn, ProviderTier, VariantQuery,
};

/// Wrapper that serves edition metadata and cover URLs from a TTL'd
/// in-process cache, honoring the per-call [`CacheMode`] hint.
pub struct CachedProvider {
    inner: Arc<dyn MetadataProvider>,
    // `None` caches a not-found answer.
    editions: Cache<String, Option<EditionRecord>>,
    covers: Cache<String, Option<String>>,
}

impl CachedProvider {
    /// Wrap an existing provider with a read-through cache.
    pub fn new(inner: Arc<dyn MetadataProvider>, config: &CacheConfig) -> Self {
        let editions = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .build();
        let covers = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .build();
        Self {
            inner,
            editions,
            covers,
        }
    }

    /// Access the inner provider.
    pub fn inner(&self) -> &Arc<dyn MetadataProvider> {
        &self.inner
    }

    /// Number of cached edition entries. Test observability only.
    pub fn edition_entry_count(&self) -> u64 {
        self.editions.entry_count()
    }
}

impl MetadataProvider for CachedProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn vendor(&self) -> &'static str {
        self.inner.vendor()
    }

    fn tier(&self) -> ProviderTier {
        self.inner.tier()
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn as_book_metadata_provider(&self) -> Option<&dyn BookMetadataProvider> {
        self.inner
            .as_book_metadata_provider()
            .map(|_| self as &dyn BookMetadataProvider)
    }

    fn as_cover_url_provider(&self) -> Option<&dyn CoverUrlProvider> {
        self.inner
            .as_cover_url_provider()
            .map(|_| self as &dyn CoverUrlProvider)
    }

    fn as_edition_variants_provider(&self) -> Option<&dyn EditionVariantsProvider> {
        self.inner
            .as_edition_variants_provider()
            .map(|_| self as &dyn EditionVariantsProvider)
    }

    fn as_author_bibliography_provider(&self) -> Option<&dyn AuthorBibliographyProvider> {
        self.inner
            .as_author_bibliography_provider()
            .map(|_| self as &dyn AuthorBibliographyProvider)
    }

    fn as_book_generation_provider(&self) -> Option<&dyn BookGenerationProvider> {
        self.inner
            .as_book_generation_provider()
            .map(|_| self as &dyn BookGenerationProvider)
    }

    fn as_identity_crosswalk_provider(&self) -> Option<&dyn IdentityCrosswalkProvider> {
        self.inner
            .as_identity_crosswalk_provider()
            .map(|_| self as &dyn IdentityCrosswalkProvider)
    }
}

#[async_trait]
impl BookMetadataProvider for CachedProvider {
    async fn edition_by_isbn(
        &self,
        isbn: &Isbn,
        opts: &FetchOptions,
    ) -> Result<EditionRecord, AlexandriaError> {
        let inner = self
            .inner
            .as_book_metadata_provider()
            .ok_or_else(|| AlexandriaError::unsupported("book-metadata"))?;

        if opts.cache == CacheMode::Disabled {
            return inner.edition_by_isbn(isbn, opts).await;
        }

        let key = isbn.to_isbn13().as_str().to_string();
        if let Some(cached) = self.editions.get(&key).await {
            return cached
                .ok_or_else(|| AlexandriaError::not_found(format!("edition {isbn}")));
        }

        match inner.edition_by_isbn(isbn, opts).await {
            Ok(record) => {
                self.editions.insert(key, Some(record.clone())).await;
                Ok(record)
            }
            Err(AlexandriaError::NotFound { what }) => {
                self.editions.insert(key, None).await;
                Err(AlexandriaError::NotFound { what })
            }
            Err(e) => Err(e),
        }
    }

    async fn editions_by_isbns(
        &self,
        isbns: &[Isbn],
        opts: &FetchOptions,
    ) -> Result<HashMap<Isbn, EditionRecord>, AlexandriaError> {
        let inner = self
            .inner
            .as_book_metadata_provider()
            .ok_or_else(|| AlexandriaError::unsupported("book-metadata"))?;

        if opts.cache == CacheMode::Disabled {
            return inner.editions_by_isbns(isbns, opts).await;
        }

        let mut out = HashMap::with_capacity(isbns.len());
        let mut missing: Vec<Isbn> = Vec::new();
        for isbn in isbns {
            let key = isbn.to_isbn13().as_str().to_string();
            match self.editions.get(&key).await {
                Some(Some(record)) => {
                    out.insert(isbn.clone(), record);
                }
                Some(None) => {}
                None => missing.push(isbn.clone()),
            }
        }

        if !missing.is_empty() {
            let fetched = inner.editions_by_isbns(&missing, opts).await?;
            for isbn in &missing {
                let key = isbn.to_isbn13().as_str().to_string();
                self.editions.insert(key, fetched.get(isbn).cloned()).await;
            }
            out.extend(fetched);
        }
        Ok(out)
    }

    fn batch_limit(&self) -> usize {
        self.inner
            .as_book_metadata_provider()
            .map_or(1, BookMetadataProvider::batch_limit)
    }
}

#[async_trait]
impl CoverUrlProvider for CachedProvider {
    async fn cover_url(
        &self,
        isbn: &Isbn,
        opts: &FetchOptions,
    ) -> Result<Option<String>, AlexandriaError> {
        let inner = self
            .inner
            .as_cover_url_provider()
            .ok_or_else(|| AlexandriaError::unsupported("cover-url"))?;

        if opts.cache == CacheMode::Disabled {
            return inner.cover_url(isbn, opts).await;
        }

        let key = isbn.to_isbn13().as_str().to_string();
        if let Some(cached) = self.covers.get(&key).await {
            return Ok(cached);
        }
        let url = inner.cover_url(isbn, opts).await?;
        self.covers.insert(key, url.clone()).await;
        Ok(url)
    }
}

#[async_trait]
impl EditionVariantsProvider for CachedProvider {
    async fn variants(
        &self,
        query: &VariantQuery,
        opts: &FetchOptions,
    ) -> Result<Vec<EditionRecord>, AlexandriaError> {
        let inner = self
            .inner
            .as_edition_variants_provider()
            .ok_or_else(|| AlexandriaError::unsupported("edition-variants"))?;
        inner.variants(query, opts).await
    }
}

#[async_trait]
impl AuthorBibliographyProvider for CachedProvider {
    async fn bibliography_page(
        &self,
        author: &str,
        page: u32,
        opts: &FetchOptions,
    ) -> Result<BibliographyPage, AlexandriaError> {
        let inner = self
            .inner
            .as_author_bibliography_provider()
            .ok_or_else(|| AlexandriaError::unsupported("author-bibliography"))?;
        inner.bibliography_page(author, page, opts).await
    }
}

#[async_trait]
impl BookGenerationProvider for CachedProvider {
    async fn generate_books(
        &self,
        prompt: &str,
        count: usize,
        opts: &FetchOptions,
    ) -> Result<Vec<GeneratedBook>, AlexandriaError> {
        let inner = self
            .inner
            .as_book_generation_provider()
            .ok_or_else(|| AlexandriaError::unsupported("book-generation"))?;
        inner.generate_books(prompt, count, opts).await
    }
}

#[async_trait]
impl IdentityCrosswalkProvider for CachedProvider {
    async fn resolve_author(
        &self,
        external: &ExternalRef,
        opts: &FetchOptions,
    ) -> Result<Option<CrosswalkMatch>, AlexandriaError> {
        let inner = self
            .inner
            .as_identity_crosswalk_provider()
            .ok_or_else(|| AlexandriaError::unsupported("identity-crosswalk"))?;
        inner.resolve_author(external, opts).await
    }
}
