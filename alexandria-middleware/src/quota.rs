//! Quota-aware provider wrapper.
//!
//! The ledger lives in the shared KV store so that every worker draws from
//! the same day bucket. Counters are incremented before the outbound call;
//! the small overshoot that concurrent increments can produce is bounded by
//! the concurrency cap and accepted, because the ledger is advisory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use alexandria_core::kv::KvStore;
use alexandria_core::provider::{
    AuthorBibliographyProvider, BookGenerationProvider, BookMetadataProvider, CoverUrlProvider,
    EditionVariantsProvider, FetchOptions, IdentityCrosswalkProvider, MetadataProvider,
};
use alexandria_types::{
    AlexandriaError, BibliographyPage, CrosswalkMatch, EditionRecord, ExternalRef, GeneratedBook,
    Isbn, ProviderTier, QuotaConfig, VariantQuery,
};

/// Wrapper that enforces a provider's non-rolling daily call budget.
pub struct QuotaAwareProvider {
    inner: Arc<dyn MetadataProvider>,
    kv: Arc<dyn KvStore>,
    config: QuotaConfig,
    // Last observed exhaustion, so the sync availability check stays cheap.
    exhausted_on: Mutex<Option<String>>,
}

impl QuotaAwareProvider {
    /// Wrap an existing provider with a daily budget drawn from `kv`.
    pub fn new(
        inner: Arc<dyn MetadataProvider>,
        kv: Arc<dyn KvStore>,
        config: QuotaConfig,
    ) -> Self {
        Self {
            inner,
            kv,
            config,
            exhausted_on: Mutex::new(None),
        }
    }

    /// Access the inner provider.
    pub fn inner(&self) -> &Arc<dyn MetadataProvider> {
        &self.inner
    }

    fn day_bucket() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    fn ms_until_next_day() -> u64 {
        let now = Utc::now();
        let tomorrow = (now + chrono::Duration::days(1))
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map_or(now, |t| t.and_utc());
        (tomorrow - now).num_milliseconds().max(0) as u64
    }

    /// Units consumed from today's bucket.
    pub async fn used_today(&self) -> Result<u64, AlexandriaError> {
        let key = format!("quota:{}:{}", self.inner.name(), Self::day_bucket());
        Ok(self
            .kv
            .get(&key)
            .await?
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0))
    }

    /// Consume one unit from today's bucket, or refuse the call.
    ///
    /// # Errors
    /// Returns `QuotaExhausted` once the bucket is spent; the provider then
    /// reports unavailable until the UTC date changes.
    pub async fn should_allow_call(&self) -> Result<(), AlexandriaError> {
        let day = Self::day_bucket();
        let key = format!("quota:{}:{}", self.inner.name(), day);
        let ttl = Duration::from_millis(Self::ms_until_next_day().max(1));
        let used = self.kv.incr(&key, 1, Some(ttl)).await?;

        if used > self.config.daily_limit {
            if let Ok(mut flag) = self.exhausted_on.lock() {
                *flag = Some(day);
            }
            tracing::warn!(
                provider = self.inner.name(),
                used,
                limit = self.config.daily_limit,
                "daily quota exhausted"
            );
            return Err(AlexandriaError::QuotaExhausted {
                provider: self.inner.name().to_string(),
                reset_in_ms: Self::ms_until_next_day(),
            });
        }
        Ok(())
    }
}

impl MetadataProvider for QuotaAwareProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn vendor(&self) -> &'static str {
        self.inner.vendor()
    }

    fn tier(&self) -> ProviderTier {
        self.inner.tier()
    }

    // Credentials present and today's bucket not yet observed exhausted.
    fn is_available(&self) -> bool {
        let exhausted_today = self
            .exhausted_on
            .lock()
            .map(|flag| flag.as_deref() == Some(Self::day_bucket().as_str()))
            .unwrap_or(false);
        !exhausted_today && self.inner.is_available()
    }

    fn as_book_metadata_provider(&self) -> Option<&dyn BookMetadataProvider> {
        self.inner
            .as_book_metadata_provider()
            .map(|_| self as &dyn BookMetadataProvider)
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

    fn as_cover_url_provider(&self) -> Option<&dyn CoverUrlProvider> {
        self.inner
            .as_cover_url_provider()
            .map(|_| self as &dyn CoverUrlProvider)
    }
}

#[async_trait]
impl BookMetadataProvider for QuotaAwareProvider {
    async fn edition_by_isbn(
        &self,
        isbn: &Isbn,
        opts: &FetchOptions,
    ) -> Result<EditionRecord, AlexandriaError> {
        self.should_allow_call().await?;
        let inner = self
            .inner
            .as_book_metadata_provider()
            .ok_or_else(|| AlexandriaError::unsupported("book-metadata"))?;
        inner.edition_by_isbn(isbn, opts).await
    }

    async fn editions_by_isbns(
        &self,
        isbns: &[Isbn],
        opts: &FetchOptions,
    ) -> Result<HashMap<Isbn, EditionRecord>, AlexandriaError> {
        self.should_allow_call().await?;
        let inner = self
            .inner
            .as_book_metadata_provider()
            .ok_or_else(|| AlexandriaError::unsupported("book-metadata"))?;
        inner.editions_by_isbns(isbns, opts).await
    }

    fn batch_limit(&self) -> usize {
        self.inner
            .as_book_metadata_provider()
            .map_or(1, BookMetadataProvider::batch_limit)
    }
}

#[async_trait]
impl EditionVariantsProvider for QuotaAwareProvider {
    async fn variants(
        &self,
        query: &VariantQuery,
        opts: &FetchOptions,
    ) -> Result<Vec<EditionRecord>, AlexandriaError> {
        self.should_allow_call().await?;
        let inner = self
            .inner
            .as_edition_variants_provider()
            .ok_or_else(|| AlexandriaError::unsupported("edition-variants"))?;
        inner.variants(query, opts).await
    }
}

#[async_trait]
impl AuthorBibliographyProvider for QuotaAwareProvider {
    async fn bibliography_page(
        &self,
        author: &str,
        page: u32,
        opts: &FetchOptions,
    ) -> Result<BibliographyPage, AlexandriaError> {
        self.should_allow_call().await?;
        let inner = self
            .inner
            .as_author_bibliography_provider()
            .ok_or_else(|| AlexandriaError::unsupported("author-bibliography"))?;
        inner.bibliography_page(author, page, opts).await
    }
}

#[async_trait]
impl BookGenerationProvider for QuotaAwareProvider {
    async fn generate_books(
        &self,
        prompt: &str,
        count: usize,
        opts: &FetchOptions,
    ) -> Result<Vec<GeneratedBook>, AlexandriaError> {
        self.should_allow_call().await?;
        let inner = self
            .inner
            .as_book_generation_provider()
            .ok_or_else(|| AlexandriaError::unsupported("book-generation"))?;
        inner.generate_books(prompt, count, opts).await
    }
}

#[async_trait]
impl IdentityCrosswalkProvider for QuotaAwareProvider {
    async fn resolve_author(
        &self,
        external: &ExternalRef,
        opts: &FetchOptions,
    ) -> Result<Option<CrosswalkMatch>, AlexandriaError> {
        self.should_allow_call().await?;
        let inner = self
            .inner
            .as_identity_crosswalk_provider()
            .ok_or_else(|| AlexandriaError::unsupported("identity-crosswalk"))?;
        inner.resolve_author(external, opts).await
    }
}

#[async_trait]
impl CoverUrlProvider for QuotaAwareProvider {
    async fn cover_url(
        &self,
        isbn: &Isbn,
        opts: &FetchOptions,
    ) -> Result<Option<String>, AlexandriaError> {
        self.should_allow_call().await?;
        let inner = self
            .inner
            .as_cover_url_provider()
            .ok_or_else(|| AlexandriaError::unsupported("cover-url"))?;
        inner.cover_url(isbn, opts).await
    }
}
