//! Open Library adapter: free metadata, work-based edition variants, and
//! cover URLs. Assumes aggressive upstream throttling; 429s surface as
//! `RateLimited` and are retried by the caller's policy.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use alexandria_core::provider::{
    BookMetadataProvider, CoverUrlProvider, EditionVariantsProvider, FetchOptions,
    MetadataProvider,
};
use alexandria_types::{
    AlexandriaError, EditionRecord, Isbn, ProviderTier, PublicationDate, VariantQuery,
};

use crate::http;

const PROVIDER: &str = "openlibrary";
const VARIANTS_LIMIT: u32 = 50;

/// Open Library REST adapter.
pub struct OpenLibraryProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl Default for OpenLibraryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenLibraryProvider {
    /// Create an adapter against the production endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: http::default_client(),
            base_url: Url::parse("https://openlibrary.org/").expect("static url"),
        }
    }

    /// Point the adapter at a different endpoint (test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, AlexandriaError> {
        self.base_url
            .join(path)
            .map_err(|e| AlexandriaError::provider(PROVIDER, e.to_string()))
    }

    async fn fetch_data(&self, isbn: &Isbn) -> Result<DataPayload, AlexandriaError> {
        let mut url = self.endpoint("api/books")?;
        url.query_pairs_mut()
            .append_pair("bibkeys", &format!("ISBN:{isbn}"))
            .append_pair("format", "json")
            .append_pair("jscmd", "data");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http::transport_err(PROVIDER, &e))?;
        http::check_status(PROVIDER, &response, &format!("edition {isbn}"))?;

        let mut envelope: std::collections::HashMap<String, DataPayload> = response
            .json()
            .await
            .map_err(|e| AlexandriaError::Data(format!("{PROVIDER} payload: {e}")))?;
        envelope
            .remove(&format!("ISBN:{isbn}"))
            .ok_or_else(|| AlexandriaError::not_found(format!("edition {isbn}")))
    }
}

#[derive(Debug, Default, Deserialize)]
struct DataPayload {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<Named>,
    #[serde(default)]
    publishers: Vec<Named>,
    publish_date: Option<String>,
    number_of_pages: Option<u32>,
    cover: Option<CoverLinks>,
    #[serde(default)]
    subjects: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CoverLinks {
    large: Option<String>,
    medium: Option<String>,
    small: Option<String>,
}

impl CoverLinks {
    fn best(self) -> Option<String> {
        self.large.or(self.medium).or(self.small)
    }
}

#[derive(Debug, Deserialize)]
struct EditionJson {
    #[serde(default)]
    works: Vec<KeyRef>,
}

#[derive(Debug, Deserialize)]
struct KeyRef {
    key: String,
}

#[derive(Debug, Deserialize)]
struct WorkEditions {
    #[serde(default)]
    entries: Vec<EditionEntry>,
}

#[derive(Debug, Deserialize)]
struct EditionEntry {
    title: Option<String>,
    #[serde(default)]
    isbn_13: Vec<String>,
    #[serde(default)]
    isbn_10: Vec<String>,
    publish_date: Option<String>,
    number_of_pages: Option<u32>,
    #[serde(default)]
    publishers: Vec<String>,
}

// Open Library dates are free text; pull a plausible year out of them.
fn year_from(raw: &str) -> Option<PublicationDate> {
    raw.split(|c: char| !c.is_ascii_digit())
        .filter_map(|chunk| chunk.parse::<i32>().ok())
        .find(|y| (1400..=2100).contains(y))
        .map(PublicationDate::year)
}

impl DataPayload {
    fn into_record(self, isbn: &Isbn) -> Option<EditionRecord> {
        let mut record = EditionRecord::new(isbn.clone(), self.title?, PROVIDER);
        record.authors = self.authors.into_iter().map(|a| a.name).collect();
        record.publisher = self.publishers.into_iter().next().map(|p| p.name);
        record.published = self.publish_date.as_deref().and_then(year_from);
        record.page_count = self.number_of_pages;
        record.cover_url = self.cover.and_then(CoverLinks::best);
        record.subjects = self.subjects.into_iter().map(|s| s.name).collect();
        record.confidence = 70;
        Some(record)
    }
}

impl EditionEntry {
    fn into_record(self) -> Option<EditionRecord> {
        let isbn = self
            .isbn_13
            .iter()
            .chain(self.isbn_10.iter())
            .find_map(|raw| Isbn::parse(raw).ok())?;
        let mut record = EditionRecord::new(isbn, self.title?, PROVIDER);
        record.published = self.publish_date.as_deref().and_then(year_from);
        record.page_count = self.number_of_pages;
        record.publisher = self.publishers.into_iter().next();
        record.confidence = 70;
        for raw in self.isbn_13.iter().chain(self.isbn_10.iter()) {
            if let Ok(related) = Isbn::parse(raw) {
                if !record.related_isbns.contains(&related) {
                    record.related_isbns.push(related);
                }
            }
        }
        Some(record)
    }
}

impl MetadataProvider for OpenLibraryProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn vendor(&self) -> &'static str {
        "Open Library"
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Free
    }

    fn as_book_metadata_provider(&self) -> Option<&dyn BookMetadataProvider> {
        Some(self)
    }

    fn as_edition_variants_provider(&self) -> Option<&dyn EditionVariantsProvider> {
        Some(self)
    }

    fn as_cover_url_provider(&self) -> Option<&dyn CoverUrlProvider> {
        Some(self)
    }
}

#[async_trait]
impl BookMetadataProvider for OpenLibraryProvider {
    async fn edition_by_isbn(
        &self,
        isbn: &Isbn,
        _opts: &FetchOptions,
    ) -> Result<EditionRecord, AlexandriaError> {
        let payload = self.fetch_data(isbn).await?;
        payload
            .into_record(isbn)
            .ok_or_else(|| AlexandriaError::not_found(format!("edition {isbn}")))
    }
}

#[async_trait]
impl EditionVariantsProvider for OpenLibraryProvider {
    async fn variants(
        &self,
        query: &VariantQuery,
        _opts: &FetchOptions,
    ) -> Result<Vec<EditionRecord>, AlexandriaError> {
        let isbn = match query {
            VariantQuery::Isbn(isbn) => isbn,
            VariantQuery::Work(_) => {
                // Internal work keys mean nothing upstream; the orchestrator
                // resolves them to a canonical ISBN first.
                return Err(AlexandriaError::unsupported("edition-variants by work key"));
            }
        };

        let url = self.endpoint(&format!("isbn/{isbn}.json"))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http::transport_err(PROVIDER, &e))?;
        http::check_status(PROVIDER, &response, &format!("edition {isbn}"))?;
        let edition: EditionJson = response
            .json()
            .await
            .map_err(|e| AlexandriaError::Data(format!("{PROVIDER} payload: {e}")))?;

        let Some(work) = edition.works.first() else {
            return Ok(Vec::new());
        };

        let mut url = self.endpoint(&format!("{}/editions.json", work.key.trim_matches('/')))?;
        url.query_pairs_mut()
            .append_pair("limit", &VARIANTS_LIMIT.to_string());
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http::transport_err(PROVIDER, &e))?;
        http::check_status(PROVIDER, &response, &format!("work {}", work.key))?;
        let editions: WorkEditions = response
            .json()
            .await
            .map_err(|e| AlexandriaError::Data(format!("{PROVIDER} payload: {e}")))?;

        Ok(editions
            .entries
            .into_iter()
            .filter_map(EditionEntry::into_record)
            .collect())
    }
}

#[async_trait]
impl CoverUrlProvider for OpenLibraryProvider {
    async fn cover_url(
        &self,
        isbn: &Isbn,
        _opts: &FetchOptions,
    ) -> Result<Option<String>, AlexandriaError> {
        match self.fetch_data(isbn).await {
            Ok(payload) => Ok(payload.cover.and_then(CoverLinks::best)),
            Err(AlexandriaError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
