//! Google Books volume adapter: free metadata with volume-id crosswalk
//! references and thumbnail cover URLs.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use alexandria_core::provider::{
    BookMetadataProvider, CoverUrlProvider, FetchOptions, MetadataProvider,
};
use alexandria_types::{
    AlexandriaError, EditionRecord, ExternalRef, Isbn, ProviderTier, PublicationDate,
};

use crate::http;

const PROVIDER: &str = "googlebooks";

/// Google Books volumes adapter.
pub struct GoogleBooksProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl Default for GoogleBooksProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl GoogleBooksProvider {
    /// Create an adapter; the API key is optional for low-volume use.
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: http::default_client(),
            base_url: Url::parse("https://www.googleapis.com/").expect("static url"),
            api_key,
        }
    }

    /// Point the adapter at a different endpoint (test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    async fn lookup(&self, isbn: &Isbn) -> Result<Volume, AlexandriaError> {
        let mut url = self
            .base_url
            .join("books/v1/volumes")
            .map_err(|e| AlexandriaError::provider(PROVIDER, e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", &format!("isbn:{isbn}"));
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http::transport_err(PROVIDER, &e))?;
        http::check_status(PROVIDER, &response, &format!("edition {isbn}"))?;

        let envelope: VolumesEnvelope = response
            .json()
            .await
            .map_err(|e| AlexandriaError::Data(format!("{PROVIDER} payload: {e}")))?;
        envelope
            .items
            .into_iter()
            .next()
            .ok_or_else(|| AlexandriaError::not_found(format!("edition {isbn}")))
    }
}

#[derive(Debug, Deserialize)]
struct VolumesEnvelope {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    id: String,
    #[serde(rename = "volumeInfo")]
    info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    page_count: Option<u32>,
    language: Option<String>,
    image_links: Option<ImageLinks>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    identifier: String,
}

// Google dates are "2005", "2005-07", or "2005-07-16".
fn parse_date(raw: &str) -> Option<PublicationDate> {
    let mut parts = raw.split('-');
    let year = parts.next()?.parse::<i32>().ok()?;
    Some(PublicationDate {
        year,
        month: parts.next().and_then(|m| m.parse().ok()),
        day: parts.next().and_then(|d| d.parse().ok()),
    })
}

impl Volume {
    fn into_record(self, isbn: &Isbn) -> Option<EditionRecord> {
        let mut record = EditionRecord::new(isbn.clone(), self.info.title?, PROVIDER);
        record.authors = self.info.authors;
        record.publisher = self.info.publisher;
        record.published = self.info.published_date.as_deref().and_then(parse_date);
        record.page_count = self.info.page_count;
        record.language = self.info.language;
        record.cover_url = self
            .info
            .image_links
            .and_then(|links| links.thumbnail.or(links.small_thumbnail));
        record.subjects = self.info.categories;
        record.external_ids = vec![ExternalRef {
            provider: "google".into(),
            id: self.id,
        }];
        record.confidence = 65;
        for identifier in &self.info.industry_identifiers {
            if let Ok(related) = Isbn::parse(&identifier.identifier) {
                if !record.related_isbns.contains(&related) {
                    record.related_isbns.push(related);
                }
            }
        }
        Some(record)
    }
}

impl MetadataProvider for GoogleBooksProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn vendor(&self) -> &'static str {
        "Google Books"
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Free
    }

    fn as_book_metadata_provider(&self) -> Option<&dyn BookMetadataProvider> {
        Some(self)
    }

    fn as_cover_url_provider(&self) -> Option<&dyn CoverUrlProvider> {
        Some(self)
    }
}

#[async_trait]
impl BookMetadataProvider for GoogleBooksProvider {
    async fn edition_by_isbn(
        &self,
        isbn: &Isbn,
        _opts: &FetchOptions,
    ) -> Result<EditionRecord, AlexandriaError> {
        let volume = self.lookup(isbn).await?;
        volume
            .into_record(isbn)
            .ok_or_else(|| AlexandriaError::not_found(format!("edition {isbn}")))
    }
}

#[async_trait]
impl CoverUrlProvider for GoogleBooksProvider {
    async fn cover_url(
        &self,
        isbn: &Isbn,
        _opts: &FetchOptions,
    ) -> Result<Option<String>, AlexandriaError> {
        match self.lookup(isbn).await {
            Ok(volume) => Ok(volume
                .info
                .image_links
                .and_then(|links| links.thumbnail.or(links.small_thumbnail))),
            Err(AlexandriaError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
