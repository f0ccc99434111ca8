//! ISBNdb adapter: the metered commercial source.
//!
//! Rate contract: roughly 3 requests/second and a daily call budget with no
//! rollover, so this adapter is normally stacked behind the quota wrapper.
//! The batch endpoint accepts up to 1000 ISBNs per call.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use alexandria_core::provider::{
    AuthorBibliographyProvider, BookMetadataProvider, FetchOptions, MetadataProvider,
};
use alexandria_types::{
    AlexandriaError, BibliographyPage, EditionRecord, Isbn, ProviderTier, PublicationDate,
};

use crate::http;

const PROVIDER: &str = "isbndb";
const BATCH_LIMIT: usize = 1000;
const BIBLIOGRAPHY_PAGE_SIZE: u32 = 100;

/// ISBNdb REST adapter.
pub struct IsbndbProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl IsbndbProvider {
    /// Create an adapter against the production endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: http::default_client(),
            base_url: Url::parse("https://api2.isbndb.com/").expect("static url"),
            api_key: api_key.into(),
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
}

#[derive(Debug, Deserialize)]
struct BookEnvelope {
    book: BookPayload,
}

#[derive(Debug, Deserialize)]
struct BooksEnvelope {
    #[serde(default)]
    data: Vec<BookPayload>,
}

#[derive(Debug, Deserialize)]
struct AuthorEnvelope {
    #[serde(default)]
    books: Vec<BookPayload>,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct BookPayload {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    publisher: Option<String>,
    date_published: Option<String>,
    pages: Option<u32>,
    language: Option<String>,
    image: Option<String>,
    isbn13: Option<String>,
    isbn: Option<String>,
    #[serde(default)]
    subjects: Vec<String>,
}

impl BookPayload {
    // ISBNdb dates arrive as "1999", "1999-06", or "1999-06-02".
    fn parse_date(raw: &str) -> Option<PublicationDate> {
        let mut parts = raw.split('-');
        let year = parts.next()?.parse::<i32>().ok()?;
        Some(PublicationDate {
            year,
            month: parts.next().and_then(|m| m.parse().ok()),
            day: parts.next().and_then(|d| d.parse().ok()),
        })
    }

    fn into_record(self) -> Option<EditionRecord> {
        let isbn = [self.isbn13.as_deref(), self.isbn.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|raw| Isbn::parse(raw).ok())?;
        let mut record = EditionRecord::new(isbn.clone(), self.title?, PROVIDER);
        record.authors = self.authors;
        record.publisher = self.publisher;
        record.published = self.date_published.as_deref().and_then(Self::parse_date);
        record.page_count = self.pages;
        record.language = self.language;
        record.cover_url = self.image;
        record.subjects = self.subjects;
        record.confidence = 90;
        for raw in [self.isbn13.as_deref(), self.isbn.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Ok(related) = Isbn::parse(raw) {
                if !record.related_isbns.contains(&related) {
                    record.related_isbns.push(related);
                }
            }
        }
        Some(record)
    }
}

impl MetadataProvider for IsbndbProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn vendor(&self) -> &'static str {
        "ISBNdb"
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Paid
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn as_book_metadata_provider(&self) -> Option<&dyn BookMetadataProvider> {
        Some(self)
    }

    fn as_author_bibliography_provider(&self) -> Option<&dyn AuthorBibliographyProvider> {
        Some(self)
    }
}

#[async_trait]
impl BookMetadataProvider for IsbndbProvider {
    async fn edition_by_isbn(
        &self,
        isbn: &Isbn,
        _opts: &FetchOptions,
    ) -> Result<EditionRecord, AlexandriaError> {
        let url = self.endpoint(&format!("book/{isbn}"))?;
        let response = self
            .client
            .get(url)
            .header("Authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| http::transport_err(PROVIDER, &e))?;
        http::check_status(PROVIDER, &response, &format!("edition {isbn}"))?;

        let envelope: BookEnvelope = response
            .json()
            .await
            .map_err(|e| AlexandriaError::Data(format!("{PROVIDER} payload: {e}")))?;
        envelope
            .book
            .into_record()
            .ok_or_else(|| AlexandriaError::Data(format!("{PROVIDER} record missing title/isbn")))
    }

    async fn editions_by_isbns(
        &self,
        isbns: &[Isbn],
        _opts: &FetchOptions,
    ) -> Result<HashMap<Isbn, EditionRecord>, AlexandriaError> {
        if isbns.len() > BATCH_LIMIT {
            return Err(AlexandriaError::InvalidArg(format!(
                "batch accepts at most {BATCH_LIMIT} isbns, got {}",
                isbns.len()
            )));
        }
        let url = self.endpoint("books")?;
        let body = isbns
            .iter()
            .map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let response = self
            .client
            .post(url)
            .header("Authorization", &self.api_key)
            .form(&[("isbns", body)])
            .send()
            .await
            .map_err(|e| http::transport_err(PROVIDER, &e))?;
        http::check_status(PROVIDER, &response, "batch editions")?;

        let envelope: BooksEnvelope = response
            .json()
            .await
            .map_err(|e| AlexandriaError::Data(format!("{PROVIDER} payload: {e}")))?;

        let mut out = HashMap::new();
        for payload in envelope.data {
            if let Some(record) = payload.into_record() {
                // Answer under whichever requested form matches the record.
                let requested = isbns.iter().find(|i| {
                    record.related_isbns.contains(*i)
                        || record.isbn.to_isbn13() == i.to_isbn13()
                });
                if let Some(key) = requested {
                    out.insert(key.clone(), record);
                }
            }
        }
        Ok(out)
    }

    fn batch_limit(&self) -> usize {
        BATCH_LIMIT
    }
}

#[async_trait]
impl AuthorBibliographyProvider for IsbndbProvider {
    async fn bibliography_page(
        &self,
        author: &str,
        page: u32,
        _opts: &FetchOptions,
    ) -> Result<BibliographyPage, AlexandriaError> {
        let mut url = self.endpoint(&format!("author/{author}"))?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("pageSize", &BIBLIOGRAPHY_PAGE_SIZE.to_string());
        let response = self
            .client
            .get(url)
            .header("Authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| http::transport_err(PROVIDER, &e))?;
        http::check_status(PROVIDER, &response, &format!("author {author}"))?;

        let envelope: AuthorEnvelope = response
            .json()
            .await
            .map_err(|e| AlexandriaError::Data(format!("{PROVIDER} payload: {e}")))?;

        let editions: Vec<EditionRecord> = envelope
            .books
            .into_iter()
            .filter_map(BookPayload::into_record)
            .collect();
        let has_more = u64::from(page) * u64::from(BIBLIOGRAPHY_PAGE_SIZE) < envelope.total;
        Ok(BibliographyPage { editions, has_more })
    }
}
