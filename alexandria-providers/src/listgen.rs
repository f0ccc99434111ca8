//! Schema-constrained AI book-list generation over an OpenAI-compatible
//! chat completions endpoint.
//!
//! The response format is pinned to a JSON schema so the model cannot
//! free-associate shapes; even so, every returned ISBN is revalidated here
//! and dropped when the checksum fails. The advisory `confidence` field
//! passes through untouched.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use alexandria_core::provider::{BookGenerationProvider, FetchOptions, MetadataProvider};
use alexandria_types::{AlexandriaError, GeneratedBook, Isbn, ProviderTier};

use crate::http;

const MAX_BOOKS_PER_CALL: usize = 100;

/// Chat-completions list generation adapter. Instantiate one per model;
/// the backfill scheduler picks between them by name.
pub struct ListGenProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    model: String,
    name: &'static str,
}

impl ListGenProvider {
    /// Create an adapter for `model`, registered under `name`.
    #[must_use]
    pub fn new(name: &'static str, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: http::default_client(),
            base_url: Url::parse("https://api.openai.com/").expect("static url"),
            api_key: api_key.into(),
            model: model.into(),
            name,
        }
    }

    /// Point the adapter at a different endpoint (test servers, proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// The model this instance generates with.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "name": "book_list",
            "schema": {
                "type": "object",
                "properties": {
                    "books": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "title": { "type": "string" },
                                "author": { "type": "string" },
                                "isbn": { "type": ["string", "null"] },
                                "confidence": { "type": "integer", "minimum": 0, "maximum": 100 }
                            },
                            "required": ["title", "author", "confidence"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["books"],
                "additionalProperties": false
            },
            "strict": true
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

#[derive(Debug, Deserialize)]
struct BookList {
    #[serde(default)]
    books: Vec<RawBook>,
}

#[derive(Debug, Deserialize)]
struct RawBook {
    title: String,
    author: String,
    isbn: Option<String>,
    confidence: u8,
}

impl MetadataProvider for ListGenProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn vendor(&self) -> &'static str {
        "list-generation"
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Paid
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn as_book_generation_provider(&self) -> Option<&dyn BookGenerationProvider> {
        Some(self)
    }
}

#[async_trait]
impl BookGenerationProvider for ListGenProvider {
    async fn generate_books(
        &self,
        prompt: &str,
        count: usize,
        _opts: &FetchOptions,
    ) -> Result<Vec<GeneratedBook>, AlexandriaError> {
        if count == 0 || count > MAX_BOOKS_PER_CALL {
            return Err(AlexandriaError::InvalidArg(format!(
                "count must be in 1..={MAX_BOOKS_PER_CALL}, got {count}"
            )));
        }

        let url = self
            .base_url
            .join("v1/chat/completions")
            .map_err(|e| AlexandriaError::provider(self.name, e.to_string()))?;
        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a bibliographer. List real published books only. \
                                Include an ISBN only when you are certain of it."
                },
                {
                    "role": "user",
                    "content": format!("{prompt}\n\nReturn exactly {count} books.")
                }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": Self::response_schema()
            }
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::transport_err(self.name, &e))?;
        http::check_status(self.name, &response, "generation")?;

        let envelope: CompletionEnvelope = response
            .json()
            .await
            .map_err(|e| AlexandriaError::Data(format!("{} payload: {e}", self.name)))?;
        let content = envelope
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AlexandriaError::Data(format!("{} returned no choices", self.name)))?;
        let list: BookList = serde_json::from_str(&content)
            .map_err(|e| AlexandriaError::Data(format!("{} schema violation: {e}", self.name)))?;

        let mut books: Vec<GeneratedBook> = list
            .books
            .into_iter()
            .map(|raw| {
                let isbn = raw.isbn.as_deref().and_then(|s| match Isbn::parse(s) {
                    Ok(isbn) => Some(isbn),
                    Err(_) => {
                        tracing::debug!(title = %raw.title, "dropping invalid generated isbn");
                        None
                    }
                });
                GeneratedBook {
                    title: raw.title,
                    author: raw.author,
                    isbn,
                    confidence: raw.confidence.min(100),
                }
            })
            .collect();
        books.truncate(count);
        Ok(books)
    }
}
