use std::collections::HashSet;

use alexandria_core::normalize::{normalize_author_name, title_similarity};
use alexandria_core::provider::FetchOptions;
use alexandria_core::{AlexandriaError, Capability, GeneratedBook};

use crate::Alexandria;

impl Alexandria {
    /// Generate candidate books from a curated prompt, fanning out to every
    /// available AI provider concurrently.
    ///
    /// Candidates are deduplicated by validated ISBN first and by fuzzy
    /// title-plus-author second; provider failures are dropped.
    ///
    /// # Errors
    /// Returns `Unsupported` when no registered provider advertises book
    /// generation. Provider failures never surface here; the merged list is
    /// simply smaller (possibly empty).
    pub async fn generate_books(
        &self,
        prompt: &str,
        count: usize,
    ) -> Result<Vec<GeneratedBook>, AlexandriaError> {
        let ordered = self.ordered_for(Capability::BookGeneration);
        if ordered.is_empty() {
            return Err(AlexandriaError::unsupported(
                Capability::BookGeneration.as_str(),
            ));
        }

        let opts = FetchOptions::default();
        let timeout = self.cfg.generation_timeout;
        let tasks = ordered.iter().map(|p| {
            let p = p.clone();
            let opts = opts.clone();
            async move {
                let name = p.name();
                let Some(generator) = p.as_book_generation_provider() else {
                    return (name, Ok(Vec::new()));
                };
                let res = Self::call_with_timeout(
                    name,
                    Capability::BookGeneration,
                    timeout,
                    generator.generate_books(prompt, count, &opts),
                )
                .await;
                (name, res)
            }
        });

        let joined = self
            .with_request_deadline(Capability::BookGeneration, futures::future::join_all(tasks))
            .await?;

        let mut merged: Vec<GeneratedBook> = Vec::new();
        let mut seen_isbns: HashSet<String> = HashSet::new();
        for (name, result) in joined {
            match result {
                Ok(books) => {
                    for book in books {
                        if let Some(isbn) = &book.isbn {
                            if !seen_isbns.insert(isbn.to_isbn13().as_str().to_string()) {
                                continue;
                            }
                        }
                        let duplicate = merged.iter().any(|existing| {
                            normalize_author_name(&existing.author)
                                == normalize_author_name(&book.author)
                                && title_similarity(&existing.title, &book.title)
                                    >= self.cfg.title_similarity_threshold
                        });
                        if !duplicate {
                            merged.push(book);
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(provider = name, error = %e, "generation provider dropped");
                }
            }
        }
        Ok(merged)
    }

    /// Generate through one named provider, for callers that pick models by
    /// heuristic (the backfill scheduler). Falls back to the full fan-out
    /// when the name is not registered or not available.
    ///
    /// # Errors
    /// As for [`generate_books`](Self::generate_books).
    pub async fn generate_books_with(
        &self,
        provider_name: &str,
        prompt: &str,
        count: usize,
    ) -> Result<Vec<GeneratedBook>, AlexandriaError> {
        let Some(provider) = self
            .provider_named(provider_name)
            .filter(|p| p.is_available())
        else {
            tracing::debug!(provider = provider_name, "named generator unavailable, fanning out");
            return self.generate_books(prompt, count).await;
        };
        let Some(generator) = provider.as_book_generation_provider() else {
            return self.generate_books(prompt, count).await;
        };

        let result = Self::call_with_timeout(
            provider.name(),
            Capability::BookGeneration,
            self.cfg.generation_timeout,
            generator.generate_books(prompt, count, &FetchOptions::default()),
        )
        .await;
        match result {
            Ok(books) => Ok(books),
            Err(e) => {
                tracing::debug!(provider = provider_name, error = %e, "named generator failed, fanning out");
                self.generate_books(prompt, count).await
            }
        }
    }
}
