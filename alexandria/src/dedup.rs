//! Store-backed deduplication: ISBN existence checks, canonical author
//! lookup, and fuzzy title matching.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alexandria_core::normalize::normalize_author_name;
use alexandria_core::store::CatalogStore;
use alexandria_core::{AlexandriaError, EditionRecord, EntityKey, GeneratedBook, Isbn};

/// A fuzzy-title lookup answer.
#[derive(Debug, Clone)]
pub struct FuzzyMatch {
    /// Whether anything cleared the threshold.
    pub exists: bool,
    /// Best similarity score observed (0 when nothing matched).
    pub score: f64,
    /// The best-matching persisted edition, when one exists.
    pub best: Option<EditionRecord>,
}

/// Deduplication service over the catalog store.
///
/// The in-memory Levenshtein pass used by orchestrators is the permissive
/// first filter; the store-side trigram answer given here is final.
pub struct DedupService {
    store: Arc<dyn CatalogStore>,
    threshold: f64,
}

impl DedupService {
    /// Create a service with the shared fuzzy threshold.
    pub fn new(store: Arc<dyn CatalogStore>, threshold: f64) -> Self {
        Self { store, threshold }
    }

    /// The subset of `isbns` already persisted.
    pub async fn isbns_existing(
        &self,
        isbns: &[Isbn],
    ) -> Result<HashSet<Isbn>, AlexandriaError> {
        self.store.isbns_existing(isbns).await
    }

    /// Keep only ISBNs not yet persisted, preserving input order and
    /// dropping in-input duplicates, so feeding the same list twice yields
    /// the same output as feeding it once.
    pub async fn filter_new_isbns(&self, isbns: &[Isbn]) -> Result<Vec<Isbn>, AlexandriaError> {
        let existing = self.store.isbns_existing(isbns).await?;
        let mut seen: HashSet<String> = HashSet::new();
        Ok(isbns
            .iter()
            .filter(|isbn| !existing.contains(*isbn))
            .filter(|isbn| seen.insert(isbn.to_isbn13().as_str().to_string()))
            .cloned()
            .collect())
    }

    /// Keep only generated candidates whose validated ISBN is new.
    /// Candidates without an ISBN are dropped; they cannot enter the
    /// pipeline.
    pub async fn filter_new_books(
        &self,
        books: Vec<GeneratedBook>,
    ) -> Result<Vec<GeneratedBook>, AlexandriaError> {
        let isbns: Vec<Isbn> = books.iter().filter_map(|b| b.isbn.clone()).collect();
        let keep: HashSet<Isbn> = self
            .filter_new_isbns(&isbns)
            .await?
            .into_iter()
            .collect();
        Ok(books
            .into_iter()
            .filter(|b| b.isbn.as_ref().is_some_and(|isbn| keep.contains(isbn)))
            .collect())
    }

    /// Resolve author display names to canonical persisted keys by
    /// normalized name. The canonical choice per name is the row with the
    /// greatest work count, ties broken by the lowest key.
    pub async fn authors_existing(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, EntityKey>, AlexandriaError> {
        let mut out = HashMap::with_capacity(names.len());
        for name in names {
            let normalized = normalize_author_name(name);
            let rows = self.store.authors_by_normalized(&normalized).await?;
            let canonical = rows.into_iter().max_by(|a, b| {
                a.work_count
                    .cmp(&b.work_count)
                    .then_with(|| b.key.cmp(&a.key))
            });
            if let Some(author) = canonical {
                out.insert(name.clone(), author.key);
            }
        }
        Ok(out)
    }

    /// Store-side fuzzy title existence check.
    pub async fn fuzzy_title_exists(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<FuzzyMatch, AlexandriaError> {
        let matches = self
            .store
            .fuzzy_title_matches(title, author, self.threshold)
            .await?;
        Ok(match matches.into_iter().next() {
            Some(best) => FuzzyMatch {
                exists: true,
                score: best.score,
                best: Some(best.edition),
            },
            None => FuzzyMatch {
                exists: false,
                score: 0.0,
                best: None,
            },
        })
    }
}
