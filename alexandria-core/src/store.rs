use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use alexandria_types::{
    AlexandriaError, AuthorRecord, CanonicalAuthor, CrosswalkEntry, EditionRecord,
    EnrichmentLogRow, EntityKey, Isbn, WorkRecord,
};

use crate::normalize::{normalize_author_name, normalize_title, trigram_similarity};

/// What a [`CatalogStore::put_edition`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was created.
    Inserted,
    /// An existing row changed.
    Updated,
    /// The row was already identical; only `updated_at` moved.
    Unchanged,
}

impl UpsertOutcome {
    /// Stable label for the enrichment log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// A fuzzy title hit with its store-side similarity score.
#[derive(Debug, Clone)]
pub struct TitleMatch {
    /// The matching persisted edition.
    pub edition: EditionRecord,
    /// Trigram similarity in [0, 1].
    pub score: f64,
}

/// Persistence boundary for the enrichment core.
///
/// The production deployment backs this with the relational catalog; the
/// in-memory [`MemoryCatalog`] is the reference implementation used by
/// tests and single-process tooling. Implementations maintain the author
/// invariant `normalized_name == normalize(name)` on every write.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up an edition by any of its related ISBNs.
    async fn edition_by_isbn(&self, isbn: &Isbn)
    -> Result<Option<EditionRecord>, AlexandriaError>;

    /// The subset of `isbns` already persisted, matching against every
    /// ISBN listed on any edition.
    async fn isbns_existing(&self, isbns: &[Isbn]) -> Result<HashSet<Isbn>, AlexandriaError>;

    /// Insert or replace an edition keyed by its primary ISBN.
    async fn put_edition(&self, record: EditionRecord) -> Result<UpsertOutcome, AlexandriaError>;

    /// A stable page of persisted editions, for cursor-based backfill.
    async fn editions_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<EditionRecord>, AlexandriaError>;

    /// Replace the edition→author links for an edition.
    async fn link_edition_authors(
        &self,
        isbn: &Isbn,
        author_keys: &[EntityKey],
    ) -> Result<(), AlexandriaError>;

    /// Author keys linked to an edition.
    async fn edition_authors(&self, isbn: &Isbn) -> Result<Vec<EntityKey>, AlexandriaError>;

    /// Attach an edition to the work it manifests.
    async fn link_edition_work(
        &self,
        isbn: &Isbn,
        work_key: EntityKey,
    ) -> Result<(), AlexandriaError>;

    /// Canonical ISBNs of the editions attached to a work.
    async fn work_editions(&self, work_key: EntityKey) -> Result<Vec<Isbn>, AlexandriaError>;

    /// Persisted editions whose titles are fuzzily similar to `title`,
    /// optionally restricted to a credited author, best first.
    async fn fuzzy_title_matches(
        &self,
        title: &str,
        author: Option<&str>,
        threshold: f64,
    ) -> Result<Vec<TitleMatch>, AlexandriaError>;

    /// Fetch an author row.
    async fn author_by_key(&self, key: EntityKey)
    -> Result<Option<AuthorRecord>, AlexandriaError>;

    /// All author rows sharing a normalized name.
    async fn authors_by_normalized(
        &self,
        normalized: &str,
    ) -> Result<Vec<AuthorRecord>, AlexandriaError>;

    /// Insert a new author row, deriving `normalized_name`.
    ///
    /// # Errors
    /// `Conflict` when a row with the identical raw name exists; callers
    /// inside find-or-create treat that as success and re-read.
    async fn insert_author(&self, name: &str) -> Result<AuthorRecord, AlexandriaError>;

    /// Update an author row; `normalized_name` is recomputed from `name`.
    async fn update_author(&self, record: AuthorRecord) -> Result<(), AlexandriaError>;

    /// Add `delta` to an author's work count.
    async fn bump_author_work_count(
        &self,
        key: EntityKey,
        delta: u32,
    ) -> Result<(), AlexandriaError>;

    /// The derived canonical-authors view: one representative per
    /// normalized name (greatest work count, ties to the lowest key) with
    /// the variant spellings that collapse into it.
    async fn canonical_authors(&self) -> Result<Vec<CanonicalAuthor>, AlexandriaError>;

    /// Recompute missing or stale `normalized_name` values, at most
    /// `batch` rows per call. Returns the number touched; zero means done.
    /// Safe to re-run at any time.
    async fn backfill_normalized_names(&self, batch: usize) -> Result<u64, AlexandriaError>;

    /// Look up a work by its normalized title.
    async fn work_by_normalized_title(
        &self,
        normalized_title: &str,
    ) -> Result<Option<WorkRecord>, AlexandriaError>;

    /// Insert a new work.
    async fn insert_work(
        &self,
        title: &str,
        author_keys: Vec<EntityKey>,
    ) -> Result<WorkRecord, AlexandriaError>;

    /// Insert a crosswalk row; duplicates on
    /// `(entity, provider, provider_id)` are silently ignored.
    async fn insert_crosswalk(&self, entry: CrosswalkEntry) -> Result<(), AlexandriaError>;

    /// Resolve an external identifier to its crosswalk row, if mapped.
    async fn crosswalk_lookup(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<CrosswalkEntry>, AlexandriaError>;

    /// Append a row to the enrichment log.
    async fn record_enrichment(&self, row: EnrichmentLogRow) -> Result<(), AlexandriaError>;
}

struct StoredEdition {
    record: EditionRecord,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct CatalogInner {
    editions: HashMap<String, StoredEdition>,
    // Every related ISBN (raw and ISBN-13 form) → primary edition key.
    isbn_index: HashMap<String, String>,
    edition_authors: HashMap<String, Vec<EntityKey>>,
    work_editions: HashMap<EntityKey, Vec<String>>,
    authors: HashMap<EntityKey, AuthorRecord>,
    author_seq: EntityKey,
    works: HashMap<EntityKey, WorkRecord>,
    work_seq: EntityKey,
    crosswalk: HashMap<(String, String, String), CrosswalkEntry>,
    enrichment_log: Vec<EnrichmentLogRow>,
}

impl CatalogInner {
    fn index_edition(&mut self, record: &EditionRecord) {
        let primary = record.isbn.as_str().to_string();
        for isbn in std::iter::once(&record.isbn).chain(record.related_isbns.iter()) {
            self.isbn_index
                .insert(isbn.as_str().to_string(), primary.clone());
            self.isbn_index
                .insert(isbn.to_isbn13().as_str().to_string(), primary.clone());
        }
    }

    fn primary_for(&self, isbn: &Isbn) -> Option<&String> {
        self.isbn_index
            .get(isbn.as_str())
            .or_else(|| self.isbn_index.get(isbn.to_isbn13().as_str()))
    }
}

/// In-memory [`CatalogStore`] for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryCatalog {
    inner: Mutex<CatalogInner>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in the enrichment log. Test observability only.
    pub fn enrichment_log_len(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.enrichment_log.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CatalogInner>, AlexandriaError> {
        self.inner
            .lock()
            .map_err(|_| AlexandriaError::Storage("catalog mutex poisoned".into()))
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn edition_by_isbn(
        &self,
        isbn: &Isbn,
    ) -> Result<Option<EditionRecord>, AlexandriaError> {
        let inner = self.lock()?;
        Ok(inner
            .primary_for(isbn)
            .and_then(|primary| inner.editions.get(primary))
            .map(|stored| stored.record.clone()))
    }

    async fn isbns_existing(&self, isbns: &[Isbn]) -> Result<HashSet<Isbn>, AlexandriaError> {
        let inner = self.lock()?;
        Ok(isbns
            .iter()
            .filter(|isbn| inner.primary_for(isbn).is_some())
            .cloned()
            .collect())
    }

    async fn put_edition(&self, record: EditionRecord) -> Result<UpsertOutcome, AlexandriaError> {
        let mut inner = self.lock()?;
        let primary = record.isbn.as_str().to_string();
        let now = Utc::now();
        let outcome = match inner.editions.get_mut(&primary) {
            Some(stored) if stored.record == record => {
                stored.updated_at = now;
                UpsertOutcome::Unchanged
            }
            Some(stored) => {
                stored.record = record.clone();
                stored.updated_at = now;
                UpsertOutcome::Updated
            }
            None => {
                inner.editions.insert(
                    primary,
                    StoredEdition {
                        record: record.clone(),
                        updated_at: now,
                    },
                );
                UpsertOutcome::Inserted
            }
        };
        inner.index_edition(&record);
        Ok(outcome)
    }

    async fn editions_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<EditionRecord>, AlexandriaError> {
        let inner = self.lock()?;
        let mut keys: Vec<&String> = inner.editions.keys().collect();
        keys.sort();
        Ok(keys
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|k| inner.editions.get(k).map(|s| s.record.clone()))
            .collect())
    }

    async fn link_edition_authors(
        &self,
        isbn: &Isbn,
        author_keys: &[EntityKey],
    ) -> Result<(), AlexandriaError> {
        let mut inner = self.lock()?;
        let primary = inner
            .primary_for(isbn)
            .cloned()
            .ok_or_else(|| AlexandriaError::not_found(format!("edition {isbn}")))?;
        inner.edition_authors.insert(primary, author_keys.to_vec());
        Ok(())
    }

    async fn edition_authors(&self, isbn: &Isbn) -> Result<Vec<EntityKey>, AlexandriaError> {
        let inner = self.lock()?;
        Ok(inner
            .primary_for(isbn)
            .and_then(|primary| inner.edition_authors.get(primary))
            .cloned()
            .unwrap_or_default())
    }

    async fn link_edition_work(
        &self,
        isbn: &Isbn,
        work_key: EntityKey,
    ) -> Result<(), AlexandriaError> {
        let mut inner = self.lock()?;
        let primary = inner
            .primary_for(isbn)
            .cloned()
            .ok_or_else(|| AlexandriaError::not_found(format!("edition {isbn}")))?;
        let linked = inner.work_editions.entry(work_key).or_default();
        if !linked.contains(&primary) {
            linked.push(primary);
        }
        Ok(())
    }

    async fn work_editions(&self, work_key: EntityKey) -> Result<Vec<Isbn>, AlexandriaError> {
        let inner = self.lock()?;
        Ok(inner
            .work_editions
            .get(&work_key)
            .map(|keys| keys.iter().filter_map(|k| Isbn::parse(k).ok()).collect())
            .unwrap_or_default())
    }

    async fn fuzzy_title_matches(
        &self,
        title: &str,
        author: Option<&str>,
        threshold: f64,
    ) -> Result<Vec<TitleMatch>, AlexandriaError> {
        let inner = self.lock()?;
        let wanted_author = author.map(normalize_author_name);
        let mut matches: Vec<TitleMatch> = inner
            .editions
            .values()
            .filter(|stored| {
                wanted_author.as_ref().is_none_or(|wanted| {
                    stored
                        .record
                        .authors
                        .iter()
                        .any(|a| normalize_author_name(a) == *wanted)
                })
            })
            .filter_map(|stored| {
                let score = trigram_similarity(title, &stored.record.title);
                (score >= threshold).then(|| TitleMatch {
                    edition: stored.record.clone(),
                    score,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(matches)
    }

    async fn author_by_key(
        &self,
        key: EntityKey,
    ) -> Result<Option<AuthorRecord>, AlexandriaError> {
        let inner = self.lock()?;
        Ok(inner.authors.get(&key).cloned())
    }

    async fn authors_by_normalized(
        &self,
        normalized: &str,
    ) -> Result<Vec<AuthorRecord>, AlexandriaError> {
        let inner = self.lock()?;
        let mut rows: Vec<AuthorRecord> = inner
            .authors
            .values()
            .filter(|a| a.normalized_name == normalized)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.key);
        Ok(rows)
    }

    async fn insert_author(&self, name: &str) -> Result<AuthorRecord, AlexandriaError> {
        let mut inner = self.lock()?;
        if inner.authors.values().any(|a| a.name == name) {
            return Err(AlexandriaError::conflict(format!("author {name}")));
        }
        inner.author_seq += 1;
        let record = AuthorRecord {
            key: inner.author_seq,
            name: name.to_string(),
            normalized_name: normalize_author_name(name),
            qid: None,
            work_count: 0,
        };
        inner.authors.insert(record.key, record.clone());
        Ok(record)
    }

    async fn update_author(&self, mut record: AuthorRecord) -> Result<(), AlexandriaError> {
        let mut inner = self.lock()?;
        if !inner.authors.contains_key(&record.key) {
            return Err(AlexandriaError::not_found(format!("author {}", record.key)));
        }
        record.normalized_name = normalize_author_name(&record.name);
        inner.authors.insert(record.key, record);
        Ok(())
    }

    async fn bump_author_work_count(
        &self,
        key: EntityKey,
        delta: u32,
    ) -> Result<(), AlexandriaError> {
        let mut inner = self.lock()?;
        let author = inner
            .authors
            .get_mut(&key)
            .ok_or_else(|| AlexandriaError::not_found(format!("author {key}")))?;
        author.work_count += delta;
        Ok(())
    }

    async fn canonical_authors(&self) -> Result<Vec<CanonicalAuthor>, AlexandriaError> {
        let inner = self.lock()?;
        let mut grouped: HashMap<&str, Vec<&AuthorRecord>> = HashMap::new();
        for author in inner.authors.values() {
            grouped
                .entry(author.normalized_name.as_str())
                .or_default()
                .push(author);
        }
        let mut out: Vec<CanonicalAuthor> = grouped
            .into_values()
            .map(|mut rows| {
                rows.sort_by(|a, b| {
                    b.work_count
                        .cmp(&a.work_count)
                        .then_with(|| a.key.cmp(&b.key))
                });
                let representative = rows[0];
                let mut variants: Vec<String> =
                    rows.iter().map(|r| r.name.clone()).collect();
                variants.sort();
                variants.dedup();
                CanonicalAuthor {
                    key: representative.key,
                    name: representative.name.clone(),
                    normalized_name: representative.normalized_name.clone(),
                    work_count: representative.work_count,
                    variants,
                }
            })
            .collect();
        out.sort_by_key(|c| c.key);
        Ok(out)
    }

    async fn backfill_normalized_names(&self, batch: usize) -> Result<u64, AlexandriaError> {
        let mut inner = self.lock()?;
        let stale: Vec<EntityKey> = inner
            .authors
            .values()
            .filter(|a| a.normalized_name != normalize_author_name(&a.name))
            .map(|a| a.key)
            .take(batch)
            .collect();
        let touched = stale.len() as u64;
        for key in stale {
            if let Some(author) = inner.authors.get_mut(&key) {
                author.normalized_name = normalize_author_name(&author.name);
            }
        }
        Ok(touched)
    }

    async fn work_by_normalized_title(
        &self,
        normalized_title: &str,
    ) -> Result<Option<WorkRecord>, AlexandriaError> {
        let inner = self.lock()?;
        Ok(inner
            .works
            .values()
            .find(|w| normalize_title(&w.title) == normalized_title)
            .cloned())
    }

    async fn insert_work(
        &self,
        title: &str,
        author_keys: Vec<EntityKey>,
    ) -> Result<WorkRecord, AlexandriaError> {
        let mut inner = self.lock()?;
        inner.work_seq += 1;
        let record = WorkRecord {
            key: inner.work_seq,
            title: title.to_string(),
            author_keys,
        };
        inner.works.insert(record.key, record.clone());
        Ok(record)
    }

    async fn insert_crosswalk(&self, entry: CrosswalkEntry) -> Result<(), AlexandriaError> {
        let mut inner = self.lock()?;
        let unique = (
            entry.entity.as_str().to_string(),
            entry.provider.clone(),
            entry.provider_id.clone(),
        );
        inner.crosswalk.entry(unique).or_insert(entry);
        Ok(())
    }

    async fn crosswalk_lookup(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<CrosswalkEntry>, AlexandriaError> {
        let inner = self.lock()?;
        Ok(inner
            .crosswalk
            .iter()
            .find(|((_, p, id), _)| p == provider && id == provider_id)
            .map(|(_, entry)| entry.clone()))
    }

    async fn record_enrichment(&self, row: EnrichmentLogRow) -> Result<(), AlexandriaError> {
        let mut inner = self.lock()?;
        inner.enrichment_log.push(row);
        Ok(())
    }
}
