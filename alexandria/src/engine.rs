//! The enrichment engine: orchestrate, merge, persist, and dispatch
//! follow-up work for a single identifier.
//!
//! Every write path is idempotent. Re-enriching an ISBN whose upstream data
//! has not changed refreshes `updated_at` and enqueues nothing, so a second
//! delivery of the same queue message converges on the same persisted
//! state.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use alexandria_core::normalize::{normalize_author_name, normalize_title};
use alexandria_core::store::{CatalogStore, UpsertOutcome};
use alexandria_core::{
    AlexandriaError, CrosswalkMatch, Disposition, EditionRecord, EnrichmentLogRow, EntityKind,
    ExternalRef, Isbn, PendingCreations, ProviderAttempt, ProviderTier,
};
use alexandria_types::{
    CoverJob, CrosswalkEntry, EngineConfig, EnrichmentJob, JobPayload, JobPriority, QueueMessage,
};

use crate::dedup::DedupService;
use crate::queue::{JobHandler, JobQueue};
use crate::webhook::{WebhookEvent, WebhookNotifier};
use crate::{Alexandria, EntityKey};

/// What an enrichment did to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStatus {
    /// A new edition row was created.
    Inserted,
    /// An existing row gained or changed fields.
    Updated,
    /// The row was already identical; only `updated_at` moved.
    Unchanged,
    /// No provider had anything; nothing was written.
    Empty,
}

impl EnrichmentStatus {
    /// Stable label for the enrichment log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Empty => "empty",
        }
    }
}

/// Result of one enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    /// What happened to the catalog.
    pub status: EnrichmentStatus,
    /// The persisted record, absent for [`EnrichmentStatus::Empty`].
    pub record: Option<EditionRecord>,
    /// Cover-processing jobs emitted.
    pub covers_queued: usize,
    /// Bibliography jobs emitted.
    pub bibliographies_queued: usize,
    /// Provider failures dropped during the fan-out. Empty results with
    /// retryable failures here get NACK'd on the queue path.
    pub provider_errors: Vec<AlexandriaError>,
}

/// Result of a bibliography enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BibliographyOutcome {
    /// Editions the provider reported for the author.
    pub books_found: usize,
    /// Editions that were new and are now persisted.
    pub newly_enriched: usize,
    /// Cover jobs emitted while persisting.
    pub covers_queued: usize,
    /// Editions that were already in the catalog.
    pub cached: usize,
}

/// One raw entry of a `queue_batch` request, validated by the engine.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BatchBook {
    /// Raw ISBN string; checksum-validated before anything is enqueued.
    pub isbn: String,
    /// Optional seed title.
    pub title: Option<String>,
    /// Optional seed author.
    pub author: Option<String>,
    /// Optional priority; defaults to normal.
    pub priority: Option<JobPriority>,
    /// Optional producer tag; defaults to "api".
    pub source: Option<String>,
}

/// Result of a `queue_batch` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BatchOutcome {
    /// Messages accepted onto the enrichment queue.
    pub queued: usize,
    /// Entries rejected by validation.
    pub failed: usize,
}

/// Coordinates orchestrators, deduplication, persistence, and follow-up
/// dispatch.
pub struct EnrichmentEngine {
    alexandria: Arc<Alexandria>,
    store: Arc<dyn CatalogStore>,
    dedup: DedupService,
    enrichment_queue: Arc<dyn JobQueue>,
    covers_queue: Arc<dyn JobQueue>,
    cfg: EngineConfig,
    webhook: Option<WebhookNotifier>,
    blocklist: HashSet<String>,
}

impl EnrichmentEngine {
    /// Wire the engine to its collaborators.
    pub fn new(
        alexandria: Arc<Alexandria>,
        store: Arc<dyn CatalogStore>,
        enrichment_queue: Arc<dyn JobQueue>,
        covers_queue: Arc<dyn JobQueue>,
        cfg: EngineConfig,
    ) -> Self {
        let dedup = DedupService::new(store.clone(), alexandria.title_similarity_threshold());
        let webhook = cfg.webhook.clone().map(WebhookNotifier::new);
        let blocklist = cfg
            .author_blocklist
            .iter()
            .map(|name| normalize_author_name(name))
            .collect();
        Self {
            alexandria,
            store,
            dedup,
            enrichment_queue,
            covers_queue,
            cfg,
            webhook,
            blocklist,
        }
    }

    /// The dedup service, shared with the backfill scheduler.
    #[must_use]
    pub fn dedup(&self) -> &DedupService {
        &self.dedup
    }

    /// Enrich one edition: fan out, merge, persist, dispatch follow-ups.
    ///
    /// # Errors
    /// `Unsupported` when no metadata provider is registered, storage
    /// failures, and queue failures. Provider failures do not error; they
    /// surface through `provider_errors` on the outcome.
    pub async fn enrich_edition(
        &self,
        isbn: &Isbn,
        seed: Option<&EnrichmentJob>,
    ) -> Result<EnrichmentOutcome, AlexandriaError> {
        let report = self.alexandria.merged_metadata(isbn).await?;

        let Some(mut fetched) = report.record else {
            self.log_enrichment(isbn.as_str(), report.attempts, EnrichmentStatus::Empty)
                .await;
            return Ok(EnrichmentOutcome {
                status: EnrichmentStatus::Empty,
                record: None,
                covers_queued: 0,
                bibliographies_queued: 0,
                provider_errors: report.errors,
            });
        };

        if let Some(seed) = seed {
            if fetched.authors.is_empty() {
                if let Some(author) = &seed.author {
                    fetched.authors.push(author.clone());
                }
            }
        }

        // Metadata providers do not always carry artwork; ask the cover
        // sources before settling for none.
        if fetched.cover_url.is_none() {
            if let Ok(found) = self.alexandria.best_cover_url(isbn).await {
                fetched.cover_url = found;
            }
        }

        let pending = PendingCreations::new();
        let mut outcome = self
            .persist_record(fetched, report.attempts, &pending, true)
            .await?;
        outcome.provider_errors = report.errors;
        Ok(outcome)
    }

    /// Fetch an author's bibliography and persist every previously unknown
    /// edition.
    ///
    /// # Errors
    /// `InvalidArg` for blocklisted or empty author names, plus orchestrator
    /// and storage failures.
    pub async fn enrich_author_bibliography(
        &self,
        author: &str,
        max_pages: u32,
    ) -> Result<BibliographyOutcome, AlexandriaError> {
        if self.is_blocklisted(author) {
            return Err(AlexandriaError::InvalidArg(format!(
                "author name is blocklisted: {author}"
            )));
        }

        let editions = self.alexandria.author_bibliography(author, max_pages).await?;
        let books_found = editions.len();

        let isbns: Vec<Isbn> = editions.iter().map(|e| e.isbn.clone()).collect();
        let existing = self.dedup.isbns_existing(&isbns).await?;
        let cached = editions
            .iter()
            .filter(|e| existing.contains(&e.isbn))
            .count();

        // One pending table across the whole batch, so five editions by the
        // same new author create that author exactly once.
        let pending = PendingCreations::new();
        let mut newly_enriched = 0;
        let mut covers_queued = 0;
        for edition in editions {
            if existing.contains(&edition.isbn) {
                continue;
            }
            let attempts = vec![ProviderAttempt {
                provider: edition.source.clone(),
                duration_ms: 0,
                succeeded: true,
            }];
            // Bibliography persistence never emits further bibliography
            // jobs; one hop is the recursion budget.
            let outcome = self.persist_record(edition, attempts, &pending, false).await?;
            if outcome.status != EnrichmentStatus::Unchanged {
                newly_enriched += 1;
            }
            covers_queued += outcome.covers_queued;
        }

        Ok(BibliographyOutcome {
            books_found,
            newly_enriched,
            covers_queued,
            cached,
        })
    }

    /// Resolve an external author identifier to a persisted key, recording
    /// any fresh mapping in the crosswalk so the next lookup answers from
    /// storage.
    ///
    /// # Errors
    /// `Unsupported` when no identity provider is registered; storage
    /// failures.
    pub async fn resolve_external_author(
        &self,
        external: &ExternalRef,
    ) -> Result<Option<CrosswalkMatch>, AlexandriaError> {
        let Some(found) = self.alexandria.resolve_author_identity(external).await? else {
            return Ok(None);
        };
        self.store
            .insert_crosswalk(CrosswalkEntry {
                entity: EntityKind::Author,
                key: found.key.to_string(),
                provider: external.provider.clone(),
                provider_id: external.id.clone(),
                confidence: found.confidence,
            })
            .await?;
        Ok(Some(found))
    }

    /// The subset of `isbns` already persisted. Bounded to 1000 per call.
    ///
    /// # Errors
    /// `InvalidArg` beyond the bound; storage failures.
    pub async fn check_isbns(&self, isbns: &[Isbn]) -> Result<Vec<Isbn>, AlexandriaError> {
        if isbns.len() > 1000 {
            return Err(AlexandriaError::InvalidArg(format!(
                "at most 1000 isbns per call, got {}",
                isbns.len()
            )));
        }
        let existing = self.dedup.isbns_existing(isbns).await?;
        Ok(isbns
            .iter()
            .filter(|isbn| existing.contains(*isbn))
            .cloned()
            .collect())
    }

    /// Validate a batch of raw book entries and enqueue the valid ones.
    ///
    /// # Errors
    /// Queue failures only; validation failures are counted, not raised.
    pub async fn queue_batch(&self, books: Vec<BatchBook>) -> Result<BatchOutcome, AlexandriaError> {
        let mut messages = Vec::with_capacity(books.len());
        let mut failed = 0;
        for book in books {
            match Isbn::parse(&book.isbn) {
                Ok(isbn) => {
                    let job = EnrichmentJob {
                        isbn,
                        title: book.title,
                        author: book.author,
                        priority: book.priority.unwrap_or_default(),
                        source: book.source.unwrap_or_else(|| "api".to_string()),
                    };
                    messages.push(QueueMessage::new(
                        job.isbn.as_str().to_string(),
                        JobPayload::EnrichEdition(job),
                    ));
                }
                Err(e) => {
                    tracing::info!(isbn = %book.isbn, error = %e, "rejecting invalid batch entry");
                    failed += 1;
                }
            }
        }
        let queued = messages.len();
        self.enrichment_queue.send_batch(messages).await?;
        Ok(BatchOutcome { queued, failed })
    }

    fn is_blocklisted(&self, author: &str) -> bool {
        self.blocklist.contains(&normalize_author_name(author))
    }

    // The shared persist pipeline: merge into the stored row, find-or-create
    // authors and the work, backfill the crosswalk, emit follow-ups, log.
    async fn persist_record(
        &self,
        fetched: EditionRecord,
        attempts: Vec<ProviderAttempt>,
        pending: &PendingCreations,
        allow_bibliography_jobs: bool,
    ) -> Result<EnrichmentOutcome, AlexandriaError> {
        let isbn = fetched.isbn.clone();
        let fetched_tier = self
            .alexandria
            .provider_named(&fetched.source)
            .map_or(ProviderTier::Free, |p| p.tier());

        let existing = self.store.edition_by_isbn(&isbn).await?;
        let prev_cover = existing.as_ref().and_then(|e| e.cover_url.clone());
        let merged = match existing.clone() {
            Some(stored) => {
                crate::orchestrator::merge::merge_into_existing(stored, fetched, fetched_tier)
            }
            None => fetched,
        };
        let fields_added = changed_fields(existing.as_ref(), &merged);

        let upsert = self.store.put_edition(merged.clone()).await?;
        let status = match upsert {
            UpsertOutcome::Inserted => EnrichmentStatus::Inserted,
            UpsertOutcome::Updated => EnrichmentStatus::Updated,
            UpsertOutcome::Unchanged => EnrichmentStatus::Unchanged,
        };

        let (author_keys, new_author_names) = self.ensure_authors(&merged, pending).await?;
        if !author_keys.is_empty() {
            self.store
                .link_edition_authors(&merged.isbn, &author_keys)
                .await?;
        }
        self.ensure_work(&merged, &author_keys, pending).await?;

        for external in &merged.external_ids {
            self.store
                .insert_crosswalk(CrosswalkEntry {
                    entity: EntityKind::Edition,
                    key: merged.isbn.to_isbn13().as_str().to_string(),
                    provider: external.provider.clone(),
                    provider_id: external.id.clone(),
                    confidence: merged.confidence,
                })
                .await?;
        }

        let mut covers_queued = 0;
        if let Some(cover) = &merged.cover_url {
            if prev_cover.as_deref() != Some(cover.as_str()) {
                self.covers_queue
                    .send(QueueMessage::new(
                        merged.isbn.as_str().to_string(),
                        JobPayload::ProcessCover(CoverJob {
                            isbn: merged.isbn.clone(),
                            provider_url: cover.clone(),
                            size_hint: None,
                        }),
                    ))
                    .await?;
                covers_queued = 1;
            }
        }

        let mut bibliographies_queued = 0;
        if allow_bibliography_jobs && self.cfg.bibliography_on_new_author {
            for name in &new_author_names {
                self.enrichment_queue
                    .send(QueueMessage::new(
                        format!("author:{}", normalize_author_name(name)),
                        JobPayload::EnrichAuthor {
                            name: name.clone(),
                            max_pages: self.cfg.bibliography_max_pages,
                        },
                    ))
                    .await?;
                bibliographies_queued += 1;
            }
        }

        if status != EnrichmentStatus::Unchanged {
            if let Some(webhook) = &self.webhook {
                webhook
                    .notify(&WebhookEvent {
                        entity_type: EntityKind::Edition,
                        key: merged.isbn.to_isbn13().as_str().to_string(),
                        source_providers: attempts
                            .iter()
                            .filter(|a| a.succeeded)
                            .map(|a| a.provider.clone())
                            .collect(),
                        fields_added,
                    })
                    .await;
            }
        }

        self.log_enrichment(isbn.as_str(), attempts, status).await;

        Ok(EnrichmentOutcome {
            status,
            record: Some(merged),
            covers_queued,
            bibliographies_queued,
            provider_errors: Vec::new(),
        })
    }

    // Resolve every non-blocklisted credited author to a key, creating the
    // missing ones exactly once per batch. Returns the keys plus the names
    // that were newly created.
    async fn ensure_authors(
        &self,
        record: &EditionRecord,
        pending: &PendingCreations,
    ) -> Result<(Vec<EntityKey>, Vec<String>), AlexandriaError> {
        let names: Vec<String> = record
            .authors
            .iter()
            .filter(|name| !self.is_blocklisted(name))
            .cloned()
            .collect();
        if names.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let known = self.dedup.authors_existing(&names).await?;
        let mut keys = Vec::with_capacity(names.len());
        let mut created = Vec::new();
        for name in &names {
            if let Some(key) = known.get(name) {
                keys.push(*key);
                continue;
            }
            let normalized = normalize_author_name(name);
            let store = self.store.clone();
            let name_for_insert = name.clone();
            let normalized_for_insert = normalized.clone();
            let key = pending
                .get_or_create(&format!("author:{normalized}"), || async move {
                    match store.insert_author(&name_for_insert).await {
                        Ok(author) => Ok(author.key),
                        // Lost the cross-process race; the row exists now.
                        Err(AlexandriaError::Conflict { .. }) => {
                            let rows = store
                                .authors_by_normalized(&normalized_for_insert)
                                .await?;
                            rows.into_iter()
                                .map(|a| a.key)
                                .min()
                                .ok_or_else(|| {
                                    AlexandriaError::Storage(
                                        "conflicting author row disappeared".into(),
                                    )
                                })
                        }
                        Err(e) => Err(e),
                    }
                })
                .await?;
            keys.push(key);
            created.push(name.clone());
        }
        Ok((keys, created))
    }

    // Find or create the work this edition manifests and link them.
    async fn ensure_work(
        &self,
        record: &EditionRecord,
        author_keys: &[EntityKey],
        pending: &PendingCreations,
    ) -> Result<(), AlexandriaError> {
        let normalized_title = normalize_title(&record.title);
        if normalized_title.is_empty() {
            return Ok(());
        }
        let store = self.store.clone();
        let title = record.title.clone();
        let keys = author_keys.to_vec();
        let lookup_title = normalized_title.clone();
        let work_key = pending
            .get_or_create(&format!("work:{normalized_title}"), || async move {
                if let Some(work) = store.work_by_normalized_title(&lookup_title).await? {
                    return Ok(work.key);
                }
                let work = store.insert_work(&title, keys.clone()).await?;
                for author_key in keys {
                    store.bump_author_work_count(author_key, 1).await?;
                }
                Ok(work.key)
            })
            .await?;
        self.store.link_edition_work(&record.isbn, work_key).await
    }

    async fn log_enrichment(
        &self,
        target: &str,
        chain: Vec<ProviderAttempt>,
        status: EnrichmentStatus,
    ) {
        let row = EnrichmentLogRow {
            target: target.to_string(),
            chain,
            outcome: status.as_str().to_string(),
            finished_at: Utc::now(),
        };
        if let Err(e) = self.store.record_enrichment(row).await {
            tracing::warn!(target, error = %e, "failed to record enrichment log row");
        }
    }
}

fn changed_fields(existing: Option<&EditionRecord>, merged: &EditionRecord) -> Vec<String> {
    let mut out = Vec::new();
    let mut check = |name: &str, before: bool, after: bool| {
        if after && !before {
            out.push(name.to_string());
        }
    };
    let before = existing;
    check(
        "title",
        before.is_some_and(|e| !e.title.is_empty()),
        !merged.title.is_empty(),
    );
    check(
        "authors",
        before.is_some_and(|e| !e.authors.is_empty()),
        !merged.authors.is_empty(),
    );
    check(
        "publisher",
        before.is_some_and(|e| e.publisher.is_some()),
        merged.publisher.is_some(),
    );
    check(
        "published",
        before.is_some_and(|e| e.published.is_some()),
        merged.published.is_some(),
    );
    check(
        "page_count",
        before.is_some_and(|e| e.page_count.is_some()),
        merged.page_count.is_some(),
    );
    check(
        "language",
        before.is_some_and(|e| e.language.is_some()),
        merged.language.is_some(),
    );
    check(
        "cover_url",
        before.is_some_and(|e| e.cover_url.is_some()),
        merged.cover_url.is_some(),
    );
    out
}

#[async_trait]
impl JobHandler for EnrichmentEngine {
    async fn handle(&self, message: &QueueMessage) -> Result<(), AlexandriaError> {
        match &message.payload {
            JobPayload::EnrichEdition(job) => {
                let outcome = self.enrich_edition(&job.isbn, Some(job)).await?;
                if outcome.status == EnrichmentStatus::Empty {
                    let retryable: Vec<AlexandriaError> = outcome
                        .provider_errors
                        .into_iter()
                        .filter(|e| e.disposition() == Disposition::Retry)
                        .collect();
                    if !retryable.is_empty() {
                        return Err(AlexandriaError::AllProvidersFailed(retryable));
                    }
                }
                Ok(())
            }
            JobPayload::EnrichWork { key } => {
                let isbns = self.store.work_editions(*key).await?;
                for isbn in isbns {
                    self.enrich_edition(&isbn, None).await?;
                }
                Ok(())
            }
            JobPayload::EnrichAuthor { name, max_pages } => {
                self.enrich_author_bibliography(name, *max_pages).await?;
                Ok(())
            }
            JobPayload::ProcessCover(_) => Err(AlexandriaError::InvalidArg(
                "cover messages belong to the covers consumer".into(),
            )),
            JobPayload::BackfillBatch(job) => {
                let isbns: Vec<Isbn> =
                    job.candidates.iter().map(|c| c.isbn.clone()).collect();
                let fresh: HashSet<Isbn> = self
                    .dedup
                    .filter_new_isbns(&isbns)
                    .await?
                    .into_iter()
                    .collect();
                let messages: Vec<QueueMessage> = job
                    .candidates
                    .iter()
                    .filter(|c| fresh.contains(&c.isbn))
                    .map(|c| {
                        QueueMessage::new(
                            c.isbn.as_str().to_string(),
                            JobPayload::EnrichEdition(EnrichmentJob {
                                isbn: c.isbn.clone(),
                                title: Some(c.title.clone()),
                                author: Some(c.author.clone()),
                                priority: JobPriority::Low,
                                source: "backfill".to_string(),
                            }),
                        )
                    })
                    .collect();
                self.enrichment_queue.send_batch(messages).await
            }
        }
    }
}
