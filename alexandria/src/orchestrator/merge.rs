use std::time::Instant;

use alexandria_core::provider::FetchOptions;
use alexandria_core::{
    AlexandriaError, Capability, EditionRecord, Isbn, ProviderAttempt, ProviderTier,
};

use crate::Alexandria;

/// Outcome of a metadata-merge fan-out: the merged record (if any provider
/// answered) plus the per-provider attempt log for the enrichment ledger.
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// Merged edition record; `None` when every provider failed or had no
    /// record.
    pub record: Option<EditionRecord>,
    /// Providers consulted, in priority order, with durations and outcomes.
    pub attempts: Vec<ProviderAttempt>,
    /// The individual failures that were dropped from the merge. Callers on
    /// the queue path use these to distinguish "nobody has this book" from
    /// "everybody was down".
    pub errors: Vec<AlexandriaError>,
}

impl Alexandria {
    /// Fetch one ISBN from every capable provider concurrently and merge
    /// the answers: the highest-priority success is the base record, lower
    /// priority answers fill its null fields, and array fields are unioned.
    ///
    /// # Errors
    /// Returns `Unsupported` when no provider advertises book metadata.
    /// Provider failures are recorded in the report, not surfaced.
    pub async fn merged_metadata(&self, isbn: &Isbn) -> Result<MergeReport, AlexandriaError> {
        let ordered = self.ordered_for(Capability::BookMetadata);
        if ordered.is_empty() {
            return Err(AlexandriaError::unsupported(
                Capability::BookMetadata.as_str(),
            ));
        }

        let opts = FetchOptions::default();
        let timeout = self.cfg.provider_timeout;
        let tasks = ordered.iter().map(|p| {
            let p = p.clone();
            let isbn = isbn.clone();
            let opts = opts.clone();
            async move {
                let name = p.name();
                let tier = p.tier();
                let started = Instant::now();
                let result = match p.as_book_metadata_provider() {
                    Some(metadata) => {
                        Self::call_with_timeout(
                            name,
                            Capability::BookMetadata,
                            timeout,
                            metadata.edition_by_isbn(&isbn, &opts),
                        )
                        .await
                    }
                    None => Err(AlexandriaError::unsupported(
                        Capability::BookMetadata.as_str(),
                    )),
                };
                (name, tier, started.elapsed(), result)
            }
        });

        let joined = self
            .with_request_deadline(Capability::BookMetadata, futures::future::join_all(tasks))
            .await?;

        let mut attempts = Vec::with_capacity(joined.len());
        let mut errors: Vec<AlexandriaError> = Vec::new();
        let mut merged: Option<EditionRecord> = None;
        for (name, tier, elapsed, result) in joined {
            let succeeded = result.is_ok();
            attempts.push(ProviderAttempt {
                provider: name.to_string(),
                duration_ms: elapsed.as_millis() as u64,
                succeeded,
            });
            match result {
                Ok(record) => {
                    merged = Some(match merged.take() {
                        None => record,
                        Some(base) => fill_gaps(base, record, tier),
                    });
                }
                Err(e) => {
                    tracing::debug!(provider = name, error = %e, "metadata provider dropped");
                    errors.push(crate::core::tag_err(name, e));
                }
            }
        }

        Ok(MergeReport {
            record: merged,
            attempts,
            errors,
        })
    }

    /// Fetch many ISBNs through the highest-priority batch-capable
    /// provider, chunked to its declared cap, with per-ISBN fallback to
    /// the remaining providers for anything the batch missed.
    ///
    /// # Errors
    /// Returns `Unsupported` when no provider advertises book metadata.
    pub async fn batch_metadata(
        &self,
        isbns: &[Isbn],
    ) -> Result<std::collections::HashMap<Isbn, EditionRecord>, AlexandriaError> {
        let ordered = self.ordered_for(Capability::BookMetadata);
        if ordered.is_empty() {
            return Err(AlexandriaError::unsupported(
                Capability::BookMetadata.as_str(),
            ));
        }

        let opts = FetchOptions::default();
        let mut out = std::collections::HashMap::with_capacity(isbns.len());

        if let Some(bulk) = ordered
            .iter()
            .find(|p| {
                p.as_book_metadata_provider()
                    .is_some_and(|m| m.batch_limit() > 1)
            })
            .and_then(|p| p.as_book_metadata_provider().map(|m| (p.name(), m)))
        {
            let (name, metadata) = bulk;
            for chunk in isbns.chunks(metadata.batch_limit()) {
                let result = Self::call_with_timeout(
                    name,
                    Capability::BookMetadata,
                    self.cfg.batch_timeout,
                    metadata.editions_by_isbns(chunk, &opts),
                )
                .await;
                match result {
                    Ok(found) => out.extend(found),
                    Err(e) => {
                        tracing::debug!(provider = name, error = %e, "batch chunk dropped");
                    }
                }
            }
        }

        // Anything the batch provider missed falls back to the normal
        // single-ISBN merge path.
        for isbn in isbns {
            if out.contains_key(isbn) {
                continue;
            }
            if let Some(record) = self.merged_metadata(isbn).await?.record {
                out.insert(isbn.clone(), record);
            }
        }
        Ok(out)
    }
}

/// Fill the base record's gaps from a lower-priority answer and union the
/// array fields. A paid secondary may also overwrite scalar fields when its
/// reported confidence beats the base record's.
pub(crate) fn fill_gaps(
    mut base: EditionRecord,
    other: EditionRecord,
    other_tier: ProviderTier,
) -> EditionRecord {
    let overwrite = other_tier == ProviderTier::Paid && other.confidence > base.confidence;

    // Titles are never null, so the overwrite gate alone decides; the
    // non-empty guard keeps a degenerate answer from blanking the base.
    if overwrite && !other.title.is_empty() {
        base.title = other.title;
    }
    if base.publisher.is_none() || (overwrite && other.publisher.is_some()) {
        base.publisher = other.publisher.or(base.publisher);
    }
    if base.published.is_none() || (overwrite && other.published.is_some()) {
        base.published = other.published.or(base.published);
    }
    if base.page_count.is_none() || (overwrite && other.page_count.is_some()) {
        base.page_count = other.page_count.or(base.page_count);
    }
    if base.language.is_none() || (overwrite && other.language.is_some()) {
        base.language = other.language.or(base.language);
    }
    if base.cover_url.is_none() || (overwrite && other.cover_url.is_some()) {
        base.cover_url = other.cover_url.or(base.cover_url);
    }
    if base.authors.is_empty() {
        base.authors = other.authors;
    }
    if overwrite {
        base.confidence = other.confidence;
    }

    for subject in other.subjects {
        if !base.subjects.contains(&subject) {
            base.subjects.push(subject);
        }
    }
    for external in other.external_ids {
        if !base.external_ids.contains(&external) {
            base.external_ids.push(external);
        }
    }
    for related in other.related_isbns {
        if !base.related_isbns.contains(&related) {
            base.related_isbns.push(related);
        }
    }
    base
}

/// Merge a freshly fetched record into the persisted one: non-null
/// persisted fields are never overwritten with null, arrays are unioned,
/// and the paid-confidence overwrite rule applies to scalars, the title
/// included.
pub(crate) fn merge_into_existing(
    existing: EditionRecord,
    fetched: EditionRecord,
    fetched_tier: ProviderTier,
) -> EditionRecord {
    fill_gaps(existing, fetched, fetched_tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, confidence: u8) -> EditionRecord {
        let isbn = Isbn::parse("9780439064873").unwrap();
        let mut r = EditionRecord::new(isbn, "Chamber of Secrets", source);
        r.confidence = confidence;
        r
    }

    #[test]
    fn gaps_fill_without_overwriting() {
        let mut base = record("paid", 90);
        base.publisher = Some("Scholastic".into());
        let mut other = record("free", 60);
        other.publisher = Some("Bloomsbury".into());
        other.page_count = Some(341);

        let merged = fill_gaps(base, other, ProviderTier::Free);
        assert_eq!(merged.publisher.as_deref(), Some("Scholastic"));
        assert_eq!(merged.page_count, Some(341));
    }

    #[test]
    fn higher_confidence_paid_answer_overwrites_scalars() {
        let mut base = record("free", 60);
        base.publisher = Some("Unknown Press".into());
        let mut other = record("paid", 90);
        other.publisher = Some("Scholastic".into());

        let merged = fill_gaps(base, other, ProviderTier::Paid);
        assert_eq!(merged.publisher.as_deref(), Some("Scholastic"));
        assert_eq!(merged.confidence, 90);
    }

    #[test]
    fn higher_confidence_paid_answer_corrects_the_title() {
        let mut base = record("free", 60);
        base.title = "Chamber of Secrets (Unabridg".into();
        let mut other = record("paid", 95);
        other.title = "Harry Potter and the Chamber of Secrets".into();

        let merged = fill_gaps(base, other, ProviderTier::Paid);
        assert_eq!(merged.title, "Harry Potter and the Chamber of Secrets");
    }

    #[test]
    fn lower_confidence_answers_never_touch_the_title() {
        let base = record("paid", 90);
        let mut paid_low = record("paid", 50);
        paid_low.title = "A Different Title".into();
        let merged = fill_gaps(base, paid_low, ProviderTier::Paid);
        assert_eq!(merged.title, "Chamber of Secrets");

        let base = record("free", 60);
        let mut free_high = record("free", 95);
        free_high.title = "A Different Title".into();
        let merged = fill_gaps(base, free_high, ProviderTier::Free);
        assert_eq!(merged.title, "Chamber of Secrets");
    }

    #[test]
    fn merge_into_existing_replaces_a_stored_title_on_better_evidence() {
        let mut stored = record("free", 60);
        stored.title = "Chamber of Secrets (Unabridg".into();
        let mut fetched = record("isbndb", 95);
        fetched.title = "Harry Potter and the Chamber of Secrets".into();

        let merged = merge_into_existing(stored, fetched, ProviderTier::Paid);
        assert_eq!(merged.title, "Harry Potter and the Chamber of Secrets");
        assert_eq!(merged.confidence, 95);
    }

    #[test]
    fn arrays_are_unioned() {
        let mut base = record("a", 70);
        base.subjects = vec!["Fantasy".into()];
        let mut other = record("b", 50);
        other.subjects = vec!["Fantasy".into(), "Magic".into()];
        other.related_isbns.push(Isbn::parse("0439064872").unwrap());

        let merged = fill_gaps(base, other, ProviderTier::Free);
        assert_eq!(merged.subjects.len(), 2);
        assert_eq!(merged.related_isbns.len(), 2);
    }

    #[test]
    fn merge_into_existing_never_blanks_fields() {
        let mut existing = record("stored", 90);
        existing.publisher = Some("Scholastic".into());
        existing.cover_url = Some("https://covers.example/a.jpg".into());
        let fetched = record("free", 40);

        let merged = merge_into_existing(existing, fetched, ProviderTier::Free);
        assert_eq!(merged.publisher.as_deref(), Some("Scholastic"));
        assert!(merged.cover_url.is_some());
    }
}
