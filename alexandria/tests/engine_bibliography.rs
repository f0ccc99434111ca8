mod helpers;

use alexandria::{AlexandriaError, CatalogStore, JobQueue};
use alexandria_mock::MockProvider;
use alexandria_types::{BibliographyPage, ProviderTier};
use helpers::{edition, harness_with, isbn};

fn rowling_provider() -> std::sync::Arc<MockProvider> {
    MockProvider::builder()
        .name("isbndb")
        .tier(ProviderTier::Paid)
        .with_bibliography_fn(|_, _| {
            let mut chamber = edition(
                "9780439064873",
                "Harry Potter and the Chamber of Secrets",
                "isbndb",
            );
            chamber.authors = vec!["J.K. Rowling".into()];
            chamber.cover_url = Some("https://covers.example/chamber.jpg".into());

            let mut casual = edition("9780316769488", "The Casual Vacancy", "isbndb");
            casual.authors = vec!["J.K. Rowling".into()];

            Ok(BibliographyPage {
                editions: vec![chamber, casual],
                has_more: false,
            })
        })
        .build()
}

#[tokio::test]
async fn new_editions_are_persisted_and_known_ones_counted_as_cached() {
    let harness = harness_with(vec![rowling_provider()]);

    // One of the two editions is already in the catalog.
    harness
        .store
        .put_edition(edition(
            "9780316769488",
            "The Casual Vacancy",
            "earlier-run",
        ))
        .await
        .unwrap();

    let outcome = harness
        .engine
        .enrich_author_bibliography("J.K. Rowling", 1)
        .await
        .unwrap();

    assert_eq!(outcome.books_found, 2);
    assert_eq!(outcome.cached, 1);
    assert_eq!(outcome.newly_enriched, 1);
    assert_eq!(outcome.covers_queued, 1);

    // The new edition is persisted with its author linked.
    let stored = harness
        .store
        .edition_by_isbn(&isbn("9780439064873"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Harry Potter and the Chamber of Secrets");
    let linked = harness
        .store
        .edition_authors(&isbn("9780439064873"))
        .await
        .unwrap();
    assert_eq!(linked.len(), 1);
}

#[tokio::test]
async fn rerunning_a_bibliography_is_idempotent() {
    let harness = harness_with(vec![rowling_provider()]);

    let first = harness
        .engine
        .enrich_author_bibliography("J.K. Rowling", 1)
        .await
        .unwrap();
    assert_eq!(first.newly_enriched, 2);

    let covers_after_first = harness.covers.pending().await;
    let second = harness
        .engine
        .enrich_author_bibliography("J.K. Rowling", 1)
        .await
        .unwrap();

    assert_eq!(second.books_found, 2);
    assert_eq!(second.cached, 2);
    assert_eq!(second.newly_enriched, 0);
    assert_eq!(second.covers_queued, 0);
    assert_eq!(harness.covers.pending().await, covers_after_first);
}

#[tokio::test]
async fn bibliography_persistence_emits_no_recursive_author_jobs() {
    let harness = harness_with(vec![rowling_provider()]);

    harness
        .engine
        .enrich_author_bibliography("J.K. Rowling", 1)
        .await
        .unwrap();

    // The author rows exist, but no follow-up bibliography messages were
    // queued from inside the bibliography run.
    assert_eq!(harness.enrichment.pending().await, 0);
}

#[tokio::test]
async fn blocklisted_authors_are_rejected_up_front() {
    let harness = harness_with(vec![rowling_provider()]);

    let err = harness
        .engine
        .enrich_author_bibliography("Various Authors", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, AlexandriaError::InvalidArg(_)));
}
