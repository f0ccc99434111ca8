mod helpers;

use alexandria::{
    AlexandriaError, CatalogStore, Disposition, EnrichmentStatus, JobHandler, JobPayload, JobQueue,
    QueueMessage,
};
use alexandria_types::{EnrichmentJob, JobPriority, ProviderTier};
use helpers::{chamber_of_secrets, harness_with, isbn};

fn enrich_message(isbn_str: &str) -> QueueMessage {
    QueueMessage::new(
        isbn_str.to_string(),
        JobPayload::EnrichEdition(EnrichmentJob {
            isbn: isbn(isbn_str),
            title: None,
            author: None,
            priority: JobPriority::Normal,
            source: "test".into(),
        }),
    )
}

#[tokio::test]
async fn paid_success_inserts_links_and_queues_a_cover() {
    let harness = harness_with(vec![helpers::metadata_provider(
        "isbndb",
        ProviderTier::Paid,
        chamber_of_secrets("isbndb"),
    )]);
    let target = isbn("9780439064873");

    let outcome = harness.engine.enrich_edition(&target, None).await.unwrap();
    assert_eq!(outcome.status, EnrichmentStatus::Inserted);
    assert_eq!(outcome.covers_queued, 1);

    let record = outcome.record.unwrap();
    assert!(record.related_isbns.contains(&target));

    // The cover job carries the provider URL for this ISBN.
    let leased = harness
        .covers
        .lease(10, std::time::Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(leased.len(), 1);
    match &leased[0].message.payload {
        JobPayload::ProcessCover(job) => {
            assert_eq!(job.isbn, target);
            assert_eq!(job.provider_url, "https://covers.example/9780439064873-L.jpg");
        }
        other => panic!("expected a cover job, got {other:?}"),
    }

    // One new author, one bibliography follow-up.
    assert_eq!(outcome.bibliographies_queued, 1);
    assert_eq!(harness.enrichment.pending().await, 1);
    let authors = harness.store.canonical_authors().await.unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].normalized_name, "j.k. rowling");
}

#[tokio::test]
async fn re_enriching_unchanged_data_is_a_no_op() {
    let harness = harness_with(vec![helpers::metadata_provider(
        "isbndb",
        ProviderTier::Paid,
        chamber_of_secrets("isbndb"),
    )]);
    let target = isbn("9780439064873");

    let first = harness.engine.enrich_edition(&target, None).await.unwrap();
    assert_eq!(first.status, EnrichmentStatus::Inserted);
    let covers_after_first = harness.covers.pending().await;
    let enrichment_after_first = harness.enrichment.pending().await;

    let second = harness.engine.enrich_edition(&target, None).await.unwrap();
    assert_eq!(second.status, EnrichmentStatus::Unchanged);
    assert_eq!(second.covers_queued, 0);
    assert_eq!(second.bibliographies_queued, 0);

    // No new messages on either queue, identical persisted record.
    assert_eq!(harness.covers.pending().await, covers_after_first);
    assert_eq!(harness.enrichment.pending().await, enrichment_after_first);
    assert_eq!(first.record, second.record);
}

#[tokio::test]
async fn all_provider_failures_are_an_empty_success_that_retries_on_the_queue() {
    let harness = harness_with(vec![
        helpers::failing_metadata_provider("a"),
        helpers::failing_metadata_provider("b"),
    ]);
    let target = isbn("9780439064873");

    let outcome = harness.engine.enrich_edition(&target, None).await.unwrap();
    assert_eq!(outcome.status, EnrichmentStatus::Empty);
    assert!(outcome.record.is_none());
    assert!(harness.store.edition_by_isbn(&target).await.unwrap().is_none());

    // The queue path converts the dropped failures into a retryable error.
    let err = harness
        .engine
        .handle(&enrich_message("9780439064873"))
        .await
        .unwrap_err();
    assert_eq!(err.disposition(), Disposition::Retry);
}

#[tokio::test]
async fn not_found_everywhere_is_acked_not_retried() {
    let harness = harness_with(vec![helpers::empty_metadata_provider("openlibrary")]);

    let result = harness.engine.handle(&enrich_message("9780439064873")).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn seed_author_fills_a_gap_in_provider_data() {
    let mut bare = chamber_of_secrets("openlibrary");
    bare.authors.clear();
    let harness = harness_with(vec![helpers::metadata_provider(
        "openlibrary",
        ProviderTier::Free,
        bare,
    )]);

    let job = EnrichmentJob {
        isbn: isbn("9780439064873"),
        title: None,
        author: Some("J.K. Rowling".into()),
        priority: JobPriority::Normal,
        source: "api".into(),
    };
    let outcome = harness
        .engine
        .enrich_edition(&isbn("9780439064873"), Some(&job))
        .await
        .unwrap();
    assert_eq!(
        outcome.record.unwrap().authors,
        vec!["J.K. Rowling".to_string()]
    );
}

#[tokio::test]
async fn blocklisted_authors_are_not_created() {
    let mut record = chamber_of_secrets("openlibrary");
    record.authors = vec!["Anonymous".into(), "J.K. Rowling".into()];
    let harness = harness_with(vec![helpers::metadata_provider(
        "openlibrary",
        ProviderTier::Free,
        record,
    )]);

    harness
        .engine
        .enrich_edition(&isbn("9780439064873"), None)
        .await
        .unwrap();

    let authors = harness.store.canonical_authors().await.unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].normalized_name, "j.k. rowling");
}

#[tokio::test]
async fn crosswalk_rows_are_written_for_external_ids() {
    let harness = harness_with(vec![helpers::metadata_provider(
        "googlebooks",
        ProviderTier::Free,
        {
            let mut record = chamber_of_secrets("googlebooks");
            record.external_ids = vec![alexandria::ExternalRef {
                provider: "google".into(),
                id: "5iTebBW-w7QC".into(),
            }];
            record
        },
    )]);

    harness
        .engine
        .enrich_edition(&isbn("9780439064873"), None)
        .await
        .unwrap();

    let entry = harness
        .store
        .crosswalk_lookup("google", "5iTebBW-w7QC")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.key, "9780439064873");
}

#[tokio::test]
async fn check_isbns_returns_the_existing_subset_stably() {
    let harness = harness_with(vec![helpers::metadata_provider(
        "isbndb",
        ProviderTier::Paid,
        chamber_of_secrets("isbndb"),
    )]);
    harness
        .engine
        .enrich_edition(&isbn("9780439064873"), None)
        .await
        .unwrap();

    let probe = vec![
        isbn("9780439064873"),
        isbn("9780547773742"),
        isbn("0439064872"),
    ];
    let first = harness.engine.check_isbns(&probe).await.unwrap();
    let second = harness.engine.check_isbns(&probe).await.unwrap();
    // Both the 13 and the 10 form of the stored edition match.
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);

    let oversized: Vec<_> = (0..1001).map(|_| isbn("9780439064873")).collect();
    assert!(matches!(
        harness.engine.check_isbns(&oversized).await.unwrap_err(),
        AlexandriaError::InvalidArg(_)
    ));
}

#[tokio::test]
async fn resolving_an_external_author_records_the_mapping() {
    let resolver = alexandria_mock::MockProvider::builder()
        .name("wikidata")
        .with_resolve_fn(|external| {
            Ok((external.id == "Q34660").then_some(alexandria::CrosswalkMatch {
                key: 7,
                confidence: 80,
            }))
        })
        .build();
    let harness = harness_with(vec![resolver]);

    let external = alexandria::ExternalRef {
        provider: "wikidata".into(),
        id: "Q34660".into(),
    };
    let found = harness
        .engine
        .resolve_external_author(&external)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.key, 7);

    let entry = harness
        .store
        .crosswalk_lookup("wikidata", "Q34660")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.key, "7");

    let unknown = alexandria::ExternalRef {
        provider: "wikidata".into(),
        id: "Q0".into(),
    };
    assert!(harness
        .engine
        .resolve_external_author(&unknown)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn queue_batch_validates_and_counts() {
    let harness = harness_with(vec![helpers::metadata_provider(
        "isbndb",
        ProviderTier::Paid,
        chamber_of_secrets("isbndb"),
    )]);

    let outcome = harness
        .engine
        .queue_batch(vec![
            alexandria::BatchBook {
                isbn: "978-0-439-06487-3".into(),
                title: Some("Chamber of Secrets".into()),
                author: None,
                priority: None,
                source: None,
            },
            alexandria::BatchBook {
                isbn: "not-an-isbn".into(),
                title: None,
                author: None,
                priority: None,
                source: None,
            },
        ])
        .await
        .unwrap();

    assert_eq!(outcome.queued, 1);
    assert_eq!(outcome.failed, 1);
    assert_eq!(harness.enrichment.pending().await, 1);
}
