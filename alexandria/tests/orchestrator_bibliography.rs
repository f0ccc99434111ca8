mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use alexandria::{Alexandria, AlexandriaError, BibliographyPage};
use alexandria_mock::MockProvider;
use alexandria_types::ProviderTier;
use helpers::edition;

fn paged_provider(name: &'static str, pages: u32) -> Arc<MockProvider> {
    MockProvider::builder()
        .name(name)
        .tier(ProviderTier::Paid)
        .with_bibliography_fn(move |_, page| {
            let isbns = [
                "9780439064873",
                "9780547773742",
                "9783551551689",
                "9780439554930",
            ];
            let idx = (page as usize - 1).min(isbns.len() - 1);
            Ok(BibliographyPage {
                editions: vec![edition(isbns[idx], &format!("Book {page}"), name)],
                has_more: page < pages,
            })
        })
        .build()
}

#[tokio::test]
async fn pages_are_fetched_sequentially_up_to_the_cap() {
    let provider = paged_provider("isbndb", 10);
    let alexandria = Alexandria::builder()
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let editions = alexandria
        .author_bibliography("J.K. Rowling", 3)
        .await
        .unwrap();
    assert_eq!(editions.len(), 3);
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn pagination_stops_when_the_provider_is_done() {
    let provider = paged_provider("isbndb", 2);
    let alexandria = Alexandria::builder()
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let editions = alexandria
        .author_bibliography("J.K. Rowling", 10)
        .await
        .unwrap();
    assert_eq!(editions.len(), 2);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn first_page_failure_falls_through_to_the_next_provider() {
    let broken = MockProvider::builder()
        .name("broken")
        .tier(ProviderTier::Paid)
        .with_bibliography_fn(|_, _| Err(AlexandriaError::provider("broken", "boom")))
        .build();
    let working = paged_provider("backup", 1);

    let alexandria = Alexandria::builder()
        .with_provider(broken)
        .with_provider(working)
        .build()
        .unwrap();

    let editions = alexandria
        .author_bibliography("J.K. Rowling", 2)
        .await
        .unwrap();
    assert_eq!(editions.len(), 1);
    assert_eq!(editions[0].source, "backup");
}

#[tokio::test]
async fn mid_pagination_failure_keeps_what_was_fetched() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let flaky = MockProvider::builder()
        .name("flaky")
        .tier(ProviderTier::Paid)
        .with_bibliography_fn(move |_, page| {
            counter.fetch_add(1, Ordering::SeqCst);
            if page >= 3 {
                return Err(AlexandriaError::provider("flaky", "boom"));
            }
            let isbns = ["9780439064873", "9780547773742"];
            Ok(BibliographyPage {
                editions: vec![edition(isbns[page as usize - 1], "Book", "flaky")],
                has_more: true,
            })
        })
        .build();

    let alexandria = Alexandria::builder().with_provider(flaky).build().unwrap();

    let editions = alexandria
        .author_bibliography("J.K. Rowling", 5)
        .await
        .unwrap();
    assert_eq!(editions.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn paid_tier_is_preferred_over_free() {
    let free = MockProvider::builder()
        .name("free")
        .tier(ProviderTier::Free)
        .with_bibliography_fn(|_, _| {
            Ok(BibliographyPage {
                editions: vec![edition("9780439064873", "Book", "free")],
                has_more: false,
            })
        })
        .build();
    let paid = MockProvider::builder()
        .name("paid")
        .tier(ProviderTier::Paid)
        .with_bibliography_fn(|_, _| {
            Ok(BibliographyPage {
                editions: vec![edition("9780439064873", "Book", "paid")],
                has_more: false,
            })
        })
        .build();

    // Free registered first; paid still wins for bibliographies.
    let alexandria = Alexandria::builder()
        .with_provider(free)
        .with_provider(paid)
        .build()
        .unwrap();

    let editions = alexandria
        .author_bibliography("J.K. Rowling", 1)
        .await
        .unwrap();
    assert_eq!(editions[0].source, "paid");
}

#[tokio::test]
async fn empty_author_and_zero_pages_are_rejected() {
    let provider = paged_provider("isbndb", 1);
    let alexandria = Alexandria::builder().with_provider(provider).build().unwrap();

    assert!(matches!(
        alexandria.author_bibliography("  ", 1).await.unwrap_err(),
        AlexandriaError::InvalidArg(_)
    ));
    assert!(matches!(
        alexandria
            .author_bibliography("J.K. Rowling", 0)
            .await
            .unwrap_err(),
        AlexandriaError::InvalidArg(_)
    ));
}
