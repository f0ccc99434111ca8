mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use alexandria::{Alexandria, AlexandriaError, VariantQuery};
use alexandria_mock::MockProvider;
use helpers::{edition, isbn};

fn query() -> VariantQuery {
    VariantQuery::Isbn(isbn("9780439064873"))
}

#[tokio::test]
async fn union_of_successes_survives_partial_failure() {
    let a = MockProvider::builder()
        .name("a")
        .returns_variants_ok(vec![
            edition("9780439064873", "Chamber of Secrets", "a"),
            edition("9783551551689", "Kammer des Schreckens", "a"),
        ])
        .build();
    let b = MockProvider::builder()
        .name("b")
        .returns_variants_ok(vec![edition("9780547773742", "A Wizard of Earthsea", "b")])
        .build();
    let broken = MockProvider::builder()
        .name("broken")
        .with_variants_fn(|_| Err(AlexandriaError::provider("broken", "boom")))
        .build();

    let alexandria = Alexandria::builder()
        .with_provider(a)
        .with_provider(broken)
        .with_provider(b)
        .build()
        .unwrap();

    let variants = alexandria.edition_variants(&query()).await.unwrap();
    assert_eq!(variants.len(), 3);
}

#[tokio::test]
async fn duplicate_isbns_keep_the_priority_winner() {
    let low = MockProvider::builder()
        .name("low")
        .returns_variants_ok(vec![edition("9780439064873", "Chamber of Secrets", "low")])
        .build();
    let high = MockProvider::builder()
        .name("high")
        .returns_variants_ok(vec![edition("9780439064873", "Chamber of Secrets", "high")])
        .build();

    // Registration order says low first, the explicit priority list says
    // high first; the explicit list wins.
    let alexandria = Alexandria::builder()
        .with_provider(low)
        .with_provider(high)
        .provider_priority(["high", "low"])
        .build()
        .unwrap();

    let variants = alexandria.edition_variants(&query()).await.unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].source, "high");
}

#[tokio::test]
async fn fuzzy_pass_drops_near_identical_titles_from_lower_priority() {
    let mut first = edition("9780439064873", "Harry Potter and the Chamber of Secrets", "a");
    first.authors = vec!["J.K. Rowling".into()];
    let mut near = edition("9780439554930", "Harry Potter & the Chamber of Secrets", "b");
    near.authors = vec!["J.K. Rowling".into()];

    let a = MockProvider::builder().name("a").returns_variants_ok(vec![first]).build();
    let b = MockProvider::builder().name("b").returns_variants_ok(vec![near]).build();

    let alexandria = Alexandria::builder()
        .with_provider(a)
        .with_provider(b)
        .build()
        .unwrap();

    let variants = alexandria.edition_variants(&query()).await.unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].source, "a");
}

#[tokio::test]
async fn all_providers_failing_yields_an_empty_list() {
    let a = MockProvider::builder()
        .name("a")
        .with_variants_fn(|_| Err(AlexandriaError::provider("a", "boom")))
        .build();
    let alexandria = Alexandria::builder().with_provider(a).build().unwrap();

    let variants = alexandria.edition_variants(&query()).await.unwrap();
    assert!(variants.is_empty());
}

#[tokio::test]
async fn stop_on_first_success_cancels_the_stragglers() {
    let fast = MockProvider::builder()
        .name("fast")
        .returns_variants_ok(vec![edition("9780439064873", "Chamber of Secrets", "fast")])
        .build();

    let slow_finished = Arc::new(AtomicBool::new(false));
    let flag = slow_finished.clone();
    let slow = MockProvider::builder()
        .name("slow")
        .delay(Duration::from_millis(250))
        .with_variants_fn(move |_| {
            flag.store(true, Ordering::SeqCst);
            Ok(vec![edition("9780547773742", "A Wizard of Earthsea", "slow")])
        })
        .build();

    let alexandria = Alexandria::builder()
        .with_provider(fast)
        .with_provider(slow)
        .stop_on_first_variants(true)
        .build()
        .unwrap();

    let variants = alexandria.edition_variants(&query()).await.unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].source, "fast");
    // The slow provider's future was dropped mid-delay; its body never ran.
    assert!(!slow_finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn stop_on_first_success_skips_empty_answers() {
    let empty = MockProvider::builder()
        .name("empty")
        .returns_variants_ok(vec![])
        .build();
    let full = MockProvider::builder()
        .name("full")
        .delay(Duration::from_millis(20))
        .returns_variants_ok(vec![edition("9780439064873", "Chamber of Secrets", "full")])
        .build();

    let alexandria = Alexandria::builder()
        .with_provider(empty)
        .with_provider(full)
        .stop_on_first_variants(true)
        .build()
        .unwrap();

    let variants = alexandria.edition_variants(&query()).await.unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].source, "full");
}
