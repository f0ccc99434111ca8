use std::sync::Arc;

use alexandria_core::provider::{BookMetadataProvider, FetchOptions, MetadataProvider};
use alexandria_core::{KvStore, MemoryKv};
use alexandria_middleware::QuotaAwareProvider;
use alexandria_mock::MockProvider;
use alexandria_mock::fixtures;
use alexandria_types::{AlexandriaError, Isbn, QuotaConfig};

fn quota_wrapped(limit: u64, kv: Arc<MemoryKv>) -> QuotaAwareProvider {
    let inner = MockProvider::builder()
        .name("paid-mock")
        .returns_edition_ok(fixtures::chamber_of_secrets("paid-mock"))
        .build();
    QuotaAwareProvider::new(inner, kv, QuotaConfig { daily_limit: limit })
}

#[tokio::test]
async fn calls_within_budget_pass_through() {
    let provider = quota_wrapped(3, Arc::new(MemoryKv::new()));
    let isbn = Isbn::parse("9780439064873").unwrap();
    let opts = FetchOptions::default();

    for _ in 0..3 {
        let meta = provider.as_book_metadata_provider().unwrap();
        meta.edition_by_isbn(&isbn, &opts).await.unwrap();
    }
    assert_eq!(provider.used_today().await.unwrap(), 3);
}

#[tokio::test]
async fn exhausted_budget_refuses_and_marks_unavailable() {
    let provider = quota_wrapped(2, Arc::new(MemoryKv::new()));
    let isbn = Isbn::parse("9780439064873").unwrap();
    let opts = FetchOptions::default();

    let meta = provider.as_book_metadata_provider().unwrap();
    meta.edition_by_isbn(&isbn, &opts).await.unwrap();
    meta.edition_by_isbn(&isbn, &opts).await.unwrap();
    assert!(provider.is_available());

    let err = meta.edition_by_isbn(&isbn, &opts).await.unwrap_err();
    assert!(matches!(err, AlexandriaError::QuotaExhausted { .. }));
    assert!(!provider.is_available());
}

#[tokio::test]
async fn budget_is_shared_through_the_kv_store() {
    let kv = Arc::new(MemoryKv::new());
    let a = quota_wrapped(2, kv.clone());
    let b = quota_wrapped(2, kv.clone());
    let isbn = Isbn::parse("9780439064873").unwrap();
    let opts = FetchOptions::default();

    a.as_book_metadata_provider()
        .unwrap()
        .edition_by_isbn(&isbn, &opts)
        .await
        .unwrap();
    b.as_book_metadata_provider()
        .unwrap()
        .edition_by_isbn(&isbn, &opts)
        .await
        .unwrap();

    let err = a
        .as_book_metadata_provider()
        .unwrap()
        .edition_by_isbn(&isbn, &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, AlexandriaError::QuotaExhausted { .. }));
}

#[tokio::test]
async fn unsupported_capabilities_stay_hidden() {
    let provider = quota_wrapped(5, Arc::new(MemoryKv::new()));
    assert!(provider.as_book_generation_provider().is_none());
    assert!(provider.as_cover_url_provider().is_none());
}

#[tokio::test]
async fn refused_calls_still_count_in_the_ledger() {
    // Increment-before-call means the refusal itself is recorded; drift is
    // bounded and acceptable for an advisory ledger.
    let kv = Arc::new(MemoryKv::new());
    let provider = quota_wrapped(1, kv.clone());
    let isbn = Isbn::parse("9780439064873").unwrap();
    let opts = FetchOptions::default();

    let meta = provider.as_book_metadata_provider().unwrap();
    meta.edition_by_isbn(&isbn, &opts).await.unwrap();
    let _ = meta.edition_by_isbn(&isbn, &opts).await;

    let raw = kv
        .get(&format!(
            "quota:paid-mock:{}",
            chrono::Utc::now().format("%Y-%m-%d")
        ))
        .await
        .unwrap();
    assert_eq!(raw.as_deref(), Some("2"));
}
