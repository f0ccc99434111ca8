#![allow(dead_code)]

use std::sync::Arc;

use alexandria::{
    Alexandria, EditionRecord, EngineConfig, EnrichmentEngine, Isbn, MemoryCatalog, MemoryQueue,
    MetadataProvider, QueueName,
};
use alexandria_mock::MockProvider;
use alexandria_types::ProviderTier;

pub fn isbn(s: &str) -> Isbn {
    Isbn::parse(s).unwrap()
}

pub fn edition(isbn_str: &str, title: &str, source: &str) -> EditionRecord {
    EditionRecord::new(isbn(isbn_str), title, source)
}

pub fn chamber_of_secrets(source: &str) -> EditionRecord {
    let mut record = edition(
        "9780439064873",
        "Harry Potter and the Chamber of Secrets",
        source,
    );
    record.authors = vec!["J.K. Rowling".into()];
    record.cover_url = Some("https://covers.example/9780439064873-L.jpg".into());
    record.confidence = 90;
    record
}

/// Metadata provider that always answers with `record`.
pub fn metadata_provider(
    name: &'static str,
    tier: ProviderTier,
    record: EditionRecord,
) -> Arc<MockProvider> {
    MockProvider::builder()
        .name(name)
        .tier(tier)
        .returns_edition_ok(record)
        .build()
}

/// Metadata provider that always fails with a transient upstream error.
pub fn failing_metadata_provider(name: &'static str) -> Arc<MockProvider> {
    MockProvider::builder()
        .name(name)
        .with_edition_fn(move |_| {
            Err(alexandria::AlexandriaError::provider(name, "upstream 503"))
        })
        .build()
}

/// Metadata provider that always answers not-found.
pub fn empty_metadata_provider(name: &'static str) -> Arc<MockProvider> {
    MockProvider::builder()
        .name(name)
        .returns_edition_not_found()
        .build()
}

pub struct Harness {
    pub alexandria: Arc<Alexandria>,
    pub store: Arc<MemoryCatalog>,
    pub enrichment: Arc<MemoryQueue>,
    pub covers: Arc<MemoryQueue>,
    pub engine: EnrichmentEngine,
}

/// Wire an engine over in-memory collaborators and the given providers.
pub fn harness_with(providers: Vec<Arc<dyn MetadataProvider>>) -> Harness {
    harness_with_config(providers, EngineConfig::default())
}

pub fn harness_with_config(
    providers: Vec<Arc<dyn MetadataProvider>>,
    cfg: EngineConfig,
) -> Harness {
    let mut builder = Alexandria::builder();
    for provider in providers {
        builder = builder.with_provider(provider);
    }
    let alexandria = Arc::new(builder.build().unwrap());
    let store = Arc::new(MemoryCatalog::new());
    let enrichment = Arc::new(MemoryQueue::new(QueueName::Enrichment, 3));
    let covers = Arc::new(MemoryQueue::new(QueueName::Covers, 3));
    let engine = EnrichmentEngine::new(
        alexandria.clone(),
        store.clone(),
        enrichment.clone(),
        covers.clone(),
        cfg,
    );
    Harness {
        alexandria,
        store,
        enrichment,
        covers,
        engine,
    }
}
