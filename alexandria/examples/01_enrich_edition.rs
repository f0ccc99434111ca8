//! Minimal end-to-end enrichment against the in-memory collaborators,
//! using the deterministic mock provider so the example runs offline.
//!
//! Run with: `cargo run -p alexandria --example 01_enrich_edition`

use std::sync::Arc;

use alexandria::{
    Alexandria, EngineConfig, EnrichmentEngine, Isbn, JobQueue, MemoryCatalog, MemoryQueue,
    QueueName,
};
use alexandria_mock::{MockProvider, fixtures};
use alexandria_types::ProviderTier;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let paid = MockProvider::builder()
        .name("isbndb")
        .tier(ProviderTier::Paid)
        .returns_edition_ok(fixtures::chamber_of_secrets("isbndb"))
        .build();
    let free = MockProvider::builder()
        .name("openlibrary")
        .returns_edition_ok(fixtures::chamber_of_secrets("openlibrary"))
        .build();

    let alexandria = Arc::new(
        Alexandria::builder()
            .with_provider(paid)
            .with_provider(free)
            .provider_priority(["isbndb", "openlibrary"])
            .build()?,
    );

    let store = Arc::new(MemoryCatalog::new());
    let enrichment = Arc::new(MemoryQueue::new(QueueName::Enrichment, 3));
    let covers = Arc::new(MemoryQueue::new(QueueName::Covers, 3));
    let engine = EnrichmentEngine::new(
        alexandria,
        store,
        enrichment.clone(),
        covers.clone(),
        EngineConfig::default(),
    );

    let isbn = Isbn::parse("9780439064873")?;
    let outcome = engine.enrich_edition(&isbn, None).await?;
    let record = outcome.record.expect("mock provider always answers");

    println!("{}: {} by {:?}", record.isbn, record.title, record.authors);
    println!(
        "status={} covers_queued={} bibliography_jobs={}",
        outcome.status.as_str(),
        outcome.covers_queued,
        outcome.bibliographies_queued
    );
    println!(
        "queues: covers={} enrichment={}",
        covers.pending().await,
        enrichment.pending().await
    );
    Ok(())
}
