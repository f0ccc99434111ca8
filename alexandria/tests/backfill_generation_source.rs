mod helpers;

use std::sync::Arc;

use alexandria::{Alexandria, CatalogSource, EditionCursorSource, GenerationSource};
use alexandria_core::CatalogStore;
use alexandria_mock::MockProvider;
use alexandria_types::GeneratedBook;
use helpers::{edition, isbn};

fn generator(name: &'static str, title: &'static str) -> Arc<MockProvider> {
    MockProvider::builder()
        .name(name)
        .with_generate_fn(move |_, _| {
            Ok(vec![
                GeneratedBook {
                    title: title.into(),
                    author: "Somebody".into(),
                    isbn: Some(isbn("9780439064873")),
                    confidence: 80,
                },
                GeneratedBook {
                    title: format!("{title} (no identifier)"),
                    author: "Somebody".into(),
                    isbn: None,
                    confidence: 50,
                },
            ])
        })
        .build()
}

#[tokio::test]
async fn model_selection_follows_the_cutoff_year() {
    let classic = generator("gen-classic", "Classic pick");
    let current = generator("gen-current", "Current pick");
    let alexandria = Arc::new(
        Alexandria::builder()
            .with_provider(classic.clone())
            .with_provider(current.clone())
            .build()
            .unwrap(),
    );
    let source = GenerationSource::new(alexandria, "gen-classic", "gen-current", 2015);

    let old = source.candidates("1987", 10).await.unwrap();
    assert_eq!(old[0].title, "Classic pick");
    assert_eq!(classic.call_count(), 1);
    assert_eq!(current.call_count(), 0);

    let recent = source.candidates("2020", 10).await.unwrap();
    assert_eq!(recent[0].title, "Current pick");
    assert_eq!(current.call_count(), 1);
}

#[tokio::test]
async fn candidates_without_valid_isbns_are_dropped() {
    let classic = generator("gen-classic", "Pick");
    let alexandria = Arc::new(
        Alexandria::builder().with_provider(classic).build().unwrap(),
    );
    let source = GenerationSource::new(alexandria, "gen-classic", "gen-classic", 2015);

    let candidates = source.candidates("1990", 10).await.unwrap();
    // The identifier-less candidate cannot enter the pipeline.
    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn bad_bucket_ids_are_rejected() {
    let classic = generator("gen-classic", "Pick");
    let alexandria = Arc::new(
        Alexandria::builder().with_provider(classic).build().unwrap(),
    );
    let source = GenerationSource::new(alexandria, "gen-classic", "gen-classic", 2015);

    assert!(source.candidates("not-a-year", 10).await.is_err());
}

#[tokio::test]
async fn the_edition_cursor_pages_over_the_catalog() {
    let store = Arc::new(alexandria::MemoryCatalog::new());
    for (i, raw) in ["9780439064873", "9780547773742", "9780316769488"]
        .iter()
        .enumerate()
    {
        let mut record = edition(raw, &format!("Book {i}"), "seed");
        record.authors = vec!["Somebody".into()];
        store.put_edition(record).await.unwrap();
    }

    let source = EditionCursorSource::new(store);
    let page0 = source.candidates("0", 2).await.unwrap();
    let page1 = source.candidates("1", 2).await.unwrap();
    assert_eq!(page0.len(), 2);
    assert_eq!(page1.len(), 1);
    assert_eq!(page0[0].author, "Somebody");
}
