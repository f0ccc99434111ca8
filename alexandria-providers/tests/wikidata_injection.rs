use std::sync::Arc;

use alexandria_core::provider::{FetchOptions, MetadataProvider};
use alexandria_core::store::CatalogStore;
use alexandria_core::MemoryCatalog;
use alexandria_providers::WikidataProvider;
use alexandria_types::{CrosswalkEntry, EntityKind, ExternalRef};
use httpmock::prelude::*;
use serde_json::json;
use url::Url;

fn provider_for(server: &MockServer, store: Arc<MemoryCatalog>) -> WikidataProvider {
    WikidataProvider::new(store).with_base_url(Url::parse(&server.base_url()).unwrap())
}

#[tokio::test]
async fn already_mapped_identifiers_resolve_from_the_crosswalk() {
    let server = MockServer::start_async().await;
    let store = Arc::new(MemoryCatalog::new());
    let author = store.insert_author("J.K. Rowling").await.unwrap();
    store
        .insert_crosswalk(CrosswalkEntry {
            entity: EntityKind::Author,
            key: author.key.to_string(),
            provider: "wikidata".into(),
            provider_id: "Q34660".into(),
            confidence: 95,
        })
        .await
        .unwrap();

    let provider = provider_for(&server, store.clone());
    let resolved = provider
        .as_identity_crosswalk_provider()
        .unwrap()
        .resolve_author(
            &ExternalRef {
                provider: "wikidata".into(),
                id: "Q34660".into(),
            },
            &FetchOptions::default(),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(resolved.key, author.key);
    assert_eq!(resolved.confidence, 95);
}

#[tokio::test]
async fn unmapped_qids_resolve_through_the_entity_label() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/w/api.php")
                .query_param("action", "wbgetentities")
                .query_param("ids", "Q34660");
            then.status(200).json_body(json!({
                "entities": {
                    "Q34660": {
                        "labels": { "en": { "language": "en", "value": "J. K. Rowling" } }
                    }
                }
            }));
        })
        .await;

    let store = Arc::new(MemoryCatalog::new());
    let author = store.insert_author("J.K. Rowling").await.unwrap();

    let provider = provider_for(&server, store);
    let resolved = provider
        .as_identity_crosswalk_provider()
        .unwrap()
        .resolve_author(
            &ExternalRef {
                provider: "wikidata".into(),
                id: "Q34660".into(),
            },
            &FetchOptions::default(),
        )
        .await
        .unwrap()
        .unwrap();

    // "J. K. Rowling" and "J.K. Rowling" share a normalized name.
    assert_eq!(resolved.key, author.key);
}

#[tokio::test]
async fn unknown_entities_resolve_to_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php");
            then.status(200).json_body(json!({
                "entities": {
                    "Q999999999": { "labels": { "en": { "language": "en", "value": "Nobody Here" } } }
                }
            }));
        })
        .await;

    let store = Arc::new(MemoryCatalog::new());
    let provider = provider_for(&server, store);
    let resolved = provider
        .as_identity_crosswalk_provider()
        .unwrap()
        .resolve_author(
            &ExternalRef {
                provider: "wikidata".into(),
                id: "Q999999999".into(),
            },
            &FetchOptions::default(),
        )
        .await
        .unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn non_wikidata_namespaces_are_not_guessed_at() {
    let server = MockServer::start_async().await;
    let store = Arc::new(MemoryCatalog::new());
    let provider = provider_for(&server, store);

    let resolved = provider
        .as_identity_crosswalk_provider()
        .unwrap()
        .resolve_author(
            &ExternalRef {
                provider: "amazon".into(),
                id: "B000AP9A6K".into(),
            },
            &FetchOptions::default(),
        )
        .await
        .unwrap();
    assert!(resolved.is_none());
}
