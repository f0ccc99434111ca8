use alexandria_core::provider::{BookGenerationProvider, FetchOptions, MetadataProvider};
use alexandria_providers::ListGenProvider;
use alexandria_types::AlexandriaError;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;

fn provider_for(server: &MockServer) -> ListGenProvider {
    ListGenProvider::new("listgen-current", "gpt-4o-mini", "test-key")
        .with_base_url(Url::parse(&server.base_url()).unwrap())
}

fn completion_with(content: serde_json::Value) -> serde_json::Value {
    json!({
        "choices": [
            { "message": { "role": "assistant", "content": content.to_string() } }
        ]
    })
}

#[tokio::test]
async fn parses_schema_constrained_output_and_validates_isbns() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(completion_with(json!({
                "books": [
                    {
                        "title": "Harry Potter and the Chamber of Secrets",
                        "author": "J.K. Rowling",
                        "isbn": "9780439064873",
                        "confidence": 90
                    },
                    {
                        "title": "A Book With A Bad Checksum",
                        "author": "Somebody",
                        "isbn": "9780439064874",
                        "confidence": 80
                    },
                    {
                        "title": "A Book Without An Isbn",
                        "author": "Somebody Else",
                        "isbn": null,
                        "confidence": 40
                    }
                ]
            })));
        })
        .await;

    let provider = provider_for(&server);
    let books = provider
        .as_book_generation_provider()
        .unwrap()
        .generate_books("notable fantasy novels of 1999", 10, &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(books.len(), 3);
    assert!(books[0].isbn.is_some());
    // Checksum-invalid ISBN is dropped, the candidate survives.
    assert!(books[1].isbn.is_none());
    assert!(books[2].isbn.is_none());
}

#[tokio::test]
async fn truncates_to_the_requested_count() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(completion_with(json!({
                "books": [
                    { "title": "One", "author": "A", "confidence": 50 },
                    { "title": "Two", "author": "B", "confidence": 50 },
                    { "title": "Three", "author": "C", "confidence": 50 }
                ]
            })));
        })
        .await;

    let provider = provider_for(&server);
    let books = provider
        .as_book_generation_provider()
        .unwrap()
        .generate_books("p", 2, &FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(books.len(), 2);
}

#[tokio::test]
async fn malformed_content_is_a_data_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "not json at all" } }
                ]
            }));
        })
        .await;

    let provider = provider_for(&server);
    let err = provider
        .as_book_generation_provider()
        .unwrap()
        .generate_books("p", 5, &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AlexandriaError::Data(_)));
}

#[tokio::test]
async fn zero_and_oversized_counts_are_rejected_locally() {
    let server = MockServer::start_async().await;
    let provider = provider_for(&server);
    let generation = provider.as_book_generation_provider().unwrap();

    let err = generation
        .generate_books("p", 0, &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AlexandriaError::InvalidArg(_)));

    let err = generation
        .generate_books("p", 101, &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AlexandriaError::InvalidArg(_)));
}

#[tokio::test]
async fn missing_key_reports_unavailable() {
    let provider = ListGenProvider::new("listgen-current", "gpt-4o-mini", "");
    assert!(!provider.is_available());
}
