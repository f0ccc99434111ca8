use alexandria::webhook::SIGNATURE_HEADER;
use alexandria::{EntityKind, WebhookConfig, WebhookEvent, WebhookNotifier};
use httpmock::prelude::*;

fn event() -> WebhookEvent {
    WebhookEvent {
        entity_type: EntityKind::Edition,
        key: "9780439064873".into(),
        source_providers: vec!["isbndb".into()],
        fields_added: vec!["title".into(), "cover_url".into()],
    }
}

#[tokio::test]
async fn delivers_a_signed_json_body() {
    let server = MockServer::start_async().await;
    let secret = "webhook-secret";
    let body = serde_json::to_vec(&event()).unwrap();
    let expected_signature = WebhookNotifier::sign(secret, &body);

    let mock = server
        .mock_async(move |when, then| {
            when.method(POST)
                .path("/hooks/enrichment")
                .header("content-type", "application/json")
                .header(SIGNATURE_HEADER, &expected_signature);
            then.status(204);
        })
        .await;

    let notifier = WebhookNotifier::new(WebhookConfig {
        url: format!("{}/hooks/enrichment", server.base_url()),
        secret: secret.into(),
    });
    notifier.notify(&event()).await;

    mock.assert_async().await;
}

#[tokio::test]
async fn failures_never_propagate() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/hooks/enrichment");
            then.status(500);
        })
        .await;

    let notifier = WebhookNotifier::new(WebhookConfig {
        url: format!("{}/hooks/enrichment", server.base_url()),
        secret: "s".into(),
    });
    // A rejecting endpoint and a missing endpoint both just log.
    notifier.notify(&event()).await;

    let dead = WebhookNotifier::new(WebhookConfig {
        url: "http://127.0.0.1:1/hooks/enrichment".into(),
        secret: "s".into(),
    });
    dead.notify(&event()).await;
}
