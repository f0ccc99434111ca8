//! Outbound webhook announcing new or updated entities.
//!
//! Delivery is best-effort by contract: a webhook failure is logged and
//! never fails the enrichment that triggered it. The JSON body is signed
//! with HMAC-SHA256 over the shared secret.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use alexandria_types::{EntityKind, WebhookConfig};

/// Signature header carrying the hex HMAC of the body.
pub const SIGNATURE_HEADER: &str = "x-alexandria-signature";

/// Payload announcing an enrichment result.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    /// Kind of the entity that changed.
    pub entity_type: EntityKind,
    /// Canonical key of the entity (ISBN for editions).
    pub key: String,
    /// Providers that contributed fields.
    pub source_providers: Vec<String>,
    /// Names of the fields added or changed.
    pub fields_added: Vec<String>,
}

/// Fire-and-forget webhook client.
pub struct WebhookNotifier {
    client: reqwest::Client,
    cfg: WebhookConfig,
}

impl WebhookNotifier {
    /// Create a notifier for the configured endpoint.
    #[must_use]
    pub fn new(cfg: WebhookConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cfg,
        }
    }

    /// Hex HMAC-SHA256 of `body` under `secret`.
    #[must_use]
    pub fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// POST the event. Failures are logged at warn and swallowed.
    pub async fn notify(&self, event: &WebhookEvent) {
        let body = match serde_json::to_vec(event) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "webhook payload serialization failed");
                return;
            }
        };
        let signature = Self::sign(&self.cfg.secret, &body);

        let result = self
            .client
            .post(&self.cfg.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(key = %event.key, "webhook delivered");
            }
            Ok(response) => {
                tracing::warn!(key = %event.key, status = %response.status(), "webhook rejected");
            }
            Err(e) => {
                tracing::warn!(key = %event.key, error = %e, "webhook delivery failed");
            }
        }
    }
}
