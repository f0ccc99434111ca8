//! Wikidata identity adapter.
//!
//! Resolution is a two-step: the crosswalk table answers identifiers we
//! have already mapped; otherwise, for Wikidata QIDs, the entity label is
//! fetched and matched against persisted authors by normalized name. The
//! engine records any fresh mapping back into the crosswalk.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use alexandria_core::normalize::normalize_author_name;
use alexandria_core::provider::{FetchOptions, IdentityCrosswalkProvider, MetadataProvider};
use alexandria_core::store::CatalogStore;
use alexandria_types::{AlexandriaError, CrosswalkMatch, ExternalRef, ProviderTier};

use crate::http;

const PROVIDER: &str = "wikidata";
const LABEL_MATCH_CONFIDENCE: u8 = 80;

/// Wikidata entity adapter backed by the catalog for key resolution.
pub struct WikidataProvider {
    client: reqwest::Client,
    base_url: Url,
    store: Arc<dyn CatalogStore>,
}

impl WikidataProvider {
    /// Create an adapter against the production endpoint.
    #[must_use]
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            client: http::default_client(),
            base_url: Url::parse("https://www.wikidata.org/").expect("static url"),
            store,
        }
    }

    /// Point the adapter at a different endpoint (test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    async fn entity_label(&self, qid: &str) -> Result<Option<String>, AlexandriaError> {
        let mut url = self
            .base_url
            .join("w/api.php")
            .map_err(|e| AlexandriaError::provider(PROVIDER, e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("action", "wbgetentities")
            .append_pair("ids", qid)
            .append_pair("props", "labels")
            .append_pair("languages", "en")
            .append_pair("format", "json");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http::transport_err(PROVIDER, &e))?;
        http::check_status(PROVIDER, &response, &format!("entity {qid}"))?;

        let envelope: EntitiesEnvelope = response
            .json()
            .await
            .map_err(|e| AlexandriaError::Data(format!("{PROVIDER} payload: {e}")))?;
        Ok(envelope
            .entities
            .into_values()
            .next()
            .and_then(|entity| entity.labels.and_then(|l| l.en))
            .map(|label| label.value))
    }
}

#[derive(Debug, Deserialize)]
struct EntitiesEnvelope {
    #[serde(default)]
    entities: std::collections::HashMap<String, Entity>,
}

#[derive(Debug, Deserialize)]
struct Entity {
    labels: Option<Labels>,
}

#[derive(Debug, Deserialize)]
struct Labels {
    en: Option<Label>,
}

#[derive(Debug, Deserialize)]
struct Label {
    value: String,
}

impl MetadataProvider for WikidataProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn vendor(&self) -> &'static str {
        "Wikidata"
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Free
    }

    fn as_identity_crosswalk_provider(&self) -> Option<&dyn IdentityCrosswalkProvider> {
        Some(self)
    }
}

#[async_trait]
impl IdentityCrosswalkProvider for WikidataProvider {
    async fn resolve_author(
        &self,
        external: &ExternalRef,
        _opts: &FetchOptions,
    ) -> Result<Option<CrosswalkMatch>, AlexandriaError> {
        // Already-mapped identifiers resolve without touching the network.
        if let Some(entry) = self
            .store
            .crosswalk_lookup(&external.provider, &external.id)
            .await?
        {
            // Author crosswalk keys are decimal entity keys; anything else
            // (an edition row) is not an author answer.
            if let Ok(key) = entry.key.parse() {
                return Ok(Some(CrosswalkMatch {
                    key,
                    confidence: entry.confidence,
                }));
            }
        }

        if external.provider != PROVIDER {
            return Ok(None);
        }

        let Some(label) = self.entity_label(&external.id).await? else {
            return Ok(None);
        };
        let normalized = normalize_author_name(&label);
        let candidates = self.store.authors_by_normalized(&normalized).await?;
        let best = candidates
            .into_iter()
            .max_by(|a, b| a.work_count.cmp(&b.work_count).then(b.key.cmp(&a.key)));
        Ok(best.map(|author| CrosswalkMatch {
            key: author.key,
            confidence: LABEL_MATCH_CONFIDENCE,
        }))
    }
}
