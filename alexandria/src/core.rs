use std::collections::HashSet;
use std::sync::Arc;

use alexandria_core::normalize::title_similarity;
use alexandria_core::{AlexandriaError, Capability, EditionRecord, MetadataProvider};
use alexandria_types::OrchestratorConfig;

/// Orchestrator that routes requests across registered providers.
pub struct Alexandria {
    pub(crate) providers: Vec<Arc<dyn MetadataProvider>>,
    pub(crate) cfg: OrchestratorConfig,
}

impl std::fmt::Debug for Alexandria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alexandria")
            .field("providers", &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("cfg", &self.cfg)
            .finish()
    }
}

/// Builder for constructing an [`Alexandria`] orchestrator with custom
/// configuration.
pub struct AlexandriaBuilder {
    providers: Vec<Arc<dyn MetadataProvider>>,
    cfg: OrchestratorConfig,
}

impl Default for AlexandriaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AlexandriaBuilder {
    /// Create a new builder with sensible defaults: no providers, 10s HTTP
    /// timeout, 60s generation timeout, fuzzy threshold 0.6, no explicit
    /// priorities.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: vec![],
            cfg: OrchestratorConfig::default(),
        }
    }

    /// Register a provider.
    ///
    /// Registration order is the priority order unless an explicit list is
    /// set via [`provider_priority`](Self::provider_priority).
    #[must_use]
    pub fn with_provider(mut self, p: Arc<dyn MetadataProvider>) -> Self {
        self.providers.push(p);
        self
    }

    /// Set the explicit provider priority. Named providers come first, in
    /// list order; registered providers missing from the list follow in
    /// registration order.
    #[must_use]
    pub fn provider_priority<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.provider_priority = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-provider timeout for HTTP metadata calls.
    #[must_use]
    pub const fn provider_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.cfg.provider_timeout = timeout;
        self
    }

    /// Set the per-provider timeout for AI generation calls.
    #[must_use]
    pub const fn generation_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.cfg.generation_timeout = timeout;
        self
    }

    /// Set an overall deadline for fan-out aggregations.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.cfg.request_timeout = Some(timeout);
        self
    }

    /// Return variants from the first provider with a non-empty answer,
    /// cancelling the rest.
    #[must_use]
    pub const fn stop_on_first_variants(mut self, yes: bool) -> Self {
        self.cfg.stop_on_first_variants = yes;
        self
    }

    /// Set the fuzzy-title dedup threshold (default 0.6).
    #[must_use]
    pub const fn title_similarity_threshold(mut self, threshold: f64) -> Self {
        self.cfg.title_similarity_threshold = threshold;
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    /// - `InvalidArg` if no providers are registered.
    /// - `InvalidArg` if two providers share a name.
    /// - `InvalidArg` if the priority list names an unregistered provider.
    pub fn build(self) -> Result<Alexandria, AlexandriaError> {
        if self.providers.is_empty() {
            return Err(AlexandriaError::InvalidArg(
                "no providers registered; add at least one via with_provider(...)".to_string(),
            ));
        }

        let mut seen: HashSet<&'static str> = HashSet::new();
        for p in &self.providers {
            if !seen.insert(p.name()) {
                return Err(AlexandriaError::InvalidArg(format!(
                    "duplicate provider name: {}",
                    p.name()
                )));
            }
        }

        let unknown: Vec<&String> = self
            .cfg
            .provider_priority
            .iter()
            .filter(|name| !seen.contains(name.as_str()))
            .collect();
        if !unknown.is_empty() {
            return Err(AlexandriaError::InvalidArg(format!(
                "priority list references unknown providers: {}",
                unknown
                    .into_iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        Ok(Alexandria {
            providers: self.providers,
            cfg: self.cfg,
        })
    }
}

pub(crate) fn tag_err(provider: &str, e: AlexandriaError) -> AlexandriaError {
    match e {
        e @ (AlexandriaError::NotFound { .. }
        | AlexandriaError::Provider { .. }
        | AlexandriaError::ProviderTimeout { .. }
        | AlexandriaError::RequestTimeout { .. }
        | AlexandriaError::RateLimited { .. }
        | AlexandriaError::QuotaExhausted { .. }
        | AlexandriaError::Auth { .. }
        | AlexandriaError::AllProvidersFailed(_)) => e,
        other => AlexandriaError::Provider {
            provider: provider.to_string(),
            msg: other.to_string(),
        },
    }
}

impl Alexandria {
    /// Start building a new `Alexandria` instance.
    #[must_use]
    pub fn builder() -> AlexandriaBuilder {
        AlexandriaBuilder::new()
    }

    /// The fuzzy-title threshold shared with the dedup service.
    #[must_use]
    pub fn title_similarity_threshold(&self) -> f64 {
        self.cfg.title_similarity_threshold
    }

    /// Capable, available providers in priority order: explicit priority
    /// rank first, then registration order for the rest.
    pub(crate) fn ordered_for(&self, cap: Capability) -> Vec<Arc<dyn MetadataProvider>> {
        let rank_of = |name: &str| -> usize {
            self.cfg
                .provider_priority
                .iter()
                .position(|p| p == name)
                .unwrap_or(usize::MAX)
        };
        let mut out: Vec<(usize, usize, Arc<dyn MetadataProvider>)> = self
            .providers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.supports(cap))
            .filter(|(_, p)| {
                let available = p.is_available();
                if !available {
                    tracing::debug!(provider = p.name(), capability = %cap, "skipping unavailable provider");
                }
                available
            })
            .map(|(i, p)| (rank_of(p.name()), i, p.clone()))
            .collect();
        out.sort_by_key(|(rank, reg, _)| (*rank, *reg));
        out.into_iter().map(|(_, _, p)| p).collect()
    }

    /// Wrap a provider future with a timeout and standardized timeout error
    /// mapping.
    pub(crate) async fn call_with_timeout<T, Fut>(
        provider_name: &'static str,
        capability: Capability,
        timeout: std::time::Duration,
        fut: Fut,
    ) -> Result<T, AlexandriaError>
    where
        Fut: core::future::Future<Output = Result<T, AlexandriaError>>,
    {
        (tokio::time::timeout(timeout, fut).await).unwrap_or_else(|_| {
            Err(AlexandriaError::provider_timeout(
                provider_name,
                capability.as_str(),
            ))
        })
    }

    /// Apply the optional request-level deadline to a joined fan-out.
    pub(crate) async fn with_request_deadline<T, Fut>(
        &self,
        capability: Capability,
        fut: Fut,
    ) -> Result<T, AlexandriaError>
    where
        Fut: core::future::Future<Output = T>,
    {
        match self.cfg.request_timeout {
            Some(deadline) => (tokio::time::timeout(deadline, fut).await)
                .map_err(|_| AlexandriaError::request_timeout(capability.as_str())),
            None => Ok(fut.await),
        }
    }

    /// Deduplicate editions by canonical ISBN; the first occurrence (the
    /// highest-priority provider's answer) wins.
    pub(crate) fn dedup_by_isbn(records: Vec<EditionRecord>) -> Vec<EditionRecord> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            if seen.insert(record.isbn.to_isbn13().as_str().to_string()) {
                out.push(record);
            }
        }
        out
    }

    /// Second-pass fuzzy dedup: drop records whose normalized title is
    /// similar (>= threshold) to an earlier record crediting the same
    /// primary author.
    pub(crate) fn dedup_fuzzy(&self, records: Vec<EditionRecord>) -> Vec<EditionRecord> {
        let threshold = self.cfg.title_similarity_threshold;
        let mut kept: Vec<EditionRecord> = Vec::with_capacity(records.len());
        for record in records {
            let duplicate = kept.iter().any(|existing| {
                existing.authors.first() == record.authors.first()
                    && title_similarity(&existing.title, &record.title) >= threshold
            });
            if duplicate {
                tracing::debug!(title = %record.title, "dropping fuzzy duplicate");
            } else {
                kept.push(record);
            }
        }
        kept
    }

    /// Group per-provider results (already in priority order) into one
    /// deduplicated list.
    pub(crate) fn merge_fanout(
        &self,
        per_provider: Vec<Vec<EditionRecord>>,
        fuzzy: bool,
    ) -> Vec<EditionRecord> {
        let flat: Vec<EditionRecord> = per_provider.into_iter().flatten().collect();
        let by_isbn = Self::dedup_by_isbn(flat);
        if fuzzy { self.dedup_fuzzy(by_isbn) } else { by_isbn }
    }

    /// Look up a registered provider by name, capability-checked by callers.
    pub(crate) fn provider_named(&self, name: &str) -> Option<Arc<dyn MetadataProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_by_isbn_treats_10_and_13_as_one() {
        let ten = alexandria_core::Isbn::parse("0439064872").unwrap();
        let thirteen = alexandria_core::Isbn::parse("9780439064873").unwrap();
        let records = vec![
            EditionRecord::new(thirteen, "Chamber of Secrets", "a"),
            EditionRecord::new(ten, "Chamber of Secrets", "b"),
        ];
        let deduped = Alexandria::dedup_by_isbn(records);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].source, "a");
    }
}
