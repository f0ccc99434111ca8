use futures::stream::{FuturesUnordered, StreamExt};

use alexandria_core::provider::FetchOptions;
use alexandria_core::{AlexandriaError, Capability, EditionRecord, VariantQuery};

use crate::Alexandria;

impl Alexandria {
    /// Enumerate the editions that manifest the queried work across every
    /// capable provider.
    ///
    /// With `stop_on_first_variants` set, the first provider to complete
    /// with a non-empty list wins and the outstanding calls are cancelled by
    /// dropping their futures; otherwise all answers are merged and
    /// deduplicated by ISBN with a fuzzy-title second pass.
    ///
    /// # Errors
    /// Returns `Unsupported` when no registered provider advertises
    /// edition variants. Individual provider failures are dropped.
    pub async fn edition_variants(
        &self,
        query: &VariantQuery,
    ) -> Result<Vec<EditionRecord>, AlexandriaError> {
        let ordered = self.ordered_for(Capability::EditionVariants);
        if ordered.is_empty() {
            return Err(AlexandriaError::unsupported(
                Capability::EditionVariants.as_str(),
            ));
        }

        if self.cfg.stop_on_first_variants {
            return self.variants_first_success(query, ordered).await;
        }

        let opts = FetchOptions::default();
        let timeout = self.cfg.provider_timeout;
        let tasks = ordered.iter().map(|p| {
            let p = p.clone();
            let query = query.clone();
            let opts = opts.clone();
            async move {
                let name = p.name();
                let Some(variants) = p.as_edition_variants_provider() else {
                    return (name, Ok(Vec::new()));
                };
                let res = Self::call_with_timeout(
                    name,
                    Capability::EditionVariants,
                    timeout,
                    variants.variants(&query, &opts),
                )
                .await;
                (name, res)
            }
        });

        let joined = self
            .with_request_deadline(Capability::EditionVariants, futures::future::join_all(tasks))
            .await?;

        let mut per_provider: Vec<Vec<EditionRecord>> = Vec::new();
        for (name, result) in joined {
            match result {
                Ok(records) => per_provider.push(records),
                Err(e) => {
                    tracing::debug!(provider = name, error = %e, "variant provider dropped");
                }
            }
        }
        Ok(self.merge_fanout(per_provider, true))
    }

    // Race all providers; first non-empty completion wins and the rest are
    // dropped mid-flight.
    async fn variants_first_success(
        &self,
        query: &VariantQuery,
        ordered: Vec<std::sync::Arc<dyn alexandria_core::MetadataProvider>>,
    ) -> Result<Vec<EditionRecord>, AlexandriaError> {
        let opts = FetchOptions::default();
        let timeout = self.cfg.provider_timeout;
        let mut futs = FuturesUnordered::new();
        for p in ordered {
            let query = query.clone();
            let opts = opts.clone();
            futs.push(async move {
                let name = p.name();
                let Some(variants) = p.as_edition_variants_provider() else {
                    return (name, Ok(Vec::new()));
                };
                let res = Self::call_with_timeout(
                    name,
                    Capability::EditionVariants,
                    timeout,
                    variants.variants(&query, &opts),
                )
                .await;
                (name, res)
            });
        }

        let race = async {
            while let Some((name, result)) = futs.next().await {
                match result {
                    Ok(records) if !records.is_empty() => {
                        tracing::debug!(provider = name, "first non-empty variant answer wins");
                        return Some(records);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(provider = name, error = %e, "variant provider dropped");
                    }
                }
            }
            None
        };
        let winner = self
            .with_request_deadline(Capability::EditionVariants, race)
            .await?;
        Ok(winner.map(Self::dedup_by_isbn).unwrap_or_default())
    }
}
