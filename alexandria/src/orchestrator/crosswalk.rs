use alexandria_core::provider::FetchOptions;
use alexandria_core::{AlexandriaError, Capability, CrosswalkMatch, ExternalRef};

use crate::Alexandria;

impl Alexandria {
    /// Resolve an external author identifier to an internal key.
    ///
    /// Providers are tried sequentially in priority order; the first
    /// definite answer wins. `None` from every provider means the
    /// identifier is simply unknown, which is not an error.
    ///
    /// # Errors
    /// Returns `Unsupported` when no provider advertises identity
    /// resolution. Individual provider failures are dropped.
    pub async fn resolve_author_identity(
        &self,
        external: &ExternalRef,
    ) -> Result<Option<CrosswalkMatch>, AlexandriaError> {
        let ordered = self.ordered_for(Capability::IdentityCrosswalk);
        if ordered.is_empty() {
            return Err(AlexandriaError::unsupported(
                Capability::IdentityCrosswalk.as_str(),
            ));
        }

        let opts = FetchOptions::default();
        for provider in ordered {
            let name = provider.name();
            let Some(resolver) = provider.as_identity_crosswalk_provider() else {
                continue;
            };
            let result = Self::call_with_timeout(
                name,
                Capability::IdentityCrosswalk,
                self.cfg.provider_timeout,
                resolver.resolve_author(external, &opts),
            )
            .await;
            match result {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(provider = name, error = %e, "identity provider dropped");
                }
            }
        }
        Ok(None)
    }
}
