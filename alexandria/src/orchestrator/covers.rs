use alexandria_core::provider::FetchOptions;
use alexandria_core::{AlexandriaError, Capability, Isbn};

use crate::Alexandria;

impl Alexandria {
    /// Best-known cover image URL for an ISBN.
    ///
    /// Providers are consulted sequentially in priority order; the first
    /// URL wins. `None` everywhere means no cover is known, which is not
    /// an error.
    ///
    /// # Errors
    /// Returns `Unsupported` when no provider advertises cover URLs.
    /// Individual provider failures are dropped.
    pub async fn best_cover_url(&self, isbn: &Isbn) -> Result<Option<String>, AlexandriaError> {
        let ordered = self.ordered_for(Capability::CoverUrl);
        if ordered.is_empty() {
            return Err(AlexandriaError::unsupported(Capability::CoverUrl.as_str()));
        }

        let opts = FetchOptions::default();
        for provider in ordered {
            let name = provider.name();
            let Some(covers) = provider.as_cover_url_provider() else {
                continue;
            };
            let result = Self::call_with_timeout(
                name,
                Capability::CoverUrl,
                self.cfg.provider_timeout,
                covers.cover_url(isbn, &opts),
            )
            .await;
            match result {
                Ok(Some(url)) => return Ok(Some(url)),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(provider = name, error = %e, "cover provider dropped");
                }
            }
        }
        Ok(None)
    }
}
