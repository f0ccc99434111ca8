use alexandria_core::provider::FetchOptions;
use alexandria_core::{AlexandriaError, Capability, EditionRecord, ProviderTier};

use crate::Alexandria;
use crate::core::tag_err;

impl Alexandria {
    /// Fetch up to `max_pages` of an author's bibliography.
    ///
    /// Pages are fetched sequentially from a single provider to respect the
    /// upstream request-per-second contract; paid providers are preferred
    /// when priorities tie. A provider that fails on its first page falls
    /// through to the next capable provider; a failure mid-pagination keeps
    /// what was already fetched.
    ///
    /// # Errors
    /// Returns `Unsupported` when no provider advertises bibliographies and
    /// the aggregated failures when every provider failed on page one.
    pub async fn author_bibliography(
        &self,
        author: &str,
        max_pages: u32,
    ) -> Result<Vec<EditionRecord>, AlexandriaError> {
        if author.trim().is_empty() {
            return Err(AlexandriaError::InvalidArg("empty author name".into()));
        }
        if max_pages == 0 {
            return Err(AlexandriaError::InvalidArg("max_pages must be >= 1".into()));
        }

        let mut ordered = self.ordered_for(Capability::AuthorBibliography);
        if ordered.is_empty() {
            return Err(AlexandriaError::unsupported(
                Capability::AuthorBibliography.as_str(),
            ));
        }
        // Stable preference for the paid tier when the priority list does
        // not already decide.
        ordered.sort_by_key(|p| match p.tier() {
            ProviderTier::Paid => 0,
            ProviderTier::Free => 1,
        });

        let opts = FetchOptions::default();
        let mut errors: Vec<AlexandriaError> = Vec::new();

        'providers: for provider in ordered {
            let name = provider.name();
            let Some(bibliography) = provider.as_author_bibliography_provider() else {
                continue;
            };

            let mut editions: Vec<EditionRecord> = Vec::new();
            for page in 1..=max_pages {
                let result = Self::call_with_timeout(
                    name,
                    Capability::AuthorBibliography,
                    self.cfg.provider_timeout,
                    bibliography.bibliography_page(author, page, &opts),
                )
                .await;
                match result {
                    Ok(fetched) => {
                        let done = !fetched.has_more || fetched.editions.is_empty();
                        editions.extend(fetched.editions);
                        if done {
                            break;
                        }
                    }
                    Err(e) if page == 1 => {
                        tracing::debug!(provider = name, error = %e, "bibliography provider dropped");
                        errors.push(tag_err(name, e));
                        continue 'providers;
                    }
                    Err(e) => {
                        tracing::warn!(
                            provider = name,
                            page,
                            error = %e,
                            "bibliography pagination stopped early"
                        );
                        break;
                    }
                }
            }
            return Ok(Self::dedup_by_isbn(editions));
        }

        if errors
            .iter()
            .all(|e| matches!(e, AlexandriaError::NotFound { .. }))
        {
            return Ok(Vec::new());
        }
        Err(AlexandriaError::AllProvidersFailed(errors))
    }
}
