use core::fmt;
use serde::{Deserialize, Serialize};

/// High-level capability labels for routing, errors, and telemetry.
///
/// These map one-to-one with orchestrator endpoints and allow consistent
/// Display formatting and match-exhaustive handling when adding
/// new capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Edition metadata lookup by ISBN (single or batch).
    BookMetadata,
    /// All editions that manifest the same work.
    EditionVariants,
    /// Paged list of editions attributed to an author.
    AuthorBibliography,
    /// AI-generated candidate book lists from a curated prompt.
    BookGeneration,
    /// Resolution of external identity ids to internal author keys.
    IdentityCrosswalk,
    /// Best-known cover image URL for an ISBN.
    CoverUrl,
}

impl Capability {
    /// Stable, kebab-case identifier for logs/errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BookMetadata => "book-metadata",
            Self::EditionVariants => "edition-variants",
            Self::AuthorBibliography => "author-bibliography",
            Self::BookGeneration => "book-generation",
            Self::IdentityCrosswalk => "identity-crosswalk",
            Self::CoverUrl => "cover-url",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
