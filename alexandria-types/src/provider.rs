//! Provider metadata types usable across crates.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Typed key for identifying providers in priority configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderKey(pub &'static str);

impl ProviderKey {
    /// Construct a new typed provider key from a static name.
    ///
    /// This is useful when configuring explicit provider priorities.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the inner static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl From<ProviderKey> for &'static str {
    fn from(k: ProviderKey) -> Self {
        k.0
    }
}

/// Commercial tier of a provider, used by the merge policy and quota layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderTier {
    /// Best-effort public source with aggressive upstream throttling.
    Free,
    /// Metered commercial source with a contractual daily call budget.
    Paid,
}

impl ProviderTier {
    /// Stable label for logs and the enrichment ledger.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for ProviderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
