use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the alexandria workspace.
///
/// This wraps capability mismatches, argument validation errors, provider-tagged
/// failures, not-found conditions, quota and rate-limit rejections, and an
/// aggregate for multi-provider attempts.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AlexandriaError {
    /// The requested capability is not implemented by the target provider.
    #[error("unsupported capability: {capability}")]
    Unsupported {
        /// A capability string describing what was requested (e.g. "book-metadata").
        capability: String,
    },

    /// Invalid input argument (malformed ISBN, missing field, out-of-range count).
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Issues with the returned or expected data (missing fields, bad payload shape).
    #[error("data issue: {0}")]
    Data(String),

    /// An individual provider returned an error.
    #[error("{provider} failed: {msg}")]
    Provider {
        /// Provider name that failed.
        provider: String,
        /// Human-readable error message.
        msg: String,
    },

    /// A resource could not be found. Surfaced as an empty success by
    /// orchestrators; never retried.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. "edition 9780439064873".
        what: String,
    },

    /// All selected providers failed; contains the individual failures.
    #[error("all providers failed: {0:?}")]
    AllProvidersFailed(Vec<AlexandriaError>),

    /// An individual provider call exceeded the configured timeout.
    #[error("provider timed out: {capability} via {provider}")]
    ProviderTimeout {
        /// Provider name that timed out.
        provider: String,
        /// Capability label (e.g. "book-metadata").
        capability: String,
    },

    /// The overall request exceeded the configured deadline.
    #[error("request timed out: {capability}")]
    RequestTimeout {
        /// Capability label for which the request timed out.
        capability: String,
    },

    /// The upstream rejected the call with a rate limit (HTTP 429).
    #[error("rate limited by {provider}")]
    RateLimited {
        /// Provider that rejected the call.
        provider: String,
        /// Milliseconds to wait before retrying, when the upstream said so.
        retry_after_ms: Option<u64>,
    },

    /// A client exceeded its request budget for a route class.
    #[error("rate limit exceeded: limit={limit} retry_after_ms={retry_after_ms}")]
    RateLimitExceeded {
        /// Allowed number of requests in the window.
        limit: u64,
        /// Remaining units at the time of rejection (zero here by definition).
        remaining: u64,
        /// Epoch second at which the window resets.
        reset_epoch: i64,
        /// Milliseconds until the window resets.
        retry_after_ms: u64,
    },

    /// The provider's daily call budget is spent; it is unavailable until
    /// the next UTC day.
    #[error("quota exhausted for {provider}: reset_in_ms={reset_in_ms}")]
    QuotaExhausted {
        /// Provider whose budget is spent.
        provider: String,
        /// Milliseconds until the day bucket rolls over.
        reset_in_ms: u64,
    },

    /// Credentials were rejected. Fatal for the provider; never retried.
    #[error("authentication failed for {provider}")]
    Auth {
        /// Provider that rejected the credentials.
        provider: String,
    },

    /// A unique-key collision. Treated as success inside find-or-create.
    #[error("conflict: {what}")]
    Conflict {
        /// Description of the colliding entity.
        what: String,
    },

    /// The persistence layer failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A queue operation failed.
    #[error("queue error: {0}")]
    Queue(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// What a queue consumer should do with a message that failed with a
/// given error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// Acknowledge and drop; the failure is permanent but harmless.
    Ack,
    /// Schedule a retry with backoff; the failure is transient.
    Retry,
    /// Route to the dead-letter queue; the failure is permanent and
    /// needs operator attention.
    DeadLetter,
}

impl AlexandriaError {
    /// Helper: build an `Unsupported` error for a capability string.
    #[must_use]
    pub fn unsupported(cap: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: cap.into(),
        }
    }

    /// Helper: build a `Provider` error with the provider name and message.
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `ProviderTimeout` error.
    pub fn provider_timeout(provider: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::ProviderTimeout {
            provider: provider.into(),
            capability: capability.into(),
        }
    }

    /// Helper: build a `RequestTimeout` error.
    #[must_use]
    pub fn request_timeout(capability: impl Into<String>) -> Self {
        Self::RequestTimeout {
            capability: capability.into(),
        }
    }

    /// Helper: build a `Conflict` error.
    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict { what: what.into() }
    }

    /// Returns true if this error should be surfaced to users as actionable.
    ///
    /// Non-actionable errors are those indicating capability absence or a benign
    /// not-found condition. Aggregates are classified based on their contents.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        match self {
            Self::Unsupported { .. } | Self::NotFound { .. } => false,
            Self::AllProvidersFailed(inner) => inner.iter().any(Self::is_actionable),
            _ => true,
        }
    }

    /// Flatten nested `AllProvidersFailed` structures into a plain vector.
    ///
    /// This preserves other error variants as-is and unwraps recursively.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::AllProvidersFailed(list) => list.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }

    /// Map this error to its queue-consumer disposition.
    ///
    /// Validation and not-found failures are acknowledged, transient
    /// failures retry, and fatal failures dead-letter. An aggregate retries
    /// when any member would.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::InvalidArg(_)
            | Self::Data(_)
            | Self::Unsupported { .. }
            | Self::NotFound { .. }
            | Self::Conflict { .. } => Disposition::Ack,

            Self::Provider { .. }
            | Self::ProviderTimeout { .. }
            | Self::RequestTimeout { .. }
            | Self::RateLimited { .. }
            | Self::RateLimitExceeded { .. }
            | Self::QuotaExhausted { .. }
            | Self::Storage(_)
            | Self::Queue(_)
            | Self::Internal(_) => Disposition::Retry,

            Self::Auth { .. } => Disposition::DeadLetter,

            Self::AllProvidersFailed(inner) => {
                if inner.iter().any(|e| e.disposition() == Disposition::Retry) {
                    Disposition::Retry
                } else if inner
                    .iter()
                    .any(|e| e.disposition() == Disposition::DeadLetter)
                {
                    Disposition::DeadLetter
                } else {
                    Disposition::Ack
                }
            }
        }
    }

    /// The retry-after hint carried by rate-limit rejections, if any.
    #[must_use]
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            Self::RateLimitExceeded { retry_after_ms, .. } => Some(*retry_after_ms),
            Self::QuotaExhausted { reset_in_ms, .. } => Some(*reset_in_ms),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_acked() {
        assert_eq!(
            AlexandriaError::InvalidArg("bad isbn".into()).disposition(),
            Disposition::Ack
        );
    }

    #[test]
    fn aggregate_retries_when_any_member_is_transient() {
        let err = AlexandriaError::AllProvidersFailed(vec![
            AlexandriaError::not_found("edition X"),
            AlexandriaError::provider_timeout("openlibrary", "book-metadata"),
        ]);
        assert_eq!(err.disposition(), Disposition::Retry);
    }

    #[test]
    fn aggregate_of_not_founds_is_acked() {
        let err = AlexandriaError::AllProvidersFailed(vec![
            AlexandriaError::not_found("a"),
            AlexandriaError::not_found("b"),
        ]);
        assert_eq!(err.disposition(), Disposition::Ack);
        assert!(!err.is_actionable());
    }

    #[test]
    fn flatten_unnests_aggregates() {
        let err = AlexandriaError::AllProvidersFailed(vec![
            AlexandriaError::not_found("a"),
            AlexandriaError::AllProvidersFailed(vec![AlexandriaError::Internal("boom".into())]),
        ]);
        assert_eq!(err.flatten().len(), 2);
    }
}
