//! Per-client request rate limiting over the shared KV store.
//!
//! Counters are keyed by `(route class, client, window bucket)` with a TTL
//! equal to the window, so every worker sees the same budget. The ledger is
//! best-effort: a KV outage lets standard traffic through and refuses heavy
//! traffic, per class policy.

use std::sync::Arc;

use chrono::Utc;

use alexandria_core::kv::KvStore;
use alexandria_types::{AlexandriaError, RateClass, RateDecision, RateLimitConfig};

/// Sliding-window request limiter for the HTTP edge and internal callers.
pub struct RateLimiter {
    kv: Arc<dyn KvStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a limiter over the shared KV store.
    pub fn new(kv: Arc<dyn KvStore>, config: RateLimitConfig) -> Self {
        Self { kv, config }
    }

    /// Check and consume one unit of `client`'s budget for `class`.
    ///
    /// Always returns a decision; KV failures resolve via the class
    /// fail-open/fail-closed policy rather than surfacing an error.
    pub async fn check(&self, class: RateClass, client: &str) -> RateDecision {
        let limit = self.config.limit(class);
        let window_secs = self.config.window.as_secs().max(1);
        let now_epoch = Utc::now().timestamp();
        let window_id = now_epoch.div_euclid(window_secs as i64);
        let reset_epoch = (window_id + 1) * window_secs as i64;
        let key = format!("rate:{}:{client}:{window_id}", class.as_str());

        let used = match self.kv.incr(&key, 1, Some(self.config.window)).await {
            Ok(used) => used,
            Err(e) => {
                tracing::warn!(class = class.as_str(), error = %e, "rate-limit ledger unavailable");
                return Self::ledger_down_decision(class, limit, reset_epoch, now_epoch);
            }
        };

        // Rejected attempts keep incrementing the raw counter; clamp so the
        // reported arithmetic stays `used + remaining == limit`.
        let counted = used.min(limit);
        let remaining = limit - counted;
        if used > limit {
            RateDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_epoch,
                retry_after_ms: Some(((reset_epoch - now_epoch).max(0) as u64) * 1000),
            }
        } else {
            RateDecision {
                allowed: true,
                limit,
                remaining,
                reset_epoch,
                retry_after_ms: None,
            }
        }
    }

    /// Convert a rejecting decision into the caller-facing error.
    #[must_use]
    pub fn rejection(decision: &RateDecision) -> AlexandriaError {
        AlexandriaError::RateLimitExceeded {
            limit: decision.limit,
            remaining: decision.remaining,
            reset_epoch: decision.reset_epoch,
            retry_after_ms: decision.retry_after_ms.unwrap_or(0),
        }
    }

    fn ledger_down_decision(
        class: RateClass,
        limit: u64,
        reset_epoch: i64,
        now_epoch: i64,
    ) -> RateDecision {
        if class.fail_open() {
            RateDecision {
                allowed: true,
                limit,
                remaining: limit,
                reset_epoch,
                retry_after_ms: None,
            }
        } else {
            RateDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_epoch,
                retry_after_ms: Some(((reset_epoch - now_epoch).max(0) as u64) * 1000),
            }
        }
    }
}
