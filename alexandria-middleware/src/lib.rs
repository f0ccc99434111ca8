//! Middleware wrappers for Alexandria providers.
//!
//! - `quota`: day-bucketed per-provider call budgets backed by the shared KV store.
//! - `rate_limit`: sliding-window per-client request budgets with per-class
//!   fail-open/fail-closed policies.
//! - `cache`: a moka-backed read-through cache wrapper for read-heavy capabilities.
#![warn(missing_docs)]

/// Per-provider daily quota accounting.
pub mod quota;

/// Per-client request rate limiting.
pub mod rate_limit;

/// Read-through caching of provider responses.
pub mod cache;

pub use cache::CachedProvider;
pub use quota::QuotaAwareProvider;
pub use rate_limit::RateLimiter;
