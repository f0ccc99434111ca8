//! Configuration types shared across orchestrators, middleware, and the
//! queue pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cache strategy hint carried on every provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Serve from cache when fresh, populate on miss.
    #[default]
    Enabled,
    /// Bypass the cache entirely (forced refresh paths).
    Disabled,
}

/// Configuration for the read-through provider cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries.
    pub capacity: u64,
    /// Time-to-live for cached entries.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// Configuration for a provider's non-rolling daily call budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Maximum calls per UTC day. Unused budget does not roll over.
    pub daily_limit: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { daily_limit: 15_000 }
    }
}

/// Route classes for per-client rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateClass {
    /// Default read traffic.
    Standard,
    /// Search endpoints.
    Search,
    /// Mutating endpoints.
    Write,
    /// Expensive fan-out endpoints (synchronous enrichment, bibliography).
    Heavy,
}

impl RateClass {
    /// Stable label used in counter keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Search => "search",
            Self::Write => "write",
            Self::Heavy => "heavy",
        }
    }

    /// Whether a ledger outage lets requests of this class through.
    ///
    /// Heavy routes fail closed; everything else fails open.
    #[must_use]
    pub const fn fail_open(self) -> bool {
        !matches!(self, Self::Heavy)
    }
}

/// Per-class request budgets over a shared sliding window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length for every class.
    pub window: Duration,
    /// Budget for [`RateClass::Standard`].
    pub standard: u64,
    /// Budget for [`RateClass::Search`].
    pub search: u64,
    /// Budget for [`RateClass::Write`].
    pub write: u64,
    /// Budget for [`RateClass::Heavy`].
    pub heavy: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            standard: 100,
            search: 60,
            write: 30,
            heavy: 10,
        }
    }
}

impl RateLimitConfig {
    /// Budget for a class.
    #[must_use]
    pub const fn limit(&self, class: RateClass) -> u64 {
        match class {
            RateClass::Standard => self.standard,
            RateClass::Search => self.search,
            RateClass::Write => self.write,
            RateClass::Heavy => self.heavy,
        }
    }
}

/// Outcome of a rate-limit check, surfaced to callers as response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// The class budget.
    pub limit: u64,
    /// Remaining units in the current window (never negative).
    pub remaining: u64,
    /// Epoch second at which the window resets.
    pub reset_epoch: i64,
    /// Wait hint for rejected requests, in milliseconds.
    pub retry_after_ms: Option<u64>,
}

/// Exponential backoff configuration for queue retries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 500,
            max_backoff_ms: 30_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

/// Per-queue consumer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum messages leased per batch.
    pub max_batch_size: usize,
    /// How long a partial batch may wait before delivery.
    pub max_batch_timeout: Duration,
    /// Deliveries before a message expires to the dead-letter queue.
    pub max_retries: u32,
    /// Concurrent in-flight messages per consumer. This is the primary
    /// backpressure knob protecting upstream providers.
    pub max_concurrency: usize,
    /// Retry backoff shape.
    pub backoff: BackoffConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            max_batch_timeout: Duration::from_secs(5),
            max_retries: 3,
            max_concurrency: 4,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Fan-out tuning for the orchestrators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Explicit provider priority by name. Wins over registration order;
    /// unregistered names are ignored, registered names missing from the
    /// list are appended in registration order.
    pub provider_priority: Vec<String>,
    /// Timeout for individual HTTP metadata calls.
    pub provider_timeout: Duration,
    /// Timeout for AI generation calls.
    pub generation_timeout: Duration,
    /// Timeout for batch endpoints.
    pub batch_timeout: Duration,
    /// Optional overall deadline for fan-out aggregations.
    pub request_timeout: Option<Duration>,
    /// Return after the first provider yields a non-empty variant set,
    /// cancelling stragglers.
    pub stop_on_first_variants: bool,
    /// Fuzzy-title dedup threshold shared by the in-memory Levenshtein
    /// pass and the store-side trigram pass. The two measures disagree at
    /// the margins; the store-side answer is final.
    pub title_similarity_threshold: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            provider_priority: Vec::new(),
            provider_timeout: Duration::from_secs(10),
            generation_timeout: Duration::from_secs(60),
            batch_timeout: Duration::from_secs(30),
            request_timeout: None,
            stop_on_first_variants: false,
            title_similarity_threshold: 0.6,
        }
    }
}

/// Outbound webhook endpoint and signing secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Destination URL.
    pub url: String,
    /// Shared secret for the HMAC signature header.
    pub secret: String,
}

/// Engine-level policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Collective/institutional author names (normalized form) that never
    /// trigger author creation or bibliography fetches.
    pub author_blocklist: Vec<String>,
    /// Enqueue a bibliography job when an enrichment introduces a
    /// previously unknown author.
    pub bibliography_on_new_author: bool,
    /// Page cap for bibliography jobs the engine emits.
    pub bibliography_max_pages: u32,
    /// Optional outbound webhook announcing new/updated entities.
    pub webhook: Option<WebhookConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            author_blocklist: [
                "anonymous",
                "various authors",
                "unknown",
                "united states",
                "editors",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            bibliography_on_new_author: true,
            bibliography_max_pages: 5,
            webhook: None,
        }
    }
}

/// Backfill planning bounds and behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// First publication year to plan, inclusive.
    pub start_year: i32,
    /// Last publication year to plan, inclusive.
    pub end_year: i32,
    /// Candidates requested per bucket.
    pub batch_size: usize,
    /// Plan and log without enqueueing anything.
    pub dry_run: bool,
    /// Re-run buckets recorded as failed in the checkpoint.
    pub force_retry: bool,
    /// Buckets at or after this year prefer the newer generation model.
    pub model_cutoff_year: i32,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            start_year: 1950,
            end_year: 2024,
            batch_size: 50,
            dry_run: false,
            force_retry: false,
            model_cutoff_year: 2015,
        }
    }
}
