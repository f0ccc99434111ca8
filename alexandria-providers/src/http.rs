//! Shared HTTP plumbing: client construction and status-to-error mapping.

use std::time::Duration;

use alexandria_types::AlexandriaError;

pub(crate) const USER_AGENT: &str = concat!("alexandria/", env!("CARGO_PKG_VERSION"));

/// Client with conservative connect/read timeouts; orchestrators apply the
/// per-call deadline on top.
pub(crate) fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// Map a transport-level failure.
pub(crate) fn transport_err(provider: &'static str, e: &reqwest::Error) -> AlexandriaError {
    if e.is_timeout() {
        AlexandriaError::provider(provider, "request timed out")
    } else {
        AlexandriaError::provider(provider, e.to_string())
    }
}

/// Normalize non-success statuses into the shared taxonomy. `not_found`
/// labels the 404 case for the caller.
pub(crate) fn check_status(
    provider: &'static str,
    response: &reqwest::Response,
    not_found: &str,
) -> Result<(), AlexandriaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(match status.as_u16() {
        401 | 403 => AlexandriaError::Auth {
            provider: provider.to_string(),
        },
        404 => AlexandriaError::not_found(not_found.to_string()),
        429 => AlexandriaError::RateLimited {
            provider: provider.to_string(),
            retry_after_ms: response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000),
        },
        400 => AlexandriaError::InvalidArg(format!("{provider} rejected the request")),
        _ if status.is_server_error() => {
            AlexandriaError::provider(provider, format!("upstream error {status}"))
        }
        _ => AlexandriaError::provider(provider, format!("unexpected status {status}")),
    })
}
