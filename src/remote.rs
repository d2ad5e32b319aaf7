//! Shared HTTP plumbing for the remote embedding providers.

use std::time::Duration;

use tracing::warn;

use crate::error::{Result, SearchError};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(200);

/// Send a request, retrying transport errors and 429/5xx responses with a
/// linear backoff before giving up with `ProviderUnavailable`.
///
/// `build` is invoked once per attempt because a `RequestBuilder` is
/// consumed on send. Non-retryable statuses (4xx other than 429) are
/// returned to the caller for provider-specific error reporting.
pub(crate) async fn send_with_retry<F>(provider: &str, build: F) -> Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match build().send().await {
            Ok(response) => {
                let status = response.status();
                let retryable = status.as_u16() == 429 || status.is_server_error();
                if retryable && attempt < MAX_ATTEMPTS {
                    warn!(provider, %status, attempt, "retrying embedding request");
                    tokio::time::sleep(BACKOFF_BASE * attempt).await;
                    continue;
                }
                return Ok(response);
            }
            Err(e) if attempt < MAX_ATTEMPTS => {
                warn!(provider, error = %e, attempt, "retrying embedding request");
                tokio::time::sleep(BACKOFF_BASE * attempt).await;
            }
            Err(e) => {
                return Err(SearchError::provider(
                    provider,
                    format!("request failed after {attempt} attempts: {e}"),
                ));
            }
        }
    }
}
