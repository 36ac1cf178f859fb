//! HTTP 429 handling for reqwest.
//!
//! [`RateLimitRetry`] waits for the interval announced in the
//! `retry-after-ms` header and re-sends the same request. Only the affected
//! request is suspended; other requests on the same client proceed.

use http::{Extensions, HeaderMap, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::time::Duration;
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

use crate::constants::{DEFAULT_RETRY_AFTER, RETRY_AFTER_MS_HEADER};
use crate::error::ClientError;

/// Middleware that retries requests answered with `429 Too Many Requests`.
///
/// Retries are unbounded unless a cap is set with
/// [`with_max_retries`](Self::with_max_retries). Once the cap is reached the
/// last 429 response is passed through to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitRetry {
    max_retries: Option<u32>,
}

impl RateLimitRetry {
    /// Creates a middleware that retries until the server stops answering 429.
    #[must_use]
    pub const fn new() -> Self {
        Self { max_retries: None }
    }

    /// Gives up after `max_retries` retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the cap, `None` meaning unbounded.
    #[must_use]
    pub const fn with_max_retries_opt(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The configured cap.
    #[must_use]
    pub const fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }
}

/// Reads the back-off the server asked for.
///
/// Falls back to [`DEFAULT_RETRY_AFTER`] when the header is missing or is not
/// an integer number of milliseconds.
#[must_use]
pub fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER_MS_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(DEFAULT_RETRY_AFTER, Duration::from_millis)
}

#[async_trait::async_trait]
impl rqm::Middleware for RateLimitRetry {
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chiefpay.rate_limit.handle", skip_all, err)
    )]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let mut req = req;
        let mut attempt: u32 = 0;
        loop {
            let retry_req = req.try_clone();
            let res = next.clone().run(req, extensions).await?;
            if res.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(res);
            }
            if self.max_retries.is_some_and(|max| attempt >= max) {
                return Ok(res);
            }
            let delay = retry_after(res.headers());
            drop(res);

            req = retry_req.ok_or_else(|| {
                rqm::Error::Middleware(ClientError::RequestNotCloneable.into())
            })?;
            attempt += 1;

            #[cfg(feature = "telemetry")]
            debug!(url = %req.url(), attempt, delay_ms = delay.as_millis(), "429 received, retrying");

            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER);
        headers.insert(RETRY_AFTER_MS_HEADER, HeaderValue::from_static("500"));
        assert_eq!(retry_after(&headers), Duration::from_millis(500));
        headers.insert(RETRY_AFTER_MS_HEADER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER);
    }
}
