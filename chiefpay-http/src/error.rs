//! Error type of the ChiefPay client.

use std::time::Duration;

use chiefpay::{ApiError, DecodeError};
use http::StatusCode;

/// Errors returned by [`ChiefPayClient`](crate::ChiefPayClient) operations
/// and published as [`ClientEvent::Error`](crate::ClientEvent::Error).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// HTTP transport error, including errors raised by middleware.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying error.
        #[source]
        source: reqwest_middleware::Error,
    },

    /// Failed to read a response body.
    #[error("Failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with something other than JSON.
    #[error("Non-JSON response (HTTP {status}): {context}: {body}")]
    InvalidBody {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The raw response body.
        body: String,
    },

    /// Unexpected HTTP status on an endpoint that does not use envelopes.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {context}: {source}")]
    Json {
        /// Human-readable context.
        context: &'static str,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// The server reported an application error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The server kept answering 429 after the configured number of retries.
    #[error("rate limited by server, retry after {retry_after:?}")]
    RateLimited {
        /// The wait the server asked for.
        retry_after: Duration,
    },

    /// A rate pull was attempted before the minimum interval elapsed.
    #[error("rates were pulled recently, retry in {retry_in:?}")]
    RatesThrottled {
        /// Remaining wait.
        retry_in: Duration,
    },

    /// A 429 could not be retried because the request body is a stream.
    #[error("request cannot be retried: body is not cloneable")]
    RequestNotCloneable,

    /// The push connection failed or dropped.
    #[error("push transport error: {0}")]
    Transport(String),

    /// A pushed frame could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ClientError {
    /// Returns the [`ApiError`] if the server reported an application error.
    #[must_use]
    pub const fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}
